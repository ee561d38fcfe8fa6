use crate::browser::{Link, PageQuery};
use crate::candidate::{Attributes, Contacts};
use crate::extractor::Extractor;
use crate::site::{attributes_from_table, contact_text, detect_next, NextPage, SiteAdapter, RESULTS_TIMEOUT};
use url::Url;

/// Sites where each company has an `outline` page and its recruiting
/// contacts live on a sibling `employment` page at the same path depth.
#[derive(Debug, Clone)]
pub struct OutlineSite {
    pub result_links: &'static str,
    pub company_name: &'static str,
    pub outline_rows: &'static str,
    pub contact_block: &'static str,
    pub next_control: &'static str,
    pub outline_segment: &'static str,
    pub detail_segment: &'static str,
}

impl Default for OutlineSite {
    fn default() -> Self {
        OutlineSite {
            result_links: "ul.search-results li.result h2 a",
            company_name: "h1.company-name",
            outline_rows: "table.outline tr",
            contact_block: ".contact",
            next_control: "a.next",
            outline_segment: "outline",
            detail_segment: "employment",
        }
    }
}

impl OutlineSite {
    /// `.../company/42/outline.html` -> `.../company/42/employment.html`.
    /// Query and fragment are dropped.
    pub fn substitute(&self, outline_url: &str) -> Option<String> {
        let mut url = Url::parse(outline_url).ok()?;
        let segments: Vec<String> = url.path_segments()?.map(str::to_string).collect();
        let idx = segments
            .iter()
            .rposition(|s| s == self.outline_segment || s.starts_with(&format!("{}.", self.outline_segment)))?;

        let mut replaced = segments;
        replaced[idx] = replaced[idx].replacen(self.outline_segment, self.detail_segment, 1);
        url.set_path(&format!("/{}", replaced.join("/")));
        url.set_query(None);
        url.set_fragment(None);
        Some(url.to_string())
    }
}

impl SiteAdapter for OutlineSite {
    fn wait_for_results(&self, page: &dyn PageQuery) -> bool {
        page.wait_for(self.result_links, RESULTS_TIMEOUT)
    }

    fn entity_links(&self, page: &dyn PageQuery) -> Vec<Link> {
        page.find_links(self.result_links)
    }

    fn canonical_name(&self, page: &dyn PageQuery) -> Option<String> {
        page.find_text(self.company_name).filter(|n| !n.trim().is_empty())
    }

    fn extract_attributes(&self, page: &dyn PageQuery, extractor: &Extractor) -> Attributes {
        attributes_from_table(&page.find_table(self.outline_rows), extractor)
    }

    fn detail_url(&self, page: &dyn PageQuery) -> Option<String> {
        self.substitute(&page.current_url())
    }

    fn course_links(&self, _page: &dyn PageQuery) -> Vec<Link> {
        Vec::new()
    }

    fn extract_contacts(&self, page: &dyn PageQuery, extractor: &Extractor) -> Contacts {
        extractor.contacts(&contact_text(page, self.contact_block))
    }

    fn next_page(&self, page: &dyn PageQuery) -> NextPage {
        detect_next(page, self.next_control)
    }
}
