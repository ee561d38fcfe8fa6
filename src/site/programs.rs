use crate::browser::{Link, PageQuery};
use crate::candidate::{Attributes, Contacts};
use crate::extractor::Extractor;
use crate::site::{attributes_from_table, contact_text, detect_next, NextPage, SiteAdapter, RESULTS_TIMEOUT};

/// Sites where a company page links to a separate "programs" view that
/// lists one or more programs (courses), each with its own contact block.
#[derive(Debug, Clone)]
pub struct ProgramSite {
    pub result_links: &'static str,
    pub company_name: &'static str,
    pub data_rows: &'static str,
    pub programs_tab: &'static str,
    pub program_links: &'static str,
    pub contact_block: &'static str,
    pub next_control: &'static str,
}

impl Default for ProgramSite {
    fn default() -> Self {
        ProgramSite {
            result_links: "div.corp-card a.corp-name",
            company_name: "h1.corp-title",
            data_rows: "table.corp-data tr",
            programs_tab: "nav.corp-tabs a.programs",
            program_links: "ul.program-list a.program-link",
            contact_block: ".program-contact",
            next_control: "a.pagination-next",
        }
    }
}

impl SiteAdapter for ProgramSite {
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
        attributes_from_table(&page.find_table(self.data_rows), extractor)
    }

    fn detail_url(&self, page: &dyn PageQuery) -> Option<String> {
        page.find_links(self.programs_tab)
            .into_iter()
            .map(|l| l.href)
            .find(|h| !h.is_empty())
    }

    fn course_links(&self, page: &dyn PageQuery) -> Vec<Link> {
        let mut links: Vec<Link> = Vec::new();
        for link in page.find_links(self.program_links) {
            if !links.iter().any(|l| l.href == link.href) {
                links.push(link);
            }
        }
        links
    }

    fn extract_contacts(&self, page: &dyn PageQuery, extractor: &Extractor) -> Contacts {
        extractor.contacts(&contact_text(page, self.contact_block))
    }

    fn next_page(&self, page: &dyn PageQuery) -> NextPage {
        detect_next(page, self.next_control)
    }
}
