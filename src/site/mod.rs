pub mod outline;
pub mod programs;

use crate::browser::{clean_text, Link, PageQuery};
use crate::candidate::{Attributes, Contacts};
use crate::extractor::{size_bracket, Extractor};
use log::debug;
use serde::Deserialize;
use std::time::Duration;

pub use outline::OutlineSite;
pub use programs::ProgramSite;

pub const RESULTS_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SiteKind {
    #[default]
    Outline,
    Programs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    Absent,
    Disabled,
    /// Follow `href` when it is a real URL, otherwise click `selector`.
    Available {
        selector: String,
        href: Option<String>,
    },
}

pub trait SiteAdapter {
    /// Waits until the search-results list is rendered.
    fn wait_for_results(&self, page: &dyn PageQuery) -> bool;

    /// Company links on a search-results page, in page order.
    fn entity_links(&self, page: &dyn PageQuery) -> Vec<Link>;

    /// Company name as printed on its outline page.
    fn canonical_name(&self, page: &dyn PageQuery) -> Option<String>;

    fn extract_attributes(&self, page: &dyn PageQuery, extractor: &Extractor) -> Attributes;

    /// URL of the listing that carries contact details, derived from the
    /// loaded outline page.
    fn detail_url(&self, page: &dyn PageQuery) -> Option<String>;

    /// Course/program sub-pages on the loaded detail listing.
    fn course_links(&self, page: &dyn PageQuery) -> Vec<Link>;

    fn extract_contacts(&self, page: &dyn PageQuery, extractor: &Extractor) -> Contacts;

    fn next_page(&self, page: &dyn PageQuery) -> NextPage;
}

pub fn adapter_for(kind: SiteKind) -> Box<dyn SiteAdapter> {
    match kind {
        SiteKind::Outline => Box::new(OutlineSite::default()),
        SiteKind::Programs => Box::new(ProgramSite::default()),
    }
}

const INDUSTRY_LABELS: [&str; 2] = ["業種", "Industry"];
const HEAD_OFFICE_LABELS: [&str; 3] = ["本社所在地", "本社", "Head office"];
const EMPLOYEE_LABELS: [&str; 2] = ["従業員数", "Employees"];
const HIRES_LABELS: [&str; 2] = ["採用実績", "Recent hires"];

fn lookup<'a>(rows: &'a [(String, String)], labels: &[&str]) -> Option<&'a str> {
    rows.iter()
        .find(|(k, _)| labels.iter().any(|l| k.contains(l)))
        .map(|(_, v)| v.as_str())
        .filter(|v| !v.trim().is_empty())
}

/// Reads auxiliary attributes out of an outline table. Each attribute falls
/// back independently.
pub fn attributes_from_table(rows: &[(String, String)], extractor: &Extractor) -> Attributes {
    let mut attrs = Attributes::default();
    if rows.is_empty() {
        debug!("Outline table missing; attributes left as fallbacks.");
        return attrs;
    }

    attrs.detail_table = rows
        .iter()
        .map(|(k, v)| format!("{}: {}", clean_text(k), clean_text(v)))
        .collect::<Vec<_>>()
        .join(" | ");

    match lookup(rows, &INDUSTRY_LABELS) {
        Some(v) => attrs.industry = clean_text(v),
        None => debug!("No industry row."),
    }
    match lookup(rows, &HEAD_OFFICE_LABELS) {
        Some(v) => attrs.head_office = clean_text(v),
        None => debug!("No head office row."),
    }
    match lookup(rows, &EMPLOYEE_LABELS).and_then(|v| extractor.first_number(v)) {
        Some(n) => attrs.company_size = size_bracket(n).to_string(),
        None => debug!("No usable employee count."),
    }
    if let Some(avg) = lookup(rows, &HIRES_LABELS).and_then(|v| extractor.average_hires(v)) {
        attrs.avg_hires = format!("{:.1}", avg);
    }
    attrs
}

/// Contact block text when present, otherwise the whole page body.
pub fn contact_text(page: &dyn PageQuery, block_selector: &str) -> String {
    let blocks = page.find_texts(block_selector);
    if blocks.is_empty() {
        page.find_text("body").unwrap_or_default()
    } else {
        blocks.join("\n")
    }
}

/// Shared pager reading: absent, disabled (attribute, aria flag or class),
/// or available.
pub fn detect_next(page: &dyn PageQuery, selector: &str) -> NextPage {
    if !page.wait_for(selector, Duration::ZERO) {
        return NextPage::Absent;
    }
    let disabled = page.attribute(selector, "disabled").is_some()
        || page.attribute(selector, "aria-disabled").as_deref() == Some("true")
        || page
            .attribute(selector, "class")
            .map(|c| c.split_whitespace().any(|t| t == "disabled" || t == "is-disabled"))
            .unwrap_or(false);
    if disabled {
        return NextPage::Disabled;
    }
    let href = page
        .attribute(selector, "href")
        .filter(|h| !h.is_empty() && h != "#" && !h.starts_with("javascript:"))
        .map(|h| crate::browser::resolve(&page.current_url(), &h));
    NextPage::Available {
        selector: selector.to_string(),
        href,
    }
}
