//! Page queries over either a Chrome tab or a static `scraper` document.

pub mod chrome;
pub mod html;

use crate::error::CrawlError;
use std::time::Duration;
use url::Url;

pub use chrome::ChromeBrowser;
pub use html::{Fetch, HtmlBrowser, HttpFetcher};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub text: String,
    /// Absolute when the page URL allowed resolving it.
    pub href: String,
}

pub trait PageQuery {
    fn goto(&self, url: &str) -> Result<(), CrawlError>;

    fn current_url(&self) -> String;

    fn find_links(&self, selector: &str) -> Vec<Link>;

    /// Text of the first match.
    fn find_text(&self, selector: &str) -> Option<String>;

    /// Text of every match.
    fn find_texts(&self, selector: &str) -> Vec<String>;

    /// `(th, td)` text pairs for each row matched by `row_selector`.
    fn find_table(&self, row_selector: &str) -> Vec<(String, String)>;

    /// Attribute of the first match; `None` when the element or the
    /// attribute is absent.
    fn attribute(&self, selector: &str, name: &str) -> Option<String>;

    fn wait_for(&self, selector: &str, timeout: Duration) -> bool;

    /// Activates the first match and waits for the resulting navigation.
    fn click(&self, selector: &str) -> Result<(), CrawlError>;

    /// Releases the surface. Errors are logged, never returned.
    fn close(&self);
}

pub trait Browser {
    /// Opens a new browsing surface (a tab).
    fn open_page(&self) -> Result<Box<dyn PageQuery>, CrawlError>;
}

/// Resolves `href` against `base`; keeps `href` untouched if either does
/// not parse.
pub fn resolve(base: &str, href: &str) -> String {
    match Url::parse(base).and_then(|b| b.join(href)) {
        Ok(u) => u.to_string(),
        Err(_) => href.to_string(),
    }
}

/// Collapses inner whitespace of DOM text.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
