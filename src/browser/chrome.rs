use crate::browser::{resolve, Browser, Link, PageQuery};
use crate::error::CrawlError;
use headless_chrome::{Element, LaunchOptions, Tab};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

fn browser_err(e: impl std::fmt::Display) -> CrawlError {
    CrawlError::Browser(e.to_string())
}

/// Locally launched Chrome; every surface is a new tab.
pub struct ChromeBrowser {
    browser: headless_chrome::Browser,
}

impl ChromeBrowser {
    pub fn launch(headless: bool, chrome_path: Option<PathBuf>) -> Result<Self, CrawlError> {
        let options = LaunchOptions::default_builder()
            .headless(headless)
            .path(chrome_path)
            .idle_browser_timeout(Duration::from_secs(600))
            .build()
            .map_err(browser_err)?;
        let browser = headless_chrome::Browser::new(options).map_err(browser_err)?;
        info!("Chrome launched (headless: {}).", headless);
        Ok(ChromeBrowser { browser })
    }
}

impl Browser for ChromeBrowser {
    fn open_page(&self) -> Result<Box<dyn PageQuery>, CrawlError> {
        let tab = self.browser.new_tab().map_err(browser_err)?;
        tab.set_default_timeout(NAVIGATION_TIMEOUT);
        Ok(Box::new(ChromePage { tab }))
    }
}

pub struct ChromePage {
    tab: Arc<Tab>,
}

impl ChromePage {
    fn elements(&self, selector: &str) -> Vec<Element<'_>> {
        // headless_chrome reports "no match" as an error.
        self.tab.find_elements(selector).unwrap_or_default()
    }
}

fn inner_text(el: &Element<'_>) -> String {
    el.get_inner_text().map(|t| t.trim().to_string()).unwrap_or_default()
}

fn child_text(el: &Element<'_>, selector: &str) -> String {
    el.find_element(selector)
        .map(|c| inner_text(&c))
        .unwrap_or_default()
}

impl PageQuery for ChromePage {
    fn goto(&self, url: &str) -> Result<(), CrawlError> {
        self.tab
            .navigate_to(url)
            .and_then(|t| t.wait_until_navigated())
            .map_err(|e| CrawlError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    fn current_url(&self) -> String {
        self.tab.get_url()
    }

    fn find_links(&self, selector: &str) -> Vec<Link> {
        let base = self.current_url();
        self.elements(selector)
            .iter()
            .filter_map(|el| {
                let href = el.get_attribute_value("href").ok().flatten()?;
                Some(Link {
                    text: inner_text(el),
                    href: resolve(&base, &href),
                })
            })
            .collect()
    }

    fn find_text(&self, selector: &str) -> Option<String> {
        self.tab
            .find_element(selector)
            .ok()
            .map(|el| inner_text(&el))
    }

    fn find_texts(&self, selector: &str) -> Vec<String> {
        self.elements(selector).iter().map(inner_text).collect()
    }

    fn find_table(&self, row_selector: &str) -> Vec<(String, String)> {
        self.elements(row_selector)
            .iter()
            .map(|row| (child_text(row, "th"), child_text(row, "td")))
            .filter(|(k, v)| !k.is_empty() || !v.is_empty())
            .collect()
    }

    fn attribute(&self, selector: &str, name: &str) -> Option<String> {
        self.tab
            .find_element(selector)
            .ok()
            .and_then(|el| el.get_attribute_value(name).ok().flatten())
    }

    fn wait_for(&self, selector: &str, timeout: Duration) -> bool {
        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .is_ok()
    }

    fn click(&self, selector: &str) -> Result<(), CrawlError> {
        let url = self.current_url();
        let nav_err = |e: &dyn std::fmt::Display| CrawlError::Navigation {
            url: url.clone(),
            reason: e.to_string(),
        };
        let el = self.tab.find_element(selector).map_err(|e| nav_err(&e))?;
        el.click().map_err(|e| nav_err(&e))?;
        self.tab.wait_until_navigated().map_err(|e| nav_err(&e))?;
        Ok(())
    }

    fn close(&self) {
        if let Err(e) = self.tab.close(true) {
            warn!("Failed to close tab: {}", e);
        }
    }
}
