use crate::browser::{resolve, Browser, Link, PageQuery};
use crate::error::CrawlError;
use log::{debug, warn};
use rand::Rng;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, USER_AGENT};
use scraper::{ElementRef, Html, Selector};
use std::cell::RefCell;
use std::sync::Arc;
use std::time::Duration;

/// Source of raw HTML for a URL.
pub trait Fetch {
    fn fetch(&self, url: &str) -> Result<String, CrawlError>;
}

const USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0",
];

/// Plain HTTP fetcher for sites that render server-side.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, CrawlError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("ja,en-US;q=0.9,en;q=0.8"));

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers(headers)
            .cookie_store(true)
            .build()?;

        Ok(HttpFetcher { client })
    }

    fn random_user_agent(&self) -> &'static str {
        let mut rng = rand::thread_rng();
        USER_AGENTS[rng.gen_range(0..USER_AGENTS.len())]
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String, CrawlError> {
        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, self.random_user_agent())
            .send()?;

        let status = resp.status();
        if status.as_u16() == 403 || status.as_u16() == 429 {
            warn!("Blocked at {}: {}", url, status);
        }
        if !status.is_success() {
            return Err(CrawlError::Navigation {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            });
        }
        Ok(resp.text()?)
    }
}

/// Browser whose tabs are static documents from a [`Fetch`] source.
pub struct HtmlBrowser<F> {
    fetcher: Arc<F>,
}

impl<F: Fetch> HtmlBrowser<F> {
    pub fn new(fetcher: F) -> Self {
        HtmlBrowser {
            fetcher: Arc::new(fetcher),
        }
    }

    pub fn from_shared(fetcher: Arc<F>) -> Self {
        HtmlBrowser { fetcher }
    }
}

impl<F: Fetch + 'static> Browser for HtmlBrowser<F> {
    fn open_page(&self) -> Result<Box<dyn PageQuery>, CrawlError> {
        Ok(Box::new(HtmlPage {
            fetcher: self.fetcher.clone(),
            loaded: RefCell::new(None),
        }))
    }
}

struct Loaded {
    url: String,
    document: Html,
}

pub struct HtmlPage<F> {
    fetcher: Arc<F>,
    loaded: RefCell<Option<Loaded>>,
}

impl<F: Fetch> HtmlPage<F> {
    fn select<T>(&self, selector: &str, f: impl FnOnce(&str, Vec<ElementRef<'_>>) -> T) -> Option<T> {
        let sel = match Selector::parse(selector) {
            Ok(s) => s,
            Err(e) => {
                warn!("Bad selector '{}': {:?}", selector, e);
                return None;
            }
        };
        let loaded = self.loaded.borrow();
        let page = loaded.as_ref()?;
        let elements: Vec<ElementRef<'_>> = page.document.select(&sel).collect();
        Some(f(&page.url, elements))
    }
}

// Adjacent text nodes stay separated; callers collapse whitespace.
fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").trim().to_string()
}

fn child_text(el: &ElementRef<'_>, selector: &str) -> String {
    Selector::parse(selector)
        .ok()
        .and_then(|s| el.select(&s).next().map(|c| element_text(&c)))
        .unwrap_or_default()
}

impl<F: Fetch> PageQuery for HtmlPage<F> {
    fn goto(&self, url: &str) -> Result<(), CrawlError> {
        debug!("GET {}", url);
        let body = self.fetcher.fetch(url)?;
        *self.loaded.borrow_mut() = Some(Loaded {
            url: url.to_string(),
            document: Html::parse_document(&body),
        });
        Ok(())
    }

    fn current_url(&self) -> String {
        self.loaded
            .borrow()
            .as_ref()
            .map(|p| p.url.clone())
            .unwrap_or_default()
    }

    fn find_links(&self, selector: &str) -> Vec<Link> {
        self.select(selector, |base, els| {
            els.iter()
                .filter_map(|el| {
                    let href = el.value().attr("href")?;
                    Some(Link {
                        text: element_text(el),
                        href: resolve(base, href),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
    }

    fn find_text(&self, selector: &str) -> Option<String> {
        self.select(selector, |_, els| els.first().map(element_text))
            .flatten()
    }

    fn find_texts(&self, selector: &str) -> Vec<String> {
        self.select(selector, |_, els| els.iter().map(element_text).collect())
            .unwrap_or_default()
    }

    fn find_table(&self, row_selector: &str) -> Vec<(String, String)> {
        self.select(row_selector, |_, rows| {
            rows.iter()
                .map(|row| (child_text(row, "th"), child_text(row, "td")))
                .filter(|(k, v)| !k.is_empty() || !v.is_empty())
                .collect()
        })
        .unwrap_or_default()
    }

    fn attribute(&self, selector: &str, name: &str) -> Option<String> {
        self.select(selector, |_, els| {
            els.first()
                .and_then(|el| el.value().attr(name))
                .map(str::to_string)
        })
        .flatten()
    }

    fn wait_for(&self, selector: &str, _timeout: Duration) -> bool {
        // Static documents are complete once loaded.
        self.select(selector, |_, els| !els.is_empty())
            .unwrap_or(false)
    }

    fn click(&self, selector: &str) -> Result<(), CrawlError> {
        let href = self
            .select(selector, |base, els| {
                els.first()
                    .and_then(|el| el.value().attr("href"))
                    .map(|h| resolve(base, h))
            })
            .flatten();
        match href {
            Some(url) => self.goto(&url),
            None => Err(CrawlError::Navigation {
                url: self.current_url(),
                reason: format!("'{}' is not a followable link", selector),
            }),
        }
    }

    fn close(&self) {
        self.loaded.borrow_mut().take();
    }
}
