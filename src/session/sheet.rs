use crate::error::SessionError;
use crate::session::{ProtectedFetch, SessionState};
use log::info;
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::cookie::Jar;
use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// A shared spreadsheet addressed by document id and optional sheet tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetUrl {
    pub origin: String,
    pub id: String,
    pub gid: Option<String>,
}

impl SheetUrl {
    /// Accepts `https://<host>/spreadsheets/d/<id>/...` with an optional
    /// `gid` in the query or fragment.
    pub fn parse(raw: &str) -> Result<Self, SessionError> {
        let bad = || SessionError::SheetUrl(raw.to_string());
        let url = Url::parse(raw.trim()).map_err(|_| bad())?;
        let id_re = Regex::new(r"/spreadsheets/d/([A-Za-z0-9_-]+)").expect("static pattern");
        let id = id_re
            .captures(url.path())
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(bad)?;

        let gid_re = Regex::new(r"(?:^|[&#?])gid=(\d+)").expect("static pattern");
        let gid = [url.query(), url.fragment()]
            .into_iter()
            .flatten()
            .find_map(|part| gid_re.captures(part).and_then(|c| c.get(1)))
            .map(|m| m.as_str().to_string());

        Ok(SheetUrl {
            origin: url.origin().ascii_serialization(),
            id,
            gid,
        })
    }

    pub fn edit_url(&self) -> String {
        format!("{}/spreadsheets/d/{}/edit", self.origin, self.id)
    }

    pub fn export_url(&self) -> String {
        let mut url = format!("{}/spreadsheets/d/{}/export?format=csv", self.origin, self.id);
        if let Some(gid) = &self.gid {
            url.push_str("&gid=");
            url.push_str(gid);
        }
        url
    }
}

/// Downloads the sheet as CSV using the session's cookies.
pub struct SheetFetcher {
    sheet: SheetUrl,
    timeout: Duration,
}

impl SheetFetcher {
    pub fn new(sheet: SheetUrl) -> Self {
        SheetFetcher {
            sheet,
            timeout: Duration::from_secs(30),
        }
    }

    fn jar_for(session: &SessionState) -> Jar {
        let jar = Jar::default();
        for c in &session.cookies {
            let host = c.domain.trim_start_matches('.');
            let Ok(url) = Url::parse(&format!("https://{}/", host)) else {
                continue;
            };
            let mut cookie = format!("{}={}; Domain={}; Path={}", c.name, c.value, c.domain, c.path);
            if c.secure {
                cookie.push_str("; Secure");
            }
            jar.add_cookie_str(&cookie, &url);
        }
        jar
    }
}

impl ProtectedFetch for SheetFetcher {
    fn fetch(&self, session: &SessionState) -> Result<String, SessionError> {
        let client = Client::builder()
            .timeout(self.timeout)
            .cookie_provider(Arc::new(Self::jar_for(session)))
            .build()?;

        let url = self.sheet.export_url();
        info!("Fetching spreadsheet export {}", url);
        let resp = client.get(&url).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SessionError::Rejected(format!("HTTP {}", status)));
        }
        let is_html = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("text/html"))
            .unwrap_or(false);
        if is_html {
            // Unauthenticated exports are redirected to a sign-in page.
            return Err(SessionError::Rejected("received a sign-in page instead of CSV".into()));
        }
        Ok(resp.text()?)
    }
}
