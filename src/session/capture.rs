use crate::control::{AuthSignal, RunControl};
use crate::error::SessionError;
use crate::session::{Capture, OriginStorage, SessionState, StorageEntry, StoredCookie};
use chrono::Local;
use headless_chrome::{Browser, Tab};
use log::{info, warn};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use url::Url;

const POLL_INTERVAL: Duration = Duration::from_millis(500);
// The operator may sit on the sign-in page for a while with no CDP traffic.
const CAPTURE_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const LOCAL_STORAGE_JS: &str = "JSON.stringify(Object.entries(window.localStorage))";

#[derive(Deserialize)]
struct VersionInfo {
    #[serde(rename = "webSocketDebuggerUrl")]
    ws_url: String,
}

/// Kills the launched browser when capture ends, on every path.
struct LaunchedChrome {
    child: Child,
}

impl Drop for LaunchedChrome {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            warn!("Failed to stop capture browser: {}", e);
        }
        let _ = self.child.wait();
    }
}

/// Opens a visible Chrome with remote debugging, lets the operator sign
/// in, then snapshots the authenticated state.
pub struct ChromeCapture {
    pub chrome_path: PathBuf,
    pub debug_port: u16,
    pub profile_dir: PathBuf,
    pub target_url: String,
    pub timeout: Duration,
    pub signal: AuthSignal,
    pub control: RunControl,
}

impl ChromeCapture {
    fn launch(&self) -> Result<LaunchedChrome, SessionError> {
        let child = Command::new(&self.chrome_path)
            .arg(format!("--remote-debugging-port={}", self.debug_port))
            .arg(format!("--user-data-dir={}", self.profile_dir.display()))
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg(&self.target_url)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| SessionError::Launch(format!("{:?}: {}", self.chrome_path, e)))?;
        info!("Capture browser started (pid {}).", child.id());
        Ok(LaunchedChrome { child })
    }

    /// Polls `/json/version` until it answers or the deadline passes.
    fn wait_for_endpoint(&self) -> Result<String, SessionError> {
        let client = Client::builder().timeout(Duration::from_secs(2)).build()?;
        let endpoint = format!("http://127.0.0.1:{}/json/version", self.debug_port);
        let deadline = Instant::now() + self.timeout;

        while Instant::now() < deadline {
            if let Ok(resp) = client.get(&endpoint).send() {
                if let Ok(info) = resp.json::<VersionInfo>() {
                    return Ok(info.ws_url);
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
        Err(SessionError::LaunchTimeout {
            port: self.debug_port,
            secs: self.timeout.as_secs(),
        })
    }

    fn first_tab(browser: &Browser) -> Result<Arc<Tab>, SessionError> {
        let existing = browser
            .get_tabs()
            .lock()
            .ok()
            .and_then(|tabs| tabs.first().cloned());
        match existing {
            Some(tab) => Ok(tab),
            None => browser.new_tab().map_err(|e| SessionError::Launch(e.to_string())),
        }
    }

    fn snapshot(tab: &Tab) -> Result<SessionState, SessionError> {
        let cookies = tab
            .get_cookies()
            .map_err(|e| SessionError::Launch(format!("reading cookies: {}", e)))?
            .into_iter()
            .map(|c| StoredCookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                expires: c.expires,
                http_only: c.http_only,
                secure: c.secure,
            })
            .collect();

        let mut origins = Vec::new();
        if let Ok(origin) = Url::parse(&tab.get_url()).map(|u| u.origin().ascii_serialization()) {
            let entries = tab
                .evaluate(LOCAL_STORAGE_JS, false)
                .ok()
                .and_then(|obj| obj.value)
                .and_then(|v| v.as_str().map(str::to_string))
                .and_then(|s| serde_json::from_str::<Vec<(String, String)>>(&s).ok())
                .unwrap_or_else(|| {
                    warn!("Could not read localStorage for {}.", origin);
                    Vec::new()
                });
            origins.push(OriginStorage {
                origin,
                local_storage: entries
                    .into_iter()
                    .map(|(name, value)| StorageEntry { name, value })
                    .collect(),
            });
        }

        Ok(SessionState {
            cookies,
            origins,
            captured_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        })
    }
}

impl Capture for ChromeCapture {
    fn capture(&self) -> Result<SessionState, SessionError> {
        let _chrome = self.launch()?;
        let ws_url = self.wait_for_endpoint()?;
        let browser = Browser::connect_with_timeout(ws_url, CAPTURE_IDLE_TIMEOUT)
            .map_err(|e| SessionError::Launch(e.to_string()))?;
        let tab = Self::first_tab(&browser)?;
        tab.navigate_to(&self.target_url)
            .map_err(|e| SessionError::Launch(format!("opening {}: {}", self.target_url, e)))?;

        info!("Sign in to the spreadsheet in the opened browser, then press Enter (or POST /api/session/ready).");
        if !self.signal.wait(&self.control) {
            return Err(SessionError::Aborted);
        }

        let state = Self::snapshot(&tab)?;
        info!("Captured {} cookies.", state.cookies.len());
        Ok(state)
    }
}
