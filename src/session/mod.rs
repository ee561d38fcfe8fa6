//! Authenticated access to the shared spreadsheet: replay a saved session,
//! fall back to one interactive capture, then replay once more.

pub mod capture;
pub mod sheet;

use crate::error::SessionError;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use capture::ChromeCapture;
pub use sheet::{SheetFetcher, SheetUrl};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    /// Seconds since the epoch; negative for session cookies.
    pub expires: f64,
    pub http_only: bool,
    pub secure: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageEntry {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginStorage {
    pub origin: String,
    pub local_storage: Vec<StorageEntry>,
}

/// Snapshot of cookies and per-origin local storage. Read and written
/// wholesale; it is valid exactly as long as the remote side accepts it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub cookies: Vec<StoredCookie>,
    pub origins: Vec<OriginStorage>,
    #[serde(default)]
    pub captured_at: String,
}

/// Performs the real protected request with a given session.
pub trait ProtectedFetch {
    fn fetch(&self, session: &SessionState) -> Result<String, SessionError>;
}

/// Acquires a fresh session interactively.
pub trait Capture {
    fn capture(&self) -> Result<SessionState, SessionError>;
}

pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        SessionStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// A missing or unreadable file just means "no saved session".
    pub fn load(&self) -> Option<SessionState> {
        if !self.path.exists() {
            info!("No saved session at {:?}.", self.path);
            return None;
        }
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) => {
                warn!("Failed to read session file {:?}: {}", self.path, e);
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!("Session file {:?} is corrupt: {}. Ignoring it.", self.path, e);
                None
            }
        }
    }

    /// Replaces the file atomically (temp file + rename).
    pub fn save(&self, state: &SessionState) -> Result<(), SessionError> {
        let json = serde_json::to_string_pretty(state)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        info!("Session saved to {:?} ({} cookies).", self.path, state.cookies.len());
        Ok(())
    }
}

/// Replay, then at most one capture. The body of the successful request is
/// returned; a rejection after a fresh capture is fatal.
pub fn fetch_with_session<F, C>(store: &SessionStore, fetcher: &F, capturer: &C) -> Result<String, SessionError>
where
    F: ProtectedFetch + ?Sized,
    C: Capture + ?Sized,
{
    if let Some(saved) = store.load() {
        match fetcher.fetch(&saved) {
            Ok(body) => {
                info!("Saved session accepted.");
                return Ok(body);
            }
            Err(e) => warn!("Saved session failed ({}); capturing a new one.", e),
        }
    }

    let fresh = capturer.capture()?;
    store.save(&fresh)?;
    fetcher.fetch(&fresh)
}
