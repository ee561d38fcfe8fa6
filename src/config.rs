use crate::error::ConfigError;
use crate::extractor::Extractor;
use crate::identity::DEFAULT_PROMO_MARKER;
use crate::session::SheetUrl;
use crate::site::SiteKind;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Chrome,
    Http,
}

/// Crawl configuration, read from a JSON file. `startUrl` and `startPage`
/// are required; every optional feature is off when its field is absent.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    pub start_url: String,
    pub start_page: usize,
    #[serde(default)]
    pub site: SiteKind,
    pub max_inserts: Option<usize>,
    pub spreadsheet_url: Option<String>,
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
    pub relay_url: Option<String>,
    pub relay_token: Option<String>,
    #[serde(default = "default_relay_timeout")]
    pub relay_timeout_secs: u64,
    #[serde(default)]
    pub identity_column: usize,
    #[serde(default = "default_promo_marker")]
    pub promo_marker: String,
    pub phone_pattern: Option<String>,
    pub email_pattern: Option<String>,
    #[serde(default = "default_page_delay")]
    pub page_delay_ms: u64,
    #[serde(default = "default_entity_delay")]
    pub entity_delay_ms: u64,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_true")]
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    #[serde(default = "default_debug_port")]
    pub debug_port: u16,
    #[serde(default = "default_profile_dir")]
    pub chrome_profile_dir: PathBuf,
    #[serde(default = "default_session_path")]
    pub session_path: PathBuf,
    #[serde(default = "default_capture_timeout")]
    pub capture_timeout_secs: u64,
    pub control_port: Option<u16>,
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("companies.csv")
}
fn default_relay_timeout() -> u64 {
    10
}
fn default_promo_marker() -> String {
    DEFAULT_PROMO_MARKER.to_string()
}
fn default_page_delay() -> u64 {
    3000
}
fn default_entity_delay() -> u64 {
    1000
}
fn default_true() -> bool {
    true
}
fn default_debug_port() -> u16 {
    9222
}
fn default_profile_dir() -> PathBuf {
    PathBuf::from(".capture-profile")
}
fn default_session_path() -> PathBuf {
    PathBuf::from("session.json")
}
fn default_capture_timeout() -> u64 {
    30
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parses only; call [`validate`](Self::validate) once overrides are applied.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(self.start_url.trim()).map_err(|e| ConfigError::Invalid {
            field: "startUrl",
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                field: "startUrl",
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        if self.start_page == 0 {
            return Err(ConfigError::Invalid {
                field: "startPage",
                reason: "pages are numbered from 1".into(),
            });
        }
        if self.max_inserts == Some(0) {
            return Err(ConfigError::Invalid {
                field: "maxInserts",
                reason: "must be at least 1 when set".into(),
            });
        }
        if let Some(relay) = self.relay_url() {
            Url::parse(relay).map_err(|e| ConfigError::Invalid {
                field: "relayUrl",
                reason: e.to_string(),
            })?;
        }
        self.extractor()?;
        self.sheet()?;
        Ok(())
    }

    pub fn extractor(&self) -> Result<Extractor, ConfigError> {
        Extractor::with_patterns(self.phone_pattern.as_deref(), self.email_pattern.as_deref())
    }

    /// Spreadsheet sync is on only when a URL is configured.
    pub fn sheet(&self) -> Result<Option<SheetUrl>, ConfigError> {
        match non_empty(&self.spreadsheet_url) {
            None => Ok(None),
            Some(raw) => SheetUrl::parse(raw).map(Some).map_err(|e| ConfigError::Invalid {
                field: "spreadsheetUrl",
                reason: e.to_string(),
            }),
        }
    }

    pub fn relay_url(&self) -> Option<&str> {
        non_empty(&self.relay_url)
    }

    pub fn relay_token(&self) -> Option<&str> {
        non_empty(&self.relay_token)
    }

    pub fn relay_timeout(&self) -> Duration {
        Duration::from_secs(self.relay_timeout_secs)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_secs(self.capture_timeout_secs)
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
