use std::path::PathBuf;
use thiserror::Error;

/// Startup failures. Any of these ends the process with a non-zero exit.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("config file is not valid JSON or misses a required field: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("pattern `{field}` does not compile: {source}")]
    Pattern {
        field: &'static str,
        source: regex::Error,
    },
}

/// Failures while driving the browser or writing the ledger.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("browser error: {0}")]
    Browser(String),
    #[error("no page loaded yet")]
    NoPage,
    #[error("ledger I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ledger CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failures on the spreadsheet session path.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("not a spreadsheet URL: {0}")]
    SheetUrl(String),
    #[error("could not launch browser: {0}")]
    Launch(String),
    #[error("browser debug endpoint on port {port} not ready after {secs}s")]
    LaunchTimeout { port: u16, secs: u64 },
    #[error("spreadsheet request rejected: {0}")]
    Rejected(String),
    #[error("capture aborted before the operator confirmed authentication")]
    Aborted,
    #[error("session file I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("session file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
