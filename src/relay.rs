use log::{info, warn};
use reqwest::blocking::Client;
use serde::Serialize;
use std::time::Duration;

pub const TOKEN_HEADER: &str = "X-Relay-Token";

#[derive(Serialize)]
struct RelayBody<'a> {
    row: &'a [String],
    token: &'a str,
}

/// Best-effort forwarding of each new ledger row to a remote spreadsheet
/// endpoint. Failures are logged and never affect the local ledger.
pub struct Relay {
    client: Client,
    url: String,
    token: String,
}

impl Relay {
    pub fn new(url: &str, token: Option<&str>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Relay {
            client,
            url: url.to_string(),
            token: token.unwrap_or_default().to_string(),
        })
    }

    /// Returns whether the endpoint acknowledged the row.
    pub fn send(&self, row: &[String]) -> bool {
        let body = RelayBody {
            row,
            token: &self.token,
        };
        let mut req = self.client.post(&self.url).json(&body);
        if !self.token.is_empty() {
            req = req.header(TOKEN_HEADER, &self.token);
        }

        match req.send() {
            Ok(resp) if resp.status().is_success() => {
                let text = resp.text().unwrap_or_default();
                if text.trim() == "OK" {
                    info!("Relayed '{}'.", row.first().map(String::as_str).unwrap_or(""));
                    true
                } else {
                    warn!("Relay answered without OK: {}", text.trim());
                    false
                }
            }
            Ok(resp) => {
                warn!("Relay failed with status {}", resp.status());
                false
            }
            Err(e) => {
                warn!("Relay request failed: {}", e);
                false
            }
        }
    }
}
