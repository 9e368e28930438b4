use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::DownloadOutcome;

/// Raw shape of the `/download` response. Field presence varies across
/// backend versions, so everything is optional here; `into_outcome`
/// normalizes it into the strict type the rest of the app uses.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawDownloadResponse {
    #[serde(default)]
    pub success: bool,
    pub title: Option<String>,
    pub filename: Option<String>,
    pub url: Option<String>,
    pub download_url: Option<String>,
    pub redirect_url: Option<String>,
    pub redirect: Option<bool>,
    pub platform: Option<String>,
    pub error: Option<String>,
}

impl RawDownloadResponse {
    pub fn into_outcome(self) -> DownloadOutcome {
        // Older backends use `url`, newer ones `download_url`; a
        // `redirect_url` on its own means "open this page" rather than
        // "fetch these bytes".
        let (media_url, redirect) = if let Some(direct) = self.download_url.or(self.url) {
            (Some(direct), self.redirect.unwrap_or(false))
        } else if let Some(page) = self.redirect_url {
            (Some(page), true)
        } else {
            (None, false)
        };

        DownloadOutcome {
            title: self.title,
            filename: self.filename,
            media_url,
            redirect,
            platform: self.platform,
        }
    }
}

/// One CORS relay in the fallback chain. The relay forwards the request to
/// the target URL passed as a percent-encoded query parameter.
#[derive(Debug, Clone)]
pub struct Relay {
    pub name: &'static str,
    pub prefix: String,
}

impl Relay {
    pub fn wrap(&self, target: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
        format!("{}{}", self.prefix, encoded)
    }
}

/// Configuration for the backend client.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub relays: Vec<Relay>,
    pub timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://python22.pythonanywhere.com".to_string(),
            relays: vec![
                Relay {
                    name: "allorigins",
                    prefix: "https://api.allorigins.win/get?url=".to_string(),
                },
                Relay {
                    name: "corsproxy",
                    prefix: "https://corsproxy.io/?".to_string(),
                },
            ],
            timeout: Duration::from_secs(30),
        }
    }
}
