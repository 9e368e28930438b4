use futures::{Stream, TryStreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use super::models::{BackendConfig, RawDownloadResponse};
use crate::domain::DownloadOutcome;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("could not reach the backend: {0}")]
    Connectivity(String),

    #[error("unexpected response format: {0}")]
    UnexpectedFormat(String),

    #[error("{0}")]
    Backend(String),

    #[error("invalid backend URL: {0}")]
    InvalidUrl(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Clone)]
pub struct BackendClient {
    config: BackendConfig,
    http: Client,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Liveness probe against `/test`. Used at startup to report backend
    /// availability; never fails, just answers yes or no.
    pub async fn ping(&self) -> bool {
        let result = self
            .http
            .get(self.endpoint("test"))
            .timeout(self.config.timeout)
            .send()
            .await;

        match result {
            Ok(response) => response.status().is_success() && is_json(&response),
            Err(e) => {
                log::debug!("liveness probe failed: {}", e);
                false
            }
        }
    }

    /// POST the source URL to `/download` and normalize whatever comes back.
    /// A transport failure on the direct attempt walks the bounded relay
    /// chain once, in order; the first relay to answer wins.
    pub async fn request_download(&self, source_url: &str) -> Result<DownloadOutcome> {
        let endpoint = self.endpoint("download");
        let body = serde_json::json!({ "url": source_url });

        let direct = self
            .http
            .post(&endpoint)
            .json(&body)
            .timeout(self.config.timeout)
            .send()
            .await;

        match direct {
            Ok(response) => interpret_response(response).await,
            Err(e) => {
                log::warn!("direct request failed ({}), trying relays", e);
                self.request_via_relays(&endpoint, &body, e.to_string()).await
            }
        }
    }

    async fn request_via_relays(
        &self,
        endpoint: &str,
        body: &Value,
        mut last_failure: String,
    ) -> Result<DownloadOutcome> {
        for relay in &self.config.relays {
            let wrapped = relay.wrap(endpoint);
            log::info!("relay attempt via {}", relay.name);

            let attempt = self
                .http
                .post(&wrapped)
                .json(body)
                .timeout(self.config.timeout)
                .send()
                .await;

            match attempt {
                Ok(response) if response.status().is_success() => {
                    return interpret_response(response).await;
                }
                Ok(response) => {
                    last_failure = format!("relay {} answered {}", relay.name, response.status());
                }
                Err(e) => {
                    last_failure = format!("relay {} failed: {}", relay.name, e);
                }
            }
        }

        Err(ApiError::Connectivity(last_failure))
    }

    /// URL for fetching a prepared file from the backend, with the filename
    /// percent-encoded as a path segment.
    pub fn file_url(&self, filename: &str) -> Result<String> {
        let mut url =
            Url::parse(&self.config.base_url).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl("base URL cannot have segments".to_string()))?
            .pop_if_empty()
            .push("get_file")
            .push(filename);
        Ok(url.to_string())
    }

    /// Stream media bytes for the save-to-disk path.
    /// Returns (total_size, stream).
    pub async fn fetch_file_stream(
        &self,
        media_url: &str,
    ) -> Result<(Option<u64>, impl Stream<Item = Result<bytes::Bytes>>)> {
        let response = self
            .http
            .get(media_url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| ApiError::Backend(format!("media fetch failed: {}", e)))?;

        let total_size = response.content_length();
        let stream = response.bytes_stream().map_err(ApiError::Request);

        Ok((total_size, stream))
    }
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("json"))
        .unwrap_or(false)
}

/// Route a backend (or relayed) response into a normalized outcome. Non-JSON
/// bodies are error pages, not payloads; some relays wrap the real payload
/// in a `contents` envelope that has to come off first.
async fn interpret_response(response: Response) -> Result<DownloadOutcome> {
    let status = response.status();

    if !status.is_success() {
        let message = if is_json(&response) {
            response
                .json::<Value>()
                .await
                .ok()
                .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        } else {
            None
        };
        return Err(ApiError::Backend(
            message.unwrap_or_else(|| format!("server error {}", status.as_u16())),
        ));
    }

    if !is_json(&response) {
        return Err(ApiError::UnexpectedFormat(
            "expected JSON, got an error page".to_string(),
        ));
    }

    let text = response.text().await?;
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| ApiError::UnexpectedFormat(format!("undecodable body: {}", e)))?;
    let value = unwrap_envelope(value)?;

    let raw: RawDownloadResponse = serde_json::from_value(value)
        .map_err(|e| ApiError::UnexpectedFormat(format!("unrecognized shape: {}", e)))?;

    if !raw.success {
        return Err(ApiError::Backend(
            raw.error.unwrap_or_else(|| "Failed to download".to_string()),
        ));
    }

    Ok(raw.into_outcome())
}

fn unwrap_envelope(value: Value) -> Result<Value> {
    match value.get("contents").and_then(Value::as_str) {
        Some(contents) => serde_json::from_str(contents)
            .map_err(|e| ApiError::UnexpectedFormat(format!("undecodable envelope: {}", e))),
        None => Ok(value),
    }
}
