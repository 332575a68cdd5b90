//! HTTP client for the listing search endpoint, with retry.
//!
//! Requests that fail at the transport level or come back `429`/`5xx` are
//! retried up to [`MAX_RETRIES`] times with exponential backoff
//! (`base`, `2 * base`, `4 * base`). Other non-2xx statuses fail at once.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, REFERER, USER_AGENT};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

/// HTTP timeout for a single attempt.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Retries after the first attempt.
pub const MAX_RETRIES: u32 = 3;

/// Default first backoff delay.
pub const DEFAULT_RETRY_BASE: Duration = Duration::from_millis(800);

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Page the search UI lives on, relative to the site base.
const REFERER_PATH: &str = "/jyxx/002001/transactionInfo.html";

#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// The HTTP request itself failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint returned a non-2xx status code.
    #[error("Search endpoint returned HTTP {status}")]
    HttpStatus { status: u16 },

    /// The response body was not the expected JSON.
    #[error("Malformed search response: {0}")]
    Decode(String),

    #[error("Invalid harvest configuration: {0}")]
    Config(String),
}

/// Top-level search response. Missing parts decode as empty.
#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub result: Option<SearchResult>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub totalcount: u64,
    #[serde(default)]
    pub records: Option<Vec<Value>>,
}

impl SearchResponse {
    pub fn total(&self) -> u64 {
        self.result.as_ref().map_or(0, |r| r.totalcount)
    }

    pub fn into_records(self) -> Vec<Value> {
        self.result.and_then(|r| r.records).unwrap_or_default()
    }
}

/// Client bound to one search endpoint.
#[derive(Debug, Clone)]
pub struct SearchClient {
    client: reqwest::Client,
    endpoint: String,
    retry_base: Duration,
}

impl SearchClient {
    /// Build a client sending browser-like headers, with `link_base` as the
    /// referer origin.
    pub fn new(endpoint: impl Into<String>, link_base: &str) -> Result<Self, HarvestError> {
        let referer = format!("{}{REFERER_PATH}", link_base.trim_end_matches('/'));
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
        headers.insert(
            REFERER,
            HeaderValue::from_str(&referer)
                .map_err(|e| HarvestError::Config(format!("bad link base '{link_base}': {e}")))?,
        );

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            retry_base: DEFAULT_RETRY_BASE,
        })
    }

    /// Override the first backoff delay.
    pub fn with_retry_base(mut self, retry_base: Duration) -> Self {
        self.retry_base = retry_base;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST `body` as JSON and decode the search response, retrying
    /// transient failures.
    pub async fn post_json(&self, body: &Value) -> Result<SearchResponse, HarvestError> {
        let mut attempt = 0;
        loop {
            match self.try_post(body).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < MAX_RETRIES && is_transient(&e) => {
                    let delay = self.retry_base * 2u32.pow(attempt);
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        endpoint = %self.endpoint,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Search request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(endpoint = %self.endpoint, error = %e, "Search request failed");
                    return Err(e);
                }
            }
        }
    }

    async fn try_post(&self, body: &Value) -> Result<SearchResponse, HarvestError> {
        let response = self.client.post(&self.endpoint).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::HttpStatus {
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| HarvestError::Decode(e.to_string()))
    }
}

fn is_transient(err: &HarvestError) -> bool {
    match err {
        HarvestError::Request(_) => true,
        HarvestError::HttpStatus { status } => {
            *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
        }
        HarvestError::Decode(_) | HarvestError::Config(_) => false,
    }
}
