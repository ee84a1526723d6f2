#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/kessan/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! # Example
//!
//! ```no_run
//! use kessan_core::{DocId, FilingSource, RetryPolicy};
//! use kessan_edinet::{EdinetConfig, EdinetProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = EdinetProvider::new(EdinetConfig::from_env()?)?;
//!
//!     let date = chrono::NaiveDate::from_ymd_opt(2024, 6, 25).unwrap();
//!     for doc in provider.list_documents(date).await? {
//!         println!("{} {:?}", doc.doc_id, doc.filer_name);
//!     }
//!
//!     let table = provider
//!         .fetch_archive(&DocId::new("S100ABCD"), &RetryPolicy::default())
//!         .await?;
//!     println!("{} rows", table.len());
//!     Ok(())
//! }
//! ```

mod archive;

use async_trait::async_trait;
use chrono::NaiveDate;
use kessan_core::{DocId, DocumentMeta, FilingSource, KessanError, RawTable, Result, RetryPolicy};
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

/// EDINET API v2 base URL
pub const EDINET_BASE_URL: &str = "https://disclosure.edinet-fsa.go.jp/api/v2";

/// Environment variable holding the subscription key
pub const API_KEY_ENV: &str = "EDINET_API_KEY";

/// Default spacing between two requests
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(5);

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Document-list type returning full metadata
const LIST_TYPE_METADATA: &str = "2";

/// Download type returning the XBRL-to-CSV archive
const DOWNLOAD_TYPE_CSV: &str = "5";

/// Rate limiter spacing out requests to the disclosure API
#[derive(Debug)]
struct RateLimiter {
    last_request: Option<Instant>,
    min_interval: Duration,
}

impl RateLimiter {
    const fn new(min_interval: Duration) -> Self {
        Self {
            last_request: None,
            min_interval,
        }
    }

    async fn wait(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}

/// Connection settings for [`EdinetProvider`].
#[derive(Clone, Debug)]
pub struct EdinetConfig {
    /// Subscription key sent with every request.
    pub api_key: String,
    /// API base URL, without a trailing slash.
    pub base_url: String,
    /// Minimum spacing between two requests.
    pub min_interval: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry policy for document-list requests.
    pub retry: RetryPolicy,
}

impl Default for EdinetConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: EDINET_BASE_URL.to_string(),
            min_interval: DEFAULT_MIN_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

impl EdinetConfig {
    /// Creates a configuration with the given subscription key and defaults otherwise.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Reads the subscription key from `EDINET_API_KEY`.
    ///
    /// # Errors
    /// Returns [`KessanError::InvalidParameter`] if the variable is unset or empty.
    pub fn from_env() -> Result<Self> {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(key.trim())),
            _ => Err(KessanError::InvalidParameter(format!(
                "{API_KEY_ENV} is not set"
            ))),
        }
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the minimum spacing between requests.
    #[must_use]
    pub const fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    /// Sets the document-list retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// EDINET disclosure API provider.
///
/// All requests share one rate limiter, so concurrent callers are serialized
/// to at most one request per `min_interval`.
#[derive(Debug)]
pub struct EdinetProvider {
    client: reqwest::Client,
    config: EdinetConfig,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl EdinetProvider {
    /// Creates a provider with a default HTTP client.
    ///
    /// # Errors
    /// Returns [`KessanError::InvalidParameter`] for an empty subscription key and
    /// [`KessanError::Network`] if the HTTP client cannot be built.
    pub fn new(config: EdinetConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| KessanError::Network(format!("Failed to build HTTP client: {e}")))?;
        Self::with_client(client, config)
    }

    /// Creates a provider with a pre-configured HTTP client.
    ///
    /// # Errors
    /// Returns [`KessanError::InvalidParameter`] for an empty subscription key.
    pub fn with_client(client: reqwest::Client, config: EdinetConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(KessanError::InvalidParameter(
                "Empty EDINET subscription key".to_string(),
            ));
        }
        Ok(Self {
            client,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(config.min_interval))),
            config,
        })
    }

    /// Returns the provider's configuration.
    #[must_use]
    pub const fn config(&self) -> &EdinetConfig {
        &self.config
    }

    /// One attempt at the document list for `date`.
    async fn request_documents(&self, date: NaiveDate) -> Result<Vec<DocumentMeta>> {
        self.rate_limiter.lock().await.wait().await;

        let url = format!("{}/documents.json", self.config.base_url);
        let date_param = date.format("%Y-%m-%d").to_string();
        debug!(%date, "Fetching EDINET document list");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("date", date_param.as_str()),
                ("type", LIST_TYPE_METADATA),
                ("Subscription-Key", self.config.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| KessanError::Network(e.to_string()))?;

        let status = response.status();
        let retry_after = retry_after(&response);
        let body = response
            .bytes()
            .await
            .map_err(|e| KessanError::Network(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ApiResponse>(&body)
                .ok()
                .and_then(|r| r.message())
                .unwrap_or_default();
            return Err(status_error(
                status.as_u16(),
                &message,
                retry_after,
                &format!("document list for {date}"),
            ));
        }

        let parsed: ApiResponse = serde_json::from_slice(&body)
            .map_err(|e| KessanError::Parse(format!("Failed to parse document list: {e}")))?;
        parsed.check(&format!("document list for {date}"))?;

        debug!(%date, count = parsed.results.len(), "Fetched EDINET document list");
        Ok(parsed.results)
    }

    /// One attempt at downloading the type-5 archive of `doc_id`.
    async fn download_archive(&self, doc_id: &DocId) -> Result<Vec<u8>> {
        self.rate_limiter.lock().await.wait().await;

        let url = format!("{}/documents/{}", self.config.base_url, doc_id);
        debug!(%doc_id, "Downloading EDINET archive");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("type", DOWNLOAD_TYPE_CSV),
                ("Subscription-Key", self.config.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| KessanError::Network(e.to_string()))?;

        let status = response.status();
        let retry_after = retry_after(&response);
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("json"));
        let body = response
            .bytes()
            .await
            .map_err(|e| KessanError::Network(e.to_string()))?;

        // Errors arrive as JSON, sometimes with a 200 status.
        if !status.is_success() || is_json {
            let parsed = serde_json::from_slice::<ApiResponse>(&body).ok();
            let what = format!("document {doc_id}");
            if let Some(parsed) = &parsed {
                parsed.check(&what)?;
            }
            let message = parsed.and_then(|r| r.message()).unwrap_or_default();
            let code = if status.is_success() {
                StatusCode::BAD_GATEWAY.as_u16()
            } else {
                status.as_u16()
            };
            return Err(status_error(code, &message, retry_after, &what));
        }

        Ok(body.to_vec())
    }
}

#[async_trait]
impl FilingSource for EdinetProvider {
    fn name(&self) -> &str {
        "EDINET"
    }

    async fn list_documents(&self, date: NaiveDate) -> Result<Vec<DocumentMeta>> {
        with_retry(&self.config.retry, "document list", || {
            self.request_documents(date)
        })
        .await
    }

    async fn fetch_archive(&self, doc_id: &DocId, retry: &RetryPolicy) -> Result<RawTable> {
        let bytes = with_retry(retry, doc_id.as_str(), || self.download_archive(doc_id)).await?;
        let (member, contents) = archive::select_export(&bytes)?;
        let table = archive::decode_export(&contents)?;
        info!(%doc_id, %member, rows = table.len(), "Decoded filing export");
        Ok(table)
    }
}

/// Runs `op` until it succeeds, fails permanently, or `policy` is exhausted.
///
/// Only [transient](KessanError::is_transient) errors are retried. A
/// rate-limit response waits for at least the server's `Retry-After`.
///
/// # Errors
/// Returns the last error once no further attempt is allowed.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && policy.should_retry(attempt) => {
                let mut delay = policy.delay_for(attempt);
                if let KessanError::RateLimited {
                    retry_after: Some(server_delay),
                } = &e
                {
                    delay = delay.max(*server_delay);
                }
                warn!(
                    what,
                    attempt,
                    max_attempts = policy.attempts(),
                    ?delay,
                    error = %e,
                    "Request failed, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Maps an HTTP (or embedded JSON) status code to an error.
fn status_error(
    code: u16,
    message: &str,
    retry_after: Option<Duration>,
    what: &str,
) -> KessanError {
    match code {
        429 => KessanError::RateLimited { retry_after },
        404 => KessanError::DocumentNotFound(what.to_string()),
        400..=499 => KessanError::InvalidParameter(format!("HTTP {code} for {what}: {message}")),
        _ => KessanError::Network(format!("HTTP {code} for {what}: {message}")),
    }
}

/// Parses a `Retry-After` header given in seconds.
fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

// =============================================================================
// API response types
// =============================================================================

/// Body of `documents.json` and of JSON error responses.
#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    metadata: Option<ApiMetadata>,
    #[serde(default)]
    results: Vec<DocumentMeta>,
    /// Gateway errors (e.g. an invalid subscription key) use this shape instead.
    #[serde(rename = "StatusCode", default)]
    status_code: Option<u16>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiMetadata {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ApiResponse {
    fn status(&self) -> Option<u16> {
        self.status_code.or_else(|| {
            self.metadata
                .as_ref()
                .and_then(|m| m.status.as_deref())
                .and_then(|s| s.trim().parse().ok())
        })
    }

    fn message(&self) -> Option<String> {
        self.message
            .clone()
            .or_else(|| self.metadata.as_ref().and_then(|m| m.message.clone()))
    }

    /// Fails if the body reports a non-200 status.
    fn check(&self, what: &str) -> Result<()> {
        match self.status() {
            Some(200) | None => Ok(()),
            Some(code) => Err(status_error(
                code,
                &self.message().unwrap_or_default(),
                None,
                what,
            )),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
