//! Scoped network sessions.
//!
//! A [`Session`] wraps one `reqwest::Client` configured for a single source
//! (base endpoint, timeout, custom headers) together with that source's
//! [`RateLimiter`]. Fetchers receive a `&Session` and never build their own
//! client. Every request sent through the session first waits on the
//! limiter, so a fetcher that issues many requests is spaced per request,
//! not per fetch. The session is released when it is dropped, which covers
//! normal return, early `?` exits, and task cancellation alike.

use crate::error::{FetchError, TransportInitError};
use crate::rate_limit::RateLimiter;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "EventScraper/1.0 (Educational Purpose)";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport settings for one source.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// Extra request headers; a `user-agent` entry overrides the default.
    pub headers: BTreeMap<String, String>,
}

impl TransportConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A network client bound to one source for the duration of one fetch or
/// validation.
#[derive(Debug)]
pub struct Session {
    source: String,
    base_url: Url,
    client: Client,
    limiter: Arc<RateLimiter>,
    opened_at: Instant,
}

impl Session {
    /// Open a session for `source`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportInitError`] if the base URL is not an absolute
    /// http(s) URL, a header is invalid, or the client cannot be built.
    pub fn open(
        source: &str,
        transport: &TransportConfig,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self, TransportInitError> {
        let base_url = Url::parse(&transport.base_url).map_err(|e| {
            TransportInitError::new(source, format!("malformed base URL {:?}: {e}", transport.base_url))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(TransportInitError::new(
                source,
                format!("unsupported scheme {:?} in base URL", base_url.scheme()),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        for (name, value) in &transport.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                TransportInitError::new(source, format!("invalid header name {name:?}: {e}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                TransportInitError::new(source, format!("invalid value for header {name}: {e}"))
            })?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .timeout(transport.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| TransportInitError::new(source, format!("client build failed: {e}")))?;

        debug!(%source, base_url = %base_url, "Session opened");
        Ok(Self {
            source: source.to_string(),
            base_url,
            client,
            limiter,
            opened_at: Instant::now(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Wait for this source's rate limiter.
    ///
    /// [`get_text`](Self::get_text) and the helpers built on it already do
    /// this. Call it directly only for outbound work that bypasses them.
    pub async fn throttle(&self) {
        self.limiter.acquire().await;
    }

    /// Resolve `path` against the base URL.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] if `path` cannot be joined onto the base URL.
    pub fn resolve(&self, path: &str) -> Result<Url, FetchError> {
        self.base_url
            .join(path)
            .map_err(|e| FetchError::new(format!("cannot resolve {path:?} against {}: {e}", self.base_url)))
    }

    /// GET `url` and return the body as text.
    ///
    /// Waits on the source's rate limiter before the request is sent.
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL to request
    ///
    /// # Returns
    ///
    /// The decoded response body.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] on connection failure, timeout, a non-2xx
    /// status, or an undecodable body.
    #[instrument(level = "debug", skip(self), fields(source = %self.source))]
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        self.limiter.acquire().await;
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::new(format!("HTTP {status} for {url}")));
        }
        Ok(resp.text().await?)
    }

    /// GET `url` and decode the body as JSON into `T`.
    ///
    /// # Errors
    ///
    /// Everything [`get_text`](Self::get_text) reports, plus a body that is
    /// not valid JSON for `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body)
            .map_err(|e| FetchError::new(format!("malformed JSON from {url}: {e}")))
    }

    /// Minimal reachability check against the base endpoint.
    ///
    /// # Returns
    ///
    /// The length in bytes of the base page body.
    pub async fn probe(&self) -> Result<usize, FetchError> {
        let body = self.get_text(self.base_url.as_str()).await?;
        Ok(body.len())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        debug!(
            source = %self.source,
            open_ms = self.opened_at.elapsed().as_millis() as u64,
            "Session released"
        );
    }
}
