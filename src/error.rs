//! Error types for orchestration, transport setup, and fetching.
//!
//! Errors fall into two groups:
//!
//! - **Call-level** ([`ScrapeError`]): returned from [`ScraperManager`] calls
//!   before any per-source work starts (unknown source, duplicate
//!   registration, invalid limit).
//! - **Per-source** ([`TransportInitError`], [`FetchError`], timeouts and
//!   panics): caught at the task boundary and recorded as a [`SourceError`]
//!   inside the session result or validation report.
//!
//! [`ScraperManager`]: crate::manager::ScraperManager

use crate::models::UnifiedRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors that abort a whole manager call.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The caller asked for a source that is not registered (or is disabled).
    #[error("unknown source: {0}")]
    UnknownSource(String),
    /// A descriptor with the same name is already registered.
    #[error("source already registered: {0}")]
    DuplicateSource(String),
    /// The requested record limit was zero.
    #[error("limit must be a positive integer")]
    InvalidLimit,
}

/// A `Result` alias for manager calls.
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// The source's transport configuration could not be turned into a client.
///
/// Never retried; the owning task records it and stops.
#[derive(Debug, Clone, Error)]
#[error("transport init failed for {source_name}: {reason}")]
pub struct TransportInitError {
    pub source_name: String,
    pub reason: String,
}

impl TransportInitError {
    pub fn new(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }
}

/// An unrecoverable fetch failure, optionally carrying the records that were
/// retrieved before the failure.
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct FetchError {
    pub reason: String,
    pub partial_results: Vec<UnifiedRecord>,
}

impl FetchError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            partial_results: Vec::new(),
        }
    }

    /// Attach records retrieved before the failure.
    pub fn with_partial(mut self, records: Vec<UnifiedRecord>) -> Self {
        self.partial_results = records;
        self
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::new(format!("request failed: {e}"))
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::new(format!("malformed JSON payload: {e}"))
    }
}

/// What went wrong for one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceErrorKind {
    TransportInit,
    Fetch,
    Timeout,
    Panicked,
}

impl fmt::Display for SourceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceErrorKind::TransportInit => "transport_init",
            SourceErrorKind::Fetch => "fetch",
            SourceErrorKind::Timeout => "timeout",
            SourceErrorKind::Panicked => "panicked",
        };
        f.write_str(s)
    }
}

/// A per-source failure as recorded in a [`SessionResult`](crate::models::SessionResult).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceError {
    pub kind: SourceErrorKind,
    pub message: String,
}

impl SourceError {
    pub fn timeout(after: Duration) -> Self {
        Self {
            kind: SourceErrorKind::Timeout,
            message: format!("deadline exceeded after {} ms", after.as_millis()),
        }
    }

    pub fn panicked(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Panicked,
            message: message.into(),
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl From<&TransportInitError> for SourceError {
    fn from(e: &TransportInitError) -> Self {
        Self {
            kind: SourceErrorKind::TransportInit,
            message: e.reason.clone(),
        }
    }
}

impl From<&FetchError> for SourceError {
    fn from(e: &FetchError) -> Self {
        Self {
            kind: SourceErrorKind::Fetch,
            message: e.reason.clone(),
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}
