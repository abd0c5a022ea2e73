//! Data models shared by the fetchers, the manager, and the exporters.
//!
//! - [`UnifiedRecord`]: one scraped item, normalized across all sources
//! - [`SessionResult`]: the aggregate outcome of one multi-source scrape
//! - [`ValidationReport`]: the four-stage health check of one source
//!
//! Every model derives `Serialize` so the export layer can write it as-is.

use crate::error::SourceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use url::Url;

/// The person or account that published a record or comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub username: String,
    pub profile_url: Option<Url>,
    pub karma: Option<i64>,
}

impl Author {
    pub fn named(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            profile_url: None,
            karma: None,
        }
    }
}

/// A comment attached to a record. Replies nest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author: Author,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub score: Option<i64>,
    pub parent_id: Option<String>,
    #[serde(default)]
    pub replies: Vec<Comment>,
}

/// The common schema every source converges to.
///
/// `id` is unique within `source`; `url` is always absolute because it is a
/// parsed [`Url`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedRecord {
    /// Identifier, unique within its source.
    pub id: String,
    pub title: String,
    /// Canonical URL of the item (external link or article page).
    pub url: Url,
    /// Body text or summary, when the source provides one.
    pub content: Option<String>,
    pub author: Option<Author>,
    pub comments: Option<Vec<Comment>>,
    /// Registered name of the source that produced this record.
    pub source: String,
    /// When this process retrieved the record.
    pub retrieved_at: DateTime<Utc>,
    /// When the source says the item was published.
    pub timestamp: Option<DateTime<Utc>>,
    pub score: Option<i64>,
    pub comments_count: u32,
    pub tags: Vec<String>,
    /// Discussion or listing page on the source site itself.
    pub source_url: Option<Url>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl UnifiedRecord {
    /// Create a record with the required fields; everything else starts empty
    /// and `retrieved_at` is set to now.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        url: Url,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url,
            content: None,
            author: None,
            comments: None,
            source: source.into(),
            retrieved_at: Utc::now(),
            timestamp: None,
            score: None,
            comments_count: 0,
            tags: Vec::new(),
            source_url: None,
            metadata: BTreeMap::new(),
        }
    }
}

/// Requested vs retrieved counts and wall time for one source in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCounts {
    pub requested: usize,
    pub retrieved: usize,
    pub duration_ms: u64,
}

/// How a source fared in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Succeeded,
    Partial,
    Failed,
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceStatus::Succeeded => "succeeded",
            SourceStatus::Partial => "partial",
            SourceStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// The outcome of one `scrape` call.
///
/// Every requested source is a key of `records`, of `errors`, or of both
/// (partial success: some records followed by an error). `counts` has an
/// entry for every requested source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResult {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Wall time of the whole call.
    pub duration_ms: u64,
    pub records: BTreeMap<String, Vec<UnifiedRecord>>,
    pub errors: BTreeMap<String, SourceError>,
    pub counts: BTreeMap<String, SourceCounts>,
}

impl SessionResult {
    /// All source names that appear in this result, in name order.
    pub fn sources(&self) -> BTreeSet<&str> {
        self.records
            .keys()
            .chain(self.errors.keys())
            .map(String::as_str)
            .collect()
    }

    pub fn status(&self, source: &str) -> Option<SourceStatus> {
        let has_records = self.records.contains_key(source);
        let has_error = self.errors.contains_key(source);
        match (has_records, has_error) {
            (true, false) => Some(SourceStatus::Succeeded),
            (true, true) => Some(SourceStatus::Partial),
            (false, true) => Some(SourceStatus::Failed),
            (false, false) => None,
        }
    }

    pub fn records_for(&self, source: &str) -> &[UnifiedRecord] {
        self.records.get(source).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total_retrieved(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

/// The four validation stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Connectivity,
    DataFetch,
    Structure,
    SiteSpecific,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Connectivity,
        Stage::DataFetch,
        Stage::Structure,
        Stage::SiteSpecific,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Connectivity => "connectivity",
            Stage::DataFetch => "data_fetch",
            Stage::Structure => "structure",
            Stage::SiteSpecific => "site_specific",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pass,
    Fail,
    Skipped,
}

/// What a single stage check reports, before timing is attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub passed: bool,
    pub message: Option<String>,
}

impl StageOutcome {
    pub fn pass() -> Self {
        Self {
            passed: true,
            message: None,
        }
    }

    pub fn pass_with(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: Some(message.into()),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: Some(message.into()),
        }
    }
}

/// One row of a [`ValidationReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: Stage,
    pub status: StageStatus,
    pub duration_ms: u64,
    pub message: Option<String>,
}

/// The structured health report for one source.
///
/// Always holds exactly four stage results, in [`Stage::ALL`] order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub source: String,
    pub validated_at: DateTime<Utc>,
    pub stages: Vec<StageResult>,
    pub passed: bool,
    pub duration_ms: u64,
}

impl ValidationReport {
    pub fn stage(&self, stage: Stage) -> Option<&StageResult> {
        self.stages.iter().find(|r| r.stage == stage)
    }

    /// The first stage that failed, if any.
    pub fn first_failure(&self) -> Option<&StageResult> {
        self.stages.iter().find(|r| r.status == StageStatus::Fail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceErrorKind;

    fn record(id: &str) -> UnifiedRecord {
        UnifiedRecord::new(
            id,
            "Title",
            Url::parse("https://example.com/a").unwrap(),
            "hackernews",
        )
    }

    fn session() -> SessionResult {
        SessionResult {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            duration_ms: 0,
            records: BTreeMap::new(),
            errors: BTreeMap::new(),
            counts: BTreeMap::new(),
        }
    }

    #[test]
    fn test_unified_record_defaults() {
        let r = record("1");
        assert_eq!(r.id, "1");
        assert_eq!(r.source, "hackernews");
        assert!(r.author.is_none());
        assert!(r.comments.is_none());
        assert!(r.metadata.is_empty());
        assert_eq!(r.comments_count, 0);
    }

    #[test]
    fn test_unified_record_serialization() {
        let mut r = record("42");
        r.author = Some(Author::named("pg"));
        r.metadata
            .insert("type".to_string(), serde_json::json!("story"));

        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("\"id\":\"42\""));
        assert!(json.contains("https://example.com/a"));
        assert!(json.contains("\"username\":\"pg\""));

        let back: UnifiedRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn test_session_status_classification() {
        let mut s = session();
        s.records.insert("ok".into(), vec![record("1")]);
        s.records.insert("partial".into(), vec![record("2")]);
        s.errors.insert(
            "partial".into(),
            SourceError {
                kind: SourceErrorKind::Fetch,
                message: "third page failed".into(),
            },
        );
        s.errors.insert(
            "down".into(),
            SourceError {
                kind: SourceErrorKind::Fetch,
                message: "503".into(),
            },
        );

        assert_eq!(s.status("ok"), Some(SourceStatus::Succeeded));
        assert_eq!(s.status("partial"), Some(SourceStatus::Partial));
        assert_eq!(s.status("down"), Some(SourceStatus::Failed));
        assert_eq!(s.status("missing"), None);
        assert_eq!(s.total_retrieved(), 2);
        assert_eq!(s.error_count(), 2);
        assert_eq!(
            s.sources().into_iter().collect::<Vec<_>>(),
            vec!["down", "ok", "partial"]
        );
        assert!(s.records_for("down").is_empty());
    }

    #[test]
    fn test_stage_order_and_names() {
        assert_eq!(Stage::ALL[0], Stage::Connectivity);
        assert_eq!(Stage::ALL[3], Stage::SiteSpecific);
        assert_eq!(Stage::DataFetch.to_string(), "data_fetch");
        let json = serde_json::to_string(&StageStatus::Skipped).unwrap();
        assert_eq!(json, "\"skipped\"");
    }
}
