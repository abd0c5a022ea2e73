//! Merging per-source outcomes into one [`SessionResult`].

use crate::error::{FetchError, SourceError, TransportInitError};
use crate::models::{SessionResult, SourceCounts, UnifiedRecord};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// What one source task produced.
#[derive(Debug)]
pub enum FetchOutcome {
    Success(Vec<UnifiedRecord>),
    /// Some records were retrieved before the error.
    Partial {
        records: Vec<UnifiedRecord>,
        error: SourceError,
    },
    Failure(SourceError),
}

impl FetchOutcome {
    pub fn from_fetch(result: Result<Vec<UnifiedRecord>, FetchError>) -> Self {
        match result {
            Ok(records) => FetchOutcome::Success(records),
            Err(e) => {
                let error = SourceError::from(&e);
                if e.partial_results.is_empty() {
                    FetchOutcome::Failure(error)
                } else {
                    FetchOutcome::Partial {
                        records: e.partial_results,
                        error,
                    }
                }
            }
        }
    }

    pub fn transport(e: &TransportInitError) -> Self {
        FetchOutcome::Failure(SourceError::from(e))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }
}

/// Collects outcomes as tasks finish. Never fails.
#[derive(Debug)]
pub struct Aggregator {
    started_at: DateTime<Utc>,
    clock: Instant,
    limit: usize,
    records: BTreeMap<String, Vec<UnifiedRecord>>,
    errors: BTreeMap<String, SourceError>,
    counts: BTreeMap<String, SourceCounts>,
}

impl Aggregator {
    /// Start a session that requested `limit` records per source.
    pub fn new(limit: usize) -> Self {
        Self {
            started_at: Utc::now(),
            clock: Instant::now(),
            limit,
            records: BTreeMap::new(),
            errors: BTreeMap::new(),
            counts: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, source: &str, outcome: FetchOutcome, elapsed: Duration) {
        let (records, error) = match outcome {
            FetchOutcome::Success(records) => (Some(records), None),
            FetchOutcome::Partial { records, error } => (Some(records), Some(error)),
            FetchOutcome::Failure(error) => (None, Some(error)),
        };

        let mut retrieved = 0;
        if let Some(records) = records {
            let records = self.normalize(source, records);
            retrieved = records.len();
            self.records.insert(source.to_string(), records);
        }
        if let Some(error) = error {
            warn!(%source, kind = %error.kind, error = %error.message, retrieved, "Source failed");
            self.errors.insert(source.to_string(), error);
        }

        self.counts.insert(
            source.to_string(),
            SourceCounts {
                requested: self.limit,
                retrieved,
                duration_ms: elapsed.as_millis() as u64,
            },
        );
    }

    /// Drop duplicate identifiers (first wins) and cap at the limit, keeping
    /// emission order.
    fn normalize(&self, source: &str, records: Vec<UnifiedRecord>) -> Vec<UnifiedRecord> {
        let emitted = records.len();
        let mut unique: Vec<UnifiedRecord> =
            records.into_iter().unique_by(|r| r.id.clone()).collect();
        if unique.len() < emitted {
            warn!(%source, dropped = emitted - unique.len(), "Dropped duplicate record ids");
        }
        if unique.len() > self.limit {
            debug!(%source, emitted = unique.len(), limit = self.limit, "Truncating to limit");
            unique.truncate(self.limit);
        }
        unique
    }

    pub fn finish(self) -> SessionResult {
        SessionResult {
            started_at: self.started_at,
            finished_at: Utc::now(),
            duration_ms: self.clock.elapsed().as_millis() as u64,
            records: self.records,
            errors: self.errors,
            counts: self.counts,
        }
    }
}
