//! Four-stage health checks for a single source.
//!
//! Stages run strictly in order: connectivity, data fetch, structure,
//! site-specific. The first failure short-circuits the rest, which are
//! recorded as skipped. The engine never returns an error: failures and
//! panics inside a stage become that stage's diagnostic message.

use crate::error::panic_message;
use crate::models::{Stage, StageResult, StageStatus, UnifiedRecord, ValidationReport};
use crate::registry::SourceDescriptor;
use crate::session::Session;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::FutureExt;
use std::collections::HashSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Records requested during the data-fetch stage.
const SAMPLE_LIMIT: usize = 1;

/// How far in the future a timestamp may be before it counts as bogus.
const MAX_CLOCK_SKEW_HOURS: i64 = 24;

type StageRun<T> = Result<(T, Option<String>), String>;

#[derive(Debug, Clone, Default)]
pub struct ValidationEngine;

impl ValidationEngine {
    pub fn new() -> Self {
        Self
    }

    #[instrument(level = "info", skip_all, fields(source = %descriptor.name))]
    pub async fn validate(&self, descriptor: &SourceDescriptor) -> ValidationReport {
        let mut report = ReportBuilder::new(&descriptor.name);

        let Some(session) = report
            .run(Stage::Connectivity, connectivity(descriptor))
            .await
        else {
            return report.finish();
        };

        let Some(sample) = report
            .run(Stage::DataFetch, data_fetch(descriptor, &session))
            .await
        else {
            return report.finish();
        };

        let structure_check = async { structure(&descriptor.name, &sample, Utc::now()) };
        if report.run(Stage::Structure, structure_check).await.is_none() {
            return report.finish();
        }

        report
            .run(Stage::SiteSpecific, site_specific(descriptor, &session))
            .await;
        report.finish()
    }
}

async fn connectivity(descriptor: &SourceDescriptor) -> StageRun<Session> {
    let session = Session::open(&descriptor.name, &descriptor.transport, descriptor.limiter())
        .map_err(|e| e.to_string())?;
    let bytes = session
        .probe()
        .await
        .map_err(|e| format!("{} unreachable: {e}", session.base_url()))?;
    let msg = format!("{bytes} bytes from {}", session.base_url());
    Ok((session, Some(msg)))
}

async fn data_fetch(
    descriptor: &SourceDescriptor,
    session: &Session,
) -> StageRun<Vec<UnifiedRecord>> {
    let records = descriptor
        .fetcher
        .fetch(session, SAMPLE_LIMIT)
        .await
        .map_err(|e| format!("fetch failed: {e}"))?;
    if records.is_empty() {
        return Err("no records returned".to_string());
    }
    let msg = format!("{} record(s) retrieved", records.len());
    Ok((records, Some(msg)))
}

fn structure(source: &str, records: &[UnifiedRecord], now: DateTime<Utc>) -> StageRun<()> {
    let issues = check_structure(source, records, now);
    if issues.is_empty() {
        Ok(((), Some(format!("{} record(s) well-formed", records.len()))))
    } else {
        Err(issues.join("; "))
    }
}

async fn site_specific(descriptor: &SourceDescriptor, session: &Session) -> StageRun<()> {
    let outcome = descriptor
        .fetcher
        .validate_stage(session, Stage::SiteSpecific)
        .await;
    if outcome.passed {
        Ok(((), outcome.message))
    } else {
        Err(outcome
            .message
            .unwrap_or_else(|| "site-specific check failed".to_string()))
    }
}

/// List every invariant violation in `records`. Empty means well-formed.
pub fn check_structure(
    source: &str,
    records: &[UnifiedRecord],
    now: DateTime<Utc>,
) -> Vec<String> {
    let latest = now + ChronoDuration::hours(MAX_CLOCK_SKEW_HOURS);
    let mut issues = Vec::new();
    let mut seen = HashSet::new();

    for (i, r) in records.iter().enumerate() {
        if r.id.trim().is_empty() {
            issues.push(format!("record {i}: empty id"));
        } else if !seen.insert(r.id.as_str()) {
            issues.push(format!("record {i}: duplicate id {:?}", r.id));
        }
        if r.title.trim().is_empty() {
            issues.push(format!("record {i}: empty title"));
        }
        if !matches!(r.url.scheme(), "http" | "https") || r.url.host_str().is_none() {
            issues.push(format!("record {i}: URL {} is not an absolute http(s) URL", r.url));
        }
        if r.source != source {
            issues.push(format!("record {i}: source {:?}, expected {source:?}", r.source));
        }
        if r.retrieved_at > latest {
            issues.push(format!("record {i}: retrieval time {} is in the future", r.retrieved_at));
        }
        if let Some(ts) = r.timestamp {
            if ts.timestamp() < 0 || ts > latest {
                issues.push(format!("record {i}: implausible timestamp {ts}"));
            }
        }
    }
    issues
}

/// Accumulates stage results in order and fills in skipped stages.
struct ReportBuilder {
    source: String,
    validated_at: DateTime<Utc>,
    clock: Instant,
    stages: Vec<StageResult>,
}

impl ReportBuilder {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            validated_at: Utc::now(),
            clock: Instant::now(),
            stages: Vec::with_capacity(Stage::ALL.len()),
        }
    }

    /// Run one stage, catching panics, and record its result. Returns the
    /// stage's payload on pass.
    async fn run<T, F>(&mut self, stage: Stage, fut: F) -> Option<T>
    where
        F: Future<Output = StageRun<T>>,
    {
        let t0 = Instant::now();
        let result = match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(r) => r,
            Err(payload) => Err(format!("internal error: {}", panic_message(payload.as_ref()))),
        };
        let duration_ms = t0.elapsed().as_millis() as u64;

        match result {
            Ok((value, message)) => {
                self.stages.push(StageResult {
                    stage,
                    status: StageStatus::Pass,
                    duration_ms,
                    message,
                });
                Some(value)
            }
            Err(message) => {
                warn!(source = %self.source, %stage, error = %message, "Validation stage failed");
                self.stages.push(StageResult {
                    stage,
                    status: StageStatus::Fail,
                    duration_ms,
                    message: Some(message),
                });
                None
            }
        }
    }

    fn finish(mut self) -> ValidationReport {
        for stage in Stage::ALL.iter().skip(self.stages.len()) {
            self.stages.push(StageResult {
                stage: *stage,
                status: StageStatus::Skipped,
                duration_ms: 0,
                message: Some("skipped after earlier failure".to_string()),
            });
        }
        let passed = self.stages.iter().all(|s| s.status == StageStatus::Pass);
        let duration_ms = self.clock.elapsed().as_millis() as u64;
        info!(
            source = %self.source,
            valid = passed,
            duration_ms,
            "Validation completed"
        );
        ValidationReport {
            source: self.source,
            validated_at: self.validated_at,
            stages: self.stages,
            passed,
            duration_ms,
        }
    }
}
