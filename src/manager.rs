//! The orchestrator.
//!
//! [`ScraperManager`] owns the [`Registry`] and runs one task per requested
//! source, at most `concurrency` at a time:
//!
//! 1. open a [`Session`] for the source
//! 2. call [`SourceFetcher::fetch`](crate::fetcher::SourceFetcher::fetch),
//!    whose requests each wait on the source's rate limiter
//! 3. drop the session
//!
//! Each task is spawned on the runtime, so a panic in one fetcher is caught
//! at its join handle and recorded for that source only. Outcomes are
//! gathered into an [`Aggregator`]; nothing a single source does can fail
//! the call once tasks have started.

use crate::aggregate::{Aggregator, FetchOutcome};
use crate::error::{panic_message, Result, ScrapeError, SourceError};
use crate::models::{SessionResult, ValidationReport};
use crate::registry::{Registry, SourceDescriptor};
use crate::session::Session;
use crate::validation::ValidationEngine;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{error, info, instrument, warn};

pub const DEFAULT_CONCURRENCY: usize = 10;

/// Whole-call deadline: when it expires and how long the caller allowed.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    /// `None` when `budget` reaches past what the clock can represent, which
    /// is no deadline in practice.
    fn starting_now(budget: Duration) -> Option<Self> {
        let at = Instant::now().checked_add(budget);
        if at.is_none() {
            warn!(budget_secs = budget.as_secs(), "Deadline out of range; running without one");
        }
        at.map(|at| Self { at, budget })
    }
}

#[derive(Debug)]
pub struct ScraperManager {
    registry: Registry,
    concurrency: usize,
    engine: ValidationEngine,
}

impl ScraperManager {
    /// Create a manager over an explicitly built registry. A concurrency of
    /// zero is raised to one.
    pub fn new(registry: Registry, concurrency: usize) -> Self {
        Self {
            registry,
            concurrency: concurrency.max(1),
            engine: ValidationEngine::new(),
        }
    }

    /// Add a source. Fails with [`ScrapeError::DuplicateSource`] on a name
    /// clash.
    pub fn register(&mut self, descriptor: SourceDescriptor) -> Result<()> {
        self.registry.register(descriptor)
    }

    /// Every registered source in name order, including disabled ones.
    pub fn list_sources(&self) -> Vec<&SourceDescriptor> {
        self.registry.iter().collect()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Resolve every name up front so an unknown one aborts before any work.
    fn resolve_all<S: AsRef<str>>(&self, source_names: &[S]) -> Result<Vec<SourceDescriptor>> {
        let names: BTreeSet<&str> = source_names.iter().map(AsRef::as_ref).collect();
        names
            .into_iter()
            .map(|name| self.registry.resolve(name).cloned())
            .collect()
    }

    /// Fetch up to `limit` records from each named source concurrently.
    ///
    /// # Errors
    ///
    /// Only call-level problems are errors: an unknown or disabled source
    /// name, or a zero limit. Both are reported before any task starts.
    /// Per-source failures, including expiry of `deadline`, are recorded in
    /// the returned [`SessionResult`].
    #[instrument(level = "info", skip_all, fields(limit = limit, sources = source_names.len()))]
    pub async fn scrape<S: AsRef<str>>(
        &self,
        source_names: &[S],
        limit: usize,
        deadline: Option<Duration>,
    ) -> Result<SessionResult> {
        if limit == 0 {
            return Err(ScrapeError::InvalidLimit);
        }
        let descriptors = self.resolve_all(source_names)?;
        let deadline = deadline.and_then(Deadline::starting_now);

        info!(
            sources = ?descriptors.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
            concurrency = self.concurrency,
            ?deadline,
            "Starting parallel scraping"
        );

        let mut aggregator = Aggregator::new(limit);
        let outcomes: Vec<(String, FetchOutcome, Duration)> = stream::iter(descriptors)
            .map(|descriptor| run_source_task(descriptor, limit, deadline))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (name, outcome, elapsed) in outcomes {
            aggregator.record(&name, outcome, elapsed);
        }
        let result = aggregator.finish();

        info!(
            total_records = result.total_retrieved(),
            total_errors = result.error_count(),
            duration_ms = result.duration_ms,
            "Scraping completed"
        );
        Ok(result)
    }

    /// Validate the named sources concurrently.
    ///
    /// # Errors
    ///
    /// [`ScrapeError::UnknownSource`] if any name is unknown or disabled.
    pub async fn validate<S: AsRef<str>>(
        &self,
        source_names: &[S],
    ) -> Result<BTreeMap<String, ValidationReport>> {
        let descriptors = self.resolve_all(source_names)?;
        Ok(self.validate_descriptors(descriptors).await)
    }

    /// Validate every enabled source.
    pub async fn validate_all(&self) -> BTreeMap<String, ValidationReport> {
        let descriptors = self
            .registry
            .iter()
            .filter(|d| d.enabled)
            .cloned()
            .collect();
        self.validate_descriptors(descriptors).await
    }

    async fn validate_descriptors(
        &self,
        descriptors: Vec<SourceDescriptor>,
    ) -> BTreeMap<String, ValidationReport> {
        info!(count = descriptors.len(), "Starting validation");
        let engine = &self.engine;
        let reports: Vec<ValidationReport> = stream::iter(descriptors.iter())
            .map(|descriptor| engine.validate(descriptor))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let valid = reports.iter().filter(|r| r.passed).count();
        info!(valid, invalid = reports.len() - valid, "Validation finished");
        reports
            .into_iter()
            .map(|report| (report.source.clone(), report))
            .collect()
    }
}

/// Run one source to completion, or until the deadline, on its own task.
async fn run_source_task(
    descriptor: SourceDescriptor,
    limit: usize,
    deadline: Option<Deadline>,
) -> (String, FetchOutcome, Duration) {
    let name = descriptor.name.clone();
    let t0 = Instant::now();

    if let Some(d) = deadline {
        if Instant::now() >= d.at {
            warn!(source = %name, "Deadline expired before task started");
            let outcome = FetchOutcome::Failure(SourceError::timeout(d.budget));
            return (name, outcome, t0.elapsed());
        }
    }

    let handle = tokio::spawn(fetch_source(descriptor, limit));
    let abort = handle.abort_handle();

    let joined = match deadline {
        Some(d) => match timeout_at(d.at, handle).await {
            Ok(joined) => joined,
            Err(_) => {
                abort.abort();
                warn!(source = %name, budget_ms = d.budget.as_millis() as u64, "Source timed out; task cancelled");
                let outcome = FetchOutcome::Failure(SourceError::timeout(d.budget));
                return (name, outcome, t0.elapsed());
            }
        },
        None => handle.await,
    };

    let outcome = match joined {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => {
            let msg = panic_message(e.into_panic().as_ref());
            error!(source = %name, panic = %msg, "Fetcher panicked");
            FetchOutcome::Failure(SourceError::panicked(msg))
        }
        Err(e) => FetchOutcome::Failure(SourceError::panicked(e.to_string())),
    };
    (name, outcome, t0.elapsed())
}

#[instrument(level = "info", skip_all, fields(source = %descriptor.name))]
async fn fetch_source(descriptor: SourceDescriptor, limit: usize) -> FetchOutcome {
    let session = match Session::open(&descriptor.name, &descriptor.transport, descriptor.limiter())
    {
        Ok(session) => session,
        Err(e) => {
            error!(error = %e, "Could not open session");
            return FetchOutcome::transport(&e);
        }
    };

    let result = descriptor.fetcher.fetch(&session, limit).await;
    drop(session);

    match &result {
        Ok(records) => info!(count = records.len(), "Fetched records"),
        Err(e) => warn!(
            error = %e,
            partial = e.partial_results.len(),
            "Fetch failed"
        ),
    }
    FetchOutcome::from_fetch(result)
}
