//! The capability interface every site implementation provides.

use crate::error::FetchError;
use crate::models::{Stage, StageOutcome, UnifiedRecord};
use crate::session::Session;
use async_trait::async_trait;
use std::time::Duration;

/// One site's extraction logic.
///
/// The manager and the validation engine depend only on this trait; concrete
/// fetchers are chosen at registration time.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Registered source name, e.g. `"hackernews"`.
    fn name(&self) -> &str;

    /// Base endpoint used for sessions and the connectivity probe.
    fn base_url(&self) -> &str;

    /// Spacing between requests when configuration does not override it.
    fn default_rate_limit(&self) -> Duration {
        Duration::from_secs(1)
    }

    /// Fetch up to `limit` records through `session`.
    ///
    /// On failure after some records were already produced, return them in
    /// [`FetchError::partial_results`].
    async fn fetch(&self, session: &Session, limit: usize)
    -> Result<Vec<UnifiedRecord>, FetchError>;

    /// Run one validation stage owned by this fetcher. Only
    /// [`Stage::SiteSpecific`] is delegated by the engine; the default has no
    /// site-specific checks.
    async fn validate_stage(&self, session: &Session, stage: Stage) -> StageOutcome {
        let _ = session;
        StageOutcome::pass_with(format!("no {stage} checks for {}", self.name()))
    }
}
