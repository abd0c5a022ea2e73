//! # Event Scraper
//!
//! Concurrent scraping of news and discussion sites into one
//! [`UnifiedRecord`] schema, with four-stage health validation per source.
//!
//! ## Architecture
//!
//! 1. **Registration**: each source is a [`SourceFetcher`] wrapped in a
//!    [`SourceDescriptor`] (transport settings and a shared [`RateLimiter`])
//!    and stored in a [`Registry`]
//! 2. **Scraping**: [`ScraperManager::scrape`] runs one task per source under
//!    a concurrency ceiling and an optional deadline
//! 3. **Aggregation**: per-source outcomes merge into a [`SessionResult`]
//!    without one source's failure affecting another
//! 4. **Validation**: [`ScraperManager::validate`] runs connectivity, data
//!    fetch, structure, and site-specific checks per source
//!
//! ## Example
//!
//! ```no_run
//! use event_scraper::{Settings, ScraperManager, scrapers};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::default();
//! let registry = scrapers::build_registry(&settings)?;
//! let manager = ScraperManager::new(registry, settings.defaults.concurrent_requests);
//! let result = manager.scrape(&["hackernews"], 10, None).await?;
//! println!("{} records", result.total_retrieved());
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod manager;
pub mod models;
pub mod outputs;
pub mod rate_limit;
pub mod registry;
pub mod scrapers;
pub mod session;
pub mod utils;
pub mod validation;

pub use config::{OutputFormat, Settings};
pub use error::{FetchError, Result, ScrapeError, SourceError, SourceErrorKind, TransportInitError};
pub use fetcher::SourceFetcher;
pub use manager::ScraperManager;
pub use models::{
    Author, SessionResult, SourceStatus, Stage, StageOutcome, StageStatus, UnifiedRecord,
    ValidationReport,
};
pub use rate_limit::RateLimiter;
pub use registry::{Registry, SourceDescriptor};
pub use session::{Session, TransportConfig};
pub use validation::ValidationEngine;
