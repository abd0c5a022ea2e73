//! Source registration.
//!
//! A [`Registry`] maps source names to immutable [`SourceDescriptor`]s. It is
//! built once at startup and handed to the
//! [`ScraperManager`](crate::manager::ScraperManager); there is no global
//! registry, so independent managers never interfere.

use crate::error::{Result, ScrapeError};
use crate::fetcher::SourceFetcher;
use crate::rate_limit::RateLimiter;
use crate::session::TransportConfig;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Static registration record for one source.
#[derive(Clone)]
pub struct SourceDescriptor {
    pub name: String,
    pub enabled: bool,
    pub fetcher: Arc<dyn SourceFetcher>,
    pub transport: TransportConfig,
    /// Shared by every call that touches this source.
    limiter: Arc<RateLimiter>,
}

impl SourceDescriptor {
    /// Describe `fetcher` with its own base endpoint and default interval.
    pub fn new(fetcher: Arc<dyn SourceFetcher>) -> Self {
        let name = fetcher.name().to_string();
        let transport = TransportConfig::new(fetcher.base_url());
        let limiter = Arc::new(RateLimiter::new(name.clone(), fetcher.default_rate_limit()));
        Self {
            name,
            enabled: true,
            fetcher,
            transport,
            limiter,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_rate_limit(mut self, interval: Duration) -> Self {
        self.limiter = Arc::new(RateLimiter::new(self.name.clone(), interval));
        self
    }

    /// Set the interval from configured seconds; see
    /// [`RateLimiter::from_secs_f64`].
    pub fn with_rate_limit_secs(mut self, secs: f64) -> Self {
        self.limiter = Arc::new(RateLimiter::from_secs_f64(self.name.clone(), secs));
        self
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    pub fn rate_limit(&self) -> Duration {
        self.limiter.interval()
    }

    pub fn limiter(&self) -> Arc<RateLimiter> {
        Arc::clone(&self.limiter)
    }
}

impl fmt::Debug for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceDescriptor")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("base_url", &self.transport.base_url)
            .field("rate_limit", &self.rate_limit())
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    sources: BTreeMap<String, SourceDescriptor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// [`ScrapeError::DuplicateSource`] if the name is already taken; the
    /// existing descriptor is left untouched.
    pub fn register(&mut self, descriptor: SourceDescriptor) -> Result<()> {
        if self.sources.contains_key(&descriptor.name) {
            return Err(ScrapeError::DuplicateSource(descriptor.name));
        }
        self.sources.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    /// Look up an enabled source. Disabled sources resolve like unknown ones.
    pub fn resolve(&self, name: &str) -> Result<&SourceDescriptor> {
        self.sources
            .get(name)
            .filter(|d| d.enabled)
            .ok_or_else(|| ScrapeError::UnknownSource(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&SourceDescriptor> {
        self.sources.get(name)
    }

    /// All descriptors in name order, enabled or not.
    pub fn iter(&self) -> impl Iterator<Item = &SourceDescriptor> {
        self.sources.values()
    }

    pub fn enabled_names(&self) -> Vec<String> {
        self.sources
            .values()
            .filter(|d| d.enabled)
            .map(|d| d.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
