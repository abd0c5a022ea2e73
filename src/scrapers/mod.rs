//! Bundled site implementations.
//!
//! | Source | Module | Method |
//! |--------|--------|--------|
//! | Hacker News | [`hackernews`] | Firebase JSON API |
//! | Reuters Japan | [`reuters_japan`] | `Fusion.globalContent` embedded in the markets page |
//! | Yahoo!ニュース | [`yahoo_news_japan`] | Top-picks RSS feed |
//!
//! [`build_registry`] turns [`Settings`] into a [`Registry`] holding one
//! descriptor per bundled source. Sites that are disabled in configuration
//! are still registered, so they can be listed, but they cannot be
//! scraped or validated.

pub mod hackernews;
pub mod reuters_japan;
pub mod yahoo_news_japan;

use crate::config::{SiteConfig, Settings};
use crate::error::Result;
use crate::fetcher::SourceFetcher;
use crate::registry::{Registry, SourceDescriptor};
use crate::session::TransportConfig;
use hackernews::HackerNewsFetcher;
use reuters_japan::ReutersJapanFetcher;
use std::sync::Arc;
use tracing::{debug, warn};
use yahoo_news_japan::YahooNewsJapanFetcher;

pub const BUILTIN_SOURCES: [&str; 3] = [hackernews::NAME, reuters_japan::NAME, yahoo_news_japan::NAME];

/// Instantiate the fetcher for a bundled source, applying endpoint
/// overrides from `site`.
pub fn builtin_fetcher(name: &str, site: &SiteConfig) -> Option<Arc<dyn SourceFetcher>> {
    let fetcher: Arc<dyn SourceFetcher> = match name {
        hackernews::NAME => Arc::new(HackerNewsFetcher::new(
            site.base_url.as_deref().unwrap_or(hackernews::BASE_URL),
            site.api_base.as_deref().unwrap_or(hackernews::API_BASE),
        )),
        reuters_japan::NAME => Arc::new(ReutersJapanFetcher::new(
            site.base_url.as_deref().unwrap_or(reuters_japan::BASE_URL),
        )),
        yahoo_news_japan::NAME => Arc::new(YahooNewsJapanFetcher::new(
            site.base_url.as_deref().unwrap_or(yahoo_news_japan::BASE_URL),
            site.rss_url.as_deref().unwrap_or(yahoo_news_japan::RSS_URL),
        )),
        _ => return None,
    };
    Some(fetcher)
}

/// Build the registry for every bundled source.
///
/// # Errors
///
/// Only a duplicate registration, which cannot happen with distinct
/// bundled names.
pub fn build_registry(settings: &Settings) -> Result<Registry> {
    for name in settings.sites.keys() {
        if !BUILTIN_SOURCES.contains(&name.as_str()) {
            warn!(site = %name, "Configured site has no implementation; ignoring");
        }
    }

    let mut registry = Registry::new();
    for name in BUILTIN_SOURCES {
        let site = settings.site(name).cloned().unwrap_or_default();
        let Some(fetcher) = builtin_fetcher(name, &site) else {
            continue;
        };

        let mut transport =
            TransportConfig::new(fetcher.base_url()).with_timeout(settings.defaults.timeout());
        transport.headers = site.headers.clone();

        let mut descriptor = SourceDescriptor::new(fetcher)
            .with_transport(transport)
            .enabled(settings.is_site_enabled(name));
        if let Some(secs) = site.rate_limit {
            descriptor = descriptor.with_rate_limit_secs(secs);
        }
        debug!(
            source = name,
            enabled = descriptor.enabled,
            rate_limit_ms = descriptor.rate_limit().as_millis() as u64,
            "Registered source"
        );
        registry.register(descriptor)?;
    }
    Ok(registry)
}
