//! YAML configuration.
//!
//! The loader turns `config/settings.yaml` (or the file given with
//! `--config`) into a [`Settings`] value. The core never reads files itself;
//! it only consumes the parsed settings.
//!
//! # Example
//!
//! ```yaml
//! defaults:
//!   limit: 30
//!   timeout: 30
//!   concurrent_requests: 10
//!   output_format: json
//!   output_dir: output
//! sites:
//!   hackernews:
//!     enabled: true
//!     base_url: https://news.ycombinator.com
//!     api_base: https://hacker-news.firebaseio.com/v0
//!     rate_limit: 1.0
//! logging:
//!   level: info
//! ```

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "config/settings.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
    Both,
}

/// Global defaults applied when the caller does not override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub limit: usize,
    /// Per-request timeout in seconds.
    pub timeout: u64,
    /// Concurrency ceiling for per-source tasks.
    pub concurrent_requests: usize,
    pub output_format: OutputFormat,
    pub output_dir: PathBuf,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            limit: 30,
            timeout: 30,
            concurrent_requests: 10,
            output_format: OutputFormat::Json,
            output_dir: PathBuf::from("output"),
        }
    }
}

impl Defaults {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// Per-source settings. Unset endpoints fall back to the fetcher's own.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub enabled: bool,
    pub base_url: Option<String>,
    pub api_base: Option<String>,
    pub rss_url: Option<String>,
    /// Minimum seconds between requests.
    pub rate_limit: Option<f64>,
    pub headers: BTreeMap<String, String>,
}

impl SiteConfig {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub defaults: Defaults,
    pub sites: BTreeMap<String, SiteConfig>,
    pub logging: LoggingConfig,
}

impl Default for Settings {
    /// Built-in defaults: every bundled source enabled with its own endpoints.
    fn default() -> Self {
        let sites = crate::scrapers::BUILTIN_SOURCES
            .iter()
            .map(|name| (name.to_string(), SiteConfig::enabled()))
            .collect();
        Self {
            defaults: Defaults::default(),
            sites,
            logging: LoggingConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from [`DEFAULT_CONFIG_PATH`].
    ///
    /// A missing file yields [`Settings::default`] with a warning; an
    /// unreadable or malformed file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        if !path.exists() {
            warn!(path = %path.display(), "Configuration file not found; using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_yaml_str(&text)?;
        info!(path = %path.display(), sites = settings.sites.len(), "Configuration loaded");
        Ok(settings)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_yaml::from_str(text)?;
        settings.check()?;
        Ok(settings)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.defaults.limit == 0 {
            return Err(ConfigError::Invalid("defaults.limit must be positive".into()));
        }
        if self.defaults.concurrent_requests == 0 {
            return Err(ConfigError::Invalid(
                "defaults.concurrent_requests must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn site(&self, name: &str) -> Option<&SiteConfig> {
        self.sites.get(name)
    }

    pub fn is_site_enabled(&self, name: &str) -> bool {
        self.sites.get(name).is_some_and(|s| s.enabled)
    }

    /// Names of enabled sites, in name order.
    pub fn enabled_sites(&self) -> Vec<String> {
        self.sites
            .iter()
            .filter(|(_, s)| s.enabled)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_builtin_sources() {
        let s = Settings::default();
        assert_eq!(s.defaults.limit, 30);
        assert_eq!(s.defaults.concurrent_requests, 10);
        assert_eq!(s.defaults.timeout(), Duration::from_secs(30));
        assert!(s.is_site_enabled("hackernews"));
        assert!(s.is_site_enabled("reuters_japan"));
        assert!(s.is_site_enabled("yahoo_news_japan"));
    }

    #[test]
    fn parses_partial_yaml_with_defaults() {
        let yaml = r#"
defaults:
  limit: 5
  output_format: both
sites:
  hackernews:
    enabled: true
    rate_limit: 0.5
    headers:
      Accept: application/json
  reuters_japan:
    enabled: false
"#;
        let s = Settings::from_yaml_str(yaml).unwrap();
        assert_eq!(s.defaults.limit, 5);
        assert_eq!(s.defaults.timeout, 30);
        assert_eq!(s.defaults.output_format, OutputFormat::Both);
        assert_eq!(s.enabled_sites(), vec!["hackernews".to_string()]);

        let hn = s.site("hackernews").unwrap();
        assert_eq!(hn.rate_limit, Some(0.5));
        assert_eq!(hn.headers.get("Accept").map(String::as_str), Some("application/json"));
        assert!(hn.base_url.is_none());

        assert!(!s.is_site_enabled("reuters_japan"));
        assert!(!s.is_site_enabled("yahoo_news_japan"));
        assert_eq!(s.logging.level, "info");
    }

    #[test]
    fn rejects_zero_concurrency() {
        let yaml = "defaults:\n  concurrent_requests: 0\n";
        let err = Settings::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_malformed_yaml() {
        let err = Settings::from_yaml_str("defaults: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load(Some(&dir.path().join("nope.yaml"))).unwrap();
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn loads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, "defaults:\n  limit: 7\n").unwrap();
        let s = Settings::load(Some(&path)).unwrap();
        assert_eq!(s.defaults.limit, 7);
    }
}
