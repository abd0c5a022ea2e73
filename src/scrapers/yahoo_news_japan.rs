//! Yahoo!ニュース fetcher, driven by the top-picks RSS feed.

use crate::error::FetchError;
use crate::fetcher::SourceFetcher;
use crate::models::{Author, Stage, StageOutcome, UnifiedRecord};
use crate::session::Session;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use tracing::{info, instrument, warn};
use url::Url;

pub const NAME: &str = "yahoo_news_japan";
pub const BASE_URL: &str = "https://news.yahoo.co.jp";
pub const RSS_URL: &str = "https://news.yahoo.co.jp/rss/topics/top-picks.xml";
const AUTHOR: &str = "Yahoo!ニュース";

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RssItem {
    pub title: Option<String>,
    pub link: Option<String>,
    #[serde(rename = "pubDate")]
    pub pub_date: Option<String>,
}

/// Decode the `<item>` list of an RSS 2.0 document.
pub fn parse_feed(xml: &str) -> Result<Vec<RssItem>, FetchError> {
    let rss: Rss = from_str(xml).map_err(|e| FetchError::new(format!("invalid RSS XML: {e}")))?;
    Ok(rss.channel.items)
}

#[derive(Debug, Clone)]
pub struct YahooNewsJapanFetcher {
    base_url: String,
    rss_url: String,
}

impl Default for YahooNewsJapanFetcher {
    fn default() -> Self {
        Self::new(BASE_URL, RSS_URL)
    }
}

impl YahooNewsJapanFetcher {
    pub fn new(base_url: impl Into<String>, rss_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rss_url: rss_url.into(),
        }
    }

    pub fn rss_url(&self) -> &str {
        &self.rss_url
    }

    /// Convert one feed item. The id is the last path segment of the link.
    pub fn parse_item(&self, item: &RssItem) -> Option<UnifiedRecord> {
        let (Some(title), Some(link), Some(pub_date)) = (
            item.title.as_deref().map(str::trim).filter(|s| !s.is_empty()),
            item.link.as_deref().map(str::trim).filter(|s| !s.is_empty()),
            item.pub_date.as_deref().map(str::trim).filter(|s| !s.is_empty()),
        ) else {
            warn!("Missing required fields in RSS item");
            return None;
        };

        let url = match Url::parse(link) {
            Ok(url) => url,
            Err(e) => {
                warn!(%link, error = %e, "Unparseable RSS item link");
                return None;
            }
        };
        let timestamp = match DateTime::parse_from_rfc2822(pub_date) {
            Ok(ts) => ts.with_timezone(&Utc),
            Err(e) => {
                warn!(%pub_date, error = %e, "Unparseable pubDate");
                return None;
            }
        };
        let id = url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(str::to_string)
            .unwrap_or_else(|| link.to_string());

        let mut record = UnifiedRecord::new(id, title, url.clone(), NAME);
        record.author = Some(Author::named(AUTHOR));
        record.timestamp = Some(timestamp);
        record.source_url = Some(url);
        Some(record)
    }
}

#[async_trait]
impl SourceFetcher for YahooNewsJapanFetcher {
    fn name(&self) -> &str {
        NAME
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    #[instrument(level = "info", skip_all, fields(limit = limit))]
    async fn fetch(
        &self,
        session: &Session,
        limit: usize,
    ) -> Result<Vec<UnifiedRecord>, FetchError> {
        let xml = session.get_text(&self.rss_url).await?;
        let items = parse_feed(&xml)?;
        let records: Vec<UnifiedRecord> = items
            .iter()
            .take(limit)
            .filter_map(|item| self.parse_item(item))
            .collect();
        info!(items = items.len(), count = records.len(), "Parsed Yahoo News Japan feed");
        Ok(records)
    }

    async fn validate_stage(&self, session: &Session, stage: Stage) -> StageOutcome {
        if stage != Stage::SiteSpecific {
            return StageOutcome::pass_with(format!("no {stage} checks for {NAME}"));
        }
        match session.get_text(&self.rss_url).await {
            Ok(xml) => self.check_feed(&xml),
            Err(e) => StageOutcome::fail(format!("RSS feed not accessible: {e}")),
        }
    }
}

impl YahooNewsJapanFetcher {
    /// The feed must parse, carry items, and its first item must convert.
    pub fn check_feed(&self, xml: &str) -> StageOutcome {
        let items = match parse_feed(xml) {
            Ok(items) => items,
            Err(e) => return StageOutcome::fail(e.reason),
        };
        let Some(first) = items.first() else {
            return StageOutcome::fail("no items in RSS feed");
        };
        match self.parse_item(first) {
            Some(sample) => {
                StageOutcome::pass_with(format!("{} items, sample {}", items.len(), sample.id))
            }
            None => StageOutcome::fail("failed to parse sample item"),
        }
    }
}
