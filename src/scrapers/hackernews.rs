//! Hacker News fetcher.
//!
//! Uses the public [Firebase API](https://github.com/HackerNews/API):
//! `topstories.json` gives story ids in rank order, `item/{id}.json` gives
//! each story. Details are fetched concurrently but emitted in rank order.
//! Every request still passes the session's rate limiter, so with a
//! configured interval the detail requests go out one per interval.

use crate::error::FetchError;
use crate::fetcher::SourceFetcher;
use crate::models::{Author, Stage, StageOutcome, UnifiedRecord};
use crate::session::Session;
use async_trait::async_trait;
use chrono::DateTime;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const NAME: &str = "hackernews";
pub const BASE_URL: &str = "https://news.ycombinator.com";
pub const API_BASE: &str = "https://hacker-news.firebaseio.com/v0";

/// Story detail requests awaiting a response at once.
const DETAIL_CONCURRENCY: usize = 8;

/// One item from `item/{id}.json`. Only `id` is guaranteed.
#[derive(Debug, Clone, Deserialize)]
pub struct HnItem {
    pub id: u64,
    pub title: Option<String>,
    pub by: Option<String>,
    pub time: Option<i64>,
    pub url: Option<String>,
    pub text: Option<String>,
    pub score: Option<i64>,
    pub descendants: Option<u32>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HackerNewsFetcher {
    base_url: String,
    api_base: String,
}

impl Default for HackerNewsFetcher {
    fn default() -> Self {
        Self::new(BASE_URL, API_BASE)
    }
}

impl HackerNewsFetcher {
    pub fn new(base_url: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn top_stories_url(&self) -> String {
        format!("{}/topstories.json", self.api_base)
    }

    fn item_url(&self, id: u64) -> String {
        format!("{}/item/{id}.json", self.api_base)
    }

    /// Convert a story into a record. Returns `None` when `title`, `by`, or
    /// `time` is missing, or a URL cannot be built.
    pub fn parse_story(&self, item: &HnItem) -> Option<UnifiedRecord> {
        let (Some(title), Some(by), Some(time)) = (&item.title, &item.by, item.time) else {
            warn!(id = item.id, "Missing required fields in story");
            return None;
        };

        let discussion = Url::parse(&format!("{}/item?id={}", self.base_url, item.id)).ok()?;
        let url = match item.url.as_deref().map(Url::parse) {
            Some(Ok(u)) => u,
            Some(Err(e)) => {
                debug!(id = item.id, error = %e, "Unparseable story URL; using discussion page");
                discussion.clone()
            }
            None => discussion.clone(),
        };

        let profile_url = Url::parse(&format!(
            "{}/user?id={}",
            self.base_url,
            urlencoding::encode(by)
        ))
        .ok();

        let mut record = UnifiedRecord::new(item.id.to_string(), title.clone(), url, NAME);
        record.content = item.text.clone();
        record.author = Some(Author {
            username: by.clone(),
            profile_url,
            karma: None,
        });
        record.timestamp = DateTime::from_timestamp(time, 0);
        record.score = Some(item.score.unwrap_or(0));
        record.comments_count = item.descendants.unwrap_or(0);
        record.source_url = Some(discussion);
        record.metadata.insert(
            "type".to_string(),
            serde_json::json!(item.kind.as_deref().unwrap_or("story")),
        );
        record
            .metadata
            .insert("hn_id".to_string(), serde_json::json!(item.id));
        Some(record)
    }
}

#[async_trait]
impl SourceFetcher for HackerNewsFetcher {
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
        let ids: Vec<u64> = session.get_json(&self.top_stories_url()).await?;
        let ids: Vec<u64> = ids.into_iter().take(limit).collect();
        let requested = ids.len();

        let details: Vec<Result<HnItem, FetchError>> = stream::iter(ids)
            .map(|id| {
                let url = self.item_url(id);
                async move { session.get_json::<HnItem>(&url).await }
            })
            .buffered(DETAIL_CONCURRENCY)
            .collect()
            .await;

        let mut records = Vec::with_capacity(requested);
        let mut failures = Vec::new();
        for detail in details {
            match detail {
                Ok(item) => records.extend(self.parse_story(&item)),
                Err(e) => failures.push(e.reason),
            }
        }

        info!(count = records.len(), failed = failures.len(), "Parsed Hacker News stories");
        if failures.is_empty() {
            Ok(records)
        } else {
            Err(FetchError::new(format!(
                "{} of {requested} story details failed: {}",
                failures.len(),
                failures.join("; ")
            ))
            .with_partial(records))
        }
    }

    async fn validate_stage(&self, session: &Session, stage: Stage) -> StageOutcome {
        if stage != Stage::SiteSpecific {
            return StageOutcome::pass_with(format!("no {stage} checks for {NAME}"));
        }

        let top: Vec<u64> = match session.get_json(&self.top_stories_url()).await {
            Ok(ids) => ids,
            Err(e) => return StageOutcome::fail(format!("Firebase API not accessible: {e}")),
        };
        let first = match top.first() {
            Some(id) => match session.get_json::<HnItem>(&self.item_url(*id)).await {
                Ok(item) => Some(item),
                Err(e) => return StageOutcome::fail(format!("story API not accessible: {e}")),
            },
            None => None,
        };
        let homepage = match session.get_text(&self.base_url).await {
            Ok(body) => body,
            Err(e) => return StageOutcome::fail(format!("website not accessible: {e}")),
        };
        check_site(&top, first.as_ref(), &homepage)
    }
}

/// Judge the API listing, a sample story, and the homepage body.
pub fn check_site(top: &[u64], first: Option<&HnItem>, homepage: &str) -> StageOutcome {
    let Some(first) = first else {
        return StageOutcome::fail("Firebase API returned no stories");
    };

    let missing: Vec<&str> = [
        ("title", first.title.is_none()),
        ("by", first.by.is_none()),
        ("time", first.time.is_none()),
    ]
    .into_iter()
    .filter_map(|(field, absent)| absent.then_some(field))
    .collect();
    if !missing.is_empty() {
        return StageOutcome::fail(format!("story {} missing fields: {missing:?}", first.id));
    }

    if !homepage.contains("Hacker News") {
        return StageOutcome::fail("Hacker News website content appears to have changed");
    }

    if top.len() < 10 {
        StageOutcome::pass_with(format!("unusually few stories: {}", top.len()))
    } else {
        StageOutcome::pass_with(format!("{} stories listed, sample {}", top.len(), first.id))
    }
}
