//! Reuters Japan fetcher.
//!
//! The markets page embeds its article list in a script tag as
//! `Fusion.globalContent = {...};`. We locate that script, decode the JSON
//! value that follows the assignment, and search a handful of known paths
//! for the article array.

use crate::error::FetchError;
use crate::fetcher::SourceFetcher;
use crate::models::{Author, Stage, StageOutcome, UnifiedRecord};
use crate::session::Session;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{info, instrument, warn};
use url::Url;

pub const NAME: &str = "reuters_japan";
pub const BASE_URL: &str = "https://jp.reuters.com";
const MARKETS_PATH: &str = "/markets/";
const DEFAULT_AUTHOR: &str = "Reuters";

static SCRIPT_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("script").unwrap());
static FUSION_ASSIGNMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Fusion\.globalContent\s*=\s*").unwrap());

/// Where the article array may live under `result`.
const ARTICLE_PATHS: [&[&str]; 4] = [
    &["articles"],
    &["content", "articles"],
    &["items"],
    &["content", "items"],
];

#[derive(Debug, Clone)]
pub struct ReutersJapanFetcher {
    base_url: String,
}

impl Default for ReutersJapanFetcher {
    fn default() -> Self {
        Self::new(BASE_URL)
    }
}

impl ReutersJapanFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn markets_url(&self) -> String {
        format!("{}{MARKETS_PATH}", self.base_url)
    }

    /// Convert one Fusion article object. Returns `None` when the id,
    /// headline, or URL is missing.
    pub fn parse_article(&self, data: &Value) -> Option<UnifiedRecord> {
        let id = match data.get("id") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                warn!("Reuters article without id");
                return None;
            }
        };
        let title = str_field(data, "basic_headline").or_else(|| str_field(data, "title"))?;

        let Some(canonical) = str_field(data, "canonical_url") else {
            warn!(%id, "No URL found for Reuters article");
            return None;
        };
        let url = if canonical.starts_with('/') {
            Url::parse(&self.base_url).ok()?.join(canonical).ok()?
        } else {
            Url::parse(canonical).ok()?
        };

        let mut record = UnifiedRecord::new(id.clone(), title, url.clone(), NAME);
        record.content = str_field(data, "description").map(str::to_string);
        record.author = Some(Author::named(author_name(data)));
        record.timestamp = ["display_date", "first_publish_date", "publish_date"]
            .iter()
            .find_map(|k| str_field(data, k))
            .and_then(parse_timestamp);
        record.source_url = Some(url);
        record.metadata.insert(
            "section".to_string(),
            data.pointer("/taxonomy/sections")
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new())),
        );
        record
            .metadata
            .insert("reuters_id".to_string(), Value::String(id));
        record.metadata.insert(
            "type".to_string(),
            Value::String(str_field(data, "type").unwrap_or("article").to_string()),
        );
        Some(record)
    }
}

fn str_field<'a>(data: &'a Value, key: &str) -> Option<&'a str> {
    data.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn author_name(data: &Value) -> String {
    let Some(author) = data
        .get("authors")
        .and_then(Value::as_array)
        .and_then(|a| a.first())
    else {
        return DEFAULT_AUTHOR.to_string();
    };
    if let Some(name) = str_field(author, "name").or_else(|| str_field(author, "byline")) {
        return name.to_string();
    }
    let full = format!(
        "{} {}",
        str_field(author, "first_name").unwrap_or_default(),
        str_field(author, "last_name").unwrap_or_default()
    );
    let full = full.trim();
    if full.is_empty() {
        DEFAULT_AUTHOR.to_string()
    } else {
        full.to_string()
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Pull the `Fusion.globalContent` object out of a page.
pub fn extract_fusion_data(html: &str) -> Option<Value> {
    let document = Html::parse_document(html);
    for script in document.select(&SCRIPT_SELECTOR) {
        let text: String = script.text().collect();
        let Some(m) = FUSION_ASSIGNMENT.find(&text) else {
            continue;
        };
        let mut values = serde_json::Deserializer::from_str(&text[m.end()..]).into_iter::<Value>();
        match values.next() {
            Some(Ok(value)) => return Some(value),
            Some(Err(e)) => warn!(error = %e, "Fusion.globalContent is not valid JSON"),
            None => {}
        }
    }
    warn!("Fusion.globalContent not found in HTML");
    None
}

/// Find the article array inside Fusion data.
pub fn article_list(fusion: &Value) -> Vec<Value> {
    let Some(result) = fusion.get("result") else {
        return Vec::new();
    };
    if let Value::Array(items) = result {
        return items.clone();
    }
    for path in ARTICLE_PATHS {
        let found = path
            .iter()
            .try_fold(result, |node, key| node.get(*key))
            .and_then(Value::as_array);
        if let Some(items) = found {
            return items.clone();
        }
    }
    Vec::new()
}

#[async_trait]
impl SourceFetcher for ReutersJapanFetcher {
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
        let html = session.get_text(&self.markets_url()).await?;
        let fusion = extract_fusion_data(&html)
            .ok_or_else(|| FetchError::new("Fusion.globalContent not found in markets page"))?;
        let articles = article_list(&fusion);
        if articles.is_empty() {
            return Err(FetchError::new("no article data in Fusion structure"));
        }

        let records: Vec<UnifiedRecord> = articles
            .iter()
            .filter_map(|a| self.parse_article(a))
            .take(limit)
            .collect();
        info!(found = articles.len(), count = records.len(), "Parsed Reuters Japan articles");
        Ok(records)
    }

    async fn validate_stage(&self, session: &Session, stage: Stage) -> StageOutcome {
        if stage != Stage::SiteSpecific {
            return StageOutcome::pass_with(format!("no {stage} checks for {NAME}"));
        }
        match session.get_text(&self.markets_url()).await {
            Ok(page) => check_markets_page(&page),
            Err(e) => StageOutcome::fail(format!("markets page not accessible: {e}")),
        }
    }
}

/// Judge a markets page: branding, Fusion data, and a usable sample article.
pub fn check_markets_page(page: &str) -> StageOutcome {
    if !page.contains("Reuters") && !page.contains("ロイター") {
        return StageOutcome::fail("Reuters Japan page content appears to have changed");
    }
    let Some(fusion) = extract_fusion_data(page) else {
        return StageOutcome::fail("failed to extract Fusion.globalContent");
    };
    let articles = article_list(&fusion);
    let Some(sample) = articles.first() else {
        return StageOutcome::fail("no article data found in Fusion structure");
    };

    let missing: Vec<&str> = ["id", "basic_headline", "canonical_url"]
        .into_iter()
        .filter(|k| sample.get(*k).is_none_or(Value::is_null))
        .collect();
    if !missing.is_empty() {
        return StageOutcome::fail(format!("sample article missing fields: {missing:?}"));
    }

    if articles.len() < 5 {
        StageOutcome::pass_with(format!("unusually few articles: {}", articles.len()))
    } else {
        StageOutcome::pass_with(format!("{} articles in Fusion data", articles.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><title>ロイター | Reuters</title></head><body>
<script>var x = 1;</script>
<script>
Fusion.globalContent = {"result": {"articles": [
  {"id": "ABC123", "basic_headline": "日経平均は続伸", "canonical_url": "/markets/japan/ABC123/",
   "description": "東京株式市場で日経平均は続伸した。",
   "authors": [{"name": "Taro Yamada"}],
   "display_date": "2024-03-01T06:30:00Z",
   "taxonomy": {"sections": [{"name": "Markets"}]}},
  {"id": "DEF456", "basic_headline": "ドル円相場", "canonical_url": "https://jp.reuters.com/markets/DEF456/",
   "authors": [{"first_name": "Hanako", "last_name": "Sato"}]},
  {"id": "", "basic_headline": "no id", "canonical_url": "/x/"},
  {"id": "GHI789", "basic_headline": "no url"}
]}};
Fusion.spa = true;
</script></body></html>"#;

    #[test]
    fn extracts_fusion_object_even_with_trailing_statements() {
        let fusion = extract_fusion_data(PAGE).unwrap();
        assert_eq!(article_list(&fusion).len(), 4);
    }

    #[test]
    fn missing_fusion_data_yields_none() {
        assert!(extract_fusion_data("<html><script>var a = 1;</script></html>").is_none());
    }

    #[test]
    fn finds_articles_under_alternative_paths() {
        let nested = serde_json::json!({"result": {"content": {"items": [{"id": 1}]}}});
        assert_eq!(article_list(&nested).len(), 1);
        let bare = serde_json::json!({"result": [{"id": 1}, {"id": 2}]});
        assert_eq!(article_list(&bare).len(), 2);
        let none = serde_json::json!({"result": {"other": []}});
        assert!(article_list(&none).is_empty());
    }

    #[test]
    fn parses_articles_and_skips_incomplete_ones() {
        let fetcher = ReutersJapanFetcher::default();
        let fusion = extract_fusion_data(PAGE).unwrap();
        let records: Vec<_> = article_list(&fusion)
            .iter()
            .filter_map(|a| fetcher.parse_article(a))
            .collect();

        assert_eq!(records.len(), 2);
        let first = &records[0];
        assert_eq!(first.id, "ABC123");
        assert_eq!(first.url.as_str(), "https://jp.reuters.com/markets/japan/ABC123/");
        assert_eq!(first.author.as_ref().unwrap().username, "Taro Yamada");
        assert_eq!(first.timestamp.unwrap().to_rfc3339(), "2024-03-01T06:30:00+00:00");
        assert_eq!(first.content.as_deref(), Some("東京株式市場で日経平均は続伸した。"));
        assert_eq!(first.metadata["reuters_id"], serde_json::json!("ABC123"));
        assert_eq!(first.metadata["type"], serde_json::json!("article"));

        let second = &records[1];
        assert_eq!(second.author.as_ref().unwrap().username, "Hanako Sato");
        assert!(second.timestamp.is_none());
    }

    #[test]
    fn author_defaults_to_reuters() {
        let data = serde_json::json!({"authors": []});
        assert_eq!(author_name(&data), "Reuters");
        let data = serde_json::json!({"authors": [{"first_name": "", "last_name": ""}]});
        assert_eq!(author_name(&data), "Reuters");
    }

    #[test]
    fn markets_page_check() {
        let outcome = check_markets_page(PAGE);
        assert!(outcome.passed, "{outcome:?}");
        assert!(outcome.message.unwrap().contains("unusually few"));

        assert!(!check_markets_page("<html>nothing here</html>").passed);
        let no_fusion = check_markets_page("<html>Reuters</html>");
        assert!(!no_fusion.passed);
    }
}
