//! Bundled fetchers against local stand-ins for the real sites.

mod common;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use common::serve;
use event_scraper::config::{OutputFormat, Settings};
use event_scraper::manager::ScraperManager;
use event_scraper::models::{SourceStatus, StageStatus};
use event_scraper::outputs::export_session;
use event_scraper::scrapers::build_registry;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const REUTERS_PAGE: &str = r#"<html><head><title>ロイター</title></head><body>
<script>Fusion.globalContent = {"result": {"content": {"articles": [
  {"id": "R1", "basic_headline": "東証大引け", "canonical_url": "/markets/japan/R1/",
   "display_date": "2024-05-01T06:00:00Z"},
  {"id": "R2", "basic_headline": "為替相場", "canonical_url": "/markets/currencies/R2/"}
]}}};</script></body></html>"#;

const YAHOO_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel>
  <title>Yahoo!ニュース</title>
  <item><title>記事一</title><link>https://news.yahoo.co.jp/pickup/100</link>
        <pubDate>Wed, 01 May 2024 10:00:00 GMT</pubDate></item>
  <item><title>記事二</title><link>https://news.yahoo.co.jp/pickup/101</link>
        <pubDate>Wed, 01 May 2024 11:00:00 GMT</pubDate></item>
</channel></rss>"#;

async fn hn_item(Path(file): Path<String>) -> Result<Json<Value>, StatusCode> {
    let id: u64 = file
        .trim_end_matches(".json")
        .parse()
        .map_err(|_| StatusCode::BAD_REQUEST)?;
    if id > 2 {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(json!({
        "id": id,
        "type": "story",
        "title": format!("Story {id}"),
        "by": "alice",
        "time": 1714550400 + id,
        "score": 10 * id,
        "descendants": id,
        "url": format!("https://example.com/{id}")
    })))
}

async fn sites() -> Settings {
    let hn = serve(
        Router::new()
            .route("/", get(|| async { "<title>Hacker News</title>" }))
            .route("/v0/topstories.json", get(|| async { Json(vec![1u64, 2, 3]) }))
            .route("/v0/item/{file}", get(hn_item)),
    )
    .await;
    let reuters = serve(
        Router::new()
            .route("/", get(|| async { "Reuters" }))
            .route("/markets/", get(|| async { REUTERS_PAGE })),
    )
    .await;
    let yahoo = serve(
        Router::new()
            .route("/", get(|| async { "Yahoo!ニュース" }))
            .route("/rss.xml", get(|| async { YAHOO_RSS })),
    )
    .await;

    let yaml = format!(
        r#"
defaults:
  timeout: 5
sites:
  hackernews:
    enabled: true
    base_url: {hn}
    api_base: {hn}/v0
    rate_limit: 0.01
  reuters_japan:
    enabled: true
    base_url: {reuters}
    rate_limit: 0.01
  yahoo_news_japan:
    enabled: true
    base_url: {yahoo}
    rss_url: {yahoo}/rss.xml
    rate_limit: 0.01
"#
    );
    Settings::from_yaml_str(&yaml).unwrap()
}

async fn manager() -> ScraperManager {
    let settings = sites().await;
    let registry = build_registry(&settings).unwrap();
    ScraperManager::new(registry, settings.defaults.concurrent_requests)
}

#[tokio::test]
async fn scrapes_all_bundled_sources() {
    let m = manager().await;
    let result = m
        .scrape(&["hackernews", "reuters_japan", "yahoo_news_japan"], 2, None)
        .await
        .unwrap();

    assert_eq!(result.error_count(), 0, "{:?}", result.errors);

    let hn = result.records_for("hackernews");
    assert_eq!(hn.len(), 2);
    assert_eq!(hn[0].id, "1");
    assert_eq!(hn[1].title, "Story 2");
    assert_eq!(hn[0].author.as_ref().unwrap().username, "alice");

    let reuters = result.records_for("reuters_japan");
    assert_eq!(reuters.len(), 2);
    assert!(reuters[0].url.path().ends_with("/markets/japan/R1/"));
    assert_eq!(reuters[0].author.as_ref().unwrap().username, "Reuters");

    let yahoo = result.records_for("yahoo_news_japan");
    assert_eq!(yahoo.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["100", "101"]);
}

#[tokio::test]
async fn missing_story_details_give_partial_results() {
    let m = manager().await;
    let result = m.scrape(&["hackernews"], 3, None).await.unwrap();

    assert_eq!(result.status("hackernews"), Some(SourceStatus::Partial));
    assert_eq!(result.records_for("hackernews").len(), 2);
    assert!(result.errors["hackernews"].message.contains("404"));
}

#[tokio::test]
async fn bundled_sources_pass_validation() {
    let m = manager().await;
    let reports = m.validate_all().await;
    assert_eq!(reports.len(), 3);
    for (name, report) in &reports {
        assert!(report.passed, "{name}: {:?}", report.first_failure());
        assert!(report.stages.iter().all(|s| s.status == StageStatus::Pass));
    }
}

#[tokio::test]
async fn scraped_session_exports_to_disk() {
    let m = manager().await;
    let result = m
        .scrape(&["reuters_japan", "yahoo_news_japan"], 5, None)
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let written = export_session(&result, OutputFormat::Both, dir.path(), "run")
        .await
        .unwrap();
    assert_eq!(written.len(), 3);

    let csv = std::fs::read_to_string(dir.path().join("run.csv")).unwrap();
    // Header plus two Reuters and two Yahoo rows.
    assert_eq!(csv.lines().count(), 5);

    let json: Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("run.json")).unwrap())
            .unwrap();
    assert_eq!(json["sources"], json!(["reuters_japan", "yahoo_news_japan"]));
}

type Arrivals = Arc<Mutex<Vec<Instant>>>;

/// A Hacker News stand-in that records when each request arrives, with the
/// given `rate_limit` configured for the source.
async fn timed_hackernews(rate_limit: f64) -> (ScraperManager, Arrivals) {
    let arrivals: Arrivals = Arc::default();
    let stamp = |arrivals: &Arrivals| {
        let arrivals = Arc::clone(arrivals);
        move || arrivals.lock().unwrap().push(Instant::now())
    };

    let home = stamp(&arrivals);
    let top = stamp(&arrivals);
    let item = stamp(&arrivals);
    let hn = serve(
        Router::new()
            .route(
                "/",
                get(move || {
                    home();
                    async { "<title>Hacker News</title>" }
                }),
            )
            .route(
                "/v0/topstories.json",
                get(move || {
                    top();
                    async { Json(vec![1u64, 2]) }
                }),
            )
            .route(
                "/v0/item/{file}",
                get(move |path: Path<String>| {
                    item();
                    hn_item(path)
                }),
            ),
    )
    .await;

    let yaml = format!(
        "sites:\n  hackernews:\n    enabled: true\n    base_url: {hn}\n    api_base: {hn}/v0\n    rate_limit: {rate_limit}\n"
    );
    let settings = Settings::from_yaml_str(&yaml).unwrap();
    let registry = build_registry(&settings).unwrap();
    (ScraperManager::new(registry, 4), arrivals)
}

fn assert_spaced(arrivals: &Arrivals, expected: usize, interval: Duration) {
    let mut seen = arrivals.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen.len(), expected, "{seen:?}");
    // Arrival gaps can shrink slightly relative to send gaps.
    let slack = Duration::from_millis(20);
    for pair in seen.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap + slack >= interval, "gap {gap:?} below {interval:?}");
    }
}

#[tokio::test]
async fn every_story_request_respects_the_rate_limit() {
    let (m, arrivals) = timed_hackernews(0.15).await;
    let result = m.scrape(&["hackernews"], 2, None).await.unwrap();
    assert_eq!(result.records_for("hackernews").len(), 2);

    // topstories.json plus one detail request per story.
    assert_spaced(&arrivals, 3, Duration::from_millis(150));
}

#[tokio::test]
async fn validation_requests_respect_the_rate_limit() {
    let (m, arrivals) = timed_hackernews(0.1).await;
    let reports = m.validate(&["hackernews"]).await.unwrap();
    assert!(reports["hackernews"].passed, "{:?}", reports["hackernews"]);

    // Connectivity 1, data fetch 2, site check 3.
    assert_spaced(&arrivals, 6, Duration::from_millis(100));
}
