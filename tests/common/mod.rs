//! Shared helpers for integration tests: a scriptable fetcher and a local
//! HTTP server.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use event_scraper::error::FetchError;
use event_scraper::fetcher::SourceFetcher;
use event_scraper::models::{Stage, StageOutcome, UnifiedRecord};
use event_scraper::registry::SourceDescriptor;
use event_scraper::session::Session;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use url::Url;

/// What a [`FakeFetcher`] does once its delay has elapsed.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Emit this many records regardless of the limit.
    Records(usize),
    /// Emit `limit` records, as a well-behaved fetcher would.
    UpToLimit,
    Fail(String),
    /// Emit records, then fail.
    Partial(usize, String),
    Panic(String),
    /// Emit records whose titles are empty.
    Malformed,
}

/// Call statistics shared between a fake and the test body.
#[derive(Debug, Default)]
pub struct Probe {
    pub calls: AtomicUsize,
    pub completed: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub starts: Mutex<Vec<Instant>>,
}

impl Probe {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> Vec<Instant> {
        self.starts.lock().unwrap().clone()
    }
}

pub struct FakeFetcher {
    pub name: String,
    pub base_url: String,
    pub delay: Duration,
    pub behavior: Behavior,
    pub site_check: Option<String>,
    pub probe: Arc<Probe>,
}

impl FakeFetcher {
    pub fn new(name: &str, behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            base_url: "http://127.0.0.1:9/".to_string(),
            delay: Duration::ZERO,
            behavior,
            site_check: None,
            probe: Arc::new(Probe::default()),
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// Make the site-specific stage fail with `message`.
    pub fn failing_site_check(mut self, message: &str) -> Self {
        self.site_check = Some(message.to_string());
        self
    }

    /// Wrap into a descriptor with throttling disabled; returns the probe.
    pub fn descriptor(self) -> (SourceDescriptor, Arc<Probe>) {
        let probe = Arc::clone(&self.probe);
        let descriptor = SourceDescriptor::new(Arc::new(self)).with_rate_limit(Duration::ZERO);
        (descriptor, probe)
    }

    fn records(&self, n: usize) -> Vec<UnifiedRecord> {
        (0..n)
            .map(|i| {
                UnifiedRecord::new(
                    format!("{}-{i}", self.name),
                    format!("{} story {i}", self.name),
                    Url::parse(&format!("https://example.com/{}/{i}", self.name)).unwrap(),
                    self.name.clone(),
                )
            })
            .collect()
    }
}

struct InFlight<'a>(&'a Probe);

impl<'a> InFlight<'a> {
    fn enter(probe: &'a Probe) -> Self {
        let now = probe.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        probe.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(probe)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SourceFetcher for FakeFetcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch(
        &self,
        session: &Session,
        limit: usize,
    ) -> Result<Vec<UnifiedRecord>, FetchError> {
        self.probe.calls.fetch_add(1, Ordering::SeqCst);
        // Stands in for the one request a real fetcher would send.
        session.throttle().await;
        self.probe.starts.lock().unwrap().push(Instant::now());
        let _guard = InFlight::enter(&self.probe);

        tokio::time::sleep(self.delay).await;

        let result = match &self.behavior {
            Behavior::Records(n) => Ok(self.records(*n)),
            Behavior::UpToLimit => Ok(self.records(limit)),
            Behavior::Fail(reason) => Err(FetchError::new(reason.clone())),
            Behavior::Partial(n, reason) => {
                Err(FetchError::new(reason.clone()).with_partial(self.records(*n)))
            }
            Behavior::Panic(message) => panic!("{message}"),
            Behavior::Malformed => {
                let mut records = self.records(2);
                for r in &mut records {
                    r.title.clear();
                }
                Ok(records)
            }
        };
        self.probe.completed.fetch_add(1, Ordering::SeqCst);
        result
    }

    async fn validate_stage(&self, _session: &Session, stage: Stage) -> StageOutcome {
        match (&self.site_check, stage) {
            (Some(message), Stage::SiteSpecific) => StageOutcome::fail(message.clone()),
            _ => StageOutcome::pass(),
        }
    }
}

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// A server that answers `GET /` with a short page.
pub async fn hello_server() -> String {
    use axum::routing::get;
    serve(Router::new().route("/", get(|| async { "hello" }))).await
}
