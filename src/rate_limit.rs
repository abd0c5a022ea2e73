//! Per-source request spacing.
//!
//! A [`RateLimiter`] guarantees that two acquisitions for the same source are
//! at least `interval` apart. Different sources own different limiters, so
//! cross-source parallelism is never throttled.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct RateLimiter {
    source: String,
    interval: Duration,
    /// Held across the wait so overlapping callers queue in FIFO order.
    last: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(source: impl Into<String>, interval: Duration) -> Self {
        Self {
            source: source.into(),
            interval,
            last: Mutex::new(None),
        }
    }

    /// Build a limiter from a configured interval in seconds.
    ///
    /// Zero, negative, non-finite, or unrepresentably large values disable
    /// throttling and log a warning once, here.
    pub fn from_secs_f64(source: impl Into<String>, secs: f64) -> Self {
        let source = source.into();
        let interval = match Duration::try_from_secs_f64(secs) {
            Ok(interval) if interval.is_zero() => {
                warn!(%source, rate_limit = secs, "Zero rate limit; throttling disabled");
                Duration::ZERO
            }
            Ok(interval) if Instant::now().checked_add(interval).is_some() => interval,
            Ok(_) => {
                warn!(%source, rate_limit = secs, "Rate limit out of range; throttling disabled");
                Duration::ZERO
            }
            Err(e) => {
                warn!(%source, rate_limit = secs, error = %e, "Unusable rate limit; throttling disabled");
                Duration::ZERO
            }
        };
        Self::new(source, interval)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the interval since the previous acquisition has elapsed,
    /// then record this acquisition.
    pub async fn acquire(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev.checked_add(self.interval).unwrap_or(prev);
            if ready_at > Instant::now() {
                debug!(
                    source = %self.source,
                    wait_ms = (ready_at - Instant::now()).as_millis() as u64,
                    "Rate limiter waiting"
                );
                sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}
