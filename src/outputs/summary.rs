//! Plain-text run summary.

use crate::models::SessionResult;
use chrono::Utc;
use std::error::Error;
use std::fmt::Write;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Per-source status, counts, and errors, followed by totals.
pub fn render(session: &SessionResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Event Scraper - Scraping Summary");
    let _ = writeln!(out, "{}\n", "=".repeat(40));
    let _ = writeln!(out, "Export Time: {}", Utc::now().to_rfc3339());
    let _ = writeln!(out, "Started At: {}", session.started_at.to_rfc3339());
    let _ = writeln!(out, "Duration: {} ms\n", session.duration_ms);

    for source in session.sources() {
        let counts = session.counts.get(source);
        let _ = writeln!(out, "Site: {source}");
        if let Some(status) = session.status(source) {
            let _ = writeln!(out, "Status: {status}");
        }
        let _ = writeln!(out, "Retrieved: {}", session.records_for(source).len());
        if let Some(c) = counts {
            let _ = writeln!(out, "Requested: {}", c.requested);
            let _ = writeln!(out, "Duration: {} ms", c.duration_ms);
        }
        if let Some(e) = session.errors.get(source) {
            let _ = writeln!(out, "Error: {e}");
        }
        let _ = writeln!(out, "\n{}\n", "-".repeat(30));
    }

    let _ = writeln!(out, "Total Articles: {}", session.total_retrieved());
    let _ = writeln!(out, "Total Errors: {}", session.error_count());
    out
}

/// Write the text summary of `session` to `path`.
///
/// # Arguments
///
/// * `session` - The finished scrape to summarize
/// * `path` - Destination file, overwritten if present
///
/// # Returns
///
/// `Ok(())` on success, or an error if the file cannot be written.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_summary(session: &SessionResult, path: &Path) -> Result<(), Box<dyn Error>> {
    fs::write(path, render(session)).await?;
    info!("Wrote summary");
    Ok(())
}
