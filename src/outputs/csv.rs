//! CSV export: one row per record across all sources, RFC 4180 quoting.

use crate::models::{SessionResult, UnifiedRecord};
use std::error::Error;
use std::fmt::Write;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

pub const HEADER: [&str; 15] = [
    "site",
    "retrieved_at",
    "article_id",
    "title",
    "url",
    "content",
    "author_username",
    "author_profile_url",
    "author_karma",
    "timestamp",
    "score",
    "comments_count",
    "tags",
    "source_url",
    "metadata",
];

/// Quote a field when it contains a delimiter, quote, or line break.
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn row(site: &str, r: &UnifiedRecord) -> Vec<String> {
    let author = r.author.as_ref();
    vec![
        site.to_string(),
        r.retrieved_at.to_rfc3339(),
        r.id.clone(),
        r.title.clone(),
        r.url.to_string(),
        r.content.clone().unwrap_or_default(),
        author.map(|a| a.username.clone()).unwrap_or_default(),
        author
            .and_then(|a| a.profile_url.as_ref())
            .map(ToString::to_string)
            .unwrap_or_default(),
        author.and_then(|a| a.karma).unwrap_or(0).to_string(),
        r.timestamp.map(|t| t.to_rfc3339()).unwrap_or_default(),
        r.score.unwrap_or(0).to_string(),
        r.comments_count.to_string(),
        r.tags.join(","),
        r.source_url.as_ref().map(ToString::to_string).unwrap_or_default(),
        serde_json::to_string(&r.metadata).unwrap_or_default(),
    ]
}

/// Render every record of `session` as CSV text, sources in name order.
pub fn render(session: &SessionResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", HEADER.join(","));
    for (site, records) in &session.records {
        for r in records {
            let line: Vec<String> = row(site, r).iter().map(|f| escape(f)).collect();
            let _ = writeln!(out, "{}", line.join(","));
        }
    }
    out
}

/// Write every record of `session` to a CSV file.
///
/// One header row, then one row per record, with fields quoted per
/// RFC 4180 where needed.
///
/// # Arguments
///
/// * `session` - The finished scrape whose records are exported
/// * `path` - Destination file, overwritten if present
///
/// # Returns
///
/// `Ok(())` on success, or an error if the file cannot be written.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_records(session: &SessionResult, path: &Path) -> Result<(), Box<dyn Error>> {
    fs::write(path, render(session)).await?;
    info!(rows = session.total_retrieved(), "Wrote CSV");
    Ok(())
}
