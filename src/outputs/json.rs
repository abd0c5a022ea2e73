//! JSON export.
//!
//! Sessions are written as
//! `{ "exported_at": ..., "sources": [...], "session": SessionResult }` and
//! validation runs as `{ "exported_at": ..., "reports": {name: report} }`,
//! both pretty-printed.

use crate::models::{SessionResult, ValidationReport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

#[derive(Serialize)]
struct SessionExport<'a> {
    exported_at: DateTime<Utc>,
    sources: Vec<&'a str>,
    session: &'a SessionResult,
}

#[derive(Serialize)]
struct ValidationExport<'a> {
    exported_at: DateTime<Utc>,
    reports: &'a BTreeMap<String, ValidationReport>,
}

/// Write a [`SessionResult`] to a pretty-printed JSON file.
///
/// # Arguments
///
/// * `session` - The finished scrape to serialize
/// * `path` - Destination file, overwritten if present
///
/// # Returns
///
/// `Ok(())` on success, or an error if serialization or the write fails.
///
/// # Output Shape
///
/// `{ "exported_at": ..., "sources": [...], "session": {...} }` with
/// `sources` in name order.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_session(session: &SessionResult, path: &Path) -> Result<(), Box<dyn Error>> {
    let export = SessionExport {
        exported_at: Utc::now(),
        sources: session.sources().into_iter().collect(),
        session,
    };
    write_pretty(&export, path).await?;
    info!(records = session.total_retrieved(), "Wrote session JSON");
    Ok(())
}

/// Write validation reports to a pretty-printed JSON file.
///
/// # Arguments
///
/// * `reports` - One report per source, keyed by source name
/// * `path` - Destination file, overwritten if present
///
/// # Returns
///
/// `Ok(())` on success, or an error if serialization or the write fails.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_validation(
    reports: &BTreeMap<String, ValidationReport>,
    path: &Path,
) -> Result<(), Box<dyn Error>> {
    let export = ValidationExport {
        exported_at: Utc::now(),
        reports,
    };
    write_pretty(&export, path).await?;
    info!(reports = reports.len(), "Wrote validation JSON");
    Ok(())
}

async fn write_pretty<T: Serialize>(value: &T, path: &Path) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(value)?;
    if let Err(e) = fs::write(path, json).await {
        error!(path = %path.display(), error = %e, "Failed to write JSON");
        return Err(e.into());
    }
    Ok(())
}
