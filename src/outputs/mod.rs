//! Export of scrape sessions and validation reports.
//!
//! # Submodules
//!
//! - [`json`]: pretty JSON for sessions and validation reports
//! - [`csv`]: one row per record
//! - [`summary`]: human-readable per-source counts and errors
//!
//! # Output Structure
//!
//! All files of one run share a stem, either the `--output` file stem or one
//! from [`export_stem`](crate::utils::export_stem):
//!
//! ```text
//! output_dir/
//! ├── scraped_hackernews_20250506_093000.json
//! ├── scraped_hackernews_20250506_093000.csv
//! └── scraped_hackernews_20250506_093000_summary.txt
//! ```

pub mod csv;
pub mod json;
pub mod summary;

use crate::config::OutputFormat;
use crate::models::SessionResult;
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Write `session` in `format` under `dir` using `stem` for file names.
///
/// The summary file is written for every format.
///
/// # Arguments
///
/// * `session` - The finished scrape to export
/// * `format` - Which record files to write
/// * `dir` - Existing, writable output directory
/// * `stem` - File name without extension, shared by every file
///
/// # Returns
///
/// The paths written, record files first and the summary last.
///
/// # Errors
///
/// Fails on the first file that cannot be serialized or written. Files
/// written before the failure are left in place.
#[instrument(level = "info", skip(session), fields(dir = %dir.display()))]
pub async fn export_session(
    session: &SessionResult,
    format: OutputFormat,
    dir: &Path,
    stem: &str,
) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    let mut written = Vec::new();

    if matches!(format, OutputFormat::Json | OutputFormat::Both) {
        let path = dir.join(format!("{stem}.json"));
        json::write_session(session, &path).await?;
        written.push(path);
    }
    if matches!(format, OutputFormat::Csv | OutputFormat::Both) {
        let path = dir.join(format!("{stem}.csv"));
        csv::write_records(session, &path).await?;
        written.push(path);
    }

    let path = dir.join(format!("{stem}_summary.txt"));
    summary::write_summary(session, &path).await?;
    written.push(path);

    info!(files = written.len(), "Export finished");
    Ok(written)
}
