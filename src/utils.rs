//! Small helpers for logging and the file system.

use chrono::{DateTime, Utc};
use std::error::Error;
use std::fs as stdfs;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes, on a character boundary,
/// with `"…(+N bytes)"` appended.
///
/// # Arguments
///
/// * `s` - The string to potentially truncate
/// * `max` - Maximum number of bytes to keep
///
/// # Returns
///
/// The original string if it fits, otherwise the truncated prefix with the
/// dropped byte count appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

/// File stem for an export: `scraped_{sites}_{YYYYmmdd_HHMMSS}`.
///
/// More than three sites collapse to `multi`, so stems stay short.
///
/// # Arguments
///
/// * `sites` - Site names in the run
/// * `at` - Time used for the suffix, formatted in UTC
///
/// # Returns
///
/// The stem without directory or extension.
pub fn export_stem(sites: &[String], at: DateTime<Utc>) -> String {
    let label = match sites.len() {
        0 => "none".to_string(),
        1..=3 => sites.join("_"),
        _ => "multi".to_string(),
    };
    format!("scraped_{label}_{}", at.format("%Y%m%d_%H%M%S"))
}

/// Decide where an export goes and what its files are called.
///
/// With an explicit `output` path, its parent is the directory and its file
/// stem names the files, so `--output data/run.json` writes `data/run.json`,
/// `data/run.csv` and `data/run_summary.txt` as the format requires. Without
/// one, files go to `default_dir` under [`export_stem`].
///
/// # Arguments
///
/// * `output` - The `--output` path, if any
/// * `default_dir` - The configured output directory
/// * `sites` - Sites in this run, used for the generated stem
/// * `at` - Timestamp for the generated stem
///
/// # Returns
///
/// The directory to write into and the file stem to use.
pub fn export_target(
    output: Option<&Path>,
    default_dir: &Path,
    sites: &[String],
    at: DateTime<Utc>,
) -> (PathBuf, String) {
    let Some(output) = output else {
        return (default_dir.to_path_buf(), export_stem(sites, at));
    };
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| export_stem(sites, at));
    (dir, stem)
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and removes a probe file.
///
/// # Arguments
///
/// * `path` - Directory that exports will be written into
///
/// # Errors
///
/// Returns an error if the directory cannot be created or is not writable.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Output directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        // Each kana is three bytes; a cut at 4 must back off to 3.
        let result = truncate_for_log("ニュース", 4);
        assert_eq!(result, "ニ…(+9 bytes)");
    }

    #[test]
    fn test_export_stem() {
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 9, 5, 7).unwrap();
        assert_eq!(
            export_stem(&["hackernews".into()], at),
            "scraped_hackernews_20240304_090507"
        );
        let many: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        assert_eq!(export_stem(&many, at), "scraped_multi_20240304_090507");
    }

    #[test]
    fn test_export_target_without_output_uses_defaults() {
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 9, 5, 7).unwrap();
        let sites = vec!["hackernews".to_string()];
        let (dir, stem) = export_target(None, Path::new("output"), &sites, at);
        assert_eq!(dir, PathBuf::from("output"));
        assert_eq!(stem, "scraped_hackernews_20240304_090507");
    }

    #[test]
    fn test_export_target_treats_output_as_file_path() {
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 9, 5, 7).unwrap();
        let sites = vec!["hackernews".to_string()];

        let (dir, stem) = export_target(Some(Path::new("data.json")), Path::new("output"), &sites, at);
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(stem, "data");

        let (dir, stem) =
            export_target(Some(Path::new("exports/run.csv")), Path::new("output"), &sites, at);
        assert_eq!(dir, PathBuf::from("exports"));
        assert_eq!(stem, "run");

        let (dir, stem) = export_target(Some(Path::new("exports/run")), Path::new("output"), &sites, at);
        assert_eq!(dir, PathBuf::from("exports"));
        assert_eq!(stem, "run");
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_nested_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        ensure_writable_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert_eq!(stdfs::read_dir(&nested).unwrap().count(), 0);
    }
}
