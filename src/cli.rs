//! Command-line interface definitions for the event scraper.
//!
//! Every option falls back to `config/settings.yaml` (or the file given with
//! `--config`) when it is not supplied.

use crate::config::OutputFormat;
use clap::Parser;
use std::path::PathBuf;

/// Fetch recent items from news and discussion sites and export them.
///
/// # Examples
///
/// ```sh
/// # Scrape every enabled site with configured defaults
/// event_scraper
///
/// # Ten items each from two sites, written as JSON and CSV
/// event_scraper -s hackernews -s yahoo_news_japan -l 10 --format both
///
/// # Health-check the sites without exporting records
/// event_scraper --validate
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Sites to scrape (repeatable or comma-separated); defaults to every enabled site
    #[arg(short, long = "sites", value_delimiter = ',')]
    pub sites: Vec<String>,

    /// Maximum records per site
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Output file path; its directory and file stem name every exported file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Export format
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// List registered sites and exit
    #[arg(long)]
    pub list_sites: bool,

    /// Run the validation stages instead of scraping
    #[arg(long)]
    pub validate: bool,

    /// Whole-run deadline in seconds
    #[arg(long)]
    pub deadline: Option<f64>,

    /// Optional path to settings.yaml
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
