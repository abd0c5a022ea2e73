//! # Event Scraper CLI
//!
//! Scrapes the configured sites concurrently and exports the combined
//! records, or runs the per-site validation stages.
//!
//! ## Usage
//!
//! ```sh
//! event_scraper -s hackernews -l 10 --format both
//! event_scraper --list-sites
//! event_scraper --validate
//! ```
//!
//! Log verbosity comes from `RUST_LOG` when set, otherwise from `--verbose`
//! (debug), otherwise from `logging.level` in the settings file.

use chrono::Utc;
use clap::Parser;
use event_scraper::cli::Cli;
use event_scraper::config::Settings;
use event_scraper::manager::ScraperManager;
use event_scraper::models::SessionResult;
use event_scraper::outputs::{self, json};
use event_scraper::scrapers;
use event_scraper::utils::{ensure_writable_dir, export_target, truncate_for_log};
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();

    // Settings are read before tracing is up so the configured level applies.
    let settings = Settings::load(args.config.as_deref())?;

    // --- Tracing init ---
    let fallback = if args.verbose {
        "debug".to_string()
    } else {
        settings.logging.level.clone()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!(
        config = ?args.config,
        enabled = ?settings.enabled_sites(),
        "event_scraper starting up"
    );
    debug!(?args, "Parsed CLI arguments");

    let registry = scrapers::build_registry(&settings)?;
    let manager = ScraperManager::new(registry, settings.defaults.concurrent_requests);

    if args.list_sites {
        println!("Available sites:");
        for d in manager.list_sources() {
            let state = if d.enabled { "enabled" } else { "disabled" };
            println!("  - {} ({state}) {}", d.name, d.transport.base_url);
        }
        return Ok(());
    }

    let sites = if args.sites.is_empty() {
        settings.enabled_sites()
    } else {
        args.sites.clone()
    };
    let (output_dir, stem) = export_target(
        args.output.as_deref(),
        &settings.defaults.output_dir,
        &sites,
        Utc::now(),
    );
    if let Err(e) = ensure_writable_dir(&output_dir).await {
        error!(
            path = %output_dir.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    if args.validate {
        return run_validation(&manager, &args.sites, &output_dir).await;
    }

    if sites.is_empty() {
        error!("No sites selected and none enabled in configuration");
        return Err("no sites to scrape; pass --sites or enable one in the settings file".into());
    }

    let limit = args.limit.unwrap_or(settings.defaults.limit);
    let format = args.format.unwrap_or(settings.defaults.output_format);
    let deadline = args
        .deadline
        .map(Duration::try_from_secs_f64)
        .transpose()
        .map_err(|e| format!("invalid --deadline: {e}"))?;

    let session = manager.scrape(&sites, limit, deadline).await.map_err(|e| {
        error!(error = %e, "Scrape rejected");
        e
    })?;

    let written = outputs::export_session(&session, format, &output_dir, &stem).await?;
    for path in &written {
        println!("Wrote {}", path.display());
    }
    print_summary(&session);
    Ok(())
}

#[instrument(level = "info", skip_all)]
async fn run_validation(
    manager: &ScraperManager,
    sites: &[String],
    output_dir: &std::path::Path,
) -> Result<(), Box<dyn Error>> {
    let reports = if sites.is_empty() {
        manager.validate_all().await
    } else {
        manager.validate(sites).await?
    };

    let path = output_dir.join(format!(
        "validation_{}.json",
        Utc::now().format("%Y%m%d_%H%M%S")
    ));
    json::write_validation(&reports, &path).await?;

    println!("\nValidation results:");
    for (name, report) in &reports {
        let verdict = if report.passed { "PASS" } else { "FAIL" };
        match report.first_failure() {
            Some(stage) => println!(
                "  {name}: {verdict} at {} ({})",
                stage.stage,
                truncate_for_log(stage.message.as_deref().unwrap_or(""), 200)
            ),
            None => println!("  {name}: {verdict} ({} ms)", report.duration_ms),
        }
    }
    println!("Report written to {}", path.display());
    Ok(())
}

fn print_summary(session: &SessionResult) {
    println!("\nScraping finished in {} ms:", session.duration_ms);
    println!("  Records: {}", session.total_retrieved());
    println!("  Errors: {}", session.error_count());
    for source in session.sources() {
        let count = session.records_for(source).len();
        match session.errors.get(source) {
            Some(e) => println!(
                "  {source}: {count} records, {}",
                truncate_for_log(&e.to_string(), 200)
            ),
            None => println!("  {source}: {count} records"),
        }
    }
}
