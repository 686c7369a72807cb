//! Shared pieces of the backup command: logging, configuration and reporting

use crate::app::services::backup_runner::BackupStats;
use crate::cli::args::Args;
use crate::config::BackupConfig;
use crate::{Error, Result};
use colored::*;
use indicatif::HumanDuration;
use std::path::Path;
use tracing::debug;

/// Set up structured logging on stderr
pub fn setup_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("salt_portal_backup={}", log_level)));

    let result = if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    result.map_err(|e| Error::configuration(format!("Failed to initialise logging: {}", e)))?;

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

/// Apply command-line overrides to the configuration
pub fn apply_cli_overrides(mut config: BackupConfig, args: &Args) -> BackupConfig {
    if let Some(output_path) = &args.output_path {
        config = config.with_output_path(output_path.clone());
    }
    if let Some(portal_url) = &args.portal_url {
        config = config.with_portal_url(portal_url.clone());
    }
    if let Some(timeout_secs) = args.timeout_secs {
        config = config.with_request_timeout_secs(timeout_secs);
    }
    if !args.show_progress() {
        config = config.without_progress();
    }
    config
}

/// Print the run summary to stdout
pub fn print_summary(stats: &BackupStats, output_path: &Path) {
    println!();
    println!("{}", "Salt Portal backup complete".bright_green().bold());
    println!("  Portal version:   {}", stats.portal_version);
    println!("  Projects:         {}", stats.projects);
    println!("  Stations:         {}", stats.stations);
    println!(
        "  Measurements:     {} ({} with CSV)",
        stats.measurements, stats.measurement_files
    );
    println!("  Calibrations:     {}", stats.calibrations);
    println!("  Groups:           {}", stats.groups);
    if stats.unlinked_rows > 0 {
        println!(
            "  {} {}",
            "Raw export only:".yellow(),
            stats.unlinked_rows.to_string().yellow()
        );
    }
    println!("  Time:             {}", HumanDuration(stats.elapsed));
    println!("  Snapshot:         {}", output_path.display().to_string().cyan());
}

/// Print the failure notice for a partially written snapshot
pub fn print_partial_snapshot_notice(output_path: &Path) {
    eprintln!(
        "{} {} only holds the stations committed before the failure.",
        "Note:".yellow().bold(),
        output_path.display()
    );
}
