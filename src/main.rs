use anyhow::Context;
use clap::Parser;
use salt_portal_backup::cli::{args::Args, commands};
use std::process;
use tokio_util::sync::CancellationToken;

fn main() {
    let args = Args::parse();

    // Create async runtime and run the backup with signal handling
    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let result: anyhow::Result<commands::BackupStats> = runtime.block_on(async {
        let cancellation_token = CancellationToken::new();

        let shutdown_signal = async {
            if tokio::signal::ctrl_c().await.is_err() {
                // no signal handler: never interrupt
                std::future::pending::<()>().await;
            }
            cancellation_token.cancel();
        };

        tokio::select! {
            result = commands::run(args, cancellation_token.clone()) => {
                result.context("Backup did not complete")
            }
            _ = shutdown_signal => {
                eprintln!("\nReceived CTRL+C, stopping; the station in progress is discarded");
                Err::<commands::BackupStats, _>(salt_portal_backup::Error::interrupted("Backup interrupted by user"))
                    .context("Backup did not complete")
            }
        }
    });

    match result {
        Ok(_stats) => process::exit(0),
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}
