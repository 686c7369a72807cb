//! Backup command implementation

use super::shared::{apply_cli_overrides, print_partial_snapshot_notice, print_summary, setup_logging};
use crate::app::services::backup_runner::{BackupRunner, BackupStats};
use crate::app::services::portal_client::PortalClient;
use crate::app::services::snapshot_store::SnapshotStore;
use crate::cli::args::Args;
use crate::cli::input::resolve_credentials;
use crate::config::BackupConfig;
use crate::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Run a complete backup
///
/// 1. Set up logging and configuration
/// 2. Resolve credentials, prompting for missing ones
/// 3. Reset the snapshot file
/// 4. Walk the portal and commit station by station
pub async fn run_backup(args: Args, cancellation: CancellationToken) -> Result<BackupStats> {
    setup_logging(&args)?;
    debug!("Command line arguments: {:?}", redacted(&args));

    let config = apply_cli_overrides(BackupConfig::default(), &args);
    config.validate()?;

    let credentials = resolve_credentials(args.username.clone(), args.password.clone())?;
    let client = PortalClient::new(config.portal.clone())?;

    let mut store = SnapshotStore::open(&config.output_path).await?;
    info!("Backing up {} as {}", config.portal.base_url, credentials.username);

    let result = BackupRunner::new(&client, &mut store)
        .with_progress(config.show_progress)
        .with_cancellation(cancellation)
        .run(&credentials)
        .await;
    store.close().await;

    match result {
        Ok(stats) => {
            if !args.quiet {
                print_summary(&stats, &config.output_path);
            }
            Ok(stats)
        }
        Err(e) => {
            error!("Backup failed: {}", e);
            print_partial_snapshot_notice(&config.output_path);
            Err(e)
        }
    }
}

/// Arguments with the password blanked for logging
fn redacted(args: &Args) -> Args {
    let mut args = args.clone();
    if args.password.is_some() {
        args.password = Some("<redacted>".to_string());
    }
    args
}
