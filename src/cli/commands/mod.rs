//! Command implementations for the Salt Portal backup CLI

pub mod backup;
pub mod shared;

pub use crate::app::services::backup_runner::BackupStats;

use crate::Result;
use crate::cli::args::Args;
use tokio_util::sync::CancellationToken;

/// Main command runner
pub async fn run(args: Args, cancellation: CancellationToken) -> Result<BackupStats> {
    backup::run_backup(args, cancellation).await
}
