//! Command-line argument definitions for the Salt Portal backup
//!
//! A single command: sign in, back everything up, write one snapshot file.

use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for the Salt Portal backup
#[derive(Debug, Clone, Parser)]
#[command(
    name = "salt-portal-backup",
    version,
    about = "Back up Salt Portal projects, stations, measurements and calibrations to SQLite",
    long_about = "Signs in to Salt Portal and copies the station roster together with every \
                  station's measurements, calibrations and raw CSV exports into a single SQLite \
                  file. Each run writes a fresh snapshot; an existing file at the output path \
                  is emptied first. If a run fails, the file holds the stations committed \
                  before the failure and nothing after it."
)]
pub struct Args {
    /// Portal username (prompted when omitted)
    #[arg(
        short = 'u',
        long = "username",
        env = "SALT_PORTAL_USERNAME",
        value_name = "USER"
    )]
    pub username: Option<String>,

    /// Portal password (prompted when omitted)
    #[arg(
        short = 'p',
        long = "password",
        env = "SALT_PORTAL_PASSWORD",
        hide_env_values = true,
        value_name = "PASS"
    )]
    pub password: Option<String>,

    /// Snapshot file to write
    ///
    /// Defaults to salt_portal_YYYYMMDD_HHMMSS.db in the home directory.
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    pub output_path: Option<PathBuf>,

    /// Portal origin, e.g. a staging instance
    #[arg(long = "portal-url", value_name = "URL")]
    pub portal_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long = "timeout", value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Increase logging verbosity
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Only show errors
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Suppress output except errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,
}

impl Args {
    /// Log level derived from the verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    /// Progress bars are shown unless quiet
    pub fn show_progress(&self) -> bool {
        !self.quiet
    }
}
