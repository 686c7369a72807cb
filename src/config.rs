//! Configuration management and validation.
//!
//! Provides the configuration for a backup run: which portal to talk to,
//! how requests are made, and where the snapshot is written.

use crate::constants::{
    DEFAULT_PORTAL_URL, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_USER_AGENT,
    default_snapshot_filename,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Portal connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Portal origin, without trailing slash
    pub base_url: String,

    /// User agent sent with every request
    pub user_agent: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PORTAL_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl PortalConfig {
    /// Absolute URL for a portal path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Request timeout as a duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Global configuration for a backup run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Portal connection settings
    pub portal: PortalConfig,

    /// Snapshot file to write
    pub output_path: PathBuf,

    /// Show progress bars while walking projects and stations
    pub show_progress: bool,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            portal: PortalConfig::default(),
            output_path: Self::default_output_path(),
            show_progress: true,
        }
    }
}

impl BackupConfig {
    /// Timestamped snapshot in the user's home directory
    pub fn default_output_path() -> PathBuf {
        let filename = default_snapshot_filename(chrono::Local::now());
        match dirs::home_dir() {
            Some(home) => home.join(filename),
            None => PathBuf::from(filename),
        }
    }

    /// Create configuration with a custom output path
    pub fn with_output_path(mut self, output_path: PathBuf) -> Self {
        self.output_path = output_path;
        self
    }

    /// Create configuration against a different portal origin
    pub fn with_portal_url(mut self, base_url: impl Into<String>) -> Self {
        self.portal.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the per-request timeout
    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.portal.request_timeout_secs = secs;
        self
    }

    /// Disable progress bars
    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Validate the configuration before a run
    pub fn validate(&self) -> Result<()> {
        let base = &self.portal.base_url;
        if !(base.starts_with("https://") || base.starts_with("http://")) {
            return Err(Error::configuration(format!(
                "Portal URL must start with http:// or https://: {}",
                base
            )));
        }

        if self.portal.request_timeout_secs == 0 {
            return Err(Error::configuration(
                "Request timeout must be greater than 0 seconds".to_string(),
            ));
        }

        if self.output_path.as_os_str().is_empty() {
            return Err(Error::configuration(
                "Output path cannot be empty".to_string(),
            ));
        }

        if self.output_path.is_dir() {
            return Err(Error::configuration(format!(
                "Output path is a directory: {}",
                self.output_path.display()
            )));
        }

        debug!("Configuration validated: {:?}", self);
        Ok(())
    }
}
