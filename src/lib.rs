//! Salt Portal Backup Library
//!
//! A Rust library for taking an offline, versioned snapshot of the Salt Portal
//! hydrological web portal into a single SQLite file.
//!
//! This library provides tools for:
//! - Signing in to the portal and carrying its anti-forgery token across requests
//! - Fetching the station roster and the per-station CSV exports and HTML page
//! - Correlating CSV rows with the identifiers only present in the HTML tables
//! - Mapping reconciled rows to typed records
//! - Committing each station's records as one atomic unit

pub mod config;
pub mod constants;

// Core application modules
pub mod app {
    pub mod models;
    pub mod services {
        pub mod backup_runner;
        pub mod correlator;
        pub mod portal_client;
        pub mod record_mapper;
        pub mod roster;
        pub mod snapshot_store;
        pub mod station_page;
    }
}

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
    pub mod input;
}

// Re-export commonly used types
pub use app::models::{Project, Station};
pub use config::BackupConfig;

/// Result type alias for the backup pipeline
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for a backup run
///
/// None of these are recovered locally. Each one aborts the run; stations
/// committed before the failure stay in the snapshot.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The portal rejected the credentials
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// An expected page element or form field is missing
    #[error("Unexpected portal response from {url}: {message}")]
    Protocol { url: String, message: String },

    /// Transport failure, non-success HTTP status, or a payload that cannot be read
    #[error("Failed to fetch {resource}: {message}")]
    Fetch {
        resource: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// CSV export and HTML table disagree
    #[error("Correlation failed for station {station_id} ({kind}), row {row}: {message}")]
    Correlation {
        station_id: i64,
        kind: String,
        row: usize,
        message: String,
    },

    /// A required field could not be coerced
    #[error("Mapping error for field '{field}': {message}")]
    Mapping { field: String, message: String },

    /// Snapshot database error
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: sqlx::Error,
    },

    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Run interrupted
    #[error("Backup interrupted: {reason}")]
    Interrupted { reason: String },
}

impl Error {
    /// Create an authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Create a protocol error for a page that no longer looks as expected
    pub fn protocol(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a fetch error with the underlying transport error
    pub fn fetch(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Fetch {
            resource: url.into(),
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a fetch error for an unexpected HTTP status
    pub fn fetch_status(url: impl Into<String>, status: u16) -> Self {
        Self::Fetch {
            resource: url.into(),
            message: format!("HTTP status {}", status),
            source: None,
        }
    }

    /// Create a fetch error for a CSV payload that could not be parsed
    pub fn unreadable_csv(
        resource: impl Into<String>,
        message: impl Into<String>,
        source: csv::Error,
    ) -> Self {
        Self::Fetch {
            resource: resource.into(),
            message: format!("{}: {}", message.into(), source),
            source: Some(Box::new(source)),
        }
    }

    /// Create a correlation error
    pub fn correlation(
        station_id: i64,
        kind: impl Into<String>,
        row: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::Correlation {
            station_id,
            kind: kind.into(),
            row,
            message: message.into(),
        }
    }

    /// Create a mapping error
    pub fn mapping(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Mapping {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a database error with context
    pub fn database(message: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Database {
            message: message.into(),
            source,
        }
    }

    /// Create an I/O error with context
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an interrupted error
    pub fn interrupted(reason: impl Into<String>) -> Self {
        Self::Interrupted {
            reason: reason.into(),
        }
    }
}

// Automatic conversions from common error types
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: "I/O operation failed".to_string(),
            source: error,
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(error: sqlx::Error) -> Self {
        Self::Database {
            message: "Snapshot database operation failed".to_string(),
            source: error,
        }
    }
}
