//! Application constants for the Salt Portal backup
//!
//! Portal endpoints, request headers, CSV column names and the snapshot
//! schema version used throughout the crate.

// =============================================================================
// Portal Endpoints
// =============================================================================

/// Default portal origin
pub const DEFAULT_PORTAL_URL: &str = "https://wit.fathomscientific.com";

/// Login page and form target
pub const LOGIN_PATH: &str = "/accounts/login/";

/// Referer sent with the login form post
pub const LOGIN_REFERER_PATH: &str = "/accounts/login/?next=/";

/// Organisation-wide station roster (CSV without header row)
pub const ROSTER_PATH: &str = "/station-cfts/";

/// Station HTML page
pub fn station_page_path(station_id: i64) -> String {
    format!("/station/{}/", station_id)
}

/// Station measurements CSV export
pub fn station_measurements_path(station_id: i64) -> String {
    format!("/station/{}/measurements", station_id)
}

/// Station calibrations CSV export
pub fn station_calibrations_path(station_id: i64) -> String {
    format!("/station/{}/calibrations", station_id)
}

/// Project HTML page, used as Referer for station pages
pub fn project_page_path(project_id: i64) -> String {
    format!("/project/{}/", project_id)
}

/// Group measurement summary CSV
pub fn group_csv_path(group_id: i64) -> String {
    format!("/group-measurement/{}/csv-download", group_id)
}

// =============================================================================
// Request Headers
// =============================================================================

/// Browser-like headers sent with every request (lowercase names)
pub const BASE_HEADERS: &[(&str, &str)] = &[
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
    ),
    ("accept-language", "en-US,en;q=0.5"),
    ("dnt", "1"),
    ("upgrade-insecure-requests", "1"),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "same-origin"),
    ("sec-fetch-user", "?1"),
];

/// Default user agent
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/117.0";

/// Name of the anti-forgery cookie
pub const CSRF_COOKIE_NAME: &str = "csrftoken";

/// Name of the anti-forgery hidden form field
pub const CSRF_FORM_FIELD: &str = "csrfmiddlewaretoken";

/// Default per-request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// Page Markers
// =============================================================================

/// Message shown on the landing page after a successful login
pub const SIGNED_IN_MARKER: &str = "Successfully signed in";

/// Prefix of the version paragraph in the side navigation
pub const PORTAL_VERSION_PREFIX: &str = "Salt Portal ";

/// Class of the side navigation container holding the portal version
pub const SIDENAV_CLASS: &str = "wh-sidenav-content";

/// Table id of the measurements table on the station page
pub const MEASUREMENT_TABLE_ID: &str = "table_1";

/// Table id of the calibrations table on the station page
pub const CALIBRATION_TABLE_ID: &str = "table_2";

/// Path of a measurement CSV download link, with or without an origin
pub const MEASUREMENT_DOWNLOAD_HREF_PATTERN: &str =
    r"^(?:https?://[^/]+)?/measurement/\d+/[^?#]*download";

// =============================================================================
// CSV Layout
// =============================================================================

/// Header row the roster payload is served without
pub const ROSTER_HEADER: &str =
    "station_name,station_id,project_name,project_id,cft_1,cft_2,cft_3\r\n";

/// Record id column, present in some exports of either kind
pub const EXPORT_ID_COLUMN: &str = "ID";

/// Column names of the station measurements export
pub mod measurement_columns {
    pub const GROUP: &str = "group";
    pub const DATETIME: &str = "Date of Measurement";
    pub const DATETIME_END: &str = "End time of Measurement";
    pub const FLOW: &str = "Flow (cms)";
    pub const UNCERTAINTY: &str = "Measurement Uncertainty";
    pub const NOTES: &str = "Notes";
    pub const MODIFIED: &str = "Modified";
    pub const MODIFIED_BY: &str = "Last Modified By";
    pub const LOCKED: &str = "Locked from Update and Delete";
    pub const LOCKED_BY: &str = "Locked By";
    pub const PARTY: &str = "Party";
    pub const CREATED_BY: &str = "Created By";
    pub const STAGE: &str = "Stage (m)";
    pub const STAGE_TIME: &str = "Stage Time";
    pub const DL_STAGE: &str = "DL Stage (m)";
    pub const REF_STAGE: &str = "Ref Stage (m)";
    pub const TYPE: &str = "Type";
    pub const FILENAME: &str = "Filename";
    pub const RATING_CURVE_IDS: &str = "RatingCurveIds";
    pub const STATES: &str = "States";
}

/// Column names of the station calibrations export
pub mod calibration_columns {
    pub const DATETIME: &str = "Date of Calibration";
    pub const REGRESSION_R2: &str = "Coefficient of Variation of the Calibration Regression(R^2)";
    pub const CF_T: &str =
        "Temperature-adjusted Conductivity vs Concentration Regression Coefficient";
    pub const CF_T_UNCERTAINTY: &str = "CF.T Uncertainty";
    pub const VOLUME_DISTILLED_WATER: &str = "Volume of Distilled H20 used in calibration.";
    pub const MASS_SALT: &str = "Mass of salt used in calibration.";
    pub const VOLUME_STREAM_WATER: &str = "Volume of H20 from stream used in calibration.";
    pub const VOLUME_INJECTION: &str =
        "Volume of calibration solution injected at each step of 5-point calibration.";
    pub const EC_T_STEPS: [&str; 5] = [
        "First calibration step ECT.",
        "Second calibration step ECT.",
        "Third calibration step ECT.",
        "Fourth calibration step ECT.",
        "Fifth calibration step ECT.",
    ];
    pub const FILENAME: &str = "Filename";
}

// =============================================================================
// Snapshot
// =============================================================================

/// Schema version written to the version table
pub const DATABASE_VERSION: i64 = 1;

/// Primary key of the singleton version row
pub const VERSION_ROW_ID: i64 = 0;

/// Filename prefix of the default snapshot
pub const DEFAULT_SNAPSHOT_PREFIX: &str = "salt_portal_";

/// Timestamp format used in the default snapshot filename
pub const SNAPSHOT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Default snapshot filename for a given local time
pub fn default_snapshot_filename(now: chrono::DateTime<chrono::Local>) -> String {
    format!(
        "{}{}.db",
        DEFAULT_SNAPSHOT_PREFIX,
        now.format(SNAPSHOT_TIMESTAMP_FORMAT)
    )
}
