//! Snapshot table definitions
//!
//! Datetimes are TEXT exactly as the portal rendered them. Raw payloads are
//! BLOBs. Relationships are plain foreign keys.

/// Table names in creation order; parents before children
pub const TABLES: &[&str] = &[
    "version",
    "station_list_raw",
    "project",
    "station",
    "ratingcurve",
    "measurement_group",
    "measurement",
    "measurement_csv_data",
    "measurement_raw",
    "calibration",
    "calibration_raw",
];

/// `CREATE TABLE` statements, in the order of [`TABLES`]
pub const CREATE_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE version (
        id INTEGER PRIMARY KEY CHECK (id = 0),
        database_version INTEGER NOT NULL,
        salt_portal_version TEXT NOT NULL,
        datetime_created TEXT NOT NULL,
        created_by_user TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE station_list_raw (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        raw_station_data BLOB NOT NULL
    )
    "#,
    r#"
    CREATE TABLE project (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE station (
        id INTEGER PRIMARY KEY,
        station_name TEXT NOT NULL,
        project_id INTEGER NOT NULL REFERENCES project(id),
        cft_1 REAL NOT NULL,
        cft_2 REAL NOT NULL,
        cft_3 REAL NOT NULL
    )
    "#,
    r#"
    CREATE TABLE ratingcurve (
        id INTEGER PRIMARY KEY,
        station_id INTEGER NOT NULL REFERENCES station(id)
    )
    "#,
    r#"
    CREATE TABLE measurement_group (
        id INTEGER PRIMARY KEY,
        group_summary BLOB NOT NULL
    )
    "#,
    r#"
    CREATE TABLE measurement (
        id INTEGER PRIMARY KEY,
        station_id INTEGER NOT NULL REFERENCES station(id),
        group_id INTEGER REFERENCES measurement_group(id),
        datetime TEXT NOT NULL,
        datetime_end TEXT NOT NULL,
        flow_cms REAL NOT NULL,
        uncertainty_percent REAL NOT NULL,
        notes TEXT,
        datetime_modified TEXT,
        modified_by TEXT,
        locked_update_delete INTEGER,
        locked_by TEXT,
        party TEXT,
        created_by TEXT,
        stage_m REAL,
        stage_datetime TEXT,
        dl_stage_m REAL,
        ref_stage_m REAL,
        type TEXT,
        filename TEXT NOT NULL,
        rating_curve_ids TEXT,
        states TEXT
    )
    "#,
    r#"
    CREATE TABLE measurement_csv_data (
        measurement_id INTEGER PRIMARY KEY REFERENCES measurement(id),
        csv_data BLOB NOT NULL
    )
    "#,
    r#"
    CREATE TABLE measurement_raw (
        station_id INTEGER PRIMARY KEY REFERENCES station(id),
        station_raw_measurement_data BLOB NOT NULL
    )
    "#,
    r#"
    CREATE TABLE calibration (
        id INTEGER PRIMARY KEY,
        station_id INTEGER NOT NULL REFERENCES station(id),
        datetime_of_calibration TEXT NOT NULL,
        coeff_var_regression_r2 REAL NOT NULL,
        cf_t REAL NOT NULL,
        cf_t_uncertainty REAL NOT NULL,
        volume_distilled_water_calibration_l REAL NOT NULL,
        mass_salt_calibration_mg REAL NOT NULL,
        volume_stream_water_calibration_l REAL NOT NULL,
        volume_injection_calibration_solution_ml REAL NOT NULL,
        ec_t_step_1 REAL NOT NULL,
        ec_t_step_2 REAL NOT NULL,
        ec_t_step_3 REAL NOT NULL,
        ec_t_step_4 REAL NOT NULL,
        ec_t_step_5 REAL NOT NULL,
        filename TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE calibration_raw (
        station_id INTEGER PRIMARY KEY REFERENCES station(id),
        station_raw_calibration_data BLOB NOT NULL
    )
    "#,
];

/// `DROP TABLE` statement for a snapshot table
pub fn drop_statement(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", table)
}
