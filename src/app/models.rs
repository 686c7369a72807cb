//! Data models for the Salt Portal snapshot
//!
//! This module contains the records extracted from the portal and written to
//! the snapshot. Relationships are plain foreign-key fields; a station knows
//! its project id, a measurement its station id, and nothing holds a
//! back-reference.

use crate::constants::{CALIBRATION_TABLE_ID, MEASUREMENT_TABLE_ID, calibration_columns, measurement_columns};
use crate::{Error, Result};
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// =============================================================================
// Roster
// =============================================================================

/// A portal project
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
}

/// A gauging station with its temperature calibration factors
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Station {
    pub id: i64,
    pub name: String,
    pub project_id: i64,
    pub cft_1: f64,
    pub cft_2: f64,
    pub cft_3: f64,
}

/// Organisation-wide station roster
#[derive(Debug, Clone)]
pub struct Roster {
    /// Distinct projects in first-seen order
    pub projects: Vec<Project>,

    /// Stations in roster order
    pub stations: Vec<Station>,

    /// Payload exactly as served, without the injected header row
    pub raw: Vec<u8>,
}

impl Roster {
    /// Stations belonging to a project, in roster order
    pub fn stations_in_project(&self, project_id: i64) -> impl Iterator<Item = &Station> {
        self.stations
            .iter()
            .filter(move |station| station.project_id == project_id)
    }
}

// =============================================================================
// Record Kinds
// =============================================================================

/// The two record kinds correlated between CSV export and HTML table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Measurement,
    Calibration,
}

impl RecordKind {
    /// Path segment used in the portal's update links
    pub fn path_segment(&self) -> &'static str {
        match self {
            RecordKind::Measurement => "measurement",
            RecordKind::Calibration => "calibration",
        }
    }

    /// Id of the table rendering this kind on the station page
    pub fn table_id(&self) -> &'static str {
        match self {
            RecordKind::Measurement => MEASUREMENT_TABLE_ID,
            RecordKind::Calibration => CALIBRATION_TABLE_ID,
        }
    }

    /// CSV column holding the full datetime compared against the HTML cell
    pub fn datetime_column(&self) -> &'static str {
        match self {
            RecordKind::Measurement => measurement_columns::DATETIME,
            RecordKind::Calibration => calibration_columns::DATETIME,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordKind::Measurement => "measurements",
            RecordKind::Calibration => "calibrations",
        })
    }
}

// =============================================================================
// CSV Exports
// =============================================================================

/// A parsed CSV export with rows kept in source order
#[derive(Debug, Clone, Default)]
pub struct ExportTable {
    columns: HashMap<String, usize>,
    rows: Vec<StringRecord>,
}

impl ExportTable {
    /// Parse a CSV payload whose first line is the header row
    pub fn parse(bytes: &[u8], source_name: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let headers = reader.headers().map_err(|e| {
            Error::unreadable_csv(source_name, "Failed to read header row", e)
        })?;

        let columns = headers
            .iter()
            .enumerate()
            .map(|(index, name)| (name.trim().to_string(), index))
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| {
                Error::unreadable_csv(source_name, "Failed to read CSV record", e)
            })?;
            rows.push(record);
        }

        Ok(Self { columns, rows })
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether the export has a column of this name
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// Row view by index
    pub fn row(&self, index: usize) -> Option<ExportRow<'_>> {
        self.rows.get(index).map(|record| ExportRow {
            columns: &self.columns,
            record,
        })
    }

    /// All rows in source order
    pub fn rows(&self) -> impl Iterator<Item = ExportRow<'_>> {
        self.rows.iter().map(|record| ExportRow {
            columns: &self.columns,
            record,
        })
    }
}

/// Borrowed view of one export row, addressed by column name
#[derive(Debug, Clone, Copy)]
pub struct ExportRow<'a> {
    columns: &'a HashMap<String, usize>,
    record: &'a StringRecord,
}

impl<'a> ExportRow<'a> {
    /// Raw field value; `None` when the column is absent
    pub fn get(&self, column: &str) -> Option<&'a str> {
        self.columns
            .get(column)
            .and_then(|&index| self.record.get(index))
    }

    /// Trimmed field value; `None` when absent or blank
    pub fn non_empty(&self, column: &str) -> Option<&'a str> {
        self.get(column)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

// =============================================================================
// Snapshot Records
// =============================================================================

/// A discharge measurement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementRecord {
    pub id: i64,
    pub station_id: i64,
    pub group_id: Option<i64>,
    pub datetime: String,
    pub datetime_end: String,
    pub flow_cms: f64,
    pub uncertainty_percent: f64,
    pub notes: Option<String>,
    pub datetime_modified: Option<String>,
    pub modified_by: Option<String>,
    pub locked_update_delete: Option<bool>,
    pub locked_by: Option<String>,
    pub party: Option<String>,
    pub created_by: Option<String>,
    pub stage_m: Option<f64>,
    pub stage_datetime: Option<String>,
    pub dl_stage_m: Option<f64>,
    pub ref_stage_m: Option<f64>,
    pub measurement_type: Option<String>,
    pub filename: String,
    pub rating_curve_ids: Option<String>,
    pub states: Option<String>,

    /// Absolute URL of the measurement's own CSV, when the page links one
    #[serde(skip)]
    pub download_url: Option<String>,
}

/// A conductivity-to-concentration calibration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationRecord {
    pub id: i64,
    pub station_id: i64,
    pub datetime_of_calibration: String,
    pub coeff_var_regression_r2: f64,
    pub cf_t: f64,
    pub cf_t_uncertainty: f64,
    pub volume_distilled_water_calibration_l: f64,
    pub mass_salt_calibration_mg: f64,
    pub volume_stream_water_calibration_l: f64,
    pub volume_injection_calibration_solution_ml: f64,
    pub ec_t_steps: [f64; 5],
    pub filename: String,
}

/// Raw CSV of a single measurement
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementCsvData {
    pub measurement_id: i64,
    pub csv_data: Vec<u8>,
}

/// Summary CSV of a measurement group
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementGroup {
    pub id: i64,
    pub group_summary: Vec<u8>,
}

/// Singleton row describing the snapshot itself
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionStamp {
    pub database_version: i64,
    pub salt_portal_version: String,
    pub datetime_created: String,
    pub created_by_user: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_table_preserves_order_and_columns() {
        let csv = b"Date of Calibration,Filename\n2023-05-02 10:00:00,b.csv\n2023-05-01 09:00:00,a.csv\n";
        let table = ExportTable::parse(csv, "calibrations").unwrap();

        assert_eq!(table.len(), 2);
        assert!(table.has_column("Filename"));
        assert!(!table.has_column("ID"));

        let first = table.row(0).unwrap();
        assert_eq!(first.get("Filename"), Some("b.csv"));
        assert_eq!(first.get("Missing"), None);
        assert!(table.row(2).is_none());
    }

    #[test]
    fn test_export_table_header_only() {
        let table = ExportTable::parse(b"ID,Date of Measurement\n", "measurements").unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_unreadable_export_is_fetch_error() {
        let result = ExportTable::parse(b"Notes,Party\n\xff\xfe,crew\n", "measurements of station 10");
        match result {
            Err(Error::Fetch { resource, .. }) => assert_eq!(resource, "measurements of station 10"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_non_empty_trims_blank_fields() {
        let table = ExportTable::parse(b"Notes,Party\n  ,field crew \n", "measurements").unwrap();
        let row = table.row(0).unwrap();
        assert_eq!(row.non_empty("Notes"), None);
        assert_eq!(row.non_empty("Party"), Some("field crew"));
    }

    #[test]
    fn test_roster_stations_in_project() {
        let station = |id, project_id| Station {
            id,
            name: format!("S{}", id),
            project_id,
            cft_1: 0.0,
            cft_2: 0.0,
            cft_3: 0.0,
        };
        let roster = Roster {
            projects: vec![],
            stations: vec![station(10, 1), station(11, 2), station(12, 1)],
            raw: Vec::new(),
        };

        let ids: Vec<i64> = roster.stations_in_project(1).map(|s| s.id).collect();
        assert_eq!(ids, vec![10, 12]);
    }

    #[test]
    fn test_record_kind_metadata() {
        assert_eq!(RecordKind::Measurement.table_id(), "table_1");
        assert_eq!(RecordKind::Calibration.table_id(), "table_2");
        assert_eq!(RecordKind::Calibration.path_segment(), "calibration");
        assert_eq!(RecordKind::Measurement.to_string(), "measurements");
    }
}
