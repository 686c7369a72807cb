//! Projection of reconciled export rows into typed records
//!
//! Values are kept as the portal rendered them where the snapshot stores
//! text (datetimes included). Numbers and flags are coerced; a required
//! field that is blank or malformed fails the row with a mapping error, while
//! blank optional fields simply become `None`.

use crate::app::models::{CalibrationRecord, ExportRow, MeasurementRecord};
use crate::constants::{calibration_columns as cal, measurement_columns as meas};
use crate::{Error, Result};

/// Build a measurement record from a correlated export row
pub fn map_measurement(
    row: &ExportRow<'_>,
    id: i64,
    station_id: i64,
    download_url: Option<String>,
) -> Result<MeasurementRecord> {
    Ok(MeasurementRecord {
        id,
        station_id,
        group_id: group_id(row)?,
        datetime: required_text(row, meas::DATETIME)?,
        datetime_end: required_text(row, meas::DATETIME_END)?,
        flow_cms: required_f64(row, meas::FLOW)?,
        uncertainty_percent: required_f64(row, meas::UNCERTAINTY)?,
        notes: optional_text(row, meas::NOTES),
        datetime_modified: optional_text(row, meas::MODIFIED),
        modified_by: optional_text(row, meas::MODIFIED_BY),
        locked_update_delete: optional_bool(row, meas::LOCKED)?,
        locked_by: optional_text(row, meas::LOCKED_BY),
        party: optional_text(row, meas::PARTY),
        created_by: optional_text(row, meas::CREATED_BY),
        stage_m: optional_f64(row, meas::STAGE)?,
        stage_datetime: optional_text(row, meas::STAGE_TIME),
        dl_stage_m: optional_f64(row, meas::DL_STAGE)?,
        ref_stage_m: optional_f64(row, meas::REF_STAGE)?,
        measurement_type: optional_text(row, meas::TYPE),
        filename: required_text(row, meas::FILENAME)?,
        rating_curve_ids: optional_text(row, meas::RATING_CURVE_IDS),
        states: optional_text(row, meas::STATES),
        download_url,
    })
}

/// Build a calibration record from a correlated export row
pub fn map_calibration(row: &ExportRow<'_>, id: i64, station_id: i64) -> Result<CalibrationRecord> {
    let mut ec_t_steps = [0.0; 5];
    for (step, column) in ec_t_steps.iter_mut().zip(cal::EC_T_STEPS) {
        *step = required_f64(row, column)?;
    }

    Ok(CalibrationRecord {
        id,
        station_id,
        datetime_of_calibration: required_text(row, cal::DATETIME)?,
        coeff_var_regression_r2: required_f64(row, cal::REGRESSION_R2)?,
        cf_t: required_f64(row, cal::CF_T)?,
        cf_t_uncertainty: required_f64(row, cal::CF_T_UNCERTAINTY)?,
        volume_distilled_water_calibration_l: required_f64(row, cal::VOLUME_DISTILLED_WATER)?,
        mass_salt_calibration_mg: required_f64(row, cal::MASS_SALT)?,
        volume_stream_water_calibration_l: required_f64(row, cal::VOLUME_STREAM_WATER)?,
        volume_injection_calibration_solution_ml: required_f64(row, cal::VOLUME_INJECTION)?,
        ec_t_steps,
        filename: required_text(row, cal::FILENAME)?,
    })
}

/// Measurement group of a row; `None` when the group column is blank
///
/// The export renders group ids either as integers or as integral floats.
pub fn group_id(row: &ExportRow<'_>) -> Result<Option<i64>> {
    match row.non_empty(meas::GROUP) {
        None => Ok(None),
        Some(value) => parse_integral(value).map(Some).ok_or_else(|| {
            Error::mapping(meas::GROUP, format!("'{}' is not a group id", value))
        }),
    }
}

/// Parse `12` or `12.0` as an integer
pub fn parse_integral(value: &str) -> Option<i64> {
    let value = value.trim();
    value.parse::<i64>().ok().or_else(|| {
        value
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

fn required_text(row: &ExportRow<'_>, column: &str) -> Result<String> {
    row.non_empty(column)
        .map(str::to_string)
        .ok_or_else(|| Error::mapping(column, "required value is missing"))
}

fn optional_text(row: &ExportRow<'_>, column: &str) -> Option<String> {
    row.non_empty(column).map(str::to_string)
}

fn parse_f64(column: &str, value: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .map_err(|_| Error::mapping(column, format!("'{}' is not a number", value)))
}

fn required_f64(row: &ExportRow<'_>, column: &str) -> Result<f64> {
    let value = row
        .non_empty(column)
        .ok_or_else(|| Error::mapping(column, "required value is missing"))?;
    parse_f64(column, value)
}

fn optional_f64(row: &ExportRow<'_>, column: &str) -> Result<Option<f64>> {
    row.non_empty(column)
        .map(|value| parse_f64(column, value))
        .transpose()
}

fn optional_bool(row: &ExportRow<'_>, column: &str) -> Result<Option<bool>> {
    match row.non_empty(column) {
        None => Ok(None),
        Some("True" | "true" | "1") => Ok(Some(true)),
        Some("False" | "false" | "0") => Ok(Some(false)),
        Some(other) => Err(Error::mapping(
            column,
            format!("'{}' is not a boolean", other),
        )),
    }
}
