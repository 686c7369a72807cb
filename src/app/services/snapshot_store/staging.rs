//! In-memory staging of one station's records before the atomic commit

use crate::app::models::{
    CalibrationRecord, MeasurementCsvData, MeasurementGroup, MeasurementRecord, Station,
};

/// A record destined for the snapshot as part of a station commit
#[derive(Debug, Clone)]
pub enum StagedRecord {
    Group(MeasurementGroup),
    Measurement(MeasurementRecord),
    MeasurementCsv(MeasurementCsvData),
    /// Station's measurements export exactly as served
    MeasurementRaw(Vec<u8>),
    Calibration(CalibrationRecord),
    /// Station's calibrations export exactly as served
    CalibrationRaw(Vec<u8>),
}

impl From<MeasurementGroup> for StagedRecord {
    fn from(group: MeasurementGroup) -> Self {
        StagedRecord::Group(group)
    }
}

impl From<MeasurementRecord> for StagedRecord {
    fn from(record: MeasurementRecord) -> Self {
        StagedRecord::Measurement(record)
    }
}

impl From<MeasurementCsvData> for StagedRecord {
    fn from(data: MeasurementCsvData) -> Self {
        StagedRecord::MeasurementCsv(data)
    }
}

impl From<CalibrationRecord> for StagedRecord {
    fn from(record: CalibrationRecord) -> Self {
        StagedRecord::Calibration(record)
    }
}

/// Everything collected for one station, written together or not at all
///
/// Dropping a staging area without committing it discards the station.
#[derive(Debug, Clone)]
pub struct StagingArea {
    pub(super) station: Station,
    pub(super) groups: Vec<MeasurementGroup>,
    pub(super) measurements: Vec<MeasurementRecord>,
    pub(super) measurement_csv: Vec<MeasurementCsvData>,
    pub(super) measurement_raw: Option<Vec<u8>>,
    pub(super) calibrations: Vec<CalibrationRecord>,
    pub(super) calibration_raw: Option<Vec<u8>>,
}

impl StagingArea {
    pub(super) fn new(station: Station) -> Self {
        Self {
            station,
            groups: Vec::new(),
            measurements: Vec::new(),
            measurement_csv: Vec::new(),
            measurement_raw: None,
            calibrations: Vec::new(),
            calibration_raw: None,
        }
    }

    pub fn station(&self) -> &Station {
        &self.station
    }

    /// Add a record to the station's unit of work
    pub fn stage(&mut self, record: impl Into<StagedRecord>) {
        match record.into() {
            StagedRecord::Group(group) => {
                if !self.groups.iter().any(|staged| staged.id == group.id) {
                    self.groups.push(group);
                }
            }
            StagedRecord::Measurement(record) => self.measurements.push(record),
            StagedRecord::MeasurementCsv(data) => self.measurement_csv.push(data),
            StagedRecord::MeasurementRaw(raw) => self.measurement_raw = Some(raw),
            StagedRecord::Calibration(record) => self.calibrations.push(record),
            StagedRecord::CalibrationRaw(raw) => self.calibration_raw = Some(raw),
        }
    }

    /// Whether a group with this id is already staged
    pub fn has_group(&self, group_id: i64) -> bool {
        self.groups.iter().any(|group| group.id == group_id)
    }

    pub fn measurement_count(&self) -> usize {
        self.measurements.len()
    }

    pub fn calibration_count(&self) -> usize {
        self.calibrations.len()
    }
}
