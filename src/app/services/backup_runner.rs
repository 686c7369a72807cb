//! Backup run orchestration
//!
//! Signs in, writes the version stamp and roster, then walks projects and
//! stations in roster order. Each station is fetched, correlated, mapped and
//! committed before the next one starts. Any error ends the run; stations
//! committed before it stay in the snapshot.

use crate::app::models::{
    ExportTable, MeasurementCsvData, MeasurementGroup, MeasurementRecord, Project, RecordKind,
    Station, VersionStamp,
};
use crate::app::services::correlator::correlate_station_page;
use crate::app::services::portal_client::{AuthenticatedSession, Credentials, PortalSource};
use crate::app::services::record_mapper::{map_calibration, map_measurement};
use crate::app::services::snapshot_store::{SnapshotStore, StagedRecord, StationCommit};
use crate::constants::DATABASE_VERSION;
use crate::{Error, Result};
use chrono::{SecondsFormat, Utc};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Totals of a completed backup run
#[derive(Debug, Clone, Default)]
pub struct BackupStats {
    /// Portal version recorded in the snapshot
    pub portal_version: String,
    pub projects: usize,
    pub stations: usize,
    pub measurements: usize,
    /// Measurements stored together with their own CSV
    pub measurement_files: usize,
    pub calibrations: usize,
    pub groups: usize,
    /// Export rows kept only in the raw station exports
    pub unlinked_rows: usize,
    pub elapsed: Duration,
}

impl BackupStats {
    fn record(&mut self, commit: &StationCommit) {
        self.stations += 1;
        self.measurements += commit.measurements;
        self.measurement_files += commit.measurement_files;
        self.calibrations += commit.calibrations;
        self.groups += commit.groups;
    }
}

/// Project and station progress bars; hidden when progress is off
struct RunProgress {
    _multi: MultiProgress,
    projects: ProgressBar,
    stations: ProgressBar,
}

impl RunProgress {
    fn new(show: bool, project_count: usize) -> Self {
        let multi = MultiProgress::new();
        if !show {
            return Self {
                _multi: multi,
                projects: ProgressBar::hidden(),
                stations: ProgressBar::hidden(),
            };
        }

        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");

        let projects = multi.add(ProgressBar::new(project_count as u64));
        projects.set_style(style.clone());
        projects.set_message("projects");

        let stations = multi.add(ProgressBar::new(0));
        stations.set_style(style);

        Self {
            _multi: multi,
            projects,
            stations,
        }
    }

    fn start_project(&self, project: &Project, station_count: usize) {
        self.projects.set_message(format!("projects ({})", project.name));
        self.stations.set_length(station_count as u64);
        self.stations.set_position(0);
    }

    fn finish(&self) {
        self.stations.finish_and_clear();
        self.projects.finish_with_message("projects done");
    }

    fn abandon(&self) {
        self.stations.abandon();
        self.projects.abandon();
    }
}

/// Drives one backup run from a portal source into a snapshot store
pub struct BackupRunner<'a, P: PortalSource> {
    source: &'a P,
    store: &'a mut SnapshotStore,
    show_progress: bool,
    cancellation: CancellationToken,
}

impl<'a, P: PortalSource> BackupRunner<'a, P> {
    pub fn new(source: &'a P, store: &'a mut SnapshotStore) -> Self {
        Self {
            source,
            store,
            show_progress: false,
            cancellation: CancellationToken::new(),
        }
    }

    /// Show project and station progress bars
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Stop between stations once the token is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Run the backup to completion or to the first error
    pub async fn run(mut self, credentials: &Credentials) -> Result<BackupStats> {
        let started = Instant::now();

        let session = self.source.authenticate(credentials).await?;
        let roster = self.source.fetch_roster(&session).await?;
        info!(
            "Roster lists {} projects with {} stations",
            roster.projects.len(),
            roster.stations.len()
        );

        let stamp = VersionStamp {
            database_version: DATABASE_VERSION,
            salt_portal_version: session.portal_version.clone(),
            datetime_created: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false),
            created_by_user: session.username.clone(),
        };
        self.store.commit_global(&roster, &stamp).await?;

        let mut stats = BackupStats {
            portal_version: session.portal_version.clone(),
            projects: roster.projects.len(),
            ..Default::default()
        };

        let progress = RunProgress::new(self.show_progress, roster.projects.len());

        for project in &roster.projects {
            let stations: Vec<&Station> = roster.stations_in_project(project.id).collect();
            progress.start_project(project, stations.len());
            debug!(
                "Project {} ({}): {} stations",
                project.id,
                project.name,
                stations.len()
            );

            for station in stations {
                progress.stations.set_message(station.name.clone());

                let outcome = self
                    .backup_station(&session, project, station, &mut stats)
                    .await;
                match outcome {
                    Ok(commit) => stats.record(&commit),
                    Err(e) => {
                        progress.abandon();
                        return Err(e);
                    }
                }
                progress.stations.inc(1);
            }
            progress.projects.inc(1);
        }
        progress.finish();

        stats.elapsed = started.elapsed();
        info!(
            "Backed up {} stations, {} measurements and {} calibrations in {:.1}s",
            stats.stations,
            stats.measurements,
            stats.calibrations,
            stats.elapsed.as_secs_f64()
        );
        Ok(stats)
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancellation.is_cancelled() {
            return Err(Error::interrupted("Backup interrupted by user"));
        }
        Ok(())
    }

    /// Fetch, correlate, map and commit one station
    async fn backup_station(
        &mut self,
        session: &AuthenticatedSession,
        project: &Project,
        station: &Station,
        stats: &mut BackupStats,
    ) -> Result<StationCommit> {
        self.check_cancelled()?;
        debug!("Station {} ({})", station.id, station.name);
        let source = self.source;

        let exports = source
            .fetch_station_exports(session, project, station)
            .await?;
        let base_url = source.base_url();

        let measurements = ExportTable::parse(
            &exports.measurements_csv,
            &format!("measurements of station {}", station.id),
        )?;
        let calibrations = ExportTable::parse(
            &exports.calibrations_csv,
            &format!("calibrations of station {}", station.id),
        )?;

        let measurement_links = correlate_station_page(
            RecordKind::Measurement,
            station.id,
            &measurements,
            &exports.station_html,
            base_url,
        )?;
        let calibration_links = correlate_station_page(
            RecordKind::Calibration,
            station.id,
            &calibrations,
            &exports.station_html,
            base_url,
        )?;
        stats.unlinked_rows +=
            measurement_links.unlinked_count() + calibration_links.unlinked_count();

        let mut measurement_records: Vec<MeasurementRecord> = Vec::new();
        for (index, row) in measurements.rows().enumerate() {
            let Some(id) = measurement_links.ids[index] else {
                continue;
            };
            let download_url = measurement_links.download_urls[index].clone();
            measurement_records.push(map_measurement(&row, id, station.id, download_url)?);
        }

        let mut area = self.store.begin_station(station);

        for (index, row) in calibrations.rows().enumerate() {
            if let Some(id) = calibration_links.ids[index] {
                area.stage(map_calibration(&row, id, station.id)?);
            }
        }

        let group_ids: BTreeSet<i64> = measurement_records
            .iter()
            .filter_map(|record| record.group_id)
            .filter(|group_id| !self.store.has_committed_group(*group_id))
            .collect();
        for group_id in group_ids {
            self.check_cancelled()?;
            let group_summary = source
                .fetch_group_csv(session, station, group_id)
                .await?;
            area.stage(MeasurementGroup {
                id: group_id,
                group_summary,
            });
        }

        for record in measurement_records {
            match &record.download_url {
                Some(url) => {
                    self.check_cancelled()?;
                    let csv_data = source
                        .fetch_measurement_csv(session, station, url)
                        .await?;
                    area.stage(MeasurementCsvData {
                        measurement_id: record.id,
                        csv_data,
                    });
                }
                None => warn!(
                    "Station {}: measurement {} has no download link; its CSV is not stored",
                    station.id, record.id
                ),
            }
            area.stage(record);
        }

        area.stage(StagedRecord::MeasurementRaw(exports.measurements_csv));
        area.stage(StagedRecord::CalibrationRaw(exports.calibrations_csv));

        self.check_cancelled()?;
        self.store.commit_station(area).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_accumulate_commits() {
        let mut stats = BackupStats::default();
        stats.record(&StationCommit {
            station_id: 10,
            measurements: 3,
            measurement_files: 2,
            calibrations: 1,
            groups: 1,
        });
        stats.record(&StationCommit {
            station_id: 11,
            measurements: 1,
            ..Default::default()
        });

        assert_eq!(stats.stations, 2);
        assert_eq!(stats.measurements, 4);
        assert_eq!(stats.measurement_files, 2);
        assert_eq!(stats.calibrations, 1);
        assert_eq!(stats.groups, 1);
    }
}
