//! SQLite snapshot of the portal
//!
//! The snapshot is rebuilt from scratch on every run: opening a store drops
//! and recreates every snapshot table. The version stamp, the raw roster and
//! the projects are written once up front; after that each station is written
//! in its own transaction so a failure mid-run leaves every earlier station
//! intact and the failing one absent.

pub mod schema;
pub mod staging;

pub use staging::{StagedRecord, StagingArea};

use crate::app::models::{Roster, Station, VersionStamp};
use crate::constants::VERSION_ROW_ID;
use crate::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Row counts written by one station commit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StationCommit {
    pub station_id: i64,
    pub measurements: usize,
    pub measurement_files: usize,
    pub calibrations: usize,
    pub groups: usize,
}

/// Destination store of a backup run
pub struct SnapshotStore {
    pool: SqlitePool,
    committed_groups: HashSet<i64>,
    global_committed: bool,
}

impl SnapshotStore {
    /// Open (or create) the snapshot file and reset its schema
    pub async fn open(path: &Path) -> Result<Self> {
        if path.exists() {
            warn!(
                "Snapshot {} already exists; its tables will be replaced",
                path.display()
            );
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);

        let store = Self::connect(options).await.map_err(|e| match e {
            Error::Database { source, .. } => Error::database(
                format!("Failed to open snapshot {}", path.display()),
                source,
            ),
            other => other,
        })?;

        info!("Writing snapshot to {}", path.display());
        Ok(store)
    }

    /// Store backed by a private in-memory database
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true);
        Self::connect(options).await
    }

    async fn connect(options: SqliteConnectOptions) -> Result<Self> {
        // one connection: writes are sequential and an in-memory database is per connection
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&pool)
            .await?;

        let store = Self {
            pool,
            committed_groups: HashSet::new(),
            global_committed: false,
        };
        store.recreate_schema().await?;
        Ok(store)
    }

    /// Drop every snapshot table, children first, then create them again
    async fn recreate_schema(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for table in schema::TABLES.iter().rev() {
            sqlx::query(&schema::drop_statement(table))
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::database(format!("Failed to drop table {}", table), e))?;
        }
        for (table, statement) in schema::TABLES.iter().zip(schema::CREATE_STATEMENTS) {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::database(format!("Failed to create table {}", table), e))?;
        }

        tx.commit().await?;
        debug!("Created {} snapshot tables", schema::TABLES.len());
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Write the version stamp, the raw roster and all projects
    ///
    /// Runs once per store, before any station is committed.
    pub async fn commit_global(&mut self, roster: &Roster, stamp: &VersionStamp) -> Result<()> {
        if self.global_committed {
            return Err(Error::configuration(
                "Version stamp and roster were already written to this snapshot",
            ));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO version (id, database_version, salt_portal_version, datetime_created, created_by_user)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(VERSION_ROW_ID)
        .bind(stamp.database_version)
        .bind(&stamp.salt_portal_version)
        .bind(&stamp.datetime_created)
        .bind(&stamp.created_by_user)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::database("Failed to write version stamp", e))?;

        sqlx::query("INSERT INTO station_list_raw (raw_station_data) VALUES (?)")
            .bind(roster.raw.as_slice())
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::database("Failed to write raw roster", e))?;

        for project in &roster.projects {
            sqlx::query("INSERT INTO project (id, name) VALUES (?, ?)")
                .bind(project.id)
                .bind(&project.name)
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::database(format!("Failed to write project {}", project.id), e))?;
        }

        tx.commit().await?;
        self.global_committed = true;

        info!(
            "Recorded Salt Portal {} and {} projects",
            stamp.salt_portal_version,
            roster.projects.len()
        );
        Ok(())
    }

    /// Start collecting a station's records
    pub fn begin_station(&self, station: &Station) -> StagingArea {
        StagingArea::new(station.clone())
    }

    /// Whether a group was written by an earlier station of this run
    pub fn has_committed_group(&self, group_id: i64) -> bool {
        self.committed_groups.contains(&group_id)
    }

    /// Write everything staged for a station in one transaction
    pub async fn commit_station(&mut self, area: StagingArea) -> Result<StationCommit> {
        let station_id = area.station.id;
        let mut tx = self.pool.begin().await?;

        insert_station(&mut tx, &area)
            .await
            .map_err(|e| Error::database(format!("Failed to stage station {}", station_id), e))?;

        tx.commit()
            .await
            .map_err(|e| Error::database(format!("Failed to commit station {}", station_id), e))?;

        self.committed_groups
            .extend(area.groups.iter().map(|group| group.id));

        let commit = StationCommit {
            station_id,
            measurements: area.measurements.len(),
            measurement_files: area.measurement_csv.len(),
            calibrations: area.calibrations.len(),
            groups: area.groups.len(),
        };
        debug!("Committed station {}: {:?}", station_id, commit);
        Ok(commit)
    }

    /// Number of rows in a snapshot table
    pub async fn count_rows(&self, table: &str) -> Result<i64> {
        if !schema::TABLES.contains(&table) {
            return Err(Error::configuration(format!(
                "'{}' is not a snapshot table",
                table
            )));
        }

        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Close the underlying connection
    pub async fn close(self) {
        self.pool.close().await;
    }
}

async fn insert_station(
    tx: &mut Transaction<'_, Sqlite>,
    area: &StagingArea,
) -> std::result::Result<(), sqlx::Error> {
    let station = &area.station;

    sqlx::query(
        "INSERT INTO station (id, station_name, project_id, cft_1, cft_2, cft_3) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(station.id)
    .bind(&station.name)
    .bind(station.project_id)
    .bind(station.cft_1)
    .bind(station.cft_2)
    .bind(station.cft_3)
    .execute(&mut **tx)
    .await?;

    for group in &area.groups {
        sqlx::query("INSERT INTO measurement_group (id, group_summary) VALUES (?, ?)")
            .bind(group.id)
            .bind(group.group_summary.as_slice())
            .execute(&mut **tx)
            .await?;
    }

    for m in &area.measurements {
        sqlx::query(
            r#"
            INSERT INTO measurement (
                id, station_id, group_id, datetime, datetime_end, flow_cms, uncertainty_percent,
                notes, datetime_modified, modified_by, locked_update_delete, locked_by, party,
                created_by, stage_m, stage_datetime, dl_stage_m, ref_stage_m, type, filename,
                rating_curve_ids, states
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(m.id)
        .bind(m.station_id)
        .bind(m.group_id)
        .bind(&m.datetime)
        .bind(&m.datetime_end)
        .bind(m.flow_cms)
        .bind(m.uncertainty_percent)
        .bind(&m.notes)
        .bind(&m.datetime_modified)
        .bind(&m.modified_by)
        .bind(m.locked_update_delete)
        .bind(&m.locked_by)
        .bind(&m.party)
        .bind(&m.created_by)
        .bind(m.stage_m)
        .bind(&m.stage_datetime)
        .bind(m.dl_stage_m)
        .bind(m.ref_stage_m)
        .bind(&m.measurement_type)
        .bind(&m.filename)
        .bind(&m.rating_curve_ids)
        .bind(&m.states)
        .execute(&mut **tx)
        .await?;
    }

    for data in &area.measurement_csv {
        sqlx::query("INSERT INTO measurement_csv_data (measurement_id, csv_data) VALUES (?, ?)")
            .bind(data.measurement_id)
            .bind(data.csv_data.as_slice())
            .execute(&mut **tx)
            .await?;
    }

    if let Some(raw) = &area.measurement_raw {
        sqlx::query(
            "INSERT INTO measurement_raw (station_id, station_raw_measurement_data) VALUES (?, ?)",
        )
        .bind(station.id)
        .bind(raw.as_slice())
        .execute(&mut **tx)
        .await?;
    }

    for c in &area.calibrations {
        sqlx::query(
            r#"
            INSERT INTO calibration (
                id, station_id, datetime_of_calibration, coeff_var_regression_r2, cf_t,
                cf_t_uncertainty, volume_distilled_water_calibration_l, mass_salt_calibration_mg,
                volume_stream_water_calibration_l, volume_injection_calibration_solution_ml,
                ec_t_step_1, ec_t_step_2, ec_t_step_3, ec_t_step_4, ec_t_step_5, filename
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(c.id)
        .bind(c.station_id)
        .bind(&c.datetime_of_calibration)
        .bind(c.coeff_var_regression_r2)
        .bind(c.cf_t)
        .bind(c.cf_t_uncertainty)
        .bind(c.volume_distilled_water_calibration_l)
        .bind(c.mass_salt_calibration_mg)
        .bind(c.volume_stream_water_calibration_l)
        .bind(c.volume_injection_calibration_solution_ml)
        .bind(c.ec_t_steps[0])
        .bind(c.ec_t_steps[1])
        .bind(c.ec_t_steps[2])
        .bind(c.ec_t_steps[3])
        .bind(c.ec_t_steps[4])
        .bind(&c.filename)
        .execute(&mut **tx)
        .await?;
    }

    if let Some(raw) = &area.calibration_raw {
        sqlx::query(
            "INSERT INTO calibration_raw (station_id, station_raw_calibration_data) VALUES (?, ?)",
        )
        .bind(station.id)
        .bind(raw.as_slice())
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}
