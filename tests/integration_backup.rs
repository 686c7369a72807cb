//! End-to-end backup runs against an in-memory portal

use salt_portal_backup::Error;
use salt_portal_backup::app::models::{Project, Roster, Station};
use salt_portal_backup::app::services::backup_runner::BackupRunner;
use salt_portal_backup::app::services::portal_client::{
    AuthenticatedSession, Credentials, PortalSource, StationExports,
};
use salt_portal_backup::app::services::roster::parse_roster;
use salt_portal_backup::app::services::snapshot_store::SnapshotStore;
use salt_portal_backup::constants::DATABASE_VERSION;
use std::collections::HashMap;
use std::sync::Mutex;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const BASE_URL: &str = "https://portal.test";

const MEASUREMENT_HEADER: &str = "group,Date of Measurement,End time of Measurement,Flow (cms),Measurement Uncertainty,Notes,Filename\n";

const CALIBRATION_HEADER: &str = "Date of Calibration,Coefficient of Variation of the Calibration Regression(R^2),Temperature-adjusted Conductivity vs Concentration Regression Coefficient,CF.T Uncertainty,Volume of Distilled H20 used in calibration.,Mass of salt used in calibration.,Volume of H20 from stream used in calibration.,Volume of calibration solution injected at each step of 5-point calibration.,First calibration step ECT.,Second calibration step ECT.,Third calibration step ECT.,Fourth calibration step ECT.,Fifth calibration step ECT.,Filename\n";

/// Portal double serving canned pages and recording what was fetched
#[derive(Default)]
struct FakePortal {
    roster: Vec<u8>,
    stations: HashMap<i64, StationExports>,
    downloads: HashMap<String, Vec<u8>>,
    reject_login: bool,
    group_fetches: Mutex<Vec<i64>>,
    download_fetches: Mutex<Vec<String>>,
}

impl FakePortal {
    fn with_roster(roster: &str) -> Self {
        Self {
            roster: roster.as_bytes().to_vec(),
            ..Default::default()
        }
    }

    fn station(mut self, station_id: i64, measurements: &str, calibrations: &str, html: String) -> Self {
        self.stations.insert(
            station_id,
            StationExports {
                measurements_csv: measurements.as_bytes().to_vec(),
                calibrations_csv: calibrations.as_bytes().to_vec(),
                station_html: html,
            },
        );
        self
    }

    fn download(mut self, path: &str, body: &str) -> Self {
        self.downloads
            .insert(format!("{}{}", BASE_URL, path), body.as_bytes().to_vec());
        self
    }

    fn group_fetches(&self) -> Vec<i64> {
        self.group_fetches.lock().unwrap().clone()
    }
}

impl PortalSource for FakePortal {
    fn base_url(&self) -> &str {
        BASE_URL
    }

    async fn authenticate(&self, credentials: &Credentials) -> salt_portal_backup::Result<AuthenticatedSession> {
        if self.reject_login {
            return Err(Error::authentication("rejected"));
        }
        Ok(AuthenticatedSession {
            username: credentials.username.clone(),
            csrf_token: "token".to_string(),
            portal_version: "3.2.1".to_string(),
        })
    }

    async fn fetch_roster(&self, _session: &AuthenticatedSession) -> salt_portal_backup::Result<Roster> {
        parse_roster(self.roster.clone())
    }

    async fn fetch_station_exports(
        &self,
        _session: &AuthenticatedSession,
        _project: &Project,
        station: &Station,
    ) -> salt_portal_backup::Result<StationExports> {
        Ok(self.stations.get(&station.id).cloned().unwrap_or_default())
    }

    async fn fetch_measurement_csv(
        &self,
        _session: &AuthenticatedSession,
        _station: &Station,
        download_url: &str,
    ) -> salt_portal_backup::Result<Vec<u8>> {
        self.download_fetches
            .lock()
            .unwrap()
            .push(download_url.to_string());
        self.downloads
            .get(download_url)
            .cloned()
            .ok_or_else(|| Error::fetch_status(download_url, 404))
    }

    async fn fetch_group_csv(
        &self,
        _session: &AuthenticatedSession,
        _station: &Station,
        group_id: i64,
    ) -> salt_portal_backup::Result<Vec<u8>> {
        self.group_fetches.lock().unwrap().push(group_id);
        Ok(format!("group,{}\n", group_id).into_bytes())
    }
}

/// Station page with a measurements table of (displayed datetime, id, has download)
fn station_page(measurements: &[(&str, i64, bool)], calibrations: &[(&str, i64)]) -> String {
    let mut html = String::from("<html><body><table id=\"table_1\"><thead><tr><th>Date</th><th></th></tr></thead><tbody>");
    for (displayed, id, download) in measurements {
        html.push_str(&format!(
            "<tr><td>{}</td><td><a href=\"/measurement/{}/update\">Edit</a>",
            displayed, id
        ));
        if *download {
            html.push_str(&format!(
                " <a href=\"/measurement/{}/csv-download\">CSV</a>",
                id
            ));
        }
        html.push_str("</td></tr>");
    }
    html.push_str("</tbody></table><table id=\"table_2\"><tbody>");
    for (displayed, id) in calibrations {
        html.push_str(&format!(
            "<tr><td>{}</td><td><a href=\"/calibration/{}/update\">Edit</a></td></tr>",
            displayed, id
        ));
    }
    html.push_str("</tbody></table></body></html>");
    html
}

fn measurement_csv(rows: &[(&str, &str)]) -> String {
    let mut csv = String::from(MEASUREMENT_HEADER);
    for (i, (group, datetime)) in rows.iter().enumerate() {
        csv.push_str(&format!(
            "{},{},{},1.{},5,,m{}.csv\n",
            group, datetime, datetime, i, i
        ));
    }
    csv
}

fn three_measurements() -> String {
    measurement_csv(&[
        ("12.0", "2023-05-01 10:15:42"),
        ("", "2023-05-02 11:30:07"),
        ("", "2023-05-03 09:00:59"),
    ])
}

fn credentials() -> Credentials {
    Credentials::new("tech", "secret")
}

async fn count(store: &SnapshotStore, table: &str) -> i64 {
    store.count_rows(table).await.unwrap()
}

#[tokio::test]
async fn test_measurements_receive_page_ids() {
    let portal = FakePortal::with_roster("S1,10,P1,1,0.1,0.2,0.3\n").station(
        10,
        &three_measurements(),
        CALIBRATION_HEADER,
        station_page(
            &[
                ("2023-05-01 10:15", 101, true),
                ("2023-05-02 11:30", 102, true),
                ("2023-05-03 09:00", 103, false),
            ],
            &[],
        ),
    )
    .download("/measurement/101/csv-download", "t,ec\n0,1\n")
    .download("/measurement/102/csv-download", "t,ec\n0,2\n");

    let mut store = SnapshotStore::in_memory().await.unwrap();
    let stats = BackupRunner::new(&portal, &mut store)
        .run(&credentials())
        .await
        .unwrap();

    assert_eq!(stats.stations, 1);
    assert_eq!(stats.measurements, 3);
    assert_eq!(stats.measurement_files, 2);
    assert_eq!(stats.portal_version, "3.2.1");

    let rows: Vec<(i64, i64, String)> =
        sqlx::query_as("SELECT id, station_id, datetime FROM measurement ORDER BY id")
            .fetch_all(store.pool())
            .await
            .unwrap();
    assert_eq!(
        rows,
        vec![
            (101, 10, "2023-05-01 10:15:42".to_string()),
            (102, 10, "2023-05-02 11:30:07".to_string()),
            (103, 10, "2023-05-03 09:00:59".to_string()),
        ]
    );

    let csv: Vec<u8> =
        sqlx::query_scalar("SELECT csv_data FROM measurement_csv_data WHERE measurement_id = 102")
            .fetch_one(store.pool())
            .await
            .unwrap();
    assert_eq!(csv, b"t,ec\n0,2\n");

    let raw: Vec<u8> = sqlx::query_scalar("SELECT station_raw_measurement_data FROM measurement_raw")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(raw, three_measurements().into_bytes());

    assert_eq!(count(&store, "station").await, 1);
    assert_eq!(count(&store, "project").await, 1);
    assert_eq!(count(&store, "calibration_raw").await, 1);
}

#[tokio::test]
async fn test_timestamp_mismatch_aborts_without_station_rows() {
    let portal = FakePortal::with_roster("S1,10,P1,1,0.1,0.2,0.3\n").station(
        10,
        &three_measurements(),
        CALIBRATION_HEADER,
        station_page(
            &[
                ("2023-05-01 10:15", 101, false),
                ("2023-05-02 11:31", 102, false),
                ("2023-05-03 09:00", 103, false),
            ],
            &[],
        ),
    );

    let mut store = SnapshotStore::in_memory().await.unwrap();
    let result = BackupRunner::new(&portal, &mut store)
        .run(&credentials())
        .await;

    assert!(matches!(
        result,
        Err(Error::Correlation {
            station_id: 10,
            row: 2,
            ..
        })
    ));
    assert_eq!(count(&store, "measurement").await, 0);
    assert_eq!(count(&store, "station").await, 0);
    assert_eq!(count(&store, "version").await, 1);
}

#[tokio::test]
async fn test_blank_group_is_null_and_not_fetched() {
    let portal = FakePortal::with_roster("S1,10,P1,1,0.1,0.2,0.3\n").station(
        10,
        &three_measurements(),
        CALIBRATION_HEADER,
        station_page(
            &[
                ("2023-05-01 10:15", 101, false),
                ("2023-05-02 11:30", 102, false),
                ("2023-05-03 09:00", 103, false),
            ],
            &[],
        ),
    );

    let mut store = SnapshotStore::in_memory().await.unwrap();
    BackupRunner::new(&portal, &mut store)
        .run(&credentials())
        .await
        .unwrap();

    assert_eq!(portal.group_fetches(), vec![12]);

    let groups: Vec<(i64, Option<i64>)> =
        sqlx::query_as("SELECT id, group_id FROM measurement ORDER BY id")
            .fetch_all(store.pool())
            .await
            .unwrap();
    assert_eq!(groups, vec![(101, Some(12)), (102, None), (103, None)]);
    assert_eq!(count(&store, "measurement_group").await, 1);
}

#[tokio::test]
async fn test_failed_station_keeps_earlier_stations() {
    let roster = "S1,10,P1,1,0.1,0.2,0.3\nS2,11,P1,1,0.1,0.2,0.3\n";
    let good_page = station_page(&[("2023-05-01 10:15", 101, false)], &[]);
    let bad_page = station_page(&[("1999-01-01 00:00", 201, false)], &[]);
    let portal = FakePortal::with_roster(roster)
        .station(10, &measurement_csv(&[("", "2023-05-01 10:15:42")]), "", good_page)
        .station(11, &measurement_csv(&[("", "2023-06-01 08:00:00")]), "", bad_page);

    let mut store = SnapshotStore::in_memory().await.unwrap();
    let result = BackupRunner::new(&portal, &mut store)
        .run(&credentials())
        .await;

    assert!(matches!(result, Err(Error::Correlation { station_id: 11, .. })));

    let stations: Vec<i64> = sqlx::query_scalar("SELECT id FROM station")
        .fetch_all(store.pool())
        .await
        .unwrap();
    assert_eq!(stations, vec![10]);
    let measurements: Vec<i64> = sqlx::query_scalar("SELECT id FROM measurement")
        .fetch_all(store.pool())
        .await
        .unwrap();
    assert_eq!(measurements, vec![101]);
}

#[tokio::test]
async fn test_shared_group_fetched_once_and_calibrations_stored() {
    let roster = "S1,10,P1,1,0.1,0.2,0.3\nS2,20,P2,2,0.1,0.2,0.3\n";
    let calibrations = format!(
        "{}2023-04-30 09:00:00,0.999,0.00049,1.2,0.5,1000,0.5,5,1,2,3,4,5,cal.csv\n",
        CALIBRATION_HEADER
    );
    let portal = FakePortal::with_roster(roster)
        .station(
            10,
            &measurement_csv(&[("7", "2023-05-01 10:15:42")]),
            &calibrations,
            station_page(&[("2023-05-01 10:15", 101, false)], &[("2023-04-30", 55)]),
        )
        .station(
            20,
            &measurement_csv(&[("7", "2023-05-02 10:15:42")]),
            "",
            station_page(&[("2023-05-02 10:15", 201, false)], &[]),
        );

    let mut store = SnapshotStore::in_memory().await.unwrap();
    let stats = BackupRunner::new(&portal, &mut store)
        .run(&credentials())
        .await
        .unwrap();

    assert_eq!(stats.projects, 2);
    assert_eq!(stats.stations, 2);
    assert_eq!(stats.calibrations, 1);
    assert_eq!(portal.group_fetches(), vec![7]);

    let calibration: (i64, i64, f64) =
        sqlx::query_as("SELECT id, station_id, ec_t_step_5 FROM calibration")
            .fetch_one(store.pool())
            .await
            .unwrap();
    assert_eq!(calibration, (55, 10, 5.0));
}

#[tokio::test]
async fn test_version_stamp_written_once() {
    let portal = FakePortal::with_roster("S1,10,P1,1,0.1,0.2,0.3\n");

    let mut store = SnapshotStore::in_memory().await.unwrap();
    BackupRunner::new(&portal, &mut store)
        .run(&credentials())
        .await
        .unwrap();

    let rows: Vec<(i64, i64, String, String)> = sqlx::query_as(
        "SELECT id, database_version, salt_portal_version, created_by_user FROM version",
    )
    .fetch_all(store.pool())
    .await
    .unwrap();
    assert_eq!(
        rows,
        vec![(0, DATABASE_VERSION, "3.2.1".to_string(), "tech".to_string())]
    );
    assert_eq!(count(&store, "station_list_raw").await, 1);
}

#[tokio::test]
async fn test_rerun_replaces_previous_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("salt_portal.db");

    let first = FakePortal::with_roster("Old,10,Old project,1,0.1,0.2,0.3\n").station(
        10,
        &measurement_csv(&[("", "2023-05-01 10:15:42")]),
        "",
        station_page(&[("2023-05-01 10:15", 101, false)], &[]),
    );
    let mut store = SnapshotStore::open(&path).await.unwrap();
    BackupRunner::new(&first, &mut store)
        .run(&credentials())
        .await
        .unwrap();
    store.close().await;

    let second = FakePortal::with_roster("New,30,New project,3,0.1,0.2,0.3\n");
    let mut store = SnapshotStore::open(&path).await.unwrap();
    BackupRunner::new(&second, &mut store)
        .run(&credentials())
        .await
        .unwrap();

    let projects: Vec<i64> = sqlx::query_scalar("SELECT id FROM project")
        .fetch_all(store.pool())
        .await
        .unwrap();
    assert_eq!(projects, vec![3]);
    assert_eq!(count(&store, "measurement").await, 0);
    assert_eq!(count(&store, "version").await, 1);
}

#[tokio::test]
async fn test_rejected_login_writes_nothing() {
    let portal = FakePortal {
        reject_login: true,
        ..FakePortal::with_roster("S1,10,P1,1,0.1,0.2,0.3\n")
    };

    let mut store = SnapshotStore::in_memory().await.unwrap();
    let result = BackupRunner::new(&portal, &mut store)
        .run(&credentials())
        .await;

    assert!(matches!(result, Err(Error::Authentication { .. })));
    assert_eq!(count(&store, "version").await, 0);
}

#[tokio::test]
async fn test_cancelled_run_stops_before_next_station() {
    let portal = FakePortal::with_roster("S1,10,P1,1,0.1,0.2,0.3\n");
    let token = CancellationToken::new();
    token.cancel();

    let mut store = SnapshotStore::in_memory().await.unwrap();
    let result = BackupRunner::new(&portal, &mut store)
        .with_cancellation(token)
        .run(&credentials())
        .await;

    assert!(matches!(result, Err(Error::Interrupted { .. })));
    assert_eq!(count(&store, "station").await, 0);
}
