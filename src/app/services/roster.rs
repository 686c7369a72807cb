//! Station roster parsing
//!
//! The roster endpoint serves a headerless CSV with one line per station. The
//! fixed header is prepended before parsing, and projects are derived from the
//! distinct project columns since the portal has no project listing.

use crate::app::models::{Project, Roster, Station};
use crate::constants::ROSTER_HEADER;
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::debug;

/// One roster line, in the column order of `ROSTER_HEADER`
#[derive(Debug, Deserialize)]
struct RosterLine {
    station_name: String,
    station_id: i64,
    project_name: String,
    project_id: i64,
    cft_1: f64,
    cft_2: f64,
    cft_3: f64,
}

/// Parse the served roster payload
pub fn parse_roster(raw: Vec<u8>) -> Result<Roster> {
    let mut payload = Vec::with_capacity(ROSTER_HEADER.len() + raw.len());
    payload.extend_from_slice(ROSTER_HEADER.as_bytes());
    payload.extend_from_slice(&raw);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(payload.as_slice());

    let mut stations = Vec::new();
    let mut projects = Vec::new();
    let mut seen_projects = HashSet::new();

    for (index, line) in reader.deserialize::<RosterLine>().enumerate() {
        let line = line.map_err(|e| {
            Error::unreadable_csv(
                "station roster",
                format!("Invalid roster line {}", index + 1),
                e,
            )
        })?;

        if seen_projects.insert(line.project_id) {
            projects.push(Project {
                id: line.project_id,
                name: line.project_name.clone(),
            });
        }

        stations.push(Station {
            id: line.station_id,
            name: line.station_name,
            project_id: line.project_id,
            cft_1: line.cft_1,
            cft_2: line.cft_2,
            cft_3: line.cft_3,
        });
    }

    debug!(
        "Parsed roster: {} projects, {} stations",
        projects.len(),
        stations.len()
    );

    Ok(Roster {
        projects,
        stations,
        raw,
    })
}
