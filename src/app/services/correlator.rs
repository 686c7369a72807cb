//! Identifier correlation between CSV exports and station page tables
//!
//! A station's CSV export carries every field of a record but no durable
//! identifier. The HTML table on the station page carries the identifier in
//! its update link, but only a truncated display timestamp. Both renders list
//! records in the same server order, so rows are paired by index and the pair
//! is accepted only when the displayed timestamp equals the CSV timestamp cut
//! to the same length. The first disagreement aborts the run: assigning an id
//! to the wrong row would silently corrupt the archive.

use crate::app::models::{ExportTable, RecordKind};
use crate::app::services::record_mapper::parse_integral;
use crate::app::services::station_page::{HtmlRow, table_rows};
use crate::constants::{EXPORT_ID_COLUMN, MEASUREMENT_DOWNLOAD_HREF_PATTERN, station_page_path};
use crate::{Error, Result};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, warn};

static MEASUREMENT_UPDATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/measurement/(\d+)/update").expect("measurement update pattern")
});
static CALIBRATION_UPDATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/calibration/(\d+)/update").expect("calibration update pattern")
});
static MEASUREMENT_DOWNLOAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(MEASUREMENT_DOWNLOAD_HREF_PATTERN).expect("measurement download pattern")
});

/// Identifiers and download links resolved for one export, indexed like its rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Correlation {
    /// Correlated id of each CSV row; `None` for rows without an update link
    pub ids: Vec<Option<i64>>,

    /// Absolute download URL of each CSV row (measurements only)
    pub download_urls: Vec<Option<String>>,
}

impl Correlation {
    fn unlinked(rows: usize) -> Self {
        Self {
            ids: vec![None; rows],
            download_urls: vec![None; rows],
        }
    }

    /// Number of rows that received an id
    pub fn linked_count(&self) -> usize {
        self.ids.iter().filter(|id| id.is_some()).count()
    }

    /// Number of rows left without an id
    pub fn unlinked_count(&self) -> usize {
        self.ids.len() - self.linked_count()
    }
}

fn update_pattern(kind: RecordKind) -> &'static Regex {
    match kind {
        RecordKind::Measurement => &*MEASUREMENT_UPDATE_RE,
        RecordKind::Calibration => &*CALIBRATION_UPDATE_RE,
    }
}

/// Id embedded in the row's update link for this record kind
pub fn update_link_id(kind: RecordKind, row: &HtmlRow) -> Option<i64> {
    let pattern = update_pattern(kind);
    row.hrefs().find_map(|href| {
        pattern
            .captures(href)
            .and_then(|caps| caps[1].parse::<i64>().ok())
    })
}

/// Absolute URL for a link found on a portal page
fn absolute_url(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!("{}{}", base_url, href)
    }
}

/// Correlate an export with the station page it was fetched alongside
pub fn correlate_station_page(
    kind: RecordKind,
    station_id: i64,
    export: &ExportTable,
    station_html: &str,
    base_url: &str,
) -> Result<Correlation> {
    if export.is_empty() {
        debug!("Station {} has no {}, skipping correlation", station_id, kind);
        return Ok(Correlation::default());
    }

    let rows = table_rows(station_html, kind.table_id()).ok_or_else(|| {
        Error::protocol(
            absolute_url(base_url, &station_page_path(station_id)),
            format!(
                "Station page has no '{}' table but the export lists {} {}",
                kind.table_id(),
                export.len(),
                kind
            ),
        )
    })?;

    correlate(kind, station_id, export, &rows, base_url)
}

/// Pair export rows with HTML rows by index and assign ids
///
/// HTML rows without an update link leave the CSV row at the same index
/// unlinked. An HTML row whose link cannot be paired with a CSV row, whose
/// displayed timestamp disagrees with it, or whose id repeats an earlier one
/// is a correlation error.
pub fn correlate(
    kind: RecordKind,
    station_id: i64,
    export: &ExportTable,
    html_rows: &[HtmlRow],
    base_url: &str,
) -> Result<Correlation> {
    let mut correlation = Correlation::unlinked(export.len());
    let datetime_column = kind.datetime_column();

    if !export.is_empty() && !export.has_column(datetime_column) {
        return Err(Error::protocol(
            absolute_url(base_url, &station_page_path(station_id)),
            format!("{} export has no '{}' column", kind, datetime_column),
        ));
    }

    let mut seen = HashSet::new();

    for (index, html_row) in html_rows.iter().enumerate() {
        let Some(id) = update_link_id(kind, html_row) else {
            continue;
        };
        let row_number = index + 1;

        let csv_row = export.row(index).ok_or_else(|| {
            Error::correlation(
                station_id,
                kind.to_string(),
                row_number,
                format!(
                    "page lists id {} but the export has only {} rows",
                    id,
                    export.len()
                ),
            )
        })?;

        let displayed = html_row.first_cell_text().unwrap_or_default();
        if displayed.is_empty() {
            return Err(Error::correlation(
                station_id,
                kind.to_string(),
                row_number,
                format!("page row for id {} shows no timestamp", id),
            ));
        }

        let exported = csv_row.get(datetime_column).unwrap_or_default().trim();
        let truncated: String = exported.chars().take(displayed.chars().count()).collect();
        if truncated != displayed {
            return Err(Error::correlation(
                station_id,
                kind.to_string(),
                row_number,
                format!(
                    "page shows '{}' for id {} but the export has '{}'",
                    displayed, id, exported
                ),
            ));
        }

        if let Some(own_id) = csv_row.non_empty(EXPORT_ID_COLUMN) {
            if parse_integral(own_id) != Some(id) {
                return Err(Error::correlation(
                    station_id,
                    kind.to_string(),
                    row_number,
                    format!("export row carries id '{}' but the page links id {}", own_id, id),
                ));
            }
        }

        if !seen.insert(id) {
            return Err(Error::correlation(
                station_id,
                kind.to_string(),
                row_number,
                format!("id {} appears more than once on the page", id),
            ));
        }

        correlation.ids[index] = Some(id);
    }

    if kind == RecordKind::Measurement {
        attach_download_links(&mut correlation, html_rows, base_url);
    }

    let unlinked = correlation.unlinked_count();
    if unlinked > 0 {
        warn!(
            "Station {}: {} of {} {} have no identifier on the station page and are kept only in the raw export",
            station_id,
            unlinked,
            export.len(),
            kind
        );
    }

    debug!(
        "Station {}: correlated {} {}",
        station_id,
        correlation.linked_count(),
        kind
    );
    Ok(correlation)
}

/// Attach download links to the rows whose correlated id matches the link's row
///
/// Only a measurement's own CSV link counts; group summary links sharing the
/// row are ignored.
fn attach_download_links(correlation: &mut Correlation, html_rows: &[HtmlRow], base_url: &str) {
    for html_row in html_rows {
        let Some(href) = html_row
            .hrefs()
            .find(|href| MEASUREMENT_DOWNLOAD_RE.is_match(href))
        else {
            continue;
        };
        let Some(id) = update_link_id(RecordKind::Measurement, html_row) else {
            continue;
        };

        if let Some(position) = correlation.ids.iter().position(|row_id| *row_id == Some(id)) {
            correlation.download_urls[position] = Some(absolute_url(base_url, href));
        }
    }
}
