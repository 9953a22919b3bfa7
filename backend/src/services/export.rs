//! AstroBin acquisition CSV export.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ErrorContext, PlannerError, PlannerResult};
use crate::models::Frame;
use crate::services::filters::normalize_filter;

/// AstroBin equipment ids for common filters.
pub const DEFAULT_FILTER_MAP: &str = "R=3007\nHa=4657\nOIII=4746\nSII=4838\nL=3012\nG=3011\nB=3008\n";

pub const CSV_HEADER: [&str; 4] = ["date", "filter", "number", "duration"];

/// Normalized filter name to AstroBin filter id.
pub type FilterIdMap = BTreeMap<String, u32>;

/// Parse `Name=ID` lines. Blank lines, `#` comments and lines without an id
/// are ignored. Names are normalized so `H-alpha=4657` maps `Ha` frames.
pub fn parse_filter_map(text: &str) -> FilterIdMap {
    let mut map = FilterIdMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((name, id)) = line.split_once('=') else {
            continue;
        };
        match id.trim().parse::<u32>() {
            Ok(id) => {
                map.insert(normalize_filter(name), id);
            }
            Err(_) => log::warn!("Ignoring filter map line without numeric id: {}", line),
        }
    }
    map
}

/// One CSV row: frames sharing a night, filter id and exposure length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionRow {
    pub date: String,
    /// `None` when the filter has no id in the map; written as an empty cell.
    pub filter: Option<u32>,
    pub number: usize,
    pub duration: f64,
}

/// Duration cell text. Whole seconds keep one decimal (`300.0`) so the column
/// always reads as a float.
fn format_duration(seconds: f64) -> String {
    if seconds.fract() == 0.0 {
        format!("{:.1}", seconds)
    } else {
        seconds.to_string()
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Group light frames with a positive exposure into acquisition rows, sorted
/// by date, filter id and duration.
pub fn acquisition_rows(frames: &[Frame], filter_map: &FilterIdMap) -> Vec<AcquisitionRow> {
    // Durations are keyed in 1e-4 s units so equal rounded values group together.
    let mut groups: BTreeMap<(String, Option<u32>, i64), usize> = BTreeMap::new();
    for frame in frames {
        if !frame.is_light() || !(frame.exposure_seconds > 0.0) {
            continue;
        }
        let date = frame.timestamp.date().format("%Y-%m-%d").to_string();
        let filter = filter_map.get(&normalize_filter(&frame.filter)).copied();
        let duration_key = (round4(frame.exposure_seconds) * 10_000.0).round() as i64;
        *groups.entry((date, filter, duration_key)).or_insert(0) += 1;
    }
    groups
        .into_iter()
        .map(|((date, filter, duration_key), number)| AcquisitionRow {
            date,
            filter,
            number,
            duration: duration_key as f64 / 10_000.0,
        })
        .collect()
}

/// Render rows as AstroBin CSV text, header included.
pub fn write_acquisition_csv(rows: &[AcquisitionRow]) -> PlannerResult<String> {
    let context = || ErrorContext::new("write_acquisition_csv");
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(CSV_HEADER)
        .map_err(|e| PlannerError::storage(e.to_string(), context()))?;
    for row in rows {
        writer
            .write_record([
                row.date.clone(),
                row.filter.map(|id| id.to_string()).unwrap_or_default(),
                row.number.to_string(),
                format_duration(row.duration),
            ])
            .map_err(|e| PlannerError::storage(e.to_string(), context()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| PlannerError::storage(e.to_string(), context()))?;
    String::from_utf8(bytes).map_err(|e| PlannerError::storage(e.to_string(), context()))
}

/// Frames to CSV text in one step.
pub fn export_acquisitions(frames: &[Frame], filter_map: &FilterIdMap) -> PlannerResult<String> {
    let rows = acquisition_rows(frames, filter_map);
    log::info!("Exporting {} acquisition rows from {} frames", rows.len(), frames.len());
    write_acquisition_csv(&rows)
}
