//! PHD2 guide log parser.
//!
//! A guide log holds one or more guiding sections. Each section opens with
//! `Guiding Begins at YYYY-MM-DD HH:MM:SS`, declares its CSV columns in a
//! `Frame,Time,...` header and then lists one row per guide step, where `Time`
//! is the elapsed seconds since the section began. `INFO:` lines are
//! interleaved with the rows.

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::time::{add_seconds, checked_add_seconds, seconds_between};
use crate::models::{GuidingSample, SessionEvent, TriggerEvent};

/// Slack around an exposure when matching guide samples to it.
pub const DEFAULT_CORRELATION_TOLERANCE_SECS: f64 = 30.0;

static SECTION_START_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Guiding Begins at (\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2})")
        .expect("valid guiding section pattern")
});

/// Column layout of the current section.
struct Columns {
    time: usize,
    ra: Option<usize>,
    dec: Option<usize>,
}

impl Columns {
    fn from_header(record: &csv::StringRecord) -> Option<Self> {
        let index: HashMap<&str, usize> = record
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim(), i))
            .collect();
        Some(Self {
            time: *index.get("Time")?,
            ra: index.get("RARawDistance").copied(),
            dec: index.get("DECRawDistance").copied(),
        })
    }
}

fn read_record(line: &str) -> Option<csv::StringRecord> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    reader.records().next().and_then(Result::ok)
}

/// Finite numeric field.
fn finite(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Distance field; blank or missing counts as zero.
fn distance(record: &csv::StringRecord, column: Option<usize>) -> Option<f64> {
    match column.and_then(|i| record.get(i)).map(str::trim) {
        None | Some("") => Some(0.0),
        Some(raw) => finite(raw),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideLog {
    /// Guide steps in file order.
    pub samples: Vec<GuidingSample>,
    /// Dithers announced by `INFO: DITHER` lines.
    pub dithers: Vec<TriggerEvent>,
    pub sections: usize,
    /// Data rows with a non-numeric or non-finite `Time` or distance, or an
    /// elapsed time past the end of the calendar.
    pub rows_skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuidingSummary {
    pub sample_count: usize,
    pub total_mean: f64,
    pub total_median: f64,
    /// Population standard deviation.
    pub total_std: f64,
    pub ra_mean: f64,
    pub dec_mean: f64,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

impl GuideLog {
    /// The log as typed session events: samples and dithers, ordered by time.
    pub fn events(&self) -> Vec<SessionEvent> {
        let mut events: Vec<SessionEvent> = self
            .samples
            .iter()
            .copied()
            .map(SessionEvent::GuideSample)
            .chain(self.dithers.iter().map(|d| SessionEvent::Dither {
                timestamp: d.timestamp,
            }))
            .collect();
        events.sort_by_key(|e| e.timestamp());
        events
    }

    pub fn summary(&self) -> Option<GuidingSummary> {
        if self.samples.is_empty() {
            return None;
        }
        let totals: Vec<f64> = self.samples.iter().map(|s| s.rms).collect();
        let ra: Vec<f64> = self.samples.iter().map(|s| s.ra_rms.unwrap_or(0.0)).collect();
        let dec: Vec<f64> = self.samples.iter().map(|s| s.dec_rms.unwrap_or(0.0)).collect();
        let total_mean = mean(&totals);
        let variance = totals.iter().map(|v| (v - total_mean).powi(2)).sum::<f64>() / totals.len() as f64;

        Some(GuidingSummary {
            sample_count: totals.len(),
            total_mean,
            total_median: median(&totals),
            total_std: variance.sqrt(),
            ra_mean: mean(&ra),
            dec_mean: mean(&dec),
            start: self.samples.iter().map(|s| s.timestamp).min()?,
            end: self.samples.iter().map(|s| s.timestamp).max()?,
        })
    }

    /// Mean total RMS of the samples taken during an exposure, widened by
    /// `tolerance_secs` on both sides.
    pub fn mean_rms_during(
        &self,
        start: NaiveDateTime,
        exposure_secs: f64,
        tolerance_secs: f64,
    ) -> Option<f64> {
        let from = add_seconds(start, -tolerance_secs);
        let to = add_seconds(start, exposure_secs + tolerance_secs);
        let matching: Vec<f64> = self
            .samples
            .iter()
            .filter(|s| s.timestamp >= from && s.timestamp <= to)
            .map(|s| s.rms)
            .collect();
        if matching.is_empty() {
            None
        } else {
            Some(mean(&matching))
        }
    }

    /// Seconds covered by the guide samples.
    pub fn span_seconds(&self) -> f64 {
        self.summary()
            .map(|s| seconds_between(s.start, s.end))
            .unwrap_or(0.0)
    }
}

/// Parse PHD2 guide log text.
///
/// Rows before a section's start line or header are ignored, as are
/// calibration sections. A row whose `Time` is not a number (`Settling
/// started`, star-lost markers) is skipped and counted.
pub fn parse_guide_log(text: &str) -> GuideLog {
    let mut log = GuideLog::default();
    let mut base: Option<NaiveDateTime> = None;
    let mut columns: Option<Columns> = None;

    for line in text.lines() {
        let line = line.trim_end_matches('\r');

        if let Some(caps) = SECTION_START_RE.captures(line) {
            base = NaiveDateTime::parse_from_str(&caps[1], "%Y-%m-%d %H:%M:%S").ok();
            columns = None;
            if base.is_some() {
                log.sections += 1;
            } else {
                log::warn!("Unparsable guiding start time: {}", &caps[1]);
            }
            continue;
        }
        if line.starts_with("Guiding Ends") || line.starts_with("Calibration Begins") {
            base = None;
            columns = None;
            continue;
        }
        let Some(section_start) = base else {
            continue;
        };
        if line.starts_with("Frame,") {
            columns = read_record(line).as_ref().and_then(Columns::from_header);
            continue;
        }
        if let Some(info) = line.strip_prefix("INFO:") {
            if info.contains("DITHER") {
                let at = log
                    .samples
                    .last()
                    .map(|s| s.timestamp)
                    .filter(|ts| *ts >= section_start)
                    .unwrap_or(section_start);
                log.dithers.push(TriggerEvent::dither(at));
            }
            continue;
        }
        let Some(cols) = columns.as_ref() else {
            continue;
        };
        if line.trim().is_empty() {
            continue;
        }
        let Some(record) = read_record(line) else {
            continue;
        };

        let timestamp = record
            .get(cols.time)
            .and_then(finite)
            .and_then(|elapsed| checked_add_seconds(section_start, elapsed));
        let ra = distance(&record, cols.ra);
        let dec = distance(&record, cols.dec);
        let sample = match (timestamp, ra, dec) {
            (Some(timestamp), Some(ra), Some(dec)) => {
                Some(GuidingSample::from_components(timestamp, ra.abs(), dec.abs()))
                    .filter(|s| s.rms.is_finite())
            }
            _ => None,
        };
        match sample {
            Some(sample) => log.samples.push(sample),
            None => {
                log.rows_skipped += 1;
                log::debug!("Skipping guide log row: {}", line);
            }
        }
    }

    if log.sections == 0 {
        log::warn!("No guiding section found in PHD2 guide log");
    }
    log::info!(
        "Parsed PHD2 guide log: {} sections, {} samples, {} dithers, {} rows skipped",
        log.sections,
        log.samples.len(),
        log.dithers.len(),
        log.rows_skipped
    );
    log
}
