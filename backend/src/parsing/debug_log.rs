//! PHD2 debug log parser.
//!
//! Only the event-server traffic is of interest:
//!
//! ```text
//! 22:14:05.123 00.002 4711 evsrv: {"Event":"SettleDone","Status":0,"TotalFrames":4,...}
//! 22:13:50.001 00.001 4711 evsrv: cli 1A2B request: {"method":"dither","params":{...},"id":7}
//! ```
//!
//! Lines carry a time of day only. The date comes from the log file name
//! (`PHD2_DebugLog_YYYY-MM-DD_HHMMSS.txt`) or from `Guiding Begins at` lines,
//! and rolls over when the clock jumps back by more than twelve hours.

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Approximate duration of one guide frame (2 s exposure plus overhead).
pub const FRAME_TIME_SECS: f64 = 2.6;

static EVENT_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<time>\d{2}:\d{2}:\d{2}\.\d{3})\s+[\d.]+\s+\d+\s+evsrv:\s*(?:cli\s+[A-F0-9]+\s+(?:request|response):\s*)?(?P<json>\{.+\})\s*$",
    )
    .expect("valid debug log event pattern")
});

static GUIDING_BEGINS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Guiding Begins at\s+(?P<date>\d{4}-\d{2}-\d{2})\s+\d{2}:\d{2}:\d{2}")
        .expect("valid guiding section pattern")
});

static FILE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"PHD2_DebugLog_(?P<date>\d{4}-\d{2}-\d{2})_\d{6}\.txt")
        .expect("valid debug log file name pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Timeout,
    LostStar,
    GuidingStopped,
    Other,
    Unknown,
}

impl FailureReason {
    pub fn from_error(error: Option<&str>) -> Self {
        let Some(error) = error else {
            return FailureReason::Unknown;
        };
        let lower = error.to_lowercase();
        if lower.contains("timed-out") {
            FailureReason::Timeout
        } else if lower.contains("guide star") {
            FailureReason::LostStar
        } else if lower.contains("stopped") {
            FailureReason::GuidingStopped
        } else {
            FailureReason::Other
        }
    }
}

/// A `SettleDone` notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleEvent {
    pub timestamp: NaiveDateTime,
    /// 0 on success.
    pub status: i64,
    pub total_frames: u32,
    pub dropped_frames: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Estimated from the frame count.
    pub settle_time_sec: f64,
}

impl SettleEvent {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        if self.success() {
            None
        } else {
            Some(FailureReason::from_error(self.error.as_deref()))
        }
    }
}

/// A `dither` request sent to PHD2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DitherCommand {
    pub timestamp: NaiveDateTime,
    pub amount: f64,
    pub ra_only: bool,
    pub settle_pixels: f64,
    pub settle_time: f64,
    pub settle_timeout: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<serde_json::Value>,
}

/// A `Settling` progress notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleProgress {
    pub timestamp: NaiveDateTime,
    pub distance: f64,
    pub time_in_threshold: f64,
    pub settle_time_required: f64,
    pub star_locked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugLog {
    pub settles: Vec<SettleEvent>,
    pub dithers: Vec<DitherCommand>,
    pub progress: Vec<SettleProgress>,
    /// Event lines dropped for bad JSON or a missing date context.
    pub lines_skipped: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SettleDonePayload {
    #[serde(default)]
    status: i64,
    #[serde(default)]
    total_frames: u32,
    #[serde(default)]
    dropped_frames: u32,
    error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SettlingPayload {
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    time: f64,
    #[serde(default = "default_settle_time")]
    settle_time: f64,
    #[serde(default)]
    star_locked: bool,
}

#[derive(Deserialize)]
struct SettleParams {
    #[serde(default = "default_settle_pixels")]
    pixels: f64,
    #[serde(default = "default_settle_time")]
    time: f64,
    #[serde(default = "default_settle_timeout")]
    timeout: f64,
}

impl Default for SettleParams {
    fn default() -> Self {
        Self {
            pixels: default_settle_pixels(),
            time: default_settle_time(),
            timeout: default_settle_timeout(),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct DitherParams {
    #[serde(default)]
    amount: f64,
    #[serde(default)]
    ra_only: bool,
    #[serde(default)]
    settle: SettleParams,
}

fn default_settle_pixels() -> f64 {
    1.5
}

fn default_settle_time() -> f64 {
    10.0
}

fn default_settle_timeout() -> f64 {
    60.0
}

/// Turns line clock times into full timestamps.
struct DateContext {
    date: Option<NaiveDate>,
    last: Option<NaiveDateTime>,
}

impl DateContext {
    fn set_date(&mut self, date: NaiveDate) {
        self.date = Some(date);
        self.last = None;
    }

    fn resolve(&mut self, clock: &str, unix_timestamp: Option<f64>) -> Option<NaiveDateTime> {
        if self.date.is_none() {
            // Last resort: the event's own Unix time, read in the local zone.
            self.date = unix_timestamp
                .and_then(|secs| Local.timestamp_opt(secs.trunc() as i64, 0).single())
                .map(|dt| dt.date_naive());
        }
        let date = self.date?;
        let time = NaiveTime::parse_from_str(clock, "%H:%M:%S%.3f").ok()?;
        let mut ts = date.and_time(time);
        if let Some(last) = self.last {
            if ts < last - Duration::hours(12) {
                ts = ts.checked_add_signed(Duration::days(1))?;
                self.date = Some(ts.date());
            }
        }
        self.last = Some(ts);
        Some(ts)
    }
}

/// Parse PHD2 debug log text. `file_name` seeds the date context when it
/// follows the PHD2 naming scheme.
pub fn parse_debug_log(text: &str, file_name: Option<&str>) -> DebugLog {
    let mut log = DebugLog::default();
    let mut context = DateContext {
        date: file_name
            .and_then(|name| FILE_NAME_RE.captures(name))
            .and_then(|caps| NaiveDate::parse_from_str(&caps["date"], "%Y-%m-%d").ok()),
        last: None,
    };

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(caps) = GUIDING_BEGINS_RE.captures(line) {
            if let Ok(date) = NaiveDate::parse_from_str(&caps["date"], "%Y-%m-%d") {
                context.set_date(date);
            }
            continue;
        }
        let Some(caps) = EVENT_LINE_RE.captures(line) else {
            continue;
        };
        let Ok(json) = serde_json::from_str::<serde_json::Value>(&caps["json"]) else {
            log.lines_skipped += 1;
            log::debug!("Skipping debug log line with invalid JSON: {}", line);
            continue;
        };

        let event = json.get("Event").and_then(|e| e.as_str()).map(str::to_owned);
        let method = json.get("method").and_then(|m| m.as_str()).map(str::to_owned);
        if event.is_none() && method.is_none() {
            continue;
        }
        let unix = json.get("Timestamp").and_then(|t| t.as_f64());
        let Some(timestamp) = context.resolve(&caps["time"], unix) else {
            log.lines_skipped += 1;
            log::debug!("No date context for debug log line: {}", line);
            continue;
        };

        match (event.as_deref(), method.as_deref()) {
            (Some("SettleDone"), _) => match serde_json::from_value::<SettleDonePayload>(json) {
                Ok(p) => log.settles.push(SettleEvent {
                    timestamp,
                    status: p.status,
                    total_frames: p.total_frames,
                    dropped_frames: p.dropped_frames,
                    error: p.error,
                    settle_time_sec: p.total_frames as f64 * FRAME_TIME_SECS,
                }),
                Err(e) => {
                    log.lines_skipped += 1;
                    log::debug!("Malformed SettleDone: {}", e);
                }
            },
            (Some("Settling"), _) => {
                if let Ok(p) = serde_json::from_value::<SettlingPayload>(json) {
                    log.progress.push(SettleProgress {
                        timestamp,
                        distance: p.distance,
                        time_in_threshold: p.time,
                        settle_time_required: p.settle_time,
                        star_locked: p.star_locked,
                    });
                }
            }
            (None, Some("dither")) => {
                let params = json
                    .get("params")
                    .cloned()
                    .map(serde_json::from_value::<DitherParams>)
                    .transpose();
                match params {
                    Ok(params) => {
                        let params = params.unwrap_or_default();
                        log.dithers.push(DitherCommand {
                            timestamp,
                            amount: params.amount,
                            ra_only: params.ra_only,
                            settle_pixels: params.settle.pixels,
                            settle_time: params.settle.time,
                            settle_timeout: params.settle.timeout,
                            request_id: json.get("id").cloned(),
                        });
                    }
                    Err(e) => {
                        log.lines_skipped += 1;
                        log::debug!("Malformed dither request: {}", e);
                    }
                }
            }
            _ => {}
        }
    }

    log::info!(
        "Parsed PHD2 debug log: {} settle events, {} dither commands, {} lines skipped",
        log.settles.len(),
        log.dithers.len(),
        log.lines_skipped
    );
    log
}
