//! Timestamp helpers shared by the log parsers and frame records.
//!
//! Acquisition logs carry local wall-clock times without an offset, so all
//! timestamps are kept as [`NaiveDateTime`]. Hour-of-night bucketing relies on
//! that: the hour of a timestamp is the hour printed in the log.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};

/// Parse an ISO-8601 log timestamp (`2024-03-01T21:14:05.1234`).
///
/// Fractional seconds of any width are accepted; they are truncated or padded
/// to microseconds before parsing. Returns `None` for anything else.
pub fn parse_log_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    match raw.split_once('.') {
        None => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").ok(),
        Some((whole, frac)) => {
            let digits: String = frac.chars().take_while(|c| c.is_ascii_digit()).collect();
            if digits.is_empty() {
                return None;
            }
            let mut micros: String = digits.chars().take(6).collect();
            while micros.len() < 6 {
                micros.push('0');
            }
            NaiveDateTime::parse_from_str(&format!("{}.{}", whole, micros), "%Y-%m-%dT%H:%M:%S%.6f")
                .ok()
        }
    }
}

/// Parse a frame timestamp.
///
/// Accepts a full date-time (with or without offset, `T` or space separated)
/// or a bare `YYYY-MM-DD` date, which maps to midnight.
pub fn parse_frame_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    if let Some(ts) = parse_log_timestamp(raw) {
        return Some(ts);
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(ts);
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Signed seconds from `from` to `to`.
pub fn seconds_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1e6,
        None => delta.num_milliseconds() as f64 / 1000.0,
    }
}

/// Offset a timestamp by fractional seconds.
///
/// `None` when the offset is not finite or the result leaves the
/// representable date range. Offsets read from log text go through here.
pub fn checked_add_seconds(ts: NaiveDateTime, seconds: f64) -> Option<NaiveDateTime> {
    if !seconds.is_finite() {
        return None;
    }
    let micros = (seconds * 1e6).round();
    if micros.abs() >= i64::MAX as f64 {
        return None;
    }
    ts.checked_add_signed(Duration::microseconds(micros as i64))
}

/// Offset a timestamp by fractional seconds, saturating at the ends of the
/// representable range.
pub fn add_seconds(ts: NaiveDateTime, seconds: f64) -> NaiveDateTime {
    checked_add_seconds(ts, seconds).unwrap_or(if seconds < 0.0 {
        NaiveDateTime::MIN
    } else {
        NaiveDateTime::MAX
    })
}

/// Serde adapter for [`parse_frame_timestamp`].
pub fn deserialize_frame_timestamp<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_frame_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unparsable timestamp: {}", raw)))
}
