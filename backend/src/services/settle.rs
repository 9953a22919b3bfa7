//! Dither settle statistics from PHD2 debug logs.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::time::seconds_between;
use crate::parsing::debug_log::{FailureReason, SettleEvent};

/// Largest distance between a dither and the settle it is matched to:
/// the correlation tolerance plus the default settle timeout.
pub const DEFAULT_DITHER_MATCH_SECS: f64 = 10.0 + 60.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleStatistics {
    pub total_attempts: usize,
    pub successful: usize,
    pub failed: usize,
    /// Percent, one decimal.
    pub success_rate: f64,
    /// Timing over successful settles only, seconds, one decimal.
    pub avg_settle_time_sec: f64,
    pub min_settle_time_sec: f64,
    pub max_settle_time_sec: f64,
    pub median_settle_time_sec: f64,
    /// Successful settles by frame count.
    pub frame_distribution: BTreeMap<u32, usize>,
    pub failure_reasons: BTreeMap<FailureReason, usize>,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn settle_statistics(events: &[SettleEvent]) -> SettleStatistics {
    if events.is_empty() {
        return SettleStatistics::default();
    }

    let mut stats = SettleStatistics {
        total_attempts: events.len(),
        ..Default::default()
    };
    let mut times = Vec::new();
    for event in events {
        match event.failure_reason() {
            None => {
                stats.successful += 1;
                times.push(event.settle_time_sec);
                *stats.frame_distribution.entry(event.total_frames).or_insert(0) += 1;
            }
            Some(reason) => {
                stats.failed += 1;
                *stats.failure_reasons.entry(reason).or_insert(0) += 1;
            }
        }
    }

    stats.success_rate = round1(stats.successful as f64 / stats.total_attempts as f64 * 100.0);
    if !times.is_empty() {
        times.sort_by(f64::total_cmp);
        stats.avg_settle_time_sec = round1(times.iter().sum::<f64>() / times.len() as f64);
        stats.min_settle_time_sec = round1(times[0]);
        stats.max_settle_time_sec = round1(times[times.len() - 1]);
        // Upper median.
        stats.median_settle_time_sec = round1(times[times.len() / 2]);
    }
    stats
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DitherSettle {
    pub dither_time: NaiveDateTime,
    /// Closest settle event within the match window.
    pub settle: Option<SettleEvent>,
    pub time_delta_sec: Option<f64>,
}

/// Pair each acquisition-side dither with the closest settle event.
pub fn correlate_dithers(
    dithers: &[NaiveDateTime],
    settles: &[SettleEvent],
    max_delta_secs: f64,
) -> Vec<DitherSettle> {
    dithers
        .iter()
        .map(|&dither_time| {
            let best = settles
                .iter()
                .map(|s| (s, seconds_between(dither_time, s.timestamp).abs()))
                .filter(|(_, delta)| *delta < max_delta_secs)
                .min_by(|a, b| a.1.total_cmp(&b.1));
            DitherSettle {
                dither_time,
                settle: best.map(|(s, _)| s.clone()),
                time_delta_sec: best.map(|(_, delta)| round1(delta)),
            }
        })
        .collect()
}
