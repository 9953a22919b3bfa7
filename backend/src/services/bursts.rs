//! Guiding-error burst detection and trigger correlation.

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ensure_non_negative, PlannerResult};
use crate::models::time::seconds_between;
use crate::models::{Burst, BurstTag, GuidingSample, TriggerEvent};

pub const DEFAULT_BURST_THRESHOLD: f64 = 1.5;
pub const DEFAULT_MERGE_GAP_SECS: f64 = 5.0;
pub const DEFAULT_CORRELATION_WINDOW_SECS: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurstConfig {
    /// Samples with `rms >= threshold` are burst events.
    pub threshold: f64,
    /// Largest gap between consecutive burst events of the same burst.
    pub merge_gap_secs: f64,
    /// Half-width of the window around each trigger event.
    pub correlation_window_secs: f64,
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_BURST_THRESHOLD,
            merge_gap_secs: DEFAULT_MERGE_GAP_SECS,
            correlation_window_secs: DEFAULT_CORRELATION_WINDOW_SECS,
        }
    }
}

impl BurstConfig {
    fn validate(&self) -> PlannerResult<()> {
        ensure_non_negative("detect_bursts", "threshold", self.threshold)?;
        ensure_non_negative("detect_bursts", "merge_gap_secs", self.merge_gap_secs)?;
        ensure_non_negative(
            "detect_bursts",
            "correlation_window_secs",
            self.correlation_window_secs,
        )
    }
}

/// Burst events within one clock hour of the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourBucket {
    /// Start of the hour.
    pub hour: NaiveDateTime,
    pub events: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurstStatistics {
    pub total_event_count: usize,
    pub total_burst_count: usize,
    pub max_peak_rms: f64,
    /// Chronological; hours without burst events are omitted.
    pub events_per_hour: Vec<HourBucket>,
    /// Hour with the most burst events; the earliest wins ties.
    pub worst_hour_by_events: Option<HourBucket>,
    pub percent_bursts_near_dither: f64,
    pub percent_bursts_near_autofocus: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurstReport {
    pub bursts: Vec<Burst>,
    pub stats: BurstStatistics,
}

/// Burst under construction. `first..=last` indexes the sorted samples.
struct OpenBurst {
    first: usize,
    last: usize,
    last_event_ts: NaiveDateTime,
    rms: Vec<f64>,
}

impl OpenBurst {
    fn close(self, samples: &[GuidingSample], triggers: &[TriggerEvent], window: f64) -> Burst {
        let start = samples[self.first].timestamp;
        let end = samples[self.last].timestamp;
        let peak_rms = self.rms.iter().copied().fold(f64::MIN, f64::max);
        let avg_rms = self.rms.iter().sum::<f64>() / self.rms.len() as f64;

        let span = &samples[self.first..=self.last];
        let tags: BTreeSet<BurstTag> = triggers
            .iter()
            .filter(|trigger| {
                span.iter()
                    .any(|s| seconds_between(trigger.timestamp, s.timestamp).abs() <= window)
            })
            .map(|trigger| trigger.kind.tag())
            .collect();

        Burst {
            start,
            end,
            duration_sec: seconds_between(start, end),
            event_count: self.rms.len(),
            peak_rms,
            avg_rms,
            tags,
        }
    }
}

fn hour_start(ts: NaiveDateTime) -> NaiveDateTime {
    ts.date()
        .and_hms_opt(ts.hour(), 0, 0)
        .unwrap_or(ts)
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Group above-threshold guiding samples into bursts.
///
/// A sample at or above the threshold joins the current burst when it comes no
/// later than `merge_gap_secs` after the burst's previous above-threshold
/// sample; otherwise it opens a new burst. Below-threshold samples never count
/// as events but do belong to the span of the burst around them, which matters
/// for trigger tagging: a burst gets `near_<kind>` when any sample inside its
/// span lies within the correlation window of a trigger of that kind.
pub fn detect_bursts(
    samples: &[GuidingSample],
    triggers: &[TriggerEvent],
    config: &BurstConfig,
) -> PlannerResult<BurstReport> {
    config.validate()?;
    for sample in samples {
        ensure_non_negative("detect_bursts", "rms", sample.rms)?;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by_key(|s| s.timestamp);

    let window = config.correlation_window_secs;
    let mut bursts = Vec::new();
    let mut hourly: BTreeMap<NaiveDateTime, usize> = BTreeMap::new();
    let mut current: Option<OpenBurst> = None;

    for (i, sample) in sorted.iter().enumerate() {
        if sample.rms < config.threshold {
            continue;
        }
        *hourly.entry(hour_start(sample.timestamp)).or_insert(0) += 1;

        match current.as_mut() {
            Some(open)
                if seconds_between(open.last_event_ts, sample.timestamp) <= config.merge_gap_secs =>
            {
                open.last = i;
                open.last_event_ts = sample.timestamp;
                open.rms.push(sample.rms);
            }
            _ => {
                if let Some(done) = current.take() {
                    bursts.push(done.close(&sorted, triggers, window));
                }
                current = Some(OpenBurst {
                    first: i,
                    last: i,
                    last_event_ts: sample.timestamp,
                    rms: vec![sample.rms],
                });
            }
        }
    }
    if let Some(done) = current.take() {
        bursts.push(done.close(&sorted, triggers, window));
    }

    let events_per_hour: Vec<HourBucket> = hourly
        .into_iter()
        .map(|(hour, events)| HourBucket { hour, events })
        .collect();
    let worst_hour_by_events = events_per_hour
        .iter()
        .copied()
        .fold(None, |best: Option<HourBucket>, bucket| match best {
            Some(b) if b.events >= bucket.events => Some(b),
            _ => Some(bucket),
        });

    let near_dither = bursts.iter().filter(|b| b.has_tag(BurstTag::NearDither)).count();
    let near_autofocus = bursts
        .iter()
        .filter(|b| b.has_tag(BurstTag::NearAutofocus))
        .count();

    let stats = BurstStatistics {
        total_event_count: bursts.iter().map(|b| b.event_count).sum(),
        total_burst_count: bursts.len(),
        max_peak_rms: bursts.iter().map(|b| b.peak_rms).fold(0.0, f64::max),
        events_per_hour,
        worst_hour_by_events,
        percent_bursts_near_dither: percent(near_dither, bursts.len()),
        percent_bursts_near_autofocus: percent(near_autofocus, bursts.len()),
    };

    log::info!(
        "Detected {} bursts ({} events) in {} guiding samples",
        stats.total_burst_count,
        stats.total_event_count,
        samples.len()
    );

    Ok(BurstReport { bursts, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::time::{add_seconds, parse_log_timestamp};
    use crate::models::TriggerKind;
    use proptest::prelude::*;

    fn base() -> NaiveDateTime {
        parse_log_timestamp("2024-03-01T22:00:00").unwrap()
    }

    fn series(values: &[f64], spacing: f64) -> Vec<GuidingSample> {
        values
            .iter()
            .enumerate()
            .map(|(i, rms)| GuidingSample::new(add_seconds(base(), i as f64 * spacing), *rms))
            .collect()
    }

    fn config(threshold: f64, gap: f64, window: f64) -> BurstConfig {
        BurstConfig {
            threshold,
            merge_gap_secs: gap,
            correlation_window_secs: window,
        }
    }

    #[test]
    fn test_below_threshold_sample_inside_gap() {
        let samples = series(&[1.0, 1.6, 1.7, 1.4, 2.0, 0.9], 1.0);
        let report = detect_bursts(&samples, &[], &config(1.5, 2.0, 30.0)).unwrap();
        assert_eq!(report.bursts.len(), 1);
        let burst = &report.bursts[0];
        assert_eq!(burst.start, samples[1].timestamp);
        assert_eq!(burst.end, samples[4].timestamp);
        assert_eq!(burst.duration_sec, 3.0);
        assert_eq!(burst.event_count, 3);
        assert_eq!(burst.peak_rms, 2.0);
        assert!((burst.avg_rms - (1.6 + 1.7 + 2.0) / 3.0).abs() < 1e-12);
        assert!(burst.tags.is_empty());
    }

    #[test]
    fn test_gap_larger_than_merge_splits() {
        let samples = series(&[1.6, 1.0, 1.0, 1.8], 1.0);
        let report = detect_bursts(&samples, &[], &config(1.5, 2.0, 30.0)).unwrap();
        assert_eq!(report.bursts.len(), 2);
        assert_eq!(report.stats.total_burst_count, 2);
        assert_eq!(report.stats.total_event_count, 2);
        assert_eq!(report.stats.max_peak_rms, 1.8);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let samples = series(&[1.5], 1.0);
        let report = detect_bursts(&samples, &[], &BurstConfig::default()).unwrap();
        assert_eq!(report.bursts.len(), 1);
    }

    #[test]
    fn test_tags_from_any_sample_in_span() {
        let samples = series(&[2.0, 1.0, 1.0, 2.0], 10.0);
        // Dither 5 s after the last sample; autofocus 15 s before the first.
        let triggers = vec![
            TriggerEvent::dither(add_seconds(base(), 35.0)),
            TriggerEvent::autofocus(add_seconds(base(), -15.0)),
        ];
        let report = detect_bursts(&samples, &triggers, &config(1.5, 30.0, 10.0)).unwrap();
        assert_eq!(report.bursts.len(), 1);
        let tags = &report.bursts[0].tags;
        assert!(tags.contains(&BurstTag::NearDither));
        assert!(!tags.contains(&BurstTag::NearAutofocus));
        assert_eq!(report.stats.percent_bursts_near_dither, 100.0);
        assert_eq!(report.stats.percent_bursts_near_autofocus, 0.0);
    }

    #[test]
    fn test_multiple_tags() {
        let samples = series(&[2.0], 1.0);
        let triggers = vec![
            TriggerEvent::dither(add_seconds(base(), 3.0)),
            TriggerEvent::autofocus(add_seconds(base(), -3.0)),
        ];
        let report = detect_bursts(&samples, &triggers, &config(1.5, 5.0, 5.0)).unwrap();
        assert_eq!(report.bursts[0].tags.len(), 2);
        assert_eq!(
            triggers.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![TriggerKind::Dither, TriggerKind::Autofocus]
        );
    }

    #[test]
    fn test_hourly_buckets_and_worst_hour_tie() {
        let t0 = base();
        let samples = vec![
            GuidingSample::new(add_seconds(t0, 100.0), 2.0),
            GuidingSample::new(add_seconds(t0, 200.0), 2.0),
            GuidingSample::new(add_seconds(t0, 3700.0), 2.0),
            GuidingSample::new(add_seconds(t0, 3800.0), 2.0),
            GuidingSample::new(add_seconds(t0, 3900.0), 0.5),
        ];
        let report = detect_bursts(&samples, &[], &BurstConfig::default()).unwrap();
        let hours = &report.stats.events_per_hour;
        assert_eq!(hours.len(), 2);
        assert_eq!(hours[0].hour, t0);
        assert_eq!(hours[0].events, 2);
        assert_eq!(hours[1].events, 2);
        assert_eq!(report.stats.worst_hour_by_events.unwrap().hour, t0);
    }

    #[test]
    fn test_no_bursts() {
        let samples = series(&[0.3, 0.4, 0.5], 1.0);
        let report = detect_bursts(&samples, &[], &BurstConfig::default()).unwrap();
        assert!(report.bursts.is_empty());
        assert_eq!(report.stats, BurstStatistics::default());
    }

    #[test]
    fn test_contract_violations() {
        let samples = series(&[1.0], 1.0);
        assert!(detect_bursts(&samples, &[], &config(-0.1, 1.0, 1.0)).is_err());
        assert!(detect_bursts(&samples, &[], &config(1.0, -1.0, 1.0)).is_err());
        assert!(detect_bursts(&samples, &[], &config(1.0, 1.0, -1.0)).is_err());
        let negative = series(&[-0.5], 1.0);
        let err = detect_bursts(&negative, &[], &BurstConfig::default()).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_unsorted_input_is_ordered() {
        let mut samples = series(&[1.6, 1.7, 1.8], 1.0);
        samples.reverse();
        let report = detect_bursts(&samples, &[], &config(1.5, 2.0, 1.0)).unwrap();
        assert_eq!(report.bursts.len(), 1);
        assert_eq!(report.bursts[0].start, base());
    }

    proptest! {
        #[test]
        fn prop_burst_invariants(
            values in prop::collection::vec(0.0f64..4.0, 1..60),
            gaps in prop::collection::vec(0.5f64..10.0, 60),
            merge_gap in 0.0f64..8.0,
        ) {
            let mut t = base();
            let samples: Vec<GuidingSample> = values
                .iter()
                .zip(gaps.iter())
                .map(|(rms, gap)| {
                    t = add_seconds(t, *gap);
                    GuidingSample::new(t, *rms)
                })
                .collect();
            let cfg = config(1.5, merge_gap, 30.0);
            let report = detect_bursts(&samples, &[], &cfg).unwrap();

            for burst in &report.bursts {
                prop_assert!(burst.event_count >= 1);
                let in_span: Vec<&GuidingSample> = samples
                    .iter()
                    .filter(|s| s.timestamp >= burst.start && s.timestamp <= burst.end && s.rms >= 1.5)
                    .collect();
                prop_assert_eq!(in_span.len(), burst.event_count);
                let max = in_span.iter().map(|s| s.rms).fold(f64::MIN, f64::max);
                prop_assert_eq!(max, burst.peak_rms);
                for pair in in_span.windows(2) {
                    prop_assert!(seconds_between(pair[0].timestamp, pair[1].timestamp) <= merge_gap);
                }
            }
            for pair in report.bursts.windows(2) {
                prop_assert!(seconds_between(pair[0].end, pair[1].start) > merge_gap);
            }
        }
    }
}
