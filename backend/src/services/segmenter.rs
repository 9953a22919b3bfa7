//! Session segmentation.
//!
//! Turns the typed events of an acquisition log into an ordered, gap-free
//! sequence of labeled [`Segment`]s covering the whole log time range.
//!
//! Pipeline:
//!
//! 1. Pair start/finish events into activity spans (`focus`,
//!    `slew_solve_center`, `idle` waits, `capture` + `download`,
//!    `meridian_flip`).
//! 2. Merge same-label spans separated by at most the join window.
//! 3. Clip overlaps in favour of the span that started first.
//! 4. Fill uncovered ranges with `idle` segments (`reason = untracked`).
//! 5. Coalesce adjacent segments that share a label and metadata.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ensure_non_negative, PlannerResult};
use crate::models::time::{checked_add_seconds, seconds_between};
use crate::models::{Activity, Phase, Segment, SessionEvent};

pub const LABEL_FOCUS: &str = "focus";
pub const LABEL_CENTER: &str = "slew_solve_center";
pub const LABEL_IDLE: &str = "idle";
pub const LABEL_CAPTURE: &str = "capture";
pub const LABEL_DOWNLOAD: &str = "download";
pub const LABEL_MERIDIAN_FLIP: &str = "meridian_flip";

/// Labels counted as productive time; every other label is idle time.
pub const PRODUCTIVE_LABELS: [&str; 4] = [LABEL_CAPTURE, LABEL_DOWNLOAD, LABEL_CENTER, LABEL_FOCUS];

/// `reason` given to gap-filling idle segments.
pub const UNTRACKED_REASON: &str = "untracked";

/// Tuning knobs for segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmenterConfig {
    /// Same-label spans at most this far apart are merged.
    pub join_window_secs: f64,
    /// Longest gap after an exposure still counted as download time.
    pub download_gap_cap_secs: f64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            join_window_secs: 2.0,
            download_gap_cap_secs: 20.0,
        }
    }
}

/// Result of segmenting one log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSegmentation {
    pub segments: Vec<Segment>,
    pub totals_seconds: BTreeMap<String, f64>,
    pub productive_seconds: f64,
    pub idle_seconds: f64,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl SessionSegmentation {
    /// Seconds covered by the log, `end - start`.
    pub fn span_seconds(&self) -> f64 {
        match (self.start, self.end) {
            (Some(start), Some(end)) => seconds_between(start, end),
            _ => 0.0,
        }
    }
}

#[derive(Default)]
struct OpenActivities {
    focus: Option<NaiveDateTime>,
    center: Option<NaiveDateTime>,
    wait: Option<(NaiveDateTime, String)>,
    flip: Option<NaiveDateTime>,
}

fn push_span(spans: &mut Vec<Segment>, span: Segment) {
    if span.end > span.start {
        spans.push(span);
    }
}

/// Pair start/finish events into raw (possibly overlapping) spans.
fn collect_spans(events: &[&SessionEvent], config: &SegmenterConfig) -> Vec<Segment> {
    let mut spans = Vec::new();
    let mut open = OpenActivities::default();

    for (i, event) in events.iter().enumerate() {
        let ts = event.timestamp();
        match event {
            SessionEvent::Autofocus {
                phase: Phase::Start,
                ..
            } => open.focus = Some(ts),
            SessionEvent::Autofocus {
                phase: Phase::Finish,
                ..
            } => {
                if let Some(start) = open.focus.take() {
                    push_span(&mut spans, Segment::new(start, ts, LABEL_FOCUS));
                }
            }
            SessionEvent::Activity {
                activity, phase, ..
            } => match (activity, phase) {
                (Activity::Center, Phase::Start) => open.center = Some(ts),
                (Activity::Center, Phase::Finish) => {
                    if let Some(start) = open.center.take() {
                        push_span(&mut spans, Segment::new(start, ts, LABEL_CENTER));
                    }
                }
                (Activity::Wait(reason), Phase::Start) => open.wait = Some((ts, reason.clone())),
                (Activity::Wait(_), Phase::Finish) => {
                    if let Some((start, reason)) = open.wait.take() {
                        push_span(
                            &mut spans,
                            Segment::new(start, ts, LABEL_IDLE).with_meta("reason", reason),
                        );
                    }
                }
                (Activity::Exposure(exposure), _) => {
                    let Some(exposure_end) = checked_add_seconds(ts, *exposure) else {
                        log::debug!("Ignoring exposure of {}s at {}", exposure, ts);
                        continue;
                    };
                    push_span(
                        &mut spans,
                        Segment::new(ts, exposure_end, LABEL_CAPTURE)
                            .with_meta("exp_s", exposure.to_string()),
                    );
                    let next = events
                        .get(i + 1)
                        .map(|e| e.timestamp())
                        .unwrap_or(exposure_end);
                    let gap = seconds_between(exposure_end, next);
                    if gap > 0.0 && gap <= config.download_gap_cap_secs {
                        let rounded = (gap * 1000.0).round() / 1000.0;
                        push_span(
                            &mut spans,
                            Segment::new(exposure_end, next, LABEL_DOWNLOAD)
                                .with_meta("gap_s", rounded.to_string()),
                        );
                    }
                }
                // A physical flip supersedes an earlier announcement.
                (Activity::MeridianFlip { physical: true }, Phase::Start) => {
                    if open.flip.map_or(true, |start| ts > start) {
                        open.flip = Some(ts);
                    }
                }
                (Activity::MeridianFlip { physical: false }, Phase::Start) => {
                    if open.flip.is_none() {
                        open.flip = Some(ts);
                    }
                }
                (Activity::MeridianFlip { .. }, Phase::Finish) => {
                    if let Some(start) = open.flip.take() {
                        push_span(&mut spans, Segment::new(start, ts, LABEL_MERIDIAN_FLIP));
                    }
                }
            },
            SessionEvent::Dither { .. }
            | SessionEvent::GuideSample(_)
            | SessionEvent::Unrecognized { .. } => {}
        }
    }

    // Activities still open at the end of the log close at its last line.
    if let Some(last) = events.last().map(|e| e.timestamp()) {
        if let Some(start) = open.focus {
            push_span(&mut spans, Segment::new(start, last, LABEL_FOCUS));
        }
        if let Some(start) = open.center {
            push_span(&mut spans, Segment::new(start, last, LABEL_CENTER));
        }
        if let Some((start, reason)) = open.wait {
            push_span(
                &mut spans,
                Segment::new(start, last, LABEL_IDLE).with_meta("reason", reason),
            );
        }
        if let Some(start) = open.flip {
            push_span(&mut spans, Segment::new(start, last, LABEL_MERIDIAN_FLIP));
        }
    }

    spans
}

/// Sort spans and merge each into its predecessor when both share a label and
/// the gap between them is within `join_window_secs`.
fn merge_nearby(mut spans: Vec<Segment>, join_window_secs: f64) -> Vec<Segment> {
    spans.sort_by(|a, b| (a.start, a.end).cmp(&(b.start, b.end)));
    let mut merged: Vec<Segment> = Vec::with_capacity(spans.len());
    for span in spans {
        if let Some(last) = merged.last_mut() {
            if last.label == span.label && seconds_between(last.end, span.start) <= join_window_secs {
                if span.end > last.end {
                    last.set_end(span.end);
                }
                continue;
            }
        }
        merged.push(span);
    }
    merged
}

/// Remove overlaps; the earlier span keeps the contested range.
fn clip_overlaps(spans: Vec<Segment>) -> Vec<Segment> {
    let mut clipped: Vec<Segment> = Vec::with_capacity(spans.len());
    for mut span in spans {
        if let Some(last) = clipped.last() {
            if span.end <= last.end {
                continue;
            }
            if span.start < last.end {
                span.set_start(last.end);
            }
        }
        clipped.push(span);
    }
    clipped
}

/// Insert untracked idle segments so the sequence covers `[start, end]`.
fn fill_gaps(spans: Vec<Segment>, start: NaiveDateTime, end: NaiveDateTime) -> Vec<Segment> {
    let untracked = |from, to| Segment::new(from, to, LABEL_IDLE).with_meta("reason", UNTRACKED_REASON);
    let mut filled = Vec::with_capacity(spans.len() * 2 + 1);
    let mut cursor = start;
    for span in spans {
        if span.start > cursor {
            filled.push(untracked(cursor, span.start));
        }
        cursor = span.end;
        filled.push(span);
    }
    if end > cursor {
        filled.push(untracked(cursor, end));
    }
    filled
}

/// Join touching segments with the same label and metadata. An idle wait
/// keeps its reason next to an untracked gap.
fn coalesce(segments: Vec<Segment>) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::with_capacity(segments.len());
    for seg in segments {
        if let Some(last) = out.last_mut() {
            if last.label == seg.label && last.meta == seg.meta && last.end == seg.start {
                last.set_end(seg.end);
                continue;
            }
        }
        out.push(seg);
    }
    out
}

/// Segment a sequence of typed log events.
///
/// Events are ordered by timestamp first (stable, so same-instant lines keep
/// log order). The covered range runs from the first event to the later of the
/// last event and the last span end, so an exposure still running when the log
/// stops is kept whole.
pub fn segment_events(
    events: &[SessionEvent],
    config: &SegmenterConfig,
) -> PlannerResult<SessionSegmentation> {
    ensure_non_negative("segment_events", "join_window_secs", config.join_window_secs)?;
    ensure_non_negative(
        "segment_events",
        "download_gap_cap_secs",
        config.download_gap_cap_secs,
    )?;

    let mut ordered: Vec<&SessionEvent> = events.iter().collect();
    ordered.sort_by_key(|e| e.timestamp());

    let (Some(first), Some(last)) = (ordered.first(), ordered.last()) else {
        return Ok(SessionSegmentation::default());
    };
    let range_start = first.timestamp();
    let mut range_end = last.timestamp();

    let spans = collect_spans(&ordered, config);
    let spans = merge_nearby(spans, config.join_window_secs);
    let spans = clip_overlaps(spans);
    if let Some(span_end) = spans.iter().map(|s| s.end).max() {
        range_end = range_end.max(span_end);
    }
    let segments = coalesce(fill_gaps(spans, range_start, range_end));

    let mut totals_seconds: BTreeMap<String, f64> = BTreeMap::new();
    for seg in &segments {
        *totals_seconds.entry(seg.label.clone()).or_insert(0.0) += seg.duration_seconds;
    }
    let productive_seconds = totals_seconds
        .iter()
        .filter(|(label, _)| PRODUCTIVE_LABELS.contains(&label.as_str()))
        .map(|(_, secs)| secs)
        .sum();
    let idle_seconds = totals_seconds
        .iter()
        .filter(|(label, _)| !PRODUCTIVE_LABELS.contains(&label.as_str()))
        .map(|(_, secs)| secs)
        .sum();

    log::debug!(
        "Segmented {} events into {} segments",
        events.len(),
        segments.len()
    );

    Ok(SessionSegmentation {
        segments,
        totals_seconds,
        productive_seconds,
        idle_seconds,
        start: Some(range_start),
        end: Some(range_end),
    })
}

#[cfg(test)]
#[path = "segmenter_tests.rs"]
mod tests;
