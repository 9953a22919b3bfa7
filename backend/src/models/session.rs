//! Session log domain types: segments, typed log events, guiding samples and
//! bursts.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::time::seconds_between;

/// A labeled, contiguous time interval of an imaging session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub label: String,
    pub duration_seconds: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
}

impl Segment {
    /// Create a segment; `end` earlier than `start` collapses to `start`.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, label: impl Into<String>) -> Self {
        let end = end.max(start);
        Self {
            start,
            end,
            label: label.into(),
            duration_seconds: seconds_between(start, end),
            meta: BTreeMap::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Move the end bound and recompute the duration.
    pub fn set_end(&mut self, end: NaiveDateTime) {
        self.end = end.max(self.start);
        self.duration_seconds = seconds_between(self.start, self.end);
    }

    /// Move the start bound and recompute the duration.
    pub fn set_start(&mut self, start: NaiveDateTime) {
        self.start = start.min(self.end);
        self.duration_seconds = seconds_between(self.start, self.end);
    }
}

/// One guiding-error measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuidingSample {
    pub timestamp: NaiveDateTime,
    pub rms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ra_rms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dec_rms: Option<f64>,
}

impl GuidingSample {
    pub fn new(timestamp: NaiveDateTime, rms: f64) -> Self {
        Self {
            timestamp,
            rms,
            ra_rms: None,
            dec_rms: None,
        }
    }

    /// Build a sample from its axis components; the total is their quadrature sum.
    pub fn from_components(timestamp: NaiveDateTime, ra: f64, dec: f64) -> Self {
        Self {
            timestamp,
            rms: ra.hypot(dec),
            ra_rms: Some(ra),
            dec_rms: Some(dec),
        }
    }
}

/// Kind of a discrete event bursts are correlated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Dither,
    Autofocus,
}

impl TriggerKind {
    /// Tag given to bursts close to an event of this kind.
    pub fn tag(&self) -> BurstTag {
        match self {
            TriggerKind::Dither => BurstTag::NearDither,
            TriggerKind::Autofocus => BurstTag::NearAutofocus,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerEvent {
    pub timestamp: NaiveDateTime,
    pub kind: TriggerKind,
}

impl TriggerEvent {
    pub fn dither(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            kind: TriggerKind::Dither,
        }
    }

    pub fn autofocus(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            kind: TriggerKind::Autofocus,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BurstTag {
    NearDither,
    NearAutofocus,
}

/// A run of guiding samples above the RMS threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Burst {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub duration_sec: f64,
    pub event_count: usize,
    pub peak_rms: f64,
    pub avg_rms: f64,
    pub tags: BTreeSet<BurstTag>,
}

impl Burst {
    pub fn has_tag(&self, tag: BurstTag) -> bool {
        self.tags.contains(&tag)
    }
}

/// Whether an activity line opens or closes its activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Start,
    Finish,
}

/// Named session activities recognized in acquisition logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    /// Slew, plate solve and center.
    Center,
    /// A wait instruction; carries the reason (`wait_time`, `wait_altitude`, ...).
    Wait(String),
    /// An exposure start; carries the exposure length in seconds.
    Exposure(f64),
    /// Meridian flip; `physical` marks the telescope actually flipping.
    MeridianFlip { physical: bool },
}

/// A recognized log line, parsed once into a typed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Dither {
        timestamp: NaiveDateTime,
    },
    Autofocus {
        timestamp: NaiveDateTime,
        phase: Phase,
    },
    GuideSample(GuidingSample),
    Activity {
        timestamp: NaiveDateTime,
        activity: Activity,
        phase: Phase,
    },
    Unrecognized {
        timestamp: NaiveDateTime,
        message: String,
    },
}

impl SessionEvent {
    pub fn timestamp(&self) -> NaiveDateTime {
        match self {
            SessionEvent::Dither { timestamp }
            | SessionEvent::Autofocus { timestamp, .. }
            | SessionEvent::Activity { timestamp, .. }
            | SessionEvent::Unrecognized { timestamp, .. } => *timestamp,
            SessionEvent::GuideSample(sample) => sample.timestamp,
        }
    }

    /// The trigger this event represents for burst correlation, if any.
    ///
    /// An autofocus run triggers at its start.
    pub fn as_trigger(&self) -> Option<TriggerEvent> {
        match self {
            SessionEvent::Dither { timestamp } => Some(TriggerEvent::dither(*timestamp)),
            SessionEvent::Autofocus {
                timestamp,
                phase: Phase::Start,
            } => Some(TriggerEvent::autofocus(*timestamp)),
            _ => None,
        }
    }
}

/// Collect the trigger events of a typed event sequence.
pub fn trigger_events(events: &[SessionEvent]) -> Vec<TriggerEvent> {
    events.iter().filter_map(SessionEvent::as_trigger).collect()
}

/// Collect the guiding samples of a typed event sequence.
pub fn guiding_samples(events: &[SessionEvent]) -> Vec<GuidingSample> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::GuideSample(s) => Some(*s),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::time::{add_seconds, parse_log_timestamp};

    fn ts(s: &str) -> NaiveDateTime {
        parse_log_timestamp(s).unwrap()
    }

    #[test]
    fn test_segment_duration_follows_bounds() {
        let start = ts("2024-03-01T22:00:00");
        let mut seg = Segment::new(start, add_seconds(start, 90.0), "capture");
        assert_eq!(seg.duration_seconds, 90.0);

        seg.set_end(add_seconds(start, 30.0));
        assert_eq!(seg.duration_seconds, 30.0);

        let inverted = Segment::new(start, add_seconds(start, -5.0), "idle");
        assert_eq!(inverted.end, inverted.start);
        assert_eq!(inverted.duration_seconds, 0.0);
    }

    #[test]
    fn test_sample_from_components() {
        let s = GuidingSample::from_components(ts("2024-03-01T22:00:00"), 3.0, 4.0);
        assert!((s.rms - 5.0).abs() < 1e-12);
        assert_eq!(s.ra_rms, Some(3.0));
    }

    #[test]
    fn test_triggers_from_events() {
        let t0 = ts("2024-03-01T22:00:00");
        let events = vec![
            SessionEvent::Dither { timestamp: t0 },
            SessionEvent::Autofocus {
                timestamp: t0,
                phase: Phase::Start,
            },
            SessionEvent::Autofocus {
                timestamp: add_seconds(t0, 60.0),
                phase: Phase::Finish,
            },
            SessionEvent::GuideSample(GuidingSample::new(t0, 0.8)),
            SessionEvent::Unrecognized {
                timestamp: t0,
                message: "noise".into(),
            },
        ];
        let triggers = trigger_events(&events);
        assert_eq!(triggers.len(), 2);
        assert_eq!(triggers[0].kind, TriggerKind::Dither);
        assert_eq!(triggers[1].kind, TriggerKind::Autofocus);
        assert_eq!(guiding_samples(&events).len(), 1);
    }

    #[test]
    fn test_tag_serialization() {
        assert_eq!(
            serde_json::to_string(&BurstTag::NearAutofocus).unwrap(),
            "\"near_autofocus\""
        );
        assert_eq!(TriggerKind::Dither.tag(), BurstTag::NearDither);
    }
}
