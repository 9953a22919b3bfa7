//! Whole-session analysis: NINA log segmentation plus, when a PHD2 guide log
//! is supplied, guiding bursts correlated with dithers and autofocus runs.

use serde::{Deserialize, Serialize};

use crate::error::PlannerResult;
use crate::models::{trigger_events, SessionEvent, TriggerEvent};
use crate::parsing::guide_log::{parse_guide_log, GuidingSummary};
use crate::parsing::nina_log::{parse_nina_log, LineCounters};
use crate::services::bursts::{detect_bursts, BurstConfig, BurstReport};
use crate::services::segmenter::{segment_events, SegmenterConfig, SessionSegmentation};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOptions {
    #[serde(default)]
    pub segmenter: SegmenterConfig,
    #[serde(default)]
    pub bursts: BurstConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuidingAnalysis {
    pub summary: Option<GuidingSummary>,
    pub bursts: BurstReport,
    pub rows_skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAnalysis {
    #[serde(flatten)]
    pub segmentation: SessionSegmentation,
    pub counters: LineCounters,
    /// Dithers and autofocus starts from both logs, ordered by time.
    pub triggers: Vec<TriggerEvent>,
    /// Absent when no guide log was supplied.
    pub guiding: Option<GuidingAnalysis>,
}

/// Analyze one imaging session.
///
/// Segmentation uses the NINA log alone. Guiding bursts are tagged against the
/// triggers of both logs, since the guide log records dithers NINA may not.
pub fn analyze_session(
    nina_text: &str,
    guide_text: Option<&str>,
    options: &SessionOptions,
) -> PlannerResult<SessionAnalysis> {
    let nina = parse_nina_log(nina_text);
    let segmentation = segment_events(&nina.events, &options.segmenter)?;

    let mut events: Vec<SessionEvent> = nina.events;
    let guide = guide_text.map(parse_guide_log);
    if let Some(guide) = &guide {
        events.extend(guide.events());
    }
    let mut triggers = trigger_events(&events);
    triggers.sort_by_key(|t| t.timestamp);

    let guiding = match guide {
        Some(guide) => Some(GuidingAnalysis {
            summary: guide.summary(),
            bursts: detect_bursts(&guide.samples, &triggers, &options.bursts)?,
            rows_skipped: guide.rows_skipped,
        }),
        None => None,
    };

    if segmentation.segments.is_empty() {
        log::warn!("Session log produced no segments");
    }

    Ok(SessionAnalysis {
        segmentation,
        counters: nina.counters,
        triggers,
        guiding,
    })
}
