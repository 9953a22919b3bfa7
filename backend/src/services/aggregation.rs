//! Frame aggregation: captured seconds per target and filter.

use std::collections::BTreeMap;

use crate::error::{ensure_non_negative, PlannerResult};
use crate::models::{Frame, FrameType};

/// Captured seconds keyed by raw filter label.
pub type FilterTotals = BTreeMap<String, f64>;

/// Captured seconds keyed by target, then raw filter label.
pub type TargetTotals = BTreeMap<String, FilterTotals>;

/// Sum LIGHT exposure seconds per target and raw filter.
///
/// Rejected frames are skipped when `exclude_rejected` is set. Any frame with
/// a negative or non-finite exposure fails the whole call.
pub fn aggregate_frames(frames: &[Frame], exclude_rejected: bool) -> PlannerResult<TargetTotals> {
    let mut totals = TargetTotals::new();
    for frame in frames {
        ensure_non_negative("aggregate_frames", "exposure_seconds", frame.exposure_seconds)?;
        if !frame.is_light() || (exclude_rejected && frame.rejected) {
            continue;
        }
        *totals
            .entry(frame.target.clone())
            .or_default()
            .entry(frame.filter.clone())
            .or_insert(0.0) += frame.exposure_seconds;
    }
    log::debug!(
        "Aggregated {} frames into {} targets",
        frames.len(),
        totals.len()
    );
    Ok(totals)
}

/// Count frames per frame type.
pub fn frame_type_counts(frames: &[Frame]) -> BTreeMap<FrameType, usize> {
    let mut counts = BTreeMap::new();
    for frame in frames {
        *counts.entry(frame.frame_type).or_insert(0) += 1;
    }
    counts
}

/// Sorted list of distinct targets that have at least one LIGHT frame.
pub fn light_targets(frames: &[Frame]) -> Vec<String> {
    let mut targets: Vec<String> = frames
        .iter()
        .filter(|f| f.is_light())
        .map(|f| f.target.clone())
        .collect();
    targets.sort();
    targets.dedup();
    targets
}
