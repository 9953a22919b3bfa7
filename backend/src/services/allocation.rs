//! Ratio-based exposure allocation.
//!
//! Given captured seconds per filter and relative goal weights, work out how
//! much exposure each filter of the active band should have, how much is still
//! missing and how much was captured beyond the goal.
//!
//! Two views are offered:
//!
//! - [`allocate`] ("plan to total"): distribute a desired total across the
//!   displayed filters in proportion to their weights.
//! - [`balance_plan`] ("balance"): keep the strongest ratio-consistent scale
//!   the captured data already supports, without discarding anything.

use qtty::Hours;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::aggregation::{aggregate_frames, FilterTotals};
use super::filters::normalize_keys;
use super::goals::{resolve_weights, GoalWeights};
use crate::error::{ErrorContext, PlannerError, PlannerResult};
use crate::models::{CanonicalFilter, FilterBand, Frame};

/// Residuals below this many seconds are treated as zero.
const SECONDS_EPSILON: f64 = 1e-6;

pub const DEFAULT_SUBFRAME_MINUTES: f64 = 5.0;

fn default_subframe_minutes() -> f64 {
    DEFAULT_SUBFRAME_MINUTES
}

/// Per-call allocation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationParams {
    /// Desired total for the target. Absent, zero or negative means "use what
    /// was captured over the displayed filters".
    #[serde(default)]
    pub desired_hours: Option<f64>,
    #[serde(default)]
    pub band: FilterBand,
    #[serde(default = "default_subframe_minutes")]
    pub subframe_minutes: f64,
}

impl Default for AllocationParams {
    fn default() -> Self {
        Self {
            desired_hours: None,
            band: FilterBand::default(),
            subframe_minutes: DEFAULT_SUBFRAME_MINUTES,
        }
    }
}

impl AllocationParams {
    pub fn new(desired_hours: Option<f64>, band: FilterBand) -> Self {
        Self {
            desired_hours,
            band,
            ..Default::default()
        }
    }

    pub fn with_subframe_minutes(mut self, minutes: f64) -> Self {
        self.subframe_minutes = minutes;
        self
    }

    fn validate(&self, operation: &str) -> PlannerResult<()> {
        if self.subframe_minutes.is_finite() && self.subframe_minutes > 0.0 {
            Ok(())
        } else {
            Err(PlannerError::invalid_input(
                "subframe length must be a positive number of minutes",
                ErrorContext::new(operation)
                    .with_field("subframe_minutes")
                    .with_value(self.subframe_minutes),
            ))
        }
    }
}

/// One line of the allocation table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationRow {
    pub target: String,
    pub filter: String,
    pub captured_hours: Hours,
    pub target_hours: Hours,
    pub needed_hours: Hours,
    pub overshoot_hours: Hours,
    pub subframes_needed: u64,
    pub goal_weight: f64,
    /// Weight divided by the summed weight of the displayed filters.
    pub weight_share: f64,
}

impl AllocationRow {
    fn is_empty(&self) -> bool {
        self.captured_hours.value() == 0.0
            && self.needed_hours.value() == 0.0
            && self.overshoot_hours.value() == 0.0
    }
}

fn clamp_residual(seconds: f64) -> f64 {
    if seconds < SECONDS_EPSILON {
        0.0
    } else {
        seconds
    }
}

fn build_row(
    target: &str,
    filter: CanonicalFilter,
    captured_s: f64,
    target_s: f64,
    weight: f64,
    weight_share: f64,
    subframe_minutes: f64,
) -> AllocationRow {
    let needed_s = clamp_residual(target_s - captured_s);
    let overshoot_s = clamp_residual(captured_s - target_s);
    let subframes_needed = if needed_s > 0.0 {
        // Guard against 12.000000001 becoming 13 subframes.
        (needed_s / (subframe_minutes * 60.0) - 1e-9).ceil().max(0.0) as u64
    } else {
        0
    };

    AllocationRow {
        target: target.to_string(),
        filter: filter.as_str().to_string(),
        captured_hours: Hours::new(captured_s / 3600.0),
        target_hours: Hours::new(target_s / 3600.0),
        needed_hours: Hours::new(needed_s / 3600.0),
        overshoot_hours: Hours::new(overshoot_s / 3600.0),
        subframes_needed,
        goal_weight: weight,
        weight_share,
    }
}

/// Normalized captured seconds and weights restricted to a band.
struct DisplayedSet {
    filters: Vec<CanonicalFilter>,
    captured: BTreeMap<String, f64>,
    weights: BTreeMap<String, f64>,
}

impl DisplayedSet {
    fn new(captured: &FilterTotals, weights: &GoalWeights, band: FilterBand) -> Self {
        let captured = normalize_keys(captured);
        // Non-positive weights count as unset here.
        let weights: BTreeMap<String, f64> = normalize_keys(weights)
            .into_iter()
            .map(|(k, w)| (k, if w.is_finite() && w > 0.0 { w } else { 0.0 }))
            .collect();
        let filters = band
            .filters()
            .iter()
            .copied()
            .filter(|f| captured.contains_key(f.as_str()) || weights.contains_key(f.as_str()))
            .collect();
        Self {
            filters,
            captured,
            weights,
        }
    }

    fn captured(&self, filter: CanonicalFilter) -> f64 {
        self.captured.get(filter.as_str()).copied().unwrap_or(0.0)
    }

    fn weight(&self, filter: CanonicalFilter) -> f64 {
        self.weights.get(filter.as_str()).copied().unwrap_or(0.0)
    }

    fn sum_weights(&self) -> f64 {
        self.filters.iter().map(|f| self.weight(*f)).sum()
    }

    fn sum_captured(&self) -> f64 {
        self.filters.iter().map(|f| self.captured(*f)).sum()
    }
}

/// Compute the "plan to total" allocation for one target.
///
/// Keys of `captured` and `weights` are normalized (colliding keys are
/// summed). Only canonical filters of `params.band` present in either map are
/// displayed. With a zero weight sum over the displayed set the total is split
/// equally. Rows with nothing captured, needed or overshot are dropped.
pub fn allocate(
    target: &str,
    captured: &FilterTotals,
    weights: &GoalWeights,
    params: &AllocationParams,
) -> PlannerResult<Vec<AllocationRow>> {
    params.validate("allocate")?;
    let set = DisplayedSet::new(captured, weights, params.band);
    if set.filters.is_empty() {
        return Ok(Vec::new());
    }

    let total_s = match params.desired_hours {
        Some(h) if h.is_finite() && h > 0.0 => h * 3600.0,
        _ => set.sum_captured(),
    };
    let sum_w = set.sum_weights();
    let n = set.filters.len() as f64;

    let rows = set
        .filters
        .iter()
        .map(|&filter| {
            let w = set.weight(filter);
            let share = if sum_w > 0.0 { w / sum_w } else { 1.0 / n };
            build_row(
                target,
                filter,
                set.captured(filter),
                share * total_s,
                w,
                share,
                params.subframe_minutes,
            )
        })
        .filter(|row| !row.is_empty())
        .collect();
    Ok(rows)
}

/// Compute the "balance" view for one target.
///
/// The scale `k` is the largest value such that `k * weight <= captured` for
/// every positively weighted displayed filter; each filter then wants
/// `k * weight`. Captured time beyond that shows up as overshoot, so a single
/// missing filter pins every target to zero.
pub fn balance_plan(
    target: &str,
    captured: &FilterTotals,
    weights: &GoalWeights,
    params: &AllocationParams,
) -> PlannerResult<Vec<AllocationRow>> {
    params.validate("balance_plan")?;
    let set = DisplayedSet::new(captured, weights, params.band);
    let sum_w = set.sum_weights();

    let scale = set
        .filters
        .iter()
        .filter(|f| set.weight(**f) > 0.0)
        .map(|f| set.captured(*f) / set.weight(*f))
        .fold(None, |acc: Option<f64>, k| Some(acc.map_or(k, |a| a.min(k))))
        .unwrap_or(0.0);

    let rows = set
        .filters
        .iter()
        .map(|&filter| {
            let w = set.weight(filter);
            let share = if sum_w > 0.0 { w / sum_w } else { 0.0 };
            build_row(
                target,
                filter,
                set.captured(filter),
                scale * w,
                w,
                share,
                params.subframe_minutes,
            )
        })
        .filter(|row| !row.is_empty())
        .collect();
    Ok(rows)
}

/// Run [`allocate`] for every target of a frame snapshot.
///
/// `target_hours` overrides `params.desired_hours` per target. Weights are
/// resolved once against the whole snapshot; rows come out ordered by target,
/// then by band display order.
pub fn plan_targets(
    frames: &[Frame],
    weights: Option<&GoalWeights>,
    params: &AllocationParams,
    target_hours: &BTreeMap<String, f64>,
    exclude_rejected: bool,
) -> PlannerResult<Vec<AllocationRow>> {
    let totals = aggregate_frames(frames, exclude_rejected)?;
    let has_frames = !totals.is_empty();
    let resolved = resolve_weights(weights, has_frames)?;

    let mut rows = Vec::new();
    for (target, filters) in &totals {
        let target_params = AllocationParams {
            desired_hours: target_hours.get(target).copied().or(params.desired_hours),
            ..*params
        };
        rows.extend(allocate(target, filters, &resolved, &target_params)?);
    }
    log::info!(
        "Planned {} rows for {} targets ({} frames)",
        rows.len(),
        totals.len(),
        frames.len()
    );
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn map(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    fn row<'a>(rows: &'a [AllocationRow], filter: &str) -> &'a AllocationRow {
        rows.iter().find(|r| r.filter == filter).unwrap()
    }

    #[test]
    fn test_single_filter_on_target() {
        let rows = allocate(
            "M101",
            &map(&[("Ha", 7200.0)]),
            &map(&[("Ha", 1.0)]),
            &AllocationParams::new(Some(2.0), FilterBand::Narrowband),
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        let ha = &rows[0];
        assert_close(ha.captured_hours.value(), 2.0);
        assert_close(ha.target_hours.value(), 2.0);
        assert_close(ha.needed_hours.value(), 0.0);
        assert_close(ha.overshoot_hours.value(), 0.0);
        assert_eq!(ha.subframes_needed, 0);
    }

    #[test]
    fn test_missing_filter_is_needed() {
        let rows = allocate(
            "M101",
            &map(&[("Ha", 3600.0)]),
            &map(&[("Ha", 1.0), ("OIII", 1.0)]),
            &AllocationParams::new(Some(2.0), FilterBand::Narrowband),
        )
        .unwrap();
        assert_eq!(rows.len(), 2);
        let ha = row(&rows, "Ha");
        assert_close(ha.target_hours.value(), 1.0);
        assert_close(ha.needed_hours.value(), 0.0);
        assert_close(ha.overshoot_hours.value(), 0.0);
        let oiii = row(&rows, "OIII");
        assert_close(oiii.target_hours.value(), 1.0);
        assert_close(oiii.needed_hours.value(), 1.0);
        assert_eq!(oiii.subframes_needed, 12);
        assert_eq!(oiii.weight_share, 0.5);
    }

    #[test]
    fn test_band_restricts_display() {
        let rows = allocate(
            "M31",
            &map(&[("Ha", 3600.0), ("L", 3600.0), ("R", 1800.0)]),
            &map(&[("L", 2.0), ("R", 1.0), ("G", 1.0), ("B", 1.0)]),
            &AllocationParams::new(Some(5.0), FilterBand::Broadband),
        )
        .unwrap();
        assert!(rows.iter().all(|r| r.filter != "Ha"));
        assert_eq!(rows.len(), 4);
        assert_close(row(&rows, "L").target_hours.value(), 2.0);
        assert_close(row(&rows, "G").needed_hours.value(), 1.0);
    }

    #[test]
    fn test_zero_weights_split_equally() {
        let rows = allocate(
            "M42",
            &map(&[("Ha", 3600.0), ("OIII", 3600.0)]),
            &map(&[("Ha", 0.0), ("OIII", 0.0)]),
            &AllocationParams::new(Some(4.0), FilterBand::Narrowband),
        )
        .unwrap();
        assert_eq!(rows.len(), 2);
        for r in &rows {
            assert_close(r.target_hours.value(), 2.0);
            assert_close(r.needed_hours.value(), 1.0);
        }
    }

    #[test]
    fn test_absent_or_negative_hours_use_captured_sum() {
        let captured = map(&[("Ha", 5400.0), ("OIII", 1800.0)]);
        let weights = map(&[("Ha", 1.0), ("OIII", 1.0)]);
        for desired in [None, Some(0.0), Some(-3.0)] {
            let rows = allocate(
                "M1",
                &captured,
                &weights,
                &AllocationParams::new(desired, FilterBand::Narrowband),
            )
            .unwrap();
            assert_close(row(&rows, "Ha").target_hours.value(), 1.0);
            assert_close(row(&rows, "Ha").overshoot_hours.value(), 0.5);
            assert_close(row(&rows, "OIII").needed_hours.value(), 0.5);
        }
    }

    #[test]
    fn test_empty_displayed_set() {
        let rows = allocate(
            "M1",
            &map(&[("Ha", 600.0)]),
            &map(&[("Ha", 1.0)]),
            &AllocationParams::new(Some(2.0), FilterBand::Broadband),
        )
        .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_suppresses_all_zero_rows() {
        let rows = allocate(
            "M1",
            &map(&[("Ha", 3600.0)]),
            &map(&[("Ha", 1.0), ("SII", 0.0)]),
            &AllocationParams::new(None, FilterBand::Narrowband),
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].filter, "Ha");
    }

    #[test]
    fn test_raw_keys_are_normalized_and_summed() {
        let rows = allocate(
            "M1",
            &map(&[("H-alpha", 1800.0), ("Ha 7nm", 1800.0)]),
            &map(&[("ha", 1.0)]),
            &AllocationParams::new(Some(1.0), FilterBand::Narrowband),
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_close(rows[0].captured_hours.value(), 1.0);
    }

    #[test]
    fn test_non_positive_subframe_is_error() {
        for minutes in [0.0, -5.0, f64::NAN] {
            let params = AllocationParams::new(Some(1.0), FilterBand::Narrowband)
                .with_subframe_minutes(minutes);
            let err = allocate("M1", &map(&[]), &map(&[("Ha", 1.0)]), &params).unwrap_err();
            assert!(err.is_invalid_input());
        }
    }

    #[test]
    fn test_subframes_round_up() {
        let params = AllocationParams::new(Some(1.0), FilterBand::Narrowband)
            .with_subframe_minutes(7.0);
        let rows = allocate("M1", &map(&[]), &map(&[("Ha", 1.0)]), &params).unwrap();
        // 60 / 7 = 8.57
        assert_eq!(rows[0].subframes_needed, 9);
    }

    #[test]
    fn test_balance_plan_scales_to_weakest() {
        let rows = balance_plan(
            "M16",
            &map(&[("Ha", 7200.0), ("OIII", 1800.0), ("SII", 3600.0)]),
            &map(&[("Ha", 2.0), ("OIII", 1.0), ("SII", 1.0)]),
            &AllocationParams::new(None, FilterBand::Narrowband),
        )
        .unwrap();
        // k = min(3600, 1800, 3600) s per unit weight
        assert_close(row(&rows, "Ha").target_hours.value(), 1.0);
        assert_close(row(&rows, "Ha").overshoot_hours.value(), 1.0);
        assert_close(row(&rows, "OIII").target_hours.value(), 0.5);
        assert_close(row(&rows, "OIII").needed_hours.value(), 0.0);
        assert_close(row(&rows, "SII").overshoot_hours.value(), 0.5);
    }

    #[test]
    fn test_balance_plan_with_missing_filter() {
        let rows = balance_plan(
            "M16",
            &map(&[("Ha", 3600.0)]),
            &map(&[("Ha", 2.0), ("OIII", 1.0)]),
            &AllocationParams::new(None, FilterBand::Narrowband),
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_close(rows[0].target_hours.value(), 0.0);
        assert_close(rows[0].overshoot_hours.value(), 1.0);
    }

    #[test]
    fn test_plan_targets_per_target_hours() {
        use crate::models::time::parse_frame_timestamp;
        let ts = parse_frame_timestamp("2024-03-01").unwrap();
        let frames = vec![
            Frame::light("M101", "Ha", 3600.0, ts),
            Frame::light("M31", "Ha", 1800.0, ts),
        ];
        let weights = map(&[("Ha", 1.0)]);
        let overrides = map(&[("M31", 1.0)]);
        let rows = plan_targets(
            &frames,
            Some(&weights),
            &AllocationParams::new(Some(2.0), FilterBand::Narrowband),
            &overrides,
            false,
        )
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].target, "M101");
        assert_close(rows[0].needed_hours.value(), 1.0);
        assert_eq!(rows[1].target, "M31");
        assert_close(rows[1].needed_hours.value(), 0.5);
    }

    const FILTER_POOL: [&str; 9] = ["Ha", "H-alpha", "OIII", "SII", "L", "R", "G", "B", "Mystery"];

    fn pooled(entries: &[(usize, f64)]) -> BTreeMap<String, f64> {
        entries
            .iter()
            .map(|(i, v)| (FILTER_POOL[*i].to_string(), *v))
            .collect()
    }

    proptest! {
        #[test]
        fn prop_allocation_reconciles(
            captured in prop::collection::vec((0usize..9, 0.0f64..50_000.0), 0..8),
            weights in prop::collection::vec((0usize..9, -1.0f64..5.0), 0..8),
            desired in prop::option::of(-1.0f64..20.0),
            broadband in any::<bool>(),
        ) {
            let captured = pooled(&captured);
            let weights = pooled(&weights);
            let band = if broadband { FilterBand::Broadband } else { FilterBand::Narrowband };
            let rows = allocate("T", &captured, &weights, &AllocationParams::new(desired, band)).unwrap();

            let norm_captured = normalize_keys(&captured);
            let norm_weights = normalize_keys(&weights);
            let displayed: Vec<&str> = band
                .filters()
                .iter()
                .map(|f| f.as_str())
                .filter(|f| norm_captured.contains_key(*f) || norm_weights.contains_key(*f))
                .collect();
            if displayed.is_empty() {
                prop_assert!(rows.is_empty());
                return Ok(());
            }

            let total_s = match desired {
                Some(h) if h > 0.0 => h * 3600.0,
                _ => displayed.iter().map(|f| norm_captured.get(*f).copied().unwrap_or(0.0)).sum(),
            };
            let target_sum_s: f64 = rows.iter().map(|r| r.target_hours.value() * 3600.0).sum();
            prop_assert!(
                (target_sum_s - total_s).abs() <= 1e-6 * total_s.max(1.0) + 1e-5,
                "targets sum to {} but total is {}",
                target_sum_s,
                total_s
            );

            for row in &rows {
                prop_assert!(displayed.contains(&row.filter.as_str()));
                let lhs = row.captured_hours.value() - row.target_hours.value();
                let rhs = row.overshoot_hours.value() - row.needed_hours.value();
                prop_assert!((lhs - rhs).abs() * 3600.0 < 1e-5, "row {:?} does not reconcile", row);
                prop_assert_eq!(row.needed_hours.value().min(row.overshoot_hours.value()), 0.0);
            }
        }
    }
}
