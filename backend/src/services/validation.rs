//! Agreement between an external rejection tool and a quality score.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ensure_non_negative, PlannerResult};
use crate::services::filters::normalize_filter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationOutcome {
    CorrectReject,
    FalsePositive,
    CorrectAccept,
    FalseNegative,
}

impl ValidationOutcome {
    /// `passes` is `score >= threshold`.
    pub fn classify(rejected: bool, passes: bool) -> Self {
        match (rejected, passes) {
            (true, false) => ValidationOutcome::CorrectReject,
            (true, true) => ValidationOutcome::FalsePositive,
            (false, true) => ValidationOutcome::CorrectAccept,
            (false, false) => ValidationOutcome::FalseNegative,
        }
    }

    pub fn is_correct(&self) -> bool {
        matches!(
            self,
            ValidationOutcome::CorrectReject | ValidationOutcome::CorrectAccept
        )
    }
}

/// Quality threshold, either one value for every frame or one per filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QualityThreshold {
    Global(f64),
    #[serde(rename_all = "camelCase")]
    PerFilter {
        default: f64,
        by_filter: BTreeMap<String, f64>,
    },
}

impl QualityThreshold {
    /// Threshold for a frame taken through `filter`. Filter keys are matched
    /// after normalization.
    pub fn for_filter(&self, filter: Option<&str>) -> f64 {
        match self {
            QualityThreshold::Global(value) => *value,
            QualityThreshold::PerFilter { default, by_filter } => filter
                .map(normalize_filter)
                .and_then(|canonical| {
                    by_filter
                        .iter()
                        .find(|(key, _)| normalize_filter(key) == canonical)
                        .map(|(_, value)| *value)
                })
                .unwrap_or(*default),
        }
    }

    fn validate(&self) -> PlannerResult<()> {
        match self {
            QualityThreshold::Global(value) => {
                ensure_non_negative("score_frames", "threshold", *value)
            }
            QualityThreshold::PerFilter { default, by_filter } => {
                ensure_non_negative("score_frames", "threshold", *default)?;
                for (filter, value) in by_filter {
                    ensure_non_negative("score_frames", &format!("threshold[{}]", filter), *value)?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameQuality {
    pub rejected: bool,
    pub quality_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl FrameQuality {
    pub fn new(rejected: bool, quality_score: f64) -> Self {
        Self {
            rejected,
            quality_score,
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub outcomes: Vec<ValidationOutcome>,
    pub correct_reject: usize,
    pub false_positive: usize,
    pub correct_accept: usize,
    pub false_negative: usize,
    pub total: usize,
    /// In `[0, 1]`; 0 when there are no frames.
    pub accuracy: f64,
    pub mean_quality_rejected: Option<f64>,
    pub mean_quality_accepted: Option<f64>,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Score each frame against its threshold and aggregate the confusion table.
pub fn score_frames(
    frames: &[FrameQuality],
    threshold: &QualityThreshold,
) -> PlannerResult<ValidationSummary> {
    threshold.validate()?;

    let mut summary = ValidationSummary {
        total: frames.len(),
        ..Default::default()
    };
    let mut rejected_scores = Vec::new();
    let mut accepted_scores = Vec::new();

    for frame in frames {
        let limit = threshold.for_filter(frame.filter.as_deref());
        let outcome = ValidationOutcome::classify(frame.rejected, frame.quality_score >= limit);
        match outcome {
            ValidationOutcome::CorrectReject => summary.correct_reject += 1,
            ValidationOutcome::FalsePositive => summary.false_positive += 1,
            ValidationOutcome::CorrectAccept => summary.correct_accept += 1,
            ValidationOutcome::FalseNegative => summary.false_negative += 1,
        }
        if frame.rejected {
            rejected_scores.push(frame.quality_score);
        } else {
            accepted_scores.push(frame.quality_score);
        }
        summary.outcomes.push(outcome);
    }

    if summary.total > 0 {
        let correct = summary.correct_reject + summary.correct_accept;
        summary.accuracy = correct as f64 / summary.total as f64;
    }
    summary.mean_quality_rejected = mean(&rejected_scores);
    summary.mean_quality_accepted = mean(&accepted_scores);

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_truth_table() {
        let frames = vec![
            FrameQuality::new(true, 0.2),
            FrameQuality::new(true, 0.8),
            FrameQuality::new(false, 0.8),
            FrameQuality::new(false, 0.2),
        ];
        let summary = score_frames(&frames, &QualityThreshold::Global(0.5)).unwrap();
        assert_eq!(
            summary.outcomes,
            vec![
                ValidationOutcome::CorrectReject,
                ValidationOutcome::FalsePositive,
                ValidationOutcome::CorrectAccept,
                ValidationOutcome::FalseNegative,
            ]
        );
        assert_eq!(summary.accuracy, 0.5);
        assert_eq!(summary.mean_quality_rejected, Some(0.5));
        assert_eq!(summary.mean_quality_accepted, Some(0.5));
    }

    #[test]
    fn test_score_equal_to_threshold_passes() {
        let summary =
            score_frames(&[FrameQuality::new(false, 0.5)], &QualityThreshold::Global(0.5)).unwrap();
        assert_eq!(summary.correct_accept, 1);
    }

    #[test]
    fn test_per_filter_threshold() {
        let threshold = QualityThreshold::PerFilter {
            default: 0.5,
            by_filter: BTreeMap::from([("H-alpha".to_string(), 0.9)]),
        };
        assert_eq!(threshold.for_filter(Some("Ha")), 0.9);
        assert_eq!(threshold.for_filter(Some("OIII")), 0.5);
        assert_eq!(threshold.for_filter(None), 0.5);

        let frames = vec![
            FrameQuality::new(false, 0.7).with_filter("Ha"),
            FrameQuality::new(false, 0.7).with_filter("L"),
        ];
        let summary = score_frames(&frames, &threshold).unwrap();
        assert_eq!(summary.false_negative, 1);
        assert_eq!(summary.correct_accept, 1);
    }

    #[test]
    fn test_empty_input() {
        let summary = score_frames(&[], &QualityThreshold::Global(0.5)).unwrap();
        assert_eq!(summary.total, 0);
        assert_eq!(summary.accuracy, 0.0);
        assert_eq!(summary.mean_quality_rejected, None);
        assert_eq!(summary.mean_quality_accepted, None);
    }

    #[test]
    fn test_negative_threshold_is_error() {
        let err = score_frames(&[], &QualityThreshold::Global(-1.0)).unwrap_err();
        assert!(err.is_invalid_input());
        let per_filter = QualityThreshold::PerFilter {
            default: 0.5,
            by_filter: BTreeMap::from([("Ha".to_string(), -0.1)]),
        };
        assert!(score_frames(&[], &per_filter).is_err());
    }

    #[test]
    fn test_threshold_deserializes_both_shapes() {
        let global: QualityThreshold = serde_json::from_str("0.7").unwrap();
        assert_eq!(global, QualityThreshold::Global(0.7));
        let per: QualityThreshold =
            serde_json::from_str(r#"{"default": 0.5, "byFilter": {"Ha": 0.8}}"#).unwrap();
        assert_eq!(per.for_filter(Some("Ha")), 0.8);
    }

    #[test]
    fn test_outcome_wire_names() {
        let names: Vec<String> = [
            ValidationOutcome::CorrectReject,
            ValidationOutcome::FalsePositive,
            ValidationOutcome::CorrectAccept,
            ValidationOutcome::FalseNegative,
        ]
        .iter()
        .map(|o| serde_json::to_value(o).unwrap().as_str().unwrap().to_string())
        .collect();
        assert_eq!(
            names,
            ["CORRECT_REJECT", "FALSE_POSITIVE", "CORRECT_ACCEPT", "FALSE_NEGATIVE"]
        );
    }

    proptest! {
        #[test]
        fn prop_accuracy_in_unit_range(
            frames in prop::collection::vec((any::<bool>(), 0.0f64..1.0), 0..50),
            threshold in 0.0f64..1.0,
        ) {
            let frames: Vec<FrameQuality> = frames
                .into_iter()
                .map(|(rejected, score)| FrameQuality::new(rejected, score))
                .collect();
            let summary = score_frames(&frames, &QualityThreshold::Global(threshold)).unwrap();
            prop_assert!((0.0..=1.0).contains(&summary.accuracy));
            prop_assert_eq!(
                summary.correct_reject + summary.false_positive
                    + summary.correct_accept + summary.false_negative,
                frames.len()
            );
        }
    }
}
