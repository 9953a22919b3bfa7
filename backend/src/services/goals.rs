//! Goal weight resolution and named ratio presets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{ensure_non_negative, PlannerResult};
use crate::models::CanonicalFilter;

/// Relative weight per filter label. Keys may be raw labels; they are
/// normalized by the allocation engine.
pub type GoalWeights = BTreeMap<String, f64>;

/// Weight 1 for each of the seven canonical filters.
pub fn default_weights() -> GoalWeights {
    CanonicalFilter::ALL
        .iter()
        .map(|f| (f.as_str().to_string(), 1.0))
        .collect()
}

/// Resolve the weights the allocation engine should use.
///
/// Explicit weights are returned unchanged (not normalized) when at least one
/// is positive and frames exist. Absent weights, an all-zero map or an empty
/// frame set fall back to [`default_weights`]. Explicit zeros are kept; band
/// exclusion is the engine's concern. Negative or non-finite weights are
/// rejected before any fallback is considered.
pub fn resolve_weights(explicit: Option<&GoalWeights>, has_frames: bool) -> PlannerResult<GoalWeights> {
    let Some(weights) = explicit else {
        return Ok(default_weights());
    };

    for (filter, weight) in weights {
        ensure_non_negative("resolve_weights", &format!("weight[{}]", filter), *weight)?;
    }

    let sum: f64 = weights.values().sum();
    if sum <= 0.0 || !has_frames {
        log::debug!(
            "Falling back to equal weights (sum={}, has_frames={})",
            sum,
            has_frames
        );
        return Ok(default_weights());
    }

    Ok(weights.clone())
}

/// Ratio presets offered to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GoalPreset {
    /// Ha 2 : OIII 1 : SII 1
    Sho,
    /// Ha 2 : OIII 1
    Hoo,
    /// L 2 : R 1 : G 1 : B 1
    Lrgb,
}

impl GoalPreset {
    pub const ALL: [GoalPreset; 3] = [GoalPreset::Sho, GoalPreset::Hoo, GoalPreset::Lrgb];

    pub fn label(&self) -> &'static str {
        match self {
            GoalPreset::Sho => "SHO (2:1:1)",
            GoalPreset::Hoo => "HOO (2:1)",
            GoalPreset::Lrgb => "LRGB (2:1:1:1)",
        }
    }

    pub fn weights(&self) -> GoalWeights {
        let pairs: &[(CanonicalFilter, f64)] = match self {
            GoalPreset::Sho => &[
                (CanonicalFilter::Ha, 2.0),
                (CanonicalFilter::Oiii, 1.0),
                (CanonicalFilter::Sii, 1.0),
            ],
            GoalPreset::Hoo => &[(CanonicalFilter::Ha, 2.0), (CanonicalFilter::Oiii, 1.0)],
            GoalPreset::Lrgb => &[
                (CanonicalFilter::L, 2.0),
                (CanonicalFilter::R, 1.0),
                (CanonicalFilter::G, 1.0),
                (CanonicalFilter::B, 1.0),
            ],
        };
        pairs
            .iter()
            .map(|(f, w)| (f.as_str().to_string(), *w))
            .collect()
    }
}

impl fmt::Display for GoalPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for GoalPreset {
    type Err = String;

    /// Accepts the short name (`sho`) or the full label (`SHO (2:1:1)`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.split_whitespace().next().unwrap_or("").to_lowercase();
        match key.as_str() {
            "sho" => Ok(Self::Sho),
            "hoo" => Ok(Self::Hoo),
            "lrgb" => Ok(Self::Lrgb),
            _ => Err(format!("Unknown goal preset: {}", s)),
        }
    }
}
