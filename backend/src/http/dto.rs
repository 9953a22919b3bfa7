//! Data Transfer Objects for the HTTP API.
//!
//! Requests leave every tuning knob optional; handlers fill the gaps from
//! [`AnalysisConfig`](crate::config::AnalysisConfig).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{FilterBand, Frame};
use crate::parsing::DitherCommand;
use crate::services::allocation::AllocationRow;
use crate::services::goals::GoalWeights;
use crate::services::bursts::BurstConfig;
use crate::services::segmenter::SegmenterConfig;
use crate::services::settle::{DitherSettle, SettleStatistics};
use crate::services::validation::{FrameQuality, QualityThreshold};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Status of the service
    pub status: String,
    /// Version of the API
    pub version: String,
    /// Settings backend in use ("memory" or "file")
    pub settings_backend: String,
}

/// Which allocation view to compute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationMode {
    /// Distribute a desired total by weight
    #[default]
    Total,
    /// Largest ratio-consistent plan the captured data supports
    Balance,
}

/// Request body for POST /v1/allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationRequest {
    pub frames: Vec<Frame>,
    /// Explicit goal; absent falls back to the default weights.
    #[serde(default)]
    pub weights: Option<GoalWeights>,
    #[serde(default)]
    pub desired_hours: Option<f64>,
    /// Per-target desired totals, overriding `desired_hours`.
    #[serde(default)]
    pub target_hours: BTreeMap<String, f64>,
    #[serde(default)]
    pub band: FilterBand,
    #[serde(default)]
    pub subframe_minutes: Option<f64>,
    #[serde(default)]
    pub mode: AllocationMode,
    #[serde(default = "default_true")]
    pub exclude_rejected: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationResponse {
    pub mode: AllocationMode,
    /// Weights actually applied after fallback resolution.
    pub weights: GoalWeights,
    pub rows: Vec<AllocationRow>,
}

/// Request body for POST /v1/session/analyze.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub nina_log: String,
    #[serde(default)]
    pub guide_log: Option<String>,
    #[serde(default)]
    pub segmenter: Option<SegmenterConfig>,
    #[serde(default)]
    pub bursts: Option<BurstConfig>,
}

/// Request body for POST /v1/settle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleRequest {
    pub debug_log: String,
    /// Name of the debug log file; its embedded date anchors line clocks.
    #[serde(default)]
    pub file_name: Option<String>,
    /// Acquisition log whose dithers are matched against settle events.
    /// Without it the debug log's own dither commands are used.
    #[serde(default)]
    pub nina_log: Option<String>,
    #[serde(default)]
    pub max_delta_secs: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    pub statistics: SettleStatistics,
    pub dither_commands: Vec<DitherCommand>,
    pub correlations: Vec<DitherSettle>,
    pub lines_skipped: usize,
}

/// Request body for POST /v1/validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequest {
    pub frames: Vec<FrameQuality>,
    pub threshold: QualityThreshold,
}

/// Request body for POST /v1/export/acquisitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub frames: Vec<Frame>,
    /// `Name=ID` lines; absent uses the built-in map.
    #[serde(default)]
    pub filter_map: Option<String>,
}
