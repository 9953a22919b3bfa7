//! Planning and analysis services.
//!
//! Everything here is a pure function over immutable inputs; callers own the
//! data (see [`crate::ingest::FrameCollection`]) and the configuration.

pub mod aggregation;
pub mod allocation;
pub mod bursts;
pub mod export;
pub mod filters;
pub mod goals;
pub mod segmenter;
pub mod session;
pub mod settle;
pub mod validation;

pub use aggregation::{aggregate_frames, frame_type_counts, light_targets, FilterTotals, TargetTotals};
pub use allocation::{allocate, balance_plan, plan_targets, AllocationParams, AllocationRow};
pub use bursts::{detect_bursts, BurstConfig, BurstReport, BurstStatistics};
pub use export::{
    acquisition_rows, export_acquisitions, parse_filter_map, write_acquisition_csv, AcquisitionRow,
    FilterIdMap, DEFAULT_FILTER_MAP,
};
pub use filters::{canonical_filter, normalize_filter};
pub use goals::{default_weights, resolve_weights, GoalPreset, GoalWeights};
pub use segmenter::{segment_events, SegmenterConfig, SessionSegmentation};
pub use session::{analyze_session, GuidingAnalysis, SessionAnalysis, SessionOptions};
pub use settle::{correlate_dithers, settle_statistics, DitherSettle, SettleStatistics};
pub use validation::{score_frames, FrameQuality, QualityThreshold, ValidationOutcome, ValidationSummary};
