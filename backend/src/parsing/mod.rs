//! Parsers for acquisition, guiding and stacking logs.
//!
//! Parsers never fail on malformed lines: they skip and count them.

pub mod debug_log;
pub mod guide_log;
pub mod nina_log;
pub mod rejection_log;

pub use debug_log::{parse_debug_log, DebugLog, DitherCommand, FailureReason, SettleEvent};
pub use guide_log::{parse_guide_log, GuideLog, GuidingSummary};
pub use nina_log::{parse_nina_log, LineCounters, NinaLog};
pub use rejection_log::{apply_rejections, normalize_frame_name, parse_rejection_log, RejectionLog};
