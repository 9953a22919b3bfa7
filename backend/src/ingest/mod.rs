//! Frame ingestion from the scan collaborator.
//!
//! The scanner emits newline-delimited JSON messages (`progress`, `frame`,
//! `done`). Frames accumulate in a caller-owned [`FrameCollection`]; planning
//! always runs on a snapshot, so it can be repeated while a scan is still
//! streaming in.

pub mod collection;
pub mod consumer;
pub mod messages;

pub use collection::FrameCollection;
pub use consumer::{apply_message, consume_lines, ingest_text, IngestOutcome, IngestReport};
pub use messages::{parse_message, IngestMessage, RejectionData, ScanProgress};
