//! Newline-delimited scan messages.
//!
//! The scanner reports counters in snake_case (`files_scanned`); browser-side
//! producers use camelCase (`filesScanned`). Both spellings are accepted.

use serde::{Deserialize, Serialize};

use crate::models::Frame;

/// Scan counters carried by every message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanProgress {
    pub files_scanned: u64,
    pub files_matched: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_files: Option<u64>,
}

/// Rejection results attached to the final message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionData {
    #[serde(default, alias = "rejected_frames")]
    pub rejected_frames: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IngestMessage {
    Progress {
        #[serde(default, rename = "filesScanned", alias = "files_scanned")]
        files_scanned: u64,
        #[serde(default, rename = "filesMatched", alias = "files_matched")]
        files_matched: u64,
        #[serde(default, rename = "totalFiles", alias = "total_files")]
        total_files: Option<u64>,
    },
    Frame {
        frame: Frame,
        #[serde(default, rename = "filesScanned", alias = "files_scanned")]
        files_scanned: u64,
        #[serde(default, rename = "filesMatched", alias = "files_matched")]
        files_matched: u64,
        #[serde(default, rename = "totalFiles", alias = "total_files")]
        total_files: Option<u64>,
    },
    Done {
        #[serde(default, rename = "filesScanned", alias = "files_scanned")]
        files_scanned: u64,
        #[serde(default, rename = "filesMatched", alias = "files_matched")]
        files_matched: u64,
        #[serde(default, rename = "totalFiles", alias = "total_files")]
        total_files: Option<u64>,
        /// Whole scan result when the producer reports in one batch.
        #[serde(default)]
        frames: Vec<Frame>,
        #[serde(default, rename = "rejectionData", alias = "rejection_data")]
        rejection_data: Option<RejectionData>,
    },
}

impl IngestMessage {
    pub fn progress(&self) -> ScanProgress {
        match self {
            IngestMessage::Progress {
                files_scanned,
                files_matched,
                total_files,
            }
            | IngestMessage::Frame {
                files_scanned,
                files_matched,
                total_files,
                ..
            }
            | IngestMessage::Done {
                files_scanned,
                files_matched,
                total_files,
                ..
            } => ScanProgress {
                files_scanned: *files_scanned,
                files_matched: *files_matched,
                total_files: *total_files,
            },
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, IngestMessage::Done { .. })
    }
}

/// Parse one line. Blank and malformed lines yield `None`.
pub fn parse_message(line: &str) -> Option<IngestMessage> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(message) => Some(message),
        Err(e) => {
            log::debug!("Skipping malformed ingest line: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_case_scanner_output() {
        let line = r#"{"type":"frame","frame":{"target":"M42","filter":"Ha","exposure_s":300.0,"date":"2024-03-01T22:00:00","frameType":"LIGHT"},"files_scanned":3,"files_matched":2,"total_files":10}"#;
        let message = parse_message(line).unwrap();
        assert_eq!(
            message.progress(),
            ScanProgress {
                files_scanned: 3,
                files_matched: 2,
                total_files: Some(10),
            }
        );
        match message {
            IngestMessage::Frame { frame, .. } => {
                assert_eq!(frame.target, "M42");
                assert_eq!(frame.exposure_seconds, 300.0);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_camel_case_done_with_rejections() {
        let line = r#"{"type":"done","filesScanned":5,"filesMatched":4,"rejectionData":{"rejectedFrames":["a.fit"]}}"#;
        let message = parse_message(line).unwrap();
        assert!(message.is_done());
        assert_eq!(message.progress().total_files, None);
        match message {
            IngestMessage::Done {
                rejection_data,
                frames,
                ..
            } => {
                assert!(frames.is_empty());
                assert_eq!(rejection_data.unwrap().rejected_frames, vec!["a.fit"]);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_lines() {
        assert!(parse_message("").is_none());
        assert!(parse_message("not json").is_none());
        assert!(parse_message(r#"{"type":"unknown"}"#).is_none());
        assert!(parse_message(r#"{"type":"frame"}"#).is_none());
    }
}
