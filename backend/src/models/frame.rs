use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Frame type as recorded by the acquisition software (`IMAGETYP`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FrameType {
    Light,
    Dark,
    Flat,
    Bias,
    #[serde(other)]
    Other,
}

impl FrameType {
    /// Classify a free-text frame type header value.
    pub fn from_header(raw: &str) -> Self {
        let s = raw.trim().to_uppercase();
        if s.contains("LIGHT") {
            FrameType::Light
        } else if s.contains("DARK") {
            FrameType::Dark
        } else if s.contains("FLAT") {
            FrameType::Flat
        } else if s.contains("BIAS") || s.contains("OFFSET") {
            FrameType::Bias
        } else {
            FrameType::Other
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FrameType::Light => "LIGHT",
            FrameType::Dark => "DARK",
            FrameType::Flat => "FLAT",
            FrameType::Bias => "BIAS",
            FrameType::Other => "OTHER",
        };
        f.write_str(s)
    }
}

/// A single exposure frame as produced by the scan collaborator.
///
/// Frames are immutable once produced. `filter` holds the raw header value;
/// normalization happens in the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub target: String,
    pub filter: String,
    #[serde(alias = "exposure_s", alias = "exposure_seconds")]
    pub exposure_seconds: f64,
    #[serde(
        alias = "date",
        deserialize_with = "crate::models::time::deserialize_frame_timestamp"
    )]
    pub timestamp: NaiveDateTime,
    #[serde(alias = "frame_type")]
    pub frame_type: FrameType,
    #[serde(default)]
    pub rejected: bool,
    #[serde(default, alias = "file_name", skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl Frame {
    /// Create a light frame with no file name and no rejection flag.
    pub fn light(
        target: impl Into<String>,
        filter: impl Into<String>,
        exposure_seconds: f64,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            target: target.into(),
            filter: filter.into(),
            exposure_seconds,
            timestamp,
            frame_type: FrameType::Light,
            rejected: false,
            file_name: None,
        }
    }

    /// Whether the frame counts towards integration totals.
    pub fn is_light(&self) -> bool {
        self.frame_type == FrameType::Light
    }

    /// Builder-style file name setter.
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Builder-style frame type setter.
    pub fn with_frame_type(mut self, frame_type: FrameType) -> Self {
        self.frame_type = frame_type;
        self
    }

    /// Builder-style rejection flag setter.
    pub fn with_rejected(mut self, rejected: bool) -> Self {
        self.rejected = rejected;
        self
    }
}
