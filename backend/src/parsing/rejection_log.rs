//! Stacking-tool rejection logs (PixInsight `ProcessLogger.txt`, DeepSkyStacker
//! and similar).
//!
//! Rejected sub-frames are named after their calibrated files
//! (`M42_Ha_001_c_lps.xisf`). Names are reduced back to the raw capture name
//! (`M42_Ha_001.fit`) so they can be matched against scanned frames.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::models::Frame;

/// Suffixes appended by calibration and registration, longest first.
const CALIBRATION_SUFFIXES: [&str; 6] = ["_calibrated", "_c_lps", "_cal", "_lps", "_cc", "_c"];

const IMAGE_EXT: &str = r"(?:fits|fit|fts|tiff|tif|xisf)";

static REJECTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\[([^\]]+\.xisf)".to_string(),
        format!(r"(?i)rejected.*?([\w\-.]+\.{IMAGE_EXT})\b"),
        format!(r"(?i)rejection.*?([\w\-.]+\.{IMAGE_EXT})\b"),
        format!(r"(?i)(?:reject|discard|exclude).*?([\w\-.]+\.{IMAGE_EXT})\b"),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid rejection pattern"))
    .collect()
});

static METRIC_FILE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)([^\s\[\]]+\.{IMAGE_EXT})\b")).expect("valid metric file pattern")
});

static METRIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(fwhm|noise|quality|score|stars)\b[^0-9\n]*([0-9]+(?:\.[0-9]+)?)")
        .expect("valid metric pattern")
});

/// Per-frame quality metrics reported by the stacking tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fwhm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noise: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stars: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionLog {
    /// Normalized names of rejected frames.
    pub rejected: BTreeSet<String>,
    pub metrics: BTreeMap<String, FrameMetrics>,
}

impl RejectionLog {
    /// Frames named anywhere in the log.
    pub fn total_frames_mentioned(&self) -> usize {
        self.rejected
            .iter()
            .chain(self.metrics.keys())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Share of mentioned frames that were kept; 1 when none were mentioned.
    pub fn acceptance_rate(&self) -> f64 {
        let total = self.total_frames_mentioned();
        if total == 0 {
            1.0
        } else {
            (total - self.rejected.len()) as f64 / total as f64
        }
    }

    /// Add the entries of another log.
    pub fn merge(&mut self, other: RejectionLog) {
        self.rejected.extend(other.rejected);
        for (name, metrics) in other.metrics {
            let entry = self.metrics.entry(name).or_default();
            entry.fwhm = metrics.fwhm.or(entry.fwhm);
            entry.noise = metrics.noise.or(entry.noise);
            entry.quality = metrics.quality.or(entry.quality);
            entry.stars = metrics.stars.or(entry.stars);
        }
    }
}

/// Reduce a calibrated file name to its raw capture name.
///
/// Directories are dropped, calibration suffixes are stripped from the end of
/// the stem, and `.xisf` becomes `.fit`.
pub fn normalize_frame_name(raw: &str) -> String {
    let name = raw
        .trim()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let (mut stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) => (stem, ext),
        None => (name, ""),
    };
    while let Some(stripped) = CALIBRATION_SUFFIXES
        .iter()
        .find_map(|suffix| stem.strip_suffix(suffix))
    {
        stem = stripped;
    }
    let ext = if ext.eq_ignore_ascii_case("xisf") { "fit" } else { ext };
    if ext.is_empty() {
        stem.to_string()
    } else {
        format!("{}.{}", stem, ext)
    }
}

/// Lower-cased normalized name without its extension, used for matching.
pub fn frame_stem(raw: &str) -> String {
    let normalized = normalize_frame_name(raw);
    let stem = normalized
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(&normalized);
    stem.to_lowercase()
}

/// Parse rejection log text.
pub fn parse_rejection_log(text: &str) -> RejectionLog {
    let mut log = RejectionLog::default();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(name) = REJECTION_PATTERNS
            .iter()
            .find_map(|re| re.captures(line))
            .map(|caps| normalize_frame_name(&caps[1]))
        {
            log.rejected.insert(name);
        }

        let Some(file) = METRIC_FILE_RE.captures(line) else {
            continue;
        };
        let file_end = file.get(0).map_or(0, |m| m.end());
        let mut found = FrameMetrics::default();
        let mut any = false;
        for caps in METRIC_RE.captures_iter(&line[file_end..]) {
            let Ok(value) = caps[2].parse::<f64>() else {
                continue;
            };
            any = true;
            match caps[1].to_lowercase().as_str() {
                "fwhm" => found.fwhm = Some(value),
                "noise" => found.noise = Some(value),
                "stars" => found.stars = Some(value as u32),
                _ => found.quality = Some(value),
            }
        }
        if any {
            let name = normalize_frame_name(&file[1]);
            let mut single = RejectionLog::default();
            single.metrics.insert(name, found);
            log.merge(single);
        }
    }

    log::info!(
        "Parsed rejection log: {} rejected, {} frames with metrics",
        log.rejected.len(),
        log.metrics.len()
    );
    log
}

/// Flag frames whose file name matches a rejected name. Returns the number of
/// frames flagged. Frames without a file name are left alone.
pub fn apply_rejections<'a, I>(frames: &mut [Frame], rejected: I) -> usize
where
    I: IntoIterator<Item = &'a String>,
{
    let stems: BTreeSet<String> = rejected.into_iter().map(|name| frame_stem(name)).collect();
    let mut flagged = 0;
    for frame in frames.iter_mut() {
        let matches = frame
            .file_name
            .as_deref()
            .is_some_and(|name| stems.contains(&frame_stem(name)));
        if matches && !frame.rejected {
            frame.rejected = true;
            flagged += 1;
        }
    }
    flagged
}
