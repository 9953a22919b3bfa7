//! Analysis configuration file support.
//!
//! Thresholds and windows come from `planner.toml`, then from `PLANNER_*`
//! environment variables. Every field has a default, so an empty file (or no
//! file at all) yields the stock configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PlannerError, PlannerResult};
use crate::services::allocation::DEFAULT_SUBFRAME_MINUTES;
use crate::services::bursts::{
    BurstConfig, DEFAULT_BURST_THRESHOLD, DEFAULT_CORRELATION_WINDOW_SECS, DEFAULT_MERGE_GAP_SECS,
};
use crate::services::segmenter::SegmenterConfig;
use crate::services::session::SessionOptions;
use crate::services::settle::DEFAULT_DITHER_MATCH_SECS;

pub const CONFIG_FILE_NAME: &str = "planner.toml";
pub const DEFAULT_SETTINGS_PATH: &str = "planner-settings.toml";

pub const ENV_BURST_THRESHOLD: &str = "PLANNER_BURST_THRESHOLD";
pub const ENV_MERGE_GAP_SECS: &str = "PLANNER_MERGE_GAP_SECS";
pub const ENV_CORRELATION_WINDOW_SECS: &str = "PLANNER_CORRELATION_WINDOW_SECS";
pub const ENV_SETTINGS_PATH: &str = "PLANNER_SETTINGS_PATH";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub bursts: BurstSettings,
    #[serde(default)]
    pub segmenter: SegmenterSettings,
    #[serde(default)]
    pub settle: SettleSettings,
    #[serde(default)]
    pub planner: PlannerDefaults,
    #[serde(default)]
    pub settings: SettingsLocation,
}

/// Guiding burst detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurstSettings {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_merge_gap_secs")]
    pub merge_gap_secs: f64,
    #[serde(default = "default_correlation_window_secs")]
    pub correlation_window_secs: f64,
}

/// NINA log segmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmenterSettings {
    #[serde(default = "default_join_window_secs")]
    pub join_window_secs: f64,
    #[serde(default = "default_download_gap_cap_secs")]
    pub download_gap_cap_secs: f64,
}

/// Dither/settle correlation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettleSettings {
    #[serde(default = "default_dither_match_secs")]
    pub dither_match_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerDefaults {
    #[serde(default = "default_subframe_minutes")]
    pub subframe_minutes: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsLocation {
    #[serde(default = "default_settings_path")]
    pub path: PathBuf,
}

fn default_threshold() -> f64 {
    DEFAULT_BURST_THRESHOLD
}

fn default_merge_gap_secs() -> f64 {
    DEFAULT_MERGE_GAP_SECS
}

fn default_correlation_window_secs() -> f64 {
    DEFAULT_CORRELATION_WINDOW_SECS
}

fn default_join_window_secs() -> f64 {
    SegmenterConfig::default().join_window_secs
}

fn default_download_gap_cap_secs() -> f64 {
    SegmenterConfig::default().download_gap_cap_secs
}

fn default_dither_match_secs() -> f64 {
    DEFAULT_DITHER_MATCH_SECS
}

fn default_subframe_minutes() -> f64 {
    DEFAULT_SUBFRAME_MINUTES
}

fn default_settings_path() -> PathBuf {
    PathBuf::from(DEFAULT_SETTINGS_PATH)
}

impl Default for BurstSettings {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            merge_gap_secs: default_merge_gap_secs(),
            correlation_window_secs: default_correlation_window_secs(),
        }
    }
}

impl Default for SegmenterSettings {
    fn default() -> Self {
        Self {
            join_window_secs: default_join_window_secs(),
            download_gap_cap_secs: default_download_gap_cap_secs(),
        }
    }
}

impl Default for SettleSettings {
    fn default() -> Self {
        Self {
            dither_match_secs: default_dither_match_secs(),
        }
    }
}

impl Default for PlannerDefaults {
    fn default() -> Self {
        Self {
            subframe_minutes: default_subframe_minutes(),
        }
    }
}

impl Default for SettingsLocation {
    fn default() -> Self {
        Self {
            path: default_settings_path(),
        }
    }
}

fn env_f64(name: &str) -> PlannerResult<Option<f64>> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse::<f64>().map(Some).map_err(|e| {
            PlannerError::Configuration(format!("Invalid {} value '{}': {}", name, raw, e))
        }),
        Err(_) => Ok(None),
    }
}

impl AnalysisConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Ok(AnalysisConfig)` if successful
    /// * `Err(PlannerError::Configuration)` if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> PlannerResult<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            PlannerError::Configuration(format!("Failed to read config file: {}", e))
        })?;

        let config: AnalysisConfig = toml::from_str(&content).map_err(|e| {
            PlannerError::Configuration(format!("Failed to parse config file: {}", e))
        })?;

        Ok(config)
    }

    /// Load configuration from the default location.
    ///
    /// Searches for `planner.toml` in:
    /// 1. Current directory
    /// 2. `backend/` directory
    /// 3. Parent directory
    pub fn from_default_location() -> PlannerResult<Self> {
        let search_paths = [
            PathBuf::from(CONFIG_FILE_NAME),
            PathBuf::from("backend").join(CONFIG_FILE_NAME),
            PathBuf::from("..").join(CONFIG_FILE_NAME),
        ];

        for path in search_paths {
            if path.exists() {
                log::info!("Loading analysis config from {}", path.display());
                return Self::from_file(&path);
            }
        }

        Err(PlannerError::Configuration(format!(
            "No {} found in standard locations",
            CONFIG_FILE_NAME
        )))
    }

    /// Resolve the configuration the server runs with: the default file when
    /// present, stock values otherwise, then environment overrides.
    pub fn load() -> PlannerResult<Self> {
        let mut config = match Self::from_default_location() {
            Ok(config) => config,
            Err(PlannerError::Configuration(msg)) if msg.starts_with("No ") => {
                log::info!("{}; using defaults", msg);
                Self::default()
            }
            Err(e) => return Err(e),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `PLANNER_*` environment variables. Unparsable numbers are a
    /// configuration error, not silently ignored.
    pub fn apply_env_overrides(&mut self) -> PlannerResult<()> {
        if let Some(v) = env_f64(ENV_BURST_THRESHOLD)? {
            self.bursts.threshold = v;
        }
        if let Some(v) = env_f64(ENV_MERGE_GAP_SECS)? {
            self.bursts.merge_gap_secs = v;
        }
        if let Some(v) = env_f64(ENV_CORRELATION_WINDOW_SECS)? {
            self.bursts.correlation_window_secs = v;
        }
        if let Ok(path) = std::env::var(ENV_SETTINGS_PATH) {
            if !path.trim().is_empty() {
                self.settings.path = PathBuf::from(path);
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> PlannerResult<()> {
        let checks = [
            ("bursts.threshold", self.bursts.threshold),
            ("bursts.merge_gap_secs", self.bursts.merge_gap_secs),
            ("bursts.correlation_window_secs", self.bursts.correlation_window_secs),
            ("segmenter.join_window_secs", self.segmenter.join_window_secs),
            ("segmenter.download_gap_cap_secs", self.segmenter.download_gap_cap_secs),
            ("settle.dither_match_secs", self.settle.dither_match_secs),
        ];
        for (name, value) in checks {
            if !(value.is_finite() && value >= 0.0) {
                return Err(PlannerError::Configuration(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if !(self.planner.subframe_minutes.is_finite() && self.planner.subframe_minutes > 0.0) {
            return Err(PlannerError::Configuration(format!(
                "planner.subframe_minutes must be positive, got {}",
                self.planner.subframe_minutes
            )));
        }
        Ok(())
    }

    pub fn burst_config(&self) -> BurstConfig {
        BurstConfig {
            threshold: self.bursts.threshold,
            merge_gap_secs: self.bursts.merge_gap_secs,
            correlation_window_secs: self.bursts.correlation_window_secs,
        }
    }

    pub fn segmenter_config(&self) -> SegmenterConfig {
        SegmenterConfig {
            join_window_secs: self.segmenter.join_window_secs,
            download_gap_cap_secs: self.segmenter.download_gap_cap_secs,
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            segmenter: self.segmenter_config(),
            bursts: self.burst_config(),
        }
    }
}
