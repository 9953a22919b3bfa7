//! Application state for the HTTP server.

use std::sync::Arc;

use crate::config::AnalysisConfig;
use crate::settings::SettingsStore;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Defaults for every request that leaves a knob unset
    pub config: Arc<AnalysisConfig>,
    /// User preferences backend
    pub settings: Arc<dyn SettingsStore>,
}

impl AppState {
    pub fn new(config: AnalysisConfig, settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            config: Arc::new(config),
            settings,
        }
    }
}
