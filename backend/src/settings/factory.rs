//! Settings store factory.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use super::file::FileSettingsStore;
use super::local::LocalSettingsStore;
use super::store::SettingsStore;
use crate::config::AnalysisConfig;

/// Settings backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreType {
    /// Process-local map, lost on exit
    Memory,
    /// TOML document on disk
    File,
}

impl FromStr for StoreType {
    type Err = String;

    /// Parse store type from string.
    ///
    /// # Arguments
    /// * `s` - String representation ("memory", "file")
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "local" | "mem" => Ok(Self::Memory),
            "file" | "toml" => Ok(Self::File),
            _ => Err(format!("Unknown settings store type: {}", s)),
        }
    }
}

impl StoreType {
    /// Reads `PLANNER_SETTINGS_STORE`. Defaults to `File`; unknown values
    /// fall back to `Memory` so a typo never touches the user's file.
    pub fn from_env() -> Self {
        match std::env::var("PLANNER_SETTINGS_STORE") {
            Ok(val) => val.parse().unwrap_or_else(|e| {
                log::warn!("{}; using in-memory settings", e);
                Self::Memory
            }),
            Err(_) => Self::File,
        }
    }
}

pub struct SettingsStoreFactory;

impl SettingsStoreFactory {
    /// Create a store of the given type. `path` is used by `File` only.
    pub fn create(store_type: StoreType, path: &Path) -> Arc<dyn SettingsStore> {
        match store_type {
            StoreType::Memory => Self::create_local(),
            StoreType::File => {
                log::info!("Using settings file {}", path.display());
                Arc::new(FileSettingsStore::new(PathBuf::from(path)))
            }
        }
    }

    pub fn create_local() -> Arc<dyn SettingsStore> {
        Arc::new(LocalSettingsStore::new())
    }

    /// Store named by the environment, located by the analysis config.
    pub fn from_config(config: &AnalysisConfig) -> Arc<dyn SettingsStore> {
        Self::create(StoreType::from_env(), &config.settings.path)
    }
}
