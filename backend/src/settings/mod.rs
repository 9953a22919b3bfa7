//! User preferences: an async key/value port plus typed helpers.
//!
//! The store holds opaque JSON per key. [`PlannerSettings`] maps the known
//! keys onto typed fields; a stored value of the wrong shape is logged and
//! replaced by the field default rather than failing the whole load.

pub mod factory;
pub mod file;
pub mod local;
pub mod store;

pub use factory::{SettingsStoreFactory, StoreType};
pub use file::FileSettingsStore;
pub use local::LocalSettingsStore;
pub use store::SettingsStore;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorContext, PlannerError, PlannerResult};
use crate::models::FilterBand;
use crate::services::allocation::DEFAULT_SUBFRAME_MINUTES;
use crate::services::goals::GoalWeights;

pub const KEY_SCAN_PATH: &str = "scanPath";
pub const KEY_RECURSE: &str = "recurse";
pub const KEY_GOAL_WEIGHTS: &str = "goalWeights";
pub const KEY_COLOR_THEME: &str = "colorTheme";
pub const KEY_SUBFRAME_MINUTES: &str = "subframeMinutes";
pub const KEY_BAND: &str = "band";

pub const DEFAULT_COLOR_THEME: &str = "dark";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlannerSettings {
    /// Last scanned frame folder.
    pub scan_path: Option<String>,
    pub recurse: bool,
    /// Empty means "no explicit goal".
    pub goal_weights: GoalWeights,
    pub color_theme: String,
    pub subframe_minutes: f64,
    pub band: FilterBand,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            scan_path: None,
            recurse: true,
            goal_weights: GoalWeights::new(),
            color_theme: DEFAULT_COLOR_THEME.to_string(),
            subframe_minutes: DEFAULT_SUBFRAME_MINUTES,
            band: FilterBand::default(),
        }
    }
}

async fn load_field<T: DeserializeOwned>(
    store: &dyn SettingsStore,
    key: &str,
    target: &mut T,
) -> PlannerResult<()> {
    if let Some(value) = store.get(key).await? {
        match serde_json::from_value(value) {
            Ok(parsed) => *target = parsed,
            Err(e) => log::warn!("Ignoring stored setting '{}': {}", key, e),
        }
    }
    Ok(())
}

async fn save_field<T: Serialize>(store: &dyn SettingsStore, key: &str, value: &T) -> PlannerResult<()> {
    let value = serde_json::to_value(value).map_err(|e| {
        PlannerError::storage(e.to_string(), ErrorContext::new("save_settings").with_field(key))
    })?;
    store.set(key, value).await
}

impl PlannerSettings {
    /// Read every known key, keeping defaults for absent or malformed values.
    pub async fn load(store: &dyn SettingsStore) -> PlannerResult<Self> {
        let mut settings = Self::default();
        load_field(store, KEY_SCAN_PATH, &mut settings.scan_path).await?;
        load_field(store, KEY_RECURSE, &mut settings.recurse).await?;
        load_field(store, KEY_GOAL_WEIGHTS, &mut settings.goal_weights).await?;
        load_field(store, KEY_COLOR_THEME, &mut settings.color_theme).await?;
        load_field(store, KEY_SUBFRAME_MINUTES, &mut settings.subframe_minutes).await?;
        load_field(store, KEY_BAND, &mut settings.band).await?;
        Ok(settings)
    }

    /// Write every field. `scan_path: None` removes the stored path.
    pub async fn save(&self, store: &dyn SettingsStore) -> PlannerResult<()> {
        self.validate()?;
        save_field(store, KEY_SCAN_PATH, &self.scan_path).await?;
        save_field(store, KEY_RECURSE, &self.recurse).await?;
        save_field(store, KEY_GOAL_WEIGHTS, &self.goal_weights).await?;
        save_field(store, KEY_COLOR_THEME, &self.color_theme).await?;
        save_field(store, KEY_SUBFRAME_MINUTES, &self.subframe_minutes).await?;
        save_field(store, KEY_BAND, &self.band).await?;
        log::info!("Saved planner settings to {} store", store.backend_name());
        Ok(())
    }

    pub fn validate(&self) -> PlannerResult<()> {
        if !(self.subframe_minutes.is_finite() && self.subframe_minutes > 0.0) {
            return Err(PlannerError::invalid_input(
                "subframe length must be a positive number of minutes",
                ErrorContext::new("save_settings")
                    .with_field(KEY_SUBFRAME_MINUTES)
                    .with_value(self.subframe_minutes),
            ));
        }
        if let Some((filter, weight)) = self
            .goal_weights
            .iter()
            .find(|(_, w)| !(w.is_finite() && **w >= 0.0))
        {
            return Err(PlannerError::invalid_input(
                "goal weights must be finite and non-negative",
                ErrorContext::new("save_settings")
                    .with_field(format!("{}.{}", KEY_GOAL_WEIGHTS, filter))
                    .with_value(weight),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_load_defaults_from_empty_store() {
        let store = LocalSettingsStore::new();
        let settings = PlannerSettings::load(&store).await.unwrap();
        assert_eq!(settings, PlannerSettings::default());
        assert!(settings.recurse);
        assert_eq!(settings.subframe_minutes, 5.0);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = LocalSettingsStore::new();
        let mut settings = PlannerSettings {
            scan_path: Some("/data/lights".into()),
            recurse: false,
            band: FilterBand::Broadband,
            subframe_minutes: 3.0,
            ..Default::default()
        };
        settings.goal_weights.insert("L".into(), 3.0);
        settings.save(&store).await.unwrap();

        assert_eq!(store.get(KEY_BAND).await.unwrap(), Some(json!("broadband")));
        assert_eq!(PlannerSettings::load(&store).await.unwrap(), settings);

        settings.scan_path = None;
        settings.save(&store).await.unwrap();
        assert_eq!(store.get(KEY_SCAN_PATH).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_malformed_value_falls_back() {
        let store = LocalSettingsStore::new();
        store.set(KEY_SUBFRAME_MINUTES, json!("five")).await.unwrap();
        store.set(KEY_COLOR_THEME, json!("light")).await.unwrap();
        let settings = PlannerSettings::load(&store).await.unwrap();
        assert_eq!(settings.subframe_minutes, DEFAULT_SUBFRAME_MINUTES);
        assert_eq!(settings.color_theme, "light");
    }

    #[tokio::test]
    async fn test_invalid_settings_are_not_saved() {
        let store = LocalSettingsStore::new();
        let settings = PlannerSettings {
            subframe_minutes: 0.0,
            ..Default::default()
        };
        assert!(settings.save(&store).await.unwrap_err().is_invalid_input());
        assert!(store.keys().await.unwrap().is_empty());

        let mut settings = PlannerSettings::default();
        settings.goal_weights.insert("Ha".into(), -1.0);
        assert!(settings.save(&store).await.unwrap_err().is_invalid_input());
    }
}
