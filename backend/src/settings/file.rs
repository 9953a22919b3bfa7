//! TOML-file settings store.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::store::SettingsStore;
use crate::error::{ErrorContext, PlannerError, PlannerResult};

type SettingsMap = BTreeMap<String, Value>;

/// Settings persisted as one TOML document.
///
/// Every write rewrites the whole file through a temporary sibling and a
/// rename, so readers never observe a partially written document. A missing
/// file reads as empty.
#[derive(Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> PlannerResult<SettingsMap> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(SettingsMap::new()),
            Err(e) => return Err(e.into()),
        };
        toml::from_str(&content).map_err(|e| {
            PlannerError::storage(
                format!("Failed to parse settings file: {}", e),
                self.context("load"),
            )
        })
    }

    async fn persist(&self, values: &SettingsMap) -> PlannerResult<()> {
        let content = toml::to_string(values).map_err(|e| {
            PlannerError::storage(
                format!("Failed to serialize settings: {}", e),
                self.context("persist"),
            )
        })?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("toml.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    fn context(&self, operation: &str) -> ErrorContext {
        ErrorContext::new(operation).with_details(self.path.display().to_string())
    }
}

/// TOML has no null; nested nulls are dropped before writing.
fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|v| !v.is_null())
                .map(strip_nulls)
                .collect(),
        ),
        other => other,
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn get(&self, key: &str) -> PlannerResult<Option<Value>> {
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> PlannerResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.load().await?;
        if value.is_null() {
            values.remove(key);
        } else {
            values.insert(key.to_string(), strip_nulls(value));
        }
        self.persist(&values).await?;
        log::debug!("Stored setting '{}' in {}", key, self.path.display());
        Ok(())
    }

    async fn remove(&self, key: &str) -> PlannerResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.load().await?;
        if values.remove(key).is_none() {
            return Ok(false);
        }
        self.persist(&values).await?;
        Ok(true)
    }

    async fn keys(&self) -> PlannerResult<Vec<String>> {
        Ok(self.load().await?.into_keys().collect())
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
