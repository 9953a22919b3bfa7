//! In-memory settings store for tests and ephemeral servers.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::store::SettingsStore;
use crate::error::PlannerResult;

#[derive(Debug, Clone, Default)]
pub struct LocalSettingsStore {
    values: Arc<RwLock<BTreeMap<String, Value>>>,
}

impl LocalSettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for LocalSettingsStore {
    async fn get(&self, key: &str) -> PlannerResult<Option<Value>> {
        Ok(self.values.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> PlannerResult<()> {
        let mut values = self.values.write();
        if value.is_null() {
            values.remove(key);
        } else {
            values.insert(key.to_string(), value);
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> PlannerResult<bool> {
        Ok(self.values.write().remove(key).is_some())
    }

    async fn keys(&self) -> PlannerResult<Vec<String>> {
        Ok(self.values.read().keys().cloned().collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
