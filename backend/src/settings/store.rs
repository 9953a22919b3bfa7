//! Settings persistence port.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::PlannerResult;

/// Key/value store for user settings.
///
/// Values are opaque JSON; typed access lives in
/// [`PlannerSettings`](super::PlannerSettings).
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Read a value.
    ///
    /// # Returns
    /// * `Ok(Some(value))` - The stored value
    /// * `Ok(None)` - If the key is not set
    /// * `Err(PlannerError)` - If the backing storage cannot be read
    async fn get(&self, key: &str) -> PlannerResult<Option<Value>>;

    /// Write a value, replacing any previous one. Writing `null` removes the key.
    async fn set(&self, key: &str, value: Value) -> PlannerResult<()>;

    /// Remove a key.
    ///
    /// # Returns
    /// * `Ok(true)` - If the key existed
    /// * `Ok(false)` - If there was nothing to remove
    async fn remove(&self, key: &str) -> PlannerResult<bool>;

    /// All keys, sorted.
    async fn keys(&self) -> PlannerResult<Vec<String>>;

    /// Short backend name for logs and health output.
    fn backend_name(&self) -> &'static str;
}
