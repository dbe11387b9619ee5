//! Caller-supplied context shared by every tool in a run.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// A JSON object shared across tools, guardrails and approval handlers.
///
/// Clones share the same value. Each accessor takes the lock only for the
/// duration of the call, so concurrent tools in one batch may interleave
/// their updates; a tool that needs read-modify-write atomicity should use
/// [`SharedContext::update`].
#[derive(Clone, Default)]
pub struct SharedContext {
    inner: Arc<RwLock<serde_json::Value>>,
}

impl SharedContext {
    pub fn new(value: serde_json::Value) -> Self {
        Self {
            inner: Arc::new(RwLock::new(value)),
        }
    }

    /// Build from any serializable value.
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self::new(serde_json::to_value(value)?))
    }

    /// A copy of the whole value.
    pub fn snapshot(&self) -> serde_json::Value {
        self.read().clone()
    }

    /// A copy of one top-level field.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.read().get(key).cloned()
    }

    /// Deserialize one top-level field.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Set a top-level field, turning a non-object value into an object first.
    pub fn set(&self, key: impl Into<String>, value: serde_json::Value) {
        let mut guard = self.write();
        if !guard.is_object() {
            *guard = serde_json::Value::Object(serde_json::Map::new());
        }
        if let Some(map) = guard.as_object_mut() {
            map.insert(key.into(), value);
        }
    }

    /// Mutate the value under a single write lock.
    pub fn update<R>(&self, f: impl FnOnce(&mut serde_json::Value) -> R) -> R {
        let mut guard = self.write();
        f(&mut guard)
    }

    fn read(&self) -> RwLockReadGuard<'_, serde_json::Value> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, serde_json::Value> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for SharedContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SharedContext").field(&*self.read()).finish()
    }
}

impl From<serde_json::Value> for SharedContext {
    fn from(value: serde_json::Value) -> Self {
        Self::new(value)
    }
}
