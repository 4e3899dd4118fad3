//! In-memory key-value store for tests and ephemeral sessions.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::KvStore;
use crate::core::errors::ApiError;

#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn load(&self, key: &str) -> Result<Option<String>, ApiError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| ApiError::Internal("kv store lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), ApiError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ApiError::Internal("kv store lock poisoned".to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), ApiError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ApiError::Internal("kv store lock poisoned".to_string()))?;
        entries.remove(key);
        Ok(())
    }
}
