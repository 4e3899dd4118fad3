//! Pluggable key-value persistence.
//!
//! Chat history and the session pointer are written through this trait so
//! the storage medium (local SQLite file, in-memory store, a remote
//! service) is swappable without touching the chat pipeline.

use async_trait::async_trait;

use crate::core::errors::ApiError;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryKvStore;
pub use sqlite::SqliteKvStore;

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch the value stored under `key`, if any.
    async fn load(&self, key: &str) -> Result<Option<String>, ApiError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn save(&self, key: &str, value: &str) -> Result<(), ApiError>;

    /// Delete the value stored under `key`. Deleting a missing key is not
    /// an error.
    async fn remove(&self, key: &str) -> Result<(), ApiError>;
}
