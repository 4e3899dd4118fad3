//! Per-user durable chat history.
//!
//! Messages are mirrored to the key-value store under
//! `chat_history_<user_id>` as a JSON array. On load, entries older than
//! the retention window (10 days by default) are discarded, and corrupt
//! persisted data is treated as absent rather than crashing the session.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::errors::ApiError;
use crate::storage::KvStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    /// Epoch milliseconds. Insertion order equals timestamp order because
    /// appends are serialized by the orchestrator.
    pub timestamp: i64,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

pub struct HistoryStore {
    kv: Arc<dyn KvStore>,
    retention_ms: i64,
}

impl HistoryStore {
    pub fn new(kv: Arc<dyn KvStore>, retention_days: i64) -> Self {
        Self {
            kv,
            retention_ms: retention_days * 24 * 60 * 60 * 1000,
        }
    }

    fn key(user_id: &str) -> String {
        format!("chat_history_{}", user_id)
    }

    /// Load the stored history for `user_id`, pruned to the retention
    /// window. Missing or corrupt data yields an empty history.
    pub async fn load(&self, user_id: &str) -> Result<Vec<Message>, ApiError> {
        let Some(raw) = self.kv.load(&Self::key(user_id)).await? else {
            return Ok(Vec::new());
        };

        let messages: Vec<Message> = match serde_json::from_str(&raw) {
            Ok(messages) => messages,
            Err(err) => {
                tracing::warn!("Discarding corrupt history for user {}: {}", user_id, err);
                return Ok(Vec::new());
            }
        };

        let cutoff = Utc::now().timestamp_millis() - self.retention_ms;
        Ok(messages
            .into_iter()
            .filter(|message| message.timestamp > cutoff)
            .collect())
    }

    /// Replace the stored history for `user_id`.
    pub async fn save(&self, user_id: &str, messages: &[Message]) -> Result<(), ApiError> {
        let raw = serde_json::to_string(messages).map_err(ApiError::internal)?;
        self.kv.save(&Self::key(user_id), &raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKvStore;

    const HOUR_MS: i64 = 60 * 60 * 1000;
    const DAY_MS: i64 = 24 * HOUR_MS;

    fn store() -> HistoryStore {
        HistoryStore::new(Arc::new(MemoryKvStore::new()), 10)
    }

    fn message_aged(content: &str, age_ms: i64) -> Message {
        let mut message = Message::user(content);
        message.timestamp -= age_ms;
        message
    }

    #[tokio::test]
    async fn load_prunes_entries_past_retention() {
        let store = store();
        let stale = message_aged("old question", 10 * DAY_MS + HOUR_MS);
        let fresh = message_aged("recent question", HOUR_MS);

        store
            .save("usr_1", &[stale, fresh.clone()])
            .await
            .unwrap();

        let loaded = store.load("usr_1").await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].content, fresh.content);
    }

    #[tokio::test]
    async fn missing_history_loads_empty() {
        assert!(store().load("usr_nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_history_is_treated_as_absent() {
        let kv = Arc::new(MemoryKvStore::new());
        kv.save("chat_history_usr_1", "{not json")
            .await
            .unwrap();

        let store = HistoryStore::new(kv, 10);
        assert!(store.load("usr_1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn histories_are_keyed_per_user() {
        let kv = Arc::new(MemoryKvStore::new());
        let store = HistoryStore::new(kv, 10);

        store.save("usr_a", &[Message::user("from a")]).await.unwrap();
        store.save("usr_b", &[Message::user("from b")]).await.unwrap();

        assert_eq!(store.load("usr_a").await.unwrap()[0].content, "from a");
        assert_eq!(store.load("usr_b").await.unwrap()[0].content, "from b");
    }
}
