//! SQLite-backed key-value store, the default persistence medium.

use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

use super::KvStore;
use crate::core::errors::ApiError;

pub struct SqliteKvStore {
    pool: SqlitePool,
}

impl SqliteKvStore {
    pub async fn with_path(db_path: PathBuf) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS kv_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }
}

#[async_trait]
impl KvStore for SqliteKvStore {
    async fn load(&self, key: &str) -> Result<Option<String>, ApiError> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM kv_entries WHERE key = ?1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(ApiError::internal)?;

        Ok(value)
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), ApiError> {
        sqlx::query(
            "INSERT OR REPLACE INTO kv_entries (key, value, updated_at)
             VALUES (?1, ?2, STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM kv_entries WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteKvStore {
        let tmp = std::env::temp_dir().join(format!("authorai-kv-test-{}.db", uuid::Uuid::new_v4()));
        SqliteKvStore::with_path(tmp).await.unwrap()
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let store = test_store().await;

        assert!(store.load("missing").await.unwrap().is_none());

        store.save("greeting", "hello").await.unwrap();
        assert_eq!(store.load("greeting").await.unwrap().unwrap(), "hello");

        store.save("greeting", "replaced").await.unwrap();
        assert_eq!(store.load("greeting").await.unwrap().unwrap(), "replaced");
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let store = test_store().await;

        store.save("k", "v").await.unwrap();
        store.remove("k").await.unwrap();
        assert!(store.load("k").await.unwrap().is_none());

        // Removing again is fine.
        store.remove("k").await.unwrap();
    }
}
