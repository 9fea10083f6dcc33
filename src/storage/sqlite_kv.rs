//! SQLite-backed [`KvStore`].
//!
//! A single `kv` table (`key TEXT PRIMARY KEY, value TEXT`) is created on
//! first connection; writes are upserts.

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;

use super::{KvStore, StorageError};

pub struct SqliteKv {
    pool: SqlitePool,
}

impl SqliteKv {
    pub async fn open(path: &Path) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| StorageError::new("sqlite", e))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS kv (\
                key TEXT PRIMARY KEY, \
                value TEXT NOT NULL\
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| StorageError::new("sqlite", e))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl KvStore for SqliteKv {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::new("sqlite", e))?;

        Ok(row.map(|(value,)| value))
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO kv (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::new("sqlite", e))?;
        Ok(())
    }
}
