//! Redis-backed [`KvStore`].
//!
//! Keys are stored as-is (`views:{slug}`) with plain `GET`/`SET` over a
//! multiplexed Tokio connection.

use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::sync::Mutex;

use super::{KvStore, StorageError};

pub struct RedisKv {
    connection: Mutex<redis::aio::MultiplexedConnection>,
}

impl RedisKv {
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let client = redis::Client::open(url).map_err(|e| StorageError::new("redis", e))?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StorageError::new("redis", e))?;

        Ok(Self {
            connection: Mutex::new(connection),
        })
    }
}

#[async_trait]
impl KvStore for RedisKv {
    fn name(&self) -> &'static str {
        "redis"
    }

    #[allow(clippy::significant_drop_tightening)]
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut conn = self.connection.lock().await;
        conn.get(key)
            .await
            .map_err(|e| StorageError::new("redis", e))
    }

    #[allow(clippy::significant_drop_tightening)]
    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut conn = self.connection.lock().await;
        conn.set::<_, _, ()>(key, value)
            .await
            .map_err(|e| StorageError::new("redis", e))
    }
}
