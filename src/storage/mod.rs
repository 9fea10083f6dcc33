//! Storage bindings injected into the handlers.
//!
//! Two narrow traits stand in for the platform bindings the handlers
//! need: [`ObjectStore`] (prefix listing over an object bucket, used by
//! the wallpaper redirect) and [`KvStore`] (string get/put, used by the
//! view counter). Concrete bindings are chosen from config by
//! [`bind_object_store`] and [`bind_kv_store`]; the in-memory
//! implementations double as test fakes.

pub mod local;
pub mod memory;

#[cfg(feature = "redis")]
pub mod redis_kv;

#[cfg(feature = "sqlite")]
pub mod sqlite_kv;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::model::{KvStoreConfig, ObjectStoreConfig};
use crate::error::TandemError;

#[derive(Debug, thiserror::Error)]
#[error("{backend}: {source}")]
pub struct StorageError {
    pub backend: &'static str,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl StorageError {
    pub fn new(
        backend: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            backend,
            source: source.into(),
        }
    }
}

impl From<StorageError> for TandemError {
    fn from(e: StorageError) -> Self {
        Self::Storage {
            backend: e.backend,
            source: e.source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub etag: Option<String>,
}

impl ObjectEntry {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            etag: None,
        }
    }
}

// async_trait because bindings are held as Arc<dyn ...>.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn name(&self) -> &'static str;
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, StorageError>;
}

#[async_trait]
pub trait KvStore: Send + Sync {
    fn name(&self) -> &'static str;
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

#[must_use]
pub fn bind_object_store(config: &ObjectStoreConfig) -> Arc<dyn ObjectStore> {
    match config {
        ObjectStoreConfig::Memory { keys } => Arc::new(memory::MemoryBucket::from_keys(keys)),
        ObjectStoreConfig::Local { root } => Arc::new(local::LocalBucket::new(root.clone())),
    }
}

pub async fn bind_kv_store(config: &KvStoreConfig) -> Result<Arc<dyn KvStore>, TandemError> {
    match config {
        KvStoreConfig::Memory => Ok(Arc::new(memory::MemoryKv::new())),

        #[cfg(feature = "redis")]
        KvStoreConfig::Redis { url } => Ok(Arc::new(redis_kv::RedisKv::connect(url).await?)),

        #[cfg(not(feature = "redis"))]
        KvStoreConfig::Redis { .. } => Err(TandemError::FeatureDisabled {
            backend: "redis",
            feature: "redis",
        }),

        #[cfg(feature = "sqlite")]
        KvStoreConfig::Sqlite { path } => Ok(Arc::new(sqlite_kv::SqliteKv::open(path).await?)),

        #[cfg(not(feature = "sqlite"))]
        KvStoreConfig::Sqlite { .. } => Err(TandemError::FeatureDisabled {
            backend: "sqlite",
            feature: "sqlite",
        }),
    }
}
