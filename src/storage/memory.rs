//! In-memory bindings. Used for `type: memory` stores and as test fakes.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{KvStore, ObjectEntry, ObjectStore, StorageError};

#[derive(Debug, Default)]
pub struct MemoryBucket {
    objects: RwLock<Vec<ObjectEntry>>,
}

impl MemoryBucket {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_keys(keys: &[String]) -> Self {
        Self {
            objects: RwLock::new(keys.iter().map(ObjectEntry::new).collect()),
        }
    }

    pub async fn insert(&self, entry: ObjectEntry) {
        let mut objects = self.objects.write().await;
        objects.retain(|o| o.key != entry.key);
        objects.push(entry);
    }
}

#[async_trait]
impl ObjectStore for MemoryBucket {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, StorageError> {
        let objects = self.objects.read().await;
        Ok(objects
            .iter()
            .filter(|o| o.key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
