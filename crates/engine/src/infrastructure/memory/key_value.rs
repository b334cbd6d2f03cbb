use async_trait::async_trait;
use dashmap::DashMap;

use crate::infrastructure::ports::{KeyValueStore, RepoError};

/// Process-local stand-in for the shared key-value store.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: DashMap<String, String>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, RepoError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn put_all(&self, entries: Vec<(String, String)>) -> Result<(), RepoError> {
        for (key, value) in entries {
            self.entries.insert(key, value);
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), RepoError> {
        self.entries.remove(key);
        Ok(())
    }
}
