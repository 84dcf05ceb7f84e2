//! In-memory store, used by tests and by single-process embedding.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tokio::sync::broadcast;

use super::{ChangeFeed, KvStore, StoreArea, StoreChange};

pub struct MemoryStore {
    data: Mutex<BTreeMap<String, Value>>,
    feed: ChangeFeed,
}

impl MemoryStore {
    pub fn new(area: StoreArea) -> Self {
        Self {
            data: Mutex::new(BTreeMap::new()),
            feed: ChangeFeed::new(area),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Value>>> {
        self.data
            .lock()
            .map_err(|_| anyhow!("{} store lock poisoned", self.feed.area))
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    fn area(&self) -> StoreArea {
        self.feed.area
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn get_all(&self) -> Result<BTreeMap<String, Value>> {
        Ok(self.lock()?.clone())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut data = self.lock()?;
        let old = data.insert(key.to_string(), value.clone());
        // Emitted under the lock so subscribers see commits in write order
        self.feed.emit(key, old, Some(value));
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<()> {
        let mut data = self.lock()?;
        for key in keys {
            if let Some(old) = data.remove(key) {
                self.feed.emit(key, Some(old), None);
            }
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.feed.subscribe()
    }
}
