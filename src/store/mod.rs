//! Key-value store adapter.
//!
//! Two logical stores back all shared state: `Synced` (small, meant to follow
//! the user across devices) and `Local` (device-only). Each one publishes a
//! change feed keyed by top-level field name. Events on one store arrive in
//! write order; nothing is guaranteed across the two stores.

mod file;
mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Capacity of each store's change feed before slow subscribers lag.
pub const CHANGE_FEED_CAPACITY: usize = 256;

/// Which of the two stores a value lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreArea {
    Synced,
    Local,
}

impl fmt::Display for StoreArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreArea::Synced => write!(f, "sync"),
            StoreArea::Local => write!(f, "local"),
        }
    }
}

/// One committed change to a single key.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreChange {
    pub area: StoreArea,
    pub key: String,
    pub old_value: Option<Value>,
    /// `None` when the key was removed
    pub new_value: Option<Value>,
}

#[async_trait]
pub trait KvStore: Send + Sync {
    fn area(&self) -> StoreArea;

    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn get_all(&self) -> Result<BTreeMap<String, Value>>;

    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Removes every listed key in one commit. Missing keys are ignored.
    async fn remove(&self, keys: &[String]) -> Result<()>;

    /// Subscribe to changes committed after this call.
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

/// Typed helpers layered over the JSON values of a [`KvStore`].
pub async fn get_typed<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Result<Option<T>> {
    match store.get(key).await? {
        Some(Value::Null) | None => Ok(None),
        Some(value) => Ok(Some(serde_json::from_value(value).map_err(|e| {
            anyhow::anyhow!("Malformed value for '{}' in {} store: {}", key, store.area(), e)
        })?)),
    }
}

pub async fn set_typed<T: Serialize + Sync>(store: &dyn KvStore, key: &str, value: &T) -> Result<()> {
    store.set(key, serde_json::to_value(value)?).await
}

/// The pair of stores shared by every context.
#[derive(Clone)]
pub struct Stores {
    pub synced: Arc<dyn KvStore>,
    pub local: Arc<dyn KvStore>,
}

impl Stores {
    pub fn new(synced: Arc<dyn KvStore>, local: Arc<dyn KvStore>) -> Self {
        Self { synced, local }
    }

    /// Two fresh in-memory stores.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStore::new(StoreArea::Synced)),
            Arc::new(MemoryStore::new(StoreArea::Local)),
        )
    }

    pub fn get(&self, area: StoreArea) -> &Arc<dyn KvStore> {
        match area {
            StoreArea::Synced => &self.synced,
            StoreArea::Local => &self.local,
        }
    }
}

/// Broadcast side of a change feed. Publishing with no subscriber is fine.
#[derive(Debug)]
pub(crate) struct ChangeFeed {
    area: StoreArea,
    sender: broadcast::Sender<StoreChange>,
}

impl ChangeFeed {
    pub(crate) fn new(area: StoreArea) -> Self {
        let (sender, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { area, sender }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.sender.subscribe()
    }

    pub(crate) fn emit(&self, key: &str, old_value: Option<Value>, new_value: Option<Value>) {
        if old_value == new_value {
            return;
        }
        let _ = self.sender.send(StoreChange {
            area: self.area,
            key: key.to_string(),
            old_value,
            new_value,
        });
    }
}
