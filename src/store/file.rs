//! JSON-file backed store.
//!
//! The whole store is one JSON object on disk. Every operation re-reads the
//! file so several processes sharing a data directory see each other's
//! commits. A write holds an exclusive lock on a sidecar `.lock` file from
//! load to persist, and replaces the file atomically. The change feed only
//! reports commits made through this instance.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::debug;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::runtime::Runtime;

use super::{ChangeFeed, KvStore, StoreArea, StoreChange};

pub struct FileStore {
    runtime: Arc<dyn Runtime>,
    path: PathBuf,
    write_lock: Mutex<()>,
    feed: ChangeFeed,
}

impl FileStore {
    pub fn new(runtime: Arc<dyn Runtime>, area: StoreArea, path: PathBuf) -> Self {
        Self {
            runtime,
            path,
            write_lock: Mutex::new(()),
            feed: ChangeFeed::new(area),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, Value>> {
        if !self.runtime.exists(&self.path) {
            return Ok(BTreeMap::new());
        }
        let content = self
            .runtime
            .read_to_string(&self.path)
            .with_context(|| format!("Failed to read store file {:?}", self.path))?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse store file {:?}", self.path))
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("json.lock")
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !self.runtime.exists(parent)
        {
            self.runtime.create_dir_all(parent)?;
        }
        Ok(())
    }

    fn persist(&self, data: &BTreeMap<String, Value>) -> Result<()> {
        let content = serde_json::to_string_pretty(data)?;
        self.runtime
            .write_atomic(&self.path, content.as_bytes())
            .with_context(|| format!("Failed to write store file {:?}", self.path))?;

        debug!("Saved {} store to {:?}", self.feed.area, self.path);
        Ok(())
    }

    fn modify<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, Value>) -> Vec<(String, Option<Value>, Option<Value>)>,
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow!("{} store lock poisoned", self.feed.area))?;
        self.ensure_parent()?;
        let _file_lock = self
            .runtime
            .lock_exclusive(&self.lock_path())
            .with_context(|| format!("Failed to lock store file {:?}", self.path))?;

        let mut data = self.load()?;
        let changes = f(&mut data);
        if changes.iter().all(|(_, old, new)| old == new) {
            return Ok(());
        }
        self.persist(&data)?;

        for (key, old, new) in changes {
            self.feed.emit(&key, old, new);
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for FileStore {
    fn area(&self) -> StoreArea {
        self.feed.area
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.load()?.remove(key))
    }

    async fn get_all(&self) -> Result<BTreeMap<String, Value>> {
        self.load()
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.modify(|data| {
            let old = data.insert(key.to_string(), value.clone());
            vec![(key.to_string(), old, Some(value))]
        })
    }

    async fn remove(&self, keys: &[String]) -> Result<()> {
        self.modify(|data| {
            keys.iter()
                .filter_map(|key| data.remove(key).map(|old| (key.clone(), Some(old), None)))
                .collect()
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.feed.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use serde_json::json;
    use std::path::Path;
    use tempfile::tempdir;

    fn file_store(dir: &Path) -> FileStore {
        FileStore::new(
            Arc::new(RealRuntime),
            StoreArea::Local,
            dir.join("data").join("local.json"),
        )
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = tempdir().unwrap();
        let store = file_store(dir.path());
        assert_eq!(store.get("a").await.unwrap(), None);
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_creates_directory_and_persists() {
        let dir = tempdir().unwrap();
        let store = file_store(dir.path());

        store.set("scheduleInfo", json!({"period": 15})).await.unwrap();
        assert!(store.path().exists());
        let mut names: Vec<_> = std::fs::read_dir(store.path().parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, ["local.json", "local.json.lock"]);

        // A second instance sees the same data
        let other = file_store(dir.path());
        assert_eq!(
            other.get("scheduleInfo").await.unwrap(),
            Some(json!({"period": 15}))
        );
    }

    #[tokio::test]
    async fn test_remove_and_change_feed() {
        let dir = tempdir().unwrap();
        let store = file_store(dir.path());
        store.set("a", json!(1)).await.unwrap();
        store.set("b", json!(2)).await.unwrap();

        let mut rx = store.subscribe();
        store
            .remove(&["a".to_string(), "missing".to_string()])
            .await
            .unwrap();

        let change = rx.recv().await.unwrap();
        assert_eq!(change.key, "a");
        assert_eq!(change.area, StoreArea::Local);
        assert_eq!(change.new_value, None);
        assert!(rx.try_recv().is_err());

        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all.get("b"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_error() {
        let dir = tempdir().unwrap();
        let store = file_store(dir.path());
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "not json").unwrap();

        assert!(store.get("a").await.is_err());
        assert!(store.set("a", json!(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_unchanged_write_skips_disk() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| true);
        runtime
            .expect_lock_exclusive()
            .withf(|path| path.ends_with("sync.json.lock"))
            .times(1)
            .returning(|_| Ok(tempfile::tempfile().unwrap()));
        runtime
            .expect_read_to_string()
            .returning(|_| Ok(r#"{"a": 1}"#.to_string()));
        runtime.expect_write_atomic().never();

        let store = FileStore::new(
            Arc::new(runtime),
            StoreArea::Synced,
            PathBuf::from("/data/sync.json"),
        );
        store.set("a", json!(1)).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_two_instances_do_not_lose_writes() {
        let dir = tempdir().unwrap();
        let writers: Vec<_> = ["a", "b"]
            .into_iter()
            .map(|prefix| {
                let store = file_store(dir.path());
                tokio::spawn(async move {
                    for i in 0..50 {
                        store.set(&format!("{prefix}{i}"), json!(i)).await.unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap();
        }

        let all = file_store(dir.path()).get_all().await.unwrap();
        assert_eq!(all.len(), 100);
        assert_eq!(all.get("a49"), Some(&json!(49)));
        assert_eq!(all.get("b0"), Some(&json!(0)));
    }
}
