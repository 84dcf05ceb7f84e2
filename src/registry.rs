//! Repository registry for watched repositories and their cached releases.
//!
//! This module provides a unified interface over the two stores:
//! - Synced `repos`: the ordered watch list
//! - Local `<owner>/<repo>`: one [`ReleaseSnapshot`] per repository
//!
//! Mutations inside one process are serialised, so an eviction (snapshot and
//! list entry) is never observed half done by another registry call.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::fetcher::{FetchRelease, fetch_with_fallback};
use crate::model::{ReleaseSnapshot, RepoId, WatchLevel};
use crate::state::KeyWatch;
use crate::store::{StoreArea, Stores, get_typed, set_typed};

pub const REPOS_KEY: &str = "repos";

pub struct Registry {
    stores: Stores,
    fetcher: Arc<dyn FetchRelease>,
    lock: Mutex<()>,
}

impl Registry {
    pub fn new(stores: Stores, fetcher: Arc<dyn FetchRelease>) -> Self {
        Self {
            stores,
            fetcher,
            lock: Mutex::new(()),
        }
    }

    /// The authoritative watch list.
    ///
    /// Repositories that only have a Local snapshot are appended and the
    /// merged list is written back to the Synced store.
    pub async fn list_watched(&self) -> Result<Vec<RepoId>> {
        let _guard = self.lock.lock().await;
        self.reconciled_list().await
    }

    async fn stored_list(&self) -> Result<Vec<String>> {
        Ok(get_typed(&*self.stores.synced, REPOS_KEY)
            .await?
            .unwrap_or_default())
    }

    async fn reconciled_list(&self) -> Result<Vec<RepoId>> {
        let stored = self.stored_list().await?;

        let mut list: Vec<RepoId> = Vec::with_capacity(stored.len());
        for name in &stored {
            match name.parse::<RepoId>() {
                Ok(id) if !list.contains(&id) => list.push(id),
                Ok(_) => {}
                Err(_) => warn!("Dropping invalid watch list entry '{}'", name),
            }
        }

        let local = self.stores.local.get_all().await?;
        for key in local.keys() {
            if let Ok(id) = key.parse::<RepoId>()
                && !list.contains(&id)
            {
                debug!("Adopting {} from local snapshots", id);
                list.push(id);
            }
        }

        let names: Vec<String> = list.iter().map(RepoId::to_string).collect();
        if names != stored {
            self.write_list(&list).await?;
        }
        Ok(list)
    }

    async fn write_list(&self, list: &[RepoId]) -> Result<()> {
        set_typed(&*self.stores.synced, REPOS_KEY, &list)
            .await
            .context("Failed to save watch list")
    }

    /// Cached snapshot, never touching the network.
    pub async fn get_snapshot(&self, id: &RepoId) -> Result<Option<ReleaseSnapshot>> {
        get_typed(&*self.stores.local, &id.to_string()).await
    }

    /// Snapshots for every watched repository, in watch-list order.
    ///
    /// A repository without a cached snapshot is fetched once; if that fails
    /// it is left out of the result and retried by the next caller.
    pub async fn get_all_snapshots(&self) -> Result<Vec<ReleaseSnapshot>> {
        let ids = self.list_watched().await?;
        let mut snapshots = Vec::with_capacity(ids.len());

        for id in ids {
            if let Some(snapshot) = self.get_snapshot(&id).await? {
                snapshots.push(snapshot);
                continue;
            }
            let blank = ReleaseSnapshot::new(id.clone(), WatchLevel::default());
            match self.fetcher.fetch(&blank).await {
                Ok(snapshot) => {
                    self.save(&snapshot).await?;
                    snapshots.push(snapshot);
                }
                Err(e) => warn!("Failed to fetch {}: {}", id, e),
            }
        }

        Ok(snapshots)
    }

    /// Sets the watch level of a repository.
    ///
    /// `WatchLevel::None` evicts the repository and returns `None`. Any other
    /// level updates the stored snapshot, or fetches one for a repository
    /// seen for the first time, and adds it to the watch list.
    #[tracing::instrument(skip(self))]
    pub async fn set_watch(&self, id: &RepoId, level: WatchLevel) -> Result<Option<ReleaseSnapshot>> {
        let _guard = self.lock.lock().await;

        if level == WatchLevel::None {
            self.evict(id).await?;
            return Ok(None);
        }

        let snapshot = match self.get_snapshot(id).await? {
            Some(mut existing) => {
                existing.watching = level;
                existing
            }
            None => fetch_with_fallback(&*self.fetcher, &ReleaseSnapshot::new(id.clone(), level))
                .await
                .with_context(|| format!("Failed to fetch release for {}", id))?,
        };

        set_typed(&*self.stores.local, &id.to_string(), &snapshot).await?;

        let mut list = self.reconciled_list().await?;
        if !list.contains(id) {
            list.push(id.clone());
            self.write_list(&list).await?;
        }

        info!("Watching {} at level {}", id, level);
        Ok(Some(snapshot))
    }

    /// Snapshot goes first: the watch list adopts any orphan Local snapshot,
    /// so removing the list entry first could bring the repository back.
    async fn evict(&self, id: &RepoId) -> Result<()> {
        self.stores
            .local
            .remove(&[id.to_string()])
            .await
            .with_context(|| format!("Failed to remove snapshot of {}", id))?;

        let stored = self.stored_list().await?;
        let name = id.to_string();
        if stored.contains(&name) {
            let remaining: Vec<String> = stored.into_iter().filter(|n| *n != name).collect();
            set_typed(&*self.stores.synced, REPOS_KEY, &remaining).await?;
        }

        info!("Stopped watching {}", id);
        Ok(())
    }

    /// Idempotent upsert of a snapshot.
    pub async fn save(&self, snapshot: &ReleaseSnapshot) -> Result<()> {
        let _guard = self.lock.lock().await;
        set_typed(&*self.stores.local, &snapshot.name.to_string(), snapshot).await
    }

    /// Stores a snapshot produced by a check cycle.
    ///
    /// Skipped (returns `false`) when the repository was unwatched while the
    /// fetch was in flight. A watch level changed in the meantime wins over
    /// the one the fetch started with.
    pub async fn save_fetched(&self, snapshot: &mut ReleaseSnapshot) -> Result<bool> {
        let _guard = self.lock.lock().await;

        let name = snapshot.name.to_string();
        if !self.stored_list().await?.contains(&name) {
            debug!("{} is no longer watched, dropping fetched release", name);
            return Ok(false);
        }
        if let Some(current) = self.get_snapshot(&snapshot.name).await? {
            snapshot.watching = current.watching;
        }
        set_typed(&*self.stores.local, &name, &*snapshot).await?;
        Ok(true)
    }

    /// Stops watching every repository.
    pub async fn remove_all(&self) -> Result<usize> {
        let _guard = self.lock.lock().await;

        let list = self.reconciled_list().await?;
        let keys: Vec<String> = list.iter().map(RepoId::to_string).collect();
        self.stores.local.remove(&keys).await?;
        self.write_list(&[]).await?;

        info!("Stopped watching {} repositories", list.len());
        Ok(list.len())
    }

    /// Watch-list changes committed by any context.
    pub fn watch_repos(&self) -> KeyWatch<Vec<RepoId>> {
        KeyWatch::new(&self.stores, StoreArea::Synced, REPOS_KEY)
    }
}
