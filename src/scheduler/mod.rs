//! Batch update scheduler - checks every watched repository.
//!
//! A cycle moves the schedule from idle to checking and back:
//! - Skips when a cycle is already running or the network is down
//! - Fetches repositories in batches of [`BATCH_SIZE`], one batch at a time
//! - Broadcasts progress after every repository and a completion event

mod alarm;

use anyhow::Result;
use async_trait::async_trait;
use futures_util::future::join_all;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpStream;

use crate::auth::CredentialCheck;
use crate::error::FetchError;
use crate::fetcher::FetchRelease;
use crate::message::{Message, MessageBus, Progress};
use crate::model::{ReleaseSnapshot, RepoId, WatchLevel};
use crate::policy::should_notify;
use crate::registry::Registry;
use crate::state::StateStore;

pub use alarm::{Alarm, delay_until_due};

/// Maximum number of simultaneous fetches.
pub const BATCH_SIZE: usize = 10;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connectivity: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Considers the device online when a TCP connection to `addr` succeeds.
pub struct TcpConnectivity {
    addr: String,
    timeout: Duration,
}

impl TcpConnectivity {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }

    /// Probes the host and port of an HTTP(S) base URL.
    pub fn for_url(url: &str) -> Result<Self> {
        let parsed = reqwest::Url::parse(url)?;
        let host = parsed
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("URL has no host: {}", url))?;
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| anyhow::anyhow!("URL has no port: {}", url))?;
        Ok(Self::new(format!("{}:{}", host, port), Duration::from_secs(5)))
    }
}

#[async_trait]
impl Connectivity for TcpConnectivity {
    async fn is_online(&self) -> bool {
        matches!(
            tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr)).await,
            Ok(Ok(_))
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyChecking,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Skipped(SkipReason),
    Completed(Progress),
}

pub struct Scheduler {
    registry: Arc<Registry>,
    fetcher: Arc<dyn FetchRelease>,
    state: Arc<StateStore>,
    bus: Arc<MessageBus>,
    connectivity: Arc<dyn Connectivity>,
    credentials: Arc<dyn CredentialCheck>,
}

impl Scheduler {
    pub fn new(
        registry: Arc<Registry>,
        fetcher: Arc<dyn FetchRelease>,
        state: Arc<StateStore>,
        bus: Arc<MessageBus>,
        connectivity: Arc<dyn Connectivity>,
        credentials: Arc<dyn CredentialCheck>,
    ) -> Self {
        Self {
            registry,
            fetcher,
            state,
            bus,
            connectivity,
            credentials,
        }
    }

    /// Runs one check cycle.
    ///
    /// The `isChecking` flag is advisory: two calls racing between the guard
    /// and the flag write can both run.
    #[tracing::instrument(skip(self))]
    pub async fn run_check_cycle(&self) -> Result<CycleOutcome> {
        let mut info = self.state.schedule_info().await?;
        if info.is_checking {
            debug!("A check cycle is already running");
            return Ok(CycleOutcome::Skipped(SkipReason::AlreadyChecking));
        }
        if !self.connectivity.is_online().await {
            info!("Offline, skipping check cycle");
            return Ok(CycleOutcome::Skipped(SkipReason::Offline));
        }

        info.is_checking = true;
        self.state.save_schedule_info(&info).await?;

        let result = self.check_all().await;

        // Re-read so a period changed during the cycle survives.
        let mut info = self.state.schedule_info().await?;
        info.is_checking = false;
        info.last_check = self.state.now_millis();
        self.state.save_schedule_info(&info).await?;
        self.bus.publish(Message::CheckReposComplete);

        let progress = result?;
        info!(
            "Check cycle complete: {} succeeded, {} failed",
            progress.success, progress.failed
        );
        if progress.total() > 0 && progress.success == 0 {
            self.spawn_credential_check();
        }
        Ok(CycleOutcome::Completed(progress))
    }

    async fn check_all(&self) -> Result<Progress> {
        let progress = Mutex::new(Progress::default());
        self.bus.publish(Message::RepoCheckUpdated(Progress::default()));

        let ids = self.registry.list_watched().await?;
        for batch in ids.chunks(BATCH_SIZE) {
            debug!("Checking batch of {}", batch.len());
            join_all(batch.iter().map(|id| self.check_one(id, &progress))).await;
        }

        let done = progress.lock().map(|p| *p).unwrap_or_default();
        Ok(done)
    }

    async fn check_one(&self, id: &RepoId, progress: &Mutex<Progress>) {
        let ok = match self.check_repo(id).await {
            Ok(()) => true,
            Err(e) if e.downcast_ref::<FetchError>().is_some_and(FetchError::is_auth) => {
                warn!("Failed to check {}: {}. Run `ghrn authorize` again.", id, e);
                false
            }
            Err(e) => {
                warn!("Failed to check {}: {}", id, e);
                false
            }
        };

        if let Ok(mut p) = progress.lock() {
            if ok {
                p.success += 1;
            } else {
                p.failed += 1;
            }
            self.bus.publish(Message::RepoCheckUpdated(*p));
        }
    }

    async fn check_repo(&self, id: &RepoId) -> Result<()> {
        let old = self
            .registry
            .get_snapshot(id)
            .await?
            .unwrap_or_else(|| ReleaseSnapshot::new(id.clone(), WatchLevel::default()));

        let mut new = self.fetcher.fetch(&old).await?;

        if new.watching == WatchLevel::None {
            self.registry.set_watch(id, WatchLevel::None).await?;
            return Ok(());
        }

        if self.registry.save_fetched(&mut new).await? && should_notify(&new, &old) {
            info!("{} has a new release {}", id, new.tag_name);
            self.bus.publish(Message::RepoUpdated(new));
        }
        Ok(())
    }

    fn spawn_credential_check(&self) {
        let credentials = self.credentials.clone();
        tokio::spawn(async move {
            if let Err(e) = credentials.verify().await {
                warn!("Credential check failed: {}", e);
            }
        });
    }
}
