//! Typed access to the singleton records shared between contexts.
//!
//! | key | store |
//! |---|---|
//! | `scheduleInfo` | Local |
//! | `rateLimitRemaining` | Local |
//! | `accessToken` | Synced |

use anyhow::Result;
use log::debug;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::model::{MAX_PERIOD_MINUTES, ScheduleInfo};
use crate::runtime::Runtime;
use crate::store::{StoreArea, StoreChange, Stores, get_typed, set_typed};

pub const SCHEDULE_INFO_KEY: &str = "scheduleInfo";
pub const RATE_LIMIT_KEY: &str = "rateLimitRemaining";
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Assumed upstream ceiling while the real remaining count is unknown.
pub const DEFAULT_RATE_LIMIT: u64 = 60;

pub struct StateStore {
    stores: Stores,
    runtime: Arc<dyn Runtime>,
}

impl StateStore {
    pub fn new(stores: Stores, runtime: Arc<dyn Runtime>) -> Self {
        Self { stores, runtime }
    }

    pub fn now_millis(&self) -> i64 {
        self.runtime.now_millis()
    }

    /// Reads the schedule, creating and persisting the default one on first use.
    pub async fn schedule_info(&self) -> Result<ScheduleInfo> {
        if let Some(info) = get_typed(&*self.stores.local, SCHEDULE_INFO_KEY).await? {
            return Ok(info);
        }
        let info = ScheduleInfo::new(self.runtime.now_millis());
        debug!("Initialising schedule info: {:?}", info);
        self.save_schedule_info(&info).await?;
        Ok(info)
    }

    pub async fn save_schedule_info(&self, info: &ScheduleInfo) -> Result<()> {
        set_typed(&*self.stores.local, SCHEDULE_INFO_KEY, info).await
    }

    pub async fn set_period(&self, minutes: u64) -> Result<ScheduleInfo> {
        anyhow::ensure!(minutes > 0, "Check period must be at least one minute");
        anyhow::ensure!(
            minutes <= MAX_PERIOD_MINUTES,
            "Check period must be at most {} minutes (one year)",
            MAX_PERIOD_MINUTES
        );
        let mut info = self.schedule_info().await?;
        info.period = minutes;
        self.save_schedule_info(&info).await?;
        Ok(info)
    }

    pub async fn rate_limit_remaining(&self) -> Result<u64> {
        let value: Option<i64> = get_typed(&*self.stores.local, RATE_LIMIT_KEY).await?;
        Ok(match value {
            Some(n) if n >= 0 => n as u64,
            _ => DEFAULT_RATE_LIMIT,
        })
    }

    pub async fn save_rate_limit_remaining(&self, remaining: u64) -> Result<()> {
        debug!("rate limit remaining: {}", remaining);
        set_typed(&*self.stores.local, RATE_LIMIT_KEY, &remaining).await
    }

    /// Stored credential; an empty string counts as absent.
    pub async fn access_token(&self) -> Result<Option<String>> {
        let token: Option<String> = get_typed(&*self.stores.synced, ACCESS_TOKEN_KEY).await?;
        Ok(token.filter(|t| !t.is_empty()))
    }

    pub async fn save_access_token(&self, token: &str) -> Result<()> {
        set_typed(&*self.stores.synced, ACCESS_TOKEN_KEY, &token).await
    }

    pub async fn remove_access_token(&self) -> Result<()> {
        self.save_access_token("").await
    }

    /// Schedule updates committed by any context sharing these stores.
    pub fn watch_schedule_info(&self) -> KeyWatch<ScheduleInfo> {
        KeyWatch::new(&self.stores, StoreArea::Local, SCHEDULE_INFO_KEY)
    }

    pub fn watch_rate_limit(&self) -> KeyWatch<u64> {
        KeyWatch::new(&self.stores, StoreArea::Local, RATE_LIMIT_KEY)
    }

    pub fn watch_access_token(&self) -> KeyWatch<String> {
        KeyWatch::new(&self.stores, StoreArea::Synced, ACCESS_TOKEN_KEY)
    }
}

/// Change-feed listener narrowed to one key of one store.
pub struct KeyWatch<T> {
    rx: broadcast::Receiver<StoreChange>,
    key: &'static str,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: serde::de::DeserializeOwned> KeyWatch<T> {
    pub(crate) fn new(stores: &Stores, area: StoreArea, key: &'static str) -> Self {
        Self {
            rx: stores.get(area).subscribe(),
            key,
            _marker: std::marker::PhantomData,
        }
    }

    /// Waits for the next committed value. `Ok(None)` means the key was removed.
    /// Returns an error once the store is gone.
    pub async fn changed(&mut self) -> Result<Option<T>> {
        loop {
            match self.rx.recv().await {
                Ok(change) if change.key == self.key => {
                    return match change.new_value {
                        Some(value) => Ok(Some(serde_json::from_value(value)?)),
                        None => Ok(None),
                    };
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Listener for '{}' skipped {} changes", self.key, skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    anyhow::bail!("Store closed while watching '{}'", self.key)
                }
            }
        }
    }
}
