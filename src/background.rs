//! Background context: answers requests from other contexts, raises
//! notifications for new releases and keeps the check alarm armed.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};

use crate::auth::{self, Authorizer};
use crate::message::{HandlerId, Message, MessageBus, MessageHandler, Reply};
use crate::model::{ReleaseSnapshot, RepoId, WatchLevel};
use crate::notify::{Notifier, release_message, watching_message};
use crate::registry::Registry;
use crate::scheduler::{Alarm, CycleOutcome, Scheduler, SkipReason, delay_until_due};
use crate::state::StateStore;

pub struct Background {
    registry: Arc<Registry>,
    scheduler: Arc<Scheduler>,
    state: Arc<StateStore>,
    bus: Arc<MessageBus>,
    notifier: Arc<dyn Notifier>,
    authorizer: Arc<dyn Authorizer>,
    alarm: Alarm,
    alarm_fired: Mutex<Option<mpsc::UnboundedReceiver<()>>>,
    handler_id: Mutex<Option<HandlerId>>,
    /// Completed cycles whose release events the listener has handled.
    handled_cycles: watch::Sender<u64>,
}

impl Background {
    pub fn new(
        registry: Arc<Registry>,
        scheduler: Arc<Scheduler>,
        state: Arc<StateStore>,
        bus: Arc<MessageBus>,
        notifier: Arc<dyn Notifier>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        let (alarm, alarm_fired) = Alarm::new();
        Self {
            registry,
            scheduler,
            state,
            bus,
            notifier,
            authorizer,
            alarm,
            alarm_fired: Mutex::new(Some(alarm_fired)),
            handler_id: Mutex::new(None),
            handled_cycles: watch::Sender::new(0),
        }
    }

    /// Registers on the bus and starts listening for release events.
    ///
    /// Does not schedule checks; see [`Background::start_alarm_loop`].
    pub async fn attach(self: &Arc<Self>) -> Result<()> {
        let handler: Arc<dyn MessageHandler> = self.clone();
        let id = self.bus.register(handler);
        if let Ok(mut slot) = self.handler_id.lock() {
            *slot = Some(id);
        }

        let this = self.clone();
        let mut events = self.bus.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(Message::RepoUpdated(snapshot)) => this.on_repo_updated(&snapshot).await,
                    Ok(Message::CheckReposComplete) => {
                        this.handled_cycles.send_modify(|n| *n += 1);
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Release listener skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(())
    }

    /// Arms the alarm from the stored schedule and runs a cycle every time
    /// it fires. A cycle that is already due runs right away.
    ///
    /// Only the long-running process calls this, so a set `isChecking` flag
    /// found here was left by an interrupted cycle.
    pub async fn start_alarm_loop(self: &Arc<Self>) -> Result<()> {
        let fired = self.alarm_fired.lock().ok().and_then(|mut rx| rx.take());
        let Some(mut fired) = fired else {
            anyhow::bail!("Alarm loop already started");
        };

        self.reset_stale_flag().await?;
        self.set_check_alarm().await?;

        let this = self.clone();
        tokio::spawn(async move {
            while fired.recv().await.is_some() {
                debug!("Check alarm fired");
                if let Err(e) = this.check_repos().await {
                    warn!("Check cycle failed: {}", e);
                }
            }
        });
        Ok(())
    }

    /// Unregisters from the bus and cancels the pending alarm.
    pub fn stop(&self) {
        if let Ok(mut slot) = self.handler_id.lock()
            && let Some(id) = slot.take()
        {
            self.bus.unregister(id);
        }
        self.alarm.clear();
    }

    async fn reset_stale_flag(&self) -> Result<()> {
        let mut info = self.state.schedule_info().await?;
        if info.is_checking {
            info!("Resetting check flag left by an interrupted cycle");
            info.is_checking = false;
            self.state.save_schedule_info(&info).await?;
        }
        Ok(())
    }

    /// Runs the cycle now if it is due, otherwise arms the alarm for it.
    pub async fn set_check_alarm(&self) -> Result<()> {
        let info = self.state.schedule_info().await?;
        let delay = delay_until_due(&info, self.state.now_millis());
        if delay.is_zero() {
            self.check_repos().await?;
        } else {
            self.alarm.arm(delay);
        }
        Ok(())
    }

    /// Runs one cycle and re-arms the alarm whatever the outcome.
    ///
    /// A skipped cycle waits a full period rather than retrying at once.
    #[tracing::instrument(skip(self))]
    pub async fn check_repos(&self) -> Result<CycleOutcome> {
        self.alarm.clear();
        let outcome = self.scheduler.run_check_cycle().await;
        let info = self.state.schedule_info().await?;
        let full_period = Duration::from_millis(info.period_millis().max(0) as u64);

        match &outcome {
            Ok(CycleOutcome::Completed(_)) => {
                self.notifier.set_offline(false);
                let delay = delay_until_due(&info, self.state.now_millis());
                self.alarm.arm(if delay.is_zero() { full_period } else { delay });
            }
            Ok(CycleOutcome::Skipped(SkipReason::Offline)) => {
                self.notifier.set_offline(true);
                self.alarm.arm(full_period);
            }
            Ok(CycleOutcome::Skipped(SkipReason::AlreadyChecking)) | Err(_) => {
                self.alarm.arm(full_period);
            }
        }
        outcome
    }

    pub async fn replace_repo(&self, name: &RepoId, watching: WatchLevel) -> Result<Option<ReleaseSnapshot>> {
        let result = self.registry.set_watch(name, watching).await?;
        if result.is_some() {
            self.notifier
                .notify(&name.to_string(), &watching_message(name));
        }
        Ok(result)
    }

    async fn on_repo_updated(&self, snapshot: &ReleaseSnapshot) {
        if let Some(Reply::PopupOpen(true)) = self.bus.send(Message::IsPopupOpen).await {
            debug!("Popup is open, not notifying about {}", snapshot.name);
            return;
        }
        self.notifier
            .notify(&snapshot.name.to_string(), &release_message(snapshot));
        self.notifier.add_unread(1);
    }

    /// Number of completed cycles the release listener has caught up with.
    pub fn handled_cycles(&self) -> u64 {
        *self.handled_cycles.borrow()
    }

    /// Ticks once the release listener has handled every event of a cycle.
    pub fn watch_handled_cycles(&self) -> watch::Receiver<u64> {
        self.handled_cycles.subscribe()
    }

    /// Waits until the release listener has handled `count` completed cycles.
    pub async fn wait_handled_cycles(&self, count: u64) -> Result<()> {
        let mut rx = self.handled_cycles.subscribe();
        rx.wait_for(|n| *n >= count)
            .await
            .map(|_| ())
            .context("Release listener stopped")
    }

    pub fn alarm_armed(&self) -> bool {
        self.alarm.is_armed()
    }
}

fn reply_from<T>(result: Result<T>, ok: impl FnOnce(T) -> Reply) -> Reply {
    match result {
        Ok(value) => ok(value),
        Err(e) => Reply::Failed(format!("{:#}", e)),
    }
}

#[async_trait]
impl MessageHandler for Background {
    async fn handle(&self, message: &Message) -> Option<Reply> {
        match message {
            Message::ReqCheckRepos => Some(reply_from(self.check_repos().await, |_| Reply::Ack)),
            Message::ReplaceRepo { name, watching } => Some(reply_from(
                self.replace_repo(name, *watching).await,
                Reply::Watched,
            )),
            Message::Authorize => Some(reply_from(
                auth::authorize(&*self.authorizer, &self.state).await,
                |_| Reply::Ack,
            )),
            Message::RepoCheckUpdated(_)
            | Message::CheckReposComplete
            | Message::RepoUpdated(_)
            | Message::IsPopupOpen => None,
        }
    }
}
