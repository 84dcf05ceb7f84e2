//! Popup context: a short-lived view over the registry.
//!
//! While open it answers `IS_POPUP_OPEN` so the background does not raise
//! notifications for releases the user is already looking at.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::message::{HandlerId, Message, MessageBus, MessageHandler, Progress, Reply};
use crate::model::{NEVER_PUBLISHED, ReleaseSnapshot, ScheduleInfo};

#[derive(Debug, Default)]
struct ViewState {
    progress: Option<Progress>,
    finished: Option<Progress>,
    updated: Vec<ReleaseSnapshot>,
}

#[derive(Debug, Default)]
pub struct PopupView {
    open: AtomicBool,
    state: Mutex<ViewState>,
}

impl PopupView {
    /// Opens a view and registers it on the bus.
    pub fn open(bus: &MessageBus) -> (Arc<Self>, HandlerId) {
        let view = Arc::new(Self {
            open: AtomicBool::new(true),
            state: Mutex::new(ViewState::default()),
        });
        let handler: Arc<dyn MessageHandler> = view.clone();
        let id = bus.register(handler);
        (view, id)
    }

    pub fn close(&self, bus: &MessageBus, id: HandlerId) {
        self.open.store(false, Ordering::SeqCst);
        bus.unregister(id);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Applies one broadcast event to the view.
    pub fn apply(&self, message: &Message) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        match message {
            Message::RepoCheckUpdated(progress) => state.progress = Some(*progress),
            Message::CheckReposComplete => state.finished = state.progress.take(),
            Message::RepoUpdated(snapshot) => state.updated.push(snapshot.clone()),
            _ => {}
        }
    }

    /// Applies every event already waiting on `events`.
    pub fn drain(&self, events: &mut broadcast::Receiver<Message>) {
        loop {
            match events.try_recv() {
                Ok(message) => self.apply(&message),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    }

    /// Progress of the running cycle, `None` when idle.
    pub fn progress(&self) -> Option<Progress> {
        self.state.lock().ok().and_then(|s| s.progress)
    }

    /// Final counters of the last cycle seen completing.
    pub fn finished(&self) -> Option<Progress> {
        self.state.lock().ok().and_then(|s| s.finished)
    }

    /// Releases announced while this view was open.
    pub fn updated(&self) -> Vec<ReleaseSnapshot> {
        self.state
            .lock()
            .map(|s| s.updated.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MessageHandler for PopupView {
    async fn handle(&self, message: &Message) -> Option<Reply> {
        match message {
            Message::IsPopupOpen if self.is_open() => Some(Reply::PopupOpen(true)),
            _ => None,
        }
    }
}

pub fn format_time(millis: i64) -> String {
    if millis == NEVER_PUBLISHED {
        return "never".to_string();
    }
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// One line per repository: name, tag, publish time and watch level.
pub fn render_rows(snapshots: &[ReleaseSnapshot]) -> Vec<String> {
    let width = snapshots
        .iter()
        .map(|s| s.name.to_string().len())
        .max()
        .unwrap_or(0);

    snapshots
        .iter()
        .map(|s| {
            let tag = if s.has_release() {
                s.tag_name.as_str()
            } else {
                "(no release)"
            };
            format!(
                "{:<width$}  {:<16}  {:<16}  [{}]",
                s.name.to_string(),
                tag,
                format_time(s.published_at),
                s.watching,
                width = width
            )
        })
        .collect()
}

pub fn progress_line(progress: &Progress, total: usize) -> String {
    let mut line = format!("Checked {}/{}", progress.total(), total);
    if progress.failed > 0 {
        line.push_str(&format!(" ({} failed)", progress.failed));
    }
    line
}

pub fn schedule_lines(info: &ScheduleInfo, rate_limit: u64, authorized: bool) -> Vec<String> {
    vec![
        format!("Checking:        {}", if info.is_checking { "yes" } else { "no" }),
        format!("Last check:      {}", format_time(info.last_check)),
        format!("Next check:      {}", format_time(info.next_due())),
        format!("Period:          {} min", info.period),
        format!("Rate limit left: {}", rate_limit),
        format!("Authorized:      {}", if authorized { "yes" } else { "no" }),
    ]
}
