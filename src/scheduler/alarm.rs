//! One-shot check alarm.

use log::debug;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::model::ScheduleInfo;

/// Time left until the next cycle is due, zero when already due.
pub fn delay_until_due(info: &ScheduleInfo, now: i64) -> Duration {
    let remaining = info.next_due().saturating_sub(now);
    if remaining <= 0 {
        Duration::ZERO
    } else {
        Duration::from_millis(remaining as u64)
    }
}

/// A single pending timer. Arming replaces whatever was pending, so at most
/// one timer is ever live.
pub struct Alarm {
    fire: mpsc::UnboundedSender<()>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Alarm {
    /// Returns the alarm and the receiver that gets one `()` per firing.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<()>) {
        let (fire, rx) = mpsc::unbounded_channel();
        (
            Self {
                fire,
                pending: Mutex::new(None),
            },
            rx,
        )
    }

    /// Cancels the pending timer, if any.
    pub fn clear(&self) {
        if let Ok(mut pending) = self.pending.lock()
            && let Some(handle) = pending.take()
        {
            handle.abort();
        }
    }

    pub fn arm(&self, delay: Duration) {
        let Ok(mut pending) = self.pending.lock() else {
            return;
        };
        if let Some(handle) = pending.take() {
            handle.abort();
        }

        debug!("Alarm armed for {:?}", delay);
        let fire = self.fire.clone();
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = fire.send(());
        }));
    }

    pub fn is_armed(&self) -> bool {
        self.pending
            .lock()
            .map(|p| p.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }
}

impl Drop for Alarm {
    fn drop(&mut self) {
        self.clear();
    }
}
