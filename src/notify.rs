//! User-visible notifications and the unread badge.

use log::info;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::model::{ReleaseSnapshot, RepoId};

#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    /// Shows one notification. `id` groups notifications of the same repository.
    fn notify(&self, id: &str, message: &str);

    /// Adds to the unread counter and returns the new total.
    fn add_unread(&self, count: u32) -> u32;

    fn set_offline(&self, offline: bool);

    /// Resets the unread counter and offline state.
    fn clear(&self);
}

pub fn release_message(snapshot: &ReleaseSnapshot) -> String {
    format!("{} has just updated to {}.", snapshot.name, snapshot.tag_name)
}

pub fn watching_message(name: &RepoId) -> String {
    format!("Start watching {} for releases", name)
}

/// Prints notifications to stdout and keeps the badge in memory.
#[derive(Debug, Default)]
pub struct ConsoleNotifier {
    unread: AtomicU32,
    offline: AtomicBool,
}

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unread(&self) -> u32 {
        self.unread.load(Ordering::SeqCst)
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    /// Badge text: `off` while offline, the unread count otherwise, empty at zero.
    pub fn badge(&self) -> String {
        if self.is_offline() {
            return "off".to_string();
        }
        match self.unread() {
            0 => String::new(),
            n => n.to_string(),
        }
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, id: &str, message: &str) {
        info!("notification [{}]", id);
        println!("{}", message);
    }

    fn add_unread(&self, count: u32) -> u32 {
        self.unread.fetch_add(count, Ordering::SeqCst).saturating_add(count)
    }

    fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn clear(&self) {
        self.unread.store(0, Ordering::SeqCst);
        self.offline.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WatchLevel;

    #[test]
    fn test_messages() {
        let mut snapshot = ReleaseSnapshot::new(RepoId::new("octocat", "Hello-World"), WatchLevel::All);
        snapshot.tag_name = "v2.0.0".into();
        assert_eq!(
            release_message(&snapshot),
            "octocat/Hello-World has just updated to v2.0.0."
        );
        assert_eq!(
            watching_message(&snapshot.name),
            "Start watching octocat/Hello-World for releases"
        );
    }

    #[test]
    fn test_badge() {
        let notifier = ConsoleNotifier::new();
        assert_eq!(notifier.badge(), "");

        assert_eq!(notifier.add_unread(1), 1);
        assert_eq!(notifier.add_unread(2), 3);
        assert_eq!(notifier.badge(), "3");

        notifier.set_offline(true);
        assert_eq!(notifier.badge(), "off");

        notifier.clear();
        assert_eq!(notifier.badge(), "");
        assert!(!notifier.is_offline());
    }
}
