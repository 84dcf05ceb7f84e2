//! Messages exchanged between the background, popup and content contexts.
//!
//! Every topic is one variant of [`Message`]; the JSON form is tagged by a
//! `type` field so a message can cross a process boundary unchanged.

mod bus;

use serde::{Deserialize, Serialize};

use crate::model::{ReleaseSnapshot, RepoId, WatchLevel};

pub use bus::{HandlerId, MessageBus, MessageHandler};

#[cfg(test)]
pub use bus::MockMessageHandler;

/// Running counters of one check cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    pub success: usize,
    pub failed: usize,
}

impl Progress {
    pub fn total(&self) -> usize {
        self.success + self.failed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// any → background: run a check cycle now
    ReqCheckRepos,
    /// background → all: progress tick
    RepoCheckUpdated(Progress),
    /// background → all: cycle finished
    CheckReposComplete,
    /// content/popup → background: set watch level
    ReplaceRepo { name: RepoId, watching: WatchLevel },
    /// background → popup/content: new release detected
    RepoUpdated(ReleaseSnapshot),
    /// background → popup: answered with `Reply::PopupOpen(true)` while a popup is open
    IsPopupOpen,
    /// popup → background: start the authorization flow
    Authorize,
}

impl Message {
    pub fn topic(&self) -> &'static str {
        match self {
            Message::ReqCheckRepos => "REQ_CHECK_REPOS",
            Message::RepoCheckUpdated(_) => "REPO_CHECK_UPDATED",
            Message::CheckReposComplete => "CHECK_REPOS_COMPLETE",
            Message::ReplaceRepo { .. } => "REPLACE_REPO",
            Message::RepoUpdated(_) => "REPO_UPDATED",
            Message::IsPopupOpen => "IS_POPUP_OPEN",
            Message::Authorize => "AUTHORIZE",
        }
    }
}

/// Response to a message sent with [`MessageBus::send`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Reply {
    Ack,
    PopupOpen(bool),
    /// Result of `REPLACE_REPO`; `None` when the repository was evicted
    Watched(Option<ReleaseSnapshot>),
    Failed(String),
}
