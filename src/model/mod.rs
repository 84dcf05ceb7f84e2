//! Domain types shared by every context.

mod schedule;
mod snapshot;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use schedule::{DEFAULT_PERIOD_MINUTES, MAX_PERIOD_MINUTES, ScheduleInfo};
pub use snapshot::{FALLBACK_AVATAR, NEVER_PUBLISHED, ReleaseAsset, ReleaseSnapshot};

/// Repository identifier (owner/repo format).
///
/// Case is preserved exactly as entered; the identifier doubles as the
/// Local store key for the repository's snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoId {
    pub owner: String,
    pub repo: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl FromStr for RepoId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
            anyhow::bail!("Invalid repository format. Expected 'owner/repo'.")
        } else {
            Ok(RepoId {
                owner: parts[0].to_string(),
                repo: parts[1].to_string(),
            })
        }
    }
}

impl Serialize for RepoId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RepoId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// How closely the user follows a repository.
///
/// `None` means tracked-but-silenced or pending removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WatchLevel {
    #[serde(alias = "")]
    None,
    Major,
    Minor,
    #[default]
    All,
}

impl WatchLevel {
    pub fn is_watching(self) -> bool {
        self != WatchLevel::None
    }
}

impl fmt::Display for WatchLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchLevel::None => write!(f, "none"),
            WatchLevel::Major => write!(f, "major"),
            WatchLevel::Minor => write!(f, "minor"),
            WatchLevel::All => write!(f, "all"),
        }
    }
}

impl FromStr for WatchLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "" => Ok(WatchLevel::None),
            "major" => Ok(WatchLevel::Major),
            "minor" => Ok(WatchLevel::Minor),
            "all" => Ok(WatchLevel::All),
            _ => anyhow::bail!(
                "Unknown watch level: {}. Expected none, major, minor, or all.",
                s
            ),
        }
    }
}

/// Upstream source a snapshot was obtained from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FetchMethod {
    #[default]
    Api,
    #[serde(alias = "atom")]
    Feed,
}

impl fmt::Display for FetchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchMethod::Api => write!(f, "api"),
            FetchMethod::Feed => write!(f, "feed"),
        }
    }
}
