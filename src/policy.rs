//! Notification Policy: whether a fetched release is worth telling the user about.

use semver::Version;
use std::fmt;

use crate::model::{ReleaseSnapshot, WatchLevel};

/// Most significant component that differs between two versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionDiff {
    Major,
    Minor,
    Patch,
    PreMajor,
    PreMinor,
    PrePatch,
    Prerelease,
}

impl fmt::Display for VersionDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VersionDiff::Major => "major",
            VersionDiff::Minor => "minor",
            VersionDiff::Patch => "patch",
            VersionDiff::PreMajor => "premajor",
            VersionDiff::PreMinor => "preminor",
            VersionDiff::PrePatch => "prepatch",
            VersionDiff::Prerelease => "prerelease",
        };
        write!(f, "{}", s)
    }
}

/// Parses a release tag as a version, accepting a leading `v` or `=`.
pub fn parse_tag(tag: &str) -> Option<Version> {
    let trimmed = tag.trim();
    let bare = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('='))
        .unwrap_or(trimmed);
    Version::parse(bare).ok()
}

/// Difference class between two versions, `None` when they are equal.
///
/// Build metadata is ignored. When either side is a prerelease the class
/// carries the `pre` prefix.
pub fn diff(old: &Version, new: &Version) -> Option<VersionDiff> {
    if old.major == new.major
        && old.minor == new.minor
        && old.patch == new.patch
        && old.pre == new.pre
    {
        return None;
    }

    let prerelease = !old.pre.is_empty() || !new.pre.is_empty();
    Some(if old.major != new.major {
        if prerelease { VersionDiff::PreMajor } else { VersionDiff::Major }
    } else if old.minor != new.minor {
        if prerelease { VersionDiff::PreMinor } else { VersionDiff::Minor }
    } else if old.patch != new.patch {
        if prerelease { VersionDiff::PrePatch } else { VersionDiff::Patch }
    } else {
        VersionDiff::Prerelease
    })
}

/// Whether `new` should raise a user-visible notification, given the
/// previously stored `old` snapshot.
///
/// Tags that do not parse as versions notify on any change.
pub fn should_notify(new: &ReleaseSnapshot, old: &ReleaseSnapshot) -> bool {
    if !new.watching.is_watching() || new.tag_name.is_empty() || new.tag_name == old.tag_name {
        return false;
    }

    let (Some(old_version), Some(new_version)) = (parse_tag(&old.tag_name), parse_tag(&new.tag_name))
    else {
        return true;
    };

    let Some(difference) = diff(&old_version, &new_version) else {
        return false;
    };

    match new.watching {
        WatchLevel::None => false,
        WatchLevel::Major => difference == VersionDiff::Major,
        WatchLevel::Minor => matches!(difference, VersionDiff::Major | VersionDiff::Minor),
        WatchLevel::All => true,
    }
}
