use serde::{Deserialize, Deserializer, Serialize};

use super::{FetchMethod, RepoId, WatchLevel};

/// `published_at` value meaning "never published".
pub const NEVER_PUBLISHED: i64 = 0;

/// Grey 1x1 GIF shown when a repository has no known avatar.
pub const FALLBACK_AVATAR: &str =
    "data:image/gif;base64,R0lGODlhAQABAIAAAMLCwgAAACH5BAAAAAAALAAAAAABAAEAAAICRAEAOw==";

/// Deserialize a string that may be null as empty string
fn deserialize_nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

/// A downloadable file attached to a release.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ReleaseAsset {
    #[serde(default)]
    pub browser_download_url: String,
    pub name: String,
    /// Icon category derived from the file extension
    #[serde(default)]
    pub icon_name: String,
}

/// Cached view of a repository's latest known release.
///
/// An empty `tag_name` together with `published_at == NEVER_PUBLISHED`
/// means the repository has no releases yet, which is a valid state and
/// not a fetch failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseSnapshot {
    pub name: RepoId,
    #[serde(default)]
    pub watching: WatchLevel,
    #[serde(default)]
    pub method: FetchMethod,
    /// Opaque validator for `If-None-Match`
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub etag: String,
    /// RFC 2822 timestamp for `If-Modified-Since`
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub last_modified: String,
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub avatar_url: String,
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub author_url: String,
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub html_url: String,
    /// Epoch milliseconds
    #[serde(default)]
    pub published_at: i64,
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub tag_name: String,
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub zipball_url: String,
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub tarball_url: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl ReleaseSnapshot {
    /// A snapshot that only knows its identity, used before the first fetch.
    pub fn new(name: RepoId, watching: WatchLevel) -> Self {
        Self {
            name,
            watching,
            method: FetchMethod::Api,
            etag: String::new(),
            last_modified: String::new(),
            avatar_url: String::new(),
            author_url: String::new(),
            html_url: String::new(),
            published_at: NEVER_PUBLISHED,
            tag_name: String::new(),
            zipball_url: String::new(),
            tarball_url: String::new(),
            assets: Vec::new(),
        }
    }

    /// Same repository, but switched to another fetch source with no
    /// cache tokens.
    pub fn with_method(&self, method: FetchMethod) -> Self {
        Self {
            method,
            etag: String::new(),
            last_modified: String::new(),
            ..self.clone()
        }
    }

    pub fn has_release(&self) -> bool {
        !self.tag_name.is_empty()
    }

    /// The "no release yet" snapshot for this repository.
    ///
    /// Previously known avatar and URLs are inherited so a transient 404
    /// does not regress them; otherwise `web_url` based defaults are used.
    pub fn without_release(&self, method: FetchMethod, web_url: &str) -> Self {
        Self {
            name: self.name.clone(),
            watching: self.watching,
            method,
            etag: String::new(),
            last_modified: String::new(),
            avatar_url: self.avatar_url_or_default(),
            author_url: self.author_url_or_default(web_url),
            html_url: self.html_url_or_default(web_url),
            published_at: NEVER_PUBLISHED,
            tag_name: String::new(),
            zipball_url: String::new(),
            tarball_url: String::new(),
            assets: Vec::new(),
        }
    }

    pub(crate) fn avatar_url_or_default(&self) -> String {
        if self.avatar_url.is_empty() {
            FALLBACK_AVATAR.to_string()
        } else {
            self.avatar_url.clone()
        }
    }

    pub(crate) fn author_url_or_default(&self, web_url: &str) -> String {
        if self.author_url.is_empty() {
            format!("{}/{}", web_url, self.name.owner)
        } else {
            self.author_url.clone()
        }
    }

    pub(crate) fn html_url_or_default(&self, web_url: &str) -> String {
        if self.html_url.is_empty() {
            format!("{}/{}", web_url, self.name)
        } else {
            self.html_url.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_snapshot_has_no_release() {
        let snapshot = ReleaseSnapshot::new(RepoId::new("o", "r"), WatchLevel::All);
        assert!(!snapshot.has_release());
        assert_eq!(snapshot.published_at, NEVER_PUBLISHED);
        assert_eq!(snapshot.method, FetchMethod::Api);
    }

    #[test]
    fn test_without_release_uses_defaults_when_unknown() {
        let snapshot = ReleaseSnapshot::new(RepoId::new("octocat", "Hello-World"), WatchLevel::Minor);
        let empty = snapshot.without_release(FetchMethod::Api, "https://github.com");

        assert_eq!(empty.watching, WatchLevel::Minor);
        assert_eq!(empty.avatar_url, FALLBACK_AVATAR);
        assert_eq!(empty.author_url, "https://github.com/octocat");
        assert_eq!(empty.html_url, "https://github.com/octocat/Hello-World");
        assert!(!empty.has_release());
    }

    #[test]
    fn test_without_release_inherits_known_urls() {
        let mut snapshot = ReleaseSnapshot::new(RepoId::new("o", "r"), WatchLevel::All);
        snapshot.avatar_url = "https://avatars/1".into();
        snapshot.author_url = "https://github.com/someone".into();
        snapshot.html_url = "https://github.com/o/r/releases/tag/v1".into();
        snapshot.tag_name = "v1".into();
        snapshot.published_at = 1_000;

        let empty = snapshot.without_release(FetchMethod::Feed, "https://github.com");
        assert_eq!(empty.avatar_url, "https://avatars/1");
        assert_eq!(empty.author_url, "https://github.com/someone");
        assert_eq!(empty.html_url, "https://github.com/o/r/releases/tag/v1");
        assert_eq!(empty.tag_name, "");
        assert_eq!(empty.published_at, NEVER_PUBLISHED);
        assert_eq!(empty.method, FetchMethod::Feed);
    }

    #[test]
    fn test_deserialize_legacy_record() {
        let json = r#"{
            "name": "octocat/Hello-World",
            "watching": "",
            "method": "atom",
            "etag": null,
            "published_at": 1361993732000,
            "tag_name": "v1.0.0",
            "assets": [{"name": "example.zip", "browser_download_url": "https://x/example.zip"}]
        }"#;
        let snapshot: ReleaseSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.watching, WatchLevel::None);
        assert_eq!(snapshot.method, FetchMethod::Feed);
        assert_eq!(snapshot.etag, "");
        assert_eq!(snapshot.assets[0].icon_name, "");
    }
}
