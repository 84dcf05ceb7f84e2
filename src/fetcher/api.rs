//! Structured GitHub API source (`/repos/{owner}/{repo}/releases/latest`).

use chrono::DateTime;
use reqwest::StatusCode;

use crate::error::FetchError;
use crate::http::{HttpResponse, classify_status};
use crate::model::{FetchMethod, NEVER_PUBLISHED, ReleaseAsset, ReleaseSnapshot};

use super::icons::icon_for;

pub const API_ACCEPT: &str = "application/vnd.github.v3+json";

/// GitHub API response types (internal).
mod wire {
    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    pub struct Release {
        #[serde(default)]
        pub html_url: String,
        pub tag_name: String,
        pub published_at: Option<String>,
        pub zipball_url: Option<String>,
        pub tarball_url: Option<String>,
        pub author: Option<Author>,
        #[serde(default)]
        pub assets: Vec<Asset>,
    }

    #[derive(Deserialize, Debug)]
    pub struct Author {
        #[serde(default)]
        pub avatar_url: String,
        #[serde(default)]
        pub html_url: String,
    }

    #[derive(Deserialize, Debug)]
    pub struct Asset {
        pub name: String,
        pub browser_download_url: String,
    }
}

pub fn latest_release_url(api_url: &str, snapshot: &ReleaseSnapshot) -> String {
    format!(
        "{}/repos/{}/{}/releases/latest",
        api_url, snapshot.name.owner, snapshot.name.repo
    )
}

/// Turns one API response into the next snapshot for `previous`.
pub fn snapshot_from_response(
    previous: &ReleaseSnapshot,
    response: HttpResponse,
    web_url: &str,
) -> Result<ReleaseSnapshot, FetchError> {
    match response.status {
        StatusCode::NOT_MODIFIED => Ok(previous.clone()),
        // No release published yet, releases emptied, or repository gone
        StatusCode::NOT_FOUND => {
            let mut snapshot = previous.without_release(FetchMethod::Api, web_url);
            snapshot.etag = response.etag;
            snapshot.last_modified = response.last_modified;
            Ok(snapshot)
        }
        s if s.is_success() => {
            let release: wire::Release = serde_json::from_str(&response.body)
                .map_err(|e| FetchError::Parse(e.to_string()))?;

            let published_at = match release.published_at.as_deref() {
                Some(ts) => DateTime::parse_from_rfc3339(ts)
                    .map_err(|e| FetchError::Parse(format!("published_at '{}': {}", ts, e)))?
                    .timestamp_millis(),
                None => NEVER_PUBLISHED,
            };
            let (avatar_url, author_url) = match release.author {
                Some(author) => (author.avatar_url, author.html_url),
                None => (
                    previous.avatar_url_or_default(),
                    previous.author_url_or_default(web_url),
                ),
            };

            Ok(ReleaseSnapshot {
                name: previous.name.clone(),
                watching: previous.watching,
                method: FetchMethod::Api,
                etag: response.etag,
                last_modified: response.last_modified,
                avatar_url,
                author_url,
                html_url: release.html_url,
                published_at,
                tag_name: release.tag_name,
                zipball_url: release.zipball_url.unwrap_or_default(),
                tarball_url: release.tarball_url.unwrap_or_default(),
                assets: release
                    .assets
                    .into_iter()
                    .map(|a| ReleaseAsset {
                        icon_name: icon_for(&a.name).to_string(),
                        browser_download_url: a.browser_download_url,
                        name: a.name,
                    })
                    .collect(),
            })
        }
        s => Err(classify_status(
            s,
            response.rate_limit_remaining,
            &response.body,
        )),
    }
}
