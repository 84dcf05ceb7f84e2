//! Release Fetcher: one repository's latest release from either source.

pub mod api;
pub mod feed;
pub mod icons;

use async_trait::async_trait;
use log::{debug, warn};
use std::sync::Arc;

use crate::error::FetchError;
use crate::http::{ConditionalRequest, HttpClient, HttpResponse};
use crate::model::{FetchMethod, ReleaseSnapshot};
use crate::state::StateStore;

pub use icons::icon_for;

/// Fetches the next snapshot for a repository. Never retries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FetchRelease: Send + Sync {
    async fn fetch(&self, snapshot: &ReleaseSnapshot) -> Result<ReleaseSnapshot, FetchError>;
}

pub struct ReleaseFetcher {
    http: HttpClient,
    api_url: String,
    web_url: String,
    state: Arc<StateStore>,
}

impl ReleaseFetcher {
    pub fn new(
        http: HttpClient,
        api_url: impl Into<String>,
        web_url: impl Into<String>,
        state: Arc<StateStore>,
    ) -> Self {
        Self {
            http,
            api_url: api_url.into(),
            web_url: web_url.into(),
            state,
        }
    }

    async fn token(&self) -> Option<String> {
        match self.state.access_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!("Failed to read access token: {}", e);
                None
            }
        }
    }

    /// Stores the upstream quota whenever the response carried a positive one.
    async fn report_rate_limit(&self, response: &HttpResponse) {
        if let Some(remaining) = response.rate_limit_remaining
            && remaining > 0
            && let Err(e) = self.state.save_rate_limit_remaining(remaining as u64).await
        {
            warn!("Failed to save rate limit: {}", e);
        }
    }

    async fn fetch_api(&self, snapshot: &ReleaseSnapshot) -> Result<ReleaseSnapshot, FetchError> {
        let url = api::latest_release_url(&self.api_url, snapshot);
        let token = self.token().await;
        let response = self
            .http
            .conditional_get(
                &url,
                &ConditionalRequest {
                    accept: Some(api::API_ACCEPT),
                    token: token.as_deref(),
                    etag: &snapshot.etag,
                    last_modified: &snapshot.last_modified,
                },
            )
            .await?;
        self.report_rate_limit(&response).await;
        api::snapshot_from_response(snapshot, response, &self.web_url)
    }

    async fn fetch_feed(&self, snapshot: &ReleaseSnapshot) -> Result<ReleaseSnapshot, FetchError> {
        let url = feed::feed_url(&self.web_url, snapshot);
        let response = self
            .http
            .conditional_get(
                &url,
                &ConditionalRequest {
                    accept: Some(feed::FEED_ACCEPT),
                    ..Default::default()
                },
            )
            .await?;
        self.report_rate_limit(&response).await;
        feed::snapshot_from_response(snapshot, response, &self.web_url)
    }
}

#[async_trait]
impl FetchRelease for ReleaseFetcher {
    #[tracing::instrument(skip(self, snapshot), fields(repo = %snapshot.name))]
    async fn fetch(&self, snapshot: &ReleaseSnapshot) -> Result<ReleaseSnapshot, FetchError> {
        debug!("Fetching {} via {:?}", snapshot.name, snapshot.method);
        match snapshot.method {
            FetchMethod::Api => self.fetch_api(snapshot).await,
            FetchMethod::Feed => self.fetch_feed(snapshot).await,
        }
    }
}

/// API first; when that fails or finds no tag, one attempt via the feed.
///
/// If both attempts fail the API error is returned. A feed error after a
/// tagless API answer keeps the API answer.
pub async fn fetch_with_fallback(
    fetcher: &dyn FetchRelease,
    snapshot: &ReleaseSnapshot,
) -> Result<ReleaseSnapshot, FetchError> {
    let api_result = fetcher.fetch(&snapshot.with_method(FetchMethod::Api)).await;
    if let Ok(found) = &api_result
        && found.has_release()
    {
        return api_result;
    }

    debug!("Falling back to release feed for {}", snapshot.name);
    match fetcher.fetch(&snapshot.with_method(FetchMethod::Feed)).await {
        Ok(found) => Ok(found),
        Err(feed_error) => {
            debug!("Feed fallback failed for {}: {}", snapshot.name, feed_error);
            api_result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RepoId, WatchLevel};
    use crate::runtime::MockRuntime;
    use crate::state::RATE_LIMIT_KEY;
    use crate::store::Stores;
    use mockall::predicate::function;

    fn fetcher_for(url: &str) -> (ReleaseFetcher, Arc<StateStore>, Stores) {
        let mut runtime = MockRuntime::new();
        runtime.expect_now_millis().returning(|| 0);
        let stores = Stores::in_memory();
        let state = Arc::new(StateStore::new(stores.clone(), Arc::new(runtime)));
        let fetcher = ReleaseFetcher::new(
            HttpClient::new(reqwest::Client::new()),
            url,
            url,
            state.clone(),
        );
        (fetcher, state, stores)
    }

    fn hello_world() -> ReleaseSnapshot {
        ReleaseSnapshot::new(RepoId::new("octocat", "Hello-World"), WatchLevel::All)
    }

    #[tokio::test]
    async fn test_unchanged_release_returns_input() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();
        let _mock = server
            .mock("GET", "/repos/octocat/Hello-World/releases/latest")
            .match_header("if-none-match", r#"W/"abc""#)
            .with_status(304)
            .with_header("x-ratelimit-remaining", "4998")
            .create_async()
            .await;

        let (fetcher, state, _) = fetcher_for(&url);
        let mut cached = hello_world();
        cached.etag = r#"W/"abc""#.into();
        cached.tag_name = "v1.0.0".into();
        cached.published_at = 1_000;

        let result = fetcher.fetch(&cached).await.unwrap();
        assert_eq!(result, cached);
        assert_eq!(state.rate_limit_remaining().await.unwrap(), 4998);
    }

    #[tokio::test]
    async fn test_rate_limit_reported_on_error_but_not_zero() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();
        let failing = server
            .mock("GET", "/repos/octocat/Hello-World/releases/latest")
            .with_status(500)
            .with_header("x-ratelimit-remaining", "17")
            .create_async()
            .await;

        let (fetcher, state, stores) = fetcher_for(&url);
        let result = fetcher.fetch(&hello_world()).await;
        assert_eq!(result, Err(FetchError::Status(500)));
        assert_eq!(state.rate_limit_remaining().await.unwrap(), 17);

        failing.remove_async().await;
        let _limited = server
            .mock("GET", "/repos/octocat/Hello-World/releases/latest")
            .with_status(403)
            .with_header("x-ratelimit-remaining", "0")
            .create_async()
            .await;
        let result = fetcher.fetch(&hello_world()).await;
        assert_eq!(result, Err(FetchError::RateLimited));
        assert_eq!(
            stores.local.get(RATE_LIMIT_KEY).await.unwrap(),
            Some(serde_json::json!(17))
        );
    }

    #[tokio::test]
    async fn test_sends_stored_token() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();
        let mock = server
            .mock("GET", "/repos/octocat/Hello-World/releases/latest")
            .match_header("authorization", "Bearer gho_token")
            .match_header("accept", api::API_ACCEPT)
            .with_status(404)
            .create_async()
            .await;

        let (fetcher, state, _) = fetcher_for(&url);
        state.save_access_token("gho_token").await.unwrap();

        let result = fetcher.fetch(&hello_world()).await.unwrap();
        mock.assert_async().await;
        assert!(!result.has_release());
    }

    #[tokio::test]
    async fn test_feed_method_hits_feed() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();
        let mock = server
            .mock("GET", "/octocat/Hello-World/releases.atom")
            .match_header("authorization", mockito::Matcher::Missing)
            .with_status(200)
            .with_body(
                r#"<feed><entry><id>tag:github.com,2008:Repository/1/v3.1.0</id></entry></feed>"#,
            )
            .create_async()
            .await;

        let (fetcher, _, _) = fetcher_for(&url);
        let snapshot = hello_world().with_method(FetchMethod::Feed);
        let result = fetcher.fetch(&snapshot).await.unwrap();

        mock.assert_async().await;
        assert_eq!(result.tag_name, "v3.1.0");
        assert_eq!(result.method, FetchMethod::Feed);
    }

    #[tokio::test]
    async fn test_fallback_not_used_when_api_has_tag() {
        let mut fetcher = MockFetchRelease::new();
        fetcher
            .expect_fetch()
            .with(function(|s: &ReleaseSnapshot| s.method == FetchMethod::Api))
            .times(1)
            .returning(|s| {
                let mut found = s.clone();
                found.tag_name = "v1.0.0".into();
                Ok(found)
            });
        fetcher
            .expect_fetch()
            .with(function(|s: &ReleaseSnapshot| s.method == FetchMethod::Feed))
            .never();

        let result = fetch_with_fallback(&fetcher, &hello_world()).await.unwrap();
        assert_eq!(result.tag_name, "v1.0.0");
    }

    #[tokio::test]
    async fn test_fallback_to_feed_when_api_fails() {
        let mut fetcher = MockFetchRelease::new();
        fetcher
            .expect_fetch()
            .with(function(|s: &ReleaseSnapshot| s.method == FetchMethod::Api))
            .times(1)
            .returning(|_| Err(FetchError::Forbidden));
        fetcher
            .expect_fetch()
            .with(function(|s: &ReleaseSnapshot| s.method == FetchMethod::Feed))
            .times(1)
            .returning(|s| {
                let mut found = s.clone();
                found.tag_name = "v2.0.0".into();
                Ok(found)
            });

        let result = fetch_with_fallback(&fetcher, &hello_world()).await.unwrap();
        assert_eq!(result.tag_name, "v2.0.0");
        assert_eq!(result.method, FetchMethod::Feed);
    }

    #[tokio::test]
    async fn test_fallback_keeps_tagless_api_answer_when_feed_fails() {
        let mut fetcher = MockFetchRelease::new();
        fetcher
            .expect_fetch()
            .with(function(|s: &ReleaseSnapshot| s.method == FetchMethod::Api))
            .returning(|s| Ok(s.clone()));
        fetcher
            .expect_fetch()
            .with(function(|s: &ReleaseSnapshot| s.method == FetchMethod::Feed))
            .returning(|_| Err(FetchError::Network("offline".into())));

        let result = fetch_with_fallback(&fetcher, &hello_world()).await.unwrap();
        assert!(!result.has_release());
        assert_eq!(result.method, FetchMethod::Api);
    }

    #[tokio::test]
    async fn test_fallback_returns_api_error_when_both_fail() {
        let mut fetcher = MockFetchRelease::new();
        fetcher
            .expect_fetch()
            .with(function(|s: &ReleaseSnapshot| s.method == FetchMethod::Api))
            .returning(|_| Err(FetchError::RateLimited));
        fetcher
            .expect_fetch()
            .with(function(|s: &ReleaseSnapshot| s.method == FetchMethod::Feed))
            .returning(|_| Err(FetchError::Status(502)));

        let result = fetch_with_fallback(&fetcher, &hello_world()).await;
        assert_eq!(result, Err(FetchError::RateLimited));
    }
}
