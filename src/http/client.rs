//! HTTP client for conditional GET requests.

use log::debug;
use reqwest::header::{ACCEPT, ETAG, HeaderMap, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::{Client, StatusCode};

use crate::error::FetchError;

use super::status::RATE_LIMIT_REMAINING_HEADER;

/// Cache validators and credentials attached to one request.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionalRequest<'a> {
    pub accept: Option<&'a str>,
    pub token: Option<&'a str>,
    /// Sent as `If-None-Match` when non-empty
    pub etag: &'a str,
    /// Sent as `If-Modified-Since` when non-empty
    pub last_modified: &'a str,
}

/// Status, cache validators and body of a completed request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub etag: String,
    pub last_modified: String,
    pub rate_limit_remaining: Option<i64>,
    /// Empty for `304 Not Modified`
    pub body: String,
}

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a new HTTP client wrapping the given reqwest Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Performs a single GET, adding conditional headers for every non-empty
    /// validator. Any completed exchange is `Ok`, whatever its status;
    /// only transport failures are errors.
    #[tracing::instrument(skip(self, request))]
    pub async fn conditional_get(
        &self,
        url: &str,
        request: &ConditionalRequest<'_>,
    ) -> Result<HttpResponse, FetchError> {
        let mut builder = self.client.get(url);
        if let Some(accept) = request.accept {
            builder = builder.header(ACCEPT, accept);
        }
        if let Some(token) = request.token {
            builder = builder.bearer_auth(token);
        }
        if !request.etag.is_empty() {
            builder = builder.header(IF_NONE_MATCH, request.etag);
        }
        if !request.last_modified.is_empty() {
            builder = builder.header(IF_MODIFIED_SINCE, request.last_modified);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        debug!("Server response {} for {}", status.as_u16(), url);

        let headers = response.headers();
        let etag = header_string(headers, ETAG.as_str());
        let last_modified = header_string(headers, LAST_MODIFIED.as_str());
        let rate_limit_remaining = header_string(headers, RATE_LIMIT_REMAINING_HEADER)
            .parse::<i64>()
            .ok();

        let body = if status == StatusCode::NOT_MODIFIED {
            String::new()
        } else {
            response.text().await?
        };

        Ok(HttpResponse {
            status,
            etag,
            last_modified,
            rate_limit_remaining,
            body,
        })
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
