//! Access token acquisition and validity checks.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::StatusCode;
use std::sync::Arc;

use crate::http::{ConditionalRequest, HttpClient};
use crate::runtime::Runtime;
use crate::state::StateStore;

pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Verifies the stored credential after a suspicious check cycle.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialCheck: Send + Sync {
    /// Returns `true` when the token was rejected and cleared.
    async fn verify(&self) -> Result<bool>;
}

/// Obtains a new access token for the `AUTHORIZE` request.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self) -> Result<String>;
}

pub struct GitHubCredentials {
    http: HttpClient,
    api_url: String,
    state: Arc<StateStore>,
}

impl GitHubCredentials {
    pub fn new(http: HttpClient, api_url: impl Into<String>, state: Arc<StateStore>) -> Self {
        Self {
            http,
            api_url: api_url.into(),
            state,
        }
    }
}

#[async_trait]
impl CredentialCheck for GitHubCredentials {
    /// Only a definite 401 from `/user` clears the token; network trouble
    /// or any other status keeps it.
    #[tracing::instrument(skip(self))]
    async fn verify(&self) -> Result<bool> {
        let Some(token) = self.state.access_token().await? else {
            debug!("No access token stored, nothing to verify");
            return Ok(false);
        };

        let url = format!("{}/user", self.api_url);
        let response = match self
            .http
            .conditional_get(
                &url,
                &ConditionalRequest {
                    accept: Some(crate::fetcher::api::API_ACCEPT),
                    token: Some(&token),
                    ..Default::default()
                },
            )
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Could not verify access token: {}", e);
                return Ok(false);
            }
        };

        if response.status == StatusCode::UNAUTHORIZED {
            warn!("Access token was rejected, removing it");
            self.state.remove_access_token().await?;
            return Ok(true);
        }
        debug!("Access token check answered {}", response.status);
        Ok(false)
    }
}

/// Reads a personal access token from `GITHUB_TOKEN`.
pub struct EnvAuthorizer {
    runtime: Arc<dyn Runtime>,
}

impl EnvAuthorizer {
    pub fn new(runtime: Arc<dyn Runtime>) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl Authorizer for EnvAuthorizer {
    async fn authorize(&self) -> Result<String> {
        let token = self
            .runtime
            .env_var(TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .with_context(|| {
                format!(
                    "{} is not set. Create a personal access token and export it as {}.",
                    TOKEN_ENV, TOKEN_ENV
                )
            })?;
        Ok(token.trim().to_string())
    }
}

/// Runs the authorizer and stores the token it returns.
pub async fn authorize(authorizer: &dyn Authorizer, state: &StateStore) -> Result<()> {
    let token = authorizer.authorize().await?;
    state.save_access_token(&token).await?;
    info!("Access token saved");
    Ok(())
}
