//! Error types for release fetching.

use thiserror::Error;

/// A fetch that produced no usable snapshot.
///
/// "Not modified" and "no release yet" are not errors; they come back as
/// snapshots. Every variant here means the caller must keep the stored
/// snapshot untouched and try again on the next scheduled cycle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    Parse(String),

    #[error("Rate limit exceeded. Try again later or run `ghrn authorize`.")]
    RateLimited,

    #[error("Authentication failed. The stored access token may be invalid.")]
    Unauthorized,

    #[error("Access forbidden")]
    Forbidden,

    #[error("Unexpected HTTP status {0}")]
    Status(u16),
}

impl FetchError {
    /// Errors that point at the credential rather than the repository.
    pub fn is_auth(&self) -> bool {
        matches!(self, FetchError::Unauthorized)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() || error.is_body() {
            FetchError::Parse(error.to_string())
        } else {
            FetchError::Network(error.to_string())
        }
    }
}
