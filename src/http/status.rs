//! Maps upstream HTTP statuses onto [`FetchError`].

use reqwest::StatusCode;

use crate::error::FetchError;

pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Classifies a status that is neither success, 304 nor 404.
///
/// `rate_limit_remaining` and `body` disambiguate GitHub's 403, which is used
/// both for exhausted quotas and for plain access denials.
pub fn classify_status(
    status: StatusCode,
    rate_limit_remaining: Option<i64>,
    body: &str,
) -> FetchError {
    match status {
        StatusCode::UNAUTHORIZED => FetchError::Unauthorized,
        StatusCode::FORBIDDEN => {
            if rate_limit_remaining == Some(0) || body.to_lowercase().contains("rate limit") {
                FetchError::RateLimited
            } else {
                FetchError::Forbidden
            }
        }
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited,
        s => FetchError::Status(s.as_u16()),
    }
}
