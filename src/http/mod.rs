//! HTTP client module for conditional requests and status classification.
//!
//! Requests are never retried here: a failed repository is retried by the
//! next scheduled check cycle.

mod client;
mod status;

pub use client::{ConditionalRequest, HttpClient, HttpResponse};
pub use status::{RATE_LIMIT_REMAINING_HEADER, classify_status};
