//! Domain error types for the ingestion pipeline
//!
//! Per-item failures (one malformed entry, one bad page) are represented as
//! values consumed by batch loops, not as these errors. The types here cover
//! failures that escape a single item: fetch problems, unreadable batches,
//! rejected units of work.

use thiserror::Error;

/// Errors that can occur while fetching a page from the search API
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Rate limit signaled by the provider (HTTP 429)
    #[error("Rate limited by provider")]
    RateLimited,

    /// Server error with status code
    #[error("Server error: {0}")]
    ServerError(u16),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Response body was not the expected JSON document
    #[error("Malformed response body: {0}")]
    MalformedBody(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Transient-network failures are retryable; client errors are not
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited | Self::Timeout => true,
            Self::ServerError(code) => matches!(code, 500 | 502 | 503 | 504),
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::MalformedBody(_) | Self::InvalidUrl(_) => false,
        }
    }
}

/// Errors that can occur while processing a raw collection
#[derive(Error, Debug)]
pub enum ProcessError {
    /// Collection not found in storage
    #[error("Collection {0} not found")]
    CollectionNotFound(uuid::Uuid),

    /// Collection already reached a terminal status
    #[error("Collection {0} is already {1}")]
    AlreadyTerminal(uuid::Uuid, crate::models::ProcessingStatus),

    /// Payload carries no `data` array at all
    #[error("Payload has no entry array")]
    MissingEntryArray,
}
