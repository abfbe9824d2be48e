//! Unified error handling for the gleaner crate
//!
//! This module provides a unified error type that consolidates all
//! domain-specific errors into a single `Error` enum, while maintaining the
//! ability to use domain-specific errors when needed.
//!
//! # Architecture
//!
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! Per-item failures (a malformed job entry, a failed page) never surface
//! here: batch loops absorb them into partial statuses. These types cover
//! failures of whole units of work.

use std::io;
use thiserror::Error;

// Re-export domain-specific errors for convenience
pub use crate::scheduler::error::SchedulerError;
pub use crate::utils::error::{FetchError, ProcessError};

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Transient network errors (HTTP, timeout, connection reset)
    Network,
    /// Provider-signaled throttling (HTTP 429)
    RateLimit,
    /// Malformed data that failed validation
    Validation,
    /// Storage and I/O errors
    Storage,
    /// Configuration and startup errors
    Config,
    /// Scheduler and timing errors
    Scheduler,
    /// Other/unknown errors
    Other,
}

/// Unified error type for the gleaner crate
#[derive(Error, Debug)]
pub enum Error {
    /// Fetch-specific errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Processing errors that escape a single entry
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    /// Scheduler and timing errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[source] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration errors (fail fast before any phase starts)
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_transient(),
            Self::Process(_) => false,
            Self::Scheduler(e) => e.is_recoverable(),
            Self::Database(_) => false,
            Self::Io(_) => true,
            Self::Json(_) => false,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Config(_) => false,
            Self::Other { .. } => false,
        }
    }

    /// Get the error category for handling strategies
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(FetchError::RateLimited) => ErrorCategory::RateLimit,
            Self::Fetch(_) | Self::Http(_) => ErrorCategory::Network,
            Self::Process(_) | Self::Json(_) => ErrorCategory::Validation,
            Self::Scheduler(_) => ErrorCategory::Scheduler,
            Self::Database(_) | Self::Io(_) => ErrorCategory::Storage,
            Self::Config(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Conversion from rusqlite::Error
impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err)
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: err.to_string(),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
