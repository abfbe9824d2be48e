//! Error types for the scheduler module

use thiserror::Error;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// No job with the given name is configured
    #[error("Unknown job: {0}")]
    UnknownJob(String),

    /// A manual trigger hit a job whose previous run is still active
    #[error("Job {0} is already running")]
    AlreadyRunning(String),

    /// Schedule string could not be parsed
    #[error("Invalid schedule '{schedule}': {reason}")]
    InvalidSchedule { schedule: String, reason: String },

    /// The underlying cron runtime rejected a job
    #[error("Scheduler runtime error: {0}")]
    Runtime(String),
}

impl SchedulerError {
    /// Whether the operation can simply be retried later
    pub fn is_recoverable(&self) -> bool {
        match self {
            // The next schedule tick will pick the work up again
            Self::AlreadyRunning(_) => true,
            Self::UnknownJob(_) | Self::InvalidSchedule { .. } | Self::Runtime(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverability() {
        assert!(SchedulerError::AlreadyRunning("daily-full".into()).is_recoverable());
        assert!(!SchedulerError::UnknownJob("nope".into()).is_recoverable());
    }
}
