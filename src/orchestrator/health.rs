//! Pipeline health assessment
//!
//! Health is derived entirely from operation-log history and collection
//! recency: failed operations above 20% of the recent window flag the
//! pipeline unhealthy, 10-20% (or stale data) flags a warning.

use chrono::{Duration, Utc};

use crate::storage::SqliteStore;

/// How far back operations are considered "recent"
const RECENT_WINDOW_HOURS: i64 = 24;

/// No fresh data for this long is a warning on its own
const STALE_DATA_HOURS: i64 = 48;

const UNHEALTHY_FAILURE_RATE: f64 = 0.2;
const WARNING_FAILURE_RATE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Warning,
    Unhealthy,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Unhealthy => "unhealthy",
        }
    }
}

/// Result of one health check
#[derive(Debug, Clone)]
pub struct HealthAssessment {
    pub state: HealthState,
    /// Failed operations / terminal operations in the recent window
    pub failure_rate: f64,
    pub recent_operations: usize,
    pub hours_since_last_collection: Option<i64>,
    pub notes: Vec<String>,
}

/// Assess pipeline health from recent operation logs
pub fn assess(store: &SqliteStore) -> anyhow::Result<HealthAssessment> {
    let since = Utc::now() - Duration::hours(RECENT_WINDOW_HOURS);
    let logs = store.recent_operation_logs(since, None)?;

    let terminal: Vec<_> = logs.iter().filter(|l| l.status.is_terminal()).collect();
    let failed = terminal
        .iter()
        .filter(|l| l.status == crate::models::ProcessingStatus::Failed)
        .count();

    let failure_rate = if terminal.is_empty() {
        0.0
    } else {
        failed as f64 / terminal.len() as f64
    };

    let stats = store.statistics()?;
    let hours_since_last_collection = stats
        .latest_collection_at
        .map(|t| (Utc::now() - t).num_hours());

    let mut notes = Vec::new();
    let mut state = HealthState::Healthy;

    if failure_rate > UNHEALTHY_FAILURE_RATE {
        state = HealthState::Unhealthy;
        notes.push(format!(
            "failure rate {:.0}% exceeds {:.0}%",
            failure_rate * 100.0,
            UNHEALTHY_FAILURE_RATE * 100.0
        ));
    } else if failure_rate >= WARNING_FAILURE_RATE {
        state = HealthState::Warning;
        notes.push(format!("elevated failure rate {:.0}%", failure_rate * 100.0));
    }

    match hours_since_last_collection {
        Some(hours) if hours >= STALE_DATA_HOURS => {
            if state == HealthState::Healthy {
                state = HealthState::Warning;
            }
            notes.push(format!("no fresh data for {hours}h"));
        }
        None if stats.raw_collections == 0 && !terminal.is_empty() => {
            // Operations ran but nothing was ever collected
            if state == HealthState::Healthy {
                state = HealthState::Warning;
            }
            notes.push("no collections recorded".to_string());
        }
        _ => {}
    }

    Ok(HealthAssessment {
        state,
        failure_rate,
        recent_operations: terminal.len(),
        hours_since_last_collection,
        notes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CollectionMetadata, CollectionQuery, OperationLog, OperationType, ProcessingStatus,
        RawCollection,
    };

    fn store_with_logs(completed: usize, failed: usize) -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        for _ in 0..completed {
            let mut log = OperationLog::begin(OperationType::Processing, "");
            log.complete(ProcessingStatus::Completed, "", None);
            store.insert_operation_log(&log).unwrap();
        }
        for _ in 0..failed {
            let mut log = OperationLog::begin(OperationType::Processing, "");
            log.complete(ProcessingStatus::Failed, "", None);
            store.insert_operation_log(&log).unwrap();
        }
        store
    }

    fn add_fresh_collection(store: &SqliteStore) {
        let collection = RawCollection::new(
            "jsearch",
            CollectionQuery {
                query: "q".into(),
                country: "us".into(),
                page: 1,
            },
            serde_json::json!({"data": []}),
            CollectionMetadata::default(),
        );
        store.insert_raw_collection(&collection).unwrap();
    }

    #[test]
    fn test_healthy_pipeline() {
        let store = store_with_logs(10, 0);
        add_fresh_collection(&store);

        let health = assess(&store).unwrap();
        assert_eq!(health.state, HealthState::Healthy);
        assert_eq!(health.failure_rate, 0.0);
    }

    #[test]
    fn test_unhealthy_above_twenty_percent() {
        let store = store_with_logs(7, 3);
        add_fresh_collection(&store);

        let health = assess(&store).unwrap();
        assert_eq!(health.state, HealthState::Unhealthy);
        assert!((health.failure_rate - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_warning_between_ten_and_twenty_percent() {
        let store = store_with_logs(17, 3);
        add_fresh_collection(&store);

        let health = assess(&store).unwrap();
        assert_eq!(health.state, HealthState::Warning);
    }

    #[test]
    fn test_no_recent_operations_is_healthy() {
        let store = SqliteStore::in_memory().unwrap();
        let health = assess(&store).unwrap();
        assert_eq!(health.state, HealthState::Healthy);
        assert_eq!(health.recent_operations, 0);
    }
}
