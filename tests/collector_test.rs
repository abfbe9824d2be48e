//! Integration tests for the collector using wiremock
//!
//! These validate page-range walking, per-page failure isolation, 429
//! same-page retry and the raw backup side effect.

mod common;

use std::sync::Arc;

use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gleaner::collector::Collector;
use gleaner::models::{OperationType, ProcessingStatus};
use gleaner::storage::SqliteStore;

use common::{sample_job_entry, search_response, test_config};

async fn setup(mock_server: &MockServer) -> (Collector, Arc<SqliteStore>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(
        &mock_server.uri(),
        &dir.path().join("raw"),
        &dir.path().join("gleaner.db"),
    );
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let collector = Collector::new(&config, store.clone()).unwrap();
    (collector, store, dir)
}

fn page_response(page: u32) -> ResponseTemplate {
    let entry = sample_job_entry(
        &format!("job-{page}"),
        &format!("https://jobs.example.com/{page}"),
    );
    ResponseTemplate::new(200).set_body_json(search_response(vec![entry]))
}

/// All pages succeed: one collection per page, in page order
#[tokio::test]
async fn test_collect_full_range() {
    let mock_server = MockServer::start().await;
    for page in 1..=3 {
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("page", page.to_string()))
            .respond_with(page_response(page))
            .mount(&mock_server)
            .await;
    }

    let (collector, store, _dir) = setup(&mock_server).await;
    let ids = collector.collect("rust developer", None, 1, 3).await.unwrap();

    assert_eq!(ids.len(), 3);
    let pending = store.pending_collections().unwrap();
    assert_eq!(pending.len(), 3);
    assert_eq!(
        pending.iter().map(|c| c.query.page).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert!(pending.iter().all(|c| c.metadata.job_count == 1));
}

/// The API key header travels with every request
#[tokio::test]
async fn test_api_key_header_is_sent() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(header("X-Api-Key", "test-key"))
        .respond_with(page_response(1))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (collector, _store, _dir) = setup(&mock_server).await;
    let ids = collector.collect("rust developer", None, 1, 1).await.unwrap();
    assert_eq!(ids.len(), 1);
}

/// HTTP 429 retries the same page until it succeeds; the full range still
/// lands.
#[tokio::test]
async fn test_rate_limited_page_is_retried_not_skipped() {
    let mock_server = MockServer::start().await;

    for page in [1, 2, 4, 5] {
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("page", page.to_string()))
            .respond_with(page_response(page))
            .mount(&mock_server)
            .await;
    }

    // Page 3 answers 429 twice, then succeeds
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("page", "3"))
        .respond_with(page_response(3))
        .mount(&mock_server)
        .await;

    let (collector, store, _dir) = setup(&mock_server).await;
    let ids = collector.collect("rust developer", None, 1, 5).await.unwrap();

    // All five pages collected despite the throttled page
    assert_eq!(ids.len(), 5);
    let pages: Vec<u32> = store
        .pending_collections()
        .unwrap()
        .iter()
        .map(|c| c.query.page)
        .collect();
    assert_eq!(pages, vec![1, 2, 3, 4, 5]);
}

/// A hard failure on one page is isolated: the rest of the range is
/// collected and the operation log completes with the error folded in.
#[tokio::test]
async fn test_page_failure_is_isolated() {
    let mock_server = MockServer::start().await;

    for page in [1, 3] {
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("page", page.to_string()))
            .respond_with(page_response(page))
            .mount(&mock_server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let (collector, store, _dir) = setup(&mock_server).await;
    let ids = collector.collect("rust developer", None, 1, 3).await.unwrap();

    assert_eq!(ids.len(), 2);

    let since = chrono::Utc::now() - chrono::Duration::hours(1);
    let logs = store
        .recent_operation_logs(since, Some(OperationType::Collection))
        .unwrap();
    assert_eq!(logs.len(), 1);
    // The full range was walked, so the log completes despite the page error
    assert_eq!(logs[0].status, ProcessingStatus::Completed);
    assert_eq!(logs[0].items_total, 3);
    assert_eq!(logs[0].items_failed, 1);
    assert!(logs[0].output_summary.contains("p2"));
}

/// Every stored page is mirrored to the date-partitioned backup tree
#[tokio::test]
async fn test_raw_backup_is_written() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(page_response(1))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let raw_dir = dir.path().join("raw");
    let config = test_config(&mock_server.uri(), &raw_dir, &dir.path().join("db"));
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let collector = Collector::new(&config, store).unwrap();

    let ids = collector.collect("rust developer", None, 1, 1).await.unwrap();
    assert_eq!(ids.len(), 1);

    // One JSON file somewhere under raw/<year>/<month>/<day>/
    let mut found = Vec::new();
    for year in std::fs::read_dir(&raw_dir).unwrap() {
        for month in std::fs::read_dir(year.unwrap().path()).unwrap() {
            for day in std::fs::read_dir(month.unwrap().path()).unwrap() {
                for file in std::fs::read_dir(day.unwrap().path()).unwrap() {
                    found.push(file.unwrap().path());
                }
            }
        }
    }
    assert_eq!(found.len(), 1);
    let name = found[0].file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("jsearch_"));
    assert!(name.ends_with(".json"));
    assert!(name.contains(&ids[0].to_string()));
}
