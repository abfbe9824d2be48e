//! Common test utilities

use std::path::Path;

use gleaner::config::Config;

/// Test configuration pointing at a mock server and temp directories
pub fn test_config(base_url: &str, raw_dir: &Path, db_path: &Path) -> Config {
    let mut config = Config::default();
    config.api.base_url = format!("{base_url}/search");
    config.api.api_key = "test-key".to_string();
    config.collector.raw_data_dir = raw_dir.to_path_buf();
    config.collector.rate_limit_cooldown_secs = 0;
    config.database.sqlite_path = db_path.to_path_buf();
    // Budgets high enough that tests never wait on the window, and a tight
    // backoff cap so failure paths stay fast
    config.limiter.max_calls_per_minute = 1000;
    config.limiter.max_calls_per_hour = 10_000;
    config.limiter.max_backoff_secs = 0.05;
    config
}

/// One complete job entry: every required and important-optional field is
/// populated, the description is over the 50-character bonus threshold.
#[allow(dead_code)]
pub fn sample_job_entry(job_id: &str, apply_url: &str) -> serde_json::Value {
    serde_json::json!({
        "job_id": job_id,
        "job_title": "Senior Backend Engineer",
        "employer_name": "Acme",
        "job_city": "Berlin",
        "job_country": "DE",
        "job_description": "Remote full-time role. We pay $100,000 - $130,000. Own our Rust services end to end.",
        "job_employment_type": "FULLTIME",
        "job_apply_link": apply_url,
        "job_publisher": "Acme Careers"
    })
}

/// Wrap entries the way the search API does (under the `data` key)
#[allow(dead_code)]
pub fn search_response(entries: Vec<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({
        "status": "OK",
        "data": entries
    })
}
