//! Configuration management for the gleaner pipeline
//!
//! Configuration is loadable from a TOML file or from `GLEANER_*` environment
//! variables. Construction has no side effects: `validate()` reports every
//! problem it finds, and `initialize()` is the single place that touches the
//! filesystem (directory creation), invoked once at startup.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::ExperienceLevel;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Search API access
    pub api: ApiConfig,

    /// Rate limiter budgets
    pub limiter: LimiterConfig,

    /// Collector behavior
    pub collector: CollectorConfig,

    /// Processor heuristics
    pub processor: ProcessorConfig,

    /// Duplicate detection
    pub dedup: DedupConfig,

    /// Loader and maintenance
    pub loader: LoaderConfig,

    /// Pipeline orchestration
    pub orchestrator: OrchestratorConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Search API access configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the paginated job-search endpoint
    pub base_url: String,

    /// Static API key sent in the `X-Api-Key` header
    pub api_key: String,

    /// Provider label recorded on collections and backup files
    pub provider: String,

    /// Default country filter
    pub country: String,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

/// Rate limiter budgets and backoff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Maximum calls within any sliding minute
    pub max_calls_per_minute: u32,

    /// Maximum calls within any sliding hour
    pub max_calls_per_hour: u32,

    /// Maximum requests in flight at once
    pub concurrent_requests: usize,

    /// Multiplier applied to the backoff delay on each failure
    pub backoff_multiplier: f64,

    /// Upper bound on the backoff delay in seconds
    pub max_backoff_secs: f64,
}

/// Collector behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Directory for raw payload backup files
    pub raw_data_dir: PathBuf,

    /// Fixed cooldown before retrying a 429'd page, in seconds
    pub rate_limit_cooldown_secs: u64,
}

/// Weights used by the quality score.
///
/// The values are inherited constants with no stronger justification;
/// they are configuration, not something to optimize against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QualityWeights {
    pub required_field: f64,
    pub optional_field: f64,
    pub description_bonus: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            required_field: 1.0,
            optional_field: 0.5,
            description_bonus: 0.5,
        }
    }
}

/// Processor heuristics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Description length granting the quality-score bonus
    pub min_description_length: usize,

    /// Quality score weights
    pub quality_weights: QualityWeights,

    /// Fallback when no experience signal is found
    pub default_experience_level: ExperienceLevel,
}

/// Duplicate detection thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Weighted similarity a candidate must strictly exceed
    pub similarity_threshold: f64,

    /// Cap on fuzzy candidates examined per record
    pub candidate_limit: usize,
}

/// Loader and maintenance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Confidence recorded on duplication links created at load time
    pub duplicate_confidence: f64,

    /// Links older than this many days are eligible for cleanup
    pub cleanup_after_days: i64,

    /// Links below this confidence are eligible for cleanup
    pub cleanup_confidence_cutoff: f64,
}

/// Pipeline orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Concurrent collection-processing tasks in the processing phase
    pub max_concurrent: usize,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("GLEANER_API_BASE_URL") {
            config.api.base_url = v;
        }
        if let Ok(v) = std::env::var("GLEANER_API_KEY") {
            config.api.api_key = v;
        }
        if let Ok(v) = std::env::var("GLEANER_API_COUNTRY") {
            config.api.country = v;
        }
        if let Ok(v) = std::env::var("GLEANER_REQUEST_TIMEOUT") {
            if let Ok(secs) = v.parse() {
                config.api.request_timeout_secs = secs;
            }
        }
        if let Ok(v) = std::env::var("GLEANER_MAX_CALLS_PER_MINUTE") {
            if let Ok(n) = v.parse() {
                config.limiter.max_calls_per_minute = n;
            }
        }
        if let Ok(v) = std::env::var("GLEANER_MAX_CALLS_PER_HOUR") {
            if let Ok(n) = v.parse() {
                config.limiter.max_calls_per_hour = n;
            }
        }
        if let Ok(v) = std::env::var("GLEANER_CONCURRENT_REQUESTS") {
            if let Ok(n) = v.parse() {
                config.limiter.concurrent_requests = n;
            }
        }
        if let Ok(v) = std::env::var("GLEANER_RAW_DATA_DIR") {
            config.collector.raw_data_dir = v.into();
        }
        if let Ok(v) = std::env::var("GLEANER_SQLITE_PATH") {
            config.database.sqlite_path = v.into();
        }
        if let Ok(v) = std::env::var("GLEANER_MAX_CONCURRENT") {
            if let Ok(n) = v.parse() {
                config.orchestrator.max_concurrent = n;
            }
        }
        if let Ok(v) = std::env::var("GLEANER_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Ok(v) = std::env::var("GLEANER_LOG_FORMAT") {
            config.logging.format = v;
        }

        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values, returning every problem found.
    ///
    /// An empty vector means the configuration is usable. Callers that need
    /// fail-fast behavior should treat a non-empty vector as fatal before
    /// any phase starts.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.api.base_url.is_empty() {
            problems.push("api.base_url must not be empty".to_string());
        } else if url::Url::parse(&self.api.base_url).is_err() {
            problems.push(format!(
                "api.base_url is not a valid URL: {}",
                self.api.base_url
            ));
        }
        if self.api.api_key.is_empty() {
            problems.push("api.api_key must not be empty".to_string());
        }
        if self.limiter.max_calls_per_minute == 0 {
            problems.push("limiter.max_calls_per_minute must be greater than 0".to_string());
        }
        if self.limiter.max_calls_per_hour < self.limiter.max_calls_per_minute {
            problems.push(
                "limiter.max_calls_per_hour must be at least max_calls_per_minute".to_string(),
            );
        }
        if self.limiter.concurrent_requests == 0 {
            problems.push("limiter.concurrent_requests must be greater than 0".to_string());
        }
        if self.limiter.backoff_multiplier <= 1.0 {
            problems.push("limiter.backoff_multiplier must be greater than 1.0".to_string());
        }
        if !(0.0..=1.0).contains(&self.dedup.similarity_threshold) {
            problems.push("dedup.similarity_threshold must be within [0, 1]".to_string());
        }
        if self.dedup.candidate_limit == 0 {
            problems.push("dedup.candidate_limit must be greater than 0".to_string());
        }
        if self.orchestrator.max_concurrent == 0 {
            problems.push("orchestrator.max_concurrent must be greater than 0".to_string());
        }

        problems
    }

    /// Perform startup side effects: create the raw-data and database
    /// directories. Construction and validation never touch the filesystem;
    /// this is the one place that does.
    pub fn initialize(&self) -> Result<()> {
        std::fs::create_dir_all(&self.collector.raw_data_dir).with_context(|| {
            format!(
                "Failed to create raw data dir: {}",
                self.collector.raw_data_dir.display()
            )
        })?;

        if let Some(parent) = self.database.sqlite_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database dir: {}", parent.display()))?;
        }

        Ok(())
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: String::from("https://jsearch.example.com/search"),
                api_key: String::new(),
                provider: String::from("jsearch"),
                country: String::from("us"),
                request_timeout_secs: 30,
            },
            limiter: LimiterConfig {
                max_calls_per_minute: 30,
                max_calls_per_hour: 500,
                concurrent_requests: 3,
                backoff_multiplier: 2.0,
                max_backoff_secs: 60.0,
            },
            collector: CollectorConfig {
                raw_data_dir: PathBuf::from("data/raw"),
                rate_limit_cooldown_secs: 5,
            },
            processor: ProcessorConfig {
                min_description_length: 50,
                quality_weights: QualityWeights::default(),
                default_experience_level: ExperienceLevel::MidLevel,
            },
            dedup: DedupConfig {
                similarity_threshold: 0.85,
                candidate_limit: 10,
            },
            loader: LoaderConfig {
                duplicate_confidence: 0.9,
                cleanup_after_days: 30,
                cleanup_confidence_cutoff: 0.7,
            },
            orchestrator: OrchestratorConfig { max_concurrent: 3 },
            database: DatabaseConfig {
                sqlite_path: PathBuf::from("data/gleaner.db"),
            },
            logging: LoggingConfig {
                level: String::from("info"),
                format: String::from("text"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.api.api_key = "test-key".into();
        config
    }

    #[test]
    fn test_default_config_reports_missing_api_key() {
        let config = Config::default();
        let problems = config.validate();
        assert!(problems.iter().any(|p| p.contains("api_key")));
    }

    #[test]
    fn test_valid_config_has_no_problems() {
        assert!(valid_config().validate().is_empty());
    }

    #[test]
    fn test_validate_collects_multiple_problems() {
        let mut config = valid_config();
        config.limiter.max_calls_per_minute = 0;
        config.orchestrator.max_concurrent = 0;
        config.dedup.similarity_threshold = 1.5;

        let problems = config.validate();
        assert!(problems.len() >= 3);
    }

    #[test]
    fn test_hour_budget_must_cover_minute_budget() {
        let mut config = valid_config();
        config.limiter.max_calls_per_minute = 100;
        config.limiter.max_calls_per_hour = 50;
        assert!(!config.validate().is_empty());
    }

    #[test]
    fn test_request_timeout_conversion() {
        let config = Config::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("GLEANER_API_KEY", "env-key");
        std::env::set_var("GLEANER_MAX_CALLS_PER_MINUTE", "7");

        let config = Config::from_env().unwrap();
        assert_eq!(config.api.api_key, "env-key");
        assert_eq!(config.limiter.max_calls_per_minute, 7);

        std::env::remove_var("GLEANER_API_KEY");
        std::env::remove_var("GLEANER_MAX_CALLS_PER_MINUTE");
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = valid_config();
        let toml_text = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_text).unwrap();
        assert_eq!(parsed.api.provider, config.api.provider);
        assert_eq!(
            parsed.dedup.similarity_threshold,
            config.dedup.similarity_threshold
        );
    }
}
