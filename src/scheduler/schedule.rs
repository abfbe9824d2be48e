//! Declarative job definitions and schedule parsing
//!
//! Jobs are loaded from a TOML document (a `[[jobs]]` array) or fall back to
//! the built-in defaults: a daily full run, an hourly incremental run and a
//! weekly maintenance sweep. Each job resolves to exactly one orchestrator
//! phase-runner.
//!
//! Schedule strings use two forms:
//! - `cron:<expr>` for a six-field cron expression (seconds first)
//! - `interval:<seconds>` for a fixed repetition period

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::error::SchedulerError;

/// Which orchestrator runner a job maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    /// Collection, processing and loading in sequence
    Full,
    Collection,
    Processing,
    Loading,
    Maintenance,
}

impl JobPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Collection => "collection",
            Self::Processing => "processing",
            Self::Loading => "loading",
            Self::Maintenance => "maintenance",
        }
    }
}

/// Query parameters handed to collection-bearing phases
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobParameters {
    #[serde(default = "default_query")]
    pub query: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default = "default_start_page")]
    pub start_page: u32,
    #[serde(default = "default_num_pages")]
    pub num_pages: u32,
}

fn default_query() -> String {
    "software engineer".to_string()
}

fn default_start_page() -> u32 {
    1
}

fn default_num_pages() -> u32 {
    5
}

impl Default for JobParameters {
    fn default() -> Self {
        Self {
            query: default_query(),
            country: None,
            start_page: default_start_page(),
            num_pages: default_num_pages(),
        }
    }
}

/// One named scheduled job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: String,
    pub phase: JobPhase,
    /// `cron:<expr>` or `interval:<seconds>`
    pub schedule: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub parameters: JobParameters,
}

fn default_timeout_secs() -> u64 {
    1800
}

fn default_max_retries() -> u32 {
    0
}

impl JobConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn schedule_spec(&self) -> Result<ScheduleSpec, SchedulerError> {
        ScheduleSpec::parse(&self.schedule)
    }
}

/// Parsed form of a schedule string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleSpec {
    Cron(String),
    Interval(Duration),
}

impl ScheduleSpec {
    pub fn parse(raw: &str) -> Result<Self, SchedulerError> {
        if let Some(expr) = raw.strip_prefix("cron:") {
            let expr = expr.trim();
            if expr.split_whitespace().count() < 6 {
                return Err(SchedulerError::InvalidSchedule {
                    schedule: raw.to_string(),
                    reason: "cron expressions need six fields (seconds first)".to_string(),
                });
            }
            return Ok(Self::Cron(expr.to_string()));
        }

        if let Some(secs) = raw.strip_prefix("interval:") {
            let secs: u64 = secs.trim().parse().map_err(|_| SchedulerError::InvalidSchedule {
                schedule: raw.to_string(),
                reason: "interval must be a number of seconds".to_string(),
            })?;
            if secs == 0 {
                return Err(SchedulerError::InvalidSchedule {
                    schedule: raw.to_string(),
                    reason: "interval must be positive".to_string(),
                });
            }
            return Ok(Self::Interval(Duration::from_secs(secs)));
        }

        Err(SchedulerError::InvalidSchedule {
            schedule: raw.to_string(),
            reason: "expected a cron: or interval: prefix".to_string(),
        })
    }
}

/// The loadable scheduler document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub jobs: Vec<JobConfig>,
}

impl ScheduleConfig {
    /// Load job definitions from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read schedule config: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse schedule config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Built-in defaults used when no custom config is provided
    pub fn builtin_defaults() -> Self {
        Self {
            jobs: vec![
                JobConfig {
                    name: "daily-full".to_string(),
                    phase: JobPhase::Full,
                    schedule: "cron:0 0 3 * * *".to_string(),
                    timeout_secs: 3600,
                    max_retries: 1,
                    parameters: JobParameters::default(),
                },
                JobConfig {
                    name: "hourly-incremental".to_string(),
                    phase: JobPhase::Full,
                    schedule: "interval:3600".to_string(),
                    timeout_secs: 900,
                    max_retries: 0,
                    parameters: JobParameters {
                        num_pages: 1,
                        ..JobParameters::default()
                    },
                },
                JobConfig {
                    name: "weekly-maintenance".to_string(),
                    phase: JobPhase::Maintenance,
                    schedule: "cron:0 0 4 * * Sun".to_string(),
                    timeout_secs: 600,
                    max_retries: 0,
                    parameters: JobParameters::default(),
                },
            ],
        }
    }

    /// Reject duplicate names and unparsable schedules up front
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for job in &self.jobs {
            if !seen.insert(job.name.as_str()) {
                anyhow::bail!("Duplicate job name: {}", job.name);
            }
            job.schedule_spec()
                .map_err(|e| anyhow::anyhow!("Job {}: {e}", job.name))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cron_spec() {
        let spec = ScheduleSpec::parse("cron:0 0 3 * * *").unwrap();
        assert_eq!(spec, ScheduleSpec::Cron("0 0 3 * * *".to_string()));
    }

    #[test]
    fn test_parse_interval_spec() {
        let spec = ScheduleSpec::parse("interval:3600").unwrap();
        assert_eq!(spec, ScheduleSpec::Interval(Duration::from_secs(3600)));
    }

    #[test]
    fn test_reject_bad_specs() {
        assert!(ScheduleSpec::parse("every hour").is_err());
        assert!(ScheduleSpec::parse("interval:0").is_err());
        assert!(ScheduleSpec::parse("interval:soon").is_err());
        assert!(ScheduleSpec::parse("cron:* * *").is_err());
    }

    #[test]
    fn test_builtin_defaults_are_valid() {
        let config = ScheduleConfig::builtin_defaults();
        assert!(config.validate().is_ok());
        assert_eq!(config.jobs.len(), 3);
        assert!(config.jobs.iter().any(|j| j.name == "weekly-maintenance"));
    }

    #[test]
    fn test_toml_loading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.toml");
        std::fs::write(
            &path,
            r#"
[[jobs]]
name = "nightly"
phase = "full"
schedule = "cron:0 30 2 * * *"
timeout_secs = 1200

[jobs.parameters]
query = "rust developer"
num_pages = 3
"#,
        )
        .unwrap();

        let config = ScheduleConfig::from_file(&path).unwrap();
        assert_eq!(config.jobs.len(), 1);
        let job = &config.jobs[0];
        assert_eq!(job.name, "nightly");
        assert_eq!(job.phase, JobPhase::Full);
        assert_eq!(job.parameters.query, "rust developer");
        assert_eq!(job.parameters.num_pages, 3);
        // Unspecified fields fall back to defaults
        assert_eq!(job.max_retries, 0);
        assert_eq!(job.parameters.start_page, 1);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut config = ScheduleConfig::builtin_defaults();
        let clone = config.jobs[0].clone();
        config.jobs.push(clone);
        assert!(config.validate().is_err());
    }
}
