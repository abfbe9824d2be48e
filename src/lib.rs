//! gleaner - Job-Posting Ingestion Pipeline
//!
//! A recurring, fault-tolerant pipeline that ingests job postings from a
//! paginated search API, normalizes heterogeneous payloads into a canonical
//! schema, detects duplicates across collection runs and loads deduplicated
//! records into durable storage.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`limiter`] - Sliding-window rate limiting with backoff
//! - [`collector`] - Rate-limited page collection and raw backups
//! - [`processor`] - Normalization, classification and quality scoring
//! - [`dedup`] - Multi-tier duplicate detection
//! - [`loader`] - Idempotent loading into canonical storage
//! - [`orchestrator`] - Phase sequencing, maintenance and health checks
//! - [`scheduler`] - Recurring job execution
//! - [`models`] - Core data structures and types
//! - [`storage`] - SQLite persistence
//!
//! # Example
//!
//! ```no_run
//! use gleaner::config::Config;
//! use gleaner::storage::SqliteStore;
//! use std::sync::Arc;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let store = Arc::new(SqliteStore::open(&config.database.sqlite_path)?);
//!     // wire collector/processor/loader/orchestrator from here
//!     Ok(())
//! }
//! ```

pub mod collector;
pub mod config;
pub mod dedup;
pub mod error;
pub mod limiter;
pub mod loader;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod processor;
pub mod scheduler;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::collector::Collector;
    pub use crate::config::Config;
    pub use crate::dedup::DuplicationDetector;
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::loader::Loader;
    pub use crate::models::{
        CanonicalJobRecord, NormalizedJobRecord, OperationLog, ProcessingStatus, RawCollection,
    };
    pub use crate::orchestrator::{Orchestrator, PipelineParams, PipelineResult};
    pub use crate::processor::Processor;
    pub use crate::scheduler::PipelineScheduler;
    pub use crate::storage::SqliteStore;
}

// Direct re-exports for convenience
pub use models::{CanonicalJobRecord, NormalizedJobRecord, ProcessingStatus, RawCollection};
