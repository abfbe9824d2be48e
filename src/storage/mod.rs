//! SQLite persistence for the ingestion pipeline
//!
//! All durable state lives in one SQLite database: raw collections,
//! normalized records, canonical jobs, duplication links, operation logs and
//! embedding vectors. Components receive an explicit [`SqliteStore`] handle
//! at construction time; there is no ambient global database state.

pub mod repository;

pub use repository::{PipelineStatistics, SqliteStore};
