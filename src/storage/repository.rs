//! SQLite repository for pipeline state
//!
//! One connection behind a `Mutex`, WAL mode, schema created at startup.
//! Every public method is a short-lived unit of work: a single statement or
//! an explicit transaction committed before returning. No long-lived
//! transaction ever spans multiple entries or phases.
//!
//! Vector-valued columns (skills, matching fields, embeddings) are stored as
//! JSON text; timestamps as RFC 3339 strings.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::models::{
    CanonicalJobRecord, CanonicalStatus, CollectionMetadata, CollectionQuery, DuplicationLink,
    ExperienceLevel, JobType, NormalizedJobRecord, OperationLog, OperationType, ProcessingStatus,
    RawCollection, RemoteType,
};

/// Aggregate counts surfaced by maintenance and the status command
#[derive(Debug, Clone, Default)]
pub struct PipelineStatistics {
    pub raw_collections: usize,
    pub normalized_jobs: usize,
    pub canonical_jobs: usize,
    pub duplication_links: usize,
    /// Most recent successful collection, if any
    pub latest_collection_at: Option<DateTime<Utc>>,
}

/// SQLite-backed store for all pipeline entities
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite store initialized");
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to create in-memory SQLite")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn create_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS raw_collections (
                id TEXT PRIMARY KEY,
                provider TEXT NOT NULL,
                query TEXT NOT NULL,
                country TEXT NOT NULL,
                page INTEGER NOT NULL,
                payload TEXT NOT NULL,
                job_count INTEGER NOT NULL,
                response_time_ms INTEGER NOT NULL,
                status_code INTEGER NOT NULL,
                processing_status TEXT NOT NULL DEFAULT 'pending',
                collected_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_raw_collections_status
                ON raw_collections(processing_status);

            CREATE TABLE IF NOT EXISTS normalized_jobs (
                id TEXT PRIMARY KEY,
                collection_id TEXT NOT NULL,
                job_index INTEGER NOT NULL,
                title TEXT NOT NULL,
                company TEXT NOT NULL,
                location TEXT,
                description TEXT NOT NULL,
                requirements TEXT NOT NULL,
                responsibilities TEXT NOT NULL,
                job_type TEXT,
                remote_type TEXT,
                experience_level TEXT NOT NULL,
                salary_min REAL,
                salary_max REAL,
                salary_currency TEXT,
                skills TEXT NOT NULL,
                tech_stack TEXT NOT NULL,
                benefits TEXT NOT NULL,
                apply_url TEXT,
                source_id TEXT,
                posted_at TEXT,
                expires_at TEXT,
                embedding TEXT,
                quality_score REAL NOT NULL,
                duplicate_of TEXT,
                load_status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_normalized_jobs_collection
                ON normalized_jobs(collection_id);

            CREATE INDEX IF NOT EXISTS idx_normalized_jobs_load_status
                ON normalized_jobs(load_status);

            CREATE TABLE IF NOT EXISTS canonical_jobs (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                company TEXT NOT NULL,
                location TEXT,
                description TEXT NOT NULL,
                job_type TEXT,
                remote_type TEXT,
                experience_level TEXT NOT NULL,
                salary_min REAL,
                salary_max REAL,
                salary_currency TEXT,
                skills TEXT NOT NULL,
                tech_stack TEXT NOT NULL,
                benefits TEXT NOT NULL,
                apply_url TEXT,
                source_count INTEGER NOT NULL DEFAULT 1,
                status TEXT NOT NULL DEFAULT 'active',
                first_seen_at TEXT NOT NULL,
                last_seen_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_canonical_jobs_apply_url
                ON canonical_jobs(apply_url);

            CREATE INDEX IF NOT EXISTS idx_canonical_jobs_status
                ON canonical_jobs(status);

            CREATE TABLE IF NOT EXISTS duplication_links (
                id TEXT PRIMARY KEY,
                canonical_id TEXT NOT NULL,
                duplicate_id TEXT NOT NULL,
                confidence_score REAL NOT NULL,
                matching_fields TEXT NOT NULL,
                reviewed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_duplication_links_canonical
                ON duplication_links(canonical_id);

            CREATE TABLE IF NOT EXISTS operation_logs (
                id TEXT PRIMARY KEY,
                operation_type TEXT NOT NULL,
                status TEXT NOT NULL,
                input_summary TEXT NOT NULL,
                output_summary TEXT NOT NULL,
                error_detail TEXT,
                items_total INTEGER NOT NULL DEFAULT 0,
                items_failed INTEGER NOT NULL DEFAULT 0,
                started_at TEXT NOT NULL,
                completed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_operation_logs_type
                ON operation_logs(operation_type, started_at);

            CREATE TABLE IF NOT EXISTS embeddings (
                content_hash TEXT PRIMARY KEY,
                vector TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .context("Failed to create SQLite schema")?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Raw collections
    // ------------------------------------------------------------------

    /// Persist one raw collection (one unit of work)
    pub fn insert_raw_collection(&self, collection: &RawCollection) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO raw_collections
                (id, provider, query, country, page, payload, job_count,
                 response_time_ms, status_code, processing_status, collected_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                collection.id.to_string(),
                collection.provider,
                collection.query.query,
                collection.query.country,
                collection.query.page,
                collection.payload.to_string(),
                collection.metadata.job_count as i64,
                collection.metadata.response_time_ms as i64,
                collection.metadata.status_code,
                collection.processing_status.as_str(),
                collection.collected_at.to_rfc3339(),
            ],
        )
        .context("Failed to insert raw collection")?;

        Ok(())
    }

    pub fn get_raw_collection(&self, id: Uuid) -> Result<Option<RawCollection>> {
        let conn = self.conn.lock().unwrap();
        let collection = conn
            .query_row(
                "SELECT id, provider, query, country, page, payload, job_count,
                        response_time_ms, status_code, processing_status, collected_at
                 FROM raw_collections WHERE id = ?1",
                params![id.to_string()],
                row_to_raw_collection,
            )
            .optional()
            .context("Failed to get raw collection")?;

        Ok(collection)
    }

    /// Collections still awaiting processing
    pub fn pending_collections(&self) -> Result<Vec<RawCollection>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, provider, query, country, page, payload, job_count,
                    response_time_ms, status_code, processing_status, collected_at
             FROM raw_collections WHERE processing_status = 'pending'
             ORDER BY collected_at",
        )?;

        let collections = stmt
            .query_map([], row_to_raw_collection)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to list pending collections")?;

        Ok(collections)
    }

    pub fn update_collection_status(&self, id: Uuid, status: ProcessingStatus) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE raw_collections SET processing_status = ?2 WHERE id = ?1",
                params![id.to_string(), status.as_str()],
            )
            .context("Failed to update collection status")?;

        if changed == 0 {
            anyhow::bail!("No raw collection with id {id}");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Normalized jobs
    // ------------------------------------------------------------------

    pub fn insert_normalized_job(&self, record: &NormalizedJobRecord) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO normalized_jobs
                (id, collection_id, job_index, title, company, location, description,
                 requirements, responsibilities, job_type, remote_type, experience_level,
                 salary_min, salary_max, salary_currency, skills, tech_stack, benefits,
                 apply_url, source_id, posted_at, expires_at, embedding, quality_score,
                 duplicate_of, load_status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                    ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27)
            "#,
            params![
                record.id.to_string(),
                record.collection_id.to_string(),
                record.job_index as i64,
                record.title,
                record.company,
                record.location,
                record.description,
                serde_json::to_string(&record.requirements)?,
                serde_json::to_string(&record.responsibilities)?,
                record.job_type.map(|t| t.as_str()),
                record.remote_type.map(|t| t.as_str()),
                record.experience_level.as_str(),
                record.salary_min,
                record.salary_max,
                record.salary_currency,
                serde_json::to_string(&record.skills)?,
                serde_json::to_string(&record.tech_stack)?,
                serde_json::to_string(&record.benefits)?,
                record.apply_url,
                record.source_id,
                record.posted_at.map(|t| t.to_rfc3339()),
                record.expires_at.map(|t| t.to_rfc3339()),
                record
                    .embedding
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                record.quality_score,
                record.duplicate_of.map(|u| u.to_string()),
                record.load_status.as_str(),
                record.created_at.to_rfc3339(),
            ],
        )
        .context("Failed to insert normalized job")?;

        Ok(())
    }

    /// Records in one processing batch still awaiting load
    pub fn pending_normalized_jobs(&self, collection_id: Uuid) -> Result<Vec<NormalizedJobRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, collection_id, job_index, title, company, location, description,
                    requirements, responsibilities, job_type, remote_type, experience_level,
                    salary_min, salary_max, salary_currency, skills, tech_stack, benefits,
                    apply_url, source_id, posted_at, expires_at, embedding, quality_score,
                    duplicate_of, load_status, created_at
             FROM normalized_jobs
             WHERE collection_id = ?1 AND load_status = 'pending'
             ORDER BY job_index",
        )?;

        let records = stmt
            .query_map(params![collection_id.to_string()], row_to_normalized_job)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to list pending normalized jobs")?;

        Ok(records)
    }

    /// Batches (collection ids) that still have records awaiting load
    pub fn collections_with_pending_jobs(&self) -> Result<Vec<Uuid>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT collection_id FROM normalized_jobs WHERE load_status = 'pending'",
        )?;

        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .filter_map(|r| r.ok())
            .filter_map(|s| Uuid::parse_str(&s).ok())
            .collect();

        Ok(ids)
    }

    /// Mark one record's load outcome, optionally linking it to a canonical
    pub fn update_load_status(
        &self,
        id: Uuid,
        status: ProcessingStatus,
        duplicate_of: Option<Uuid>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE normalized_jobs SET load_status = ?2, duplicate_of = ?3 WHERE id = ?1",
            params![
                id.to_string(),
                status.as_str(),
                duplicate_of.map(|u| u.to_string())
            ],
        )
        .context("Failed to update load status")?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Canonical jobs
    // ------------------------------------------------------------------

    pub fn insert_canonical_job(&self, record: &CanonicalJobRecord) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO canonical_jobs
                (id, title, company, location, description, job_type, remote_type,
                 experience_level, salary_min, salary_max, salary_currency, skills,
                 tech_stack, benefits, apply_url, source_count, status,
                 first_seen_at, last_seen_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                    ?15, ?16, ?17, ?18, ?19)
            "#,
            params![
                record.id.to_string(),
                record.title,
                record.company,
                record.location,
                record.description,
                record.job_type.map(|t| t.as_str()),
                record.remote_type.map(|t| t.as_str()),
                record.experience_level.as_str(),
                record.salary_min,
                record.salary_max,
                record.salary_currency,
                serde_json::to_string(&record.skills)?,
                serde_json::to_string(&record.tech_stack)?,
                serde_json::to_string(&record.benefits)?,
                record.apply_url,
                record.source_count,
                record.status.as_str(),
                record.first_seen_at.to_rfc3339(),
                record.last_seen_at.to_rfc3339(),
            ],
        )
        .context("Failed to insert canonical job")?;

        Ok(())
    }

    pub fn get_canonical_job(&self, id: Uuid) -> Result<Option<CanonicalJobRecord>> {
        let conn = self.conn.lock().unwrap();
        let record = conn
            .query_row(
                &format!("{CANONICAL_SELECT} WHERE id = ?1"),
                params![id.to_string()],
                row_to_canonical_job,
            )
            .optional()
            .context("Failed to get canonical job")?;

        Ok(record)
    }

    /// Indexed exact-match lookup by application URL over active records
    pub fn find_canonical_by_url(&self, apply_url: &str) -> Result<Option<CanonicalJobRecord>> {
        let conn = self.conn.lock().unwrap();
        let record = conn
            .query_row(
                &format!("{CANONICAL_SELECT} WHERE apply_url = ?1 AND status = 'active' LIMIT 1"),
                params![apply_url],
                row_to_canonical_job,
            )
            .optional()
            .context("Failed to find canonical by URL")?;

        Ok(record)
    }

    /// Bounded fuzzy candidate search: active canonical records whose title
    /// and company substring-match (either direction, case-insensitive).
    pub fn find_canonical_candidates(
        &self,
        title: &str,
        company: &str,
        limit: usize,
    ) -> Result<Vec<CanonicalJobRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "{CANONICAL_SELECT}
             WHERE status = 'active'
               AND (instr(lower(title), ?1) > 0 OR instr(?1, lower(title)) > 0)
               AND (instr(lower(company), ?2) > 0 OR instr(?2, lower(company)) > 0)
             ORDER BY last_seen_at DESC
             LIMIT ?3"
        ))?;

        let candidates = stmt
            .query_map(
                params![title.to_lowercase(), company.to_lowercase(), limit as i64],
                row_to_canonical_job,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to search canonical candidates")?;

        Ok(candidates)
    }

    /// Bump `source_count` and `last_seen_at` on a duplicate match
    pub fn increment_source_count(&self, id: Uuid) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE canonical_jobs
                 SET source_count = source_count + 1, last_seen_at = ?2
                 WHERE id = ?1",
                params![id.to_string(), Utc::now().to_rfc3339()],
            )
            .context("Failed to increment source count")?;

        if changed == 0 {
            anyhow::bail!("No canonical job with id {id}");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Duplication links
    // ------------------------------------------------------------------

    pub fn insert_duplication_link(&self, link: &DuplicationLink) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO duplication_links
                (id, canonical_id, duplicate_id, confidence_score, matching_fields,
                 reviewed, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                link.id.to_string(),
                link.canonical_id.to_string(),
                link.duplicate_id.to_string(),
                link.confidence_score,
                serde_json::to_string(&link.matching_fields)?,
                link.reviewed,
                link.created_at.to_rfc3339(),
            ],
        )
        .context("Failed to insert duplication link")?;

        Ok(())
    }

    pub fn links_for_canonical(&self, canonical_id: Uuid) -> Result<Vec<DuplicationLink>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, canonical_id, duplicate_id, confidence_score, matching_fields,
                    reviewed, created_at
             FROM duplication_links WHERE canonical_id = ?1 ORDER BY created_at",
        )?;

        let links = stmt
            .query_map(params![canonical_id.to_string()], row_to_link)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to list duplication links")?;

        Ok(links)
    }

    /// Delete unreviewed links older than the cutoff and below the
    /// confidence floor; returns the number removed.
    pub fn delete_stale_links(
        &self,
        older_than: DateTime<Utc>,
        confidence_below: f64,
    ) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn
            .execute(
                "DELETE FROM duplication_links
                 WHERE reviewed = 0 AND created_at < ?1 AND confidence_score < ?2",
                params![older_than.to_rfc3339(), confidence_below],
            )
            .context("Failed to delete stale duplication links")?;

        Ok(deleted)
    }

    // ------------------------------------------------------------------
    // Embeddings
    // ------------------------------------------------------------------

    /// Store an embedding keyed by content hash (idempotent)
    pub fn store_embedding(&self, content_hash: &str, vector: &[f32]) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO embeddings (content_hash, vector, created_at)
             VALUES (?1, ?2, ?3)",
            params![
                content_hash,
                serde_json::to_string(vector)?,
                Utc::now().to_rfc3339()
            ],
        )
        .context("Failed to store embedding")?;

        Ok(())
    }

    pub fn get_embedding(&self, content_hash: &str) -> Result<Option<Vec<f32>>> {
        let conn = self.conn.lock().unwrap();
        let raw: Option<String> = conn
            .query_row(
                "SELECT vector FROM embeddings WHERE content_hash = ?1",
                params![content_hash],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to get embedding")?;

        raw.map(|s| serde_json::from_str(&s).context("Corrupt embedding vector"))
            .transpose()
    }

    // ------------------------------------------------------------------
    // Operation logs
    // ------------------------------------------------------------------

    /// Record a freshly opened operation log
    pub fn insert_operation_log(&self, log: &OperationLog) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO operation_logs
                (id, operation_type, status, input_summary, output_summary,
                 error_detail, items_total, items_failed, started_at, completed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                log.id.to_string(),
                log.operation_type.as_str(),
                log.status.as_str(),
                log.input_summary,
                log.output_summary,
                log.error_detail,
                log.items_total as i64,
                log.items_failed as i64,
                log.started_at.to_rfc3339(),
                log.completed_at.map(|t| t.to_rfc3339()),
            ],
        )
        .context("Failed to insert operation log")?;

        Ok(())
    }

    /// Write the terminal state of an operation log
    pub fn complete_operation_log(&self, log: &OperationLog) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE operation_logs
             SET status = ?2, output_summary = ?3, error_detail = ?4,
                 items_total = ?5, items_failed = ?6, completed_at = ?7
             WHERE id = ?1",
            params![
                log.id.to_string(),
                log.status.as_str(),
                log.output_summary,
                log.error_detail,
                log.items_total as i64,
                log.items_failed as i64,
                log.completed_at.map(|t| t.to_rfc3339()),
            ],
        )
        .context("Failed to complete operation log")?;

        Ok(())
    }

    pub fn get_operation_log(&self, id: Uuid) -> Result<Option<OperationLog>> {
        let conn = self.conn.lock().unwrap();
        let log = conn
            .query_row(
                "SELECT id, operation_type, status, input_summary, output_summary,
                        error_detail, items_total, items_failed, started_at, completed_at
                 FROM operation_logs WHERE id = ?1",
                params![id.to_string()],
                row_to_operation_log,
            )
            .optional()
            .context("Failed to get operation log")?;

        Ok(log)
    }

    /// Logs started after the cutoff, optionally filtered by type
    pub fn recent_operation_logs(
        &self,
        since: DateTime<Utc>,
        operation_type: Option<OperationType>,
    ) -> Result<Vec<OperationLog>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, operation_type, status, input_summary, output_summary,
                    error_detail, items_total, items_failed, started_at, completed_at
             FROM operation_logs
             WHERE started_at >= ?1 AND (?2 IS NULL OR operation_type = ?2)
             ORDER BY started_at DESC",
        )?;

        let logs = stmt
            .query_map(
                params![since.to_rfc3339(), operation_type.map(|t| t.as_str())],
                row_to_operation_log,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to list recent operation logs")?;

        Ok(logs)
    }

    // ------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------

    pub fn statistics(&self) -> Result<PipelineStatistics> {
        let conn = self.conn.lock().unwrap();

        let raw_collections: i64 =
            conn.query_row("SELECT COUNT(*) FROM raw_collections", [], |r| r.get(0))?;
        let normalized_jobs: i64 =
            conn.query_row("SELECT COUNT(*) FROM normalized_jobs", [], |r| r.get(0))?;
        let canonical_jobs: i64 =
            conn.query_row("SELECT COUNT(*) FROM canonical_jobs", [], |r| r.get(0))?;
        let duplication_links: i64 =
            conn.query_row("SELECT COUNT(*) FROM duplication_links", [], |r| r.get(0))?;

        let latest: Option<String> = conn.query_row(
            "SELECT MAX(collected_at) FROM raw_collections",
            [],
            |r| r.get(0),
        )?;

        Ok(PipelineStatistics {
            raw_collections: raw_collections as usize,
            normalized_jobs: normalized_jobs as usize,
            canonical_jobs: canonical_jobs as usize,
            duplication_links: duplication_links as usize,
            latest_collection_at: latest.and_then(|s| parse_timestamp(&s)),
        })
    }
}

const CANONICAL_SELECT: &str = "SELECT id, title, company, location, description, job_type,
        remote_type, experience_level, salary_min, salary_max, salary_currency,
        skills, tech_stack, benefits, apply_url, source_count, status,
        first_seen_at, last_seen_at
 FROM canonical_jobs";

// ------------------------------------------------------------------
// Row mapping
// ------------------------------------------------------------------

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap_or_default()
}

fn json_vec(raw: String) -> Vec<String> {
    serde_json::from_str(&raw).unwrap_or_default()
}

fn row_to_raw_collection(row: &Row<'_>) -> rusqlite::Result<RawCollection> {
    let payload_raw: String = row.get(5)?;
    Ok(RawCollection {
        id: parse_uuid(&row.get::<_, String>(0)?),
        provider: row.get(1)?,
        query: CollectionQuery {
            query: row.get(2)?,
            country: row.get(3)?,
            page: row.get(4)?,
        },
        payload: serde_json::from_str(&payload_raw).unwrap_or(serde_json::Value::Null),
        metadata: CollectionMetadata {
            job_count: row.get::<_, i64>(6)? as usize,
            response_time_ms: row.get::<_, i64>(7)? as u64,
            status_code: row.get::<_, i64>(8)? as u16,
        },
        processing_status: row
            .get::<_, String>(9)?
            .parse()
            .unwrap_or(ProcessingStatus::Failed),
        collected_at: parse_timestamp(&row.get::<_, String>(10)?).unwrap_or_else(Utc::now),
    })
}

fn row_to_normalized_job(row: &Row<'_>) -> rusqlite::Result<NormalizedJobRecord> {
    Ok(NormalizedJobRecord {
        id: parse_uuid(&row.get::<_, String>(0)?),
        collection_id: parse_uuid(&row.get::<_, String>(1)?),
        job_index: row.get::<_, i64>(2)? as usize,
        title: row.get(3)?,
        company: row.get(4)?,
        location: row.get(5)?,
        description: row.get(6)?,
        requirements: json_vec(row.get(7)?),
        responsibilities: json_vec(row.get(8)?),
        job_type: row
            .get::<_, Option<String>>(9)?
            .and_then(|s| JobType::parse(&s)),
        remote_type: row
            .get::<_, Option<String>>(10)?
            .and_then(|s| RemoteType::parse(&s)),
        experience_level: ExperienceLevel::parse(&row.get::<_, String>(11)?)
            .unwrap_or(ExperienceLevel::MidLevel),
        salary_min: row.get(12)?,
        salary_max: row.get(13)?,
        salary_currency: row.get(14)?,
        skills: json_vec(row.get(15)?),
        tech_stack: json_vec(row.get(16)?),
        benefits: json_vec(row.get(17)?),
        apply_url: row.get(18)?,
        source_id: row.get(19)?,
        posted_at: row
            .get::<_, Option<String>>(20)?
            .and_then(|s| parse_timestamp(&s)),
        expires_at: row
            .get::<_, Option<String>>(21)?
            .and_then(|s| parse_timestamp(&s)),
        embedding: row
            .get::<_, Option<String>>(22)?
            .and_then(|s| serde_json::from_str(&s).ok()),
        quality_score: row.get(23)?,
        duplicate_of: row
            .get::<_, Option<String>>(24)?
            .and_then(|s| Uuid::parse_str(&s).ok()),
        load_status: row
            .get::<_, String>(25)?
            .parse()
            .unwrap_or(ProcessingStatus::Failed),
        created_at: parse_timestamp(&row.get::<_, String>(26)?).unwrap_or_else(Utc::now),
    })
}

fn row_to_canonical_job(row: &Row<'_>) -> rusqlite::Result<CanonicalJobRecord> {
    Ok(CanonicalJobRecord {
        id: parse_uuid(&row.get::<_, String>(0)?),
        title: row.get(1)?,
        company: row.get(2)?,
        location: row.get(3)?,
        description: row.get(4)?,
        job_type: row
            .get::<_, Option<String>>(5)?
            .and_then(|s| JobType::parse(&s)),
        remote_type: row
            .get::<_, Option<String>>(6)?
            .and_then(|s| RemoteType::parse(&s)),
        experience_level: ExperienceLevel::parse(&row.get::<_, String>(7)?)
            .unwrap_or(ExperienceLevel::MidLevel),
        salary_min: row.get(8)?,
        salary_max: row.get(9)?,
        salary_currency: row.get(10)?,
        skills: json_vec(row.get(11)?),
        tech_stack: json_vec(row.get(12)?),
        benefits: json_vec(row.get(13)?),
        apply_url: row.get(14)?,
        source_count: row.get::<_, i64>(15)? as u32,
        status: row
            .get::<_, String>(16)?
            .parse()
            .unwrap_or(CanonicalStatus::Active),
        first_seen_at: parse_timestamp(&row.get::<_, String>(17)?).unwrap_or_else(Utc::now),
        last_seen_at: parse_timestamp(&row.get::<_, String>(18)?).unwrap_or_else(Utc::now),
    })
}

fn row_to_link(row: &Row<'_>) -> rusqlite::Result<DuplicationLink> {
    Ok(DuplicationLink {
        id: parse_uuid(&row.get::<_, String>(0)?),
        canonical_id: parse_uuid(&row.get::<_, String>(1)?),
        duplicate_id: parse_uuid(&row.get::<_, String>(2)?),
        confidence_score: row.get(3)?,
        matching_fields: json_vec(row.get(4)?),
        reviewed: row.get(5)?,
        created_at: parse_timestamp(&row.get::<_, String>(6)?).unwrap_or_else(Utc::now),
    })
}

fn row_to_operation_log(row: &Row<'_>) -> rusqlite::Result<OperationLog> {
    Ok(OperationLog {
        id: parse_uuid(&row.get::<_, String>(0)?),
        operation_type: row
            .get::<_, String>(1)?
            .parse()
            .unwrap_or(OperationType::Maintenance),
        status: row
            .get::<_, String>(2)?
            .parse()
            .unwrap_or(ProcessingStatus::Failed),
        input_summary: row.get(3)?,
        output_summary: row.get(4)?,
        error_detail: row.get(5)?,
        items_total: row.get::<_, i64>(6)? as usize,
        items_failed: row.get::<_, i64>(7)? as usize,
        started_at: parse_timestamp(&row.get::<_, String>(8)?).unwrap_or_else(Utc::now),
        completed_at: row
            .get::<_, Option<String>>(9)?
            .and_then(|s| parse_timestamp(&s)),
    })
}
