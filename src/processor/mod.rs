//! Transformation of raw collections into normalized job records
//!
//! The processor loads one raw collection, walks its job entries in array
//! order and transforms each independently: text normalization, keyword
//! classification, salary/skills/section extraction and quality scoring.
//! A malformed entry is recorded as a skip (with its raw payload for
//! diagnosis) and never aborts the batch; only a batch-level failure (the
//! collection itself missing or unreadable) fails the whole operation.

pub mod classify;
pub mod extract;
pub mod normalize;
pub mod quality;

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::config::ProcessorConfig;
use crate::metrics;
use crate::models::{
    NormalizedJobRecord, OperationLog, OperationType, ProcessingStatus, RawCollection,
};
use crate::storage::SqliteStore;
use crate::utils::error::ProcessError;
use classify::{classify_job_type, classify_remote_type, infer_experience_level};
use extract::{extract_salary, extract_sections, extract_skills, extract_tech_stack};
use normalize::normalize_opt;
use quality::quality_score;

/// Outcome of transforming one raw entry.
///
/// Skips are ordinary values, not errors: the batch loop consumes them and
/// keeps going. Only batch-level problems travel as errors.
#[derive(Debug)]
pub enum EntryOutcome {
    Normalized(Box<NormalizedJobRecord>),
    Skipped {
        reason: String,
        raw: serde_json::Value,
    },
}

/// One recorded entry failure, kept with its payload for diagnosis
#[derive(Debug, serde::Serialize)]
struct EntryFailure {
    job_index: usize,
    reason: String,
    raw: serde_json::Value,
}

/// Transforms raw collections into normalized records
pub struct Processor {
    store: Arc<SqliteStore>,
    config: ProcessorConfig,
}

impl Processor {
    pub fn new(config: ProcessorConfig, store: Arc<SqliteStore>) -> Self {
        Self { store, config }
    }

    /// Process one raw collection, returning the processing log id.
    ///
    /// The collection's own status is advanced to mirror the outcome. An
    /// error return always corresponds to a `Failed` operation log.
    pub async fn process(&self, collection_id: Uuid) -> anyhow::Result<Uuid> {
        let mut log = OperationLog::begin(
            OperationType::Processing,
            format!("collection {collection_id}"),
        );
        self.store.insert_operation_log(&log)?;

        let collection = match self.load_processable(collection_id) {
            Ok(collection) => collection,
            Err(e) => {
                log.complete(ProcessingStatus::Failed, "batch unreadable", Some(e.to_string()));
                self.store.complete_operation_log(&log)?;
                return Err(e);
            }
        };

        let entries = match collection.entries() {
            Some(entries) => entries,
            None => {
                let err = ProcessError::MissingEntryArray;
                log.complete(ProcessingStatus::Failed, "batch unreadable", Some(err.to_string()));
                self.store.complete_operation_log(&log)?;
                self.store
                    .update_collection_status(collection_id, ProcessingStatus::Failed)?;
                return Err(err.into());
            }
        };

        let mut normalized = 0usize;
        let mut failures: Vec<EntryFailure> = Vec::new();

        for (job_index, value) in entries.iter().enumerate() {
            match normalize_entry(collection_id, job_index, value, &self.config) {
                EntryOutcome::Normalized(record) => {
                    match self.store.insert_normalized_job(&record) {
                        Ok(()) => {
                            normalized += 1;
                            metrics::record_entry_processed("normalized");
                        }
                        Err(e) => {
                            tracing::warn!(job_index, error = %e, "Failed to store normalized entry");
                            metrics::record_entry_processed("skipped");
                            failures.push(EntryFailure {
                                job_index,
                                reason: format!("store failed: {e}"),
                                raw: value.clone(),
                            });
                        }
                    }
                }
                EntryOutcome::Skipped { reason, raw } => {
                    tracing::warn!(job_index, %reason, "Skipped malformed entry");
                    metrics::record_entry_processed("skipped");
                    failures.push(EntryFailure {
                        job_index,
                        reason,
                        raw,
                    });
                }
            }
        }

        let total = entries.len();
        let status = ProcessingStatus::from_failure_tally(total, failures.len());

        log.items_total = total;
        log.items_failed = failures.len();
        let error_detail = if failures.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&failures)?)
        };
        log.complete(
            status,
            format!("normalized {normalized} of {total} entries"),
            error_detail,
        );
        self.store.complete_operation_log(&log)?;
        self.store.update_collection_status(collection_id, status)?;

        tracing::info!(
            %collection_id,
            normalized,
            failed = failures.len(),
            status = %status,
            "Processing finished"
        );

        Ok(log.id)
    }

    /// Load the collection and mark it as in progress
    fn load_processable(&self, collection_id: Uuid) -> anyhow::Result<RawCollection> {
        let collection = self
            .store
            .get_raw_collection(collection_id)?
            .ok_or(ProcessError::CollectionNotFound(collection_id))?;

        if collection.processing_status.is_terminal() {
            return Err(ProcessError::AlreadyTerminal(
                collection_id,
                collection.processing_status,
            )
            .into());
        }

        self.store
            .update_collection_status(collection_id, ProcessingStatus::Processing)?;

        Ok(collection)
    }
}

/// Transform one raw entry into a normalized record.
///
/// Pure with respect to storage; the caller persists the result.
pub fn normalize_entry(
    collection_id: Uuid,
    job_index: usize,
    value: &serde_json::Value,
    config: &ProcessorConfig,
) -> EntryOutcome {
    let entry: crate::models::RawJobEntry = match serde_json::from_value(value.clone()) {
        Ok(entry) => entry,
        Err(e) => {
            return EntryOutcome::Skipped {
                reason: format!("entry does not match schema: {e}"),
                raw: value.clone(),
            }
        }
    };

    let title = normalize_opt(entry.job_title.as_deref()).unwrap_or_default();
    let company = normalize_opt(entry.employer_name.as_deref()).unwrap_or_default();
    let description = normalize_opt(entry.job_description.as_deref()).unwrap_or_default();

    if title.is_empty() && company.is_empty() && description.is_empty() {
        return EntryOutcome::Skipped {
            reason: "entry has no usable fields".to_string(),
            raw: value.clone(),
        };
    }

    let location = join_location(&entry);

    let job_type = classify_job_type(entry.job_employment_type.as_deref(), &description);
    let remote_type =
        classify_remote_type(entry.job_is_remote, location.as_deref(), &description);
    let experience_level =
        infer_experience_level(&title, &description, config.default_experience_level);

    let salary = extract_salary(&entry, &description);
    let sections = extract_sections(&description);
    let skills = extract_skills(&description);
    let tech_stack = extract_tech_stack(&description);

    let benefits = entry
        .job_benefits
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter_map(|b| normalize_opt(Some(b.as_str())))
        .collect();

    let mut record = NormalizedJobRecord {
        id: Uuid::new_v4(),
        collection_id,
        job_index,
        title,
        company,
        location,
        description,
        requirements: sections.requirements,
        responsibilities: sections.responsibilities,
        job_type,
        remote_type,
        experience_level,
        salary_min: salary.min,
        salary_max: salary.max,
        salary_currency: salary.currency,
        skills,
        tech_stack,
        benefits,
        apply_url: entry.job_apply_link.clone(),
        source_id: entry.job_id.clone(),
        posted_at: entry.job_posted_at_datetime_utc,
        expires_at: entry.job_offer_expiration_datetime_utc,
        embedding: entry.embedding.clone(),
        quality_score: 0.0,
        duplicate_of: None,
        load_status: ProcessingStatus::Pending,
        created_at: Utc::now(),
    };
    record.quality_score = quality_score(
        &record,
        &config.quality_weights,
        config.min_description_length,
    );

    EntryOutcome::Normalized(Box::new(record))
}

fn join_location(entry: &crate::models::RawJobEntry) -> Option<String> {
    let parts: Vec<String> = [&entry.job_city, &entry.job_state, &entry.job_country]
        .into_iter()
        .filter_map(|p| normalize_opt(p.as_deref()))
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}
