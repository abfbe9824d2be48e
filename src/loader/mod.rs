//! Idempotent loading of normalized records into canonical storage
//!
//! For every pending record in a processing batch the loader consults the
//! duplication detector. First sighting creates a canonical record (and
//! stores the embedding vector when one is present); a match increments the
//! canonical's source count and records a duplication link. Records succeed
//! or fail independently; the batch completes as partial when some fail.
//!
//! `cleanup_old_duplicates` is a maintenance sweep over the link table, not
//! part of the hot load path.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::config::LoaderConfig;
use crate::dedup::DuplicationDetector;
use crate::metrics;
use crate::models::{
    CanonicalJobRecord, DuplicationLink, NormalizedJobRecord, OperationLog, OperationType,
    ProcessingStatus,
};
use crate::storage::SqliteStore;

/// Loads processed batches into canonical storage
pub struct Loader {
    store: Arc<SqliteStore>,
    detector: DuplicationDetector,
    config: LoaderConfig,
}

impl Loader {
    pub fn new(config: LoaderConfig, detector: DuplicationDetector, store: Arc<SqliteStore>) -> Self {
        Self {
            store,
            detector,
            config,
        }
    }

    /// Load every pending record of one processing batch, returning the
    /// operation log id.
    pub async fn load_batch(&self, collection_id: Uuid) -> anyhow::Result<Uuid> {
        let mut log = OperationLog::begin(OperationType::Loading, format!("batch {collection_id}"));
        self.store.insert_operation_log(&log)?;

        let records = match self.store.pending_normalized_jobs(collection_id) {
            Ok(records) => records,
            Err(e) => {
                log.complete(ProcessingStatus::Failed, "batch unreadable", Some(e.to_string()));
                self.store.complete_operation_log(&log)?;
                return Err(e);
            }
        };

        let mut loaded_new = 0usize;
        let mut loaded_duplicate = 0usize;
        let mut failed = 0usize;

        for record in &records {
            match self.load_one(record) {
                Ok(was_duplicate) => {
                    if was_duplicate {
                        loaded_duplicate += 1;
                        metrics::record_job_loaded("duplicate");
                    } else {
                        loaded_new += 1;
                        metrics::record_job_loaded("canonical");
                    }
                }
                Err(e) => {
                    tracing::warn!(record_id = %record.id, error = %e, "Record load failed");
                    failed += 1;
                    metrics::record_job_loaded("failed");
                    // Best effort: a record whose status update also fails
                    // stays pending and is retried by the next load.
                    if let Err(e) =
                        self.store
                            .update_load_status(record.id, ProcessingStatus::Failed, None)
                    {
                        tracing::warn!(record_id = %record.id, error = %e, "Load status update failed");
                    }
                }
            }
        }

        let status = ProcessingStatus::from_failure_tally(records.len(), failed);
        log.items_total = records.len();
        log.items_failed = failed;
        log.complete(
            status,
            format!(
                "loaded {loaded_new} new, {loaded_duplicate} duplicates, {failed} failed"
            ),
            None,
        );
        self.store.complete_operation_log(&log)?;

        tracing::info!(
            %collection_id,
            new = loaded_new,
            duplicates = loaded_duplicate,
            failed,
            status = %status,
            "Batch load finished"
        );

        Ok(log.id)
    }

    /// Load a single record; returns whether it resolved as a duplicate
    fn load_one(&self, record: &NormalizedJobRecord) -> anyhow::Result<bool> {
        match self.detector.find_duplicate(record)? {
            None => {
                let canonical = CanonicalJobRecord::from_normalized(record);
                self.store.insert_canonical_job(&canonical)?;

                if let Some(embedding) = record.embedding.as_deref() {
                    self.store
                        .store_embedding(&record.content_hash(), embedding)?;
                }

                self.store
                    .update_load_status(record.id, ProcessingStatus::Completed, None)?;
                Ok(false)
            }
            Some(found) => {
                self.store.increment_source_count(found.canonical_id)?;

                let link = DuplicationLink::new(
                    found.canonical_id,
                    record.id,
                    self.config.duplicate_confidence,
                    found.matching_fields,
                );
                self.store.insert_duplication_link(&link)?;

                self.store.update_load_status(
                    record.id,
                    ProcessingStatus::Completed,
                    Some(found.canonical_id),
                )?;
                Ok(true)
            }
        }
    }

    /// Delete old, unreviewed, low-confidence duplication links.
    ///
    /// Returns the number of links removed.
    pub fn cleanup_old_duplicates(&self, days: i64) -> anyhow::Result<usize> {
        let cutoff = Utc::now() - Duration::days(days);
        let deleted = self
            .store
            .delete_stale_links(cutoff, self.config.cleanup_confidence_cutoff)?;

        if deleted > 0 {
            tracing::info!(deleted, days, "Cleaned up stale duplication links");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{CollectionMetadata, CollectionQuery, ExperienceLevel, RawCollection};

    fn loader_with_store() -> (Loader, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let config = Config::default();
        let detector = DuplicationDetector::new(config.dedup.clone(), store.clone());
        (Loader::new(config.loader, detector, store.clone()), store)
    }

    fn stored_record(
        store: &SqliteStore,
        title: &str,
        company: &str,
        location: &str,
        source_id: &str,
    ) -> NormalizedJobRecord {
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

        let record = NormalizedJobRecord {
            id: Uuid::new_v4(),
            collection_id: collection.id,
            job_index: 0,
            title: title.to_string(),
            company: company.to_string(),
            location: Some(location.to_string()),
            description: "Build things with care and ownership every day.".into(),
            requirements: vec![],
            responsibilities: vec![],
            job_type: None,
            remote_type: None,
            experience_level: ExperienceLevel::MidLevel,
            salary_min: None,
            salary_max: None,
            salary_currency: None,
            skills: vec![],
            tech_stack: vec![],
            benefits: vec![],
            apply_url: None,
            source_id: Some(source_id.to_string()),
            posted_at: None,
            expires_at: None,
            embedding: Some(vec![0.25, 0.5]),
            quality_score: 1.0,
            duplicate_of: None,
            load_status: ProcessingStatus::Pending,
            created_at: Utc::now(),
        };
        store.insert_normalized_job(&record).unwrap();
        record
    }

    #[tokio::test]
    async fn test_first_sighting_creates_canonical_and_embedding() {
        let (loader, store) = loader_with_store();
        let record = stored_record(&store, "Backend Engineer", "Acme", "Berlin", "p1");

        let log_id = loader.load_batch(record.collection_id).await.unwrap();
        let log = store.get_operation_log(log_id).unwrap().unwrap();
        assert_eq!(log.status, ProcessingStatus::Completed);

        let stats = store.statistics().unwrap();
        assert_eq!(stats.canonical_jobs, 1);
        assert_eq!(stats.duplication_links, 0);

        // Embedding stored under the content hash
        let embedding = store.get_embedding(&record.content_hash()).unwrap();
        assert_eq!(embedding, Some(vec![0.25, 0.5]));
    }

    #[tokio::test]
    async fn test_idempotent_duplicate_resolution() {
        let (loader, store) = loader_with_store();

        // Same title/company/location from two different raw postings
        let first = stored_record(&store, "Backend Engineer", "Acme", "Berlin", "provider-a");
        let second = stored_record(&store, "Backend Engineer", "Acme", "Berlin", "provider-b");

        loader.load_batch(first.collection_id).await.unwrap();
        loader.load_batch(second.collection_id).await.unwrap();

        // Exactly one canonical record with source_count == 2
        let stats = store.statistics().unwrap();
        assert_eq!(stats.canonical_jobs, 1);
        assert_eq!(stats.duplication_links, 1);

        let canonical = store
            .find_canonical_candidates("backend engineer", "acme", 10)
            .unwrap()
            .remove(0);
        assert_eq!(canonical.source_count, 2);

        let links = store.links_for_canonical(canonical.id).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].duplicate_id, second.id);
        assert_eq!(links[0].confidence_score, 0.9);

        // The duplicate points directly at the canonical record
        let pending = store.pending_normalized_jobs(second.collection_id).unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch_completes() {
        let (loader, store) = loader_with_store();
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

        let log_id = loader.load_batch(collection.id).await.unwrap();
        let log = store.get_operation_log(log_id).unwrap().unwrap();
        assert_eq!(log.status, ProcessingStatus::Completed);
        assert_eq!(log.items_total, 0);
    }

    #[tokio::test]
    async fn test_cleanup_respects_review_and_confidence() {
        let (loader, store) = loader_with_store();
        let canonical_id = Uuid::new_v4();

        let mut stale = DuplicationLink::new(canonical_id, Uuid::new_v4(), 0.5, vec![]);
        stale.created_at = Utc::now() - Duration::days(90);
        let mut stale_reviewed = DuplicationLink::new(canonical_id, Uuid::new_v4(), 0.5, vec![]);
        stale_reviewed.created_at = Utc::now() - Duration::days(90);
        stale_reviewed.reviewed = true;
        let confident = DuplicationLink::new(canonical_id, Uuid::new_v4(), 0.9, vec![]);

        for link in [&stale, &stale_reviewed, &confident] {
            store.insert_duplication_link(link).unwrap();
        }

        let deleted = loader.cleanup_old_duplicates(30).unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.links_for_canonical(canonical_id).unwrap().len(), 2);
    }
}
