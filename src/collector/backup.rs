//! Durability backup for raw payloads
//!
//! Every stored collection is mirrored to a date-partitioned JSON file so a
//! storage loss never costs raw data. Layout:
//!
//! ```text
//! <raw_data_dir>/<year>/<month>/<day>/<provider>_<collection_id>.json
//! ```
//!
//! Writes are atomic (temp file + rename). Backup failures are the caller's
//! to log; they must never fail the collection itself.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Datelike;

use crate::models::RawCollection;

/// Writes raw collections to the date-partitioned backup tree
pub struct RawBackupWriter {
    root: PathBuf,
}

impl RawBackupWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path a collection would be backed up to
    pub fn backup_path(&self, collection: &RawCollection) -> PathBuf {
        let date = collection.collected_at.date_naive();
        self.root
            .join(format!("{:04}", date.year()))
            .join(format!("{:02}", date.month()))
            .join(format!("{:02}", date.day()))
            .join(format!("{}_{}.json", collection.provider, collection.id))
    }

    /// Write one collection to its backup file.
    ///
    /// Serializes the full collection (payload plus metadata, timestamps in
    /// ISO-8601) and renames a temp file into place.
    pub async fn write(&self, collection: &RawCollection) -> Result<PathBuf> {
        let path = self.backup_path(collection);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create backup dir: {}", parent.display()))?;
        }

        let content = serde_json::to_vec_pretty(collection).context("Failed to serialize backup")?;

        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &content)
            .await
            .with_context(|| format!("Failed to write backup: {}", temp_path.display()))?;
        tokio::fs::rename(&temp_path, &path)
            .await
            .with_context(|| format!("Failed to finalize backup: {}", path.display()))?;

        Ok(path)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CollectionMetadata, CollectionQuery};

    fn sample_collection() -> RawCollection {
        RawCollection::new(
            "jsearch",
            CollectionQuery {
                query: "rust developer".into(),
                country: "us".into(),
                page: 1,
            },
            serde_json::json!({"data": [{"job_title": "Rust Developer"}]}),
            CollectionMetadata {
                job_count: 1,
                response_time_ms: 120,
                status_code: 200,
            },
        )
    }

    #[test]
    fn test_backup_path_layout() {
        let writer = RawBackupWriter::new("/tmp/raw");
        let collection = sample_collection();
        let path = writer.backup_path(&collection);

        let date = collection.collected_at.date_naive();
        let expected_tail = format!(
            "{:04}/{:02}/{:02}/jsearch_{}.json",
            date.year(),
            date.month(),
            date.day(),
            collection.id
        );
        assert!(path.to_string_lossy().ends_with(&expected_tail));
    }

    #[tokio::test]
    async fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let writer = RawBackupWriter::new(dir.path());
        let collection = sample_collection();

        let path = writer.write(&collection).await.unwrap();
        assert!(path.exists());

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let restored: RawCollection = serde_json::from_str(&content).unwrap();
        assert_eq!(restored.id, collection.id);
        assert_eq!(restored.metadata.job_count, 1);
        // No temp file left behind
        assert!(!path.with_extension("json.tmp").exists());
    }
}
