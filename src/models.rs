// Core data structures for the gleaner ingestion pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Lifecycle status shared by raw collections, normalized records and
/// operation logs.
///
/// `Pending` and `Processing` are transient; the remaining three are
/// terminal. Retrying means creating a new unit of work, never reopening a
/// terminal one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Partial,
    Failed,
}

impl ProcessingStatus {
    /// Convert to string representation (stored in SQLite)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }

    /// Whether this status ends the unit of work
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Partial | Self::Failed)
    }

    /// Terminal status for a batch given its failure tally.
    ///
    /// Zero failures completes the batch; any isolated failure downgrades it
    /// to partial. Batch-level exceptions map to `Failed` at the call site,
    /// never through this helper.
    pub fn from_failure_tally(total: usize, failed: usize) -> Self {
        if failed == 0 {
            Self::Completed
        } else {
            debug_assert!(failed <= total);
            Self::Partial
        }
    }
}

impl std::str::FromStr for ProcessingStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "pending" => Self::Pending,
            "processing" => Self::Processing,
            "completed" => Self::Completed,
            "partial" => Self::Partial,
            _ => Self::Failed,
        })
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Employment type classified from the raw posting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobType {
    FullTime,
    PartTime,
    Contract,
    Internship,
    Temporary,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FullTime => "full_time",
            Self::PartTime => "part_time",
            Self::Contract => "contract",
            Self::Internship => "internship",
            Self::Temporary => "temporary",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "full_time" | "fulltime" => Some(Self::FullTime),
            "part_time" | "parttime" => Some(Self::PartTime),
            "contract" | "contractor" => Some(Self::Contract),
            "internship" | "intern" => Some(Self::Internship),
            "temporary" | "temp" => Some(Self::Temporary),
            _ => None,
        }
    }
}

/// Work arrangement classified from the raw posting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemoteType {
    Remote,
    Hybrid,
    OnSite,
}

impl RemoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Hybrid => "hybrid",
            Self::OnSite => "on_site",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "remote" => Some(Self::Remote),
            "hybrid" => Some(Self::Hybrid),
            "on_site" | "onsite" => Some(Self::OnSite),
            _ => None,
        }
    }
}

/// Seniority inferred by the processor's layered heuristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExperienceLevel {
    EntryLevel,
    MidLevel,
    SeniorLevel,
    DirectorLevel,
    ExecutiveLevel,
}

impl ExperienceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EntryLevel => "entry_level",
            Self::MidLevel => "mid_level",
            Self::SeniorLevel => "senior_level",
            Self::DirectorLevel => "director_level",
            Self::ExecutiveLevel => "executive_level",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "entry_level" | "entry" => Some(Self::EntryLevel),
            "mid_level" | "mid" => Some(Self::MidLevel),
            "senior_level" | "senior" => Some(Self::SeniorLevel),
            "director_level" | "director" => Some(Self::DirectorLevel),
            "executive_level" | "executive" => Some(Self::ExecutiveLevel),
            _ => None,
        }
    }
}

/// One job entry as it arrives on the wire.
///
/// Every field is optional: providers disagree about which fields they
/// populate and the processor decides what a usable entry looks like.
/// Field names follow the upstream search API schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawJobEntry {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub employer_name: Option<String>,
    #[serde(default)]
    pub job_city: Option<String>,
    #[serde(default)]
    pub job_state: Option<String>,
    #[serde(default)]
    pub job_country: Option<String>,
    #[serde(default)]
    pub job_description: Option<String>,
    #[serde(default)]
    pub job_employment_type: Option<String>,
    #[serde(default)]
    pub job_is_remote: Option<bool>,
    #[serde(default)]
    pub job_min_salary: Option<f64>,
    #[serde(default)]
    pub job_max_salary: Option<f64>,
    #[serde(default)]
    pub job_salary_currency: Option<String>,
    #[serde(default)]
    pub job_salary_period: Option<String>,
    #[serde(default)]
    pub job_apply_link: Option<String>,
    #[serde(default)]
    pub job_posted_at_datetime_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    pub job_offer_expiration_datetime_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    pub job_publisher: Option<String>,
    #[serde(default)]
    pub job_benefits: Option<Vec<String>>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

/// Query parameters for one collection run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionQuery {
    pub query: String,
    pub country: String,
    pub page: u32,
}

/// Response metadata captured alongside the raw payload
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CollectionMetadata {
    pub job_count: usize,
    pub response_time_ms: u64,
    pub status_code: u16,
}

/// One API response page, persisted before any transformation.
///
/// Created by the collector; only the processor advances its status. Never
/// deleted in normal operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCollection {
    pub id: Uuid,
    pub provider: String,
    pub query: CollectionQuery,
    /// Opaque response document; entries live under the `data` key
    pub payload: serde_json::Value,
    pub metadata: CollectionMetadata,
    pub processing_status: ProcessingStatus,
    pub collected_at: DateTime<Utc>,
}

impl RawCollection {
    pub fn new(
        provider: &str,
        query: CollectionQuery,
        payload: serde_json::Value,
        metadata: CollectionMetadata,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider: provider.to_string(),
            query,
            payload,
            metadata,
            processing_status: ProcessingStatus::Pending,
            collected_at: Utc::now(),
        }
    }

    /// The job entries under the payload's `data` key.
    ///
    /// Returned as raw values so the processor can record entries that fail
    /// to deserialize as per-item skips instead of losing the whole page.
    pub fn entries(&self) -> Option<&Vec<serde_json::Value>> {
        self.payload.get("data").and_then(|v| v.as_array())
    }
}

/// One job entry after normalization.
///
/// Created by the processor; the loader mutates `load_status` (and sets
/// `duplicate_of` at resolution time). `duplicate_of` always points at a
/// canonical record, never at another normalized record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedJobRecord {
    pub id: Uuid,
    /// The raw collection this record was derived from
    pub collection_id: Uuid,
    /// Position within the raw payload's entry array
    pub job_index: usize,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub description: String,
    pub requirements: Vec<String>,
    pub responsibilities: Vec<String>,
    pub job_type: Option<JobType>,
    pub remote_type: Option<RemoteType>,
    pub experience_level: ExperienceLevel,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_currency: Option<String>,
    pub skills: Vec<String>,
    pub tech_stack: Vec<String>,
    pub benefits: Vec<String>,
    pub apply_url: Option<String>,
    pub source_id: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Upstream-provided embedding vector, stored by the loader when present
    pub embedding: Option<Vec<f32>>,
    /// Completeness metric in [0, 1]
    pub quality_score: f64,
    pub duplicate_of: Option<Uuid>,
    pub load_status: ProcessingStatus,
    pub created_at: DateTime<Utc>,
}

impl NormalizedJobRecord {
    /// SHA-256 over title and description, used as the embedding key
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.title.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.description.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Salary midpoint when at least one bound is present
    pub fn salary_midpoint(&self) -> Option<f64> {
        match (self.salary_min, self.salary_max) {
            (Some(min), Some(max)) => Some((min + max) / 2.0),
            (Some(v), None) | (None, Some(v)) => Some(v),
            (None, None) => None,
        }
    }
}

/// Lifecycle status of a canonical job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CanonicalStatus {
    Active,
    Inactive,
}

impl CanonicalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl std::str::FromStr for CanonicalStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "inactive" => Self::Inactive,
            _ => Self::Active,
        })
    }
}

/// The deduplicated, authoritative job entity.
///
/// Created by the loader on first sighting; `source_count` grows by one on
/// every subsequent match. A canonical record is never demoted into a
/// duplicate of another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalJobRecord {
    pub id: Uuid,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub description: String,
    pub job_type: Option<JobType>,
    pub remote_type: Option<RemoteType>,
    pub experience_level: ExperienceLevel,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_currency: Option<String>,
    pub skills: Vec<String>,
    pub tech_stack: Vec<String>,
    pub benefits: Vec<String>,
    pub apply_url: Option<String>,
    /// Number of raw postings merged into this record
    pub source_count: u32,
    pub status: CanonicalStatus,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl CanonicalJobRecord {
    /// Promote a normalized record into a fresh canonical entity
    pub fn from_normalized(record: &NormalizedJobRecord) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: record.title.clone(),
            company: record.company.clone(),
            location: record.location.clone(),
            description: record.description.clone(),
            job_type: record.job_type,
            remote_type: record.remote_type,
            experience_level: record.experience_level,
            salary_min: record.salary_min,
            salary_max: record.salary_max,
            salary_currency: record.salary_currency.clone(),
            skills: record.skills.clone(),
            tech_stack: record.tech_stack.clone(),
            benefits: record.benefits.clone(),
            apply_url: record.apply_url.clone(),
            source_count: 1,
            status: CanonicalStatus::Active,
            first_seen_at: now,
            last_seen_at: now,
        }
    }

    pub fn salary_midpoint(&self) -> Option<f64> {
        match (self.salary_min, self.salary_max) {
            (Some(min), Some(max)) => Some((min + max) / 2.0),
            (Some(v), None) | (None, Some(v)) => Some(v),
            (None, None) => None,
        }
    }
}

/// A recorded decision that one posting duplicates a canonical record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicationLink {
    pub id: Uuid,
    pub canonical_id: Uuid,
    pub duplicate_id: Uuid,
    pub confidence_score: f64,
    pub matching_fields: Vec<String>,
    pub reviewed: bool,
    pub created_at: DateTime<Utc>,
}

impl DuplicationLink {
    pub fn new(
        canonical_id: Uuid,
        duplicate_id: Uuid,
        confidence_score: f64,
        matching_fields: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            canonical_id,
            duplicate_id,
            confidence_score,
            matching_fields,
            reviewed: false,
            created_at: Utc::now(),
        }
    }
}

/// Phase kind recorded in the operation log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationType {
    Collection,
    Processing,
    Loading,
    Maintenance,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Collection => "collection",
            Self::Processing => "processing",
            Self::Loading => "loading",
            Self::Maintenance => "maintenance",
        }
    }
}

impl std::str::FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "collection" => Ok(Self::Collection),
            "processing" => Ok(Self::Processing),
            "loading" => Ok(Self::Loading),
            "maintenance" => Ok(Self::Maintenance),
            other => Err(format!("unknown operation type: {other}")),
        }
    }
}

/// Audit record for one phase execution.
///
/// Opened at phase start, completed at phase end; the log table is
/// append-only history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationLog {
    pub id: Uuid,
    pub operation_type: OperationType,
    pub status: ProcessingStatus,
    pub input_summary: String,
    pub output_summary: String,
    pub error_detail: Option<String>,
    pub items_total: usize,
    pub items_failed: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl OperationLog {
    /// Open a log entry in the transient `Processing` state
    pub fn begin(operation_type: OperationType, input_summary: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation_type,
            status: ProcessingStatus::Processing,
            input_summary: input_summary.into(),
            output_summary: String::new(),
            error_detail: None,
            items_total: 0,
            items_failed: 0,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Close the log entry with a terminal status
    pub fn complete(
        &mut self,
        status: ProcessingStatus,
        output_summary: impl Into<String>,
        error_detail: Option<String>,
    ) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.output_summary = output_summary.into();
        self.error_detail = error_detail;
        self.completed_at = Some(Utc::now());
    }

    /// Wall-clock duration, if the entry has been closed
    pub fn duration_ms(&self) -> Option<i64> {
        self.completed_at
            .map(|done| (done - self.started_at).num_milliseconds())
    }

    /// Items per second over the phase duration
    pub fn throughput(&self) -> f64 {
        match self.duration_ms() {
            Some(ms) if ms > 0 => self.items_total as f64 / (ms as f64 / 1000.0),
            _ => 0.0,
        }
    }

    /// Fraction of items that succeeded
    pub fn success_rate(&self) -> f64 {
        if self.items_total == 0 {
            return 1.0;
        }
        (self.items_total - self.items_failed) as f64 / self.items_total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            ProcessingStatus::Pending,
            ProcessingStatus::Processing,
            ProcessingStatus::Completed,
            ProcessingStatus::Partial,
            ProcessingStatus::Failed,
        ] {
            let parsed: ProcessingStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_status_terminality() {
        assert!(!ProcessingStatus::Pending.is_terminal());
        assert!(!ProcessingStatus::Processing.is_terminal());
        assert!(ProcessingStatus::Completed.is_terminal());
        assert!(ProcessingStatus::Partial.is_terminal());
        assert!(ProcessingStatus::Failed.is_terminal());
    }

    #[test]
    fn test_failure_tally() {
        assert_eq!(
            ProcessingStatus::from_failure_tally(10, 0),
            ProcessingStatus::Completed
        );
        assert_eq!(
            ProcessingStatus::from_failure_tally(10, 3),
            ProcessingStatus::Partial
        );
    }

    #[test]
    fn test_job_type_parse() {
        assert_eq!(JobType::parse("Full-Time"), Some(JobType::FullTime));
        assert_eq!(JobType::parse("CONTRACTOR"), Some(JobType::Contract));
        assert_eq!(JobType::parse("gig"), None);
    }

    #[test]
    fn test_raw_entry_deserialization_tolerates_missing_fields() {
        let entry: RawJobEntry = serde_json::from_str(r#"{"job_title": "Engineer"}"#).unwrap();
        assert_eq!(entry.job_title.as_deref(), Some("Engineer"));
        assert!(entry.employer_name.is_none());
        assert!(entry.job_min_salary.is_none());
    }

    #[test]
    fn test_collection_entries() {
        let payload = serde_json::json!({
            "status": "OK",
            "data": [{"job_title": "A"}, {"job_title": "B"}]
        });
        let collection = RawCollection::new(
            "jsearch",
            CollectionQuery {
                query: "rust".into(),
                country: "us".into(),
                page: 1,
            },
            payload,
            CollectionMetadata::default(),
        );
        assert_eq!(collection.entries().unwrap().len(), 2);
        assert_eq!(collection.processing_status, ProcessingStatus::Pending);
    }

    #[test]
    fn test_content_hash_is_stable() {
        let record = sample_record();
        assert_eq!(record.content_hash(), record.content_hash());
        assert_eq!(record.content_hash().len(), 64);
    }

    #[test]
    fn test_salary_midpoint() {
        let mut record = sample_record();
        record.salary_min = Some(90_000.0);
        record.salary_max = Some(110_000.0);
        assert_eq!(record.salary_midpoint(), Some(100_000.0));

        record.salary_max = None;
        assert_eq!(record.salary_midpoint(), Some(90_000.0));

        record.salary_min = None;
        assert_eq!(record.salary_midpoint(), None);
    }

    #[test]
    fn test_canonical_from_normalized_starts_at_one_source() {
        let record = sample_record();
        let canonical = CanonicalJobRecord::from_normalized(&record);
        assert_eq!(canonical.source_count, 1);
        assert_eq!(canonical.status, CanonicalStatus::Active);
        assert_eq!(canonical.title, record.title);
    }

    #[test]
    fn test_operation_log_lifecycle() {
        let mut log = OperationLog::begin(OperationType::Collection, "pages 1-5");
        assert_eq!(log.status, ProcessingStatus::Processing);
        assert!(log.duration_ms().is_none());

        log.items_total = 10;
        log.items_failed = 2;
        log.complete(ProcessingStatus::Partial, "stored 8 of 10", None);

        assert_eq!(log.status, ProcessingStatus::Partial);
        assert!(log.duration_ms().is_some());
        assert!((log.success_rate() - 0.8).abs() < f64::EPSILON);
    }

    fn sample_record() -> NormalizedJobRecord {
        NormalizedJobRecord {
            id: Uuid::new_v4(),
            collection_id: Uuid::new_v4(),
            job_index: 0,
            title: "Backend Engineer".into(),
            company: "Acme".into(),
            location: Some("Berlin".into()),
            description: "Build services".into(),
            requirements: vec![],
            responsibilities: vec![],
            job_type: Some(JobType::FullTime),
            remote_type: None,
            experience_level: ExperienceLevel::MidLevel,
            salary_min: None,
            salary_max: None,
            salary_currency: None,
            skills: vec![],
            tech_stack: vec![],
            benefits: vec![],
            apply_url: None,
            source_id: None,
            posted_at: None,
            expires_at: None,
            embedding: None,
            quality_score: 0.5,
            duplicate_of: None,
            load_status: ProcessingStatus::Pending,
            created_at: Utc::now(),
        }
    }
}
