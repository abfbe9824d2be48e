//! Multi-tier duplicate detection against canonical records
//!
//! Detection short-circuits through three tiers:
//!
//! 1. exact application-URL match against active canonical records
//!    (indexed lookup, highest trust);
//! 2. a bounded fuzzy candidate search on title/company substrings;
//! 3. a weighted word-set similarity over each candidate, accepted when it
//!    strictly exceeds the configured threshold.
//!
//! The first candidate above the threshold wins. That is not the globally
//! best match, but it is deterministic and cheap; candidate order (most
//! recently seen first) makes the choice stable across runs.

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use crate::config::DedupConfig;
use crate::metrics;
use crate::models::{CanonicalJobRecord, NormalizedJobRecord};
use crate::storage::SqliteStore;

/// Similarity weights: title, company, location, salary midpoint
const TITLE_WEIGHT: f64 = 0.4;
const COMPANY_WEIGHT: f64 = 0.3;
const LOCATION_WEIGHT: f64 = 0.2;
const SALARY_WEIGHT: f64 = 0.1;

/// Which tier produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    ApplyUrl,
    Similarity,
}

impl MatchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApplyUrl => "url",
            Self::Similarity => "similarity",
        }
    }
}

/// A resolved duplicate decision
#[derive(Debug, Clone)]
pub struct DuplicateMatch {
    pub canonical_id: Uuid,
    /// Similarity score of the winning comparison (1.0 for URL matches)
    pub score: f64,
    /// Fields that drove the decision, recorded on the duplication link
    pub matching_fields: Vec<String>,
    pub tier: MatchTier,
}

/// Decides whether a normalized record duplicates a canonical record
pub struct DuplicationDetector {
    store: Arc<SqliteStore>,
    config: DedupConfig,
}

impl DuplicationDetector {
    pub fn new(config: DedupConfig, store: Arc<SqliteStore>) -> Self {
        Self { store, config }
    }

    /// Find the canonical record this one duplicates, if any.
    pub fn find_duplicate(
        &self,
        record: &NormalizedJobRecord,
    ) -> anyhow::Result<Option<DuplicateMatch>> {
        // Tier 1: exact application-URL match.
        if let Some(url) = record.apply_url.as_deref() {
            if let Some(canonical) = self.store.find_canonical_by_url(url)? {
                metrics::record_duplicate_detected(MatchTier::ApplyUrl.as_str());
                return Ok(Some(DuplicateMatch {
                    canonical_id: canonical.id,
                    score: 1.0,
                    matching_fields: vec!["apply_url".to_string()],
                    tier: MatchTier::ApplyUrl,
                }));
            }
        }

        // Tier 2: bounded fuzzy candidate search.
        let candidates = self.store.find_canonical_candidates(
            &record.title,
            &record.company,
            self.config.candidate_limit,
        )?;

        // Tier 3: first candidate above the threshold wins.
        for candidate in &candidates {
            let score = similarity(record, candidate);
            if score > self.config.similarity_threshold {
                metrics::record_duplicate_detected(MatchTier::Similarity.as_str());
                return Ok(Some(DuplicateMatch {
                    canonical_id: candidate.id,
                    score,
                    matching_fields: matching_fields(record, candidate),
                    tier: MatchTier::Similarity,
                }));
            }
        }

        Ok(None)
    }
}

/// Weighted similarity between a normalized record and a canonical record.
///
/// Text fields use word-set Jaccard overlap; salary compares midpoints with
/// `1 - |Δ| / avg`, floored at zero. A field absent on both sides counts as
/// identical; absent on one side only counts as disjoint.
pub fn similarity(record: &NormalizedJobRecord, canonical: &CanonicalJobRecord) -> f64 {
    let title = word_jaccard(&record.title, &canonical.title);
    let company = word_jaccard(&record.company, &canonical.company);
    let location = word_jaccard(
        record.location.as_deref().unwrap_or(""),
        canonical.location.as_deref().unwrap_or(""),
    );
    let salary = salary_similarity(record.salary_midpoint(), canonical.salary_midpoint());

    TITLE_WEIGHT * title + COMPANY_WEIGHT * company + LOCATION_WEIGHT * location
        + SALARY_WEIGHT * salary
}

/// Word-set Jaccard overlap, case-insensitive
fn word_jaccard(a: &str, b: &str) -> f64 {
    let set_a = word_set(a);
    let set_b = word_set(b);

    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }

    let intersection = set_a.intersection(&set_b).count() as f64;
    let union = set_a.union(&set_b).count() as f64;
    intersection / union
}

fn word_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_string())
        .collect()
}

fn salary_similarity(a: Option<f64>, b: Option<f64>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) => {
            let avg = (a + b) / 2.0;
            if avg <= 0.0 {
                return 0.0;
            }
            (1.0 - (a - b).abs() / avg).max(0.0)
        }
        (None, None) => 1.0,
        _ => 0.0,
    }
}

/// Which compared fields actually overlap (recorded on the link)
fn matching_fields(record: &NormalizedJobRecord, canonical: &CanonicalJobRecord) -> Vec<String> {
    let mut fields = Vec::new();
    if word_jaccard(&record.title, &canonical.title) > 0.0 {
        fields.push("title".to_string());
    }
    if word_jaccard(&record.company, &canonical.company) > 0.0 {
        fields.push("company".to_string());
    }
    if word_jaccard(
        record.location.as_deref().unwrap_or(""),
        canonical.location.as_deref().unwrap_or(""),
    ) > 0.0
    {
        fields.push("location".to_string());
    }
    if salary_similarity(record.salary_midpoint(), canonical.salary_midpoint()) > 0.0 {
        fields.push("salary".to_string());
    }
    fields
}
