//! Completeness scoring for normalized records
//!
//! The quality score is the weighted fraction of populated fields: required
//! fields carry full weight, important optional fields half weight, and a
//! long-enough description earns a bonus. The result is clamped to [0, 1].
//! Experience level always resolves to a default and therefore never
//! participates.

use crate::config::QualityWeights;
use crate::models::NormalizedJobRecord;

/// Number of required fields: title, company, location, description
const REQUIRED_FIELDS: usize = 4;

/// Number of important optional fields: salary, job type, remote type,
/// skills, apply URL
const OPTIONAL_FIELDS: usize = 5;

/// Compute the quality score for a normalized record.
pub fn quality_score(
    record: &NormalizedJobRecord,
    weights: &QualityWeights,
    min_description_length: usize,
) -> f64 {
    let mut score = 0.0;

    // Required fields
    for present in [
        !record.title.is_empty(),
        !record.company.is_empty(),
        record.location.as_deref().is_some_and(|l| !l.is_empty()),
        !record.description.is_empty(),
    ] {
        if present {
            score += weights.required_field;
        }
    }

    // Important optional fields
    for present in [
        record.salary_min.is_some() || record.salary_max.is_some(),
        record.job_type.is_some(),
        record.remote_type.is_some(),
        !record.skills.is_empty() || !record.tech_stack.is_empty(),
        record.apply_url.is_some(),
    ] {
        if present {
            score += weights.optional_field;
        }
    }

    if record.description.len() >= min_description_length {
        score += weights.description_bonus;
    }

    let max_score = REQUIRED_FIELDS as f64 * weights.required_field
        + OPTIONAL_FIELDS as f64 * weights.optional_field
        + weights.description_bonus;

    if max_score <= 0.0 {
        return 0.0;
    }
    (score / max_score).clamp(0.0, 1.0)
}
