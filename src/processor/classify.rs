//! Keyword classification of employment type, work arrangement and seniority

use regex::Regex;
use std::sync::LazyLock;

use crate::models::{ExperienceLevel, JobType, RemoteType};

static YEARS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    // "3+ years", "3-5 years", "seven (7) yrs" style ranges; the first
    // number is the lower bound.
    Regex::new(r"(?i)(\d{1,2})\s*(?:\+|\s*-\s*\d{1,2})?\s*(?:years?|yrs?)").unwrap()
});

static NO_EXPERIENCE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)no (?:prior |previous )?experience (?:required|needed|necessary)").unwrap()
});

/// Classify employment type from the structured field, falling back to
/// keyword rules over the description.
pub fn classify_job_type(raw_type: Option<&str>, description: &str) -> Option<JobType> {
    if let Some(parsed) = raw_type.and_then(JobType::parse) {
        return Some(parsed);
    }

    let haystack = description.to_lowercase();
    if haystack.contains("internship") {
        Some(JobType::Internship)
    } else if haystack.contains("part-time") || haystack.contains("part time") {
        Some(JobType::PartTime)
    } else if haystack.contains("temporary") || haystack.contains("seasonal") {
        Some(JobType::Temporary)
    } else if haystack.contains("contract") || haystack.contains("freelance") {
        Some(JobType::Contract)
    } else if haystack.contains("full-time") || haystack.contains("full time") {
        Some(JobType::FullTime)
    } else {
        None
    }
}

/// Classify work arrangement.
///
/// An explicit remote flag wins; otherwise keyword rules over location and
/// description, with hybrid checked before remote (postings often mention
/// both).
pub fn classify_remote_type(
    is_remote: Option<bool>,
    location: Option<&str>,
    description: &str,
) -> Option<RemoteType> {
    if is_remote == Some(true) {
        return Some(RemoteType::Remote);
    }

    let mut haystack = description.to_lowercase();
    if let Some(loc) = location {
        haystack.push(' ');
        haystack.push_str(&loc.to_lowercase());
    }

    if haystack.contains("hybrid") {
        Some(RemoteType::Hybrid)
    } else if haystack.contains("remote")
        || haystack.contains("work from home")
        || haystack.contains("wfh")
    {
        Some(RemoteType::Remote)
    } else if haystack.contains("on-site")
        || haystack.contains("onsite")
        || haystack.contains("in office")
        || haystack.contains("in-office")
    {
        Some(RemoteType::OnSite)
    } else if is_remote == Some(false) {
        Some(RemoteType::OnSite)
    } else {
        None
    }
}

/// Infer seniority with a layered heuristic.
///
/// Layers, in order:
/// 1. an explicit "no experience required" signal maps to entry level;
/// 2. a keyword scan in fixed priority order (executive, director, senior,
///    entry-level terms) over title and description;
/// 3. a year-count scan mapped to brackets (<2 entry, 2-4 mid, 5-8 senior,
///    >8 director);
/// 4. the configured default, conventionally mid level.
pub fn infer_experience_level(
    title: &str,
    description: &str,
    default: ExperienceLevel,
) -> ExperienceLevel {
    let haystack = format!("{} {}", title.to_lowercase(), description.to_lowercase());

    if NO_EXPERIENCE_REGEX.is_match(&haystack) {
        return ExperienceLevel::EntryLevel;
    }

    // Keyword layers in fixed priority order; first hit wins.
    const EXECUTIVE: &[&str] = &["chief ", "cto", "ceo", "cfo", "vp ", "vice president", "executive"];
    const DIRECTOR: &[&str] = &["director", "head of"];
    const SENIOR: &[&str] = &["senior", "sr.", "sr ", "staff ", "principal", "lead "];
    const ENTRY: &[&str] = &["junior", "jr.", "jr ", "entry level", "entry-level", "graduate", "internship"];

    for (keywords, level) in [
        (EXECUTIVE, ExperienceLevel::ExecutiveLevel),
        (DIRECTOR, ExperienceLevel::DirectorLevel),
        (SENIOR, ExperienceLevel::SeniorLevel),
        (ENTRY, ExperienceLevel::EntryLevel),
    ] {
        if keywords.iter().any(|k| haystack.contains(k)) {
            return level;
        }
    }

    if let Some(caps) = YEARS_REGEX.captures(&haystack) {
        if let Ok(years) = caps[1].parse::<u32>() {
            return match years {
                0..=1 => ExperienceLevel::EntryLevel,
                2..=4 => ExperienceLevel::MidLevel,
                5..=8 => ExperienceLevel::SeniorLevel,
                _ => ExperienceLevel::DirectorLevel,
            };
        }
    }

    default
}
