//! Structured-field extraction from free-text descriptions
//!
//! Salary, skills, tech stack and labeled sections are pulled out of the
//! description with fixed vocabularies and prioritized regex patterns. The
//! heuristics are deliberately conservative: a missed field costs a little
//! quality score, a wrong field poisons the canonical record.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::RawJobEntry;

/// Single-value matches below this are assumed to be hourly rates or noise,
/// not annual salaries.
const MIN_PLAUSIBLE_ANNUAL: f64 = 10_000.0;

static SALARY_RANGE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)([$£€])\s?(\d{1,3}(?:,\d{3})*(?:\.\d+)?)\s*(k)?\s*(?:-|–|to)\s*[$£€]?\s?(\d{1,3}(?:,\d{3})*(?:\.\d+)?)\s*(k)?",
    )
    .unwrap()
});

static SALARY_SINGLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([$£€])\s?(\d{1,3}(?:,\d{3})*(?:\.\d+)?)\s*(k)?").unwrap()
});

static SECTION_HEADER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^\s*(requirements|qualifications|what you'll need|what we're looking for|responsibilities|duties|what you'll do|about the role|benefits|perks)\s*:?\s*$",
    )
    .unwrap()
});

/// Soft-skill vocabulary for the `skills` field
const SKILL_VOCABULARY: &[&str] = &[
    "communication",
    "leadership",
    "project management",
    "problem solving",
    "teamwork",
    "collaboration",
    "agile",
    "scrum",
    "mentoring",
    "stakeholder management",
    "time management",
    "analytical",
];

/// Technology vocabulary for the `tech_stack` field
const TECH_VOCABULARY: &[&str] = &[
    "rust",
    "python",
    "java",
    "javascript",
    "typescript",
    "go",
    "c++",
    "c#",
    "ruby",
    "php",
    "kotlin",
    "swift",
    "react",
    "angular",
    "vue",
    "node.js",
    "django",
    "rails",
    "spring",
    "sql",
    "postgresql",
    "mysql",
    "sqlite",
    "mongodb",
    "redis",
    "elasticsearch",
    "kafka",
    "rabbitmq",
    "aws",
    "azure",
    "gcp",
    "docker",
    "kubernetes",
    "terraform",
    "linux",
    "git",
    "graphql",
    "grpc",
    "ci/cd",
];

/// Extracted salary bounds and currency
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SalaryInfo {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub currency: Option<String>,
}

/// Extract salary with a prioritized pattern list: explicit structured
/// fields first, then a range in the text, then a single value in the text.
pub fn extract_salary(entry: &RawJobEntry, description: &str) -> SalaryInfo {
    // 1. Explicit min/max fields are authoritative.
    if entry.job_min_salary.is_some() || entry.job_max_salary.is_some() {
        return SalaryInfo {
            min: entry.job_min_salary,
            max: entry.job_max_salary,
            currency: entry.job_salary_currency.clone(),
        };
    }

    // 2. A range like "$90,000 - $120,000" or "€60k–80k".
    if let Some(caps) = SALARY_RANGE_REGEX.captures(description) {
        let high_k = caps.get(5).is_some() || caps.get(3).is_some();
        let low = parse_amount(&caps[2], caps.get(3).is_some());
        let high = parse_amount(&caps[4], high_k);
        if let (Some(mut low), Some(high)) = (low, high) {
            // "60-80k" shorthand: the k applies to both bounds
            if high_k && caps.get(3).is_none() && low < 1000.0 {
                low *= 1000.0;
            }
            if low <= high && high >= MIN_PLAUSIBLE_ANNUAL {
                return SalaryInfo {
                    min: Some(low),
                    max: Some(high),
                    currency: Some(currency_for_symbol(&caps[1]).to_string()),
                };
            }
        }
    }

    // 3. A lone "$100,000" style figure.
    if let Some(caps) = SALARY_SINGLE_REGEX.captures(description) {
        if let Some(value) = parse_amount(&caps[2], caps.get(3).is_some()) {
            if value >= MIN_PLAUSIBLE_ANNUAL {
                return SalaryInfo {
                    min: Some(value),
                    max: Some(value),
                    currency: Some(currency_for_symbol(&caps[1]).to_string()),
                };
            }
        }
    }

    SalaryInfo::default()
}

fn parse_amount(raw: &str, thousands: bool) -> Option<f64> {
    let value: f64 = raw.replace(',', "").parse().ok()?;
    Some(if thousands { value * 1000.0 } else { value })
}

fn currency_for_symbol(symbol: &str) -> &'static str {
    match symbol {
        "£" => "GBP",
        "€" => "EUR",
        _ => "USD",
    }
}

/// Scan the description against the soft-skill vocabulary
pub fn extract_skills(description: &str) -> Vec<String> {
    scan_vocabulary(description, SKILL_VOCABULARY)
}

/// Scan the description against the technology vocabulary
pub fn extract_tech_stack(description: &str) -> Vec<String> {
    scan_vocabulary(description, TECH_VOCABULARY)
}

fn scan_vocabulary(description: &str, vocabulary: &[&str]) -> Vec<String> {
    let haystack = description.to_lowercase();
    let words: std::collections::HashSet<&str> = haystack
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '(' | ')' | ':'))
        .map(|w| w.trim_matches('.'))
        .filter(|w| !w.is_empty())
        .collect();

    vocabulary
        .iter()
        .filter(|term| {
            if term.contains(' ') || term.contains('/') {
                haystack.contains(*term)
            } else {
                // Single tokens match on word boundaries so "go" does not
                // fire on "google".
                words.contains(*term)
            }
        })
        .map(|term| term.to_string())
        .collect()
}

/// Requirements and responsibilities pulled from labeled sections
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sections {
    pub requirements: Vec<String>,
    pub responsibilities: Vec<String>,
}

/// Extract labeled sections from the description.
///
/// A section starts at a recognized header line and collects the following
/// non-empty lines (bullets stripped) until the next recognized header.
pub fn extract_sections(description: &str) -> Sections {
    #[derive(Clone, Copy)]
    enum Target {
        Requirements,
        Responsibilities,
        Ignored,
    }

    let mut sections = Sections::default();
    let mut current = Target::Ignored;

    for line in description.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if SECTION_HEADER_REGEX.is_match(trimmed) {
            let header = trimmed.trim_end_matches(':').to_lowercase();
            current = match header.as_str() {
                "requirements" | "qualifications" | "what you'll need"
                | "what we're looking for" => Target::Requirements,
                "responsibilities" | "duties" | "what you'll do" | "about the role" => {
                    Target::Responsibilities
                }
                // Recognized header we do not collect (benefits, perks)
                _ => Target::Ignored,
            };
            continue;
        }

        let item = trimmed
            .trim_start_matches(['-', '*', '•'])
            .trim()
            .to_string();
        if item.is_empty() {
            continue;
        }
        match current {
            Target::Requirements => sections.requirements.push(item),
            Target::Responsibilities => sections.responsibilities.push(item),
            Target::Ignored => {}
        }
    }

    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_fields_win() {
        let entry = RawJobEntry {
            job_min_salary: Some(95_000.0),
            job_max_salary: Some(120_000.0),
            job_salary_currency: Some("USD".into()),
            ..Default::default()
        };
        let salary = extract_salary(&entry, "pay range $50,000 - $60,000");
        assert_eq!(salary.min, Some(95_000.0));
        assert_eq!(salary.max, Some(120_000.0));
    }

    #[test]
    fn test_range_in_text() {
        let entry = RawJobEntry::default();
        let salary = extract_salary(&entry, "We pay $90,000 - $120,000 plus equity");
        assert_eq!(salary.min, Some(90_000.0));
        assert_eq!(salary.max, Some(120_000.0));
        assert_eq!(salary.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_k_suffix_range() {
        let entry = RawJobEntry::default();
        let salary = extract_salary(&entry, "Salary: €60k-80k depending on experience");
        assert_eq!(salary.min, Some(60_000.0));
        assert_eq!(salary.max, Some(80_000.0));
        assert_eq!(salary.currency.as_deref(), Some("EUR"));
    }

    #[test]
    fn test_single_value_in_text() {
        let entry = RawJobEntry::default();
        let salary = extract_salary(&entry, "Base compensation of £85,000 per year");
        assert_eq!(salary.min, Some(85_000.0));
        assert_eq!(salary.max, Some(85_000.0));
        assert_eq!(salary.currency.as_deref(), Some("GBP"));
    }

    #[test]
    fn test_small_figures_are_ignored() {
        let entry = RawJobEntry::default();
        let salary = extract_salary(&entry, "a $50 monthly gym stipend");
        assert_eq!(salary, SalaryInfo::default());
    }

    #[test]
    fn test_no_salary() {
        let entry = RawJobEntry::default();
        assert_eq!(
            extract_salary(&entry, "Competitive compensation"),
            SalaryInfo::default()
        );
    }

    #[test]
    fn test_tech_stack_word_boundaries() {
        let stack = extract_tech_stack("We use Rust, PostgreSQL and Docker. Google it.");
        assert!(stack.contains(&"rust".to_string()));
        assert!(stack.contains(&"postgresql".to_string()));
        assert!(stack.contains(&"docker".to_string()));
        // "go" must not fire on "Google"
        assert!(!stack.contains(&"go".to_string()));
    }

    #[test]
    fn test_multiword_skills() {
        let skills = extract_skills("Strong project management and communication skills");
        assert!(skills.contains(&"project management".to_string()));
        assert!(skills.contains(&"communication".to_string()));
    }

    #[test]
    fn test_section_extraction() {
        let description = "\
Join our team.

Requirements:
- 3 years of Rust
- SQL fluency

Responsibilities:
- Own the ingestion pipeline
* Review code

Benefits:
- Free coffee";

        let sections = extract_sections(description);
        assert_eq!(sections.requirements, vec!["3 years of Rust", "SQL fluency"]);
        assert_eq!(
            sections.responsibilities,
            vec!["Own the ingestion pipeline", "Review code"]
        );
    }

    #[test]
    fn test_unlabeled_text_yields_no_sections() {
        let sections = extract_sections("We are a fast-growing startup.");
        assert!(sections.requirements.is_empty());
        assert!(sections.responsibilities.is_empty());
    }
}
