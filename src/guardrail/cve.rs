//! CVE identifier validation and hallucination detection.

use chrono::{Datelike, Utc};
use regex::Regex;
use std::sync::LazyLock;

use super::types::{Severity, Violation, ViolationKind};

/// Well-formed CVE identifier.
static CVE_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^CVE-\d{4}-\d{4,}$").expect("Invalid regex"));

/// CVE identifiers embedded in free text.
static CVE_IN_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CVE-\d{4}-\d{4,}").expect("Invalid regex"));

const MIN_CVE_YEAR: i32 = 1999;

/// Validates extracted CVE identifiers against format, plausible year,
/// and literal presence in the content.
#[derive(Debug, Clone, Default)]
pub struct CveValidator;

impl CveValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, content: &str, extracted_cves: &[String]) -> Vec<Violation> {
        let mut violations = Vec::new();

        for cve in extracted_cves {
            violations.extend(validate_format(cve));
        }

        let in_content = cves_in_content(content);

        // Extracted but not present in the content: the extraction model
        // invented it.
        for cve in extracted_cves {
            if CVE_FORMAT.is_match(cve) && !in_content.contains(cve) {
                violations.push(Violation {
                    kind: ViolationKind::CveHallucination,
                    severity: Severity::High,
                    description: format!("{cve} not present in article content"),
                    confidence: 0.95,
                });
            }
        }

        // Present in the content but missed by extraction.
        for cve in &in_content {
            if !extracted_cves.contains(cve) {
                violations.push(Violation {
                    kind: ViolationKind::MissingCve,
                    severity: Severity::Medium,
                    description: format!("{cve} appears in content but was not extracted"),
                    confidence: 0.9,
                });
            }
        }

        violations
    }
}

fn validate_format(cve: &str) -> Vec<Violation> {
    if !CVE_FORMAT.is_match(cve) {
        return vec![Violation {
            kind: ViolationKind::InvalidCve,
            severity: Severity::High,
            description: format!("'{cve}' does not match CVE-YYYY-NNNN"),
            confidence: 1.0,
        }];
    }

    // Format guarantees a parseable 4-digit year.
    let year: i32 = cve[4..8].parse().unwrap_or(0);
    let max_year = Utc::now().year() + 1;
    if year < MIN_CVE_YEAR || year > max_year {
        return vec![Violation {
            kind: ViolationKind::InvalidCve,
            severity: Severity::Medium,
            description: format!("'{cve}' year {year} outside [{MIN_CVE_YEAR}, {max_year}]"),
            confidence: 1.0,
        }];
    }
    vec![]
}

fn cves_in_content(content: &str) -> Vec<String> {
    let mut found = Vec::new();
    for m in CVE_IN_TEXT.find_iter(content) {
        let cve = m.as_str().to_string();
        if !found.contains(&cve) {
            found.push(cve);
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consistent_extraction_is_clean() {
        let violations = CveValidator::new().validate(
            "Patch CVE-2026-1234 now.",
            &["CVE-2026-1234".to_string()],
        );
        assert!(violations.is_empty(), "{violations:?}");
    }

    #[test]
    fn malformed_cve_is_high() {
        let violations = CveValidator::new().validate("", &["CVE-26-99".to_string()]);
        assert_eq!(violations[0].kind, ViolationKind::InvalidCve);
        assert_eq!(violations[0].severity, Severity::High);
    }

    #[test]
    fn implausible_year_is_medium() {
        let violations =
            CveValidator::new().validate("CVE-1989-1234", &["CVE-1989-1234".to_string()]);
        let invalid = violations
            .iter()
            .find(|v| v.kind == ViolationKind::InvalidCve)
            .unwrap();
        assert_eq!(invalid.severity, Severity::Medium);
    }

    #[test]
    fn next_year_is_plausible() {
        let next = Utc::now().year() + 1;
        let cve = format!("CVE-{next}-0001");
        let violations = CveValidator::new().validate(&format!("see {cve}"), &[cve]);
        assert!(violations.is_empty());
    }

    #[test]
    fn hallucinated_cve_is_high() {
        let violations = CveValidator::new().validate(
            "No identifiers in this text.",
            &["CVE-2026-1234".to_string()],
        );
        assert_eq!(violations[0].kind, ViolationKind::CveHallucination);
        assert_eq!(violations[0].severity, Severity::High);
    }

    #[test]
    fn missed_cve_is_medium() {
        let violations = CveValidator::new().validate("Mentions CVE-2026-5678 in passing.", &[]);
        assert_eq!(violations[0].kind, ViolationKind::MissingCve);
        assert_eq!(violations[0].severity, Severity::Medium);
    }

    #[test]
    fn long_sequence_numbers_are_valid() {
        let violations = CveValidator::new().validate(
            "Tracking CVE-2026-1234567.",
            &["CVE-2026-1234567".to_string()],
        );
        assert!(violations.is_empty());
    }
}
