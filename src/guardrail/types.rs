//! Violation and result types shared by the guardrail checks.

use serde::{Deserialize, Serialize};

/// What a guardrail check found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    SchemaViolation,
    PiiDetected,
    InvalidCve,
    CveHallucination,
    MissingCve,
    BiasDetected,
    Sensationalism,
    BannedTerms,
    QualityIssue,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SchemaViolation => "schema_violation",
            Self::PiiDetected => "pii_detected",
            Self::InvalidCve => "invalid_cve",
            Self::CveHallucination => "cve_hallucination",
            Self::MissingCve => "missing_cve",
            Self::BiasDetected => "bias_detected",
            Self::Sensationalism => "sensationalism",
            Self::BannedTerms => "banned_terms",
            Self::QualityIssue => "quality_issue",
        }
    }
}

/// Violation severity, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Parse a model-reported severity string; unknown values map to
    /// `Medium`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            "critical" => Self::Critical,
            _ => Self::Medium,
        }
    }
}

/// One typed, severity-tagged finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub severity: Severity,
    pub description: String,
    pub confidence: f64,
}

/// The validator's verdict, returned even when a check degrades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailResult {
    pub passed: bool,
    pub violations: Vec<Violation>,
    /// Distinct violation kinds, for the article's flag list.
    pub flags: Vec<String>,
    pub confidence: f64,
    pub rationale: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redacted_content: Option<String>,
}

impl GuardrailResult {
    /// Apply the pass/fail and confidence aggregation rules.
    pub fn aggregate(violations: Vec<Violation>, redacted_content: Option<String>) -> Self {
        let passed = determine_pass(&violations);
        let confidence = overall_confidence(&violations);
        let rationale = rationale(&violations, passed);

        let mut flags: Vec<String> = Vec::new();
        for v in &violations {
            let flag = v.kind.as_str().to_string();
            if !flags.contains(&flag) {
                flags.push(flag);
            }
        }

        Self {
            passed,
            violations,
            flags,
            confidence,
            rationale,
            redacted_content,
        }
    }

    /// Result for a validator that failed internally: one medium
    /// violation, so the article is flagged but not hard-failed.
    pub fn internal_error(detail: impl Into<String>) -> Self {
        Self::aggregate(
            vec![Violation {
                kind: ViolationKind::QualityIssue,
                severity: Severity::Medium,
                description: detail.into(),
                confidence: 0.5,
            }],
            None,
        )
    }
}

fn determine_pass(violations: &[Violation]) -> bool {
    if violations
        .iter()
        .any(|v| v.severity >= Severity::High)
    {
        return false;
    }
    let mediums = violations
        .iter()
        .filter(|v| v.severity == Severity::Medium)
        .count();
    mediums <= 3
}

fn overall_confidence(violations: &[Violation]) -> f64 {
    (0.95 - 0.05 * violations.len() as f64).max(0.5)
}

fn rationale(violations: &[Violation], passed: bool) -> String {
    if violations.is_empty() {
        return "All guardrail checks passed".to_string();
    }
    let summary: Vec<String> = violations
        .iter()
        .map(|v| format!("{} ({:?})", v.kind.as_str(), v.severity))
        .collect();
    if passed {
        format!("Passed with findings: {}", summary.join(", "))
    } else {
        format!("Failed: {}", summary.join(", "))
    }
}
