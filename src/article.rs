//! Core article entity and the shared types that travel with it through
//! the triage pipeline.
//!
//! An [`Article`] is created by the orchestrator on first sight of a parsed
//! feed item and carries every processing output: relevance, dedup verdict,
//! guardrail flags, triage action, escalation record, and an append-only
//! audit trail. Articles are never deleted; retirement is a transition to
//! `ARCHIVED`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Article processing states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArticleState {
    /// Created from a parsed feed item; no processing results yet.
    Ingested,
    /// Pipeline finished; a triage action has been recorded.
    Processed,
    /// Visible to consumers, either auto-published or approved.
    Published,
    /// Waiting on a human decision in the review queue.
    Review,
    /// Terminal. Only metadata (tags, audit trail) may still change.
    Archived,
}

impl ArticleState {
    /// Stable wire name, matching the stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingested => "INGESTED",
            Self::Processed => "PROCESSED",
            Self::Published => "PUBLISHED",
            Self::Review => "REVIEW",
            Self::Archived => "ARCHIVED",
        }
    }

    /// Parse a stored state name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INGESTED" => Some(Self::Ingested),
            "PROCESSED" => Some(Self::Processed),
            "PUBLISHED" => Some(Self::Published),
            "REVIEW" => Some(Self::Review),
            "ARCHIVED" => Some(Self::Archived),
            _ => None,
        }
    }
}

impl std::fmt::Display for ArticleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the triage decision engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriageAction {
    /// Publish without human involvement.
    AutoPublish,
    /// Queue for human review.
    Review,
    /// Archive immediately.
    Drop,
}

impl std::fmt::Display for TriageAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AutoPublish => write!(f, "AUTO_PUBLISH"),
            Self::Review => write!(f, "REVIEW"),
            Self::Drop => write!(f, "DROP"),
        }
    }
}

/// Human decision on an article in review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
    Edit,
    Escalate,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Edit => "edit",
            Self::Escalate => "escalate",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an article was escalated to the review queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    GuardrailViolation,
    LowConfidence,
    ComplexEntities,
    SensitiveContent,
    PotentialFalsePositive,
    ManualReviewRequested,
    QualityConcern,
    PolicyViolation,
    MediumRelevancy,
    HighRelevancyNoKeywords,
}

impl EscalationReason {
    /// Priority multiplier applied after the weighted factor sum.
    ///
    /// Reasons without an assigned multiplier contribute 1.0.
    pub fn multiplier(&self) -> f64 {
        match self {
            Self::SensitiveContent => 1.8,
            Self::PolicyViolation => 1.6,
            Self::GuardrailViolation => 1.5,
            Self::QualityConcern => 1.4,
            Self::ComplexEntities => 1.3,
            Self::LowConfidence => 1.2,
            Self::PotentialFalsePositive => 1.1,
            Self::ManualReviewRequested
            | Self::MediumRelevancy
            | Self::HighRelevancyNoKeywords => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GuardrailViolation => "guardrail_violation",
            Self::LowConfidence => "low_confidence",
            Self::ComplexEntities => "complex_entities",
            Self::SensitiveContent => "sensitive_content",
            Self::PotentialFalsePositive => "potential_false_positive",
            Self::ManualReviewRequested => "manual_review_requested",
            Self::QualityConcern => "quality_concern",
            Self::PolicyViolation => "policy_violation",
            Self::MediumRelevancy => "medium_relevancy",
            Self::HighRelevancyNoKeywords => "high_relevancy_no_keywords",
        }
    }
}

impl std::fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority labels used in reviewer notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    /// Bucket a priority score into a label.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            Self::Critical
        } else if score >= 0.6 {
            Self::High
        } else if score >= 0.4 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Critical => write!(f, "CRITICAL"),
            Self::High => write!(f, "HIGH"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::Low => write!(f, "LOW"),
        }
    }
}

/// A single keyword hit against article text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordMatch {
    /// Primary term from the registry (not the variation that hit).
    pub keyword: String,
    /// Word-boundary occurrences in the scanned text.
    pub hit_count: u32,
    /// Up to five ~10-word windows around hits.
    pub contexts: Vec<String>,
    /// 1.0 for exact matches, lower for fuzzy.
    pub confidence: f64,
}

/// Named entities extracted from article content, keyed by kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityExtraction {
    #[serde(default)]
    pub cves: Vec<String>,
    #[serde(default)]
    pub threat_actors: Vec<String>,
    #[serde(default)]
    pub malware: Vec<String>,
    #[serde(default)]
    pub vendors: Vec<String>,
    #[serde(default)]
    pub products: Vec<String>,
    #[serde(default)]
    pub sectors: Vec<String>,
    #[serde(default)]
    pub countries: Vec<String>,
}

impl EntityExtraction {
    /// Total entity count across all kinds.
    pub fn total(&self) -> usize {
        self.cves.len()
            + self.threat_actors.len()
            + self.malware.len()
            + self.vendors.len()
            + self.products.len()
            + self.sectors.len()
            + self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// What kind of event an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Pipeline-driven transition (ingest, processed, drop).
    PipelineTransition,
    /// Auto-publish by the triage engine.
    AutoPublish,
    /// Escalation into the review queue.
    Escalation,
    /// A reviewer's decision.
    HumanDecision,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PipelineTransition => "pipeline_transition",
            Self::AutoPublish => "auto_publish",
            Self::Escalation => "escalation",
            Self::HumanDecision => "human_decision",
        }
    }
}

/// Append-only record of a state-changing event on an article.
///
/// Entries are never edited or removed; `prev_version`/`new_version`
/// chain consecutive entries together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub audit_id: String,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    /// Reviewer name, or `"system"` for pipeline transitions.
    pub actor: String,
    pub prev_state: ArticleState,
    pub new_state: ArticleState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    pub rationale: String,
    pub prev_version: u64,
    pub new_version: u64,
}

impl AuditEntry {
    pub fn new(
        action: AuditAction,
        actor: impl Into<String>,
        prev_state: ArticleState,
        new_state: ArticleState,
        rationale: impl Into<String>,
        prev_version: u64,
        new_version: u64,
    ) -> Self {
        Self {
            audit_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            action,
            actor: actor.into(),
            prev_state,
            new_state,
            decision: None,
            rationale: rationale.into(),
            prev_version,
            new_version,
        }
    }

    pub fn with_decision(mut self, decision: Decision) -> Self {
        self.decision = Some(decision);
        self
    }
}

/// Immutable record attached to an article in REVIEW state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationRecord {
    pub escalation_id: String,
    pub reason: EscalationReason,
    pub priority_score: f64,
    pub escalated_at: DateTime<Utc>,
    /// Short human-readable context for the reviewer.
    pub context: String,
}

/// The central entity of the triage pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub article_id: String,
    pub feed_id: String,
    /// Raw URL as fetched.
    pub url: String,
    /// Fetched URL with tracking parameters removed.
    pub canonical_url: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
    /// Hex SHA-256 of the normalized text.
    pub content_hash: String,
    /// Blob-store key for the raw HTML.
    pub raw_blob_key: String,
    /// Blob-store key for the normalized text.
    pub normalized_blob_key: String,

    pub state: ArticleState,
    /// Non-null once dedup has run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,
    pub is_duplicate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevancy_score: Option<f64>,
    #[serde(default)]
    pub keyword_matches: Vec<KeywordMatch>,
    #[serde(default)]
    pub entities: EntityExtraction,
    #[serde(default)]
    pub guardrail_flags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triage_action: Option<TriageAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_short: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation: Option<EscalationRecord>,
    #[serde(default)]
    pub audit_trail: Vec<AuditEntry>,

    /// Monotonically increasing; bumped on every mutation.
    pub version: u64,
}

impl Article {
    /// Derive the implicit cluster id for a canonical article.
    pub fn cluster_id_for(canonical_article_id: &str) -> String {
        format!("cluster_{canonical_article_id}")
    }

    /// Bump the version and return the (prev, new) pair for audit linkage.
    pub fn bump_version(&mut self) -> (u64, u64) {
        let prev = self.version;
        self.version += 1;
        (prev, self.version)
    }

    /// Number of distinct matched primary terms.
    pub fn distinct_keyword_hits(&self) -> usize {
        let mut seen: Vec<&str> = Vec::new();
        for m in &self.keyword_matches {
            if !seen.contains(&m.keyword.as_str()) {
                seen.push(&m.keyword);
            }
        }
        seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trip() {
        for state in [
            ArticleState::Ingested,
            ArticleState::Processed,
            ArticleState::Published,
            ArticleState::Review,
            ArticleState::Archived,
        ] {
            assert_eq!(ArticleState::parse(state.as_str()), Some(state));
        }
        assert_eq!(ArticleState::parse("UNKNOWN"), None);
    }

    #[test]
    fn priority_labels() {
        assert_eq!(Priority::from_score(0.85), Priority::Critical);
        assert_eq!(Priority::from_score(0.8), Priority::Critical);
        assert_eq!(Priority::from_score(0.65), Priority::High);
        assert_eq!(Priority::from_score(0.45), Priority::Medium);
        assert_eq!(Priority::from_score(0.1), Priority::Low);
    }

    #[test]
    fn reason_multipliers() {
        assert_eq!(EscalationReason::SensitiveContent.multiplier(), 1.8);
        assert_eq!(EscalationReason::PolicyViolation.multiplier(), 1.6);
        assert_eq!(EscalationReason::GuardrailViolation.multiplier(), 1.5);
        assert_eq!(EscalationReason::QualityConcern.multiplier(), 1.4);
        assert_eq!(EscalationReason::ComplexEntities.multiplier(), 1.3);
        assert_eq!(EscalationReason::LowConfidence.multiplier(), 1.2);
        assert_eq!(EscalationReason::PotentialFalsePositive.multiplier(), 1.1);
        assert_eq!(EscalationReason::ManualReviewRequested.multiplier(), 1.0);
        assert_eq!(EscalationReason::MediumRelevancy.multiplier(), 1.0);
    }

    #[test]
    fn cluster_id_derivation() {
        assert_eq!(Article::cluster_id_for("abc-123"), "cluster_abc-123");
    }

    #[test]
    fn distinct_hits_ignores_repeat_terms() {
        let m = |kw: &str| KeywordMatch {
            keyword: kw.to_string(),
            hit_count: 1,
            contexts: vec![],
            confidence: 1.0,
        };
        let mut article = sample_article();
        article.keyword_matches = vec![m("Azure"), m("Azure"), m("AWS")];
        assert_eq!(article.distinct_keyword_hits(), 2);
    }

    #[test]
    fn version_bump_links() {
        let mut article = sample_article();
        assert_eq!(article.bump_version(), (1, 2));
        assert_eq!(article.bump_version(), (2, 3));
    }

    pub(crate) fn sample_article() -> Article {
        Article {
            article_id: "a-1".into(),
            feed_id: "feed-1".into(),
            url: "https://example.com/post".into(),
            canonical_url: "https://example.com/post".into(),
            title: "Sample".into(),
            published_at: Utc::now(),
            ingested_at: Utc::now(),
            content_hash: "00".repeat(32),
            raw_blob_key: "content/feed-1/a-1.html".into(),
            normalized_blob_key: "content/feed-1/a-1.txt".into(),
            state: ArticleState::Ingested,
            cluster_id: None,
            is_duplicate: false,
            duplicate_of: None,
            relevancy_score: None,
            keyword_matches: vec![],
            entities: EntityExtraction::default(),
            guardrail_flags: vec![],
            triage_action: None,
            priority_score: None,
            confidence: None,
            summary_short: None,
            tags: vec![],
            escalation: None,
            audit_trail: vec![],
            version: 1,
        }
    }
}
