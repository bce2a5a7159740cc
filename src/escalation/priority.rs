//! Priority scoring for escalated articles.

use chrono::{DateTime, Utc};

use crate::article::EscalationReason;

const WEIGHT_RELEVANCY: f64 = 0.30;
const WEIGHT_KEYWORDS: f64 = 0.25;
const WEIGHT_ENTITIES: f64 = 0.15;
const WEIGHT_VIOLATIONS: f64 = 0.20;
const WEIGHT_TIME: f64 = 0.10;

/// Raw factors feeding the priority formula.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorityFactors {
    pub relevancy_score: f64,
    pub keyword_match_count: usize,
    pub total_entities: usize,
    pub guardrail_violation_count: usize,
    pub published_at: DateTime<Utc>,
}

/// Weighted-sum priority scorer with reason multipliers.
///
/// The exact weights are policy; tests pin the formula as specified.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityScorer;

impl PriorityScorer {
    /// Score in [0, 1]: weighted factor sum times the reason multiplier.
    pub fn score(
        &self,
        factors: &PriorityFactors,
        reason: EscalationReason,
        now: DateTime<Utc>,
    ) -> f64 {
        let keyword_factor = (factors.keyword_match_count as f64 / 5.0).min(1.0);
        let entity_factor = (factors.total_entities as f64 / 10.0).min(1.0);
        let violation_factor = (factors.guardrail_violation_count as f64 / 3.0).min(1.0);

        let hours_old = (now - factors.published_at).num_seconds() as f64 / 3600.0;
        let time_factor = (1.0 - hours_old / 24.0).max(0.0);

        let base = WEIGHT_RELEVANCY * factors.relevancy_score.clamp(0.0, 1.0)
            + WEIGHT_KEYWORDS * keyword_factor
            + WEIGHT_ENTITIES * entity_factor
            + WEIGHT_VIOLATIONS * violation_factor
            + WEIGHT_TIME * time_factor;

        (base * reason.multiplier()).clamp(0.0, 1.0)
    }
}
