//! Triage decision engine.
//!
//! A pure function of the relevance and guardrail results. The threshold
//! matrix:
//!
//! | condition                                   | action       |
//! |---------------------------------------------|--------------|
//! | guardrail not passed                        | REVIEW       |
//! | relevancy > 0.8 and ≥1 keyword hit          | AUTO_PUBLISH |
//! | 0.6 ≤ relevancy ≤ 0.8 and ≥1 keyword hit    | REVIEW       |
//! | relevancy > 0.8 and 0 keyword hits          | REVIEW       |
//! | otherwise                                   | DROP         |

use serde::{Deserialize, Serialize};

use crate::article::{EscalationReason, TriageAction};
use crate::guardrail::GuardrailResult;
use crate::relevance::RelevanceResult;

const AUTO_PUBLISH_THRESHOLD: f64 = 0.8;
const REVIEW_THRESHOLD: f64 = 0.6;

/// Outcome of the triage decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageResult {
    pub action: TriageAction,
    pub confidence: f64,
    pub rationale: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation_reason: Option<EscalationReason>,
}

/// Decide the triage action for one article.
///
/// `keyword_hits` counts distinct matched primary terms, not total
/// occurrences.
pub fn decide(relevance: &RelevanceResult, guardrail: &GuardrailResult) -> TriageResult {
    let score = relevance.relevancy_score;
    let keyword_hits = relevance.distinct_keyword_hits();

    if !guardrail.passed {
        return TriageResult {
            action: TriageAction::Review,
            confidence: guardrail.confidence,
            rationale: format!("guardrail failed: {}", guardrail.rationale),
            escalation_reason: Some(EscalationReason::GuardrailViolation),
        };
    }

    if score > AUTO_PUBLISH_THRESHOLD && keyword_hits >= 1 {
        return TriageResult {
            action: TriageAction::AutoPublish,
            confidence: relevance.confidence,
            rationale: format!(
                "relevancy {score:.2} with {keyword_hits} keyword hit(s)"
            ),
            escalation_reason: None,
        };
    }

    if (REVIEW_THRESHOLD..=AUTO_PUBLISH_THRESHOLD).contains(&score) && keyword_hits >= 1 {
        return TriageResult {
            action: TriageAction::Review,
            confidence: relevance.confidence,
            rationale: format!(
                "medium relevancy {score:.2} with {keyword_hits} keyword hit(s)"
            ),
            escalation_reason: Some(EscalationReason::MediumRelevancy),
        };
    }

    if score > AUTO_PUBLISH_THRESHOLD {
        return TriageResult {
            action: TriageAction::Review,
            confidence: relevance.confidence,
            rationale: format!("high relevancy {score:.2} but no keyword hits"),
            escalation_reason: Some(EscalationReason::HighRelevancyNoKeywords),
        };
    }

    TriageResult {
        action: TriageAction::Drop,
        confidence: relevance.confidence,
        rationale: format!(
            "relevancy {score:.2} with {keyword_hits} keyword hit(s) below thresholds"
        ),
        escalation_reason: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::{EntityExtraction, KeywordMatch};
    use crate::guardrail::{Severity, Violation, ViolationKind};

    fn relevance(score: f64, hits: usize) -> RelevanceResult {
        RelevanceResult {
            is_relevant: score >= 0.5,
            relevancy_score: score,
            keyword_matches: (0..hits)
                .map(|i| KeywordMatch {
                    keyword: format!("kw-{i}"),
                    hit_count: 1,
                    contexts: vec![],
                    confidence: 1.0,
                })
                .collect(),
            entities: EntityExtraction::default(),
            rationale: String::new(),
            confidence: 0.9,
        }
    }

    fn pass() -> GuardrailResult {
        GuardrailResult::aggregate(vec![], None)
    }

    fn fail() -> GuardrailResult {
        GuardrailResult::aggregate(
            vec![Violation {
                kind: ViolationKind::PiiDetected,
                severity: Severity::High,
                description: "pii".into(),
                confidence: 0.9,
            }],
            None,
        )
    }

    #[test]
    fn high_relevancy_with_hits_auto_publishes() {
        let result = decide(&relevance(0.9, 1), &pass());
        assert_eq!(result.action, TriageAction::AutoPublish);
        assert!(result.escalation_reason.is_none());
    }

    #[test]
    fn guardrail_failure_forces_review() {
        let result = decide(&relevance(0.95, 5), &fail());
        assert_eq!(result.action, TriageAction::Review);
        assert_eq!(
            result.escalation_reason,
            Some(EscalationReason::GuardrailViolation)
        );
    }

    #[test]
    fn medium_relevancy_with_hits_reviews() {
        for score in [0.6, 0.7, 0.8] {
            let result = decide(&relevance(score, 2), &pass());
            assert_eq!(result.action, TriageAction::Review, "score {score}");
            assert_eq!(
                result.escalation_reason,
                Some(EscalationReason::MediumRelevancy)
            );
        }
    }

    #[test]
    fn high_relevancy_without_hits_reviews() {
        let result = decide(&relevance(0.9, 0), &pass());
        assert_eq!(result.action, TriageAction::Review);
        assert_eq!(
            result.escalation_reason,
            Some(EscalationReason::HighRelevancyNoKeywords)
        );
    }

    #[test]
    fn low_relevancy_drops() {
        assert_eq!(decide(&relevance(0.5, 3), &pass()).action, TriageAction::Drop);
        assert_eq!(decide(&relevance(0.7, 0), &pass()).action, TriageAction::Drop);
        assert_eq!(decide(&relevance(0.1, 0), &pass()).action, TriageAction::Drop);
    }

    #[test]
    fn boundary_at_exactly_point_eight_reviews() {
        // 0.8 is inside the medium band, not above it.
        let result = decide(&relevance(0.8, 1), &pass());
        assert_eq!(result.action, TriageAction::Review);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// The decision is a pure function of its inputs.
            #[test]
            fn deterministic(score in 0.0f64..=1.0, hits in 0usize..6, passed: bool) {
                let rel = relevance(score, hits);
                let guard = if passed { pass() } else { fail() };
                let first = decide(&rel, &guard);
                let second = decide(&rel, &guard);
                prop_assert_eq!(first, second);
            }

            /// Every decision lands in one of the three actions, and a
            /// failed guardrail always reviews.
            #[test]
            fn total_and_guardrail_dominant(score in 0.0f64..=1.0, hits in 0usize..6) {
                let rel = relevance(score, hits);
                let on_fail = decide(&rel, &fail());
                prop_assert_eq!(on_fail.action, TriageAction::Review);

                let on_pass = decide(&rel, &pass());
                prop_assert!(matches!(
                    on_pass.action,
                    TriageAction::AutoPublish | TriageAction::Review | TriageAction::Drop
                ));
            }

            /// AUTO_PUBLISH requires both the score and a keyword hit.
            #[test]
            fn auto_publish_requires_evidence(score in 0.0f64..=1.0, hits in 0usize..6) {
                let result = decide(&relevance(score, hits), &pass());
                if result.action == TriageAction::AutoPublish {
                    prop_assert!(score > 0.8);
                    prop_assert!(hits >= 1);
                }
            }
        }
    }
}
