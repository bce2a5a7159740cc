//! The relevance evaluator proper.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::article::{EntityExtraction, KeywordMatch};
use crate::models::{
    entity_extraction_prompt, relevance_prompt, EntityExtractionModel, RelevanceModel,
};
use crate::registry::KeywordMatcher;

/// Maximum boost keyword hits can add to the model's base score.
const MAX_KEYWORD_BOOST: f64 = 0.2;
const BOOST_PER_HIT: f64 = 0.05;

/// Combined relevance verdict for one article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceResult {
    pub is_relevant: bool,
    pub relevancy_score: f64,
    pub keyword_matches: Vec<KeywordMatch>,
    pub entities: EntityExtraction,
    pub rationale: String,
    pub confidence: f64,
}

impl RelevanceResult {
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

    /// Total hit count across all matches.
    pub fn total_hits(&self) -> u32 {
        self.keyword_matches.iter().map(|m| m.hit_count).sum()
    }
}

/// Evaluates article relevance against the configured watchlist.
pub struct RelevanceEvaluator {
    matcher: KeywordMatcher,
    relevance: Arc<dyn RelevanceModel>,
    entities: Arc<dyn EntityExtractionModel>,
}

impl RelevanceEvaluator {
    pub fn new(
        matcher: KeywordMatcher,
        relevance: Arc<dyn RelevanceModel>,
        entities: Arc<dyn EntityExtractionModel>,
    ) -> Self {
        Self {
            matcher,
            relevance,
            entities,
        }
    }

    /// Evaluate one article. Never fails: model errors degrade to a
    /// conservative verdict with a warning.
    pub async fn evaluate(&self, title: &str, content: &str) -> RelevanceResult {
        let text = if title.is_empty() {
            content.to_string()
        } else {
            format!("{title}\n\n{content}")
        };
        let keyword_matches = self.matcher.match_keywords(&text);

        let entities = match self
            .entities
            .extract(&entity_extraction_prompt(title, content))
            .await
        {
            Ok(entities) => entities,
            Err(e) => {
                warn!(error = %e, "entity extraction unavailable");
                EntityExtraction::default()
            }
        };

        let matched: Vec<String> = keyword_matches.iter().map(|m| m.keyword.clone()).collect();
        let assessment = match self
            .relevance
            .assess(&relevance_prompt(title, content, &matched))
            .await
        {
            Ok(a) => a,
            Err(e) => {
                warn!(error = %e, "relevance assessment unavailable");
                return RelevanceResult {
                    is_relevant: false,
                    relevancy_score: 0.0,
                    keyword_matches,
                    entities,
                    rationale: "assessment unavailable".to_string(),
                    confidence: 0.5,
                };
            }
        };

        let total_hits: u32 = keyword_matches.iter().map(|m| m.hit_count).sum();
        let score = adjust_score(assessment.relevancy_score.clamp(0.0, 1.0), total_hits);
        let confidence = overall_confidence(&keyword_matches, &entities, score);

        RelevanceResult {
            is_relevant: assessment.is_relevant,
            relevancy_score: score,
            keyword_matches,
            entities,
            rationale: assessment.rationale,
            confidence,
        }
    }
}

/// `final = min(1.0, base + min(0.2, 0.05 × total_hits))`.
fn adjust_score(base: f64, total_hits: u32) -> f64 {
    let boost = (BOOST_PER_HIT * total_hits as f64).min(MAX_KEYWORD_BOOST);
    (base + boost).min(1.0)
}

/// Confidence: 0.7 base, plus keyword, entity, and score contributions,
/// capped at 1.0.
fn overall_confidence(
    matches: &[KeywordMatch],
    entities: &EntityExtraction,
    score: f64,
) -> f64 {
    let mut confidence = 0.7;

    if !matches.is_empty() {
        let avg: f64 = matches.iter().map(|m| m.confidence).sum::<f64>() / matches.len() as f64;
        confidence += avg * 0.1;
    }

    confidence += (entities.total() as f64 * 0.03).min(0.15);

    if score > 0.8 {
        confidence += 0.1;
    } else if score > 0.6 {
        confidence += 0.05;
    }

    confidence.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::models::RelevanceAssessment;
    use crate::registry::{KeywordConfig, KeywordRegistry, KeywordsConfig, MatchSettings};
    use async_trait::async_trait;

    struct StubRelevance {
        score: f64,
        fail: bool,
    }

    #[async_trait]
    impl RelevanceModel for StubRelevance {
        async fn assess(&self, _prompt: &str) -> Result<RelevanceAssessment> {
            if self.fail {
                return Err(Error::model_failure("relevance", "down"));
            }
            Ok(RelevanceAssessment {
                is_relevant: self.score >= 0.5,
                relevancy_score: self.score,
                rationale: "stub rationale".to_string(),
            })
        }
    }

    struct StubEntities {
        cves: Vec<String>,
        fail: bool,
    }

    #[async_trait]
    impl EntityExtractionModel for StubEntities {
        async fn extract(&self, _prompt: &str) -> Result<EntityExtraction> {
            if self.fail {
                return Err(Error::model_failure("entity_extraction", "down"));
            }
            Ok(EntityExtraction {
                cves: self.cves.clone(),
                ..Default::default()
            })
        }
    }

    fn matcher() -> KeywordMatcher {
        let config = KeywordsConfig {
            cloud_platforms: vec![KeywordConfig {
                keyword: "Azure".into(),
                variations: vec![],
                weight: 1.0,
                description: None,
            }],
            settings: MatchSettings::default(),
            ..Default::default()
        };
        KeywordMatcher::new(KeywordRegistry::from_config(config).unwrap())
    }

    fn evaluator(score: f64, fail_relevance: bool, fail_entities: bool) -> RelevanceEvaluator {
        RelevanceEvaluator::new(
            matcher(),
            Arc::new(StubRelevance {
                score,
                fail: fail_relevance,
            }),
            Arc::new(StubEntities {
                cves: vec!["CVE-2026-1111".into()],
                fail: fail_entities,
            }),
        )
    }

    #[tokio::test]
    async fn keyword_hits_boost_score() {
        let result = evaluator(0.7, false, false)
            .evaluate("Azure incident", "Azure outage hits Azure users")
            .await;
        // 3 hits → boost 0.15.
        assert!((result.relevancy_score - 0.85).abs() < 1e-9);
        assert!(result.is_relevant);
    }

    #[tokio::test]
    async fn boost_caps_at_point_two() {
        let content = "Azure ".repeat(10);
        let result = evaluator(0.7, false, false).evaluate("t", &content).await;
        assert!((result.relevancy_score - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn score_clamped_to_one() {
        let result = evaluator(0.95, false, false)
            .evaluate("Azure", "Azure Azure Azure Azure")
            .await;
        assert_eq!(result.relevancy_score, 1.0);
    }

    #[tokio::test]
    async fn model_failure_degrades_conservatively() {
        let result = evaluator(0.9, true, false)
            .evaluate("Azure incident", "Azure outage")
            .await;
        assert!(!result.is_relevant);
        assert_eq!(result.relevancy_score, 0.0);
        assert_eq!(result.rationale, "assessment unavailable");
        assert_eq!(result.confidence, 0.5);
        // Keyword matches are still computed locally.
        assert!(!result.keyword_matches.is_empty());
    }

    #[tokio::test]
    async fn entity_failure_keeps_assessment() {
        let result = evaluator(0.9, false, true)
            .evaluate("Azure incident", "Azure outage")
            .await;
        assert!(result.is_relevant);
        assert!(result.entities.is_empty());
    }

    #[tokio::test]
    async fn confidence_formula() {
        let result = evaluator(0.85, false, false)
            .evaluate("Azure incident", "Azure outage")
            .await;
        // 0.7 + 1.0·0.1 (one exact match) + 0.03 (one CVE) + 0.1 (score > 0.8)
        assert!((result.confidence - 0.93).abs() < 1e-9);
    }

    #[test]
    fn distinct_hits_and_totals() {
        let m = |kw: &str, hits: u32| KeywordMatch {
            keyword: kw.into(),
            hit_count: hits,
            contexts: vec![],
            confidence: 1.0,
        };
        let result = RelevanceResult {
            is_relevant: true,
            relevancy_score: 0.9,
            keyword_matches: vec![m("Azure", 2), m("Azure", 1), m("AWS", 4)],
            entities: EntityExtraction::default(),
            rationale: String::new(),
            confidence: 0.9,
        };
        assert_eq!(result.distinct_keyword_hits(), 2);
        assert_eq!(result.total_hits(), 7);
    }
}
