//! Bias, sensationalism, and banned-term detection.

use std::sync::Arc;
use tracing::warn;

use crate::models::{moderation_prompt, ModerationModel};

use super::types::{Severity, Violation, ViolationKind};

const SENSATIONAL_WORDS: &[&str] = &[
    "critical",
    "urgent",
    "breaking",
    "shocking",
    "devastating",
    "catastrophic",
    "unprecedented",
    "massive",
    "huge",
    "enormous",
    "incredible",
    "unbelievable",
    "exclusive",
    "bombshell",
    "explosive",
    "alarming",
    "terrifying",
];

const POLITICAL_INDICATORS: &[&str] = &[
    "democrat",
    "republican",
    "liberal",
    "conservative",
    "leftist",
    "rightist",
];

const EMOTIONAL_INDICATORS: &[&str] = &[
    "outrageous",
    "ridiculous",
    "absurd",
    "insane",
    "crazy",
    "stupid",
];

const ABSOLUTE_INDICATORS: &[&str] = &[
    "always happens",
    "never works",
    "completely wrong",
    "totally false",
    "absolutely impossible",
];

const BANNED_TERMS: &[&str] = &["offensive", "discriminatory", "hate speech", "profanity"];

const TITLE_DENSITY_THRESHOLD: f64 = 0.15;
const BODY_DENSITY_THRESHOLD: f64 = 0.03;

/// Lexicon- and model-based bias detector.
pub struct BiasDetector {
    moderation: Arc<dyn ModerationModel>,
}

impl BiasDetector {
    pub fn new(moderation: Arc<dyn ModerationModel>) -> Self {
        Self { moderation }
    }

    /// Run lexicon checks plus the moderation model over `title` and
    /// `content`. Model failure degrades to lexicon-only with a warning.
    pub async fn detect(&self, title: &str, content: &str) -> Vec<Violation> {
        let full_text = if title.is_empty() {
            content.to_string()
        } else {
            format!("{title}\n\n{content}")
        };

        let mut violations = detect_sensationalism(&full_text, title);
        violations.extend(detect_bias_indicators(&full_text));
        violations.extend(detect_banned_terms(&full_text));

        match self.moderation.moderate(&moderation_prompt(title, content)).await {
            Ok(assessment) if assessment.has_bias => {
                violations.push(Violation {
                    kind: ViolationKind::BiasDetected,
                    severity: Severity::parse_lenient(&assessment.severity),
                    description: format!(
                        "{} bias: {}",
                        assessment.bias_type, assessment.description
                    ),
                    confidence: assessment.confidence,
                });
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "moderation model unavailable, using lexicons only");
            }
        }

        violations
    }
}

fn count_lexicon_hits(words: &[&str], lexicon: &[&str]) -> usize {
    words
        .iter()
        .filter(|w| {
            let cleaned: String = w
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            lexicon.contains(&cleaned.as_str())
        })
        .count()
}

fn detect_sensationalism(full_text: &str, title: &str) -> Vec<Violation> {
    let mut violations = Vec::new();

    let title_words: Vec<&str> = title.split_whitespace().collect();
    if !title_words.is_empty() {
        let hits = count_lexicon_hits(&title_words, SENSATIONAL_WORDS);
        let density = hits as f64 / title_words.len() as f64;
        if density > TITLE_DENSITY_THRESHOLD {
            violations.push(Violation {
                kind: ViolationKind::Sensationalism,
                severity: Severity::Medium,
                description: format!(
                    "sensational language density {:.0}% in title",
                    density * 100.0
                ),
                confidence: 0.8,
            });
        }
    }

    let body_words: Vec<&str> = full_text.split_whitespace().collect();
    if !body_words.is_empty() {
        let hits = count_lexicon_hits(&body_words, SENSATIONAL_WORDS);
        let density = hits as f64 / body_words.len() as f64;
        if density > BODY_DENSITY_THRESHOLD {
            violations.push(Violation {
                kind: ViolationKind::Sensationalism,
                severity: Severity::Low,
                description: format!(
                    "sensational language density {:.1}% in body",
                    density * 100.0
                ),
                confidence: 0.7,
            });
        }
    }

    violations
}

fn detect_bias_indicators(text: &str) -> Vec<Violation> {
    let lowered = text.to_lowercase();
    let categories: [(&str, &[&str]); 3] = [
        ("political", POLITICAL_INDICATORS),
        ("emotional", EMOTIONAL_INDICATORS),
        ("absolute", ABSOLUTE_INDICATORS),
    ];

    let mut violations = Vec::new();
    for (category, indicators) in categories {
        let found: Vec<&str> = indicators
            .iter()
            .filter(|term| lowered.contains(*term))
            .copied()
            .collect();
        if !found.is_empty() {
            violations.push(Violation {
                kind: ViolationKind::BiasDetected,
                severity: Severity::Medium,
                description: format!("{category} bias indicators: {}", found.join(", ")),
                confidence: 0.75,
            });
        }
    }
    violations
}

fn detect_banned_terms(text: &str) -> Vec<Violation> {
    let lowered = text.to_lowercase();
    let found: Vec<&str> = BANNED_TERMS
        .iter()
        .filter(|term| lowered.contains(*term))
        .copied()
        .collect();
    if found.is_empty() {
        return vec![];
    }
    vec![Violation {
        kind: ViolationKind::BannedTerms,
        severity: Severity::High,
        description: format!("banned terms present: {}", found.join(", ")),
        confidence: 0.95,
    }]
}
