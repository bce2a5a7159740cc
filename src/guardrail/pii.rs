//! PII detection and redaction.
//!
//! Regex detectors cover the mechanical shapes (emails, phone numbers,
//! SSNs, card numbers, IPs, opaque tokens, crypt hashes); the external
//! PII model contributes named-person/address/date/government-id spans.
//! Overlapping spans are deduplicated by `(start, end)` and redacted as
//! `[REDACTED_<KIND>]`.

use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::warn;

use crate::models::PiiModel;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("Invalid regex")
});

static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:\+?1[-.\s]?)?\(?[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}\b")
        .expect("Invalid regex")
});

static SSN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{3}-?\d{2}-?\d{4}\b").expect("Invalid regex"));

static CREDIT_CARD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:\d{4}[-\s]?){3}\d{4}\b").expect("Invalid regex"));

static IP_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b").expect("Invalid regex"));

static API_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Za-z0-9]{32,}\b").expect("Invalid regex"));

static PASSWORD_HASH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$[0-9a-z]+\$[0-9]+\$[A-Za-z0-9+/=.]{22,}").expect("Invalid regex")
});

const PATTERN_CONFIDENCE: f64 = 0.9;

/// One detected span, regex- or model-sourced.
#[derive(Debug, Clone, PartialEq)]
struct DetectedSpan {
    kind: String,
    start: usize,
    end: usize,
    confidence: f64,
}

/// Outcome of PII detection over one article.
#[derive(Debug, Clone, PartialEq)]
pub struct PiiDetectionResult {
    pub has_pii: bool,
    /// `(kind, start, end)` triples of the deduplicated spans.
    pub spans: Vec<(String, usize, usize)>,
    pub redacted_content: String,
    /// Mean of the detector confidences; 0.5 when detection degraded.
    pub confidence: f64,
}

/// Combined regex + model PII detector.
pub struct PiiDetector {
    model: Arc<dyn PiiModel>,
}

impl PiiDetector {
    pub fn new(model: Arc<dyn PiiModel>) -> Self {
        Self { model }
    }

    /// Detect PII across `title` and `content`.
    ///
    /// Model failure degrades to pattern-only detection with a warning.
    pub async fn detect(&self, content: &str, title: &str) -> PiiDetectionResult {
        let full_text = if title.is_empty() {
            content.to_string()
        } else {
            format!("{title}\n\n{content}")
        };

        let mut spans = detect_with_patterns(&full_text);

        match self.model.detect(&full_text).await {
            Ok(model_spans) => {
                for span in model_spans {
                    if span.end_offset <= full_text.len()
                        && span.begin_offset < span.end_offset
                        && full_text.is_char_boundary(span.begin_offset)
                        && full_text.is_char_boundary(span.end_offset)
                    {
                        spans.push(DetectedSpan {
                            kind: span.kind.to_uppercase(),
                            start: span.begin_offset,
                            end: span.end_offset,
                            confidence: span.score,
                        });
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "PII model unavailable, using pattern detection only");
            }
        }

        let spans = deduplicate(spans);
        let redacted_content = redact(&full_text, &spans);
        let confidence = if spans.is_empty() {
            1.0
        } else {
            spans.iter().map(|s| s.confidence).sum::<f64>() / spans.len() as f64
        };

        PiiDetectionResult {
            has_pii: !spans.is_empty(),
            spans: spans
                .iter()
                .map(|s| (s.kind.clone(), s.start, s.end))
                .collect(),
            redacted_content,
            confidence,
        }
    }
}

fn detect_with_patterns(text: &str) -> Vec<DetectedSpan> {
    let patterns: [(&str, &Regex); 7] = [
        ("EMAIL", &EMAIL),
        ("PHONE", &PHONE),
        ("SSN", &SSN),
        ("CREDIT_CARD", &CREDIT_CARD),
        ("IP_ADDRESS", &IP_ADDRESS),
        ("API_KEY", &API_KEY),
        ("PASSWORD_HASH", &PASSWORD_HASH),
    ];

    let mut spans = Vec::new();
    for (kind, pattern) in patterns {
        for m in pattern.find_iter(text) {
            // Opaque tokens must mix letters and digits, otherwise long
            // words trip the detector.
            if kind == "API_KEY" {
                let s = m.as_str();
                let has_alpha = s.chars().any(|c| c.is_ascii_alphabetic());
                let has_digit = s.chars().any(|c| c.is_ascii_digit());
                if !(has_alpha && has_digit) {
                    continue;
                }
            }
            spans.push(DetectedSpan {
                kind: kind.to_string(),
                start: m.start(),
                end: m.end(),
                confidence: PATTERN_CONFIDENCE,
            });
        }
    }
    spans
}

/// Deduplicate by `(start, end)`, keeping the higher-confidence span,
/// sorted by position.
fn deduplicate(mut spans: Vec<DetectedSpan>) -> Vec<DetectedSpan> {
    spans.sort_by(|a, b| {
        (a.start, a.end)
            .cmp(&(b.start, b.end))
            .then(b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal))
    });
    spans.dedup_by_key(|s| (s.start, s.end));
    spans
}

/// Replace each span with `[REDACTED_<KIND>]`, back to front so offsets
/// stay valid.
fn redact(text: &str, spans: &[DetectedSpan]) -> String {
    let mut out = text.to_string();
    for span in spans.iter().rev() {
        out.replace_range(span.start..span.end, &format!("[REDACTED_{}]", span.kind));
    }
    out
}
