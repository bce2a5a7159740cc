//! Multi-layer content-safety guardrail.
//!
//! Four independent checks — schema, PII, CVE, bias/sensationalism —
//! each emit zero or more severity-tagged violations. Aggregation: any
//! critical or high violation fails the article, as do more than three
//! mediums. The validator always returns a [`GuardrailResult`], even when
//! a check degrades internally.

mod bias;
mod cve;
mod pii;
mod schema;
mod types;

pub use bias::BiasDetector;
pub use cve::CveValidator;
pub use pii::{PiiDetectionResult, PiiDetector};
pub use schema::{validate_named_schema, validate_schema, SchemaName};
pub use types::{GuardrailResult, Severity, Violation, ViolationKind};

use serde_json::Value;
use std::sync::Arc;

use crate::models::{ModerationModel, PiiModel};

/// The combined validator run by the pipeline.
pub struct GuardrailValidator {
    pii: PiiDetector,
    cve: CveValidator,
    bias: BiasDetector,
}

impl GuardrailValidator {
    pub fn new(pii_model: Arc<dyn PiiModel>, moderation: Arc<dyn ModerationModel>) -> Self {
        Self {
            pii: PiiDetector::new(pii_model),
            cve: CveValidator::new(),
            bias: BiasDetector::new(moderation),
        }
    }

    /// Run all four checks over an article payload and its text.
    ///
    /// `extracted_cves` is the CVE list produced by entity extraction;
    /// it is cross-checked against CVEs literally present in the content.
    pub async fn validate(
        &self,
        article_payload: &Value,
        title: &str,
        content: &str,
        extracted_cves: &[String],
    ) -> GuardrailResult {
        let mut violations = Vec::new();
        let mut redacted_content = None;

        violations.extend(validate_schema(article_payload, SchemaName::Article));

        let pii = self.pii.detect(content, title).await;
        if pii.has_pii {
            redacted_content = Some(pii.redacted_content.clone());
            violations.push(Violation {
                kind: ViolationKind::PiiDetected,
                severity: Severity::High,
                description: format!("{} PII span(s) detected", pii.spans.len()),
                confidence: pii.confidence,
            });
        }

        violations.extend(self.cve.validate(content, extracted_cves));
        violations.extend(self.bias.detect(title, content).await);

        GuardrailResult::aggregate(violations, redacted_content)
    }
}
