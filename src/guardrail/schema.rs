//! Declared-schema validation of structured payloads.

use chrono::DateTime;
use serde_json::Value;

use super::types::{Severity, Violation, ViolationKind};

/// The payload schemas the guardrail knows how to validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaName {
    Article,
    RelevanceResult,
    EntityExtraction,
}

impl SchemaName {
    /// Resolve a caller-supplied schema name; `None` means unknown.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "article" => Some(Self::Article),
            "relevance_result" => Some(Self::RelevanceResult),
            "entity_extraction" => Some(Self::EntityExtraction),
            _ => None,
        }
    }
}

/// Field types the schema table can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldType {
    String,
    Bool,
    Array,
    Object,
    /// Number constrained to [0, 1].
    UnitNumber,
    /// RFC3339 timestamp string.
    Timestamp,
    /// http(s) URL string.
    Url,
}

struct FieldSpec {
    name: &'static str,
    field_type: FieldType,
    required: bool,
}

const fn required(name: &'static str, field_type: FieldType) -> FieldSpec {
    FieldSpec {
        name,
        field_type,
        required: true,
    }
}

const fn optional(name: &'static str, field_type: FieldType) -> FieldSpec {
    FieldSpec {
        name,
        field_type,
        required: false,
    }
}

const ARTICLE_FIELDS: &[FieldSpec] = &[
    required("article_id", FieldType::String),
    required("feed_id", FieldType::String),
    required("url", FieldType::Url),
    required("title", FieldType::String),
    required("published_at", FieldType::Timestamp),
    optional("canonical_url", FieldType::Url),
    optional("relevancy_score", FieldType::UnitNumber),
    optional("confidence", FieldType::UnitNumber),
    optional("keyword_matches", FieldType::Array),
    optional("tags", FieldType::Array),
];

const RELEVANCE_FIELDS: &[FieldSpec] = &[
    required("is_relevant", FieldType::Bool),
    required("relevancy_score", FieldType::UnitNumber),
    required("keyword_matches", FieldType::Array),
    required("entities", FieldType::Object),
    required("rationale", FieldType::String),
    required("confidence", FieldType::UnitNumber),
];

const ENTITY_FIELDS: &[FieldSpec] = &[
    required("cves", FieldType::Array),
    required("threat_actors", FieldType::Array),
    required("malware", FieldType::Array),
    required("vendors", FieldType::Array),
    required("products", FieldType::Array),
    required("sectors", FieldType::Array),
    required("countries", FieldType::Array),
];

/// Validate `data` against a declared schema.
pub fn validate_schema(data: &Value, schema: SchemaName) -> Vec<Violation> {
    let fields = match schema {
        SchemaName::Article => ARTICLE_FIELDS,
        SchemaName::RelevanceResult => RELEVANCE_FIELDS,
        SchemaName::EntityExtraction => ENTITY_FIELDS,
    };

    let mut violations = Vec::new();
    for field in fields {
        match data.get(field.name) {
            None | Some(Value::Null) => {
                if field.required {
                    violations.push(Violation {
                        kind: ViolationKind::SchemaViolation,
                        severity: Severity::High,
                        description: format!("missing required field '{}'", field.name),
                        confidence: 1.0,
                    });
                }
            }
            Some(value) => {
                if let Some(problem) = check_type(value, field.field_type) {
                    violations.push(Violation {
                        kind: ViolationKind::SchemaViolation,
                        severity: Severity::High,
                        description: format!("field '{}': {problem}", field.name),
                        confidence: 1.0,
                    });
                }
            }
        }
    }
    violations
}

/// Validate against a schema identified by name; an unknown name is a
/// medium violation rather than an error.
pub fn validate_named_schema(data: &Value, name: &str) -> Vec<Violation> {
    match SchemaName::parse(name) {
        Some(schema) => validate_schema(data, schema),
        None => vec![Violation {
            kind: ViolationKind::SchemaViolation,
            severity: Severity::Medium,
            description: format!("unknown schema '{name}'"),
            confidence: 1.0,
        }],
    }
}

fn check_type(value: &Value, field_type: FieldType) -> Option<String> {
    match field_type {
        FieldType::String => value
            .as_str()
            .is_none()
            .then(|| "expected string".to_string()),
        FieldType::Bool => value
            .as_bool()
            .is_none()
            .then(|| "expected boolean".to_string()),
        FieldType::Array => value
            .as_array()
            .is_none()
            .then(|| "expected array".to_string()),
        FieldType::Object => value
            .as_object()
            .is_none()
            .then(|| "expected object".to_string()),
        FieldType::UnitNumber => match value.as_f64() {
            None => Some("expected number".to_string()),
            Some(n) if !(0.0..=1.0).contains(&n) => {
                Some(format!("value {n} outside [0, 1]"))
            }
            Some(_) => None,
        },
        FieldType::Timestamp => match value.as_str() {
            None => Some("expected timestamp string".to_string()),
            Some(s) => DateTime::parse_from_rfc3339(s)
                .is_err()
                .then(|| format!("'{s}' is not RFC3339")),
        },
        FieldType::Url => match value.as_str() {
            None => Some("expected url string".to_string()),
            Some(s) => match url::Url::parse(s) {
                Ok(u) if u.scheme() == "http" || u.scheme() == "https" => None,
                Ok(u) => Some(format!("scheme '{}' is not http(s)", u.scheme())),
                Err(e) => Some(format!("bad url: {e}")),
            },
        },
    }
}
