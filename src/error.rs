//! Error types for sentinel-core.

use thiserror::Error;

/// Result type alias using sentinel-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during triage operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed feed or keyword registry; surfaces at startup and aborts.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Store-level throttling; retried with backoff.
    #[error("Throttled by {resource}")]
    Throttled { resource: String },

    /// Network-level failure talking to a remote collaborator.
    #[error("Network error: {0}")]
    Network(String),

    /// Deadline expired on a remote call or a per-article budget.
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Conditional write lost to a concurrent writer.
    #[error("Precondition failed for {key}: {detail}")]
    PreconditionFailed { key: String, detail: String },

    /// Optimistic-concurrency retries exhausted.
    #[error("Conflict on {key} after {attempts} attempts")]
    Conflict { key: String, attempts: u32 },

    /// A `(state, decision)` pair outside the allowed transition set.
    #[error("Invalid transition from {state} on decision '{decision}'")]
    InvalidTransition { state: String, decision: String },

    /// Missing or wrongly-typed input; non-retryable.
    #[error("Validation error: {0}")]
    Validation(String),

    /// LLM, embedding, or moderation backend failure; callers degrade.
    #[error("Model failure: {model} - {message}")]
    ModelFailure { model: String, message: String },

    /// Entity absent where one was required.
    #[error("Not found: {kind} {id}")]
    NotFound { kind: String, id: String },

    /// Entity- or blob-store failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a throttling error.
    pub fn throttled(resource: impl Into<String>) -> Self {
        Self::Throttled {
            resource: resource.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a precondition-failed error.
    pub fn precondition_failed(key: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::PreconditionFailed {
            key: key.into(),
            detail: detail.into(),
        }
    }

    /// Create an invalid-transition error.
    pub fn invalid_transition(state: impl Into<String>, decision: impl Into<String>) -> Self {
        Self::InvalidTransition {
            state: state.into(),
            decision: decision.into(),
        }
    }

    /// Create a model-failure error.
    pub fn model_failure(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModelFailure {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Whether this error is worth retrying with backoff.
    ///
    /// `PreconditionFailed` is retryable at the decision-processor level
    /// (re-read then retry), but is excluded here: the generic backoff
    /// helper must not blindly replay a conditional write.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Throttled { .. } | Self::Network(_) | Self::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(Error::throttled("articles").is_transient());
        assert!(Error::Network("connection reset".into()).is_transient());
        assert!(Error::timeout(500).is_transient());

        assert!(!Error::invalid_transition("ARCHIVED", "approve").is_transient());
        assert!(!Error::Validation("missing title".into()).is_transient());
        assert!(!Error::precondition_failed("a-1", "version mismatch").is_transient());
    }

    #[test]
    fn display_formats() {
        let err = Error::invalid_transition("ARCHIVED", "approve");
        assert_eq!(
            err.to_string(),
            "Invalid transition from ARCHIVED on decision 'approve'"
        );

        let err = Error::model_failure("relevance", "empty response");
        assert_eq!(err.to_string(), "Model failure: relevance - empty response");
    }
}
