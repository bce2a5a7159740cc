//! External model interfaces and provider implementations.
//!
//! Five abstract backends feed the pipeline: relevance assessment, entity
//! extraction, text embeddings, moderation, and PII span detection. All are
//! expected to return additively-valid JSON embedded anywhere in the
//! response; [`extract`] recovers the first balanced object or array and
//! type-checks it against the declared shape.

mod client;
mod extract;
mod prompts;
mod traits;

pub use client::{AnthropicModels, ModelConfig, VoyageEmbeddings};
pub use extract::{first_json_array, first_json_object, parse_model_json};
pub use prompts::{entity_extraction_prompt, moderation_prompt, pii_prompt, relevance_prompt};
pub use traits::{
    EmbeddingModel, EntityExtractionModel, ModerationAssessment, ModerationModel, PiiModel,
    PiiSpan, RelevanceAssessment, RelevanceModel,
};
