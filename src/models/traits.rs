//! Abstract model backends consumed by the pipeline stages.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::article::EntityExtraction;
use crate::error::Result;

/// Structured relevance verdict returned by the relevance backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceAssessment {
    pub is_relevant: bool,
    pub relevancy_score: f64,
    pub rationale: String,
}

/// Structured bias verdict returned by the moderation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationAssessment {
    pub has_bias: bool,
    #[serde(default)]
    pub bias_type: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    0.5
}

/// One PII span detected by the PII backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiiSpan {
    /// Detector kind, e.g. `PERSON`, `ADDRESS`, `DATE_TIME`.
    #[serde(rename = "type")]
    pub kind: String,
    pub begin_offset: usize,
    pub end_offset: usize,
    pub score: f64,
}

/// Relevance assessment backend.
#[async_trait]
pub trait RelevanceModel: Send + Sync {
    /// Assess the relevance of an article given its text and the keyword
    /// match summary rendered into `prompt`.
    async fn assess(&self, prompt: &str) -> Result<RelevanceAssessment>;
}

/// Named-entity extraction backend.
#[async_trait]
pub trait EntityExtractionModel: Send + Sync {
    async fn extract(&self, prompt: &str) -> Result<EntityExtraction>;
}

/// Dense-embedding backend.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Bias/sensationalism moderation backend.
#[async_trait]
pub trait ModerationModel: Send + Sync {
    async fn moderate(&self, prompt: &str) -> Result<ModerationAssessment>;
}

/// PII span-detection backend.
#[async_trait]
pub trait PiiModel: Send + Sync {
    async fn detect(&self, text: &str) -> Result<Vec<PiiSpan>>;
}
