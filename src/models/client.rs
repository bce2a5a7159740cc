//! HTTP-backed model providers.
//!
//! [`AnthropicModels`] drives the relevance, entity-extraction, moderation,
//! and PII backends through the Anthropic messages API. [`VoyageEmbeddings`]
//! provides the dense-embedding backend (Anthropic has no native embedding
//! endpoint).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::article::EntityExtraction;
use crate::error::{Error, Result};

use super::extract::{first_json_array, parse_model_json};
use super::prompts::pii_prompt;
use super::traits::{
    EmbeddingModel, EntityExtractionModel, ModerationAssessment, ModerationModel, PiiModel,
    PiiSpan, RelevanceAssessment, RelevanceModel,
};

/// Configuration shared by the HTTP model providers.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// API key
    pub api_key: String,
    /// Base URL override
    pub base_url: Option<String>,
    /// Model identifier override
    pub model: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl ModelConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            model: None,
            timeout_secs: 60,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

fn build_http_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_default()
}

/// Map an HTTP failure onto the error taxonomy so the retry layer can
/// classify it.
fn classify_status(model: &str, status: reqwest::StatusCode, body: &str) -> Error {
    if status.as_u16() == 429 {
        return Error::throttled(model.to_string());
    }
    if status.is_server_error() {
        return Error::Network(format!("{model}: upstream {status}"));
    }
    Error::model_failure(model, format!("HTTP {status}: {body}"))
}

fn classify_transport(model: &str, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::timeout(0)
    } else if err.is_connect() || err.is_request() {
        Error::Network(format!("{model}: {err}"))
    } else {
        Error::model_failure(model, err.to_string())
    }
}

/// Anthropic-backed provider for the prompt-driven model traits.
pub struct AnthropicModels {
    config: ModelConfig,
    http: Client,
}

impl AnthropicModels {
    const DEFAULT_BASE_URL: &'static str = "https://api.anthropic.com";
    const DEFAULT_MODEL: &'static str = "claude-3-5-sonnet-20241022";
    const API_VERSION: &'static str = "2023-06-01";
    const MAX_TOKENS: u32 = 1024;

    pub fn new(config: ModelConfig) -> Self {
        let http = build_http_client(config.timeout_secs);
        Self { config, http }
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(Self::DEFAULT_BASE_URL)
    }

    /// One single-turn completion; returns the concatenated text blocks.
    async fn complete(&self, label: &str, prompt: &str) -> Result<String> {
        let request = MessagesRequest {
            model: self
                .config
                .model
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
            max_tokens: Self::MAX_TOKENS,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: Some(0.1),
        };

        let url = format!("{}/v1/messages", self.base_url());
        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", Self::API_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(label, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify_transport(label, e))?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ApiError>(&body) {
                return Err(classify_status(
                    label,
                    status,
                    &format!("{}: {}", error.error.error_type, error.error.message),
                ));
            }
            return Err(classify_status(label, status, &body));
        }

        let parsed: MessagesResponse = serde_json::from_str(&body)
            .map_err(|e| Error::model_failure(label, format!("bad response envelope: {e}")))?;

        let text = parsed
            .content
            .iter()
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join("");
        if text.is_empty() {
            return Err(Error::model_failure(label, "empty completion"));
        }
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    #[allow(dead_code)]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: String,
}

#[async_trait]
impl RelevanceModel for AnthropicModels {
    async fn assess(&self, prompt: &str) -> Result<RelevanceAssessment> {
        let response = self.complete("relevance", prompt).await?;
        let mut assessment: RelevanceAssessment = parse_model_json("relevance", &response)?;
        assessment.relevancy_score = assessment.relevancy_score.clamp(0.0, 1.0);
        Ok(assessment)
    }
}

#[async_trait]
impl EntityExtractionModel for AnthropicModels {
    async fn extract(&self, prompt: &str) -> Result<EntityExtraction> {
        let response = self.complete("entity_extraction", prompt).await?;
        parse_model_json("entity_extraction", &response)
    }
}

#[async_trait]
impl ModerationModel for AnthropicModels {
    async fn moderate(&self, prompt: &str) -> Result<ModerationAssessment> {
        let response = self.complete("moderation", prompt).await?;
        parse_model_json("moderation", &response)
    }
}

#[async_trait]
impl PiiModel for AnthropicModels {
    async fn detect(&self, text: &str) -> Result<Vec<PiiSpan>> {
        let response = self.complete("pii", &pii_prompt(text)).await?;
        let fragment = first_json_array(&response)
            .ok_or_else(|| Error::model_failure("pii", "no JSON array found in response"))?;
        serde_json::from_str(fragment)
            .map_err(|e| Error::model_failure("pii", format!("response shape mismatch: {e}")))
    }
}

/// Voyage AI embeddings provider.
pub struct VoyageEmbeddings {
    config: ModelConfig,
    http: Client,
}

impl VoyageEmbeddings {
    const DEFAULT_BASE_URL: &'static str = "https://api.voyageai.com";
    const DEFAULT_MODEL: &'static str = "voyage-3";

    pub fn new(config: ModelConfig) -> Self {
        let http = build_http_client(config.timeout_secs);
        Self { config, http }
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(Self::DEFAULT_BASE_URL)
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingModel for VoyageEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: self
                .config
                .model
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
            input: vec![text.to_string()],
        };

        let url = format!("{}/v1/embeddings", self.base_url());
        let response = self
            .http
            .post(&url)
            .header("authorization", format!("Bearer {}", self.config.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport("embedding", e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify_transport("embedding", e))?;
        if !status.is_success() {
            return Err(classify_status("embedding", status, &body));
        }

        let parsed: EmbeddingResponse = serde_json::from_str(&body)
            .map_err(|e| Error::model_failure("embedding", format!("bad response: {e}")))?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Error::model_failure("embedding", "empty embedding response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttling_maps_to_throttled() {
        let err = classify_status("relevance", reqwest::StatusCode::TOO_MANY_REQUESTS, "slow");
        assert!(matches!(err, Error::Throttled { .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn server_errors_are_transient() {
        let err = classify_status(
            "relevance",
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            "boom",
        );
        assert!(err.is_transient());
    }

    #[test]
    fn client_errors_are_model_failures() {
        let err = classify_status("relevance", reqwest::StatusCode::BAD_REQUEST, "bad prompt");
        assert!(matches!(err, Error::ModelFailure { .. }));
        assert!(!err.is_transient());
    }
}
