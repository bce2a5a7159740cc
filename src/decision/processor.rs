//! The decision processor.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::article::{Article, ArticleState, AuditAction, AuditEntry, Decision};
use crate::error::{Error, Result};
use crate::store::{EntityStore, ARTICLES_TABLE};

use super::events::{DownstreamEvent, EventBus};
use super::state::allowed_transition;

const MAX_DECISION_RETRIES: u32 = 3;

/// Reviewer edits applied alongside an `edit` decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Modifications {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_short: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl Modifications {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.summary_short.is_none() && self.tags.is_none()
    }
}

/// One human decision to process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub article_id: String,
    pub decision: Decision,
    pub reviewer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifications: Option<Modifications>,
}

/// Result of a processed decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionOutcome {
    pub article_id: String,
    pub decision: Decision,
    pub decision_id: String,
    pub prev_state: ArticleState,
    pub new_state: ArticleState,
    pub new_version: u64,
}

/// Aggregate result of a decision batch.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<(String, Result<DecisionOutcome>)>,
}

/// Validates and applies human decisions with optimistic concurrency.
pub struct DecisionProcessor {
    store: Arc<dyn EntityStore>,
    bus: Arc<dyn EventBus>,
}

impl DecisionProcessor {
    pub fn new(store: Arc<dyn EntityStore>, bus: Arc<dyn EventBus>) -> Self {
        Self { store, bus }
    }

    /// Process one decision.
    ///
    /// The whole operation is a conditional update keyed on the article
    /// with a version precondition; losing the race re-reads and retries
    /// up to three times before surfacing `Conflict`. An invalid
    /// `(state, decision)` pair leaves the article untouched.
    pub async fn process(&self, request: DecisionRequest) -> Result<DecisionOutcome> {
        for _ in 0..MAX_DECISION_RETRIES {
            let item = self
                .store
                .get(ARTICLES_TABLE, &request.article_id, true)
                .await?
                .ok_or_else(|| Error::not_found("article", &request.article_id))?;
            let mut article: Article = serde_json::from_value(item)?;

            let prev_state = article.state;
            let new_state = allowed_transition(prev_state, request.decision)
                .ok_or_else(|| {
                    Error::invalid_transition(prev_state.as_str(), request.decision.as_str())
                })?;

            if let Some(mods) = &request.modifications {
                apply_modifications(&mut article, mods);
            }

            let decision_id = Uuid::new_v4().to_string();
            let (prev_version, new_version) = article.bump_version();
            article.state = new_state;
            article.audit_trail.push(
                AuditEntry::new(
                    AuditAction::HumanDecision,
                    request.reviewer.clone(),
                    prev_state,
                    new_state,
                    request.rationale.clone().unwrap_or_default(),
                    prev_version,
                    new_version,
                )
                .with_decision(request.decision),
            );

            match self
                .store
                .update(
                    ARTICLES_TABLE,
                    &request.article_id,
                    serde_json::to_value(&article)?,
                    true,
                    Some(prev_version),
                )
                .await
            {
                Ok(()) => {
                    info!(
                        article_id = %request.article_id,
                        decision = %request.decision,
                        %prev_state,
                        %new_state,
                        "decision applied"
                    );
                    self.emit(&request, &decision_id).await;
                    return Ok(DecisionOutcome {
                        article_id: request.article_id.clone(),
                        decision: request.decision,
                        decision_id,
                        prev_state,
                        new_state,
                        new_version,
                    });
                }
                Err(Error::PreconditionFailed { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(Error::Conflict {
            key: request.article_id.clone(),
            attempts: MAX_DECISION_RETRIES,
        })
    }

    /// Process a batch of decisions; individual failures do not abort
    /// the batch, and the outcome reports per-item results.
    pub async fn process_batch(&self, requests: Vec<DecisionRequest>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for request in requests {
            let article_id = request.article_id.clone();
            let result = self.process(request).await;
            match &result {
                Ok(_) => outcome.successful += 1,
                Err(_) => outcome.failed += 1,
            }
            outcome.results.push((article_id, result));
        }
        outcome
    }

    /// Best-effort event emission after a committed transition.
    async fn emit(&self, request: &DecisionRequest, decision_id: &str) {
        let event = match request.decision {
            Decision::Approve => DownstreamEvent::ArticleApproved {
                article_id: request.article_id.clone(),
                reviewer: request.reviewer.clone(),
                decision_id: decision_id.to_string(),
            },
            Decision::Reject => DownstreamEvent::ArticleRejected {
                article_id: request.article_id.clone(),
                reviewer: request.reviewer.clone(),
                decision_id: decision_id.to_string(),
            },
            Decision::Edit => DownstreamEvent::ArticleEditRequested {
                article_id: request.article_id.clone(),
                reviewer: request.reviewer.clone(),
                decision_id: decision_id.to_string(),
            },
            Decision::Escalate => DownstreamEvent::ArticleEscalated {
                article_id: request.article_id.clone(),
                reviewer: request.reviewer.clone(),
                decision_id: decision_id.to_string(),
            },
        };
        if let Err(e) = self.bus.emit(event).await {
            warn!(
                article_id = %request.article_id,
                error = %e,
                "event emission failed after transition"
            );
        }
    }
}

fn apply_modifications(article: &mut Article, mods: &Modifications) {
    if let Some(title) = &mods.title {
        article.title = title.clone();
    }
    if let Some(summary) = &mods.summary_short {
        article.summary_short = Some(summary.clone());
    }
    if let Some(tags) = &mods.tags {
        article.tags = tags.clone();
    }
}
