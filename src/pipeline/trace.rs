//! Structured per-article processing traces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// How a pipeline step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Ok,
    /// The step fell back to a degraded path (e.g. semantic dedup
    /// unavailable).
    Degraded,
    Failed,
}

/// One recorded step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepTrace {
    pub step: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcome: StepOutcome,
    pub detail: String,
}

/// The full trace of one article through the pipeline, persisted to the
/// blob store under `traces/{feed_id}/{article_id}.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingTrace {
    pub article_id: String,
    pub feed_id: String,
    pub steps: Vec<StepTrace>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProcessingTrace {
    pub fn new(article_id: impl Into<String>, feed_id: impl Into<String>) -> Self {
        Self {
            article_id: article_id.into(),
            feed_id: feed_id.into(),
            steps: Vec::new(),
            completed_at: None,
        }
    }

    /// Record a step that ran from `started` to now.
    pub fn record(
        &mut self,
        step: &str,
        started: Instant,
        started_at: DateTime<Utc>,
        outcome: StepOutcome,
        detail: impl Into<String>,
    ) {
        self.steps.push(StepTrace {
            step: step.to_string(),
            started_at,
            duration_ms: started.elapsed().as_millis() as u64,
            outcome,
            detail: detail.into(),
        });
    }

    pub fn finish(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    /// Blob-store key for this trace.
    pub fn blob_key(&self) -> String {
        format!("traces/{}/{}.json", self.feed_id, self.article_id)
    }
}
