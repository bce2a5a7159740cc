//! Downstream events emitted after state changes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

/// Event published on the logical event bus. Delivery is best-effort; a
/// failed emit is logged and never rolls back the transition it follows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DownstreamEvent {
    ArticleApproved {
        article_id: String,
        reviewer: String,
        decision_id: String,
    },
    ArticleRejected {
        article_id: String,
        reviewer: String,
        decision_id: String,
    },
    ArticleEditRequested {
        article_id: String,
        reviewer: String,
        decision_id: String,
    },
    ArticleEscalated {
        article_id: String,
        reviewer: String,
        decision_id: String,
    },
    /// Emitted by the pipeline on AUTO_PUBLISH; the external notifier
    /// consumes it.
    ArticlePublished {
        article_id: String,
        cluster_id: String,
    },
}

impl DownstreamEvent {
    pub fn article_id(&self) -> &str {
        match self {
            Self::ArticleApproved { article_id, .. }
            | Self::ArticleRejected { article_id, .. }
            | Self::ArticleEditRequested { article_id, .. }
            | Self::ArticleEscalated { article_id, .. }
            | Self::ArticlePublished { article_id, .. } => article_id,
        }
    }
}

/// Outbound event bus.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn emit(&self, event: DownstreamEvent) -> Result<()>;
}

/// Bus that records events in the log stream.
#[derive(Debug, Clone, Default)]
pub struct LoggingEventBus;

#[async_trait]
impl EventBus for LoggingEventBus {
    async fn emit(&self, event: DownstreamEvent) -> Result<()> {
        info!(article_id = event.article_id(), event = ?event, "event emitted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_kind_tag() {
        let event = DownstreamEvent::ArticleApproved {
            article_id: "a-1".into(),
            reviewer: "alex".into(),
            decision_id: "d-1".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "article_approved");
        assert_eq!(json["article_id"], "a-1");
    }

    #[tokio::test]
    async fn logging_bus_accepts_events() {
        let bus = LoggingEventBus;
        let result = bus
            .emit(DownstreamEvent::ArticlePublished {
                article_id: "a-1".into(),
                cluster_id: "cluster_a-1".into(),
            })
            .await;
        assert!(result.is_ok());
    }
}
