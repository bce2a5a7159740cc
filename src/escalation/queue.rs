//! The escalator and the review-queue reads.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::article::{
    Article, ArticleState, AuditAction, AuditEntry, EscalationReason, EscalationRecord,
};
use crate::error::{Error, Result};
use crate::store::{EntityStore, RangeBound, ARTICLES_TABLE};

use super::notify::{escalation_notification, NotificationSink};
use super::priority::{PriorityFactors, PriorityScorer};

const MAX_ESCALATE_RETRIES: u32 = 3;

/// Moves articles into the review queue.
pub struct Escalator {
    store: Arc<dyn EntityStore>,
    sink: Arc<dyn NotificationSink>,
    reviewers: Vec<String>,
    scorer: PriorityScorer,
}

impl Escalator {
    pub fn new(
        store: Arc<dyn EntityStore>,
        sink: Arc<dyn NotificationSink>,
        reviewers: Vec<String>,
    ) -> Self {
        Self {
            store,
            sink,
            reviewers,
            scorer: PriorityScorer,
        }
    }

    /// Escalate an article into REVIEW.
    ///
    /// The state change and the escalation record land in one versioned
    /// conditional update; losing the race to a concurrent transition
    /// re-reads and retries, then surfaces `Conflict`. Re-escalating an
    /// article already in REVIEW returns its existing record.
    pub async fn escalate(
        &self,
        article_id: &str,
        reason: EscalationReason,
        violation_count: usize,
    ) -> Result<EscalationRecord> {
        for _ in 0..MAX_ESCALATE_RETRIES {
            let item = self
                .store
                .get(ARTICLES_TABLE, article_id, true)
                .await?
                .ok_or_else(|| Error::not_found("article", article_id))?;
            let mut article: Article = serde_json::from_value(item)?;

            if article.state == ArticleState::Review {
                if let Some(existing) = &article.escalation {
                    return Ok(existing.clone());
                }
            }
            if article.state != ArticleState::Processed {
                return Err(Error::invalid_transition(
                    article.state.as_str(),
                    "escalate",
                ));
            }

            let now = Utc::now();
            let factors = PriorityFactors {
                relevancy_score: article.relevancy_score.unwrap_or(0.0),
                keyword_match_count: article.keyword_matches.len(),
                total_entities: article.entities.total(),
                guardrail_violation_count: violation_count,
                published_at: article.published_at,
            };
            let priority_score = self.scorer.score(&factors, reason, now);

            let record = EscalationRecord {
                escalation_id: Uuid::new_v4().to_string(),
                reason,
                priority_score,
                escalated_at: now,
                context: format!(
                    "{} guardrail violation(s), relevancy {:.2}, {} keyword match(es)",
                    violation_count,
                    factors.relevancy_score,
                    factors.keyword_match_count
                ),
            };

            let (prev_version, new_version) = article.bump_version();
            let prev_state = article.state;
            article.state = ArticleState::Review;
            article.escalation = Some(record.clone());
            article.priority_score = Some(priority_score);
            article.audit_trail.push(
                AuditEntry::new(
                    AuditAction::Escalation,
                    "system",
                    prev_state,
                    ArticleState::Review,
                    format!("escalated: {reason}"),
                    prev_version,
                    new_version,
                ),
            );

            match self
                .store
                .update(
                    ARTICLES_TABLE,
                    article_id,
                    serde_json::to_value(&article)?,
                    true,
                    Some(prev_version),
                )
                .await
            {
                Ok(()) => {
                    info!(article_id, %reason, priority_score, "article escalated");
                    self.notify(&article, reason, priority_score).await;
                    return Ok(record);
                }
                Err(Error::PreconditionFailed { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(Error::Conflict {
            key: article_id.to_string(),
            attempts: MAX_ESCALATE_RETRIES,
        })
    }

    /// Best-effort reviewer notification.
    async fn notify(&self, article: &Article, reason: EscalationReason, priority_score: f64) {
        let queue = ReviewQueue::new(self.store.clone());
        let position = match queue.position(priority_score).await {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "queue position unavailable");
                0
            }
        };
        let notification = escalation_notification(
            article,
            reason,
            priority_score,
            position,
            self.reviewers.clone(),
        );
        if let Err(e) = self.sink.send(notification).await {
            warn!(article_id = %article.article_id, error = %e, "escalation notification failed");
        }
    }
}

/// Read side of the review queue.
pub struct ReviewQueue {
    store: Arc<dyn EntityStore>,
}

impl ReviewQueue {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Articles currently in REVIEW, ordered by priority descending,
    /// then escalation time ascending (oldest first on ties).
    pub async fn list(&self, limit: usize) -> Result<Vec<Article>> {
        let mut articles = self.review_articles().await?;
        articles.sort_by(|a, b| {
            let pa = a.priority_score.unwrap_or(0.0);
            let pb = b.priority_score.unwrap_or(0.0);
            pb.partial_cmp(&pa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let ea = a.escalation.as_ref().map(|e| e.escalated_at);
                    let eb = b.escalation.as_ref().map(|e| e.escalated_at);
                    ea.cmp(&eb)
                })
        });
        articles.truncate(limit);
        Ok(articles)
    }

    /// Queue position estimate: the number of REVIEW articles with
    /// strictly greater priority.
    pub async fn position(&self, priority_score: f64) -> Result<usize> {
        Ok(self
            .review_articles()
            .await?
            .iter()
            .filter(|a| a.priority_score.unwrap_or(0.0) > priority_score)
            .count())
    }

    async fn review_articles(&self) -> Result<Vec<Article>> {
        let mut articles = Vec::new();
        let mut cursor = None;
        loop {
            let page = self
                .store
                .query_secondary(
                    ARTICLES_TABLE,
                    "state-published_at",
                    ArticleState::Review.as_str(),
                    RangeBound::Unbounded,
                    RangeBound::Unbounded,
                    Some(100),
                    cursor,
                )
                .await?;
            for item in page.items {
                articles.push(serde_json::from_value(item)?);
            }
            match page.cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::EntityExtraction;
    use crate::escalation::notify::Notification;
    use crate::store::SqliteEntityStore;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send(&self, notification: Notification) -> Result<()> {
            self.sent.lock().unwrap().push(notification);
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl NotificationSink for FailingSink {
        async fn send(&self, _notification: Notification) -> Result<()> {
            Err(Error::Network("smtp down".into()))
        }
    }

    fn processed_article(id: &str, relevancy: f64) -> Article {
        Article {
            article_id: id.into(),
            feed_id: "feed-1".into(),
            url: format!("https://example.com/{id}"),
            canonical_url: format!("https://example.com/{id}"),
            title: format!("story {id}"),
            published_at: Utc::now() - Duration::hours(1),
            ingested_at: Utc::now(),
            content_hash: "h".into(),
            raw_blob_key: String::new(),
            normalized_blob_key: String::new(),
            state: ArticleState::Processed,
            cluster_id: Some(format!("cluster_{id}")),
            is_duplicate: false,
            duplicate_of: None,
            relevancy_score: Some(relevancy),
            keyword_matches: vec![],
            entities: EntityExtraction::default(),
            guardrail_flags: vec![],
            triage_action: None,
            priority_score: None,
            confidence: Some(0.9),
            summary_short: None,
            tags: vec![],
            escalation: None,
            audit_trail: vec![],
            version: 1,
        }
    }

    async fn seed(store: &SqliteEntityStore, article: &Article) {
        store
            .put(
                ARTICLES_TABLE,
                &article.article_id,
                serde_json::to_value(article).unwrap(),
                true,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn escalation_transitions_and_records() {
        let store = Arc::new(SqliteEntityStore::in_memory().unwrap());
        let sink = Arc::new(RecordingSink::default());
        let escalator = Escalator::new(
            store.clone(),
            sink.clone(),
            vec!["analyst@example.com".into()],
        );
        seed(&store, &processed_article("a-1", 0.95)).await;

        let record = escalator
            .escalate("a-1", EscalationReason::GuardrailViolation, 1)
            .await
            .unwrap();
        assert_eq!(record.reason, EscalationReason::GuardrailViolation);
        assert!(record.priority_score > 0.0);

        let stored: Article = serde_json::from_value(
            store.get(ARTICLES_TABLE, "a-1", true).await.unwrap().unwrap(),
        )
        .unwrap();
        assert_eq!(stored.state, ArticleState::Review);
        assert_eq!(stored.version, 2);
        assert_eq!(stored.audit_trail.len(), 1);
        assert_eq!(stored.audit_trail[0].action, AuditAction::Escalation);
        assert_eq!(stored.audit_trail[0].prev_version, 1);
        assert_eq!(stored.audit_trail[0].new_version, 2);

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].subject.contains("Review Required"));
    }

    #[tokio::test]
    async fn guardrail_reason_applies_multiplier() {
        let store = Arc::new(SqliteEntityStore::in_memory().unwrap());
        let escalator = Escalator::new(store.clone(), Arc::new(RecordingSink::default()), vec![]);

        seed(&store, &processed_article("a-base", 0.9)).await;
        seed(&store, &processed_article("a-guard", 0.9)).await;

        let base = escalator
            .escalate("a-base", EscalationReason::ManualReviewRequested, 1)
            .await
            .unwrap();
        let boosted = escalator
            .escalate("a-guard", EscalationReason::GuardrailViolation, 1)
            .await
            .unwrap();
        assert!(
            boosted.priority_score > base.priority_score,
            "1.5x multiplier should raise priority"
        );
    }

    #[tokio::test]
    async fn notification_failure_does_not_fail_escalation() {
        let store = Arc::new(SqliteEntityStore::in_memory().unwrap());
        let escalator = Escalator::new(store.clone(), Arc::new(FailingSink), vec![]);
        seed(&store, &processed_article("a-1", 0.8)).await;

        let record = escalator
            .escalate("a-1", EscalationReason::MediumRelevancy, 0)
            .await;
        assert!(record.is_ok());
    }

    #[tokio::test]
    async fn escalating_reviewed_article_is_idempotent() {
        let store = Arc::new(SqliteEntityStore::in_memory().unwrap());
        let escalator = Escalator::new(store.clone(), Arc::new(RecordingSink::default()), vec![]);
        seed(&store, &processed_article("a-1", 0.8)).await;

        let first = escalator
            .escalate("a-1", EscalationReason::MediumRelevancy, 0)
            .await
            .unwrap();
        let second = escalator
            .escalate("a-1", EscalationReason::GuardrailViolation, 2)
            .await
            .unwrap();
        assert_eq!(first.escalation_id, second.escalation_id);
    }

    #[tokio::test]
    async fn escalating_archived_article_is_invalid() {
        let store = Arc::new(SqliteEntityStore::in_memory().unwrap());
        let escalator = Escalator::new(store.clone(), Arc::new(RecordingSink::default()), vec![]);
        let mut article = processed_article("a-1", 0.8);
        article.state = ArticleState::Archived;
        seed(&store, &article).await;

        let err = escalator
            .escalate("a-1", EscalationReason::MediumRelevancy, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn queue_orders_by_priority_then_age() {
        let store = Arc::new(SqliteEntityStore::in_memory().unwrap());
        let queue = ReviewQueue::new(store.clone());

        let now = Utc::now();
        for (id, priority, minutes_ago) in
            [("a-low", 0.3, 5), ("a-high", 0.9, 5), ("a-mid-old", 0.6, 60), ("a-mid-new", 0.6, 5)]
        {
            let mut article = processed_article(id, 0.9);
            article.state = ArticleState::Review;
            article.priority_score = Some(priority);
            article.escalation = Some(EscalationRecord {
                escalation_id: id.into(),
                reason: EscalationReason::MediumRelevancy,
                priority_score: priority,
                escalated_at: now - Duration::minutes(minutes_ago),
                context: String::new(),
            });
            seed(&store, &article).await;
        }

        let listed = queue.list(10).await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|a| a.article_id.as_str()).collect();
        assert_eq!(ids, ["a-high", "a-mid-old", "a-mid-new", "a-low"]);

        assert_eq!(queue.position(0.95).await.unwrap(), 0);
        assert_eq!(queue.position(0.6).await.unwrap(), 1);
        assert_eq!(queue.position(0.1).await.unwrap(), 4);
    }
}
