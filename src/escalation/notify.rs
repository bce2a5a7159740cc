//! Reviewer notifications.

use async_trait::async_trait;
use tracing::info;

use crate::article::{Article, EscalationReason, Priority};
use crate::error::Result;

/// Outbound notification message.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub recipients: Vec<String>,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    pub tags: Vec<String>,
}

/// Notification sink (outbound collaborator). Fire-and-forget.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<()>;
}

/// Sink that records notifications in the log stream. Useful as a
/// default and in tests.
#[derive(Debug, Clone, Default)]
pub struct LoggingNotificationSink;

#[async_trait]
impl NotificationSink for LoggingNotificationSink {
    async fn send(&self, notification: Notification) -> Result<()> {
        info!(
            recipients = notification.recipients.len(),
            subject = %notification.subject,
            "notification sent"
        );
        Ok(())
    }
}

const SUBJECT_TITLE_LIMIT: usize = 60;

/// Build the escalation notification for an article.
pub fn escalation_notification(
    article: &Article,
    reason: EscalationReason,
    priority_score: f64,
    queue_position: usize,
    recipients: Vec<String>,
) -> Notification {
    let label = Priority::from_score(priority_score);
    let title: String = article.title.chars().take(SUBJECT_TITLE_LIMIT).collect();

    let subject = format!("[SENTINEL {label}] Review Required: {title}...");

    let text_body = format!(
        "An article requires human review.\n\n\
         Title: {}\n\
         Source: {}\n\
         URL: {}\n\
         Published: {}\n\n\
         Reason: {}\n\
         Priority: {label} ({priority_score:.2})\n\
         Queue position: {queue_position}\n\n\
         {}",
        article.title,
        article.feed_id,
        article.url,
        article.published_at.to_rfc3339(),
        reason,
        reason_context(reason),
    );

    let html_body = format!(
        "<html><body>\
         <h2>Review Required</h2>\
         <p><b>{}</b></p>\
         <p>Priority: <span class=\"priority\">{label}</span> ({priority_score:.2})</p>\
         <p>Reason: {}</p>\
         <p>Queue position: {queue_position}</p>\
         <p><a href=\"{}\">Open article</a></p>\
         </body></html>",
        article.title, reason, article.url,
    );

    Notification {
        recipients,
        subject,
        text_body,
        html_body,
        tags: vec![
            format!("priority:{label}"),
            format!("reason:{reason}"),
        ],
    }
}

/// Short reviewer-facing context per escalation reason.
fn reason_context(reason: EscalationReason) -> &'static str {
    match reason {
        EscalationReason::GuardrailViolation => {
            "One or more guardrail checks failed; review the flagged content before release."
        }
        EscalationReason::SensitiveContent => {
            "The content was flagged as sensitive; handle with care."
        }
        EscalationReason::PolicyViolation => "A policy rule was triggered.",
        EscalationReason::QualityConcern => "Content quality concerns were raised.",
        EscalationReason::ComplexEntities => {
            "The entity graph is unusually dense; verify the extraction."
        }
        EscalationReason::LowConfidence => "Automated confidence was low.",
        EscalationReason::PotentialFalsePositive => {
            "The relevance signal may be a false positive."
        }
        EscalationReason::MediumRelevancy => {
            "Relevance is in the medium band; a human call is needed."
        }
        EscalationReason::HighRelevancyNoKeywords => {
            "High model relevance without any watchlist keyword hits."
        }
        EscalationReason::ManualReviewRequested => "Manual review was requested.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::ArticleState;
    use chrono::Utc;

    fn article() -> Article {
        Article {
            article_id: "a-1".into(),
            feed_id: "feed-1".into(),
            url: "https://example.com/a".into(),
            canonical_url: "https://example.com/a".into(),
            title: "A very long headline that should be truncated in the subject line of the email"
                .into(),
            published_at: Utc::now(),
            ingested_at: Utc::now(),
            content_hash: String::new(),
            raw_blob_key: String::new(),
            normalized_blob_key: String::new(),
            state: ArticleState::Processed,
            cluster_id: None,
            is_duplicate: false,
            duplicate_of: None,
            relevancy_score: Some(0.9),
            keyword_matches: vec![],
            entities: Default::default(),
            guardrail_flags: vec![],
            triage_action: None,
            priority_score: None,
            confidence: None,
            summary_short: None,
            tags: vec![],
            escalation: None,
            audit_trail: vec![],
            version: 1,
        }
    }

    #[test]
    fn subject_carries_label_and_truncated_title() {
        let n = escalation_notification(
            &article(),
            EscalationReason::GuardrailViolation,
            0.85,
            2,
            vec!["analyst@example.com".into()],
        );
        assert!(n.subject.starts_with("[SENTINEL CRITICAL]"));
        assert!(n.subject.len() < 110);
        assert!(n.text_body.contains("guardrail_violation"));
        assert!(n.text_body.contains("Queue position: 2"));
        assert!(n.html_body.contains("CRITICAL"));
    }

    #[test]
    fn labels_follow_score_buckets() {
        let a = article();
        let critical =
            escalation_notification(&a, EscalationReason::LowConfidence, 0.81, 0, vec![]);
        let high = escalation_notification(&a, EscalationReason::LowConfidence, 0.65, 0, vec![]);
        let medium = escalation_notification(&a, EscalationReason::LowConfidence, 0.45, 0, vec![]);
        let low = escalation_notification(&a, EscalationReason::LowConfidence, 0.2, 0, vec![]);
        assert!(critical.subject.contains("CRITICAL"));
        assert!(high.subject.contains("HIGH"));
        assert!(medium.subject.contains("MEDIUM"));
        assert!(low.subject.contains("LOW"));
    }

    #[tokio::test]
    async fn logging_sink_accepts_everything() {
        let n = escalation_notification(
            &article(),
            EscalationReason::MediumRelevancy,
            0.5,
            0,
            vec![],
        );
        assert!(LoggingNotificationSink.send(n).await.is_ok());
    }
}
