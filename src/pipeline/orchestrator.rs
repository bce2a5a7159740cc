//! The per-feed orchestrator.

use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::article::{
    Article, ArticleState, AuditAction, AuditEntry, EscalationReason, TriageAction,
};
use crate::decision::{DownstreamEvent, EventBus};
use crate::dedup::{ArticleFingerprint, DedupEngine, DuplicationResult};
use crate::error::{Error, Result};
use crate::escalation::Escalator;
use crate::feed::{FeedParser, ParsedArticle};
use crate::guardrail::GuardrailValidator;
use crate::relevance::{RelevanceEvaluator, RelevanceResult};
use crate::store::{BlobStore, EntityStore, ARTICLES_TABLE};
use crate::triage;

use super::retry::{retry_transient, RetryConfig};
use super::trace::{ProcessingTrace, StepOutcome};

/// Orchestrator tuning knobs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Articles processed concurrently per feed.
    pub max_concurrent_articles: usize,
    /// Soft deadline per article; exceeding it fails that article only.
    pub per_article_timeout: Duration,
    /// When off, AUTO_PUBLISH decisions are demoted to REVIEW.
    pub enable_auto_publish: bool,
    pub retry: RetryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_articles: 5,
            per_article_timeout: Duration::from_secs(120),
            enable_auto_publish: true,
            retry: RetryConfig::default(),
        }
    }
}

/// Terminal outcome for one article in a feed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleOutcome {
    Published,
    Queued,
    Dropped,
    Duplicate,
    /// Already processed in an earlier run; nothing to do.
    Skipped,
}

/// Aggregate result of one feed run.
#[derive(Debug, Default)]
pub struct FeedRunSummary {
    pub feed_id: String,
    pub fetched: usize,
    pub published: usize,
    pub queued: usize,
    pub dropped: usize,
    pub duplicates: usize,
    pub skipped: usize,
    /// `(article_id, message)` for articles that failed.
    pub failures: Vec<(String, String)>,
}

/// Drives parsed articles through the triage pipeline.
pub struct Orchestrator {
    parser: Arc<dyn FeedParser>,
    store: Arc<dyn EntityStore>,
    blobs: Arc<dyn BlobStore>,
    dedup: DedupEngine,
    relevance: RelevanceEvaluator,
    guardrail: GuardrailValidator,
    escalator: Escalator,
    bus: Arc<dyn EventBus>,
    config: PipelineConfig,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        parser: Arc<dyn FeedParser>,
        store: Arc<dyn EntityStore>,
        blobs: Arc<dyn BlobStore>,
        dedup: DedupEngine,
        relevance: RelevanceEvaluator,
        guardrail: GuardrailValidator,
        escalator: Escalator,
        bus: Arc<dyn EventBus>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            parser,
            store,
            blobs,
            dedup,
            relevance,
            guardrail,
            escalator,
            bus,
            config,
        }
    }

    /// Fetch and process one feed. Failures stay per-article; the batch
    /// always completes.
    pub async fn process_feed(
        &self,
        feed_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<FeedRunSummary> {
        let articles = self.parser.fetch(feed_id, since).await?;
        info!(feed_id, fetched = articles.len(), "feed run started");

        let mut summary = FeedRunSummary {
            feed_id: feed_id.to_string(),
            fetched: articles.len(),
            ..Default::default()
        };

        let results: Vec<(String, Result<ArticleOutcome>)> = futures::stream::iter(
            articles.into_iter().map(|parsed| {
                let article_id = parsed.article_id.clone();
                async move {
                    let result = tokio::time::timeout(
                        self.config.per_article_timeout,
                        self.process_article(feed_id, parsed),
                    )
                    .await
                    .unwrap_or_else(|_| {
                        Err(Error::timeout(
                            self.config.per_article_timeout.as_millis() as u64
                        ))
                    });
                    (article_id, result)
                }
            }),
        )
        .buffer_unordered(self.config.max_concurrent_articles.max(1))
        .collect()
        .await;

        for (article_id, result) in results {
            match result {
                Ok(ArticleOutcome::Published) => summary.published += 1,
                Ok(ArticleOutcome::Queued) => summary.queued += 1,
                Ok(ArticleOutcome::Dropped) => summary.dropped += 1,
                Ok(ArticleOutcome::Duplicate) => summary.duplicates += 1,
                Ok(ArticleOutcome::Skipped) => summary.skipped += 1,
                Err(e) => {
                    warn!(feed_id, article_id = %article_id, error = %e, "article failed");
                    summary.failures.push((article_id, e.to_string()));
                }
            }
        }

        info!(
            feed_id,
            published = summary.published,
            queued = summary.queued,
            dropped = summary.dropped,
            duplicates = summary.duplicates,
            failed = summary.failures.len(),
            "feed run finished"
        );
        Ok(summary)
    }

    /// The per-article workflow. Steps are strictly sequential.
    async fn process_article(
        &self,
        feed_id: &str,
        parsed: ParsedArticle,
    ) -> Result<ArticleOutcome> {
        let mut trace = ProcessingTrace::new(&parsed.article_id, feed_id);

        // Ingest: create on first sight; re-runs of settled articles are
        // no-ops.
        let mut article = match self.ingest(feed_id, &parsed).await? {
            Some(article) => article,
            None => return Ok(ArticleOutcome::Skipped),
        };

        // 1. Relevance.
        let (started, started_at) = (Instant::now(), Utc::now());
        let relevance = self
            .relevance
            .evaluate(&parsed.title, &parsed.normalized_content)
            .await;
        let outcome = if relevance.rationale == "assessment unavailable" {
            StepOutcome::Degraded
        } else {
            StepOutcome::Ok
        };
        trace.record(
            "relevance",
            started,
            started_at,
            outcome,
            format!(
                "score {:.2}, {} match(es)",
                relevance.relevancy_score,
                relevance.keyword_matches.len()
            ),
        );
        apply_relevance(&mut article, &relevance);

        // 2. Dedup; a duplicate short-circuits to DROP.
        let (started, started_at) = (Instant::now(), Utc::now());
        let fingerprint = ArticleFingerprint::new(
            &parsed.article_id,
            &parsed.url,
            &parsed.canonical_url,
            &parsed.title,
            &parsed.content_hash,
            parsed.published_at,
        );
        let dedup_result = retry_transient(&self.config.retry, "dedup", || {
            self.dedup.evaluate(&fingerprint, &parsed.normalized_content)
        })
        .await?;
        trace.record(
            "dedup",
            started,
            started_at,
            StepOutcome::Ok,
            format!(
                "{} (similarity {:.3})",
                dedup_result.method.as_str(),
                dedup_result.similarity_score
            ),
        );

        if dedup_result.is_duplicate {
            apply_dedup(&mut article, &dedup_result);
            article.triage_action = Some(TriageAction::Drop);
            self.persist_terminal(&mut article, ArticleState::Archived, "duplicate")
                .await?;
            self.write_trace(&mut trace).await;
            return Ok(ArticleOutcome::Duplicate);
        }
        apply_dedup(&mut article, &dedup_result);

        // 3. Guardrail.
        let (started, started_at) = (Instant::now(), Utc::now());
        let payload = serde_json::to_value(&article)?;
        let guardrail = self
            .guardrail
            .validate(
                &payload,
                &parsed.title,
                &parsed.normalized_content,
                &relevance.entities.cves,
            )
            .await;
        trace.record(
            "guardrail",
            started,
            started_at,
            StepOutcome::Ok,
            format!(
                "{} ({} violation(s))",
                if guardrail.passed { "passed" } else { "failed" },
                guardrail.violations.len()
            ),
        );
        article.guardrail_flags = guardrail.flags.clone();

        // 4. Triage (pure).
        let (started, started_at) = (Instant::now(), Utc::now());
        let triage_result = triage::decide(&relevance, &guardrail);
        trace.record(
            "triage",
            started,
            started_at,
            StepOutcome::Ok,
            triage_result.action.to_string(),
        );
        article.triage_action = Some(triage_result.action);
        article.confidence = Some(triage_result.confidence);

        // 5. Persist + 6. dispatch.
        let outcome = match triage_result.action {
            TriageAction::Drop => {
                self.persist_terminal(&mut article, ArticleState::Archived, &triage_result.rationale)
                    .await?;
                ArticleOutcome::Dropped
            }
            TriageAction::AutoPublish if self.config.enable_auto_publish => {
                self.persist_processed(&mut article).await?;
                self.auto_publish(&mut article).await?;
                ArticleOutcome::Published
            }
            action => {
                self.persist_processed(&mut article).await?;
                let reason = if action == TriageAction::AutoPublish {
                    // Auto-publish disabled: demote to the queue.
                    EscalationReason::ManualReviewRequested
                } else {
                    triage_result
                        .escalation_reason
                        .unwrap_or(EscalationReason::ManualReviewRequested)
                };
                self.escalator
                    .escalate(&article.article_id, reason, guardrail.violations.len())
                    .await?;
                ArticleOutcome::Queued
            }
        };

        self.write_trace(&mut trace).await;
        Ok(outcome)
    }

    /// Create the article on first sight. Returns `None` when the
    /// article has already moved past INGESTED (idempotent re-run).
    async fn ingest(&self, feed_id: &str, parsed: &ParsedArticle) -> Result<Option<Article>> {
        if let Some(existing) = self
            .store
            .get(ARTICLES_TABLE, &parsed.article_id, true)
            .await?
        {
            let article: Article = serde_json::from_value(existing)?;
            if article.state != ArticleState::Ingested {
                return Ok(None);
            }
            return Ok(Some(article));
        }

        let article = article_from_parsed(feed_id, parsed);
        let item = serde_json::to_value(&article)?;
        match retry_transient(&self.config.retry, "ingest", || {
            self.store.put(ARTICLES_TABLE, &article.article_id, item.clone(), true)
        })
        .await
        {
            Ok(()) => Ok(Some(article)),
            // A concurrent worker created it first; let that worker own it.
            Err(Error::PreconditionFailed { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Persist processing outputs and move INGESTED → PROCESSED.
    async fn persist_processed(&self, article: &mut Article) -> Result<()> {
        let (prev_version, new_version) = article.bump_version();
        article.state = ArticleState::Processed;
        article.audit_trail.push(AuditEntry::new(
            AuditAction::PipelineTransition,
            "system",
            ArticleState::Ingested,
            ArticleState::Processed,
            "pipeline processing complete",
            prev_version,
            new_version,
        ));
        self.update_versioned(article, prev_version).await
    }

    /// Persist outputs and settle at ARCHIVED via PROCESSED, with both
    /// transitions on the audit trail.
    async fn persist_terminal(
        &self,
        article: &mut Article,
        terminal: ArticleState,
        rationale: &str,
    ) -> Result<()> {
        let stored_version = article.version;
        let (prev_version, mid_version) = article.bump_version();
        article.audit_trail.push(AuditEntry::new(
            AuditAction::PipelineTransition,
            "system",
            ArticleState::Ingested,
            ArticleState::Processed,
            "pipeline processing complete",
            prev_version,
            mid_version,
        ));
        let (mid_version, new_version) = article.bump_version();
        article.audit_trail.push(AuditEntry::new(
            AuditAction::PipelineTransition,
            "system",
            ArticleState::Processed,
            terminal,
            rationale,
            mid_version,
            new_version,
        ));
        article.state = terminal;
        self.update_versioned(article, stored_version).await
    }

    /// PROCESSED → PUBLISHED with a system audit entry and publication
    /// event.
    async fn auto_publish(&self, article: &mut Article) -> Result<()> {
        let (prev_version, new_version) = article.bump_version();
        article.state = ArticleState::Published;
        article.audit_trail.push(AuditEntry::new(
            AuditAction::AutoPublish,
            "system",
            ArticleState::Processed,
            ArticleState::Published,
            "auto-published by triage",
            prev_version,
            new_version,
        ));
        self.update_versioned(article, prev_version).await?;

        let event = DownstreamEvent::ArticlePublished {
            article_id: article.article_id.clone(),
            cluster_id: article.cluster_id.clone().unwrap_or_default(),
        };
        if let Err(e) = self.bus.emit(event).await {
            warn!(article_id = %article.article_id, error = %e, "publication event failed");
        }
        Ok(())
    }

    async fn update_versioned(&self, article: &Article, if_version: u64) -> Result<()> {
        let item = serde_json::to_value(article)?;
        retry_transient(&self.config.retry, "persist", || {
            self.store.update(
                ARTICLES_TABLE,
                &article.article_id,
                item.clone(),
                true,
                Some(if_version),
            )
        })
        .await
    }

    /// Best-effort trace persistence.
    async fn write_trace(&self, trace: &mut ProcessingTrace) {
        trace.finish();
        let key = trace.blob_key();
        let body = match serde_json::to_vec(trace) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "trace serialization failed");
                return;
            }
        };
        if let Err(e) = self
            .blobs
            .put("traces", &key, &body, "application/json")
            .await
        {
            warn!(key = %key, error = %e, "trace write failed");
        }
    }
}

fn article_from_parsed(feed_id: &str, parsed: &ParsedArticle) -> Article {
    Article {
        article_id: parsed.article_id.clone(),
        feed_id: feed_id.to_string(),
        url: parsed.url.clone(),
        canonical_url: parsed.canonical_url.clone(),
        title: parsed.title.clone(),
        published_at: parsed.published_at,
        ingested_at: Utc::now(),
        content_hash: parsed.content_hash.clone(),
        raw_blob_key: parsed.raw_blob_ref.clone(),
        normalized_blob_key: parsed.normalized_blob_ref.clone(),
        state: ArticleState::Ingested,
        cluster_id: None,
        is_duplicate: false,
        duplicate_of: None,
        relevancy_score: None,
        keyword_matches: vec![],
        entities: Default::default(),
        guardrail_flags: vec![],
        triage_action: None,
        priority_score: None,
        confidence: None,
        summary_short: None,
        tags: parsed.tags.clone(),
        escalation: None,
        audit_trail: vec![],
        version: 1,
    }
}

fn apply_relevance(article: &mut Article, relevance: &RelevanceResult) {
    article.relevancy_score = Some(relevance.relevancy_score);
    article.keyword_matches = relevance.keyword_matches.clone();
    article.entities = relevance.entities.clone();
    article.confidence = Some(relevance.confidence);
    if !relevance.rationale.is_empty() {
        article.summary_short = Some(relevance.rationale.clone());
    }
}

fn apply_dedup(article: &mut Article, result: &DuplicationResult) {
    article.cluster_id = Some(result.cluster_id.clone());
    article.is_duplicate = result.is_duplicate;
    article.duplicate_of = result.duplicate_of.clone();
}
