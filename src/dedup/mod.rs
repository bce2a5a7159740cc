//! Two-stage deduplication engine.
//!
//! The heuristic stage compares fingerprints against articles published
//! within a 72-hour sliding window and short-circuits on the first hit.
//! Only when it finds nothing does the semantic stage embed the article
//! and query the vector index; any semantic failure falls back to the
//! heuristic non-duplicate verdict and records a warning, so the dedup
//! engine never blocks the pipeline.

mod cluster;
mod fingerprint;
mod heuristic;
mod semantic;

pub use cluster::ClusterManager;
pub use fingerprint::{
    normalize_title, normalize_url_path, registered_domain, sequence_ratio, ArticleFingerprint,
};
pub use heuristic::HeuristicDeduplicator;
pub use semantic::SemanticDeduplicator;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::article::ArticleState;
use crate::error::Result;
use crate::store::{EntityStore, RangeBound, ARTICLES_TABLE};

/// How a duplicate verdict was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupMethod {
    ExactUrlMatch,
    CanonicalUrlMatch,
    TitleSimilarity,
    UrlPatternSimilarity,
    SemanticSimilarity,
    /// No duplicate found; the article is canonical for a new cluster.
    Unique,
}

impl DedupMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExactUrlMatch => "exact_url_match",
            Self::CanonicalUrlMatch => "canonical_url_match",
            Self::TitleSimilarity => "title_similarity",
            Self::UrlPatternSimilarity => "url_pattern_similarity",
            Self::SemanticSimilarity => "semantic_similarity",
            Self::Unique => "unique",
        }
    }
}

/// Raw hit from the heuristic stage.
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicMatch {
    pub duplicate_of: String,
    pub similarity: f64,
    pub method: DedupMethod,
}

/// Final dedup verdict with cluster assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicationResult {
    pub is_duplicate: bool,
    pub cluster_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<String>,
    pub similarity_score: f64,
    pub method: DedupMethod,
    pub rationale: String,
}

/// The full dedup engine: heuristic stage, optional semantic stage,
/// cluster assignment, and embedding write-back.
pub struct DedupEngine {
    store: Arc<dyn EntityStore>,
    heuristic: HeuristicDeduplicator,
    semantic: Option<SemanticDeduplicator>,
    cluster: ClusterManager,
}

impl DedupEngine {
    pub fn new(store: Arc<dyn EntityStore>, semantic: Option<SemanticDeduplicator>) -> Self {
        Self {
            heuristic: HeuristicDeduplicator::default(),
            cluster: ClusterManager::new(store.clone()),
            semantic,
            store,
        }
    }

    /// Run both stages and assign a cluster.
    pub async fn evaluate(
        &self,
        fingerprint: &ArticleFingerprint,
        content: &str,
    ) -> Result<DuplicationResult> {
        let existing = self.recent_fingerprints(fingerprint).await?;

        if let Some(hit) = self.heuristic.find_duplicate(fingerprint, &existing) {
            let cluster_id = self.cluster.cluster_for_duplicate(&hit.duplicate_of).await?;
            return Ok(DuplicationResult {
                is_duplicate: true,
                cluster_id,
                duplicate_of: Some(hit.duplicate_of),
                similarity_score: hit.similarity,
                rationale: format!(
                    "heuristic match ({}) at similarity {:.3}",
                    hit.method.as_str(),
                    hit.similarity
                ),
                method: hit.method,
            });
        }

        if let Some(semantic) = &self.semantic {
            match semantic
                .find_duplicate(
                    &fingerprint.article_id,
                    // The fingerprint title is normalized; embeddings do
                    // fine on it, and it keeps the stages consistent.
                    &fingerprint.normalized_title,
                    content,
                )
                .await
            {
                Ok(Some((duplicate_of, similarity))) => {
                    let cluster_id = self.cluster.cluster_for_duplicate(&duplicate_of).await?;
                    return Ok(DuplicationResult {
                        is_duplicate: true,
                        cluster_id,
                        duplicate_of: Some(duplicate_of),
                        similarity_score: similarity as f64,
                        method: DedupMethod::SemanticSimilarity,
                        rationale: format!(
                            "semantic similarity {similarity:.3} above threshold"
                        ),
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        article_id = %fingerprint.article_id,
                        error = %e,
                        "semantic dedup unavailable, keeping heuristic verdict"
                    );
                }
            }
        }

        // Non-duplicate: the article seeds its own cluster and its
        // embedding becomes a future comparison target.
        let cluster_id = ClusterManager::canonical_cluster(&fingerprint.article_id);
        if let Some(semantic) = &self.semantic {
            if let Err(e) = semantic
                .store_embedding(
                    &fingerprint.article_id,
                    &fingerprint.normalized_title,
                    &fingerprint.url,
                    fingerprint.published_at,
                    content,
                )
                .await
            {
                warn!(
                    article_id = %fingerprint.article_id,
                    error = %e,
                    "failed to store embedding"
                );
            }
        }

        Ok(DuplicationResult {
            is_duplicate: false,
            cluster_id,
            duplicate_of: None,
            similarity_score: 0.0,
            method: DedupMethod::Unique,
            rationale: "no duplicate within window".to_string(),
        })
    }

    /// Fingerprints of stored articles inside the dedup window, gathered
    /// across all state partitions of the secondary index.
    async fn recent_fingerprints(
        &self,
        fingerprint: &ArticleFingerprint,
    ) -> Result<Vec<ArticleFingerprint>> {
        let cutoff = (fingerprint.published_at - chrono::Duration::hours(72)).to_rfc3339();
        let mut out = Vec::new();
        for state in [
            ArticleState::Ingested,
            ArticleState::Processed,
            ArticleState::Published,
            ArticleState::Review,
            ArticleState::Archived,
        ] {
            let mut cursor = None;
            loop {
                let page = self
                    .store
                    .query_secondary(
                        ARTICLES_TABLE,
                        "state-published_at",
                        state.as_str(),
                        RangeBound::Inclusive(cutoff.clone()),
                        RangeBound::Unbounded,
                        Some(100),
                        cursor,
                    )
                    .await?;
                out.extend(page.items.iter().filter_map(ArticleFingerprint::from_stored));
                match page.cursor {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }
        }
        Ok(out)
    }
}
