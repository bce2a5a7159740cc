//! Semantic duplicate detection via dense embeddings and the vector
//! index.

use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::models::EmbeddingModel;
use crate::store::{VectorIndex, VectorRecord};

const SEMANTIC_SIMILARITY_THRESHOLD: f32 = 0.85;
const KNN_K: usize = 10;
const EMBED_CONTENT_LIMIT: usize = 2000;

/// Embedding-based duplicate detector, consulted only when the heuristic
/// stage finds nothing.
pub struct SemanticDeduplicator {
    embedding: Arc<dyn EmbeddingModel>,
    index: Arc<dyn VectorIndex>,
    threshold: f32,
}

impl SemanticDeduplicator {
    pub fn new(embedding: Arc<dyn EmbeddingModel>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedding,
            index,
            threshold: SEMANTIC_SIMILARITY_THRESHOLD,
        }
    }

    /// Text fed to the embedding model: title plus the head of the content.
    fn embed_text(title: &str, content: &str) -> String {
        let mut end = content.len().min(EMBED_CONTENT_LIMIT);
        while !content.is_char_boundary(end) {
            end -= 1;
        }
        format!("{title}\n\n{}", &content[..end])
    }

    /// Look for a semantic duplicate of the article.
    ///
    /// Errors from the embedding backend or the index propagate; the
    /// engine treats them as a degradation signal, not a verdict.
    pub async fn find_duplicate(
        &self,
        article_id: &str,
        title: &str,
        content: &str,
    ) -> Result<Option<(String, f32)>> {
        let embedding = self
            .embedding
            .embed(&Self::embed_text(title, content))
            .await?;
        let hits = self.index.knn(&embedding, KNN_K, article_id).await?;

        match hits.first() {
            Some(top) if top.similarity >= self.threshold => {
                debug!(
                    article_id,
                    duplicate_of = %top.article_id,
                    similarity = top.similarity,
                    "semantic duplicate"
                );
                Ok(Some((top.article_id.clone(), top.similarity)))
            }
            _ => Ok(None),
        }
    }

    /// Write a non-duplicate article's embedding for future comparisons.
    pub async fn store_embedding(
        &self,
        article_id: &str,
        title: &str,
        url: &str,
        published_at: chrono::DateTime<chrono::Utc>,
        content: &str,
    ) -> Result<()> {
        let embedding = self
            .embedding
            .embed(&Self::embed_text(title, content))
            .await?;
        self.index
            .upsert(VectorRecord {
                article_id: article_id.to_string(),
                embedding,
                title: title.to_string(),
                url: url.to_string(),
                published_at,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::{SqliteEntityStore, SqliteVectorIndex};
    use async_trait::async_trait;
    use chrono::Utc;

    /// Embedding stub keyed on a marker word in the text.
    struct StubEmbedding;

    #[async_trait]
    impl EmbeddingModel for StubEmbedding {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains("alpha") {
                Ok(vec![1.0, 0.0, 0.0])
            } else if text.contains("near-alpha") {
                Ok(vec![0.95, 0.2, 0.0])
            } else {
                Ok(vec![0.0, 0.0, 1.0])
            }
        }
    }

    struct FailingEmbedding;

    #[async_trait]
    impl EmbeddingModel for FailingEmbedding {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(Error::model_failure("embedding", "backend down"))
        }
    }

    fn index() -> Arc<SqliteVectorIndex> {
        Arc::new(SqliteVectorIndex::attached_to(
            &SqliteEntityStore::in_memory().unwrap(),
        ))
    }

    #[tokio::test]
    async fn detects_similar_embedding_above_threshold() {
        let index = index();
        let dedup = SemanticDeduplicator::new(Arc::new(StubEmbedding), index.clone());

        dedup
            .store_embedding("a-1", "alpha story", "https://x.com/a", Utc::now(), "body")
            .await
            .unwrap();

        let hit = dedup
            .find_duplicate("a-2", "near-alpha follow-up", "body")
            .await
            .unwrap();
        let (duplicate_of, similarity) = hit.unwrap();
        assert_eq!(duplicate_of, "a-1");
        assert!(similarity >= 0.85);
    }

    #[tokio::test]
    async fn dissimilar_embedding_is_unique() {
        let index = index();
        let dedup = SemanticDeduplicator::new(Arc::new(StubEmbedding), index.clone());

        dedup
            .store_embedding("a-1", "alpha story", "https://x.com/a", Utc::now(), "body")
            .await
            .unwrap();

        let hit = dedup
            .find_duplicate("a-2", "unrelated topic", "body")
            .await
            .unwrap();
        assert!(hit.is_none());
    }

    #[tokio::test]
    async fn embedding_failure_propagates() {
        let dedup = SemanticDeduplicator::new(Arc::new(FailingEmbedding), index());
        let err = dedup.find_duplicate("a-1", "t", "c").await.unwrap_err();
        assert!(matches!(err, Error::ModelFailure { .. }));
    }

    #[test]
    fn embed_text_truncates_content() {
        let text = SemanticDeduplicator::embed_text("t", &"x".repeat(5000));
        assert!(text.len() <= 2000 + "t\n\n".len());
    }
}
