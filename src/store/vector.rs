//! Vector index for the semantic dedup stage.
//!
//! One index keyed by `article_id`, storing the embedding with enough
//! metadata to report a duplicate without a second lookup. Writes are
//! idempotent by key. The SQLite implementation scans embeddings with a
//! cosine pass; corpus sizes here are bounded by the dedup window, so
//! brute force is adequate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};

use super::sqlite::SqliteEntityStore;

/// Metadata stored alongside an embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub article_id: String,
    pub embedding: Vec<f32>,
    pub title: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
}

/// One k-NN result.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub article_id: String,
    pub title: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    /// Cosine similarity in [-1, 1].
    pub similarity: f32,
}

/// Vector index abstraction.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or overwrite the record for an article.
    async fn upsert(&self, record: VectorRecord) -> Result<()>;

    /// The `k` nearest records by cosine similarity, excluding
    /// `exclude_article_id`, most similar first.
    async fn knn(
        &self,
        embedding: &[f32],
        k: usize,
        exclude_article_id: &str,
    ) -> Result<Vec<VectorHit>>;
}

/// Cosine similarity between two vectors; 0.0 for mismatched or empty input.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn decode_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Vector index sharing the entity store's SQLite database.
#[derive(Clone)]
pub struct SqliteVectorIndex {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteVectorIndex {
    pub fn attached_to(store: &SqliteEntityStore) -> Self {
        Self {
            conn: store.connection(),
        }
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| Error::Internal(format!("vector lock poisoned: {e}")))?;
        f(&conn)
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn upsert(&self, record: VectorRecord) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO vectors (article_id, embedding, title, url, published_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.article_id,
                    encode_embedding(&record.embedding),
                    record.title,
                    record.url,
                    record.published_at.to_rfc3339(),
                ],
            )
            .map_err(|e| Error::Storage(e.to_string()))?;
            Ok(())
        })
    }

    async fn knn(
        &self,
        embedding: &[f32],
        k: usize,
        exclude_article_id: &str,
    ) -> Result<Vec<VectorHit>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT article_id, embedding, title, url, published_at
                     FROM vectors WHERE article_id != ?1",
                )
                .map_err(|e| Error::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(params![exclude_article_id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                })
                .map_err(|e| Error::Storage(e.to_string()))?;

            let mut hits = Vec::new();
            for row in rows {
                let (article_id, blob, title, url, published_at) =
                    row.map_err(|e| Error::Storage(e.to_string()))?;
                let stored = decode_embedding(&blob);
                let similarity = cosine_similarity(embedding, &stored);
                let published_at = DateTime::parse_from_rfc3339(&published_at)
                    .map_err(|e| Error::Storage(format!("bad timestamp in vector row: {e}")))?
                    .with_timezone(&Utc);
                hits.push(VectorHit {
                    article_id,
                    title,
                    url,
                    published_at,
                    similarity,
                });
            }

            hits.sort_by(|a, b| {
                b.similarity
                    .partial_cmp(&a.similarity)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            hits.truncate(k);
            Ok(hits)
        })
    }
}
