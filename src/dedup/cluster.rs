//! Cluster identity assignment.
//!
//! A cluster is a derived relation named `cluster_<canonical_article_id>`;
//! there is no independent storage object. The first article processed
//! becomes canonical (first-writer-wins); later duplicates adopt its
//! cluster id.

use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::article::Article;
use crate::error::{Error, Result};
use crate::store::{EntityStore, ARTICLES_TABLE};

const MAX_ASSIGN_RETRIES: u32 = 3;

/// Assigns cluster ids after dedup has produced a verdict.
pub struct ClusterManager {
    store: Arc<dyn EntityStore>,
}

impl ClusterManager {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Cluster id for a non-duplicate article (it becomes canonical).
    pub fn canonical_cluster(article_id: &str) -> String {
        Article::cluster_id_for(article_id)
    }

    /// Resolve the cluster id for a duplicate of `canonical_id`.
    ///
    /// When the canonical article predates cluster assignment and has no
    /// `cluster_id` yet, it is created in place with a versioned
    /// conditional update; a concurrent writer winning that race is fine,
    /// we re-read and adopt whatever landed.
    pub async fn cluster_for_duplicate(&self, canonical_id: &str) -> Result<String> {
        for _ in 0..MAX_ASSIGN_RETRIES {
            let mut item = self
                .store
                .get(ARTICLES_TABLE, canonical_id, true)
                .await?
                .ok_or_else(|| Error::not_found("article", canonical_id))?;

            if let Some(existing) = item.get("cluster_id").and_then(Value::as_str) {
                return Ok(existing.to_string());
            }

            let cluster_id = Self::canonical_cluster(canonical_id);
            let version = item.get("version").and_then(Value::as_u64).unwrap_or(1);
            item["cluster_id"] = Value::String(cluster_id.clone());
            item["version"] = Value::from(version + 1);

            match self
                .store
                .update(ARTICLES_TABLE, canonical_id, item, true, Some(version))
                .await
            {
                Ok(()) => {
                    info!(canonical_id, %cluster_id, "created cluster in place");
                    return Ok(cluster_id);
                }
                Err(Error::PreconditionFailed { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(Error::Conflict {
            key: canonical_id.to_string(),
            attempts: MAX_ASSIGN_RETRIES,
        })
    }
}
