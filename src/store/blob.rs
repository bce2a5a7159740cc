//! Blob store for raw HTML, normalized text, traces, and report exports.
//!
//! Keys are hierarchical `{kind}/{feed_or_cluster}/{article_or_hash}.{ext}`.
//! The content-addressed helper derives the key from the body's SHA-256.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};

use super::sqlite::SqliteEntityStore;

/// One stored blob with its content type.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredBlob {
    pub content_type: String,
    pub body: Vec<u8>,
}

/// Blob store abstraction. Objects are encrypted at rest by the backend.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, bucket: &str, key: &str, body: &[u8], content_type: &str) -> Result<()>;

    async fn get(&self, bucket: &str, key: &str) -> Result<StoredBlob>;

    /// Content-addressed put: the key is `{prefix}/{sha256(body)}.{ext}`.
    /// Returns the derived key. Idempotent by construction.
    async fn put_hashed(
        &self,
        bucket: &str,
        prefix: &str,
        ext: &str,
        body: &[u8],
        content_type: &str,
    ) -> Result<String> {
        let digest = hex::encode(Sha256::digest(body));
        let key = format!("{prefix}/{digest}.{ext}");
        self.put(bucket, &key, body, content_type).await?;
        Ok(key)
    }
}

/// Blob store sharing the entity store's SQLite database.
#[derive(Clone)]
pub struct SqliteBlobStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBlobStore {
    /// Ride on an existing entity store's database.
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
            .map_err(|e| Error::Internal(format!("blob lock poisoned: {e}")))?;
        f(&conn)
    }
}

#[async_trait]
impl BlobStore for SqliteBlobStore {
    async fn put(&self, bucket: &str, key: &str, body: &[u8], content_type: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO blobs (bucket, k, content_type, body, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![bucket, key, content_type, body, Utc::now().to_rfc3339()],
            )
            .map_err(|e| Error::Storage(e.to_string()))?;
            Ok(())
        })
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<StoredBlob> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT content_type, body FROM blobs WHERE bucket = ?1 AND k = ?2",
                params![bucket, key],
                |row| {
                    Ok(StoredBlob {
                        content_type: row.get(0)?,
                        body: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(|e| Error::Storage(e.to_string()))?
            .ok_or_else(|| Error::not_found("blob", format!("{bucket}/{key}")))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob_store() -> SqliteBlobStore {
        SqliteBlobStore::attached_to(&SqliteEntityStore::in_memory().unwrap())
    }

    #[tokio::test]
    async fn put_get_round_trip() {
        let store = blob_store();
        store
            .put("content", "raw/feed-1/a-1.html", b"<html/>", "text/html")
            .await
            .unwrap();
        let blob = store.get("content", "raw/feed-1/a-1.html").await.unwrap();
        assert_eq!(blob.body, b"<html/>");
        assert_eq!(blob.content_type, "text/html");
    }

    #[tokio::test]
    async fn missing_blob_is_not_found() {
        let store = blob_store();
        let err = store.get("content", "nope").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn hashed_put_derives_stable_key() {
        let store = blob_store();
        let key1 = store
            .put_hashed("artifacts", "reports/weekly", "json", b"{}", "application/json")
            .await
            .unwrap();
        let key2 = store
            .put_hashed("artifacts", "reports/weekly", "json", b"{}", "application/json")
            .await
            .unwrap();
        assert_eq!(key1, key2);
        assert!(key1.starts_with("reports/weekly/"));
        assert!(key1.ends_with(".json"));
    }

    #[tokio::test]
    async fn buckets_are_isolated() {
        let store = blob_store();
        store.put("content", "k", b"a", "text/plain").await.unwrap();
        assert!(store.get("traces", "k").await.is_err());
    }
}
