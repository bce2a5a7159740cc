//! Inbound contract with the external feed parser.
//!
//! The fetcher/extractor itself is out of scope; the pipeline consumes the
//! parsed articles it produces. Items lacking a title or url are omitted by
//! the parser and never reach this boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;

/// One parsed article as delivered by the feed parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedArticle {
    pub article_id: String,
    pub title: String,
    pub url: String,
    /// Fetched URL with tracking parameters removed.
    pub canonical_url: String,
    pub published_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Plain text extracted from the article HTML.
    pub normalized_content: String,
    /// Blob-store key where the raw HTML was written.
    pub raw_blob_ref: String,
    /// Blob-store key where the normalized text was written.
    pub normalized_blob_ref: String,
    /// Hex SHA-256 of `normalized_content`.
    pub content_hash: String,
    #[serde(default)]
    pub extracted_urls: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub feed_metadata: HashMap<String, String>,
}

/// Feed parser interface (inbound collaborator).
#[async_trait]
pub trait FeedParser: Send + Sync {
    /// Fetch and parse a feed, returning articles published after `since`
    /// (all available articles when `since` is `None`).
    async fn fetch(
        &self,
        feed_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ParsedArticle>>;
}
