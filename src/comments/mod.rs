//! Threaded commentary on articles.
//!
//! Comments form trees up to depth 10; every reply shares the root
//! comment's `thread_id`. Content moderation runs at creation time and
//! demotes flagged comments to `moderated` visibility. Comments hold a
//! weak reference to their article: deleting an article leaves orphans,
//! which the maintenance scan reports rather than deletes.

mod moderation;
mod thread;

pub use moderation::{validate_content, ContentValidation};
pub use thread::{build_tree, flatten_tree, thread_stats, CommentNode, ThreadStats};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::{EntityStore, RangeBound, ARTICLES_TABLE, COMMENTS_TABLE};

/// Maximum reply nesting.
pub const MAX_COMMENT_DEPTH: u32 = 10;

/// Comment visibility states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Moderated,
    Deleted,
}

/// One comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub comment_id: String,
    pub article_id: String,
    /// Root comment id shared by the whole sub-tree.
    pub thread_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_comment_id: Option<String>,
    pub author: String,
    pub content: String,
    pub depth: u32,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
    pub reply_count: u32,
    pub version: u64,
}

/// Store-backed comment operations.
pub struct CommentStore {
    store: Arc<dyn EntityStore>,
}

impl CommentStore {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Create a comment, threading it under `parent_comment_id` when
    /// given. Flagged content is created with `moderated` visibility
    /// instead of being rejected.
    pub async fn create(
        &self,
        article_id: &str,
        author: &str,
        content: &str,
        parent_comment_id: Option<&str>,
    ) -> Result<Comment> {
        let validation = validate_content(content)?;

        if self
            .store
            .get(ARTICLES_TABLE, article_id, false)
            .await?
            .is_none()
        {
            return Err(Error::not_found("article", article_id));
        }

        let comment_id = Uuid::new_v4().to_string();
        let (thread_id, depth) = match parent_comment_id {
            None => (comment_id.clone(), 0),
            Some(parent_id) => {
                let parent = self.get(parent_id).await?;
                if parent.article_id != article_id {
                    return Err(Error::Validation(format!(
                        "parent comment {parent_id} belongs to another article"
                    )));
                }
                let depth = parent.depth + 1;
                if depth > MAX_COMMENT_DEPTH {
                    return Err(Error::Validation(format!(
                        "reply depth {depth} exceeds maximum {MAX_COMMENT_DEPTH}"
                    )));
                }
                (parent.thread_id.clone(), depth)
            }
        };

        let comment = Comment {
            comment_id: comment_id.clone(),
            article_id: article_id.to_string(),
            thread_id,
            parent_comment_id: parent_comment_id.map(str::to_string),
            author: author.to_string(),
            content: content.to_string(),
            depth,
            visibility: if validation.auto_moderate {
                Visibility::Moderated
            } else {
                Visibility::Public
            },
            created_at: Utc::now(),
            reply_count: 0,
            version: 1,
        };

        self.store
            .put(
                COMMENTS_TABLE,
                &comment_id,
                serde_json::to_value(&comment)?,
                true,
            )
            .await?;

        if let Some(parent_id) = parent_comment_id {
            self.bump_reply_count(parent_id).await?;
        }

        info!(
            comment_id = %comment.comment_id,
            article_id,
            moderated = validation.auto_moderate,
            "comment created"
        );
        Ok(comment)
    }

    pub async fn get(&self, comment_id: &str) -> Result<Comment> {
        let item = self
            .store
            .get(COMMENTS_TABLE, comment_id, true)
            .await?
            .ok_or_else(|| Error::not_found("comment", comment_id))?;
        Ok(serde_json::from_value(item)?)
    }

    /// All comments on an article, newest first.
    pub async fn list_for_article(&self, article_id: &str) -> Result<Vec<Comment>> {
        let mut comments = Vec::new();
        let mut cursor = None;
        loop {
            let page = self
                .store
                .query_secondary(
                    COMMENTS_TABLE,
                    "article_id-created_at",
                    article_id,
                    RangeBound::Unbounded,
                    RangeBound::Unbounded,
                    Some(100),
                    cursor,
                )
                .await?;
            for item in page.items {
                comments.push(serde_json::from_value(item)?);
            }
            match page.cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(comments)
    }

    /// Moderation control: change a comment's visibility.
    pub async fn set_visibility(&self, comment_id: &str, visibility: Visibility) -> Result<Comment> {
        let mut comment = self.get(comment_id).await?;
        let expected = comment.version;
        comment.visibility = visibility;
        comment.version += 1;
        self.store
            .update(
                COMMENTS_TABLE,
                comment_id,
                serde_json::to_value(&comment)?,
                true,
                Some(expected),
            )
            .await?;
        Ok(comment)
    }

    /// The comment tree for an article (visible structure, all
    /// visibilities included; presentation filters are the caller's).
    pub async fn tree(&self, article_id: &str) -> Result<Vec<CommentNode>> {
        Ok(build_tree(self.list_for_article(article_id).await?))
    }

    /// Aggregate statistics for an article's thread.
    pub async fn stats(&self, article_id: &str) -> Result<ThreadStats> {
        Ok(thread_stats(&self.list_for_article(article_id).await?))
    }

    /// Maintenance scan: comments on `article_id` whose article no
    /// longer exists. Orphans are reported, never deleted.
    pub async fn orphaned_comments(&self, article_id: &str) -> Result<Vec<Comment>> {
        if self
            .store
            .get(ARTICLES_TABLE, article_id, false)
            .await?
            .is_some()
        {
            return Ok(Vec::new());
        }
        self.list_for_article(article_id).await
    }

    async fn bump_reply_count(&self, comment_id: &str) -> Result<()> {
        // Tolerate one concurrent-reply race by re-reading once.
        for _ in 0..2 {
            let mut parent = self.get(comment_id).await?;
            let expected = parent.version;
            parent.reply_count += 1;
            parent.version += 1;
            match self
                .store
                .update(
                    COMMENTS_TABLE,
                    comment_id,
                    serde_json::to_value(&parent)?,
                    true,
                    Some(expected),
                )
                .await
            {
                Ok(()) => return Ok(()),
                Err(Error::PreconditionFailed { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(Error::Conflict {
            key: comment_id.to_string(),
            attempts: 2,
        })
    }
}
