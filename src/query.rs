//! Analyst query and report facade.
//!
//! A minimal projection over the entity store: state-scoped listings,
//! single-article reads with the audit trail, cluster membership, state
//! counts, and flat report rows (one per keyword match) for export by
//! the external report tooling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::article::{Article, ArticleState};
use crate::error::{Error, Result};
use crate::store::{EntityStore, RangeBound, ARTICLES_TABLE};

/// Compact article projection for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub article_id: String,
    pub title: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub state: ArticleState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevancy_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,
}

impl From<&Article> for ArticleSummary {
    fn from(article: &Article) -> Self {
        Self {
            article_id: article.article_id.clone(),
            title: article.title.clone(),
            url: article.url.clone(),
            published_at: article.published_at,
            state: article.state,
            relevancy_score: article.relevancy_score,
            cluster_id: article.cluster_id.clone(),
        }
    }
}

/// One flat report row; an article contributes one row per keyword
/// match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub article_id: String,
    pub title: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub keyword: String,
    pub hit_count: u32,
    pub description: String,
}

/// Filters for report projection.
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    /// States to include; empty means PUBLISHED only.
    pub states: Vec<ArticleState>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub min_relevancy: Option<f64>,
    /// Restrict to one primary term.
    pub keyword: Option<String>,
}

/// A page of summaries with a continuation cursor.
#[derive(Debug, Clone, Default)]
pub struct SummaryPage {
    pub items: Vec<ArticleSummary>,
    pub cursor: Option<String>,
}

/// Read-only facade over the article store.
pub struct QueryFacade {
    store: Arc<dyn EntityStore>,
}

impl QueryFacade {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// One article with its full audit trail.
    pub async fn get_article(&self, article_id: &str) -> Result<Article> {
        let item = self
            .store
            .get(ARTICLES_TABLE, article_id, false)
            .await?
            .ok_or_else(|| Error::not_found("article", article_id))?;
        Ok(serde_json::from_value(item)?)
    }

    /// Articles in one state, newest first, bounded by publication time.
    pub async fn list_by_state(
        &self,
        state: ArticleState,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: usize,
        cursor: Option<String>,
    ) -> Result<SummaryPage> {
        let lower = from
            .map(|t| RangeBound::Inclusive(t.to_rfc3339()))
            .unwrap_or(RangeBound::Unbounded);
        let upper = to
            .map(|t| RangeBound::Exclusive(t.to_rfc3339()))
            .unwrap_or(RangeBound::Unbounded);

        let page = self
            .store
            .query_secondary(
                ARTICLES_TABLE,
                "state-published_at",
                state.as_str(),
                lower,
                upper,
                Some(limit),
                cursor,
            )
            .await?;

        let mut items = Vec::with_capacity(page.items.len());
        for item in &page.items {
            let article: Article = serde_json::from_value(item.clone())?;
            items.push(ArticleSummary::from(&article));
        }
        Ok(SummaryPage {
            items,
            cursor: page.cursor,
        })
    }

    /// All members of a cluster, canonical included, newest first.
    pub async fn cluster_members(&self, cluster_id: &str) -> Result<Vec<ArticleSummary>> {
        let mut members = Vec::new();
        let mut cursor = None;
        loop {
            let page = self
                .store
                .query_secondary(
                    ARTICLES_TABLE,
                    "cluster_id-published_at",
                    cluster_id,
                    RangeBound::Unbounded,
                    RangeBound::Unbounded,
                    Some(100),
                    cursor,
                )
                .await?;
            for item in &page.items {
                let article: Article = serde_json::from_value(item.clone())?;
                members.push(ArticleSummary::from(&article));
            }
            match page.cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(members)
    }

    /// Article counts per state.
    pub async fn counts_by_state(&self) -> Result<HashMap<ArticleState, usize>> {
        let mut counts = HashMap::new();
        for state in [
            ArticleState::Ingested,
            ArticleState::Processed,
            ArticleState::Published,
            ArticleState::Review,
            ArticleState::Archived,
        ] {
            let mut total = 0;
            let mut cursor = None;
            loop {
                let page = self
                    .store
                    .query_secondary(
                        ARTICLES_TABLE,
                        "state-published_at",
                        state.as_str(),
                        RangeBound::Unbounded,
                        RangeBound::Unbounded,
                        Some(100),
                        cursor,
                    )
                    .await?;
                total += page.items.len();
                match page.cursor {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }
            counts.insert(state, total);
        }
        Ok(counts)
    }

    /// Flat report rows, one per (article, keyword match), newest first.
    pub async fn report(&self, filter: &ReportFilter) -> Result<Vec<ReportRow>> {
        let states = if filter.states.is_empty() {
            vec![ArticleState::Published]
        } else {
            filter.states.clone()
        };

        let mut rows = Vec::new();
        for state in states {
            let mut cursor = None;
            loop {
                let page = self
                    .store
                    .query_secondary(
                        ARTICLES_TABLE,
                        "state-published_at",
                        state.as_str(),
                        filter
                            .from
                            .map(|t| RangeBound::Inclusive(t.to_rfc3339()))
                            .unwrap_or(RangeBound::Unbounded),
                        filter
                            .to
                            .map(|t| RangeBound::Exclusive(t.to_rfc3339()))
                            .unwrap_or(RangeBound::Unbounded),
                        Some(100),
                        cursor,
                    )
                    .await?;
                for item in &page.items {
                    let article: Article = serde_json::from_value(item.clone())?;
                    if let Some(min) = filter.min_relevancy {
                        if article.relevancy_score.unwrap_or(0.0) < min {
                            continue;
                        }
                    }
                    for m in &article.keyword_matches {
                        if let Some(keyword) = &filter.keyword {
                            if !m.keyword.eq_ignore_ascii_case(keyword) {
                                continue;
                            }
                        }
                        rows.push(ReportRow {
                            article_id: article.article_id.clone(),
                            title: article.title.clone(),
                            url: article.url.clone(),
                            published_at: article.published_at,
                            keyword: m.keyword.clone(),
                            hit_count: m.hit_count,
                            description: article.summary_short.clone().unwrap_or_default(),
                        });
                    }
                }
                match page.cursor {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }
        }

        rows.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(rows)
    }
}
