//! The article state machine.

use crate::article::{Article, ArticleState, Decision};
use crate::error::{Error, Result};

/// Target state for a `(state, decision)` pair, or `None` when the pair
/// is not allowed.
///
/// `edit` and `escalate` are true REVIEW→REVIEW transitions: they bump
/// the version and append an audit entry like any other decision.
pub fn allowed_transition(state: ArticleState, decision: Decision) -> Option<ArticleState> {
    use ArticleState::*;
    use Decision::*;

    match (state, decision) {
        (Review, Approve) => Some(Published),
        (Review, Reject) => Some(Archived),
        (Review, Edit) => Some(Review),
        (Review, Escalate) => Some(Review),
        (Published, Reject) => Some(Archived),
        _ => None,
    }
}

/// Whether a `prev → next` edge is in the allowed set, pipeline
/// transitions included. Used by audit-trail invariant checks.
pub fn is_valid_transition(prev: ArticleState, next: ArticleState) -> bool {
    use ArticleState::*;

    matches!(
        (prev, next),
        (Ingested, Processed)
            | (Processed, Published)
            | (Processed, Review)
            | (Processed, Archived)
            | (Review, Published)
            | (Review, Archived)
            | (Review, Review)
            | (Published, Archived)
    )
}

/// Reconciliation check over an article's audit trail: every recorded
/// edge must be in the allowed set, and versions must chain
/// (`prev_version` of entry *n* equals `new_version` of entry *n−1*)
/// and strictly increase.
pub fn verify_audit_chain(article: &Article) -> Result<()> {
    let mut previous: Option<&crate::article::AuditEntry> = None;
    for entry in &article.audit_trail {
        if !is_valid_transition(entry.prev_state, entry.new_state) {
            return Err(Error::Validation(format!(
                "audit {} records disallowed edge {} -> {}",
                entry.audit_id, entry.prev_state, entry.new_state
            )));
        }
        if entry.new_version <= entry.prev_version {
            return Err(Error::Validation(format!(
                "audit {} does not increase the version ({} -> {})",
                entry.audit_id, entry.prev_version, entry.new_version
            )));
        }
        if let Some(prev) = previous {
            if entry.prev_version != prev.new_version {
                return Err(Error::Validation(format!(
                    "audit {} breaks the version chain ({} != {})",
                    entry.audit_id, entry.prev_version, prev.new_version
                )));
            }
        }
        previous = Some(entry);
    }
    if let Some(last) = previous {
        if last.new_version != article.version {
            return Err(Error::Validation(format!(
                "article version {} does not match last audit version {}",
                article.version, last.new_version
            )));
        }
        if last.new_state != article.state {
            return Err(Error::Validation(format!(
                "article state {} does not match last audit state {}",
                article.state, last.new_state
            )));
        }
    }
    Ok(())
}
