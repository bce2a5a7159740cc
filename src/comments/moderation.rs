//! Comment content validation and auto-moderation rules.

use crate::error::{Error, Result};

pub const MAX_COMMENT_LENGTH: usize = 5000;

const BANNED_WORDS: &[&str] = &["spam", "scam"];

/// Validation outcome for comment content.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentValidation {
    /// Moderation flags raised, e.g. `banned_word_spam`, `potential_xss`.
    pub flags: Vec<String>,
    /// Whether the comment should be created as `moderated`.
    pub auto_moderate: bool,
}

/// Validate comment content.
///
/// Hard failures (blank, oversized) are errors; soft findings become
/// flags that demote visibility instead of rejecting the comment.
pub fn validate_content(content: &str) -> Result<ContentValidation> {
    if content.trim().is_empty() {
        return Err(Error::Validation("comment content is empty".into()));
    }
    if content.len() > MAX_COMMENT_LENGTH {
        return Err(Error::Validation(format!(
            "comment exceeds {MAX_COMMENT_LENGTH} characters"
        )));
    }

    let lowered = content.to_lowercase();
    let mut flags = Vec::new();

    for word in BANNED_WORDS {
        if lowered.contains(word) {
            flags.push(format!("banned_word_{word}"));
        }
    }
    if lowered.contains("<script") || lowered.contains("javascript:") {
        flags.push("potential_xss".to_string());
    }

    let auto_moderate = !flags.is_empty();
    Ok(ContentValidation {
        flags,
        auto_moderate,
    })
}
