//! Keyword and feed registry.
//!
//! Loads the two declarative YAML configurations (feeds and keywords),
//! validates them, builds lookup indexes, and exposes the keyword matcher
//! used by the relevance evaluator:
//!
//! - **Exact matching**: word-boundary, case-insensitive (both configurable)
//! - **Fuzzy matching**: Levenshtein distance with a per-phrase budget
//! - **Ranking**: confidence × weight, descending; exact beats fuzzy

mod loader;
mod matcher;
mod types;

pub use loader::{FeedRegistry, KeywordRegistry};
pub use matcher::KeywordMatcher;
pub use types::{
    FeedConfig, FeedSettings, FeedsConfig, KeywordConfig, KeywordsConfig, MatchSettings,
    KEYWORD_CATEGORIES,
};
