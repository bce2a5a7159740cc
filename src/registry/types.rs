//! Configuration shapes for the feed and keyword registries.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The seven keyword categories recognized in the keywords document.
pub const KEYWORD_CATEGORIES: [&str; 7] = [
    "cloud_platforms",
    "security_vendors",
    "enterprise_tools",
    "enterprise_systems",
    "network_infrastructure",
    "virtualization",
    "specialized_platforms",
];

/// One RSS/Atom feed entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
    pub category: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Polling cadence; must match `\d+[smhd]`.
    #[serde(default = "default_fetch_interval")]
    pub fetch_interval: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_enabled() -> bool {
    true
}

fn default_fetch_interval() -> String {
    "2h".to_string()
}

/// Top-level shape of the feeds document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedsConfig {
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub settings: FeedSettings,
}

/// Settings block of the feeds document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSettings {
    #[serde(default = "default_fetch_interval")]
    pub default_fetch_interval: String,
    #[serde(default = "default_max_articles")]
    pub max_articles_per_fetch: u32,
}

fn default_max_articles() -> u32 {
    50
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            default_fetch_interval: default_fetch_interval(),
            max_articles_per_fetch: default_max_articles(),
        }
    }
}

/// One target term with its variations and weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordConfig {
    pub keyword: String,
    #[serde(default)]
    pub variations: Vec<String>,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_weight() -> f64 {
    1.0
}

/// Matching behavior knobs from the keywords document settings block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSettings {
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default = "default_true")]
    pub word_boundary_matching: bool,
    #[serde(default = "default_true")]
    pub enable_fuzzy_matching: bool,
    #[serde(default = "default_max_edit_distance")]
    pub max_edit_distance: usize,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Approximate word count of each context window.
    #[serde(default = "default_context_window")]
    pub context_window: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_edit_distance() -> usize {
    2
}

fn default_min_confidence() -> f64 {
    0.7
}

fn default_context_window() -> usize {
    10
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            word_boundary_matching: true,
            enable_fuzzy_matching: true,
            max_edit_distance: default_max_edit_distance(),
            min_confidence: default_min_confidence(),
            context_window: default_context_window(),
        }
    }
}

/// Top-level shape of the keywords document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywordsConfig {
    #[serde(default)]
    pub cloud_platforms: Vec<KeywordConfig>,
    #[serde(default)]
    pub security_vendors: Vec<KeywordConfig>,
    #[serde(default)]
    pub enterprise_tools: Vec<KeywordConfig>,
    #[serde(default)]
    pub enterprise_systems: Vec<KeywordConfig>,
    #[serde(default)]
    pub network_infrastructure: Vec<KeywordConfig>,
    #[serde(default)]
    pub virtualization: Vec<KeywordConfig>,
    #[serde(default)]
    pub specialized_platforms: Vec<KeywordConfig>,
    #[serde(default)]
    pub settings: MatchSettings,
    /// Priority tiers: `critical`, `high`, `medium`, `low` → primary terms.
    #[serde(default)]
    pub categories: HashMap<String, Vec<String>>,
}

impl KeywordsConfig {
    /// Iterate `(category_name, keywords)` in declaration order.
    pub fn by_category(&self) -> impl Iterator<Item = (&'static str, &[KeywordConfig])> {
        [
            ("cloud_platforms", self.cloud_platforms.as_slice()),
            ("security_vendors", self.security_vendors.as_slice()),
            ("enterprise_tools", self.enterprise_tools.as_slice()),
            ("enterprise_systems", self.enterprise_systems.as_slice()),
            (
                "network_infrastructure",
                self.network_infrastructure.as_slice(),
            ),
            ("virtualization", self.virtualization.as_slice()),
            ("specialized_platforms", self.specialized_platforms.as_slice()),
        ]
        .into_iter()
    }
}
