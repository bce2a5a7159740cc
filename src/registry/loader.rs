//! Loading, validation, and indexing of the registry documents.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{info, warn};

use crate::error::{Error, Result};

use super::types::{
    FeedConfig, FeedSettings, FeedsConfig, KeywordConfig, KeywordsConfig, MatchSettings,
    KEYWORD_CATEGORIES,
};

/// Pattern for `fetch_interval` values such as `30m` or `2h`.
static INTERVAL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[smhd]$").expect("Invalid regex"));

const FEED_DOC_KEYS: [&str; 3] = ["feeds", "categories", "settings"];

/// Validated feed registry.
#[derive(Debug, Clone)]
pub struct FeedRegistry {
    config: FeedsConfig,
    by_name: HashMap<String, usize>,
}

impl FeedRegistry {
    /// Parse and validate a feeds YAML document.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(raw)
            .map_err(|e| Error::ConfigInvalid(format!("invalid feeds YAML: {e}")))?;
        warn_unknown_keys(&value, &FEED_DOC_KEYS, "feeds");

        let config: FeedsConfig = serde_yaml::from_value(value)
            .map_err(|e| Error::ConfigInvalid(format!("feeds document: {e}")))?;
        Self::from_config(config)
    }

    /// Validate an already-deserialized configuration.
    pub fn from_config(config: FeedsConfig) -> Result<Self> {
        let mut by_name = HashMap::new();
        for (idx, feed) in config.feeds.iter().enumerate() {
            validate_feed(feed)?;
            if by_name.insert(feed.name.clone(), idx).is_some() {
                return Err(Error::ConfigInvalid(format!(
                    "duplicate feed name '{}'",
                    feed.name
                )));
            }
        }
        if !INTERVAL_PATTERN.is_match(&config.settings.default_fetch_interval) {
            return Err(Error::ConfigInvalid(format!(
                "malformed default_fetch_interval '{}'",
                config.settings.default_fetch_interval
            )));
        }

        info!(feeds = config.feeds.len(), "loaded feed registry");
        Ok(Self { config, by_name })
    }

    pub fn get(&self, name: &str) -> Option<&FeedConfig> {
        self.by_name.get(name).map(|&i| &self.config.feeds[i])
    }

    /// Enabled feeds in declaration order.
    pub fn enabled(&self) -> impl Iterator<Item = &FeedConfig> {
        self.config.feeds.iter().filter(|f| f.enabled)
    }

    pub fn all(&self) -> &[FeedConfig] {
        &self.config.feeds
    }

    pub fn settings(&self) -> &FeedSettings {
        &self.config.settings
    }
}

fn validate_feed(feed: &FeedConfig) -> Result<()> {
    let url = url::Url::parse(&feed.url)
        .map_err(|e| Error::ConfigInvalid(format!("feed '{}': bad url: {e}", feed.name)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(Error::ConfigInvalid(format!(
            "feed '{}': url scheme must be http or https, got '{}'",
            feed.name,
            url.scheme()
        )));
    }
    if !INTERVAL_PATTERN.is_match(&feed.fetch_interval) {
        return Err(Error::ConfigInvalid(format!(
            "feed '{}': malformed fetch_interval '{}'",
            feed.name, feed.fetch_interval
        )));
    }
    Ok(())
}

/// Validated keyword registry with primary-term and variation indexes.
#[derive(Debug, Clone)]
pub struct KeywordRegistry {
    config: KeywordsConfig,
    /// All keywords flattened, paired with their category name.
    keywords: Vec<(String, KeywordConfig)>,
    /// Lowercased primary term → index into `keywords`.
    primary_index: HashMap<String, usize>,
    /// Lowercased variation → index into `keywords`.
    variation_index: HashMap<String, usize>,
}

impl KeywordRegistry {
    /// Parse and validate a keywords YAML document.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(raw)
            .map_err(|e| Error::ConfigInvalid(format!("invalid keywords YAML: {e}")))?;
        let mut known: Vec<&str> = KEYWORD_CATEGORIES.to_vec();
        known.push("settings");
        known.push("categories");
        warn_unknown_keys(&value, &known, "keywords");

        let config: KeywordsConfig = serde_yaml::from_value(value)
            .map_err(|e| Error::ConfigInvalid(format!("keywords document: {e}")))?;
        Self::from_config(config)
    }

    /// Validate an already-deserialized configuration and build indexes.
    pub fn from_config(config: KeywordsConfig) -> Result<Self> {
        let mut keywords = Vec::new();
        let mut primary_index = HashMap::new();
        let mut variation_index = HashMap::new();

        for (category, entries) in config.by_category() {
            let mut seen_in_category: Vec<String> = Vec::new();
            for kw in entries {
                if kw.keyword.trim().is_empty() {
                    return Err(Error::ConfigInvalid(format!(
                        "category '{category}': empty keyword"
                    )));
                }
                if !(0.0..=1.0).contains(&kw.weight) {
                    return Err(Error::ConfigInvalid(format!(
                        "keyword '{}': weight {} outside [0, 1]",
                        kw.keyword, kw.weight
                    )));
                }
                let lowered = kw.keyword.to_lowercase();
                if seen_in_category.contains(&lowered) {
                    return Err(Error::ConfigInvalid(format!(
                        "category '{category}': duplicate keyword '{}'",
                        kw.keyword
                    )));
                }
                seen_in_category.push(lowered.clone());

                let idx = keywords.len();
                keywords.push((category.to_string(), kw.clone()));
                primary_index.entry(lowered).or_insert(idx);
                for variation in &kw.variations {
                    variation_index
                        .entry(variation.to_lowercase())
                        .or_insert(idx);
                }
            }
        }

        let total_variations: usize = keywords.iter().map(|(_, k)| k.variations.len()).sum();
        info!(
            keywords = keywords.len(),
            variations = total_variations,
            "loaded keyword registry"
        );

        Ok(Self {
            config,
            keywords,
            primary_index,
            variation_index,
        })
    }

    /// All keyword configurations, flattened across categories.
    pub fn all_keywords(&self) -> impl Iterator<Item = &KeywordConfig> {
        self.keywords.iter().map(|(_, k)| k)
    }

    /// Keywords belonging to one category.
    pub fn keywords_in(&self, category: &str) -> Vec<&KeywordConfig> {
        self.keywords
            .iter()
            .filter(|(c, _)| c == category)
            .map(|(_, k)| k)
            .collect()
    }

    /// Look up a configuration by primary term (case-insensitive).
    pub fn by_primary(&self, term: &str) -> Option<&KeywordConfig> {
        self.primary_index
            .get(&term.to_lowercase())
            .map(|&i| &self.keywords[i].1)
    }

    /// Look up a configuration by variation (case-insensitive).
    pub fn by_variation(&self, term: &str) -> Option<&KeywordConfig> {
        self.variation_index
            .get(&term.to_lowercase())
            .map(|&i| &self.keywords[i].1)
    }

    /// Category a keyword config belongs to, or `"unknown"`.
    pub fn category_of(&self, keyword: &str) -> &str {
        let lowered = keyword.to_lowercase();
        self.primary_index
            .get(&lowered)
            .map(|&i| self.keywords[i].0.as_str())
            .unwrap_or("unknown")
    }

    /// Primary terms listed under a priority tier (e.g. `"critical"`).
    pub fn tier(&self, tier: &str) -> &[String] {
        self.config
            .categories
            .get(tier)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn settings(&self) -> &MatchSettings {
        &self.config.settings
    }

    /// All primary terms, used as the relevance evaluator's projection.
    pub fn primary_terms(&self) -> Vec<String> {
        self.keywords.iter().map(|(_, k)| k.keyword.clone()).collect()
    }
}

fn warn_unknown_keys(value: &serde_yaml::Value, known: &[&str], doc: &str) {
    if let serde_yaml::Value::Mapping(map) = value {
        for key in map.keys() {
            if let serde_yaml::Value::String(name) = key {
                if !known.contains(&name.as_str()) {
                    warn!(document = doc, key = %name, "ignoring unrecognized top-level key");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FEEDS_YAML: &str = r#"
feeds:
  - name: cisa-advisories
    url: https://www.cisa.gov/cybersecurity-advisories/all.xml
    category: Advisories
    fetch_interval: 1h
  - name: vendor-blog
    url: https://example.com/feed.xml
    category: Vendor
    enabled: false
categories: [Advisories, Vendor]
settings:
  default_fetch_interval: 2h
  max_articles_per_fetch: 25
surprise_key: true
"#;

    const KEYWORDS_YAML: &str = r#"
cloud_platforms:
  - keyword: Azure
    variations: [Microsoft Azure, AzureAD]
    weight: 0.9
  - keyword: AWS
    variations: [Amazon Web Services]
    weight: 1.0
security_vendors:
  - keyword: CrowdStrike
    weight: 0.8
settings:
  case_sensitive: false
  enable_fuzzy_matching: true
  max_edit_distance: 2
  min_confidence: 0.7
categories:
  critical: [AWS]
  high: [Azure]
"#;

    #[test]
    fn loads_feeds_and_indexes() {
        let registry = FeedRegistry::from_yaml(FEEDS_YAML).unwrap();
        assert_eq!(registry.all().len(), 2);
        assert_eq!(registry.enabled().count(), 1);
        assert_eq!(
            registry.get("cisa-advisories").unwrap().fetch_interval,
            "1h"
        );
        assert_eq!(registry.settings().max_articles_per_fetch, 25);
    }

    #[test]
    fn rejects_non_http_url() {
        let yaml = r#"
feeds:
  - name: bad
    url: ftp://example.com/feed.xml
    category: News
"#;
        let err = FeedRegistry::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(_)), "{err}");
    }

    #[test]
    fn rejects_malformed_interval() {
        let yaml = r#"
feeds:
  - name: bad
    url: https://example.com/feed.xml
    category: News
    fetch_interval: 90x
"#;
        assert!(FeedRegistry::from_yaml(yaml).is_err());
    }

    #[test]
    fn loads_keywords_and_indexes() {
        let registry = KeywordRegistry::from_yaml(KEYWORDS_YAML).unwrap();
        assert_eq!(registry.all_keywords().count(), 3);
        assert_eq!(registry.by_primary("azure").unwrap().keyword, "Azure");
        assert_eq!(
            registry.by_variation("microsoft azure").unwrap().keyword,
            "Azure"
        );
        assert_eq!(registry.category_of("AWS"), "cloud_platforms");
        assert_eq!(registry.category_of("CrowdStrike"), "security_vendors");
        assert_eq!(registry.tier("critical").to_vec(), vec!["AWS".to_string()]);
    }

    #[test]
    fn rejects_weight_out_of_range() {
        let yaml = r#"
cloud_platforms:
  - keyword: Azure
    weight: 1.5
"#;
        assert!(KeywordRegistry::from_yaml(yaml).is_err());
    }

    #[test]
    fn rejects_duplicate_primary_in_category() {
        let yaml = r#"
cloud_platforms:
  - keyword: Azure
  - keyword: azure
"#;
        let err = KeywordRegistry::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate keyword"));
    }

    #[test]
    fn empty_tier_is_empty_slice() {
        let registry = KeywordRegistry::from_yaml(KEYWORDS_YAML).unwrap();
        assert!(registry.tier("low").is_empty());
    }
}
