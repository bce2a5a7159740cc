//! Keyword matching over article text.
//!
//! Exact matching is word-boundary and case-insensitive by default, both
//! configurable through [`MatchSettings`]. Fuzzy matching compares content
//! words (or phrases of the term's length) against every search term by
//! Levenshtein distance. Where both stages hit the same primary term, the
//! exact match wins.

use regex::RegexBuilder;
use std::collections::HashMap;
use strsim::levenshtein;

use crate::article::KeywordMatch;

use super::loader::KeywordRegistry;
use super::types::MatchSettings;

const MAX_CONTEXTS: usize = 5;

/// Matcher over a validated [`KeywordRegistry`].
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    registry: KeywordRegistry,
}

impl KeywordMatcher {
    pub fn new(registry: KeywordRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &KeywordRegistry {
        &self.registry
    }

    /// Find all keyword matches in `text`, exact and (if enabled) fuzzy,
    /// sorted by `confidence × weight` descending.
    pub fn match_keywords(&self, text: &str) -> Vec<KeywordMatch> {
        let settings = self.registry.settings().clone();

        let mut merged: HashMap<String, KeywordMatch> = HashMap::new();
        for m in self.find_exact(text, &settings) {
            merged.insert(m.keyword.clone(), m);
        }
        if settings.enable_fuzzy_matching {
            for m in self.find_fuzzy(text, &settings) {
                match merged.get(&m.keyword) {
                    Some(existing) if existing.confidence >= m.confidence => {}
                    _ => {
                        merged.insert(m.keyword.clone(), m);
                    }
                }
            }
        }

        let mut matches: Vec<KeywordMatch> = merged.into_values().collect();
        matches.sort_by(|a, b| {
            let wa = self.weight_of(&a.keyword) * a.confidence;
            let wb = self.weight_of(&b.keyword) * b.confidence;
            wb.partial_cmp(&wa).unwrap_or(std::cmp::Ordering::Equal)
        });
        matches
    }

    fn weight_of(&self, primary: &str) -> f64 {
        self.registry.by_primary(primary).map(|k| k.weight).unwrap_or(1.0)
    }

    /// Exact occurrences of each primary term or variation.
    ///
    /// The first search term with hits settles a keyword; variations are
    /// not scanned once the primary term matched.
    fn find_exact(&self, text: &str, settings: &MatchSettings) -> Vec<KeywordMatch> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let mut matches = Vec::new();

        for config in self.registry.all_keywords() {
            let mut search_terms = vec![config.keyword.as_str()];
            search_terms.extend(config.variations.iter().map(|v| v.as_str()));

            for term in search_terms {
                let positions = if settings.word_boundary_matching {
                    boundary_positions(text, term, settings.case_sensitive)
                } else {
                    substring_positions(text, term, settings.case_sensitive)
                };
                if positions.is_empty() {
                    continue;
                }

                let contexts = positions
                    .iter()
                    .take(MAX_CONTEXTS)
                    .map(|&pos| context_window(text, &words, pos, settings.context_window))
                    .collect();

                matches.push(KeywordMatch {
                    keyword: config.keyword.clone(),
                    hit_count: positions.len() as u32,
                    contexts,
                    confidence: 1.0,
                });
                break;
            }
        }
        matches
    }

    /// Fuzzy matches by Levenshtein distance against every content word or
    /// phrase of matching length. Multi-word terms scale the distance
    /// budget by their word count.
    fn find_fuzzy(&self, text: &str, settings: &MatchSettings) -> Vec<KeywordMatch> {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered.split_whitespace().collect();
        let mut best: HashMap<String, KeywordMatch> = HashMap::new();

        for config in self.registry.all_keywords() {
            let mut search_terms = vec![config.keyword.to_lowercase()];
            search_terms.extend(config.variations.iter().map(|v| v.to_lowercase()));

            for term in &search_terms {
                let term_words: Vec<&str> = term.split_whitespace().collect();
                let candidate = if term_words.len() > 1 {
                    self.fuzzy_phrase(&words, term, term_words.len(), settings)
                } else {
                    self.fuzzy_word(&words, term, settings)
                };

                if let Some((confidence, context)) = candidate {
                    let entry = KeywordMatch {
                        keyword: config.keyword.clone(),
                        hit_count: 1,
                        contexts: vec![context],
                        confidence,
                    };
                    match best.get(&config.keyword) {
                        Some(existing) if existing.confidence >= confidence => {}
                        _ => {
                            best.insert(config.keyword.clone(), entry);
                        }
                    }
                }
            }
        }
        best.into_values().collect()
    }

    fn fuzzy_word(
        &self,
        words: &[&str],
        term: &str,
        settings: &MatchSettings,
    ) -> Option<(f64, String)> {
        // Very short terms produce spurious edits.
        if term.len() <= 2 {
            return None;
        }
        let mut best: Option<(f64, String)> = None;
        for (i, word) in words.iter().enumerate() {
            let distance = levenshtein(word, term);
            if distance > settings.max_edit_distance {
                continue;
            }
            let confidence = 1.0 - distance as f64 / word.len().max(term.len()) as f64;
            if confidence < settings.min_confidence {
                continue;
            }
            if best.as_ref().map_or(true, |(c, _)| confidence > *c) {
                let start = i.saturating_sub(5);
                let end = (i + 6).min(words.len());
                best = Some((confidence, words[start..end].join(" ")));
            }
        }
        best
    }

    fn fuzzy_phrase(
        &self,
        words: &[&str],
        term: &str,
        term_len: usize,
        settings: &MatchSettings,
    ) -> Option<(f64, String)> {
        if words.len() < term_len {
            return None;
        }
        let budget = settings.max_edit_distance * term_len;
        let mut best: Option<(f64, String)> = None;
        for i in 0..=(words.len() - term_len) {
            let phrase = words[i..i + term_len].join(" ");
            let distance = levenshtein(&phrase, term);
            if distance > budget {
                continue;
            }
            let confidence = 1.0 - distance as f64 / phrase.len().max(term.len()) as f64;
            if confidence < settings.min_confidence {
                continue;
            }
            if best.as_ref().map_or(true, |(c, _)| confidence > *c) {
                let start = i.saturating_sub(5);
                let end = (i + term_len + 5).min(words.len());
                best = Some((confidence, words[start..end].join(" ")));
            }
        }
        best
    }
}

/// Byte offsets of word-boundary occurrences of `term`.
fn boundary_positions(text: &str, term: &str, case_sensitive: bool) -> Vec<usize> {
    let pattern = format!(r"\b{}\b", regex::escape(term));
    let Ok(re) = RegexBuilder::new(&pattern)
        .case_insensitive(!case_sensitive)
        .build()
    else {
        return Vec::new();
    };
    re.find_iter(text).map(|m| m.start()).collect()
}

/// Byte offsets of plain substring occurrences of `term`.
fn substring_positions(text: &str, term: &str, case_sensitive: bool) -> Vec<usize> {
    let (haystack, needle) = if case_sensitive {
        (text.to_string(), term.to_string())
    } else {
        (text.to_lowercase(), term.to_lowercase())
    };
    let mut positions = Vec::new();
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(&needle) {
        positions.push(start + pos);
        start += pos + 1;
    }
    positions
}

/// A ~`window`-word snippet centered on the word containing byte `pos`.
fn context_window(text: &str, words: &[&str], pos: usize, window: usize) -> String {
    let word_idx = text[..pos].split_whitespace().count();
    let half = (window / 2).max(1);
    let start = word_idx.saturating_sub(half);
    let end = (word_idx + half + 1).min(words.len());
    words[start..end].join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::types::{KeywordConfig, KeywordsConfig, MatchSettings};

    fn registry(settings: MatchSettings) -> KeywordRegistry {
        let config = KeywordsConfig {
            cloud_platforms: vec![
                KeywordConfig {
                    keyword: "Azure".into(),
                    variations: vec!["Microsoft Azure".into()],
                    weight: 0.9,
                    description: None,
                },
                KeywordConfig {
                    keyword: "AWS".into(),
                    variations: vec!["Amazon Web Services".into()],
                    weight: 1.0,
                    description: None,
                },
            ],
            security_vendors: vec![KeywordConfig {
                keyword: "CrowdStrike".into(),
                variations: vec![],
                weight: 0.5,
                description: None,
            }],
            settings,
            ..Default::default()
        };
        KeywordRegistry::from_config(config).unwrap()
    }

    fn matcher() -> KeywordMatcher {
        KeywordMatcher::new(registry(MatchSettings::default()))
    }

    #[test]
    fn exact_word_boundary_match() {
        let matches = matcher().match_keywords("A breach hit Azure tenants today");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].keyword, "Azure");
        assert_eq!(matches[0].hit_count, 1);
        assert_eq!(matches[0].confidence, 1.0);
        assert!(matches[0].contexts[0].contains("Azure"));
    }

    #[test]
    fn boundary_excludes_embedded_term() {
        let matches = matcher().match_keywords("The word Azures is not a hit here at all");
        assert!(matches.iter().all(|m| m.confidence < 1.0));
    }

    #[test]
    fn case_insensitive_by_default() {
        let matches = matcher().match_keywords("attack on AZURE infrastructure");
        assert_eq!(matches[0].keyword, "Azure");
    }

    #[test]
    fn variation_reports_primary_term() {
        let matches = matcher().match_keywords("outage across Amazon Web Services regions");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].keyword, "AWS");
    }

    #[test]
    fn hit_count_counts_occurrences() {
        let matches = matcher().match_keywords("Azure outage: Azure customers report Azure errors");
        assert_eq!(matches[0].hit_count, 3);
        assert_eq!(matches[0].contexts.len(), 3);
    }

    #[test]
    fn contexts_capped_at_five() {
        let text = "Azure ".repeat(9);
        let matches = matcher().match_keywords(&text);
        assert_eq!(matches[0].hit_count, 9);
        assert_eq!(matches[0].contexts.len(), 5);
    }

    #[test]
    fn fuzzy_match_within_distance() {
        // "Azur" is one edit from "Azure": confidence 1 - 1/5 = 0.8.
        let matches = matcher().match_keywords("problems reported on Azur subscriptions");
        let m = matches.iter().find(|m| m.keyword == "Azure").unwrap();
        assert!(m.confidence > 0.79 && m.confidence < 0.81);
    }

    #[test]
    fn fuzzy_below_min_confidence_rejected() {
        // "Azrue" is two edits from "Azure": confidence 0.6 < 0.7.
        let matches = matcher().match_keywords("problems reported on Azrue subscriptions");
        assert!(matches.iter().all(|m| m.keyword != "Azure"));
    }

    #[test]
    fn fuzzy_phrase_scales_budget() {
        let matches = matcher().match_keywords("migration to Microsoft Azur completed");
        let m = matches.iter().find(|m| m.keyword == "Azure").unwrap();
        assert!(m.confidence >= 0.9);
    }

    #[test]
    fn exact_beats_fuzzy_for_same_primary() {
        let matches = matcher().match_keywords("Azure and also Azur appear here");
        let azure: Vec<_> = matches.iter().filter(|m| m.keyword == "Azure").collect();
        assert_eq!(azure.len(), 1);
        assert_eq!(azure[0].confidence, 1.0);
    }

    #[test]
    fn sorted_by_confidence_times_weight() {
        let matches = matcher().match_keywords("CrowdStrike report covers AWS and Azure");
        let keywords: Vec<&str> = matches.iter().map(|m| m.keyword.as_str()).collect();
        // weights: AWS 1.0, Azure 0.9, CrowdStrike 0.5 — all exact.
        assert_eq!(keywords, ["AWS", "Azure", "CrowdStrike"]);
    }

    #[test]
    fn match_set_invariant_under_target_permutation() {
        let text = "CrowdStrike report covers AWS and Azure workloads";
        let forward = matcher().match_keywords(text);

        // Same keywords declared in a different order and category.
        let reversed = KeywordsConfig {
            security_vendors: vec![
                KeywordConfig {
                    keyword: "AWS".into(),
                    variations: vec!["Amazon Web Services".into()],
                    weight: 1.0,
                    description: None,
                },
                KeywordConfig {
                    keyword: "Azure".into(),
                    variations: vec!["Microsoft Azure".into()],
                    weight: 0.9,
                    description: None,
                },
            ],
            specialized_platforms: vec![KeywordConfig {
                keyword: "CrowdStrike".into(),
                variations: vec![],
                weight: 0.5,
                description: None,
            }],
            settings: MatchSettings::default(),
            ..Default::default()
        };
        let permuted = KeywordMatcher::new(KeywordRegistry::from_config(reversed).unwrap())
            .match_keywords(text);

        assert_eq!(forward.len(), permuted.len());
        for m in &forward {
            let twin = permuted.iter().find(|p| p.keyword == m.keyword).unwrap();
            assert_eq!(twin.hit_count, m.hit_count);
            assert_eq!(twin.confidence, m.confidence);
        }
    }

    #[test]
    fn fuzzy_disabled_skips_fuzzy_stage() {
        let settings = MatchSettings {
            enable_fuzzy_matching: false,
            ..Default::default()
        };
        let matcher = KeywordMatcher::new(registry(settings));
        let matches = matcher.match_keywords("problems reported on Azur subscriptions");
        assert!(matches.is_empty());
    }
}
