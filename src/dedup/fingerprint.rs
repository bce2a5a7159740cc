//! Article fingerprints and the text/url normalizations behind the
//! heuristic dedup tests.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Headline prefixes that feeds prepend to re-published stories.
static TITLE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)(breaking|urgent|alert|update|exclusive)\s*:?\s*").expect("Invalid regex")
});

static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("Invalid regex"));

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex"));

/// `/YYYY/MM/DD/` date segments inside URL paths.
static DATE_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\d{4}/\d{2}/\d{2}/").expect("Invalid regex"));

/// Purely numeric path segments (article ids, page numbers).
static NUMERIC_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\d+(/|$)").expect("Invalid regex"));

/// The comparison key of one article for heuristic dedup.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleFingerprint {
    pub article_id: String,
    pub url: String,
    pub canonical_url: String,
    pub normalized_title: String,
    pub domain: String,
    pub content_hash: String,
    pub published_at: DateTime<Utc>,
}

impl ArticleFingerprint {
    pub fn new(
        article_id: impl Into<String>,
        url: impl Into<String>,
        canonical_url: impl Into<String>,
        title: &str,
        content_hash: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        let url = url.into();
        let domain = registered_domain(&url);
        Self {
            article_id: article_id.into(),
            canonical_url: canonical_url.into(),
            normalized_title: normalize_title(title),
            domain,
            content_hash: content_hash.into(),
            published_at,
            url,
        }
    }

    /// Rebuild a fingerprint from a stored article document.
    pub fn from_stored(item: &Value) -> Option<Self> {
        let published_at = item
            .get("published_at")?
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())?
            .with_timezone(&Utc);
        Some(Self::new(
            item.get("article_id")?.as_str()?,
            item.get("url")?.as_str()?,
            item.get("canonical_url").and_then(Value::as_str).unwrap_or(
                item.get("url")?.as_str()?,
            ),
            item.get("title").and_then(Value::as_str).unwrap_or(""),
            item.get("content_hash").and_then(Value::as_str).unwrap_or(""),
            published_at,
        ))
    }
}

/// Lowercase, strip feed prefixes and punctuation, collapse whitespace.
pub fn normalize_title(title: &str) -> String {
    let stripped = TITLE_PREFIX.replace(title.trim(), "");
    let lowered = stripped.to_lowercase();
    let no_punct = PUNCTUATION.replace_all(&lowered, "");
    WHITESPACE.replace_all(no_punct.trim(), " ").into_owned()
}

/// Registered domain of a URL: the host with any `www.` prefix removed.
pub fn registered_domain(raw: &str) -> String {
    url::Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        .map(|h| h.strip_prefix("www.").map(str::to_string).unwrap_or(h))
        .unwrap_or_default()
}

/// URL path with date segments replaced by `/DATE/` and numeric segments
/// by `/ID/`, so republished stories compare equal across slugs.
pub fn normalize_url_path(raw: &str) -> String {
    let path = url::Url::parse(raw)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| raw.to_string());
    let dated = DATE_SEGMENT.replace_all(&path, "/DATE/");
    NUMERIC_SEGMENT.replace_all(&dated, "/ID$1").into_owned()
}

/// `difflib.SequenceMatcher`-style similarity: `2·M / (len(a)+len(b))`
/// where `M` is the total size of matched blocks found by recursively
/// taking the longest common substring.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let matched = matched_total(&a_chars, &b_chars);
    2.0 * matched as f64 / (a_chars.len() + b_chars.len()) as f64
}

fn matched_total(a: &[char], b: &[char]) -> usize {
    let (a_start, b_start, len) = longest_match(a, b);
    if len == 0 {
        return 0;
    }
    len + matched_total(&a[..a_start], &b[..b_start])
        + matched_total(&a[a_start + len..], &b[b_start + len..])
}

fn longest_match(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    if a.is_empty() || b.is_empty() {
        return best;
    }
    // lengths[j] = length of the match ending at a[i], b[j]
    let mut lengths = vec![0usize; b.len() + 1];
    for i in 0..a.len() {
        let mut prev = 0;
        for j in 0..b.len() {
            let current = lengths[j + 1];
            lengths[j + 1] = if a[i] == b[j] { prev + 1 } else { 0 };
            if lengths[j + 1] > best.2 {
                best = (i + 1 - lengths[j + 1], j + 1 - lengths[j + 1], lengths[j + 1]);
            }
            prev = current;
        }
    }
    best
}
