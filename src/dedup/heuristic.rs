//! Heuristic duplicate detection against a sliding window of recent
//! articles.

use chrono::Duration;
use tracing::debug;

use super::fingerprint::{normalize_url_path, sequence_ratio, ArticleFingerprint};
use super::{DedupMethod, HeuristicMatch};

const TITLE_SIMILARITY_THRESHOLD: f64 = 0.85;
const URL_SIMILARITY_THRESHOLD: f64 = 0.90;
const TIME_WINDOW_HOURS: i64 = 72;

/// Fingerprint-based duplicate detector.
///
/// Tests run in order of decreasing precision; the first hit wins:
/// exact url, canonical url, same-domain title similarity, normalized
/// url-path similarity.
#[derive(Debug, Clone)]
pub struct HeuristicDeduplicator {
    title_threshold: f64,
    url_threshold: f64,
    window: Duration,
}

impl Default for HeuristicDeduplicator {
    fn default() -> Self {
        Self {
            title_threshold: TITLE_SIMILARITY_THRESHOLD,
            url_threshold: URL_SIMILARITY_THRESHOLD,
            window: Duration::hours(TIME_WINDOW_HOURS),
        }
    }
}

impl HeuristicDeduplicator {
    /// Find the best heuristic duplicate of `article` among `existing`.
    pub fn find_duplicate(
        &self,
        article: &ArticleFingerprint,
        existing: &[ArticleFingerprint],
    ) -> Option<HeuristicMatch> {
        let cutoff = article.published_at - self.window;
        let candidates: Vec<&ArticleFingerprint> = existing
            .iter()
            .filter(|c| c.published_at >= cutoff && c.article_id != article.article_id)
            .collect();
        debug!(
            article_id = %article.article_id,
            candidates = candidates.len(),
            "heuristic dedup window"
        );

        // 1. Exact URL equality.
        if let Some(hit) = candidates.iter().find(|c| c.url == article.url) {
            return Some(HeuristicMatch {
                duplicate_of: hit.article_id.clone(),
                similarity: 1.0,
                method: DedupMethod::ExactUrlMatch,
            });
        }

        // 2. Exact canonical URL equality.
        if let Some(hit) = candidates
            .iter()
            .find(|c| c.canonical_url == article.canonical_url)
        {
            return Some(HeuristicMatch {
                duplicate_of: hit.article_id.clone(),
                similarity: 0.95,
                method: DedupMethod::CanonicalUrlMatch,
            });
        }

        // 3. Same registered domain and similar normalized title.
        let mut best: Option<(f64, &ArticleFingerprint)> = None;
        for candidate in candidates.iter().filter(|c| c.domain == article.domain) {
            let similarity =
                sequence_ratio(&article.normalized_title, &candidate.normalized_title);
            if similarity >= self.title_threshold
                && best.map_or(true, |(s, _)| similarity > s)
            {
                best = Some((similarity, candidate));
            }
        }
        if let Some((similarity, hit)) = best {
            return Some(HeuristicMatch {
                duplicate_of: hit.article_id.clone(),
                similarity,
                method: DedupMethod::TitleSimilarity,
            });
        }

        // 4. Similar normalized URL path.
        let own_path = normalize_url_path(&article.url);
        let mut best: Option<(f64, &ArticleFingerprint)> = None;
        for candidate in &candidates {
            let similarity = sequence_ratio(&own_path, &normalize_url_path(&candidate.url));
            if similarity >= self.url_threshold && best.map_or(true, |(s, _)| similarity > s) {
                best = Some((similarity, candidate));
            }
        }
        best.map(|(similarity, hit)| HeuristicMatch {
            duplicate_of: hit.article_id.clone(),
            similarity,
            method: DedupMethod::UrlPatternSimilarity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn fp(id: &str, url: &str, title: &str, hours: i64) -> ArticleFingerprint {
        ArticleFingerprint::new(
            id,
            url,
            url,
            title,
            "hash",
            Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap() + Duration::hours(hours),
        )
    }

    #[test]
    fn exact_url_duplicate() {
        let dedup = HeuristicDeduplicator::default();
        let a1 = fp("a-1", "https://x.com/a", "First story", 0);
        let a2 = fp("a-2", "https://x.com/a", "Different title entirely", 1);

        let hit = dedup.find_duplicate(&a2, &[a1]).unwrap();
        assert_eq!(hit.duplicate_of, "a-1");
        assert_eq!(hit.similarity, 1.0);
        assert_eq!(hit.method, DedupMethod::ExactUrlMatch);
    }

    #[test]
    fn symmetric_on_url_equality() {
        let dedup = HeuristicDeduplicator::default();
        let a1 = fp("a-1", "https://x.com/a", "One", 0);
        let a2 = fp("a-2", "https://x.com/a", "Two", 1);

        assert!(dedup.find_duplicate(&a2, &[a1.clone()]).is_some());
        assert!(dedup.find_duplicate(&a1, &[a2]).is_some());
    }

    #[test]
    fn canonical_url_duplicate() {
        let dedup = HeuristicDeduplicator::default();
        let mut a1 = fp("a-1", "https://x.com/a?utm_source=rss", "One", 0);
        a1.canonical_url = "https://x.com/a".into();
        let mut a2 = fp("a-2", "https://x.com/a?utm_source=mail", "Two", 1);
        a2.canonical_url = "https://x.com/a".into();

        let hit = dedup.find_duplicate(&a2, &[a1]).unwrap();
        assert_eq!(hit.method, DedupMethod::CanonicalUrlMatch);
        assert_eq!(hit.similarity, 0.95);
    }

    #[test]
    fn title_similarity_same_domain() {
        let dedup = HeuristicDeduplicator::default();
        let a1 = fp("a-1", "https://x.com/a", "Major Security Breach Affects Users", 0);
        let a2 = fp("a-2", "https://x.com/b", "Major Security Breach Impacts Users", 1);

        let hit = dedup.find_duplicate(&a2, &[a1]).unwrap();
        assert_eq!(hit.method, DedupMethod::TitleSimilarity);
        assert!(hit.similarity >= 0.85);
    }

    #[test]
    fn title_similarity_requires_same_domain() {
        let dedup = HeuristicDeduplicator::default();
        let a1 = fp("a-1", "https://x.com/a", "Major Security Breach Affects Users", 0);
        let a2 = fp("a-2", "https://y.com/b", "Major Security Breach Impacts Users", 1);

        assert!(dedup.find_duplicate(&a2, &[a1]).is_none());
    }

    #[test]
    fn outside_window_is_not_duplicate() {
        let dedup = HeuristicDeduplicator::default();
        let a1 = fp("a-1", "https://x.com/a", "Major Security Breach Affects Users", 0);
        let a2 = fp("a-2", "https://x.com/a", "Major Security Breach Affects Users", 100);

        assert!(dedup.find_duplicate(&a2, &[a1]).is_none());
    }

    #[test]
    fn url_pattern_similarity() {
        let dedup = HeuristicDeduplicator::default();
        let a1 = fp(
            "a-1",
            "https://x.com/2026/05/30/breach-at-vendor-x",
            "First take on the story",
            0,
        );
        let a2 = fp(
            "a-2",
            "https://x.com/2026/06/01/breach-at-vendor-x",
            "Completely reworded follow-up coverage",
            1,
        );

        let hit = dedup.find_duplicate(&a2, &[a1]).unwrap();
        assert_eq!(hit.method, DedupMethod::UrlPatternSimilarity);
        assert!(hit.similarity >= 0.90);
    }

    #[test]
    fn self_is_excluded() {
        let dedup = HeuristicDeduplicator::default();
        let a1 = fp("a-1", "https://x.com/a", "Story", 0);
        assert!(dedup.find_duplicate(&a1, &[a1.clone()]).is_none());
    }

    #[test]
    fn exact_url_beats_title_similarity() {
        let dedup = HeuristicDeduplicator::default();
        let by_title = fp("a-title", "https://x.com/other", "Major Breach Affects Users", 0);
        let by_url = fp("a-url", "https://x.com/a", "Unrelated wording here", 0);
        let fresh = fp("a-new", "https://x.com/a", "Major Breach Impacts Users", 1);

        let hit = dedup.find_duplicate(&fresh, &[by_title, by_url]).unwrap();
        assert_eq!(hit.duplicate_of, "a-url");
        assert_eq!(hit.method, DedupMethod::ExactUrlMatch);
    }
}
