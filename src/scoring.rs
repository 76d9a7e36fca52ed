//! Pure ranking engine: blends normalized community popularity, the
//! LLM-derived relevance score, feed weighting, and recency decay into a
//! single final score.
//!
//! No I/O and no ambient clock: callers pass `now` explicitly. The final
//! score is recomputed whenever an article's LLM score changes and written
//! back by that caller; nothing else may set it.

use serde::Deserialize;
use std::collections::HashMap;

use crate::storage::FeedCategory;

/// Community scores above this many multiples of a source's norm saturate.
const COMMUNITY_CAP: f64 = 3.0;

/// Blend weights: community popularity vs. LLM relevance.
const COMMUNITY_WEIGHT: f64 = 0.3;
const LLM_WEIGHT: f64 = 0.7;

/// Normalization and weighting tables, injected so new sources can be
/// tuned without touching the formula.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Per-source normalization constants reflecting each source's typical
    /// popularity scale (a code-hosting trend source normalizes much higher
    /// than a small blog).
    pub community_norms: HashMap<String, f64>,
    /// Norm applied to sources without an entry above.
    pub default_norm: f64,
    /// Per-category weight applied to the blended base score.
    pub feed_weights: HashMap<FeedCategory, f64>,
    /// Weight for categories without an entry above.
    pub default_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let community_norms = [
            ("hackernews", 100.0),
            ("github", 500.0),
            ("techcrunch", 50.0),
            ("theverge", 50.0),
            ("geeknews", 30.0),
            ("yozm", 20.0),
            ("discoveryet", 20.0),
            ("cloudflare", 30.0),
            ("reuters", 40.0),
            ("apnews", 40.0),
            ("bbc", 40.0),
            ("yonhap", 30.0),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let feed_weights = [(FeedCategory::Tech, 1.0), (FeedCategory::World, 0.5)]
            .into_iter()
            .collect();

        Self {
            community_norms,
            default_norm: 50.0,
            feed_weights,
            default_weight: 0.5,
        }
    }
}

impl ScoringConfig {
    /// Normalized community score: raw popularity divided by the source's
    /// norm, capped so one viral outlier cannot dominate the ranking.
    pub fn normalize_community(&self, source_id: &str, raw: f64) -> f64 {
        let norm = self
            .community_norms
            .get(source_id)
            .copied()
            .unwrap_or(self.default_norm);
        (raw / norm).min(COMMUNITY_CAP)
    }

    /// The final rank score for an article, rounded to 2 decimal places.
    ///
    /// ```text
    /// base       = (commNorm * 0.3 + llm/100 * 0.7) * feedWeight
    /// timeFactor = 1.2 (<= 24h old) | 0.5 (> 48h) | 1.0 otherwise
    /// final      = round(base * timeFactor, 2)
    /// ```
    pub fn final_score(
        &self,
        source_id: &str,
        category: FeedCategory,
        community_score: f64,
        llm_score: f64,
        published_at: i64,
        now: i64,
    ) -> f64 {
        let comm_norm = self.normalize_community(source_id, community_score);
        let feed_weight = self
            .feed_weights
            .get(&category)
            .copied()
            .unwrap_or(self.default_weight);
        let base = (comm_norm * COMMUNITY_WEIGHT + llm_score / 100.0 * LLM_WEIGHT) * feed_weight;

        let hours_ago = (now - published_at) as f64 / 3600.0;
        let time_factor = if hours_ago <= 24.0 {
            1.2
        } else if hours_ago > 48.0 {
            0.5
        } else {
            1.0
        };

        (base * time_factor * 100.0).round() / 100.0
    }
}

/// Clamp an LLM-reported relevance score into the valid range.
pub fn clamp_llm_score(raw: f64) -> f64 {
    raw.clamp(0.0, 100.0)
}
