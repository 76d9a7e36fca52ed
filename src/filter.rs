//! Relevance and recency filtering applied before ingestion.
//!
//! Rejected items are dropped before the dedup stage, so they count as
//! neither insertions nor duplicates.

use regex::Regex;
use std::sync::OnceLock;

use crate::storage::FeedCategory;

/// Items older than this at collection time are dropped.
pub const MAX_AGE_SECS: i64 = 48 * 60 * 60;

// Korean entertainment/sports terms; applies to every feed regardless of
// category since several sources mix beats in one feed.
fn exclude_ko() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new("연예|아이돌|드라마|예능|스포츠|축구|야구|농구|배구|골프|올림픽|프로야구|K리그|해외축구")
            .unwrap()
    })
}

// English sports/entertainment terms that show up in tech feeds.
fn exclude_tech_en() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(nfl|nba|mlb|fifa|soccer|basketball|football|baseball|cricket|tennis|golf|olympics|super\s*bowl|kardashian|celebrity|gossip|reality\s*tv|movie\s*review|box\s*office|grammy|oscar|emmy|red\s*carpet)\b",
        )
        .unwrap()
    })
}

// Sports-league/entertainment terms that show up in world feeds.
fn exclude_world_en() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(premier\s*league|champions\s*league|world\s*cup|transfer|match\s*report|goal\s*scored|k-?pop|idol|drama\s*review|entertainment|billboard|grammy)\b",
        )
        .unwrap()
    })
}

/// Returns false when the title matches an exclusion pattern for its feed
/// category. Any match rejects the item before ingestion.
pub fn is_relevant(title: &str, category: FeedCategory) -> bool {
    if exclude_ko().is_match(title) {
        return false;
    }
    match category {
        FeedCategory::Tech => !exclude_tech_en().is_match(title),
        FeedCategory::World => !exclude_world_en().is_match(title),
    }
}

/// Age check: items whose publish time is more than 48 hours before `now`
/// are stale. Items with no publish time bypass the check.
pub fn is_fresh(published_at: Option<i64>, now: i64) -> bool {
    match published_at {
        Some(published) => now - published <= MAX_AGE_SECS,
        None => true,
    }
}
