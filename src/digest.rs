//! Digest compiler: snapshots the current top-ranked articles into an
//! immutable, idempotently-keyed record.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::cache::KvStore;
use crate::storage::{Database, Edition, FeedCategory};

/// Top tech articles carried by a digest.
pub const TECH_TOP_LIMIT: i64 = 7;

/// Top world articles carried by a digest.
pub const WORLD_TOP_LIMIT: i64 = 3;

/// How many tagged tech articles the category index scans.
pub const CATEGORY_SCAN_LIMIT: i64 = 30;

/// Article ids kept per tag in the category index.
pub const CATEGORY_TAG_LIMIT: usize = 5;

const DIGEST_CACHE_KEY: &str = "digest-latest";
const DIGEST_CACHE_TTL_SECS: u64 = 86_400;

/// The deterministic digest key for a date and edition.
pub fn digest_id(date: &str, edition: Edition) -> String {
    format!("{}-{}", date, edition)
}

/// Compile the digest for `edition`, overwriting any prior snapshot with
/// the same `{date}-{edition}` key.
///
/// Selects the highest-ranked summarized articles per category (ties break
/// by id ascending), builds the tag index from the top tagged tech
/// articles, persists the snapshot, then best-effort refreshes the
/// `digest-latest` cache entry — a cache failure is logged, never fatal.
pub async fn compile(
    db: &Database,
    cache: Option<&dyn KvStore>,
    edition: Edition,
    world_summary: &str,
    now: i64,
) -> Result<String> {
    let date = DateTime::<Utc>::from_timestamp(now, 0)
        .unwrap_or_else(Utc::now)
        .format("%Y-%m-%d")
        .to_string();
    let id = digest_id(&date, edition);

    let tech_top = db
        .top_ranked_summarized(FeedCategory::Tech, TECH_TOP_LIMIT)
        .await?;
    let world_top = db
        .top_ranked_summarized(FeedCategory::World, WORLD_TOP_LIMIT)
        .await?;

    let tech_top_ids: Vec<String> = tech_top.into_iter().map(|a| a.id).collect();
    let world_top_ids: Vec<String> = world_top.into_iter().map(|a| a.id).collect();

    // Tag index over the top tagged tech articles: the scan is bounded, and
    // each tag keeps at most CATEGORY_TAG_LIMIT ids in score order.
    let mut categories: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (article_id, tags) in db.top_tagged_tech(CATEGORY_SCAN_LIMIT).await? {
        for tag in tags {
            let ids = categories.entry(tag).or_default();
            if ids.len() < CATEGORY_TAG_LIMIT {
                ids.push(article_id.clone());
            }
        }
    }

    db.upsert_digest(
        &id,
        &date,
        edition,
        &tech_top_ids,
        world_summary,
        &world_top_ids,
        &categories,
        now,
    )
    .await?;

    tracing::info!(
        digest = %id,
        tech = tech_top_ids.len(),
        world = world_top_ids.len(),
        tags = categories.len(),
        "Digest compiled"
    );

    if let Some(cache) = cache {
        refresh_latest_cache(db, cache, &id).await;
    }

    Ok(id)
}

/// Push the freshly written snapshot into the read-through cache.
/// Failures here must not undo a successful digest write.
async fn refresh_latest_cache(db: &Database, cache: &dyn KvStore, id: &str) {
    let digest = match db.get_digest(id).await {
        Ok(Some(digest)) => digest,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(digest = %id, error = %e, "Failed to re-read digest for cache refresh");
            return;
        }
    };

    let payload = match serde_json::to_string(&digest) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(digest = %id, error = %e, "Failed to serialize digest for cache");
            return;
        }
    };

    if let Err(e) = cache
        .put(DIGEST_CACHE_KEY, &payload, Some(DIGEST_CACHE_TTL_SECS))
        .await
    {
        tracing::warn!(digest = %id, error = %e, "Digest cache refresh failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_id_format() {
        assert_eq!(digest_id("2024-05-01", Edition::Am), "2024-05-01-am");
        assert_eq!(digest_id("2024-05-01", Edition::Pm), "2024-05-01-pm");
    }
}
