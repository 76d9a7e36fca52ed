//! Ingestion and dedup: hashes URLs, reconciles against stored articles,
//! inserts survivors, and logs per-source outcomes.

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::filter::{is_fresh, is_relevant};
use crate::sources::{fetch_source, CollectedItem, SourceConfig};
use crate::storage::{Database, NewArticle};
use crate::util::{generate_article_id, hash_url};

/// Soft-deleted articles are hard-deleted after this long in `deleted`
/// status, freeing their url_hash for re-collection.
pub const RETENTION_DAYS: i64 = 30;

/// Per-source tally of one ingest pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    pub inserted: i64,
    pub duplicates: i64,
}

/// One source's result within a collection run: counts on success, the
/// error message on failure. Failures never abort sibling sources.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SourceOutcome {
    Counts(IngestOutcome),
    Failed { error: String },
}

/// Per-source outcome map for a whole collection run, keyed by source id.
pub type CollectResult = BTreeMap<String, SourceOutcome>;

/// Ingest a batch of collected items.
///
/// Each item is filtered (recency, relevance), hashed, and reconciled
/// independently — there is no cross-item transaction. A hash hit counts as
/// a duplicate and may only raise the stored community score (monotonic
/// ratchet); a miss inserts a fresh active article.
///
/// Two concurrent ingests of the same URL can race between the hash lookup
/// and the insert; the UNIQUE index on url_hash makes the loser error
/// rather than double-insert.
pub async fn ingest(db: &Database, items: &[CollectedItem], now: i64) -> Result<IngestOutcome> {
    let mut outcome = IngestOutcome::default();

    for item in items {
        if !is_fresh(item.published_at, now) {
            continue;
        }
        if !is_relevant(&item.title, item.feed_category) {
            continue;
        }

        let url_hash = hash_url(&item.url);

        if let Some((existing_id, existing_score)) = db.find_by_url_hash(&url_hash).await? {
            outcome.duplicates += 1;
            if item.community_score > existing_score {
                db.raise_community_score(&existing_id, item.community_score)
                    .await?;
            }
            continue;
        }

        db.insert_article(&NewArticle {
            id: generate_article_id(),
            url: item.url.clone(),
            url_hash,
            title: item.title.clone(),
            source_id: item.source_id.clone(),
            feed_category: item.feed_category,
            community_score: item.community_score,
            published_at: item.published_at.unwrap_or(now),
            collected_at: now,
            thumbnail_url: item.thumbnail_url.clone(),
        })
        .await?;
        outcome.inserted += 1;
    }

    Ok(outcome)
}

/// Run a full collection pass over the configured sources.
///
/// Sources are processed sequentially; each source's fetch-and-ingest is
/// isolated, logged to `collect_logs`, and recorded in the returned map.
/// After all sources, the retention sweep hard-deletes articles that have
/// been soft-deleted for over [`RETENTION_DAYS`].
pub async fn run_collect(
    db: &Database,
    client: &reqwest::Client,
    sources: &[SourceConfig],
    source_ids: Option<&[String]>,
    now: i64,
) -> Result<CollectResult> {
    let targets: Vec<&SourceConfig> = match source_ids {
        Some(ids) => sources.iter().filter(|s| ids.contains(&s.id)).collect(),
        None => sources.iter().collect(),
    };

    let mut results = CollectResult::new();

    for source in targets {
        match collect_one(db, client, source, now).await {
            Ok(outcome) => {
                tracing::info!(
                    source = %source.id,
                    inserted = outcome.inserted,
                    duplicates = outcome.duplicates,
                    "Source collected"
                );
                db.log_collection(&source.id, outcome.inserted, outcome.duplicates, None, now)
                    .await?;
                results.insert(source.id.clone(), SourceOutcome::Counts(outcome));
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(source = %source.id, error = %message, "Source collection failed");
                db.log_collection(&source.id, 0, 0, Some(&message), now)
                    .await?;
                results.insert(source.id.clone(), SourceOutcome::Failed { error: message });
            }
        }
    }

    let purged = db.purge_deleted(now - RETENTION_DAYS * 86_400).await?;
    if purged > 0 {
        tracing::info!(purged = purged, "Retention sweep removed soft-deleted articles");
    }

    Ok(results)
}

async fn collect_one(
    db: &Database,
    client: &reqwest::Client,
    source: &SourceConfig,
    now: i64,
) -> Result<IngestOutcome> {
    let items = fetch_source(client, source).await?;
    ingest(db, &items, now).await
}
