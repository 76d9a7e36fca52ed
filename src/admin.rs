//! Admin-triggerable operations: thin callers into the collection, LLM,
//! and digest layers. These are the entry points the CLI (or a scheduler)
//! drives; all policy lives in the modules they call.

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;

use crate::cache::KvStore;
use crate::config::Config;
use crate::digest;
use crate::ingest;
use crate::llm::{self, CompletionClient, ProcessOutcome};
use crate::storage::{CollectLog, Database, Edition, FeedCategory, SourceCount};

/// Unsummarized tech articles taken per digest run (one LLM chunk).
const TECH_BATCH_LIMIT: i64 = 25;

/// Unsummarized world articles taken per digest run.
const WORLD_BATCH_LIMIT: i64 = 15;

/// World summary used when LLM generation failed outright.
const WORLD_FAILED_PLACEHOLDER: &str = "세계 뉴스 요약 생성 실패";

/// Recent collect-log rows included in a status report.
const STATUS_LOG_LIMIT: i64 = 20;

/// Bounds for the operator-settable daily LLM call cap.
const QUOTA_LIMIT_MIN: u32 = 1;
const QUOTA_LIMIT_MAX: u32 = 10_000;

/// Run a collection pass. `source_ids` restricts the run to a subset of
/// the configured sources; `None` collects everything.
pub async fn run_collect(
    db: &Database,
    client: &reqwest::Client,
    config: &Config,
    source_ids: Option<&[String]>,
    now: i64,
) -> Result<ingest::CollectResult> {
    ingest::run_collect(db, client, &config.sources, source_ids, now).await
}

/// Outcome of a digest run, including how each LLM phase fared.
#[derive(Debug, Serialize)]
pub struct DigestRunReport {
    pub digest_id: String,
    pub tech_candidates: usize,
    pub world_candidates: usize,
    /// Present when tech processing ran.
    pub tech: Option<ProcessOutcome>,
    pub tech_error: Option<String>,
    pub world_error: Option<String>,
    pub world_summary: String,
    /// True when no API key was available or `skip_llm` was requested.
    pub llm_skipped: bool,
}

/// Run LLM processing over the unsummarized backlog, then compile the
/// digest for `edition`.
///
/// `collected_within_hours` restricts the backlog to recent collections —
/// scheduled runs use it so a stale backlog cannot crowd out fresh news;
/// manual triggers usually pass `None`.
///
/// Without a usable API key (or with `skip_llm`), the run degrades to a
/// placeholder world summary and zero LLM processing instead of failing.
/// Each LLM phase's failure is recorded and the digest still compiles.
#[allow(clippy::too_many_arguments)]
pub async fn run_digest(
    db: &Database,
    cache: Option<Arc<dyn KvStore>>,
    http: &reqwest::Client,
    config: &Config,
    edition: Edition,
    skip_llm: bool,
    collected_within_hours: Option<i64>,
    now: i64,
) -> Result<DigestRunReport> {
    let collected_since = collected_within_hours.map(|hours| now - hours * 3600);
    let tech_articles = db
        .get_unsummarized(FeedCategory::Tech, collected_since, TECH_BATCH_LIMIT)
        .await?;
    let world_articles = db
        .get_unsummarized(FeedCategory::World, collected_since, WORLD_BATCH_LIMIT)
        .await?;

    let mut report = DigestRunReport {
        digest_id: String::new(),
        tech_candidates: tech_articles.len(),
        world_candidates: world_articles.len(),
        tech: None,
        tech_error: None,
        world_error: None,
        world_summary: llm::WORLD_EMPTY_PLACEHOLDER.to_string(),
        llm_skipped: true,
    };

    let api_key = config.api_key();
    match (skip_llm, api_key) {
        (false, Some(api_key)) => {
            report.llm_skipped = false;
            let llm_client = CompletionClient::new(
                http.clone(),
                config.llm.base_url.clone(),
                config.llm.models.clone(),
                api_key,
                cache.clone(),
                config.llm.daily_limit,
            );

            match llm::process_tech(
                db,
                &llm_client,
                &config.scoring,
                &config.llm.tag_vocabulary,
                config.llm.chunk_size,
                &tech_articles,
                now,
            )
            .await
            {
                Ok(outcome) => report.tech = Some(outcome),
                Err(e) => {
                    tracing::error!(error = %e, "Tech LLM processing failed");
                    report.tech_error = Some(e.to_string());
                }
            }

            match llm::process_world(db, &llm_client, &config.scoring, &world_articles, now).await
            {
                Ok(summary) => report.world_summary = summary,
                Err(e) => {
                    tracing::error!(error = %e, "World LLM processing failed");
                    report.world_error = Some(e.to_string());
                    report.world_summary = WORLD_FAILED_PLACEHOLDER.to_string();
                }
            }
        }
        _ => {
            tracing::warn!("Digest running without LLM processing (no API key or skip requested)");
        }
    }

    report.digest_id =
        digest::compile(db, cache.as_deref(), edition, &report.world_summary, now).await?;
    Ok(report)
}

/// Aggregate counters for operators.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub total_articles: i64,
    pub unsummarized: i64,
    pub today_collected: i64,
    pub llm_calls_today: u32,
    pub llm_daily_limit: u32,
    pub latest_digest: Option<String>,
    pub recent_collect_logs: Vec<CollectLog>,
    pub articles_by_source: Vec<SourceCount>,
}

pub async fn status(
    db: &Database,
    kv: Option<&dyn KvStore>,
    config: &Config,
    now: i64,
) -> Result<StatusReport> {
    let midnight = now - now.rem_euclid(86_400);

    let (llm_calls_today, llm_daily_limit) = match kv {
        Some(kv) => (
            llm::usage_today(kv).await?,
            llm::configured_daily_limit(kv, config.llm.daily_limit).await?,
        ),
        None => (0, config.llm.daily_limit),
    };

    Ok(StatusReport {
        total_articles: db.count_articles().await?,
        unsummarized: db.count_unsummarized().await?,
        today_collected: db.collected_since(midnight).await?,
        llm_calls_today,
        llm_daily_limit,
        latest_digest: db.get_latest_digest().await?.map(|d| d.id),
        recent_collect_logs: db.recent_collect_logs(STATUS_LOG_LIMIT).await?,
        articles_by_source: db.count_by_source().await?,
    })
}

/// Store an operator override for the daily LLM call cap, clamped to a
/// sane range.
pub async fn set_quota_limit(kv: &dyn KvStore, limit: u32) -> Result<u32> {
    let clamped = limit.clamp(QUOTA_LIMIT_MIN, QUOTA_LIMIT_MAX);
    CompletionClient::set_daily_limit(kv, clamped).await?;
    Ok(clamped)
}

/// Result of a cleanup sweep (or its dry run).
#[derive(Debug, Serialize)]
pub struct CleanupReport {
    pub older_than_days: i64,
    pub cutoff: i64,
    /// Count that would be deleted (dry run) or was deleted.
    pub affected: i64,
    pub dry_run: bool,
}

/// Delete (or count, when `dry_run`) articles published before the
/// threshold that nobody bookmarked.
pub async fn cleanup(
    db: &Database,
    older_than_days: i64,
    dry_run: bool,
    now: i64,
) -> Result<CleanupReport> {
    let older_than_days = older_than_days.max(1);
    let cutoff = now - older_than_days * 86_400;

    let affected = if dry_run {
        db.count_old_unbookmarked(cutoff).await?
    } else {
        let deleted = db.delete_old_unbookmarked(cutoff).await?;
        tracing::info!(deleted = deleted, older_than_days = older_than_days, "Cleanup sweep finished");
        deleted as i64
    };

    Ok(CleanupReport {
        older_than_days,
        cutoff,
        affected,
        dry_run,
    })
}
