//! Integration tests for the admin operations: digest runs without LLM
//! access, status aggregation, and the quota override.

use std::sync::Arc;

use newsdigest::admin;
use newsdigest::cache::{KvStore, MemoryKv};
use newsdigest::config::Config;
use newsdigest::llm::WORLD_EMPTY_PLACEHOLDER;
use newsdigest::storage::{Database, Edition, FeedCategory, NewArticle};
use newsdigest::util::hash_url;

const NOW: i64 = 1_700_000_000;

async fn test_db() -> Database {
    Database::open(":memory:").await.unwrap()
}

async fn seed_summarized(db: &Database, id: &str, category: FeedCategory, final_score: f64) {
    let url = format!("https://example.com/{id}");
    db.insert_article(&NewArticle {
        id: id.to_string(),
        url: url.clone(),
        url_hash: hash_url(&url),
        title: format!("Article {id}"),
        source_id: "hackernews".to_string(),
        feed_category: category,
        community_score: 10.0,
        published_at: NOW - 3600,
        collected_at: NOW,
        thumbnail_url: None,
    })
    .await
    .unwrap();
    db.apply_llm_result(id, Some("요약"), None, &[], 70.0, final_score)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_run_digest_skip_llm_uses_placeholder_and_compiles() {
    let db = test_db().await;
    seed_summarized(&db, "tech01", FeedCategory::Tech, 1.0).await;

    let config = Config::default();
    let http = reqwest::Client::new();
    let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());

    let report = admin::run_digest(
        &db,
        Some(kv),
        &http,
        &config,
        Edition::Am,
        true, // skip_llm
        None,
        NOW,
    )
    .await
    .unwrap();

    assert!(report.llm_skipped);
    assert!(report.tech.is_none());
    assert_eq!(report.world_summary, WORLD_EMPTY_PLACEHOLDER);
    assert_eq!(report.digest_id, "2023-11-14-am");

    let digest = db.get_digest(&report.digest_id).await.unwrap().unwrap();
    assert_eq!(digest.tech_top_ids, vec!["tech01".to_string()]);
    assert_eq!(digest.world_summary, WORLD_EMPTY_PLACEHOLDER);
}

#[tokio::test]
async fn test_run_digest_recent_window_excludes_old_backlog() {
    let db = test_db().await;
    // Collected five days ago; a 12-hour window must not pick it up.
    let url = "https://example.com/stale";
    db.insert_article(&NewArticle {
        id: "stale0000000000000001".to_string(),
        url: url.to_string(),
        url_hash: hash_url(url),
        title: "Stale".to_string(),
        source_id: "hackernews".to_string(),
        feed_category: FeedCategory::Tech,
        community_score: 10.0,
        published_at: NOW - 5 * 86_400,
        collected_at: NOW - 5 * 86_400,
        thumbnail_url: None,
    })
    .await
    .unwrap();

    let config = Config::default();
    let http = reqwest::Client::new();

    let report = admin::run_digest(
        &db,
        None,
        &http,
        &config,
        Edition::Pm,
        true,
        Some(12),
        NOW,
    )
    .await
    .unwrap();

    assert_eq!(report.tech_candidates, 0);
}

#[tokio::test]
async fn test_status_aggregates_counters() {
    let db = test_db().await;
    seed_summarized(&db, "tech01", FeedCategory::Tech, 1.0).await;
    db.insert_article(&NewArticle {
        id: "pending0000000000001x".to_string(),
        url: "https://example.com/pending".to_string(),
        url_hash: hash_url("https://example.com/pending"),
        title: "Pending".to_string(),
        source_id: "bbc".to_string(),
        feed_category: FeedCategory::World,
        community_score: 0.0,
        published_at: NOW,
        collected_at: NOW,
        thumbnail_url: None,
    })
    .await
    .unwrap();
    db.log_collection("hackernews", 2, 1, None, NOW).await.unwrap();

    let config = Config::default();
    let kv = MemoryKv::new();
    let report = admin::status(&db, Some(&kv as &dyn KvStore), &config, NOW)
        .await
        .unwrap();

    assert_eq!(report.total_articles, 2);
    assert_eq!(report.unsummarized, 1);
    assert_eq!(report.today_collected, 2);
    assert_eq!(report.llm_calls_today, 0);
    assert_eq!(report.llm_daily_limit, config.llm.daily_limit);
    assert_eq!(report.recent_collect_logs.len(), 1);
    assert!(report
        .articles_by_source
        .iter()
        .any(|s| s.source_id == "hackernews" && s.count == 1));
}

#[tokio::test]
async fn test_set_quota_limit_clamps_to_valid_range() {
    let kv = MemoryKv::new();

    let stored = admin::set_quota_limit(&kv, 0).await.unwrap();
    assert_eq!(stored, 1);

    let stored = admin::set_quota_limit(&kv, 99_999).await.unwrap();
    assert_eq!(stored, 10_000);

    let limit = newsdigest::llm::configured_daily_limit(&kv, 50).await.unwrap();
    assert_eq!(limit, 10_000);
}

#[tokio::test]
async fn test_cleanup_dry_run_then_delete() {
    let db = test_db().await;
    db.insert_article(&NewArticle {
        id: "old00000000000000001x".to_string(),
        url: "https://example.com/old".to_string(),
        url_hash: hash_url("https://example.com/old"),
        title: "Old".to_string(),
        source_id: "techcrunch".to_string(),
        feed_category: FeedCategory::Tech,
        community_score: 0.0,
        published_at: NOW - 30 * 86_400,
        collected_at: NOW - 30 * 86_400,
        thumbnail_url: None,
    })
    .await
    .unwrap();

    let dry = admin::cleanup(&db, 7, true, NOW).await.unwrap();
    assert!(dry.dry_run);
    assert_eq!(dry.affected, 1);
    assert_eq!(db.count_articles().await.unwrap(), 1);

    let real = admin::cleanup(&db, 7, false, NOW).await.unwrap();
    assert!(!real.dry_run);
    assert_eq!(real.affected, 1);
    assert_eq!(db.count_articles().await.unwrap(), 0);
}
