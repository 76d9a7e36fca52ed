//! Integration tests for the ingest pipeline: filtering, URL-hash dedup,
//! the community-score ratchet, collection runs, and retention.
//!
//! Each test creates its own in-memory SQLite database for isolation.

use newsdigest::ingest::{ingest, run_collect, SourceOutcome};
use newsdigest::sources::{CollectedItem, SourceConfig, SourceKind};
use newsdigest::storage::{
    ArticleQuery, ArticleStatus, Database, FeedCategory, NewArticle,
};
use newsdigest::util::hash_url;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

const NOW: i64 = 1_700_000_000;
const HOUR: i64 = 3600;
const DAY: i64 = 86_400;

async fn test_db() -> Database {
    Database::open(":memory:").await.unwrap()
}

fn tech_item(url: &str, title: &str, score: f64) -> CollectedItem {
    CollectedItem {
        url: url.to_string(),
        title: title.to_string(),
        source_id: "hackernews".to_string(),
        feed_category: FeedCategory::Tech,
        community_score: score,
        published_at: Some(NOW - HOUR),
        thumbnail_url: None,
    }
}

async fn all_articles(db: &Database) -> Vec<newsdigest::storage::Article> {
    db.get_articles(&ArticleQuery {
        limit: Some(100),
        ..Default::default()
    })
    .await
    .unwrap()
}

// ============================================================================
// Dedup & Ratchet
// ============================================================================

#[tokio::test]
async fn test_new_url_inserts_active_untagged_article() {
    let db = test_db().await;
    let outcome = ingest(&db, &[tech_item("https://example.com/a", "Title", 42.0)], NOW)
        .await
        .unwrap();
    assert_eq!(outcome.inserted, 1);
    assert_eq!(outcome.duplicates, 0);

    let articles = all_articles(&db).await;
    assert_eq!(articles.len(), 1);
    let article = &articles[0];
    assert_eq!(article.id.len(), 21);
    assert_eq!(article.status, ArticleStatus::Active);
    assert!(article.tags.is_empty());
    assert_eq!(article.community_score, 42.0);
    assert_eq!(article.collected_at, NOW);
    assert_eq!(article.url_hash, hash_url("https://example.com/a"));
}

#[tokio::test]
async fn test_duplicate_url_counts_and_ratchets_score_upward() {
    let db = test_db().await;
    let url = "https://example.com/story";

    let first = ingest(&db, &[tech_item(url, "Story", 10.0)], NOW).await.unwrap();
    assert_eq!(first.inserted, 1);

    // Second sighting with a higher score: duplicate, score ratchets up.
    let second = ingest(&db, &[tech_item(url, "Story", 50.0)], NOW).await.unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.duplicates, 1);

    let articles = all_articles(&db).await;
    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0].community_score, 50.0);
}

#[tokio::test]
async fn test_ratchet_never_lowers_score() {
    let db = test_db().await;
    let url = "https://example.com/story";

    ingest(&db, &[tech_item(url, "Story", 50.0)], NOW).await.unwrap();
    let outcome = ingest(&db, &[tech_item(url, "Story", 10.0)], NOW).await.unwrap();
    assert_eq!(outcome.duplicates, 1);

    let articles = all_articles(&db).await;
    assert_eq!(articles[0].community_score, 50.0);
}

#[tokio::test]
async fn test_duplicate_across_statuses_until_hard_delete() {
    let db = test_db().await;
    let url = "https://example.com/gone";

    ingest(&db, &[tech_item(url, "Gone", 5.0)], NOW).await.unwrap();
    let id = all_articles(&db).await[0].id.clone();

    // Soft-deleted articles still hold their hash.
    db.update_status(&id, ArticleStatus::Deleted, NOW).await.unwrap();
    let outcome = ingest(&db, &[tech_item(url, "Gone", 5.0)], NOW).await.unwrap();
    assert_eq!(outcome.duplicates, 1);
    assert_eq!(outcome.inserted, 0);

    // After the retention sweep frees the hash, the URL inserts again.
    db.purge_deleted(NOW + 1).await.unwrap();
    let outcome = ingest(&db, &[tech_item(url, "Gone", 5.0)], NOW).await.unwrap();
    assert_eq!(outcome.inserted, 1);
}

// ============================================================================
// Filters
// ============================================================================

#[tokio::test]
async fn test_stale_items_never_stored() {
    let db = test_db().await;
    let mut item = tech_item("https://example.com/old", "Old news", 100.0);
    item.published_at = Some(NOW - 49 * HOUR);

    let outcome = ingest(&db, &[item], NOW).await.unwrap();
    assert_eq!(outcome.inserted, 0);
    assert_eq!(outcome.duplicates, 0);
    assert!(all_articles(&db).await.is_empty());
}

#[tokio::test]
async fn test_excluded_title_never_stored_regardless_of_score() {
    let db = test_db().await;
    let item = tech_item("https://example.com/sb", "Super Bowl halftime recap", 9999.0);

    let outcome = ingest(&db, &[item], NOW).await.unwrap();
    assert_eq!(outcome.inserted, 0);
    assert_eq!(outcome.duplicates, 0);
    assert!(all_articles(&db).await.is_empty());
}

#[tokio::test]
async fn test_missing_publish_time_bypasses_age_check_and_stamps_now() {
    let db = test_db().await;
    let mut item = tech_item("https://example.com/undated", "Undated", 5.0);
    item.published_at = None;

    let outcome = ingest(&db, &[item], NOW).await.unwrap();
    assert_eq!(outcome.inserted, 1);
    assert_eq!(all_articles(&db).await[0].published_at, NOW);
}

// ============================================================================
// Collection Runs
// ============================================================================

fn feed_source(id: &str, url: &str) -> SourceConfig {
    SourceConfig {
        id: id.to_string(),
        name: id.to_string(),
        url: url.to_string(),
        kind: SourceKind::Feed,
        feed_category: FeedCategory::Tech,
        fetch_limit: 20,
    }
}

#[tokio::test]
async fn test_run_collect_isolates_failing_source() {
    let good = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<rss><item><title>Good</title><link>https://example.com/good</link></item></rss>"#,
        ))
        .mount(&good)
        .await;

    let bad = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&bad)
        .await;

    let db = test_db().await;
    let sources = vec![
        feed_source("goodfeed", &good.uri()),
        feed_source("badfeed", &bad.uri()),
    ];
    let client = reqwest::Client::new();

    let results = run_collect(&db, &client, &sources, None, NOW).await.unwrap();

    match &results["goodfeed"] {
        SourceOutcome::Counts(counts) => {
            assert_eq!(counts.inserted, 1);
            assert_eq!(counts.duplicates, 0);
        }
        other => panic!("Expected counts for goodfeed, got {:?}", other),
    }
    match &results["badfeed"] {
        SourceOutcome::Failed { error } => assert!(error.contains("500")),
        other => panic!("Expected failure for badfeed, got {:?}", other),
    }

    // One log row per source, with the error captured.
    let logs = db.recent_collect_logs(10).await.unwrap();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().any(|l| l.source_id == "goodfeed"
        && l.inserted_count == 1
        && l.error_message.is_none()));
    assert!(logs
        .iter()
        .any(|l| l.source_id == "badfeed" && l.error_message.is_some()));
}

#[tokio::test]
async fn test_run_collect_subset_filter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<rss><item><title>Only</title><link>https://example.com/only</link></item></rss>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let db = test_db().await;
    let sources = vec![
        feed_source("wanted", &server.uri()),
        feed_source("unwanted", "https://127.0.0.1:1/never-fetched"),
    ];
    let client = reqwest::Client::new();

    let results = run_collect(&db, &client, &sources, Some(&["wanted".to_string()]), NOW)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert!(results.contains_key("wanted"));
}

#[tokio::test]
async fn test_run_collect_retention_sweep() {
    let db = test_db().await;
    ingest(
        &db,
        &[
            tech_item("https://example.com/keep", "Keep", 1.0),
            tech_item("https://example.com/drop", "Drop", 1.0),
        ],
        NOW - 40 * DAY,
    )
    .await
    .unwrap();

    let articles = all_articles(&db).await;
    let drop_id = articles.iter().find(|a| a.title == "Drop").unwrap().id.clone();
    let keep_id = articles.iter().find(|a| a.title == "Keep").unwrap().id.clone();

    // "drop" was soft-deleted 31 days ago, "keep" only yesterday.
    db.update_status(&drop_id, ArticleStatus::Deleted, NOW - 31 * DAY)
        .await
        .unwrap();
    db.update_status(&keep_id, ArticleStatus::Deleted, NOW - DAY)
        .await
        .unwrap();

    let client = reqwest::Client::new();
    run_collect(&db, &client, &[], None, NOW).await.unwrap();

    assert!(db.get_article(&drop_id).await.unwrap().is_none());
    assert!(db.get_article(&keep_id).await.unwrap().is_some());
}

// ============================================================================
// Status Transitions & Cleanup
// ============================================================================

fn stored_article(id: &str, url: &str, published_at: i64) -> NewArticle {
    NewArticle {
        id: id.to_string(),
        url: url.to_string(),
        url_hash: hash_url(url),
        title: format!("Article {id}"),
        source_id: "techcrunch".to_string(),
        feed_category: FeedCategory::Tech,
        community_score: 0.0,
        published_at,
        collected_at: published_at,
        thumbnail_url: None,
    }
}

#[tokio::test]
async fn test_archive_stamps_archived_at_and_reactivation_clears_it() {
    let db = test_db().await;
    db.insert_article(&stored_article("art000000000000000001", "https://e.com/1", NOW))
        .await
        .unwrap();

    db.update_status("art000000000000000001", ArticleStatus::Archived, NOW)
        .await
        .unwrap();
    let article = db.get_article("art000000000000000001").await.unwrap().unwrap();
    assert_eq!(article.status, ArticleStatus::Archived);
    assert_eq!(article.archived_at, Some(NOW));

    db.update_status("art000000000000000001", ArticleStatus::Active, NOW + 10)
        .await
        .unwrap();
    let article = db.get_article("art000000000000000001").await.unwrap().unwrap();
    assert_eq!(article.status, ArticleStatus::Active);
    assert_eq!(article.archived_at, None);
}

#[tokio::test]
async fn test_cleanup_spares_bookmarked_articles() {
    let db = test_db().await;
    let old = NOW - 10 * DAY;
    db.insert_article(&stored_article("bookmarked0000000001x", "https://e.com/b", old))
        .await
        .unwrap();
    db.insert_article(&stored_article("unbookmarked00000001x", "https://e.com/u", old))
        .await
        .unwrap();
    db.toggle_bookmark("bookmarked0000000001x", NOW).await.unwrap();

    // Dry run counts without deleting.
    let count = db.count_old_unbookmarked(NOW - 7 * DAY).await.unwrap();
    assert_eq!(count, 1);
    assert_eq!(db.count_articles().await.unwrap(), 2);

    let deleted = db.delete_old_unbookmarked(NOW - 7 * DAY).await.unwrap();
    assert_eq!(deleted, 1);
    assert!(db.get_article("bookmarked0000000001x").await.unwrap().is_some());
    assert!(db.get_article("unbookmarked00000001x").await.unwrap().is_none());
}
