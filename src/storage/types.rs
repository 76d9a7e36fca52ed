use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process has the database locked
    #[error("The database is locked by another process. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        // SQLITE_CANTOPEN (14): unable to open database file
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Enums
// ============================================================================

/// Top-level feed classification driving filter rules and score weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedCategory {
    Tech,
    World,
}

impl FeedCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedCategory::Tech => "tech",
            FeedCategory::World => "world",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tech" => Some(FeedCategory::Tech),
            "world" => Some(FeedCategory::World),
            _ => None,
        }
    }
}

/// Article lifecycle status. Transitions are one-directional except
/// reactivation (archived/deleted -> active), which is an explicit
/// administrative action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    Active,
    Archived,
    Deleted,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Active => "active",
            ArticleStatus::Archived => "archived",
            ArticleStatus::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ArticleStatus::Active),
            "archived" => Some(ArticleStatus::Archived),
            "deleted" => Some(ArticleStatus::Deleted),
            _ => None,
        }
    }
}

/// Digest slot: two digests per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edition {
    Am,
    Pm,
}

impl Edition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Edition::Am => "am",
            Edition::Pm => "pm",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "am" => Some(Edition::Am),
            "pm" => Some(Edition::Pm),
            _ => None,
        }
    }
}

impl std::fmt::Display for Edition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Persistent Records
// ============================================================================

/// A stored news article. Timestamps are unix seconds (UTC).
///
/// `final_score` is always derived by the scoring engine when `llm_score`
/// changes; it is never written directly by callers.
#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub id: String,
    pub url: String,
    pub url_hash: String,
    pub title: String,
    pub source_id: String,
    pub feed_category: FeedCategory,
    pub status: ArticleStatus,
    pub tags: Vec<String>,
    pub summary: Option<String>,
    pub insight: Option<String>,
    pub community_score: f64,
    pub llm_score: f64,
    pub final_score: f64,
    pub published_at: i64,
    pub collected_at: i64,
    pub archived_at: Option<i64>,
    pub thumbnail_url: Option<String>,
}

/// Internal row type for article queries (sqlx FromRow); enum and tag
/// columns are stored as TEXT and converted in `into_article()`.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ArticleRow {
    pub id: String,
    pub url: String,
    pub url_hash: String,
    pub title: String,
    pub source_id: String,
    pub feed_category: String,
    pub status: String,
    pub tags: String,
    pub summary: Option<String>,
    pub insight: Option<String>,
    pub community_score: f64,
    pub llm_score: f64,
    pub final_score: f64,
    pub published_at: i64,
    pub collected_at: i64,
    pub archived_at: Option<i64>,
    pub thumbnail_url: Option<String>,
}

impl ArticleRow {
    pub(crate) fn into_article(self) -> Article {
        // Unknown category/status text maps to the most conservative value
        // rather than failing the whole query.
        let feed_category = FeedCategory::parse(&self.feed_category).unwrap_or(FeedCategory::World);
        let status = ArticleStatus::parse(&self.status).unwrap_or(ArticleStatus::Deleted);
        let tags: Vec<String> = serde_json::from_str(&self.tags).unwrap_or_default();
        Article {
            id: self.id,
            url: self.url,
            url_hash: self.url_hash,
            title: self.title,
            source_id: self.source_id,
            feed_category,
            status,
            tags,
            summary: self.summary,
            insight: self.insight,
            community_score: self.community_score,
            llm_score: self.llm_score,
            final_score: self.final_score,
            published_at: self.published_at,
            collected_at: self.collected_at,
            archived_at: self.archived_at,
            thumbnail_url: self.thumbnail_url,
        }
    }
}

/// Insert payload for a newly collected article.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub id: String,
    pub url: String,
    pub url_hash: String,
    pub title: String,
    pub source_id: String,
    pub feed_category: FeedCategory,
    pub community_score: f64,
    pub published_at: i64,
    pub collected_at: i64,
    pub thumbnail_url: Option<String>,
}

/// A compiled digest snapshot, immutable per `{date}-{edition}` key.
#[derive(Debug, Clone, Serialize)]
pub struct Digest {
    pub id: String,
    pub date: String,
    pub edition: Edition,
    pub tech_top_ids: Vec<String>,
    pub world_summary: String,
    pub world_top_ids: Vec<String>,
    /// Tag -> up to 5 article ids in descending final-score order.
    pub categories: BTreeMap<String, Vec<String>>,
    pub created_at: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct DigestRow {
    pub id: String,
    pub date: String,
    pub edition: String,
    pub tech_top_ids: String,
    pub world_summary: String,
    pub world_top_ids: String,
    pub categories: String,
    pub created_at: i64,
}

impl DigestRow {
    pub(crate) fn into_digest(self) -> Digest {
        Digest {
            id: self.id,
            date: self.date,
            edition: Edition::parse(&self.edition).unwrap_or(Edition::Am),
            tech_top_ids: serde_json::from_str(&self.tech_top_ids).unwrap_or_default(),
            world_summary: self.world_summary,
            world_top_ids: serde_json::from_str(&self.world_top_ids).unwrap_or_default(),
            categories: serde_json::from_str(&self.categories).unwrap_or_default(),
            created_at: self.created_at,
        }
    }
}

/// One row per source per completed collection run.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CollectLog {
    pub id: i64,
    pub source_id: String,
    pub inserted_count: i64,
    pub duplicate_count: i64,
    pub error_message: Option<String>,
    pub created_at: i64,
}

/// Active article count per source, for status reporting.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SourceCount {
    pub source_id: String,
    pub count: i64,
}

// ============================================================================
// Query Options
// ============================================================================

/// Sort order for article listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArticleSort {
    /// Most recently published first
    #[default]
    Latest,
    /// Highest final score first
    Score,
}

/// Filter/pagination options for `Database::get_articles`.
#[derive(Debug, Clone, Default)]
pub struct ArticleQuery {
    pub feed_category: Option<FeedCategory>,
    pub status: Option<ArticleStatus>,
    pub tag: Option<String>,
    pub search: Option<String>,
    pub sort: ArticleSort,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trip() {
        assert_eq!(FeedCategory::parse("tech"), Some(FeedCategory::Tech));
        assert_eq!(FeedCategory::parse("world"), Some(FeedCategory::World));
        assert_eq!(FeedCategory::parse("sports"), None);
        assert_eq!(FeedCategory::Tech.as_str(), "tech");
    }

    #[test]
    fn test_status_round_trip() {
        for s in ["active", "archived", "deleted"] {
            assert_eq!(ArticleStatus::parse(s).unwrap().as_str(), s);
        }
        assert_eq!(ArticleStatus::parse("purged"), None);
    }

    #[test]
    fn test_edition_round_trip() {
        assert_eq!(Edition::parse("am"), Some(Edition::Am));
        assert_eq!(Edition::parse("pm"), Some(Edition::Pm));
        assert_eq!(Edition::parse("noon"), None);
    }

    #[test]
    fn test_article_row_tolerates_bad_tags_json() {
        let row = ArticleRow {
            id: "a".into(),
            url: "https://example.com".into(),
            url_hash: "h".into(),
            title: "t".into(),
            source_id: "hackernews".into(),
            feed_category: "tech".into(),
            status: "active".into(),
            tags: "not json".into(),
            summary: None,
            insight: None,
            community_score: 0.0,
            llm_score: 0.0,
            final_score: 0.0,
            published_at: 0,
            collected_at: 0,
            archived_at: None,
            thumbnail_url: None,
        };
        let article = row.into_article();
        assert!(article.tags.is_empty());
        assert_eq!(article.feed_category, FeedCategory::Tech);
    }
}
