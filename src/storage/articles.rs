use anyhow::Result;

use super::schema::Database;
use super::types::{
    Article, ArticleQuery, ArticleRow, ArticleSort, ArticleStatus, FeedCategory, NewArticle,
    SourceCount,
};

/// Ceiling on any single article listing query (OOM protection).
const MAX_LIST_LIMIT: i64 = 500;

impl Database {
    // ========================================================================
    // Ingest Operations
    // ========================================================================

    /// Look up an article by its URL hash. Matches across all statuses:
    /// a soft-deleted article still occupies its hash until the retention
    /// sweep hard-deletes it.
    pub async fn find_by_url_hash(&self, url_hash: &str) -> Result<Option<(String, f64)>> {
        let row: Option<(String, f64)> =
            sqlx::query_as("SELECT id, community_score FROM articles WHERE url_hash = ?")
                .bind(url_hash)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row)
    }

    /// Insert a freshly collected article with `status = 'active'` and no tags.
    pub async fn insert_article(&self, article: &NewArticle) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO articles
                (id, url, url_hash, title, source_id, feed_category, status, tags,
                 community_score, published_at, collected_at, thumbnail_url)
            VALUES (?, ?, ?, ?, ?, ?, 'active', '[]', ?, ?, ?, ?)
        "#,
        )
        .bind(&article.id)
        .bind(&article.url)
        .bind(&article.url_hash)
        .bind(&article.title)
        .bind(&article.source_id)
        .bind(article.feed_category.as_str())
        .bind(article.community_score)
        .bind(article.published_at)
        .bind(article.collected_at)
        .bind(&article.thumbnail_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Monotonic community-score ratchet: raises the stored score to the new
    /// value, never lowers it. The guard lives in SQL so concurrent duplicate
    /// sightings cannot regress the score.
    pub async fn raise_community_score(&self, id: &str, score: f64) -> Result<bool> {
        let result =
            sqlx::query("UPDATE articles SET community_score = ? WHERE id = ? AND community_score < ?")
                .bind(score)
                .bind(id)
                .bind(score)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // LLM Result Application
    // ========================================================================

    /// Persist the output of LLM processing for one article. `final_score`
    /// must have been recomputed by the scoring engine from the clamped
    /// `llm_score`; this is the only code path that writes it.
    pub async fn apply_llm_result(
        &self,
        id: &str,
        summary: Option<&str>,
        insight: Option<&str>,
        tags: &[String],
        llm_score: f64,
        final_score: f64,
    ) -> Result<bool> {
        let tags_json = serde_json::to_string(tags)?;
        let result = sqlx::query(
            "UPDATE articles SET summary = ?, insight = ?, tags = ?, llm_score = ?, final_score = ? WHERE id = ?",
        )
        .bind(summary)
        .bind(insight)
        .bind(&tags_json)
        .bind(llm_score)
        .bind(final_score)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // Digest Selection Queries
    // ========================================================================

    /// Unsummarized active articles awaiting LLM processing.
    ///
    /// Tech candidates are ordered by community score (most discussed first),
    /// world candidates by collection time (newest first), matching how each
    /// batch is consumed downstream. `collected_since` restricts scheduled
    /// runs to recent collections; `None` takes the whole backlog.
    pub async fn get_unsummarized(
        &self,
        category: FeedCategory,
        collected_since: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Article>> {
        let order = match category {
            FeedCategory::Tech => "community_score DESC",
            FeedCategory::World => "collected_at DESC",
        };
        let since = collected_since.unwrap_or(i64::MIN);
        let sql = format!(
            "SELECT * FROM articles
             WHERE feed_category = ? AND status = 'active' AND summary IS NULL AND collected_at > ?
             ORDER BY {order}, id ASC LIMIT ?"
        );
        let rows: Vec<ArticleRow> = sqlx::query_as(&sql)
            .bind(category.as_str())
            .bind(since)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(ArticleRow::into_article).collect())
    }

    /// Highest-ranked active, summarized articles for a category.
    /// Ties on final_score break by id ascending so digest contents are
    /// deterministic across runs.
    pub async fn top_ranked_summarized(
        &self,
        category: FeedCategory,
        limit: i64,
    ) -> Result<Vec<Article>> {
        let rows: Vec<ArticleRow> = sqlx::query_as(
            r#"
            SELECT * FROM articles
            WHERE feed_category = ? AND status = 'active' AND summary IS NOT NULL
            ORDER BY final_score DESC, id ASC
            LIMIT ?
        "#,
        )
        .bind(category.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ArticleRow::into_article).collect())
    }

    /// The top tagged active tech articles feeding the digest category index.
    /// Returns `(id, tags)` pairs in descending score order.
    pub async fn top_tagged_tech(&self, limit: i64) -> Result<Vec<(String, Vec<String>)>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT id, tags FROM articles
            WHERE feed_category = 'tech' AND status = 'active' AND tags != '[]'
            ORDER BY final_score DESC, id ASC
            LIMIT ?
        "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, tags)| (id, serde_json::from_str(&tags).unwrap_or_default()))
            .collect())
    }

    // ========================================================================
    // Listing / Lookup
    // ========================================================================

    /// Paginated, filtered article listing.
    pub async fn get_articles(&self, query: &ArticleQuery) -> Result<Vec<Article>> {
        let mut conditions = vec!["status = ?".to_string()];
        let status = query.status.unwrap_or(ArticleStatus::Active);

        if query.feed_category.is_some() {
            conditions.push("feed_category = ?".to_string());
        }
        if query.tag.is_some() {
            conditions.push("tags LIKE '%' || ? || '%'".to_string());
        }
        if query.search.is_some() {
            conditions.push("(title LIKE ? OR summary LIKE ?)".to_string());
        }

        let order_by = match query.sort {
            ArticleSort::Score => "final_score DESC, id ASC",
            ArticleSort::Latest => "published_at DESC, id ASC",
        };
        let limit = query.limit.unwrap_or(30).clamp(1, MAX_LIST_LIMIT);
        let offset = query.offset.unwrap_or(0).max(0);

        let sql = format!(
            "SELECT * FROM articles WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
            conditions.join(" AND "),
            order_by
        );

        let mut q = sqlx::query_as::<_, ArticleRow>(&sql).bind(status.as_str());
        if let Some(category) = query.feed_category {
            q = q.bind(category.as_str());
        }
        if let Some(tag) = &query.tag {
            // Tags are stored as a JSON array string; match the quoted form.
            q = q.bind(format!("\"{}\"", tag));
        }
        if let Some(search) = &query.search {
            let pattern = format!("%{}%", search);
            q = q.bind(pattern.clone()).bind(pattern);
        }

        let rows = q.bind(limit).bind(offset).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(ArticleRow::into_article).collect())
    }

    pub async fn get_article(&self, id: &str) -> Result<Option<Article>> {
        let row: Option<ArticleRow> = sqlx::query_as("SELECT * FROM articles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ArticleRow::into_article))
    }

    // ========================================================================
    // Status / Retention
    // ========================================================================

    /// Update an article's status. Archiving or deleting stamps `archived_at`
    /// (preserved if already set); reactivation clears it.
    pub async fn update_status(
        &self,
        id: &str,
        status: ArticleStatus,
        now: i64,
    ) -> Result<bool> {
        let result = match status {
            ArticleStatus::Active => {
                sqlx::query("UPDATE articles SET status = 'active', archived_at = NULL WHERE id = ?")
                    .bind(id)
                    .execute(&self.pool)
                    .await?
            }
            _ => {
                sqlx::query(
                    "UPDATE articles SET status = ?, archived_at = COALESCE(archived_at, ?) WHERE id = ?",
                )
                .bind(status.as_str())
                .bind(now)
                .bind(id)
                .execute(&self.pool)
                .await?
            }
        };
        Ok(result.rows_affected() > 0)
    }

    /// Retention sweep: hard-delete articles that have sat in `deleted`
    /// status past the cutoff. Frees their url_hash for re-collection.
    pub async fn purge_deleted(&self, cutoff: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM articles WHERE status = 'deleted' AND archived_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Count articles published before the cutoff that are not bookmarked
    /// (dry-run mode of the cleanup sweep).
    pub async fn count_old_unbookmarked(&self, cutoff: i64) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM articles
             WHERE published_at < ? AND id NOT IN (SELECT article_id FROM bookmarks)",
        )
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Delete articles published before the cutoff, sparing bookmarked ones.
    pub async fn delete_old_unbookmarked(&self, cutoff: i64) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM articles
             WHERE published_at < ? AND id NOT IN (SELECT article_id FROM bookmarks)",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    // ========================================================================
    // Bookmarks
    // ========================================================================

    /// Toggle a bookmark; returns true if the article is now bookmarked.
    pub async fn toggle_bookmark(&self, article_id: &str, now: i64) -> Result<bool> {
        if self.is_bookmarked(article_id).await? {
            sqlx::query("DELETE FROM bookmarks WHERE article_id = ?")
                .bind(article_id)
                .execute(&self.pool)
                .await?;
            Ok(false)
        } else {
            sqlx::query("INSERT INTO bookmarks (article_id, created_at) VALUES (?, ?)")
                .bind(article_id)
                .bind(now)
                .execute(&self.pool)
                .await?;
            Ok(true)
        }
    }

    pub async fn is_bookmarked(&self, article_id: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM bookmarks WHERE article_id = ?")
            .bind(article_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    // ========================================================================
    // Counters
    // ========================================================================

    pub async fn count_articles(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Active articles still awaiting a summary.
    pub async fn count_unsummarized(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM articles WHERE status = 'active' AND summary IS NULL",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Active article counts grouped by source, most populous first.
    pub async fn count_by_source(&self) -> Result<Vec<SourceCount>> {
        let rows: Vec<SourceCount> = sqlx::query_as(
            "SELECT source_id, COUNT(*) as count FROM articles
             WHERE status = 'active' GROUP BY source_id ORDER BY count DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
