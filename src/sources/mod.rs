//! Source adapters: per-source fetchers producing normalized items.
//!
//! Two adapter kinds exist:
//!
//! - [`hackernews`] - ranked-items API (ordered id list + bounded-parallel
//!   detail fetches)
//! - [`syndication`] - tolerant RSS/Atom scanning over raw feed text
//!
//! Adapter failures are isolated per source: a failing source yields a
//! [`SourceError`] and never aborts sibling sources.

mod hackernews;
mod syndication;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::FeedCategory;

pub use hackernews::fetch_hackernews;
pub use syndication::fetch_feed;

/// How a source is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Ranked-items JSON API (id list + per-item detail endpoint)
    Api,
    /// RSS/Atom syndication feed
    Feed,
}

/// A configured news source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub name: String,
    pub url: String,
    pub kind: SourceKind,
    pub feed_category: FeedCategory,
    /// Maximum items taken from this source per collection run.
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
}

fn default_fetch_limit() -> usize {
    20
}

/// Errors raised while fetching a single source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error from {source_id}: status {status}")]
    HttpStatus { source_id: String, status: u16 },
    /// Request exceeded the fetch timeout
    #[error("Request timed out")]
    Timeout,
}

/// A normalized item produced by an adapter, pre-persistence.
///
/// No identity yet; consumed immediately by the filter and ingest stages.
#[derive(Debug, Clone)]
pub struct CollectedItem {
    pub url: String,
    pub title: String,
    pub source_id: String,
    pub feed_category: FeedCategory,
    /// Raw popularity signal (votes, points); 0 when the source has none.
    pub community_score: f64,
    /// Unix seconds; `None` when the feed carried no usable date marker.
    pub published_at: Option<i64>,
    pub thumbnail_url: Option<String>,
}

/// Fetch one source, dispatching on its kind.
pub async fn fetch_source(
    client: &reqwest::Client,
    source: &SourceConfig,
) -> Result<Vec<CollectedItem>, SourceError> {
    match source.kind {
        SourceKind::Api => fetch_hackernews(client, source).await,
        SourceKind::Feed => fetch_feed(client, source).await,
    }
}
