use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::time::Duration;

use super::{CollectedItem, SourceConfig, SourceError};

/// Stories below this score are not worth collecting.
const MIN_SCORE: i64 = 10;

/// Concurrent detail fetches in flight at once.
const DETAIL_CONCURRENCY: usize = 10;

/// Per-request timeout.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// One item from the detail endpoint. Fields are optional because the API
/// returns partial objects for dead/deleted items.
#[derive(Debug, Deserialize)]
struct RankedItem {
    title: Option<String>,
    url: Option<String>,
    score: Option<i64>,
    time: Option<i64>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Fetch the ranked-items API source (Hacker News shaped).
///
/// Reads the ordered id list at `{url}/topstories.json`, then fans out
/// bounded-parallel detail fetches for the first `fetch_limit` ids. Only
/// externally linked stories at or above the score floor survive. Detail
/// fetch failures drop that item silently; only the id-list fetch can fail
/// the source.
pub async fn fetch_hackernews(
    client: &reqwest::Client,
    source: &SourceConfig,
) -> Result<Vec<CollectedItem>, SourceError> {
    let list_url = format!("{}/topstories.json", source.url.trim_end_matches('/'));

    let response = tokio::time::timeout(FETCH_TIMEOUT, client.get(&list_url).send())
        .await
        .map_err(|_| SourceError::Timeout)?
        .map_err(SourceError::Network)?;

    if !response.status().is_success() {
        return Err(SourceError::HttpStatus {
            source_id: source.id.clone(),
            status: response.status().as_u16(),
        });
    }

    let ids: Vec<i64> = response.json().await.map_err(SourceError::Network)?;
    let top_ids: Vec<i64> = ids.into_iter().take(source.fetch_limit).collect();

    let base = source.url.trim_end_matches('/').to_string();
    let items: Vec<Option<RankedItem>> = stream::iter(top_ids)
        .map(|id| {
            let client = client.clone();
            let url = format!("{}/item/{}.json", base, id);
            async move {
                let response = tokio::time::timeout(FETCH_TIMEOUT, client.get(&url).send())
                    .await
                    .ok()?
                    .ok()?;
                if !response.status().is_success() {
                    return None;
                }
                response.json::<RankedItem>().await.ok()
            }
        })
        .buffered(DETAIL_CONCURRENCY)
        .collect()
        .await;

    let collected = items
        .into_iter()
        .flatten()
        .filter_map(|item| {
            let url = item.url?;
            let title = item.title?;
            if item.kind.as_deref() != Some("story") {
                return None;
            }
            let score = item.score.unwrap_or(0);
            if score < MIN_SCORE {
                return None;
            }
            Some(CollectedItem {
                url,
                title,
                source_id: source.id.clone(),
                feed_category: source.feed_category,
                community_score: score as f64,
                published_at: item.time,
                thumbnail_url: None,
            })
        })
        .collect();

    Ok(collected)
}
