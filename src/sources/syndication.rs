use chrono::DateTime;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

use super::{CollectedItem, SourceConfig, SourceError};

/// Per-request timeout.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("newsdigest/", env!("CARGO_PKG_VERSION"));

// Feeds in the wild are frequently malformed (unclosed tags, stray entities,
// mixed RSS/Atom vocabularies), so items are scanned out of the raw text with
// tolerant patterns instead of a strict XML parse. A block that matches
// nothing usable is dropped silently.

fn item_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<(?:item|entry)[\s>].*?</(?:item|entry)>").unwrap())
}

fn atom_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)<link[^>]*href=["']([^"']+)["'][^>]*/?>"#).unwrap())
}

fn media_thumbnail_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)<media:thumbnail[^>]*url=["']([^"']+)["']"#).unwrap())
}

fn enclosure_image_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)<enclosure[^>]*url=["']([^"']+)["'][^>]*type=["']image"#).unwrap()
    })
}

fn img_src_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)<img[^>]*src=["']([^"']+)["']"#).unwrap())
}

/// Extracts the text content of the first `<tag>` element, unwrapping CDATA.
fn extract_text(block: &str, tag: &str) -> Option<String> {
    // Tags come from a fixed internal set, so per-call compilation stays off
    // the hot path via this small cache.
    static CACHE: OnceLock<std::sync::Mutex<std::collections::HashMap<String, Regex>>> =
        OnceLock::new();
    let cache = CACHE.get_or_init(Default::default);
    let re = {
        let mut cache = cache.lock().unwrap();
        cache
            .entry(tag.to_string())
            .or_insert_with(|| {
                Regex::new(&format!(
                    r"(?is)<{tag}[^>]*>(?:<!\[CDATA\[)?(.*?)(?:\]\]>)?</{tag}>"
                ))
                .unwrap()
            })
            .clone()
    };
    re.captures(block)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Item link: Atom `<link href="..."/>` form first, then RSS `<link>text</link>`.
fn extract_link(block: &str) -> Option<String> {
    if let Some(captures) = atom_link_re().captures(block) {
        return Some(captures[1].to_string());
    }
    extract_text(block, "link")
}

/// Publish date fallback chain: pubDate -> updated -> published -> dc:date.
/// Unparseable candidates are skipped; `None` means the item carried no
/// usable date marker (ingest stamps collection time).
fn extract_published(block: &str) -> Option<i64> {
    ["pubDate", "updated", "published", "dc:date"]
        .iter()
        .filter_map(|tag| extract_text(block, tag))
        .find_map(|raw| parse_date(&raw))
}

fn parse_date(raw: &str) -> Option<i64> {
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.timestamp())
        .ok()
}

/// Best-effort thumbnail: media:thumbnail, then image enclosure, then the
/// first embedded `<img>`.
fn extract_thumbnail(block: &str) -> Option<String> {
    media_thumbnail_re()
        .captures(block)
        .or_else(|| enclosure_image_re().captures(block))
        .or_else(|| img_src_re().captures(block))
        .map(|c| c[1].to_string())
}

/// Unescape the HTML entities that commonly appear in feed titles.
fn unescape_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&#39;", "'")
        .replace("&quot;", "\"")
}

/// Fetch and scan a syndication (RSS/Atom) source.
///
/// Items missing a title or link are dropped silently; everything else is
/// normalized into [`CollectedItem`]s, up to the source's fetch limit.
pub async fn fetch_feed(
    client: &reqwest::Client,
    source: &SourceConfig,
) -> Result<Vec<CollectedItem>, SourceError> {
    let response = tokio::time::timeout(
        FETCH_TIMEOUT,
        client
            .get(&source.url)
            .header("User-Agent", USER_AGENT)
            .send(),
    )
    .await
    .map_err(|_| SourceError::Timeout)?
    .map_err(SourceError::Network)?;

    if !response.status().is_success() {
        return Err(SourceError::HttpStatus {
            source_id: source.id.clone(),
            status: response.status().as_u16(),
        });
    }

    let body = response.text().await.map_err(SourceError::Network)?;
    Ok(scan_items(&body, source))
}

/// Scan item blocks out of raw feed text. Separated from the fetch for
/// direct testing against fixture documents.
pub(crate) fn scan_items(body: &str, source: &SourceConfig) -> Vec<CollectedItem> {
    item_block_re()
        .find_iter(body)
        .take(source.fetch_limit)
        .filter_map(|m| {
            let block = m.as_str();
            let title = extract_text(block, "title")?;
            let url = extract_link(block)?;
            Some(CollectedItem {
                url,
                title: unescape_entities(&title),
                source_id: source.id.clone(),
                feed_category: source.feed_category,
                community_score: 0.0,
                published_at: extract_published(block),
                thumbnail_url: extract_thumbnail(block),
            })
        })
        .collect()
}
