//! Summarization orchestration: turns unsummarized articles into tagged,
//! scored, summarized ones via the completion service.
//!
//! Chunks are processed strictly sequentially with fixed sleeps in between
//! to respect the service's request-rate limits; do not parallelize this
//! without re-deriving the rate budget.

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

use super::client::{ChatMessage, CompletionClient};
use super::prompts::{build_tech_prompt, build_world_prompt};
use crate::scoring::{clamp_llm_score, ScoringConfig};
use crate::storage::{Article, Database};

/// Returned instead of a summary when no world articles were collected.
pub const WORLD_EMPTY_PLACEHOLDER: &str = "세계 뉴스가 아직 수집되지 않았습니다.";

/// Pause between consecutive chunks (request-rate limit).
const CHUNK_DELAY: Duration = Duration::from_secs(3);

const TECH_SYSTEM: &str = "당신은 기술 뉴스 분석 전문가입니다. 반드시 유효한 JSON만 반환하세요.";
const WORLD_SYSTEM: &str = "당신은 국제 뉴스 분석 전문가입니다. 반드시 유효한 JSON만 반환하세요.";
const STRICT_ARRAY_SYSTEM: &str = "반드시 유효한 JSON 배열만 반환하세요. 다른 텍스트 없이 JSON만.";
const STRICT_JSON_SYSTEM: &str = "반드시 유효한 JSON만 반환하세요. 다른 텍스트 없이 JSON만.";

/// Tally of a tech processing run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ProcessOutcome {
    /// Articles in chunks that completed end to end.
    pub processed: usize,
    /// Articles in chunks that failed (call error or double parse failure).
    pub failed: usize,
}

#[derive(Debug, Deserialize)]
struct TechResult {
    id: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    insight: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    score: f64,
}

#[derive(Debug, Deserialize)]
struct WorldResponse {
    #[serde(default)]
    world_summary: String,
    #[serde(default)]
    articles: Vec<WorldResult>,
}

#[derive(Debug, Deserialize)]
struct WorldResult {
    id: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    score: Option<f64>,
}

/// Parse a model response as JSON, tolerating a Markdown code fence around
/// the payload.
fn parse_json_response<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    let mut cleaned = text.trim();
    if let Some(rest) = cleaned.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        cleaned = rest.trim_start_matches(['\r', '\n']);
        if let Some(stripped) = cleaned.trim_end().strip_suffix("```") {
            cleaned = stripped.trim_end();
        }
    }
    serde_json::from_str(cleaned)
}

/// One completion with the parse-retry discipline: a response that fails to
/// parse triggers exactly one retry under a stricter system instruction.
async fn complete_parsed<T: DeserializeOwned>(
    llm: &CompletionClient,
    system: &str,
    strict_system: &str,
    prompt: &str,
) -> Result<T> {
    let response = llm
        .complete(&[ChatMessage::system(system), ChatMessage::user(prompt)])
        .await?;

    match parse_json_response(&response) {
        Ok(parsed) => Ok(parsed),
        Err(first_err) => {
            tracing::warn!(error = %first_err, "Malformed completion JSON, retrying with strict instruction");
            let retry = llm
                .complete(&[ChatMessage::system(strict_system), ChatMessage::user(prompt)])
                .await?;
            parse_json_response(&retry).context("completion JSON still malformed after retry")
        }
    }
}

/// Summarize, tag, and score tech articles in fixed-size chunks.
///
/// A chunk whose call errors or whose response fails to parse twice is
/// counted as failed and skipped; later chunks still run. Store errors
/// propagate as-is.
pub async fn process_tech(
    db: &Database,
    llm: &CompletionClient,
    scoring: &ScoringConfig,
    tag_vocabulary: &[String],
    chunk_size: usize,
    articles: &[Article],
    now: i64,
) -> Result<ProcessOutcome> {
    let mut outcome = ProcessOutcome::default();
    if articles.is_empty() {
        return Ok(outcome);
    }

    for (index, chunk) in articles.chunks(chunk_size.max(1)).enumerate() {
        if index > 0 {
            tokio::time::sleep(CHUNK_DELAY).await;
        }

        let prompt = build_tech_prompt(chunk, tag_vocabulary);
        let results: Vec<TechResult> =
            match complete_parsed(llm, TECH_SYSTEM, STRICT_ARRAY_SYSTEM, &prompt).await {
                Ok(results) => results,
                Err(e) => {
                    tracing::error!(chunk = index + 1, error = %e, "Tech chunk failed, skipping");
                    outcome.failed += chunk.len();
                    continue;
                }
            };

        for result in results {
            // Results are matched back to the batch by id; anything the
            // model invented is ignored.
            let Some(article) = chunk.iter().find(|a| a.id == result.id) else {
                continue;
            };
            let llm_score = clamp_llm_score(result.score);
            let final_score = scoring.final_score(
                &article.source_id,
                article.feed_category,
                article.community_score,
                llm_score,
                article.published_at,
                now,
            );
            db.apply_llm_result(
                &article.id,
                result.summary.as_deref(),
                result.insight.as_deref(),
                &result.tags,
                llm_score,
                final_score,
            )
            .await?;
        }
        outcome.processed += chunk.len();
    }

    tracing::info!(
        processed = outcome.processed,
        failed = outcome.failed,
        "Tech summarization finished"
    );
    Ok(outcome)
}

/// Summarize world articles in a single call and return the aggregate
/// 5-line situation summary.
///
/// Every updated article gets the fixed `world` tag. An empty input list
/// yields the placeholder without any call; call and double-parse failures
/// propagate to the caller.
pub async fn process_world(
    db: &Database,
    llm: &CompletionClient,
    scoring: &ScoringConfig,
    articles: &[Article],
    now: i64,
) -> Result<String> {
    if articles.is_empty() {
        return Ok(WORLD_EMPTY_PLACEHOLDER.to_string());
    }

    let prompt = build_world_prompt(articles);
    let response: WorldResponse =
        complete_parsed(llm, WORLD_SYSTEM, STRICT_JSON_SYSTEM, &prompt).await?;

    let world_tag = vec!["world".to_string()];
    for result in response.articles {
        let Some(article) = articles.iter().find(|a| a.id == result.id) else {
            continue;
        };
        let llm_score = clamp_llm_score(result.score.unwrap_or(50.0));
        let final_score = scoring.final_score(
            &article.source_id,
            article.feed_category,
            article.community_score,
            llm_score,
            article.published_at,
            now,
        );
        db.apply_llm_result(
            &article.id,
            result.summary.as_deref(),
            None,
            &world_tag,
            llm_score,
            final_score,
        )
        .await?;
    }

    Ok(response.world_summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let parsed: Vec<TechResult> =
            parse_json_response(r#"[{"id":"a","score":90,"tags":["ai"]}]"#).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, "a");
        assert_eq!(parsed[0].score, 90.0);
    }

    #[test]
    fn test_parse_fenced_json() {
        let text = "```json\n[{\"id\":\"a\"}]\n```";
        let parsed: Vec<TechResult> = parse_json_response(text).unwrap();
        assert_eq!(parsed[0].id, "a");
    }

    #[test]
    fn test_parse_fence_without_language_tag() {
        let text = "```\n{\"world_summary\":\"줄1\"}\n```";
        let parsed: WorldResponse = parse_json_response(text).unwrap();
        assert_eq!(parsed.world_summary, "줄1");
    }

    #[test]
    fn test_parse_failure_is_error() {
        let result: Result<Vec<TechResult>, _> = parse_json_response("here is your JSON: []");
        assert!(result.is_err());
    }

    #[test]
    fn test_world_response_defaults() {
        let parsed: WorldResponse = parse_json_response("{}").unwrap();
        assert_eq!(parsed.world_summary, "");
        assert!(parsed.articles.is_empty());
    }
}
