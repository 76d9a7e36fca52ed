use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::cache::KvStore;

/// Per-request timeout against the completion service.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Cap on a server-provided Retry-After hint.
const MAX_RETRY_AFTER_SECS: u64 = 60;

/// Wait when a 429 carries no usable Retry-After header, and before the
/// final attempt after a second 429.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// The usage counter expires two days after its last write, so stale date
/// keys clean themselves up.
const USAGE_TTL_SECS: u64 = 86_400 * 2;

/// Operator override for the daily call cap.
const DAILY_LIMIT_KEY: &str = "llm-daily-limit";

const TEMPERATURE: f64 = 0.3;
const MAX_TOKENS: u32 = 4000;

/// Errors raised by completion calls.
///
/// Quota and model-exhaustion errors are terminal and surface to the
/// operator; 429s and empty responses are handled internally by retry and
/// fallback and never propagate on their own.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The daily call cap was reached before any request was made.
    #[error("Daily LLM call limit reached ({used}/{limit}). Try again tomorrow.")]
    QuotaExceeded { used: u32, limit: u32 },

    /// Every model in the fallback chain failed or returned empty content.
    #[error("All {attempts} completion models failed; last error: {last_error}")]
    AllModelsFailed { attempts: usize, last_error: String },

    /// Network-level failure talking to the completion service.
    #[error("Completion request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Request exceeded the completion timeout.
    #[error("Completion request timed out")]
    Timeout,

    /// The usage counter store failed.
    #[error("Usage counter error: {0}")]
    Counter(String),
}

/// One chat message in a completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Why a single model attempt was abandoned (drives fallback, not surfaced).
enum ModelFailure {
    Status { status: u16, body: String },
    EmptyResponse,
}

/// Quota-aware client for the external chat-completion service with an
/// ordered model fallback chain.
pub struct CompletionClient {
    client: reqwest::Client,
    base_url: String,
    models: Vec<String>,
    api_key: SecretString,
    kv: Option<Arc<dyn KvStore>>,
    default_daily_limit: u32,
}

/// Today's usage counter key (UTC date).
fn usage_key() -> String {
    format!("llm-usage-{}", Utc::now().format("%Y-%m-%d"))
}

/// Successful completion calls recorded today.
pub async fn usage_today(kv: &dyn KvStore) -> Result<u32, LlmError> {
    let value = kv
        .get(&usage_key())
        .await
        .map_err(|e| LlmError::Counter(e.to_string()))?;
    Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
}

/// The daily cap: operator override from the store, else `default`.
pub async fn configured_daily_limit(kv: &dyn KvStore, default: u32) -> Result<u32, LlmError> {
    let value = kv
        .get(DAILY_LIMIT_KEY)
        .await
        .map_err(|e| LlmError::Counter(e.to_string()))?;
    Ok(value.and_then(|v| v.parse().ok()).unwrap_or(default))
}

impl CompletionClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        models: Vec<String>,
        api_key: SecretString,
        kv: Option<Arc<dyn KvStore>>,
        default_daily_limit: u32,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            models,
            api_key,
            kv,
            default_daily_limit,
        }
    }

    /// Successful calls recorded today. No counter store means 0.
    pub async fn daily_count(&self) -> Result<u32, LlmError> {
        match &self.kv {
            Some(kv) => usage_today(kv.as_ref()).await,
            None => Ok(0),
        }
    }

    /// The configured daily cap: operator override from the store, else the
    /// configured default.
    pub async fn daily_limit(&self) -> Result<u32, LlmError> {
        match &self.kv {
            Some(kv) => configured_daily_limit(kv.as_ref(), self.default_daily_limit).await,
            None => Ok(self.default_daily_limit),
        }
    }

    /// Store an operator override for the daily cap.
    pub async fn set_daily_limit(kv: &dyn KvStore, limit: u32) -> anyhow::Result<()> {
        kv.put(DAILY_LIMIT_KEY, &limit.to_string(), None).await
    }

    /// Read-then-write counter bump. Not atomic: two concurrent calls near
    /// the limit can both pass the pre-check. The cap is a soft budget, so
    /// best-effort is accepted here.
    async fn increment_daily_count(&self) -> Result<(), LlmError> {
        let Some(kv) = &self.kv else { return Ok(()) };
        let next = self.daily_count().await? + 1;
        kv.put(&usage_key(), &next.to_string(), Some(USAGE_TTL_SECS))
            .await
            .map_err(|e| LlmError::Counter(e.to_string()))
    }

    /// Run one completion, walking the model fallback chain.
    ///
    /// The quota pre-check happens before any HTTP request: at or over the
    /// cap, the call fails immediately with zero requests made. Each model
    /// gets up to three attempts on 429 (honoring Retry-After, capped at
    /// 60s); any other non-success status or an empty body advances to the
    /// next model. A successful non-empty response bumps the usage counter
    /// and returns the content.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        if self.kv.is_some() {
            let used = self.daily_count().await?;
            let limit = self.daily_limit().await?;
            if used >= limit {
                return Err(LlmError::QuotaExceeded { used, limit });
            }
        }

        let mut last_error = String::from("no models configured");

        for (index, model) in self.models.iter().enumerate() {
            match self.try_model(model, messages).await? {
                Ok(content) => {
                    self.increment_daily_count().await?;
                    return Ok(content);
                }
                Err(ModelFailure::Status { status, body }) => {
                    tracing::warn!(
                        model = %model,
                        index = index,
                        status = status,
                        "Completion model failed, trying next fallback"
                    );
                    last_error = format!("{} returned status {}: {}", model, status, body);
                }
                Err(ModelFailure::EmptyResponse) => {
                    tracing::warn!(
                        model = %model,
                        index = index,
                        "Completion model returned empty content, trying next fallback"
                    );
                    last_error = format!("{} returned empty content", model);
                }
            }
        }

        Err(LlmError::AllModelsFailed {
            attempts: self.models.len(),
            last_error,
        })
    }

    /// One model's attempt cycle. The outer `Result` carries errors that
    /// abort the whole call (network failures); the inner one reports
    /// failures that merely advance the fallback chain.
    async fn try_model(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<Result<String, ModelFailure>, LlmError> {
        let mut response = self.post_completion(model, messages).await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let wait = retry_after_secs(&response);
            tracing::warn!(model = %model, wait_secs = wait, "Rate limited, backing off");
            tokio::time::sleep(Duration::from_secs(wait)).await;
            response = self.post_completion(model, messages).await?;

            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                tokio::time::sleep(Duration::from_secs(DEFAULT_RETRY_AFTER_SECS)).await;
                response = self.post_completion(model, messages).await?;
            }
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Ok(Err(ModelFailure::Status { status, body }));
        }

        let parsed: CompletionResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Ok(Err(ModelFailure::EmptyResponse));
        }

        Ok(Ok(content))
    }

    async fn post_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<reqwest::Response, LlmError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let request = CompletionRequest {
            model,
            messages,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        tokio::time::timeout(
            REQUEST_TIMEOUT,
            self.client
                .post(&url)
                .bearer_auth(self.api_key.expose_secret())
                .json(&request)
                .send(),
        )
        .await
        .map_err(|_| LlmError::Timeout)?
        .map_err(LlmError::Network)
    }
}

/// Parse the Retry-After hint from a 429, capped at 60s, defaulting to 5s.
fn retry_after_secs(response: &reqwest::Response) -> u64 {
    response
        .headers()
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(|secs| secs.min(MAX_RETRY_AFTER_SECS))
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}
