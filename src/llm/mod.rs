//! LLM summarization: quota-aware completion client, prompt builders, and
//! the chunked orchestration layer that applies results to stored articles.

mod client;
mod orchestrator;
mod prompts;

pub use client::{
    configured_daily_limit, usage_today, ChatMessage, CompletionClient, LlmError,
};
pub use orchestrator::{process_tech, process_world, ProcessOutcome, WORLD_EMPTY_PLACEHOLDER};
