//! newsdigest: a news aggregation and digest pipeline.
//!
//! Heterogeneous feeds are collected into normalized items, filtered,
//! deduplicated by URL hash into a SQLite article store, ranked by a
//! deterministic score blending community popularity, LLM relevance, and
//! recency decay, summarized through a quota-aware LLM orchestration layer
//! with model fallback, and periodically snapshotted into immutable,
//! idempotently-keyed digests.
//!
//! All operations are short-lived, externally triggered tasks — there are
//! no persistent background threads. See [`admin`] for the entry points.

pub mod admin;
pub mod cache;
pub mod config;
pub mod digest;
pub mod filter;
pub mod ingest;
pub mod llm;
pub mod scoring;
pub mod sources;
pub mod storage;
pub mod util;
