//! Abstract key-value collaborator used for the daily LLM usage counter and
//! the latest-digest read cache.
//!
//! The pipeline treats this store as external: callers hold an
//! `Option<Arc<dyn KvStore>>` and degrade gracefully when it is absent
//! (quota checks pass, cache refreshes are skipped).

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Get/put-with-expiry key-value store.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch a value; expired entries read as `None`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value, optionally expiring after `ttl_seconds`.
    async fn put(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()>;
}

/// In-memory `KvStore` with lazy expiry. Used in tests and as a stand-in
/// when no persistent store is configured.
#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, (String, Option<i64>)>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().await;
        let now = Utc::now().timestamp();
        if let Some((value, expires_at)) = entries.get(key).cloned() {
            if expires_at.map(|t| t <= now).unwrap_or(false) {
                entries.remove(key);
                return Ok(None);
            }
            return Ok(Some(value));
        }
        Ok(None)
    }

    async fn put(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()> {
        let expires_at = ttl_seconds.map(|ttl| Utc::now().timestamp() + ttl as i64);
        self.entries
            .lock()
            .await
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }
}
