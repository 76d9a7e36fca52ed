//! Configuration file parser for newsdigest.toml.
//!
//! The config file is optional — a missing file yields `Config::default()`,
//! which carries the built-in source list and scoring tables. Unknown
//! top-level keys are silently ignored by serde, though we log a warning
//! when the file contains potential typos.

use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use url::Url;

use crate::scoring::ScoringConfig;
use crate::sources::{SourceConfig, SourceKind};
use crate::storage::FeedCategory;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds the maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid source '{id}': {reason}")]
    InvalidSource { id: String, reason: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// LLM orchestration settings.
///
/// The API key can come from the `NEWSDIGEST_API_KEY` env var (takes
/// precedence) or the config file; it is handed out as a `SecretString`
/// and masked in `Debug` output.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the chat-completions service.
    pub base_url: String,

    /// Ordered model fallback chain: earlier entries are preferred, later
    /// ones are cheaper-reliability or paid fallbacks.
    pub models: Vec<String>,

    /// Default daily call cap, used when the operator has not stored an
    /// override in the counter store.
    pub daily_limit: u32,

    /// Articles per completion request.
    pub chunk_size: usize,

    /// Category tags the prompt offers the model. 1-2 are assigned per
    /// article.
    pub tag_vocabulary: Vec<String>,

    /// API key (alternative to the NEWSDIGEST_API_KEY env var).
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            models: vec![
                "qwen/qwen3-next-80b-a3b-instruct:free".to_string(),
                "google/gemma-3-27b-it:free".to_string(),
                "upstage/solar-pro-3:free".to_string(),
                "meta-llama/llama-3.3-70b-instruct:free".to_string(),
                "google/gemini-2.0-flash-001".to_string(),
            ],
            daily_limit: 50,
            chunk_size: 25,
            tag_vocabulary: vec![
                "ai".to_string(),
                "frontend".to_string(),
                "backend".to_string(),
                "infra".to_string(),
                "startup".to_string(),
                "security".to_string(),
                "mobile".to_string(),
                "general".to_string(),
            ],
            api_key: None,
        }
    }
}

/// Mask the API key in Debug output to prevent secret leakage.
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("models", &self.models)
            .field("daily_limit", &self.daily_limit)
            .field("chunk_size", &self.chunk_size)
            .field("tag_vocabulary", &self.tag_vocabulary)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be
/// specified. Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database path.
    pub database_path: String,

    /// News sources to collect from.
    pub sources: Vec<SourceConfig>,

    /// Scoring normalization and weighting tables.
    pub scoring: ScoringConfig,

    /// LLM orchestration settings.
    pub llm: LlmConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "newsdigest.db".to_string(),
            sources: default_sources(),
            scoring: ScoringConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

/// The built-in source list: a ranked-items API source plus syndication
/// feeds across both categories.
fn default_sources() -> Vec<SourceConfig> {
    let feed = |id: &str, name: &str, url: &str, category: FeedCategory| SourceConfig {
        id: id.to_string(),
        name: name.to_string(),
        url: url.to_string(),
        kind: SourceKind::Feed,
        feed_category: category,
        fetch_limit: 20,
    };

    vec![
        SourceConfig {
            id: "hackernews".to_string(),
            name: "Hacker News".to_string(),
            url: "https://hacker-news.firebaseio.com/v0".to_string(),
            kind: SourceKind::Api,
            feed_category: FeedCategory::Tech,
            fetch_limit: 30,
        },
        feed(
            "techcrunch",
            "TechCrunch",
            "https://techcrunch.com/feed/",
            FeedCategory::Tech,
        ),
        feed(
            "theverge",
            "The Verge",
            "https://www.theverge.com/rss/index.xml",
            FeedCategory::Tech,
        ),
        feed(
            "geeknews",
            "GeekNews",
            "https://news.hada.io/rss/news",
            FeedCategory::Tech,
        ),
        feed(
            "cloudflare",
            "Cloudflare Blog",
            "https://blog.cloudflare.com/rss/",
            FeedCategory::Tech,
        ),
        feed(
            "yozm",
            "Yozm IT",
            "https://yozm.wishket.com/magazine/list-rss/",
            FeedCategory::Tech,
        ),
        feed(
            "reuters",
            "Reuters",
            "https://feeds.reuters.com/reuters/topNews",
            FeedCategory::World,
        ),
        feed(
            "bbc",
            "BBC World",
            "https://feeds.bbci.co.uk/news/world/rss.xml",
            FeedCategory::World,
        ),
        feed(
            "yonhap",
            "Yonhap News",
            "https://www.yonhapnewstv.co.kr/browse/feed/",
            FeedCategory::World,
        ),
    ]
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse the TOML content first as a raw table to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = ["database_path", "sources", "scoring", "llm"];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            sources = config.sources.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Reject sources whose URL is not http(s): collection would fail on
    /// every run and the typo is easier to catch at startup.
    fn validate(&self) -> Result<(), ConfigError> {
        for source in &self.sources {
            let parsed = Url::parse(&source.url).map_err(|e| ConfigError::InvalidSource {
                id: source.id.clone(),
                reason: e.to_string(),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidSource {
                    id: source.id.clone(),
                    reason: format!("unsupported URL scheme '{}'", parsed.scheme()),
                });
            }
        }
        Ok(())
    }

    /// The LLM API key: env var takes precedence over the config file.
    /// `None` means LLM processing degrades to placeholder output.
    pub fn api_key(&self) -> Option<SecretString> {
        std::env::var("NEWSDIGEST_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.llm.api_key.clone())
            .map(SecretString::from)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database_path, "newsdigest.db");
        assert!(config.sources.iter().any(|s| s.id == "hackernews"));
        assert!(config.sources.iter().any(|s| s.feed_category == FeedCategory::World));
        assert_eq!(config.llm.daily_limit, 50);
        assert_eq!(config.llm.chunk_size, 25);
        assert_eq!(config.llm.models.len(), 5);
        assert!(config.llm.tag_vocabulary.contains(&"ai".to_string()));
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/newsdigest_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.database_path, "newsdigest.db");
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let dir = std::env::temp_dir().join("newsdigest_config_test_partial");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("newsdigest.toml");
        std::fs::write(&path, "database_path = \"/var/lib/news.db\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.database_path, "/var/lib/news.db");
        assert!(!config.sources.is_empty()); // defaults kept
        assert_eq!(config.llm.daily_limit, 50);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_source_and_llm_sections() {
        let dir = std::env::temp_dir().join("newsdigest_config_test_full");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("newsdigest.toml");

        let content = r#"
database_path = "digest.db"

[[sources]]
id = "myblog"
name = "My Blog"
url = "https://blog.example.com/feed.xml"
kind = "feed"
feed_category = "tech"
fetch_limit = 10

[llm]
base_url = "https://llm.example.com/v1"
models = ["primary-model", "fallback-model"]
daily_limit = 10
chunk_size = 5
api_key = "file-key"

[scoring]
default_norm = 25.0

[scoring.community_norms]
myblog = 15.0

[scoring.feed_weights]
tech = 1.0
world = 0.5
"#;
        std::fs::write(&path, content).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].id, "myblog");
        assert_eq!(config.sources[0].fetch_limit, 10);
        assert_eq!(config.llm.models, vec!["primary-model", "fallback-model"]);
        assert_eq!(config.llm.daily_limit, 10);
        assert_eq!(config.scoring.default_norm, 25.0);
        assert_eq!(config.scoring.community_norms.get("myblog"), Some(&15.0));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let dir = std::env::temp_dir().join("newsdigest_config_test_invalid");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("newsdigest.toml");
        std::fs::write(&path, "this is not [valid toml").unwrap();

        let result = Config::load(&path);
        assert!(matches!(result, Err(ConfigError::Parse(_))));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_source_url_rejected() {
        let dir = std::env::temp_dir().join("newsdigest_config_test_badurl");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("newsdigest.toml");
        let content = r#"
[[sources]]
id = "broken"
name = "Broken"
url = "ftp://example.com/feed"
kind = "feed"
feed_category = "tech"
"#;
        std::fs::write(&path, content).unwrap();

        let result = Config::load(&path);
        assert!(matches!(result, Err(ConfigError::InvalidSource { .. })));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("newsdigest_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("newsdigest.toml");
        let content = "a".repeat(1_048_577);
        std::fs::write(&path, content).unwrap();

        let result = Config::load(&path);
        assert!(matches!(result, Err(ConfigError::TooLarge(_))));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_debug_masks_api_key() {
        let mut config = Config::default();
        config.llm.api_key = Some("super-secret-key-12345".to_string());

        let debug_output = format!("{:?}", config);
        assert!(
            !debug_output.contains("super-secret-key-12345"),
            "Debug output should not contain the API key"
        );
        assert!(debug_output.contains("[REDACTED]"));
    }
}
