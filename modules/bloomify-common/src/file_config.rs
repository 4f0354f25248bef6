use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::BloomifyError;

/// TOML-backed configuration loaded from disk.
/// Secrets (API keys, DB URL) stay as env vars.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FileConfig {
    pub models: ModelsConfig,
    pub chat: ChatConfig,
    pub timeouts: TimeoutsConfig,
    pub card: CardConfig,
    pub recommend: RecommendConfig,
    pub search: SearchConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ModelsConfig {
    pub generation: String,
    pub embedding: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            generation: "gemini-1.5-flash".to_string(),
            embedding: "text-embedding-004".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ChatConfig {
    /// Messages of recent history fed back into the prompt.
    pub history_limit: usize,
    /// Hard cap on the candidate set offered to the model.
    pub max_candidates: usize,
    /// Rows pulled from the catalog before fallback filtering.
    pub fallback_pool_size: usize,
    /// Budget multiplier applied on the fallback path.
    pub budget_slack: f64,
    /// Knowledge-base snippets added to the prompt.
    pub knowledge_count: usize,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub reply_language: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_limit: 10,
            max_candidates: 8,
            fallback_pool_size: 24,
            budget_slack: 1.1,
            knowledge_count: 3,
            temperature: 0.35,
            max_output_tokens: 400,
            reply_language: "Indonesian".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TimeoutsConfig {
    pub store_secs: u64,
    pub embedding_secs: u64,
    pub generation_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            store_secs: 10,
            embedding_secs: 15,
            generation_secs: 45,
        }
    }
}

impl TimeoutsConfig {
    pub fn store(&self) -> Duration {
        Duration::from_secs(self.store_secs)
    }

    pub fn embedding(&self) -> Duration {
        Duration::from_secs(self.embedding_secs)
    }

    pub fn generation(&self) -> Duration {
        Duration::from_secs(self.generation_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CardConfig {
    pub cache_ttl_secs: u64,
    pub default_occasion: String,
    pub default_recipient: String,
    pub default_max_words: u32,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 7 * 24 * 3600,
            default_occasion: "anniversary".to_string(),
            default_recipient: "partner".to_string(),
            default_max_words: 35,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RecommendConfig {
    pub cache_ttl_secs: u64,
    /// Catalog rows offered for recommendations.
    pub catalog_size: usize,
    /// Catalog rows offered as upsell add-ons.
    pub upsell_pool_size: usize,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 7 * 24 * 3600,
            catalog_size: 20,
            upsell_pool_size: 50,
            temperature: 0.7,
            max_output_tokens: 600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SearchConfig {
    pub default_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { default_k: 24 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            allowed_origins: Vec::new(),
        }
    }
}

impl FileConfig {
    /// Reject values the chat pipeline cannot work with.
    pub fn validate(&self) -> Result<(), BloomifyError> {
        if self.chat.max_candidates == 0 {
            return Err(BloomifyError::Config("chat.max_candidates must be > 0".to_string()));
        }
        if self.chat.history_limit == 0 {
            return Err(BloomifyError::Config("chat.history_limit must be > 0".to_string()));
        }
        if self.chat.fallback_pool_size < self.chat.max_candidates {
            return Err(BloomifyError::Config(
                "chat.fallback_pool_size must be >= chat.max_candidates".to_string(),
            ));
        }
        if !(self.chat.budget_slack.is_finite() && self.chat.budget_slack >= 1.0) {
            return Err(BloomifyError::Config("chat.budget_slack must be >= 1.0".to_string()));
        }
        if self.recommend.catalog_size == 0 || self.recommend.upsell_pool_size == 0 {
            return Err(BloomifyError::Config(
                "recommend.catalog_size and recommend.upsell_pool_size must be > 0".to_string(),
            ));
        }
        if self.timeouts.store_secs == 0
            || self.timeouts.embedding_secs == 0
            || self.timeouts.generation_secs == 0
        {
            return Err(BloomifyError::Config("timeouts must be > 0 seconds".to_string()));
        }
        Ok(())
    }
}

/// Parse TOML config text.
pub fn parse_config(content: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(content).context("Failed to parse config")?;
    config.validate()?;
    Ok(config)
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Invalid config file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.chat.max_candidates, 8);
        assert_eq!(config.chat.history_limit, 10);
        assert_eq!(config.models.generation, "gemini-1.5-flash");
        assert_eq!(config.card.cache_ttl_secs, 604_800);
        assert_eq!(config.recommend.catalog_size, 20);
        assert_eq!(config.recommend.max_output_tokens, 600);
    }

    #[test]
    fn empty_recommendation_catalog_is_invalid() {
        assert!(parse_config("[recommend]\ncatalog_size = 0\n").is_err());
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = parse_config(
            r#"
            [chat]
            max_candidates = 5
            reply_language = "English"
            "#,
        )
        .unwrap();
        assert_eq!(config.chat.max_candidates, 5);
        assert_eq!(config.chat.reply_language, "English");
        assert_eq!(config.chat.fallback_pool_size, 24);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse_config("[chat]\nmax_candidate = 5\n").is_err());
    }

    #[test]
    fn zero_candidates_is_invalid() {
        assert!(parse_config("[chat]\nmax_candidates = 0\n").is_err());
    }

    #[test]
    fn budget_slack_below_one_is_invalid() {
        assert!(parse_config("[chat]\nbudget_slack = 0.9\n").is_err());
    }

    #[test]
    fn timeouts_convert_to_durations() {
        let config = parse_config("[timeouts]\ngeneration_secs = 60\n").unwrap();
        assert_eq!(config.timeouts.generation(), Duration::from_secs(60));
        assert_eq!(config.timeouts.store(), Duration::from_secs(10));
    }

    #[test]
    fn shipped_config_parses() {
        let config = parse_config(include_str!("../../../config/bloomify.toml")).unwrap();
        assert!(config.server.allowed_origins.is_empty());
        assert_eq!(config.search.default_k, 24);
    }
}
