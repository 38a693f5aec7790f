use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

use crate::search::SimilarityMetric;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chatrag: ChatragConfig,
    pub embeddings: EmbeddingsConfig,
    pub completion: CompletionConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub http_server: HttpServerConfig,
}

/// Process-level settings
#[derive(Debug, Clone, Deserialize)]
pub struct ChatragConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ChatragConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Embeddings configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    pub provider: String,
    pub model: String,
    pub api_key_env: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub batch_size: usize,
    /// Requested output dimension; `None` keeps the model's native size.
    #[serde(default)]
    pub dimensions: Option<usize>,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub similarity: SimilarityMetric,
}

/// Chat completion configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionConfig {
    pub model: String,
    pub api_key_env: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,
}

/// Chunking policy, in characters
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_k")]
    pub default_k: usize,
    /// Upper bound on assembled context size; 0 disables the bound.
    #[serde(default)]
    pub max_context_chars: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
            max_context_chars: 0,
        }
    }
}

/// Chat dispatch configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// User id of the bot itself, used to recognise mentions.
    #[serde(default)]
    pub bot_user_id: Option<String>,
    #[serde(default = "default_reset_keyword")]
    pub reset_keyword: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            bot_user_id: None,
            reset_keyword: default_reset_keyword(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default = "default_http_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default)]
    pub authless: bool,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            port: default_http_port(),
            api_key_env: default_http_api_key_env(),
            allowed_origins: Vec::new(),
            authless: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_completion_timeout() -> u64 {
    60
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_k() -> usize {
    4
}

fn default_reset_keyword() -> String {
    "delete".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_http_api_key_env() -> String {
    "CHATRAG_API_KEY".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in CHATRAG_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("CHATRAG_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        Self::from_toml_str(&config_str)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse config.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        for env_name in [&self.embeddings.api_key_env, &self.completion.api_key_env] {
            std::env::var(env_name).with_context(|| {
                format!(
                    "Environment variable {} not set. Set it in your .env file or as an environment variable with your OpenAI API key.",
                    env_name
                )
            })?;
        }

        if self.embeddings.provider != "openai" {
            anyhow::bail!(
                "embeddings.provider '{}' is not supported (expected \"openai\")",
                self.embeddings.provider
            );
        }

        if self.embeddings.batch_size == 0 {
            anyhow::bail!("embeddings.batch_size must be greater than 0");
        }

        if self.embeddings.dimensions == Some(0) {
            anyhow::bail!("embeddings.dimensions must be greater than 0 when set");
        }

        if self.embeddings.timeout_secs == 0 || self.completion.timeout_secs == 0 {
            anyhow::bail!("timeout_secs must be greater than 0");
        }

        if self.search.default_k == 0 {
            anyhow::bail!("search.default_k must be greater than 0");
        }

        if self.chat.reset_keyword.trim().is_empty() {
            anyhow::bail!("chat.reset_keyword must not be empty");
        }

        if self.chunking.chunk_size == 0 {
            anyhow::bail!("chunking.chunk_size must be greater than 0");
        }

        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            anyhow::bail!("chunking.chunk_overlap must be less than chunking.chunk_size");
        }

        Ok(())
    }

    /// Read the embedding API key named by `embeddings.api_key_env`.
    pub fn embeddings_api_key(&self) -> Result<String> {
        read_key(&self.embeddings.api_key_env)
    }

    /// Read the completion API key named by `completion.api_key_env`.
    pub fn completion_api_key(&self) -> Result<String> {
        read_key(&self.completion.api_key_env)
    }
}

fn read_key(env_name: &str) -> Result<String> {
    std::env::var(env_name).with_context(|| format!("Environment variable {} not set", env_name))
}
