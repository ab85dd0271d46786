//! TOML configuration.
//!
//! Every section is optional; a missing file at the default path yields
//! [`Config::default`]. See `config/dk.example.toml` for a full example.

use anyhow::{bail, Context, Result};
use deepknowledge_core::retrieve::RetrievalParams;
use deepknowledge_core::store::StoreOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::embedding::LOCAL_MODELS;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub retrieval: RetrievalConfig,
    pub chunking: ChunkingConfig,
    pub knowledge: KnowledgeConfig,
    pub fetch: FetchConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `openai`, `ollama`, or `local`.
    pub provider: String,
    pub model: String,
    pub dims: usize,
    /// API base URL; provider default when unset.
    pub url: Option<String>,
    pub batch_size: usize,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-ada-002".to_string(),
            dims: 1536,
            url: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    /// `openai` (any OpenAI-compatible chat completions endpoint).
    pub provider: String,
    pub model: String,
    pub url: Option<String>,
    pub temperature: Option<f32>,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            url: None,
            temperature: None,
            max_retries: 3,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// Similarity cutoff; observed deployments use 0.70 to 0.75.
    pub min_score: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        let params = RetrievalParams::default();
        Self {
            top_k: params.top_k,
            min_score: params.min_score,
        }
    }
}

impl RetrievalConfig {
    pub fn params(&self) -> RetrievalParams {
        RetrievalParams {
            top_k: self.top_k,
            min_score: self.min_score,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_tokens: 700 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Websites ingested when a session starts.
    pub default_urls: Vec<String>,
    /// Directory of documents ingested when a session starts.
    pub documents_dir: Option<PathBuf>,
    pub include_globs: Vec<String>,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            default_urls: Vec::new(),
            documents_dir: None,
            include_globs: default_include_globs(),
        }
    }
}

fn default_include_globs() -> Vec<String> {
    ["pdf", "docx", "pptx", "xlsx", "txt", "md"]
        .iter()
        .map(|ext| format!("**/*.{}", ext))
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    /// Pages fetched in parallel during one ingestion call.
    pub concurrency: usize,
    pub user_agent: String,
    pub max_body_bytes: usize,
    pub max_retries: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            concurrency: 4,
            user_agent: format!("deepknowledge/{}", env!("CARGO_PKG_VERSION")),
            max_body_bytes: 10 * 1024 * 1024,
            max_retries: 2,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    /// First assistant turn of every new session; empty for none.
    pub greeting: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            greeting: "Hi! Ask me anything about the websites and documents in your \
                       knowledge base and I will answer from them, citing my sources."
                .to_string(),
        }
    }
}

impl Config {
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            max_tokens: self.chunking.max_tokens,
            batch_size: self.embedding.batch_size,
        }
    }

    /// Check ranges and provider names.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_tokens == 0 {
            bail!("chunking.max_tokens must be > 0");
        }
        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be >= 1");
        }
        if !(0.0..=1.0).contains(&self.retrieval.min_score) {
            bail!("retrieval.min_score must be in [0.0, 1.0]");
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }
        if self.fetch.concurrency == 0 {
            bail!("fetch.concurrency must be >= 1");
        }
        match self.embedding.provider.as_str() {
            "openai" | "ollama" => {
                if self.embedding.model.is_empty() {
                    bail!(
                        "embedding.model must be set when provider is '{}'",
                        self.embedding.provider
                    );
                }
            }
            "local" => {
                if !LOCAL_MODELS.contains(&self.embedding.model.as_str()) {
                    bail!(
                        "embedding.model '{}' is not a local model. Supported: {}",
                        self.embedding.model,
                        LOCAL_MODELS.join(", ")
                    );
                }
            }
            other => bail!(
                "Unknown embedding provider: '{}'. Must be openai, ollama, or local.",
                other
            ),
        }
        match self.llm.provider.as_str() {
            "openai" => {}
            other => bail!("Unknown llm provider: '{}'. Must be openai.", other),
        }
        if let Some(t) = self.llm.temperature {
            if !(0.0..=2.0).contains(&t) {
                bail!("llm.temperature must be in [0.0, 2.0]");
            }
        }
        Ok(())
    }
}

/// Parse and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Like [`load_config`], but a missing file yields defaults.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }
}
