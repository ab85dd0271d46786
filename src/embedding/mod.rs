//! Embedding collaborators.
//!
//! Concrete [`Embedder`] implementations:
//! - **[`OpenAIEmbedder`]**: OpenAI-compatible `POST {url}/embeddings`, batched, with retry.
//! - **[`OllamaEmbedder`]**: a local Ollama instance's `POST {url}/api/embed`.
//! - **`LocalEmbedder`**: fastembed inference in-process (feature `local-embeddings`).
//!
//! Use [`create_embedder`] to build the one named by the configuration.
//! Whichever is chosen is handed to the knowledge store, which uses it for
//! both indexing and queries.

#[cfg(feature = "local-embeddings")]
mod local;

#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbedder;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use deepknowledge_core::embedding::Embedder;
use serde_json::Value;
use std::sync::Arc;

use crate::config::EmbeddingConfig;
use crate::http;

/// Default OpenAI API base; `OPENAI_API_HOST` overrides it.
pub const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

/// Model names accepted by the `local` provider.
pub const LOCAL_MODELS: &[&str] = &[
    "all-minilm-l6-v2",
    "bge-small-en-v1.5",
    "bge-base-en-v1.5",
    "bge-large-en-v1.5",
    "nomic-embed-text-v1.5",
    "multilingual-e5-small",
];

/// Resolve the OpenAI-compatible base URL: config, then `OPENAI_API_HOST`,
/// then the public endpoint.
pub(crate) fn openai_base_url(configured: Option<&str>) -> String {
    configured
        .map(str::to_string)
        .or_else(|| std::env::var("OPENAI_API_HOST").ok())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| OPENAI_DEFAULT_URL.to_string())
        .trim_end_matches('/')
        .to_string()
}

/// Embedder for the OpenAI embeddings API and compatible servers.
pub struct OpenAIEmbedder {
    model: String,
    dims: usize,
    url: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIEmbedder {
    /// Build from configuration, reading the key from `OPENAI_API_KEY`.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &EmbeddingConfig, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            url: openai_base_url(config.url.as_deref()),
            api_key: api_key.into(),
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = http::post_json(
            &self.client,
            "OpenAI embeddings",
            &format!("{}/embeddings", self.url),
            Some(&self.api_key),
            &body,
            self.max_retries,
        )
        .await?;
        parse_openai_response(&json, texts.len())
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &Value, expected: usize) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
        indexed.push((index, to_f32_vec(embedding)));
    }
    indexed.sort_by_key(|(index, _)| *index);

    if indexed.len() != expected {
        bail!(
            "OpenAI returned {} embeddings for {} inputs",
            indexed.len(),
            expected
        );
    }
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

fn to_f32_vec(values: &[Value]) -> Vec<f32> {
    values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect()
}

/// Embedder backed by a local Ollama instance.
pub struct OllamaEmbedder {
    model: String,
    dims: usize,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| OLLAMA_DEFAULT_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            url,
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = http::post_json(
            &self.client,
            "Ollama embeddings",
            &format!("{}/api/embed", self.url),
            None,
            &body,
            self.max_retries,
        )
        .await?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|e| {
            e.as_array()
                .map(|values| to_f32_vec(values))
                .ok_or_else(|| anyhow!("Invalid Ollama response: embedding is not an array"))
        })
        .collect()
}

/// Create the embedder named by `config.provider`.
///
/// | Config Value | Embedder |
/// |-------------|----------|
/// | `"openai"` | [`OpenAIEmbedder`] |
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"local"` | `LocalEmbedder` (feature `local-embeddings`) |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings")]
        "local" => Ok(Arc::new(LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}
