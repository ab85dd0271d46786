//! In-process embeddings via fastembed (bundled ONNX Runtime).

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use deepknowledge_core::embedding::Embedder;
use std::sync::{Arc, Mutex, PoisonError};

use super::LOCAL_MODELS;
use crate::config::EmbeddingConfig;

/// Embedder running a fastembed model on the blocking thread pool.
///
/// The model is downloaded on first use and cached by fastembed.
pub struct LocalEmbedder {
    model_name: String,
    dims: usize,
    batch_size: usize,
    model: Arc<Mutex<fastembed::TextEmbedding>>,
}

impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (fastembed_model, dims) = model_for(&config.model)?;
        let model = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(fastembed_model).with_show_download_progress(true),
        )
        .map_err(|e| anyhow!("Failed to initialize local embedding model: {}", e))?;

        Ok(Self {
            model_name: config.model.clone(),
            dims,
            batch_size: config.batch_size,
            model: Arc::new(Mutex::new(model)),
        })
    }
}

fn model_for(name: &str) -> Result<(fastembed::EmbeddingModel, usize)> {
    use fastembed::EmbeddingModel::*;
    match name {
        "all-minilm-l6-v2" => Ok((AllMiniLML6V2, 384)),
        "bge-small-en-v1.5" => Ok((BGESmallENV15, 384)),
        "bge-base-en-v1.5" => Ok((BGEBaseENV15, 768)),
        "bge-large-en-v1.5" => Ok((BGELargeENV15, 1024)),
        "nomic-embed-text-v1.5" => Ok((NomicEmbedTextV15, 768)),
        "multilingual-e5-small" => Ok((MultilingualE5Small, 384)),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: {}",
            other,
            LOCAL_MODELS.join(", ")
        ),
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        let batch_size = self.batch_size;
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut model = model.lock().unwrap_or_else(PoisonError::into_inner);
            model
                .embed(texts, Some(batch_size))
                .map_err(|e| anyhow!("Local embedding failed: {}", e))
        })
        .await?
    }
}
