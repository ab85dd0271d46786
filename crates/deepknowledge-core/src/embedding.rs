//! Embedding collaborator trait and vector utilities.
//!
//! Concrete embedders (OpenAI-compatible, Ollama, local fastembed) live in
//! the `deepknowledge` app crate. The store owns exactly one embedder and
//! uses it for both index construction and query embedding, so the two
//! always share an embedding space.

use anyhow::Result;
use async_trait::async_trait;

/// An embedding service: text in, fixed-size vectors out.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-ada-002"`).
    fn model_name(&self) -> &str;

    /// Vector dimensionality, or `0` when the provider does not declare one.
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one vector per input in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, vectors of
/// different lengths, and zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}
