//! Similarity retrieval with a post-ranking score cutoff.
//!
//! # Algorithm
//!
//! 1. Pin the store's current snapshot for the whole call.
//! 2. Embed the query with the store's own embedder.
//! 3. Rank every indexed passage by cosine similarity and keep the top `k`.
//! 4. Drop candidates below `min_score` from that top slice.
//! 5. Resolve provenance from each passage's record.
//!
//! The cutoff runs after ranking: a low-scoring passage can never be
//! replaced by a lower-ranked one that happens to clear the threshold.

use tracing::debug;

use crate::error::{RagError, Result};
use crate::models::RetrievalHit;
use crate::store::KnowledgeStore;

/// Retrieval tuning parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalParams {
    /// Maximum hits returned.
    pub top_k: usize,
    /// Minimum similarity a hit must reach, in `[0.0, 1.0]`.
    pub min_score: f64,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_score: 0.70,
        }
    }
}

/// Return the passages most similar to `query`, best first.
///
/// An empty result is not an error: it means nothing in the store is
/// relevant enough. Returns [`RagError::RetrievalFailed`] if the query
/// cannot be embedded or its embedding does not match the index.
pub async fn retrieve(
    store: &KnowledgeStore,
    query: &str,
    params: &RetrievalParams,
) -> Result<Vec<RetrievalHit>> {
    let snapshot = store.snapshot();
    if params.top_k == 0 || query.trim().is_empty() || snapshot.passage_count() == 0 {
        return Ok(Vec::new());
    }

    let embedder = store.embedder();
    if embedder.model_name() != snapshot.model() {
        return Err(RagError::RetrievalFailed(format!(
            "query model '{}' does not match index model '{}'",
            embedder.model_name(),
            snapshot.model()
        )));
    }

    let query_vec = embedder
        .embed(&[query.to_string()])
        .await
        .map_err(|e| RagError::RetrievalFailed(format!("{:#}", e)))?
        .into_iter()
        .next()
        .ok_or_else(|| RagError::RetrievalFailed("empty embedding response".to_string()))?;
    if query_vec.len() != snapshot.dims() {
        return Err(RagError::RetrievalFailed(format!(
            "query embedding has {} dimensions, index has {}",
            query_vec.len(),
            snapshot.dims()
        )));
    }

    let ranked = snapshot.search(&query_vec, params.top_k);
    let ranked_len = ranked.len();
    let hits: Vec<RetrievalHit> = ranked
        .into_iter()
        .map(|(candidate, passage)| (score_of(candidate.similarity), passage))
        .filter(|(score, _)| *score >= params.min_score)
        .map(|(score, passage)| {
            let record = snapshot.record_of(passage);
            RetrievalHit {
                score,
                source_ref: record.source_ref.clone(),
                kind: record.kind,
                text: passage.text.clone(),
            }
        })
        .collect();

    debug!(
        version = snapshot.version(),
        ranked = ranked_len,
        kept = hits.len(),
        min_score = params.min_score,
        "retrieved passages"
    );
    Ok(hits)
}

/// Map a cosine similarity onto `[0.0, 1.0]`.
fn score_of(similarity: f32) -> f64 {
    f64::from(similarity).clamp(0.0, 1.0)
}
