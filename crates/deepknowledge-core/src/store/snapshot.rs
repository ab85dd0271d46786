//! Immutable, published state of a [`KnowledgeStore`](super::KnowledgeStore).

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::index::{Candidate, VectorIndex};
use crate::models::{Record, SourceKey, SourceKind};

/// A slice of a record's text with its embedding.
#[derive(Debug, Clone)]
pub struct Passage {
    /// Position of the owning record in [`IndexSnapshot::records`].
    pub record: usize,
    pub text: String,
    /// SHA-256 of `text`.
    pub hash: String,
    pub(crate) vector: Vec<f32>,
}

/// One version of the corpus together with the index built over it.
///
/// Snapshots are never mutated; ingestion builds a new one and swaps it in.
/// A reader holding an `Arc<IndexSnapshot>` keeps a consistent view for as
/// long as it needs one.
pub struct IndexSnapshot {
    pub(crate) version: u64,
    pub(crate) records: Vec<Arc<Record>>,
    pub(crate) passages: Vec<Arc<Passage>>,
    pub(crate) index: Option<Box<dyn VectorIndex>>,
    pub(crate) model: String,
    pub(crate) dims: usize,
}

impl IndexSnapshot {
    pub(crate) fn empty(model: &str, dims: usize) -> Self {
        Self {
            version: 0,
            records: Vec::new(),
            passages: Vec::new(),
            index: None,
            model: model.to_string(),
            dims,
        }
    }

    /// Publication counter; `0` is the empty store.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.iter().map(|r| r.as_ref())
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn passages(&self) -> impl Iterator<Item = &Passage> {
        self.passages.iter().map(|p| p.as_ref())
    }

    pub fn passage_count(&self) -> usize {
        self.passages.len()
    }

    /// Embedding model the index was built with.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Dimensionality of the indexed vectors.
    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, key: &SourceKey) -> bool {
        self.records
            .iter()
            .any(|r| r.kind == key.kind && r.source_ref == key.source_ref)
    }

    /// Distinct source references, optionally filtered by kind, sorted
    /// lexicographically.
    pub fn source_refs(&self, kind: Option<SourceKind>) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| kind.map_or(true, |k| r.kind == k))
            .map(|r| r.source_ref.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct sources ordered by kind, then reference.
    pub fn sources(&self) -> Vec<SourceKey> {
        self.records
            .iter()
            .map(|r| r.key())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// The record a passage was cut from.
    pub fn record_of(&self, passage: &Passage) -> &Record {
        &self.records[passage.record]
    }

    /// Rank passages by similarity to `query`, best first.
    pub(crate) fn search(&self, query: &[f32], k: usize) -> Vec<(Candidate, &Passage)> {
        let Some(index) = &self.index else {
            return Vec::new();
        };
        index
            .search(query, k)
            .into_iter()
            .filter_map(|c| self.passages.get(c.position).map(|p| (c, p.as_ref())))
            .collect()
    }
}
