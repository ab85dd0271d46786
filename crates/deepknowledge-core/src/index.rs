//! Vector index collaborator.
//!
//! The store hands a builder the full, ordered list of passage vectors and
//! receives an immutable index back. Positions returned by
//! [`VectorIndex::search`] refer to that input order.
//!
//! [`FlatIndex`] is the default: an exact cosine scan. An approximate
//! nearest-neighbor backend plugs in through [`VectorIndexBuilder`]
//! without touching the store.

use anyhow::{bail, Result};

use crate::embedding::cosine_similarity;

/// One ranked index entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Position of the vector in the build input.
    pub position: usize,
    /// Cosine similarity in `[-1.0, 1.0]`.
    pub similarity: f32,
}

/// An immutable, searchable set of vectors.
pub trait VectorIndex: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector dimensionality, `0` for an empty index.
    fn dims(&self) -> usize;

    /// Return at most `k` candidates ranked by descending similarity.
    ///
    /// Equal similarities must come back in build order so results are
    /// reproducible for a fixed index.
    fn search(&self, query: &[f32], k: usize) -> Vec<Candidate>;
}

/// Builds a [`VectorIndex`] from a complete vector set.
pub trait VectorIndexBuilder: Send + Sync {
    fn build(&self, vectors: Vec<Vec<f32>>) -> Result<Box<dyn VectorIndex>>;
}

/// Exact brute-force cosine index.
pub struct FlatIndex {
    vectors: Vec<Vec<f32>>,
    dims: usize,
}

impl FlatIndex {
    /// Build an index, rejecting vectors whose dimensionality disagrees
    /// with the first one.
    pub fn new(vectors: Vec<Vec<f32>>) -> Result<Self> {
        let dims = vectors.first().map(Vec::len).unwrap_or(0);
        for (i, v) in vectors.iter().enumerate() {
            if v.len() != dims {
                bail!(
                    "vector {} has {} dimensions, expected {}",
                    i,
                    v.len(),
                    dims
                );
            }
        }
        Ok(Self { vectors, dims })
    }
}

impl VectorIndex for FlatIndex {
    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn search(&self, query: &[f32], k: usize) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(position, v)| Candidate {
                position,
                similarity: cosine_similarity(query, v),
            })
            .collect();
        // sort_by is stable: ties keep build order.
        candidates.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(k);
        candidates
    }
}

/// Builder for [`FlatIndex`].
#[derive(Debug, Default, Clone, Copy)]
pub struct FlatIndexBuilder;

impl VectorIndexBuilder for FlatIndexBuilder {
    fn build(&self, vectors: Vec<Vec<f32>>) -> Result<Box<dyn VectorIndex>> {
        Ok(Box::new(FlatIndex::new(vectors)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_ranks_descending() {
        let index = FlatIndex::new(vec![
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
        ])
        .unwrap();
        let hits = index.search(&[1.0, 0.0], 3);
        let order: Vec<usize> = hits.iter().map(|c| c.position).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_ties_keep_build_order() {
        let index = FlatIndex::new(vec![vec![1.0, 0.0]; 4]).unwrap();
        let order: Vec<usize> = index.search(&[1.0, 0.0], 4).iter().map(|c| c.position).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_truncates_to_k() {
        let index = FlatIndex::new(vec![vec![1.0]; 10]).unwrap();
        assert_eq!(index.search(&[1.0], 3).len(), 3);
    }

    #[test]
    fn test_empty_index() {
        let index = FlatIndexBuilder.build(Vec::new()).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.dims(), 0);
        assert!(index.search(&[1.0, 2.0], 5).is_empty());
    }

    #[test]
    fn test_mixed_dimensions_rejected() {
        assert!(FlatIndex::new(vec![vec![1.0, 0.0], vec![1.0]]).is_err());
    }
}
