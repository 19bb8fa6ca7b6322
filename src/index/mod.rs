// Vector index module
// Exact nearest-neighbour search over chunk embeddings

#[cfg(test)]
mod tests;

pub mod store;

use tracing::debug;

use crate::{QaError, Result};

pub use store::{INDEX_DIR_NAME, IndexManifest, IndexStore};

/// A chunk's embedding together with the chunk text
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub text: String,
}

/// Search result from vector similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub text: String,
    /// Euclidean distance to the query vector
    pub distance: f32,
    /// Insertion position of the entry within the index
    pub position: usize,
}

/// In-memory index over a fixed set of entries sharing one dimension
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Build an index over `entries`, keeping their order
    #[inline]
    pub fn build(entries: Vec<IndexEntry>) -> Result<Self> {
        let Some(first) = entries.first() else {
            return Err(QaError::EmptyIndex);
        };

        let dimension = first.vector.len();
        if let Some(entry) = entries.iter().find(|e| e.vector.len() != dimension) {
            return Err(QaError::DimensionMismatch {
                expected: dimension,
                found: entry.vector.len(),
            });
        }

        debug!(
            "Built vector index with {} entries of dimension {}",
            entries.len(),
            dimension
        );

        Ok(Self { dimension, entries })
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Return the `k` entries nearest to `query` by Euclidean distance,
    /// closest first. Equal distances keep insertion order. Fewer than `k`
    /// results are returned when the index is smaller than `k`.
    #[inline]
    pub fn query(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Err(QaError::InvalidK(k));
        }

        if query.len() != self.dimension {
            return Err(QaError::DimensionMismatch {
                expected: self.dimension,
                found: query.len(),
            });
        }

        let mut scored: Vec<(f32, usize)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (squared_distance(query, &entry.vector), position))
            .collect();

        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let results: Vec<SearchResult> = scored
            .into_iter()
            .take(k)
            .map(|(squared, position)| SearchResult {
                text: self.entries[position].text.clone(),
                distance: squared.sqrt(),
                position,
            })
            .collect();

        debug!(
            "Query returned {} of {} entries (k = {})",
            results.len(),
            self.entries.len(),
            k
        );

        Ok(results)
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}
