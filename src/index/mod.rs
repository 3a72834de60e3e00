// Flat vector index
// Chunks paired by position with fixed-length vectors, searched by exact L2 distance


pub mod snapshot;

use itertools::Itertools;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::embeddings::chunking::{Chunk, DocumentId};

/// A chunk and its embedding, as handed to [`VectorIndex::add`]
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// Search result from vector similarity search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub similarity_score: f32,
    pub distance: f32,
}

/// A document known to the index, in order of first appearance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub document_id: DocumentId,
    pub chunk_count: usize,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("Vector for entry {position} has {actual} dimensions, index expects {expected}")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        position: usize,
    },
    #[error("Query vector has {actual} dimensions, index expects {expected}")]
    QueryDimensionMismatch { expected: usize, actual: usize },
    #[error("Vector for entry {position} contains a non-finite value")]
    NonFinite { position: usize },
}

/// Exact nearest-neighbour index over Euclidean distance.
///
/// Vectors are stored row-major in one flat buffer. Row `i` of the buffer
/// always belongs to `chunks[i]`; every mutation either keeps that pairing
/// or rebuilds both sides together.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    chunks: Vec<Chunk>,
    vectors: Vec<f32>,
}

/// Convert an L2 distance into a score in `(0, 1]`
#[inline]
pub fn similarity_from_distance(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .fold(0.0_f32, |acc, (x, y)| {
            let diff = x - y;
            diff.mul_add(diff, acc)
        })
        .sqrt()
}

impl VectorIndex {
    /// Create an empty index for vectors of `dimension` components.
    ///
    /// # Panics
    /// If `dimension` is zero.
    #[inline]
    pub fn new(dimension: usize) -> Self {
        assert!(dimension > 0, "vector dimension must be positive");
        Self {
            dimension,
            chunks: Vec::new(),
            vectors: Vec::new(),
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored entries
    #[inline]
    pub fn count(&self) -> usize {
        self.chunks.len()
    }

    /// Number of stored vectors, always equal to [`Self::count`]
    #[inline]
    pub fn vector_count(&self) -> usize {
        self.vectors.len() / self.dimension
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[inline]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// The vector stored at `position`, if any
    #[inline]
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.vectors.get(start..start + self.dimension)
    }

    /// Iterate over chunk/vector pairs in insertion order
    #[inline]
    pub fn entries(&self) -> impl Iterator<Item = (&Chunk, &[f32])> {
        self.chunks
            .iter()
            .zip(self.vectors.chunks_exact(self.dimension))
    }

    /// Append a batch of entries.
    ///
    /// Every vector is checked for length and finiteness before anything is
    /// stored, so a rejected batch leaves the index untouched.
    #[inline]
    pub fn add(&mut self, entries: Vec<IndexEntry>) -> Result<(), IndexError> {
        if let Some((position, entry)) = entries
            .iter()
            .enumerate()
            .find(|(_, entry)| entry.vector.len() != self.dimension)
        {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: entry.vector.len(),
                position,
            });
        }
        if let Some(position) = entries
            .iter()
            .position(|entry| entry.vector.iter().any(|value| !value.is_finite()))
        {
            return Err(IndexError::NonFinite { position });
        }

        let added = entries.len();
        self.chunks.reserve(added);
        self.vectors.reserve(added * self.dimension);

        for entry in entries {
            self.vectors.extend_from_slice(&entry.vector);
            self.chunks.push(entry.chunk);
        }

        self.assert_aligned();
        debug!("Added {} entries, index now holds {}", added, self.count());
        Ok(())
    }

    /// Return the `k` entries closest to `query`, nearest first.
    ///
    /// Equal distances keep insertion order.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::QueryDimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let k = k.min(self.count());
        if k == 0 {
            return Ok(Vec::new());
        }

        let nearest = self
            .vectors
            .chunks_exact(self.dimension)
            .map(|vector| l2_distance(query, vector))
            .enumerate()
            .k_smallest_by(k, |(pos_a, dist_a), (pos_b, dist_b)| {
                dist_a.total_cmp(dist_b).then(pos_a.cmp(pos_b))
            });

        let results: Vec<SearchResult> = nearest
            .filter_map(|(position, distance)| {
                self.chunks.get(position).map(|chunk| SearchResult {
                    chunk: chunk.clone(),
                    similarity_score: similarity_from_distance(distance),
                    distance,
                })
            })
            .collect();

        debug!(
            "Search over {} entries returned {} results",
            self.count(),
            results.len()
        );
        Ok(results)
    }

    /// Remove every entry belonging to `document_id`.
    ///
    /// The retained entries are copied into fresh buffers in their original
    /// order. Returns the number of entries removed; an unknown document
    /// removes nothing.
    #[inline]
    pub fn remove(&mut self, document_id: &DocumentId) -> usize {
        if !self.contains_document(document_id) {
            return 0;
        }

        let before = self.count();
        let mut chunks = Vec::with_capacity(before);
        let mut vectors = Vec::with_capacity(self.vectors.len());

        for (chunk, vector) in self.entries() {
            if chunk.document_id != *document_id {
                chunks.push(chunk.clone());
                vectors.extend_from_slice(vector);
            }
        }

        self.chunks = chunks;
        self.vectors = vectors;
        self.assert_aligned();

        let removed = before - self.count();
        debug!("Removed {} entries for document {}", removed, document_id);
        removed
    }

    #[inline]
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.vectors.clear();
    }

    #[inline]
    pub fn contains_document(&self, document_id: &DocumentId) -> bool {
        self.chunks
            .iter()
            .any(|chunk| chunk.document_id == *document_id)
    }

    /// Chunks of one document in insertion order
    #[inline]
    pub fn document_chunks(&self, document_id: &DocumentId) -> Vec<Chunk> {
        self.chunks
            .iter()
            .filter(|chunk| chunk.document_id == *document_id)
            .cloned()
            .collect()
    }

    /// Documents in order of first appearance, with their chunk counts
    #[inline]
    pub fn documents(&self) -> Vec<DocumentSummary> {
        self.chunks
            .iter()
            .map(|chunk| &chunk.document_id)
            .counts()
            .into_iter()
            .map(|(document_id, chunk_count)| DocumentSummary {
                document_id: document_id.clone(),
                chunk_count,
            })
            .sorted_by_key(|summary| self.first_position(&summary.document_id))
            .collect()
    }

    fn first_position(&self, document_id: &DocumentId) -> usize {
        self.chunks
            .iter()
            .position(|chunk| chunk.document_id == *document_id)
            .unwrap_or(usize::MAX)
    }

    fn assert_aligned(&self) {
        assert_eq!(
            self.vectors.len(),
            self.chunks.len() * self.dimension,
            "chunk and vector arrays out of alignment"
        );
    }
}
