// Retrieval engine
// Chunk, embed and index documents; answer queries against the shared index


use parking_lot::RwLock;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::embeddings::chunking::{
    Chunk, ChunkingConfig, ChunkingError, DocumentId, split_document,
};
use crate::embeddings::embedder::{Embedder, EmbeddingError, FailurePolicy};
use crate::index::snapshot::{self, SnapshotError};
use crate::index::{DocumentSummary, IndexEntry, IndexError, SearchResult, VectorIndex};

/// Behaviour knobs for a [`RetrievalEngine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub chunking: ChunkingConfig,
    pub failure_policy: FailurePolicy,
    pub default_top_k: usize,
}

impl Default for EngineOptions {
    #[inline]
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            failure_policy: FailurePolicy::default(),
            default_top_k: 5,
        }
    }
}

impl EngineOptions {
    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunking: config.chunking.clone(),
            failure_policy: config.embedding.failure_policy,
            default_top_k: config.retrieval.default_top_k,
        }
    }
}

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    #[error("Failed to embed chunk {position_index} of document {document_id}: {source}")]
    Embedding {
        document_id: DocumentId,
        position_index: usize,
        #[source]
        source: EmbeddingError,
    },
    #[error("Failed to index document {document_id}: {source}")]
    Index {
        document_id: DocumentId,
        #[source]
        source: IndexError,
    },
    #[error("Document {document_id} is already indexed with different content; remove it before re-ingesting")]
    Conflict { document_id: DocumentId },
    #[error("Index dimension {index} does not match embedder dimension {embedder}")]
    DimensionMismatch { index: usize, embedder: usize },
}

/// Owns an embedder and the vector index it feeds.
///
/// Embedding runs outside the index lock. Each `add`, `remove` and `search`
/// holds the lock for its whole duration, so readers never see a partly
/// applied batch.
#[derive(Debug)]
pub struct RetrievalEngine<E: Embedder> {
    embedder: E,
    index: RwLock<VectorIndex>,
    options: EngineOptions,
}

impl<E: Embedder> RetrievalEngine<E> {
    /// Create an engine with an empty index sized for `embedder`
    #[inline]
    pub fn new(embedder: E, options: EngineOptions) -> Self {
        let index = VectorIndex::new(embedder.dimension());
        Self {
            embedder,
            index: RwLock::new(index),
            options,
        }
    }

    /// Create an engine around a previously built index
    #[inline]
    pub fn with_index(
        embedder: E,
        index: VectorIndex,
        options: EngineOptions,
    ) -> Result<Self, IngestionError> {
        if index.dimension() != embedder.dimension() {
            return Err(IngestionError::DimensionMismatch {
                index: index.dimension(),
                embedder: embedder.dimension(),
            });
        }

        Ok(Self {
            embedder,
            index: RwLock::new(index),
            options,
        })
    }

    /// Chunk, embed and index a document.
    ///
    /// Re-ingesting a document with the same chunk texts returns the stored
    /// chunks without embedding. Different content under an indexed ID is a
    /// [`IngestionError::Conflict`]. On error nothing is added to the index.
    #[inline]
    pub fn ingest(
        &self,
        document_text: &str,
        document_id: &DocumentId,
    ) -> Result<Vec<Chunk>, IngestionError> {
        let chunks = split_document(document_text, document_id, &self.options.chunking)?;
        if chunks.is_empty() {
            return Err(ChunkingError::EmptyDocument(document_id.clone()).into());
        }

        let existing = reuse_indexed(&self.index.read(), document_id, &chunks)?;
        if let Some(existing) = existing {
            info!(
                "Document {} is already indexed ({} chunks)",
                document_id,
                existing.len()
            );
            return Ok(existing);
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let dimension = self.embedder.dimension();
        let outcomes = self.embedder.embed_batch(&texts);
        if outcomes.len() != chunks.len() {
            return Err(IngestionError::Embedding {
                document_id: document_id.clone(),
                position_index: outcomes.len().min(chunks.len()),
                source: EmbeddingError::InvalidResponse(format!(
                    "Expected {} embeddings, got {}",
                    chunks.len(),
                    outcomes.len()
                )),
            });
        }

        let mut entries = Vec::with_capacity(chunks.len());
        for (chunk, outcome) in chunks.iter().zip(outcomes) {
            let vector = self
                .options
                .failure_policy
                .resolve(outcome, dimension)
                .map_err(|source| IngestionError::Embedding {
                    document_id: document_id.clone(),
                    position_index: chunk.position_index,
                    source,
                })?;
            entries.push(IndexEntry {
                chunk: chunk.clone(),
                vector,
            });
        }

        let mut index = self.index.write();
        if let Some(existing) = reuse_indexed(&index, document_id, &chunks)? {
            debug!("Document {} was indexed concurrently", document_id);
            return Ok(existing);
        }
        index
            .add(entries)
            .map_err(|source| IngestionError::Index {
                document_id: document_id.clone(),
                source,
            })?;
        drop(index);

        info!("Ingested document {} ({} chunks)", document_id, chunks.len());
        Ok(chunks)
    }

    /// Return the `top_k` chunks nearest to `query_text`.
    ///
    /// Under [`FailurePolicy::ZeroVector`] a failed query embedding is replaced
    /// by the zero vector, which ranks entries by their own magnitude.
    #[inline]
    pub fn query(
        &self,
        query_text: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<SearchResult>, EmbeddingError> {
        let top_k = top_k.unwrap_or(self.options.default_top_k);
        if top_k == 0 || self.index.read().is_empty() {
            return Ok(Vec::new());
        }

        let dimension = self.embedder.dimension();
        let query_vector = self
            .options
            .failure_policy
            .resolve(self.embedder.embed(query_text), dimension)?;

        // resolve() has already checked length and finiteness against the
        // embedder, whose dimension the index shares, so search cannot reject it
        let results = self.index.read().search(&query_vector, top_k);
        results.map_err(|error| {
            warn!("Query rejected by index: {}", error);
            query_error(error)
        })
    }

    /// Remove a document's chunks; returns how many were removed
    #[inline]
    pub fn evict(&self, document_id: &DocumentId) -> usize {
        let removed = self.index.write().remove(document_id);
        if removed > 0 {
            info!("Evicted document {} ({} chunks)", document_id, removed);
        } else {
            debug!("Document {} not indexed, nothing to evict", document_id);
        }
        removed
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.index.read().count()
    }

    #[inline]
    pub fn documents(&self) -> Vec<DocumentSummary> {
        self.index.read().documents()
    }

    #[inline]
    pub fn clear(&self) {
        self.index.write().clear();
    }

    /// A consistent copy of the current index
    #[inline]
    pub fn snapshot(&self) -> VectorIndex {
        self.index.read().clone()
    }

    #[inline]
    pub fn save_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<(), SnapshotError> {
        let index = self.index.read();
        snapshot::save(&index, path)
    }

    #[inline]
    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    #[inline]
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }
}

fn query_error(error: IndexError) -> EmbeddingError {
    match error {
        IndexError::QueryDimensionMismatch { expected, actual }
        | IndexError::DimensionMismatch {
            expected, actual, ..
        } => EmbeddingError::DimensionMismatch { expected, actual },
        IndexError::NonFinite { .. } => EmbeddingError::InvalidResponse(error.to_string()),
    }
}

/// Stored chunks for `document_id` when it is indexed with the same texts.
fn reuse_indexed(
    index: &VectorIndex,
    document_id: &DocumentId,
    chunks: &[Chunk],
) -> Result<Option<Vec<Chunk>>, IngestionError> {
    if !index.contains_document(document_id) {
        return Ok(None);
    }

    let existing = index.document_chunks(document_id);
    let unchanged = existing
        .iter()
        .map(|chunk| &chunk.text)
        .eq(chunks.iter().map(|chunk| &chunk.text));
    if unchanged {
        Ok(Some(existing))
    } else {
        Err(IngestionError::Conflict {
            document_id: document_id.clone(),
        })
    }
}
