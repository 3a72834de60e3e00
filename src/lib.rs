use thiserror::Error;

pub type Result<T> = std::result::Result<T, DocbotError>;

#[derive(Error, Debug)]
pub enum DocbotError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Chunking error: {0}")]
    Chunking(#[from] embeddings::ChunkingError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] embeddings::EmbeddingError),

    #[error("Ingestion error: {0}")]
    Ingestion(#[from] retrieval::IngestionError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] index::snapshot::SnapshotError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod embeddings;
pub mod index;
pub mod retrieval;
