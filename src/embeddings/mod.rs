// Embeddings module
// Chunking of extracted text and the embedding back-ends that turn chunks into vectors

pub mod chunking;
pub mod embedder;
pub mod ollama;
pub mod openai;
pub mod retry;

pub use chunking::{Chunk, ChunkingConfig, ChunkingError, DocumentId, split_document};
pub use embedder::{
    Embedder, EmbeddingBackend, EmbeddingError, FailurePolicy, check_dimension, check_finite,
};
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
pub use retry::RetryPolicy;
