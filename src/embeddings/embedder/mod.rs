#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{Config, EmbeddingProvider};
use crate::embeddings::ollama::OllamaClient;
use crate::embeddings::openai::OpenAiClient;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmbeddingError {
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Embedding request failed: {0}")]
    Request(String),
    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
}

impl EmbeddingError {
    /// Fatal errors are surfaced regardless of the configured [`FailurePolicy`]
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DimensionMismatch { .. })
    }
}

/// Converts text into a vector of a fixed, process-wide dimension
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed several texts, returning exactly one result per input.
    ///
    /// Back-ends with a native batch API should override this.
    fn embed_batch(&self, texts: &[String]) -> Vec<Result<Vec<f32>, EmbeddingError>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    fn dimension(&self) -> usize;
}

impl<T: Embedder + ?Sized> Embedder for Arc<T> {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        (**self).embed(text)
    }

    fn embed_batch(&self, texts: &[String]) -> Vec<Result<Vec<f32>, EmbeddingError>> {
        (**self).embed_batch(texts)
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }
}

/// What to do when a recoverable embedding failure survives all retries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure and substitute a zero vector
    #[default]
    ZeroVector,
    /// Surface the failure to the caller
    Abort,
}

impl FailurePolicy {
    /// Validate an embedding outcome and apply the policy to a failure.
    ///
    /// Dimension mismatches are never replaced. Vectors with NaN or infinite
    /// components count as an invalid response.
    #[inline]
    pub fn resolve(
        self,
        outcome: Result<Vec<f32>, EmbeddingError>,
        dimension: usize,
    ) -> Result<Vec<f32>, EmbeddingError> {
        match outcome
            .and_then(|vector| check_dimension(vector, dimension))
            .and_then(check_finite)
        {
            Ok(vector) => Ok(vector),
            Err(error) if error.is_fatal() => Err(error),
            Err(error) => match self {
                Self::ZeroVector => {
                    warn!("Embedding failed, substituting zero vector: {}", error);
                    Ok(vec![0.0; dimension])
                }
                Self::Abort => Err(error),
            },
        }
    }
}

#[inline]
pub fn check_dimension(vector: Vec<f32>, expected: usize) -> Result<Vec<f32>, EmbeddingError> {
    if vector.len() == expected {
        Ok(vector)
    } else {
        Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: vector.len(),
        })
    }
}

#[inline]
pub fn check_finite(vector: Vec<f32>) -> Result<Vec<f32>, EmbeddingError> {
    match vector.iter().position(|value| !value.is_finite()) {
        Some(component) => Err(EmbeddingError::InvalidResponse(format!(
            "Embedding component {} is not finite",
            component
        ))),
        None => Ok(vector),
    }
}

/// Split `texts` into batches of at most `batch_size` and embed each with
/// `embed_inputs`. A failed batch reports its error for every text in it.
pub(crate) fn embed_in_batches<F>(
    texts: &[String],
    batch_size: usize,
    mut embed_inputs: F,
) -> Vec<Result<Vec<f32>, EmbeddingError>>
where
    F: FnMut(&[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>,
{
    debug!("Generating embeddings for {} texts", texts.len());

    let mut results = Vec::with_capacity(texts.len());

    for batch in texts.chunks(batch_size.max(1)) {
        match embed_inputs(batch) {
            Ok(embeddings) => results.extend(embeddings.into_iter().map(Ok)),
            Err(error) => {
                warn!("Batch of {} texts failed: {}", batch.len(), error);
                results.extend(std::iter::repeat_n(Err(error), batch.len()));
            }
        }
    }

    results
}

/// Embed one text through a batch endpoint
pub(crate) fn embed_one<F>(text: &str, embed_inputs: F) -> Result<Vec<f32>, EmbeddingError>
where
    F: FnOnce(&[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>,
{
    debug!("Generating embedding for text (length: {})", text.len());

    embed_inputs(&[text.to_string()])?
        .pop()
        .ok_or_else(|| EmbeddingError::InvalidResponse("Empty embedding response".to_string()))
}

/// The configured embedding back-end
#[derive(Debug, Clone)]
pub enum EmbeddingBackend {
    Ollama(OllamaClient),
    OpenAi(OpenAiClient),
}

impl EmbeddingBackend {
    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        match config.embedding.provider {
            EmbeddingProvider::Ollama => Ok(Self::Ollama(
                OllamaClient::new(config).context("Failed to initialize Ollama client")?,
            )),
            EmbeddingProvider::OpenAi => Ok(Self::OpenAi(
                OpenAiClient::new(config).context("Failed to initialize OpenAI client")?,
            )),
        }
    }

    #[inline]
    pub fn provider(&self) -> EmbeddingProvider {
        match self {
            Self::Ollama(_) => EmbeddingProvider::Ollama,
            Self::OpenAi(_) => EmbeddingProvider::OpenAi,
        }
    }

    #[inline]
    pub fn model(&self) -> &str {
        match self {
            Self::Ollama(client) => client.model(),
            Self::OpenAi(client) => client.model(),
        }
    }

    #[inline]
    pub fn health_check(&self) -> Result<()> {
        match self {
            Self::Ollama(client) => client.health_check(),
            Self::OpenAi(client) => client.health_check(),
        }
    }
}

impl Embedder for EmbeddingBackend {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        match self {
            Self::Ollama(client) => client.embed(text),
            Self::OpenAi(client) => client.embed(text),
        }
    }

    fn embed_batch(&self, texts: &[String]) -> Vec<Result<Vec<f32>, EmbeddingError>> {
        match self {
            Self::Ollama(client) => client.embed_batch(texts),
            Self::OpenAi(client) => client.embed_batch(texts),
        }
    }

    fn dimension(&self) -> usize {
        match self {
            Self::Ollama(client) => client.dimension(),
            Self::OpenAi(client) => client.dimension(),
        }
    }
}
