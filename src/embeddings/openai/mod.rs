#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::config::Config;
use crate::embeddings::embedder::{
    Embedder, EmbeddingError, check_dimension, embed_in_batches, embed_one,
};
use crate::embeddings::retry::{RetryPolicy, http_agent};

/// Client for the OpenAI-compatible `/embeddings` endpoint
#[derive(Clone)]
pub struct OpenAiClient {
    endpoint: Url,
    api_key: String,
    model: String,
    batch_size: usize,
    dimension: usize,
    agent: ureq::Agent,
    retry: RetryPolicy,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("model", &self.model)
            .field("batch_size", &self.batch_size)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiClient {
    /// Build a client, reading the API key from the configured environment variable
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let env_name = &config.openai.api_key_env;
        let api_key = std::env::var(env_name)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                EmbeddingError::MissingCredentials(format!(
                    "environment variable {} is not set",
                    env_name
                ))
            })?;

        Self::with_api_key(config, api_key)
    }

    #[inline]
    pub fn with_api_key(config: &Config, api_key: String) -> Result<Self> {
        let endpoint = config
            .openai
            .embeddings_url()
            .context("Failed to build OpenAI embeddings URL")?;

        Ok(Self {
            endpoint,
            api_key,
            model: config.openai.model.clone(),
            batch_size: config.openai.batch_size.max(1),
            dimension: config.embedding.dimension,
            agent: http_agent(Duration::from_secs(config.embedding.timeout_seconds)),
            retry: RetryPolicy::from_config(&config.embedding),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = http_agent(timeout);
        self
    }

    #[inline]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Embed a fixed string and check the returned dimension
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check against {}", self.endpoint);

        let vector = self.embed("health check").context("Health check embedding failed")?;
        check_dimension(vector, self.dimension).context("Health check embedding has wrong dimension")?;

        info!(
            "Health check passed for {} with model {}",
            self.endpoint, self.model
        );
        Ok(())
    }

    fn embed_inputs(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let request = EmbeddingsRequest {
            model: &self.model,
            input: inputs,
            dimensions: self.dimension,
        };
        let request_json = serde_json::to_string(&request).map_err(|e| {
            EmbeddingError::Request(format!("Failed to serialize embedding request: {}", e))
        })?;
        let authorization = format!("Bearer {}", self.api_key);

        let response_text = self.retry.run(self.endpoint.as_str(), || {
            self.agent
                .post(self.endpoint.as_str())
                .header("Content-Type", "application/json")
                .header("Authorization", &authorization)
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let mut response: EmbeddingsResponse =
            serde_json::from_str(&response_text).map_err(|e| {
                EmbeddingError::InvalidResponse(format!(
                    "Failed to parse embedding response: {}",
                    e
                ))
            })?;

        if response.data.len() != inputs.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "Mismatch between request and response counts: {} vs {}",
                inputs.len(),
                response.data.len()
            )));
        }

        // The API does not promise response order
        response.data.sort_by_key(|item| item.index);
        if response
            .data
            .iter()
            .enumerate()
            .any(|(position, item)| item.index != position)
        {
            return Err(EmbeddingError::InvalidResponse(
                "Response indices do not cover the request".to_string(),
            ));
        }

        Ok(response.data.into_iter().map(|item| item.embedding).collect())
    }
}

impl Embedder for OpenAiClient {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        embed_one(text, |inputs| self.embed_inputs(inputs))
    }

    fn embed_batch(&self, texts: &[String]) -> Vec<Result<Vec<f32>, EmbeddingError>> {
        embed_in_batches(texts, self.batch_size, |batch| self.embed_inputs(batch))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
