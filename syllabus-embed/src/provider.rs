//! Embedding provider implementations

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of embedding generation
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    /// The generated embeddings, one per input text
    pub embeddings: Vec<Vec<f32>>,
    /// The dimension of each embedding vector
    pub dimension: usize,
}

impl EmbeddingResult {
    /// Create a new embedding result.
    ///
    /// The dimension is inferred from the first embedding vector and is 0 for
    /// an empty result.
    pub fn new(embeddings: Vec<Vec<f32>>) -> Self {
        let dimension = embeddings.first().map(|e| e.len()).unwrap_or(0);
        Self {
            embeddings,
            dimension,
        }
    }

    /// Returns the number of embedding vectors in this result.
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// Returns `true` if this result contains no embedding vectors.
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Trait for embedding providers that can generate embeddings from text
///
/// Implementations perform one fresh computation per call: nothing is cached,
/// retried or cancelled from the outside.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a single text
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let result = self.embed_texts(&[text.to_string()]).await?;
        result
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::malformed("No embedding generated for text"))
    }

    /// Generate embeddings for multiple texts (batch processing)
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult>;

    /// Get the dimension of embeddings produced by this provider
    fn embedding_dimension(&self) -> usize;

    /// Get the name/identifier of this provider
    fn provider_name(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Embedding provider for OpenAI-compatible `/embeddings` endpoints.
///
/// Works with the hosted OpenAI API and with any server speaking the same
/// protocol (local inference servers, proxies). One HTTP request is made per
/// batch of [`EmbedConfig::batch_size`] inputs.
#[derive(Clone)]
pub struct OpenAiEmbedProvider {
    config: EmbedConfig,
    endpoint: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedProvider")
            .field("config", &self.config)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl OpenAiEmbedProvider {
    /// Creates a provider after validating the configuration.
    pub fn new(config: EmbedConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;
        let endpoint = config.embeddings_url();

        tracing::info!(
            "Embedding provider ready: model={} dimension={} endpoint={}",
            config.model_name,
            config.dimension,
            endpoint
        );

        Ok(Self {
            config,
            endpoint,
            client,
        })
    }

    /// Creates a provider from the default configuration plus environment overrides.
    pub fn from_env() -> Result<Self> {
        Self::new(EmbedConfig::from_env()?)
    }

    pub fn config(&self) -> &EmbedConfig {
        &self.config
    }

    async fn request_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            model: &self.config.model_name,
            input: batch,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::warn!("Embedding request rejected with status {}", status);
            return Err(EmbedError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_embedding_response(&text, batch.len(), self.config.dimension)
    }
}

/// Decode an `/embeddings` response body into vectors ordered like the input.
fn parse_embedding_response(
    body: &str,
    expected_count: usize,
    dimension: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut response: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|e| EmbedError::malformed(format!("invalid JSON body: {e}")))?;

    if response.data.len() != expected_count {
        return Err(EmbedError::malformed(format!(
            "expected {expected_count} embeddings, got {}",
            response.data.len()
        )));
    }

    response.data.sort_by_key(|d| d.index);

    response
        .data
        .into_iter()
        .map(|d| {
            if d.embedding.len() != dimension {
                return Err(EmbedError::DimensionMismatch {
                    expected: dimension,
                    actual: d.embedding.len(),
                });
            }
            Ok(d.embedding)
        })
        .collect()
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult::new(vec![]));
        }

        tracing::debug!("Generating embeddings for {} texts", texts.len());

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.batch_size) {
            tracing::debug!("Processing batch of {} texts", batch.len());
            all_embeddings.extend(self.request_batch(batch).await?);
        }

        tracing::debug!("Generated {} embeddings", all_embeddings.len());
        Ok(EmbeddingResult::new(all_embeddings))
    }

    fn embedding_dimension(&self) -> usize {
        self.config.dimension
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}
