//! Configuration for embedding providers

use crate::error::{EmbedError, Result};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Output dimension of [`DEFAULT_MODEL`].
pub const DEFAULT_DIMENSION: usize = 1536;

/// Base URL of the hosted OpenAI API.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Number of inputs sent per embeddings request.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Configuration for an OpenAI-compatible embeddings endpoint.
///
/// The dimension is part of the configuration rather than discovered at
/// runtime: the vector collection is created with it, and every vector the
/// provider returns is checked against it.
#[derive(Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
#[serde(default)]
pub struct EmbedConfig {
    /// Model identifier sent with every request
    #[builder(default = "DEFAULT_MODEL.to_string()")]
    pub model_name: String,
    /// Length of every embedding vector produced by the model
    #[builder(default = "DEFAULT_DIMENSION")]
    pub dimension: usize,
    /// API base URL; `/embeddings` is appended to it
    #[builder(default = "DEFAULT_BASE_URL.to_string()")]
    pub base_url: String,
    /// Bearer credential, if the endpoint requires one
    #[builder(default)]
    pub api_key: Option<String>,
    /// Per-request timeout; `None` leaves the HTTP client default in place
    #[builder(default)]
    pub request_timeout_secs: Option<u64>,
    /// Maximum number of texts per request
    #[builder(default = "DEFAULT_BATCH_SIZE")]
    pub batch_size: usize,
}

impl std::fmt::Debug for EmbedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbedConfig")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL.to_string(),
            dimension: DEFAULT_DIMENSION,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            request_timeout_secs: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl EmbedConfig {
    /// Create a new embedding configuration using the builder
    pub fn builder() -> EmbedConfigBuilder {
        EmbedConfigBuilder::default()
    }

    /// Default configuration for the hosted API with the given credential
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Start from the defaults and apply environment overrides.
    ///
    /// Reads `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `EMBEDDING_MODEL` and
    /// `EMBEDDING_DIMENSION`.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply environment overrides on top of this configuration.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides looked up through `lookup`, keyed by environment variable name.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL").filter(|u| !u.is_empty()) {
            self.base_url = url;
        }
        if let Some(model) = lookup("EMBEDDING_MODEL").filter(|m| !m.is_empty()) {
            self.model_name = model;
        }
        if let Some(raw) = lookup("EMBEDDING_DIMENSION") {
            self.dimension = raw.trim().parse().map_err(|_| {
                EmbedError::invalid_config(format!("EMBEDDING_DIMENSION is not a number: {raw}"))
            })?;
        }
        Ok(self)
    }

    /// Set the batch size for embedding requests (builder style)
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    /// Set the request timeout in seconds (builder style)
    pub fn with_timeout_secs(self, secs: u64) -> Self {
        Self {
            request_timeout_secs: Some(secs),
            ..self
        }
    }

    /// Full URL of the embeddings endpoint
    pub fn embeddings_url(&self) -> String {
        format!("{}/embeddings", self.base_url.trim_end_matches('/'))
    }

    /// Whether requests go to the hosted OpenAI API
    pub fn is_hosted_openai(&self) -> bool {
        self.base_url.contains("api.openai.com")
    }

    /// Check that the configuration can produce a working provider
    pub fn validate(&self) -> Result<()> {
        if self.model_name.trim().is_empty() {
            return Err(EmbedError::invalid_config("model_name must not be empty"));
        }
        if self.dimension == 0 {
            return Err(EmbedError::invalid_config("dimension must be greater than zero"));
        }
        if self.batch_size == 0 {
            return Err(EmbedError::invalid_config("batch_size must be greater than zero"));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(EmbedError::invalid_config(format!(
                "base_url must be an http(s) URL: {}",
                self.base_url
            )));
        }
        if self.is_hosted_openai() && self.api_key.is_none() {
            tracing::error!("No API key configured for {}", self.base_url);
            return Err(EmbedError::invalid_config(
                "OPENAI_API_KEY is required for the hosted OpenAI API",
            ));
        }

        tracing::debug!("Embedding configuration valid for model: {}", self.model_name);
        Ok(())
    }
}
