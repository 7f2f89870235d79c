//! Configuration for the retrieval layer
//!
//! [`RetrieverConfig`] groups the vector index, embedding and chunking
//! settings. It can be loaded from a TOML file where every section is
//! optional, then environment variables are applied on top:
//!
//! ```toml
//! embedding_provider = "openai"   # or "hash"
//!
//! [index]
//! url = "http://localhost:6333"
//! collection = "subject_materials"
//!
//! [embedding]
//! model_name = "text-embedding-3-small"
//! dimension = 1536
//!
//! [chunking]
//! chunk_size = 1000
//! overlap = 200
//! ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use syllabus_context::TextSplitter;
use syllabus_embed::EmbedConfig;

/// Collection used when none is configured.
pub const DEFAULT_COLLECTION: &str = "subject_materials";

pub const DEFAULT_QDRANT_HOST: &str = "localhost";
pub const DEFAULT_QDRANT_PORT: u16 = 6333;

/// Where the vector collection lives.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
    /// Collection dimension; defaults to the embedding dimension
    pub dimension: Option<usize>,
    /// Per-request timeout; `None` keeps the HTTP client default
    pub request_timeout_secs: Option<u64>,
}

impl std::fmt::Debug for IndexConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("collection", &self.collection)
            .field("dimension", &self.dimension)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            url: format!("http://{DEFAULT_QDRANT_HOST}:{DEFAULT_QDRANT_PORT}"),
            api_key: None,
            collection: DEFAULT_COLLECTION.to_string(),
            dimension: None,
            request_timeout_secs: None,
        }
    }
}

impl IndexConfig {
    /// Apply `QDRANT_URL`, `QDRANT_HOST`, `QDRANT_PORT` and `QDRANT_API_KEY`.
    ///
    /// `QDRANT_URL` wins when set. Otherwise, if either host or port is set,
    /// the URL becomes `http://{host}:{port}` with the missing half defaulted.
    pub fn with_overrides<F>(mut self, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("QDRANT_URL") {
            self.url = url;
        } else {
            let host = non_empty("QDRANT_HOST");
            let port = non_empty("QDRANT_PORT");
            if host.is_some() || port.is_some() {
                let port = match port {
                    Some(raw) => raw
                        .trim()
                        .parse::<u16>()
                        .with_context(|| format!("QDRANT_PORT is not a port number: {raw}"))?,
                    None => DEFAULT_QDRANT_PORT,
                };
                let host = host.unwrap_or_else(|| DEFAULT_QDRANT_HOST.to_string());
                self.url = format!("http://{host}:{port}");
            }
        }

        if let Some(key) = non_empty("QDRANT_API_KEY") {
            self.api_key = Some(key);
        }
        Ok(self)
    }
}

/// Which embedding provider to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible HTTP endpoint
    #[default]
    OpenAi,
    /// Deterministic local hashing, no network
    Hash,
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "hash" => Ok(ProviderKind::Hash),
            _ => Err(format!("Invalid embedding provider: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: syllabus_context::text::DEFAULT_CHUNK_SIZE,
            overlap: syllabus_context::text::DEFAULT_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    pub fn splitter(&self) -> anyhow::Result<TextSplitter> {
        Ok(TextSplitter::new(self.chunk_size, self.overlap)?)
    }
}

/// Everything needed to wire a retrieval service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    pub embedding_provider: ProviderKind,
    pub index: IndexConfig,
    pub embedding: EmbedConfig,
    pub chunking: ChunkingConfig,
}

impl RetrieverConfig {
    /// Parse a TOML document. Missing sections and keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        toml::from_str(raw).context("invalid retriever configuration")
    }

    /// Read `path` (or start from defaults) and apply environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                tracing::debug!("Loaded configuration from {}", path.display());
                Self::from_toml_str(&raw)?
            }
            None => Self::default(),
        };
        config.with_env_overrides()
    }

    pub fn with_env_overrides(self) -> anyhow::Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides for both the index and the embedding settings.
    pub fn with_overrides<F>(self, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            index: self.index.with_overrides(&lookup)?,
            embedding: self.embedding.with_overrides(&lookup)?,
            ..self
        })
    }

    /// Dimension the vector collection is prepared with
    pub fn collection_dimension(&self) -> usize {
        self.index.dimension.unwrap_or(self.embedding.dimension)
    }
}
