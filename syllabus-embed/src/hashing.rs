//! Deterministic, network-free embedding provider.
//!
//! Every lower-cased alphanumeric token is hashed with FNV into one of
//! `dimension` buckets and the bucket counts are L2-normalized. Texts that
//! share words therefore have a positive cosine similarity, and identical texts
//! always map to identical vectors. This is a bag-of-words stand-in for a real
//! model, suitable for tests and for wiring checks without credentials.

use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingResult};
use async_trait::async_trait;
use fnv::FnvHasher;
use std::hash::Hasher;

/// Bag-of-words provider with a fixed output dimension.
#[derive(Debug, Clone)]
pub struct HashEmbedProvider {
    dimension: usize,
}

impl HashEmbedProvider {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(EmbedError::invalid_config("dimension must be greater than zero"));
        }
        Ok(Self { dimension })
    }

    /// Embed one text. Text without any alphanumeric token yields the zero vector.
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = FnvHasher::default();
            hasher.write(token.to_lowercase().as_bytes());
            let bucket = (hasher.finish() % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        let embeddings = texts.iter().map(|t| self.embed_sync(t)).collect();
        Ok(EmbeddingResult::new(embeddings))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "hash"
    }
}
