//! # syllabus-embed
//!
//! Text embedding providers for the syllabus retrieval layer. The embedding
//! model is treated as an opaque function from text to a fixed-length vector;
//! this crate wraps that function behind one async trait so the retriever does
//! not care whether vectors come from a hosted API or a local stand-in.
//!
//! ## Quick Start
//!
//! ```no_run
//! use syllabus_embed::{EmbedConfig, EmbeddingProvider, OpenAiEmbedProvider};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = OpenAiEmbedProvider::new(EmbedConfig::openai("sk-..."))?;
//!
//! let vector = provider.embed_text("Derivatives measure rate of change.").await?;
//! assert_eq!(vector.len(), provider.embedding_dimension());
//! # Ok(())
//! # }
//! ```
//!
//! ## Providers
//!
//! - [`OpenAiEmbedProvider`]: any OpenAI-compatible `/embeddings` endpoint
//! - [`HashEmbedProvider`]: deterministic bag-of-words vectors, no network
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`] using the crate's [`EmbedError`] type.
//! A failed call is never retried; the error reaches the caller of the
//! operation that needed the embedding.

pub mod config;
pub mod error;
pub mod hashing;
pub mod provider;

// Re-export main types for easy access
pub use config::{EmbedConfig, EmbedConfigBuilder};
pub use error::{EmbedError, Result};
pub use hashing::HashEmbedProvider;
pub use provider::{EmbeddingProvider, EmbeddingResult, OpenAiEmbedProvider};
