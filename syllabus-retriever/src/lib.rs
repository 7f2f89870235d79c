//! syllabus-retriever: subject-scoped semantic retrieval
//!
//! This crate stores text in a vector index keyed by subject and answers
//! similarity queries scoped to a subject. Text is embedded with a
//! [`syllabus_embed::EmbeddingProvider`], identified by a content-addressed
//! point id and upserted into a vector collection (Qdrant, or in memory).
//!
//! ## Key Modules
//!
//! - **[`service`]**: add/search/materials/delete operations
//! - **[`index`]**: vector backends and the Ready/Disabled index client
//! - **[`identity`]**: deterministic point ids
//! - **[`ingest`]**: chunking and indexing collaborator text (pages, transcripts)
//! - **[`config`]**: TOML + environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use syllabus_retriever::{config::RetrieverConfig, service::RetrievalService};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = RetrieverConfig::load(None)?;
//! let service = RetrievalService::from_config(&config).await?;
//!
//! service
//!     .add_document("math", "Derivatives measure rate of change.", None, None)
//!     .await?;
//! let hits = service.search_similar("rate of change", Some("math"), 5).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! text → Chunker (optional) → Embedder → point id → VectorIndexClient.upsert
//! query → Embedder → VectorIndexClient.search(subject filter) → SearchResult
//! ```

pub mod config;
pub mod error;
pub mod identity;
pub mod index;
pub mod ingest;
pub mod service;

pub use error::{Result, RetrievalError};
