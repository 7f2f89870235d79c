//! Vector index layer
//!
//! This module owns everything between the retrieval service and the vector
//! database. It separates the backend protocol from the connection lifecycle,
//! so the service only ever talks to a [`VectorIndexClient`].
//!
//! ## Key Components
//!
//! - **VectorBackend**: the operations a vector database must provide
//! - **QdrantBackend**: Qdrant over its REST API
//! - **MemoryBackend**: in-process store with cosine similarity
//! - **VectorIndexClient**: the one-time Ready/Disabled decision plus
//!   dimension checks in front of a backend
//!
//! ## Architecture
//!
//! ```text
//! RetrievalService ── VectorIndexClient ─┬─ QdrantBackend (HTTP)
//!                      (Ready | Disabled) └─ MemoryBackend
//! ```
//!
//! ## Lifecycle
//!
//! [`VectorIndexClient::connect`] checks the backend once and creates the
//! collection if it is missing. Any failure leaves the client Disabled for
//! the rest of its life: every point operation then fails with
//! [`RetrievalError::NotReady`] and nothing reconnects later.

use crate::error::{Result, RetrievalError};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

pub mod memory;
pub mod qdrant;

pub use memory::MemoryBackend;
pub use qdrant::QdrantBackend;

/// Numeric identifier of a point in the collection.
pub type PointId = u64;

/// JSON object stored alongside each vector.
pub type Payload = serde_json::Map<String, Value>;

/// A point ready to be written: id, vector and payload.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedPoint {
    pub id: PointId,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

/// A search hit. Higher scores are more similar.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: PointId,
    pub score: f32,
    pub payload: Payload,
}

/// A point returned by a scroll, without its vector.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPoint {
    pub id: PointId,
    pub payload: Payload,
}

/// Exact-match conditions on payload fields. All set fields must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PointFilter {
    pub subject: Option<String>,
    pub document_id: Option<String>,
}

impl PointFilter {
    /// Matches every point.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn subject(subject: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            ..Self::default()
        }
    }

    pub fn document(document_id: impl Into<String>) -> Self {
        Self {
            document_id: Some(document_id.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.subject.is_none() && self.document_id.is_none()
    }

    /// Field/value pairs that must match, in a stable order.
    pub fn conditions(&self) -> Vec<(&'static str, &str)> {
        let mut conditions = Vec::new();
        if let Some(subject) = &self.subject {
            conditions.push(("subject", subject.as_str()));
        }
        if let Some(document_id) = &self.document_id {
            conditions.push(("document_id", document_id.as_str()));
        }
        conditions
    }

    pub fn matches(&self, payload: &Payload) -> bool {
        self.conditions()
            .into_iter()
            .all(|(key, value)| payload.get(key).and_then(Value::as_str) == Some(value))
    }
}

/// Operations a vector database must support.
///
/// Backends report failures as [`anyhow::Error`]; the client wraps them into
/// [`RetrievalError::Backend`] with the name of the failed operation.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Human-readable location of the collection, used in logs
    fn describe(&self) -> String;

    /// Make sure the collection exists with cosine distance and `dimension`.
    /// Returns `true` if the collection was created by this call.
    async fn ensure_collection(&self, dimension: usize) -> anyhow::Result<bool>;

    /// Insert points, overwriting any point with the same id
    async fn upsert(&self, points: Vec<IndexedPoint>) -> anyhow::Result<()>;

    /// Up to `limit` nearest points, most similar first
    async fn search(
        &self,
        vector: &[f32],
        filter: &PointFilter,
        limit: usize,
    ) -> anyhow::Result<Vec<ScoredPoint>>;

    /// Up to `limit` points matching the filter, in backend order
    async fn scroll(&self, filter: &PointFilter, limit: usize) -> anyhow::Result<Vec<StoredPoint>>;

    /// Remove points by id. Unknown ids are ignored.
    async fn delete(&self, ids: &[PointId]) -> anyhow::Result<()>;

    /// Number of points matching the filter
    async fn count(&self, filter: &PointFilter) -> anyhow::Result<usize>;
}

/// Operating state of a [`VectorIndexClient`], fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IndexState {
    Ready,
    Disabled { reason: String },
}

enum Connection {
    Ready(Arc<dyn VectorBackend>),
    Disabled(String),
}

/// Long-lived handle on the vector collection.
///
/// Built once by the application and handed to whatever needs it. The
/// Ready/Disabled flag is never written after construction, so the client can
/// be shared freely; it adds no locking of its own.
pub struct VectorIndexClient {
    connection: Connection,
    dimension: usize,
}

impl std::fmt::Debug for VectorIndexClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndexClient")
            .field("state", &self.state())
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl VectorIndexClient {
    /// Check the backend and prepare the collection.
    ///
    /// Never fails: an unreachable backend or a collection that cannot be
    /// created yields a Disabled client.
    pub async fn connect(backend: Arc<dyn VectorBackend>, dimension: usize) -> Self {
        let target = backend.describe();

        if dimension == 0 {
            return Self::disabled("collection dimension must be greater than zero");
        }

        match backend.ensure_collection(dimension).await {
            Ok(created) => {
                if created {
                    tracing::info!("Created collection {} (dimension={})", target, dimension);
                }
                tracing::info!("Vector index ready: {}", target);
                Self {
                    connection: Connection::Ready(backend),
                    dimension,
                }
            }
            Err(e) => {
                tracing::warn!("Vector index disabled, {} unavailable: {:#}", target, e);
                Self {
                    connection: Connection::Disabled(format!("{target}: {e:#}")),
                    dimension,
                }
            }
        }
    }

    /// A client that is Disabled from the start.
    pub fn disabled(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        tracing::warn!("Vector index disabled: {}", reason);
        Self {
            connection: Connection::Disabled(reason),
            dimension: 0,
        }
    }

    pub fn state(&self) -> IndexState {
        match &self.connection {
            Connection::Ready(_) => IndexState::Ready,
            Connection::Disabled(reason) => IndexState::Disabled {
                reason: reason.clone(),
            },
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.connection, Connection::Ready(_))
    }

    /// Vector length the collection was prepared with
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The backend, or [`RetrievalError::NotReady`] when Disabled.
    pub fn ensure_ready(&self) -> Result<&Arc<dyn VectorBackend>> {
        match &self.connection {
            Connection::Ready(backend) => Ok(backend),
            Connection::Disabled(reason) => Err(RetrievalError::not_ready(reason.clone())),
        }
    }

    fn check_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(RetrievalError::InvalidVector {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Insert or overwrite points by id.
    pub async fn upsert(&self, points: Vec<IndexedPoint>) -> Result<()> {
        let backend = self.ensure_ready()?;
        for point in &points {
            self.check_vector(&point.vector)?;
        }
        if points.is_empty() {
            return Ok(());
        }

        let count = points.len();
        backend
            .upsert(points)
            .await
            .map_err(|e| RetrievalError::backend("upsert", e))?;
        tracing::debug!("Upserted {} points", count);
        Ok(())
    }

    /// Nearest points to `vector`, optionally restricted by payload filter.
    pub async fn search(
        &self,
        vector: &[f32],
        filter: &PointFilter,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let backend = self.ensure_ready()?;
        self.check_vector(vector)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let hits = backend
            .search(vector, filter, limit)
            .await
            .map_err(|e| RetrievalError::backend("search", e))?;
        tracing::debug!("Search returned {} hits (limit={})", hits.len(), limit);
        Ok(hits)
    }

    /// Up to `page_size` points matching the filter.
    pub async fn scroll(&self, filter: &PointFilter, page_size: usize) -> Result<Vec<StoredPoint>> {
        let backend = self.ensure_ready()?;
        if page_size == 0 {
            return Ok(Vec::new());
        }

        backend
            .scroll(filter, page_size)
            .await
            .map_err(|e| RetrievalError::backend("scroll", e))
    }

    /// Up to `page_size` points whose payload subject equals `subject`.
    pub async fn scroll_by_subject(
        &self,
        subject: &str,
        page_size: usize,
    ) -> Result<Vec<StoredPoint>> {
        self.scroll(&PointFilter::subject(subject), page_size).await
    }

    /// Remove points by id.
    pub async fn delete(&self, ids: &[PointId]) -> Result<()> {
        let backend = self.ensure_ready()?;
        if ids.is_empty() {
            return Ok(());
        }

        backend
            .delete(ids)
            .await
            .map_err(|e| RetrievalError::backend("delete", e))?;
        tracing::debug!("Deleted {} points", ids.len());
        Ok(())
    }

    /// Number of points matching `filter`.
    pub async fn count(&self, filter: &PointFilter) -> Result<usize> {
        let backend = self.ensure_ready()?;
        backend
            .count(filter)
            .await
            .map_err(|e| RetrievalError::backend("count", e))
    }
}
