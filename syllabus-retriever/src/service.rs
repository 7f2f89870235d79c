//! Subject-scoped retrieval operations.
//!
//! [`RetrievalService`] ties an embedding provider to a [`VectorIndexClient`]
//! and exposes add/search/materials/delete keyed by subject and document id.
//! Every call embeds afresh; nothing is cached.

use crate::config::{ProviderKind, RetrieverConfig};
use crate::error::{Result, RetrievalError};
use crate::identity::derive_point_id;
use crate::index::{
    IndexState, IndexedPoint, Payload, PointFilter, QdrantBackend, ScoredPoint, VectorIndexClient,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use syllabus_embed::{EmbeddingProvider, HashEmbedProvider, OpenAiEmbedProvider};

/// Payload keys written by the service itself.
pub const RESERVED_KEYS: [&str; 3] = ["subject", "content", "document_id"];

/// Default number of hits for [`RetrievalService::search_similar`].
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

/// Default number of hits for [`RetrievalService::get_subject_materials`].
pub const DEFAULT_MATERIALS_LIMIT: usize = 10;

/// Points removed per deletion pass.
pub const DELETE_PAGE_SIZE: usize = 1000;

/// Separator between contents in [`RetrievalService::get_subject_materials`].
pub const MATERIALS_SEPARATOR: &str = "\n\n---\n\n";

/// A formatted search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub score: f32,
    pub content: String,
    pub subject: String,
    pub document_id: String,
    /// Caller metadata, without the reserved keys
    pub metadata: Payload,
}

impl From<ScoredPoint> for SearchResult {
    fn from(point: ScoredPoint) -> Self {
        let mut payload = point.payload;
        let mut take = |key: &str| match payload.remove(key) {
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => String::new(),
        };

        let content = take("content");
        let subject = take("subject");
        let document_id = take("document_id");

        Self {
            score: point.score,
            content,
            subject,
            document_id,
            metadata: payload,
        }
    }
}

/// Retrieval operations over one vector collection.
///
/// Construct once and share (for example behind an [`Arc`]); the service holds
/// no mutable state of its own.
pub struct RetrievalService {
    index: VectorIndexClient,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl std::fmt::Debug for RetrievalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalService")
            .field("index", &self.index)
            .field("embedder", &self.embedder.provider_name())
            .finish()
    }
}

impl RetrievalService {
    pub fn new(index: VectorIndexClient, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { index, embedder }
    }

    /// Wire a service from configuration: embedding provider, Qdrant backend
    /// and the one-time Ready/Disabled decision.
    ///
    /// Fails only if the embedding provider cannot be built. An unreachable
    /// index yields a service whose index is Disabled.
    pub async fn from_config(config: &RetrieverConfig) -> Result<Self> {
        let embedder: Arc<dyn EmbeddingProvider> = match config.embedding_provider {
            ProviderKind::OpenAi => Arc::new(OpenAiEmbedProvider::new(config.embedding.clone())?),
            ProviderKind::Hash => Arc::new(HashEmbedProvider::new(config.embedding.dimension)?),
        };

        let index = match QdrantBackend::from_config(&config.index) {
            Ok(backend) => {
                VectorIndexClient::connect(Arc::new(backend), config.collection_dimension()).await
            }
            Err(e) => VectorIndexClient::disabled(format!("{e:#}")),
        };

        Ok(Self::new(index, embedder))
    }

    pub fn index(&self) -> &VectorIndexClient {
        &self.index
    }

    pub fn embedder(&self) -> &dyn EmbeddingProvider {
        self.embedder.as_ref()
    }

    pub fn state(&self) -> IndexState {
        self.index.state()
    }

    /// Embed `content` and store it under `subject`.
    ///
    /// A random document id is generated when none is given. The payload is
    /// `{subject, content, document_id}` merged with `metadata`; metadata keys
    /// with reserved names replace the service's values.
    ///
    /// Returns the document id.
    pub async fn add_document(
        &self,
        subject: &str,
        content: &str,
        document_id: Option<&str>,
        metadata: Option<Payload>,
    ) -> Result<String> {
        if subject.trim().is_empty() {
            return Err(RetrievalError::invalid_input("subject must not be empty"));
        }
        self.index.ensure_ready()?;

        let document_id = document_id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let vector = self.embedder.embed_text(content).await?;
        let id = derive_point_id(&document_id, content);

        let mut payload = Payload::new();
        payload.insert("subject".to_string(), Value::from(subject));
        payload.insert("content".to_string(), Value::from(content));
        payload.insert("document_id".to_string(), Value::from(document_id.as_str()));
        if let Some(metadata) = metadata {
            payload.extend(metadata);
        }

        self.index
            .upsert(vec![IndexedPoint {
                id,
                vector,
                payload,
            }])
            .await?;

        tracing::debug!(
            "Indexed point {} for document {} (subject={})",
            id,
            document_id,
            subject
        );
        Ok(document_id)
    }

    /// Points most similar to `query`, optionally within one subject.
    ///
    /// An empty subject searches every subject.
    pub async fn search_similar(
        &self,
        query: &str,
        subject: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        self.index.ensure_ready()?;

        let vector = self.embedder.embed_text(query).await?;
        let filter = match subject.filter(|s| !s.is_empty()) {
            Some(subject) => PointFilter::subject(subject),
            None => PointFilter::all(),
        };

        let hits = self.index.search(&vector, &filter, limit).await?;
        Ok(hits.into_iter().map(SearchResult::from).collect())
    }

    /// Best-effort material lookup for a subject.
    ///
    /// Searches within `subject` using `query`, or the subject name when the
    /// query is missing or blank, and joins the contents with [`MATERIALS_SEPARATOR`].
    /// Never fails: a Disabled index, an error or no hits all give `""`.
    pub async fn get_subject_materials(
        &self,
        subject: &str,
        query: Option<&str>,
        limit: usize,
    ) -> String {
        if !self.index.is_ready() {
            return String::new();
        }

        let query = query.filter(|q| !q.trim().is_empty()).unwrap_or(subject);
        match self.search_similar(query, Some(subject), limit).await {
            Ok(results) => results
                .into_iter()
                .map(|r| r.content)
                .collect::<Vec<_>>()
                .join(MATERIALS_SEPARATOR),
            Err(e) => {
                tracing::warn!("Could not load materials for subject {}: {}", subject, e);
                String::new()
            }
        }
    }

    /// Delete every point stored for `document_id`, one page per call.
    ///
    /// Returns the number of points removed.
    pub async fn delete_document(&self, document_id: &str) -> Result<usize> {
        let deleted = self.delete_page(&PointFilter::document(document_id)).await?;
        tracing::info!("Deleted {} points for document {}", deleted, document_id);
        Ok(deleted)
    }

    /// Delete up to [`DELETE_PAGE_SIZE`] points of `subject`.
    ///
    /// Returns the number removed on this pass; call again until it returns 0
    /// to clear larger subjects. A failure part way leaves the subject
    /// partially cleared.
    pub async fn delete_subject_materials(&self, subject: &str) -> Result<usize> {
        let deleted = self.delete_page(&PointFilter::subject(subject)).await?;
        tracing::info!("Deleted {} points for subject {}", deleted, subject);
        Ok(deleted)
    }

    /// Number of points stored for `subject`.
    pub async fn count_subject_points(&self, subject: &str) -> Result<usize> {
        self.index.count(&PointFilter::subject(subject)).await
    }

    async fn delete_page(&self, filter: &PointFilter) -> Result<usize> {
        let points = self.index.scroll(filter, DELETE_PAGE_SIZE).await?;
        if points.is_empty() {
            return Ok(0);
        }

        let ids: Vec<_> = points.iter().map(|p| p.id).collect();
        self.index.delete(&ids).await?;
        Ok(ids.len())
    }
}
