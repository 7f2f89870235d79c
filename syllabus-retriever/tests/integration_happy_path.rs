//! Integration tests for the retrieval service
//!
//! These tests run the whole path against the in-memory backend and the
//! hashing embedder, so no network is needed:
//! - Adding and searching materials within a subject
//! - Overwrite semantics of re-adding the same content
//! - Subject filtering
//! - Deleting documents and subjects
//! - Behaviour of a Disabled index
//! - Ingesting paged text and transcripts
//! - Classification of failures from a Ready backend or the embedder

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use syllabus_context::TextSplitter;
use syllabus_embed::{EmbedError, EmbeddingProvider, EmbeddingResult, HashEmbedProvider};
use syllabus_retriever::{
    RetrievalError,
    config::{IndexConfig, ProviderKind, RetrieverConfig},
    index::{
        IndexState, IndexedPoint, MemoryBackend, PointFilter, PointId, ScoredPoint, StoredPoint,
        VectorBackend, VectorIndexClient,
    },
    ingest::{Ingestor, StaticText, TextSource},
    service::{DELETE_PAGE_SIZE, MATERIALS_SEPARATOR, RetrievalService},
};
use tracing_test::traced_test;

const DIMENSION: usize = 256;

async fn memory_service() -> (RetrievalService, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new("subject_materials"));
    let index = VectorIndexClient::connect(backend.clone(), DIMENSION).await;
    let embedder = Arc::new(HashEmbedProvider::new(DIMENSION).unwrap());
    (RetrievalService::new(index, embedder), backend)
}

fn disabled_service() -> RetrievalService {
    RetrievalService::new(
        VectorIndexClient::disabled("connection refused"),
        Arc::new(HashEmbedProvider::new(DIMENSION).unwrap()),
    )
}

/// Add one text and find it again within the subject
#[tokio::test]
async fn test_add_then_search() -> Result<()> {
    let (service, _) = memory_service().await;
    let content = "Derivatives measure rate of change.";

    service.add_document("math", content, None, None).await?;
    let results = service
        .search_similar("rate of change", Some("math"), 1)
        .await?;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].content, content);
    assert_eq!(results[0].subject, "math");
    assert!(results[0].score > 0.0);
    Ok(())
}

/// Re-adding identical content under the same document overwrites the point
#[tokio::test]
async fn test_readd_overwrites() -> Result<()> {
    let (service, backend) = memory_service().await;
    let content = "Integrals accumulate area under a curve.";

    let first = service.add_document("math", content, Some("doc-1"), None).await?;
    let second = service.add_document("math", content, Some("doc-1"), None).await?;

    assert_eq!(first, "doc-1");
    assert_eq!(second, "doc-1");
    assert_eq!(backend.len().await, 1);

    let results = service.search_similar("area under a curve", Some("math"), 5).await?;
    assert_eq!(results.len(), 1);
    Ok(())
}

/// A subject filter never returns points from another subject
#[tokio::test]
async fn test_subject_filter_respected() -> Result<()> {
    let (service, _) = memory_service().await;

    service
        .add_document("math", "Energy is conserved in closed systems.", None, None)
        .await?;
    service
        .add_document("physics", "Energy is conserved in closed systems.", None, None)
        .await?;
    service
        .add_document("physics", "Momentum is mass times velocity.", None, None)
        .await?;

    let results = service.search_similar("energy", Some("physics"), 10).await?;
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.subject == "physics"));

    let everything = service.search_similar("energy", None, 10).await?;
    assert_eq!(everything.len(), 3);

    // Most similar first
    assert!(everything.windows(2).all(|w| w[0].score >= w[1].score));
    Ok(())
}

/// Caller metadata comes back without the reserved keys
#[tokio::test]
async fn test_metadata_round_trip() -> Result<()> {
    let (service, _) = memory_service().await;
    let metadata = json!({"source": "lecture-4.pdf", "page": 3});

    let document_id = service
        .add_document(
            "math",
            "The chain rule differentiates composed functions.",
            None,
            metadata.as_object().cloned(),
        )
        .await?;

    let results = service.search_similar("chain rule", Some("math"), 1).await?;
    assert_eq!(results[0].document_id, document_id);
    assert_eq!(results[0].metadata.len(), 2);
    assert_eq!(results[0].metadata["source"], json!("lecture-4.pdf"));
    assert_eq!(results[0].metadata["page"], json!(3));
    Ok(())
}

/// Materials are joined with the separator; missing query falls back to the subject
#[tokio::test]
async fn test_subject_materials() -> Result<()> {
    let (service, _) = memory_service().await;

    assert_eq!(service.get_subject_materials("math", None, 10).await, "");

    service
        .add_document("math", "Limits describe behaviour near a point.", None, None)
        .await?;
    service
        .add_document("math", "Continuity means no jumps.", None, None)
        .await?;
    service
        .add_document("history", "Rome was not built in a day.", None, None)
        .await?;

    let materials = service.get_subject_materials("math", None, 10).await;
    let parts: Vec<&str> = materials.split(MATERIALS_SEPARATOR).collect();
    assert_eq!(parts.len(), 2);
    assert!(parts.contains(&"Limits describe behaviour near a point."));
    assert!(parts.contains(&"Continuity means no jumps."));

    let one = service
        .get_subject_materials("math", Some("behaviour near a point"), 1)
        .await;
    assert_eq!(one, "Limits describe behaviour near a point.");
    Ok(())
}

/// Deleting a subject leaves nothing to find
#[tokio::test]
#[traced_test]
async fn test_delete_subject() -> Result<()> {
    let (service, _) = memory_service().await;
    service
        .add_document("math", "Derivatives measure rate of change.", None, None)
        .await?;
    service
        .add_document("art", "Perspective creates depth.", None, None)
        .await?;

    assert_eq!(service.delete_subject_materials("math").await?, 1);
    assert!(logs_contain("Deleted 1 points for subject math"));

    let results = service.search_similar("rate of change", Some("math"), 5).await?;
    assert!(results.is_empty());
    assert_eq!(service.count_subject_points("art").await?, 1);

    // Nothing left on a second pass
    assert_eq!(service.delete_subject_materials("math").await?, 0);
    Ok(())
}

/// Subject deletion removes one page per call
#[tokio::test]
async fn test_delete_subject_is_paged() -> Result<()> {
    let (service, _) = memory_service().await;
    let total = DELETE_PAGE_SIZE + 5;

    let pages: Vec<String> = (0..total).map(|i| format!("Fact number {i}.")).collect();
    let ingestor = Ingestor::new(&service, TextSplitter::default());
    let report = ingestor.ingest_pages("trivia", &pages, None, None).await?;
    assert_eq!(report.chunks, total);

    assert_eq!(service.delete_subject_materials("trivia").await?, DELETE_PAGE_SIZE);
    assert_eq!(service.count_subject_points("trivia").await?, 5);
    assert_eq!(service.delete_subject_materials("trivia").await?, 5);
    assert_eq!(service.delete_subject_materials("trivia").await?, 0);
    Ok(())
}

/// Deleting a document removes all of its chunks and nothing else
#[tokio::test]
async fn test_delete_document() -> Result<()> {
    let (service, _) = memory_service().await;
    let pages = vec![
        "Cells are the unit of life.".to_string(),
        "DNA carries genetic information.".to_string(),
    ];

    let ingestor = Ingestor::new(&service, TextSplitter::default());
    let report = ingestor
        .ingest_pages("biology", &pages, Some("notes-1"), None)
        .await?;
    service
        .add_document("biology", "Enzymes speed up reactions.", Some("notes-2"), None)
        .await?;

    assert_eq!(report.chunks, 2);
    assert_eq!(service.delete_document("notes-1").await?, 2);
    assert_eq!(service.delete_document("notes-1").await?, 0);

    let remaining = service.search_similar("reactions", Some("biology"), 10).await?;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].document_id, "notes-2");
    Ok(())
}

/// A Disabled index fails every operation except materials, which returns ""
#[tokio::test]
async fn test_disabled_index() -> Result<()> {
    let service = disabled_service();

    assert!(matches!(service.state(), IndexState::Disabled { .. }));
    assert_eq!(service.get_subject_materials("math", None, 10).await, "");
    assert_eq!(
        service
            .get_subject_materials("math", Some("derivatives"), 10)
            .await,
        ""
    );

    let err = service
        .add_document("math", "Derivatives", None, None)
        .await
        .unwrap_err();
    assert!(err.is_not_ready());
    assert!(matches!(err, RetrievalError::NotReady { .. }));

    assert!(service.search_similar("x", None, 5).await.unwrap_err().is_not_ready());
    assert!(service.delete_document("d").await.unwrap_err().is_not_ready());
    assert!(
        service
            .delete_subject_materials("math")
            .await
            .unwrap_err()
            .is_not_ready()
    );
    assert!(service.count_subject_points("math").await.unwrap_err().is_not_ready());
    Ok(())
}

/// An unreachable Qdrant server leaves the service Disabled instead of failing
#[tokio::test]
#[traced_test]
async fn test_unreachable_qdrant_is_disabled() -> Result<()> {
    let config = RetrieverConfig {
        embedding_provider: ProviderKind::Hash,
        index: IndexConfig {
            url: "http://127.0.0.1:9".to_string(),
            ..IndexConfig::default()
        },
        ..RetrieverConfig::default()
    };

    let service = RetrievalService::from_config(&config).await?;

    assert!(!service.index().is_ready());
    assert!(logs_contain("Vector index disabled"));
    assert_eq!(service.get_subject_materials("math", None, 10).await, "");
    assert!(
        service
            .add_document("math", "Derivatives", None, None)
            .await
            .unwrap_err()
            .is_not_ready()
    );
    Ok(())
}

/// Pages are chunked, blank pages skipped, chunks tagged with page and index
#[tokio::test]
async fn test_ingest_pages() -> Result<()> {
    let (service, _) = memory_service().await;
    let splitter = TextSplitter::new(40, 10)?;
    let ingestor = Ingestor::new(&service, splitter);

    let long_page = "Photosynthesis converts light. Plants store sugar. Leaves are green.";
    let pages = vec![
        long_page.to_string(),
        "   \n".to_string(),
        "Roots absorb water.".to_string(),
    ];
    let metadata = json!({"source": "botany.pdf"});

    let report = ingestor
        .ingest_pages("biology", &pages, None, metadata.as_object().cloned())
        .await?;

    let expected_chunks = splitter.split(long_page).len() + 1;
    assert_eq!(report.pages, 2);
    assert_eq!(report.chunks, expected_chunks);
    assert_eq!(service.count_subject_points("biology").await?, expected_chunks);

    let roots = service.search_similar("Roots absorb water", Some("biology"), 1).await?;
    assert_eq!(roots[0].content, "Roots absorb water.");
    assert_eq!(roots[0].document_id, report.document_id);
    assert_eq!(roots[0].metadata["page"], json!(3));
    assert_eq!(roots[0].metadata["chunk_index"], json!(0));
    assert_eq!(roots[0].metadata["source"], json!("botany.pdf"));
    Ok(())
}

/// An empty transcript indexes nothing
#[tokio::test]
async fn test_ingest_transcript() -> Result<()> {
    let (service, backend) = memory_service().await;
    let ingestor = Ingestor::new(&service, TextSplitter::default());

    let empty = ingestor.ingest_transcript("history", "", None, None).await?;
    assert_eq!(empty.pages, 0);
    assert_eq!(empty.chunks, 0);
    assert!(backend.is_empty().await);

    let report = ingestor
        .ingest_transcript(
            "history",
            "Today we discuss the printing press.",
            Some("lecture-7"),
            None,
        )
        .await?;
    assert_eq!(report.document_id, "lecture-7");
    assert_eq!(report.chunks, 1);
    assert_eq!(backend.count(&PointFilter::document("lecture-7")).await?, 1);
    Ok(())
}

struct FailingSource;

#[async_trait]
impl TextSource for FailingSource {
    async fn fetch(&self) -> anyhow::Result<Vec<String>> {
        anyhow::bail!("transcription service unavailable")
    }
}

/// Text sources feed the ingestor; their failures are upstream errors
#[tokio::test]
async fn test_ingest_source() -> Result<()> {
    let (service, _) = memory_service().await;
    let ingestor = Ingestor::new(&service, TextSplitter::default());

    let source = StaticText::new(vec!["Page one.".to_string(), "Page two.".to_string()]);
    let report = ingestor.ingest_source("reading", &source, None, None).await?;
    assert_eq!(report.pages, 2);

    let err = ingestor
        .ingest_source("reading", &FailingSource, None, None)
        .await
        .unwrap_err();
    assert!(err.is_upstream());
    assert!(err.to_string().contains("transcription service unavailable"));
    Ok(())
}

/// Pages sharing a running header longer than the id prefix keep one point
#[tokio::test]
#[traced_test]
async fn test_ingest_repeated_page_header() -> Result<()> {
    let (service, backend) = memory_service().await;
    let ingestor = Ingestor::new(&service, TextSplitter::default());

    let header = "Calculus I lecture notes, Department of Mathematics, Spring term, \
                  chapter three: derivatives and rates. ";
    assert!(header.chars().count() > 100);
    let pages = vec![
        format!("{header}Page one body."),
        format!("{header}Page two body."),
    ];

    let report = ingestor.ingest_pages("math", &pages, Some("doc"), None).await?;

    assert_eq!(report.pages, 2);
    assert_eq!(report.chunks, 1);
    assert_eq!(backend.len().await, 1);
    assert!(logs_contain("Skipping chunk 0 of page 2 in document doc"));

    let stored = service.search_similar("Page one body", Some("math"), 1).await?;
    assert_eq!(stored[0].metadata["page"], json!(1));
    Ok(())
}

/// Ingestion needs a Ready index even when there is nothing to index
#[tokio::test]
async fn test_ingest_into_disabled_index() -> Result<()> {
    let service = disabled_service();
    let ingestor = Ingestor::new(&service, TextSplitter::default());

    let err = ingestor
        .ingest_transcript("history", "", None, None)
        .await
        .unwrap_err();
    assert!(err.is_not_ready());

    let blank = vec!["  ".to_string(), String::new()];
    let err = ingestor
        .ingest_pages("history", &blank, None, None)
        .await
        .unwrap_err();
    assert!(err.is_not_ready());
    Ok(())
}

/// Creates its collection, then fails every point operation except scroll
struct FlakyBackend;

#[async_trait]
impl VectorBackend for FlakyBackend {
    fn describe(&self) -> String {
        "flaky://subject_materials".to_string()
    }

    async fn ensure_collection(&self, _dimension: usize) -> anyhow::Result<bool> {
        Ok(true)
    }

    async fn upsert(&self, _points: Vec<IndexedPoint>) -> anyhow::Result<()> {
        anyhow::bail!("503 Service Unavailable")
    }

    async fn search(
        &self,
        _vector: &[f32],
        _filter: &PointFilter,
        _limit: usize,
    ) -> anyhow::Result<Vec<ScoredPoint>> {
        anyhow::bail!("503 Service Unavailable")
    }

    async fn scroll(
        &self,
        _filter: &PointFilter,
        _limit: usize,
    ) -> anyhow::Result<Vec<StoredPoint>> {
        Ok(vec![StoredPoint {
            id: 1,
            payload: Default::default(),
        }])
    }

    async fn delete(&self, _ids: &[PointId]) -> anyhow::Result<()> {
        anyhow::bail!("503 Service Unavailable")
    }

    async fn count(&self, _filter: &PointFilter) -> anyhow::Result<usize> {
        anyhow::bail!("503 Service Unavailable")
    }
}

/// Embedder whose every call is rejected by the provider
struct RejectingEmbedder;

#[async_trait]
impl EmbeddingProvider for RejectingEmbedder {
    async fn embed_texts(&self, _texts: &[String]) -> syllabus_embed::Result<EmbeddingResult> {
        Err(EmbedError::Api {
            status: 429,
            body: "rate limited".to_string(),
        })
    }

    fn embedding_dimension(&self) -> usize {
        DIMENSION
    }

    fn provider_name(&self) -> &str {
        "rejecting"
    }
}

fn assert_backend_failure(err: RetrievalError, expected: &str) {
    assert!(err.is_upstream(), "{err} should be an upstream failure");
    assert!(!err.is_not_ready());
    match err {
        RetrievalError::Backend { operation, .. } => assert_eq!(operation, expected),
        other => panic!("expected a {expected} backend failure, got {other}"),
    }
}

/// A backend that fails after a successful connect surfaces upstream errors
#[tokio::test]
#[traced_test]
async fn test_backend_failures_are_upstream() -> Result<()> {
    let index = VectorIndexClient::connect(Arc::new(FlakyBackend), DIMENSION).await;
    assert!(index.is_ready());
    let service = RetrievalService::new(index, Arc::new(HashEmbedProvider::new(DIMENSION)?));

    let err = service
        .add_document("math", "Derivatives measure rate of change.", None, None)
        .await
        .unwrap_err();
    assert_backend_failure(err, "upsert");

    let err = service
        .search_similar("rate of change", Some("math"), 5)
        .await
        .unwrap_err();
    assert_backend_failure(err, "search");

    let err = service.delete_document("doc-1").await.unwrap_err();
    assert_backend_failure(err, "delete");

    let err = service.delete_subject_materials("math").await.unwrap_err();
    assert_backend_failure(err, "delete");

    let err = service.count_subject_points("math").await.unwrap_err();
    assert_backend_failure(err, "count");

    assert_eq!(service.get_subject_materials("math", None, 10).await, "");
    assert!(logs_contain("Could not load materials for subject math"));
    Ok(())
}

/// Embedding failures after construction are upstream, not NotReady
#[tokio::test]
async fn test_embedding_failures_are_upstream() -> Result<()> {
    let backend = Arc::new(MemoryBackend::new("subject_materials"));
    let index = VectorIndexClient::connect(backend.clone(), DIMENSION).await;
    let service = RetrievalService::new(index, Arc::new(RejectingEmbedder));

    let err = service
        .add_document("math", "Derivatives measure rate of change.", None, None)
        .await
        .unwrap_err();
    assert!(err.is_upstream());
    assert!(matches!(
        err,
        RetrievalError::Embedding(EmbedError::Api { status: 429, .. })
    ));
    assert!(backend.is_empty().await);

    let err = service
        .search_similar("rate of change", None, 5)
        .await
        .unwrap_err();
    assert!(err.is_upstream());
    assert!(matches!(err, RetrievalError::Embedding(_)));

    assert_eq!(service.get_subject_materials("math", Some("limits"), 5).await, "");
    Ok(())
}
