//! Indexing text produced by external collaborators.
//!
//! Transcription and document parsing happen elsewhere; they hand over plain
//! strings (one per page, or a single transcript). The [`Ingestor`] chunks
//! that text and adds every chunk as its own point under one document id.

use crate::error::{Result, RetrievalError};
use crate::identity::derive_point_id;
use crate::index::Payload;
use crate::service::RetrievalService;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;
use syllabus_context::TextSplitter;

/// Page separator used by [`PagedTextFile`].
pub const PAGE_SEPARATOR: char = '\u{c}';

/// Something that produces text to index: one string per page.
#[async_trait]
pub trait TextSource: Send + Sync {
    async fn fetch(&self) -> anyhow::Result<Vec<String>>;
}

/// Pages already held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticText {
    pages: Vec<String>,
}

impl StaticText {
    pub fn new(pages: Vec<String>) -> Self {
        Self { pages }
    }

    pub fn single(text: impl Into<String>) -> Self {
        Self {
            pages: vec![text.into()],
        }
    }
}

#[async_trait]
impl TextSource for StaticText {
    async fn fetch(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.pages.clone())
    }
}

/// A UTF-8 text file whose pages are separated by form feeds, as written by
/// `pdftotext` and similar extractors.
#[derive(Debug, Clone)]
pub struct PagedTextFile {
    path: PathBuf,
}

impl PagedTextFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TextSource for PagedTextFile {
    async fn fetch(&self) -> anyhow::Result<Vec<String>> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            anyhow::anyhow!("failed to read {}: {e}", self.path.display())
        })?;
        Ok(raw.split(PAGE_SEPARATOR).map(str::to_string).collect())
    }
}

/// Outcome of one ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub document_id: String,
    /// Non-blank pages that were indexed
    pub pages: usize,
    /// Distinct points written
    pub chunks: usize,
}

/// Chunks collaborator text and adds it through a [`RetrievalService`].
#[derive(Debug)]
pub struct Ingestor<'a> {
    service: &'a RetrievalService,
    splitter: TextSplitter,
}

impl<'a> Ingestor<'a> {
    pub fn new(service: &'a RetrievalService, splitter: TextSplitter) -> Self {
        Self { service, splitter }
    }

    /// Index `pages` under one document id.
    ///
    /// Blank pages are skipped. Each chunk gets the caller metadata plus
    /// `page` (1-based position in `pages`) and `chunk_index` (position within
    /// its page). A chunk whose point id was already written by this call
    /// (same first 100 characters, such as a running page header) is skipped
    /// with a warning. Stops at the first failure; chunks added before it
    /// stay indexed.
    pub async fn ingest_pages(
        &self,
        subject: &str,
        pages: &[String],
        document_id: Option<&str>,
        metadata: Option<Payload>,
    ) -> Result<IngestReport> {
        if subject.trim().is_empty() {
            return Err(RetrievalError::invalid_input("subject must not be empty"));
        }
        self.service.index().ensure_ready()?;

        let document_id = document_id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let base = metadata.unwrap_or_default();

        let mut report = IngestReport {
            document_id,
            pages: 0,
            chunks: 0,
        };
        let mut written = HashSet::new();

        for (page_index, page) in pages.iter().enumerate() {
            if page.trim().is_empty() {
                continue;
            }
            report.pages += 1;

            for (chunk_index, chunk) in self.splitter.split(page).into_iter().enumerate() {
                if !written.insert(derive_point_id(&report.document_id, &chunk)) {
                    tracing::warn!(
                        "Skipping chunk {} of page {} in document {}: same point id as an earlier chunk",
                        chunk_index,
                        page_index + 1,
                        report.document_id
                    );
                    continue;
                }

                let mut chunk_metadata = base.clone();
                chunk_metadata.insert("page".to_string(), Value::from(page_index + 1));
                chunk_metadata.insert("chunk_index".to_string(), Value::from(chunk_index));

                self.service
                    .add_document(
                        subject,
                        &chunk,
                        Some(&report.document_id),
                        Some(chunk_metadata),
                    )
                    .await?;
                report.chunks += 1;
            }
        }

        tracing::info!(
            "Ingested document {} into subject {}: {} pages, {} chunks",
            report.document_id,
            subject,
            report.pages,
            report.chunks
        );
        Ok(report)
    }

    /// Index a transcript as a single page. An empty transcript indexes
    /// nothing but still needs a Ready index.
    pub async fn ingest_transcript(
        &self,
        subject: &str,
        transcript: &str,
        document_id: Option<&str>,
        metadata: Option<Payload>,
    ) -> Result<IngestReport> {
        self.ingest_pages(subject, &[transcript.to_string()], document_id, metadata)
            .await
    }

    /// Fetch pages from `source` and index them.
    pub async fn ingest_source(
        &self,
        subject: &str,
        source: &dyn TextSource,
        document_id: Option<&str>,
        metadata: Option<Payload>,
    ) -> Result<IngestReport> {
        let pages = source.fetch().await.map_err(RetrievalError::text_source)?;
        tracing::debug!("Text source returned {} pages", pages.len());
        self.ingest_pages(subject, &pages, document_id, metadata)
            .await
    }
}
