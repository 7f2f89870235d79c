//! Working demonstration of the retrieval layer without external services
//!
//! This example shows the core functionality:
//! 1. Setting up a RetrievalService on the in-memory backend
//! 2. Ingesting a paged document and a lecture transcript
//! 3. Searching within a subject
//! 4. Pulling joined subject materials
//! 5. Deleting a subject

use anyhow::Result;
use std::sync::Arc;
use syllabus_context::TextSplitter;
use syllabus_embed::HashEmbedProvider;
use syllabus_retriever::{
    index::{MemoryBackend, VectorIndexClient},
    ingest::Ingestor,
    service::RetrievalService,
};

const DIMENSION: usize = 384;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for better visibility
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let backend = Arc::new(MemoryBackend::new("subject_materials"));
    let index = VectorIndexClient::connect(backend.clone(), DIMENSION).await;
    let service = RetrievalService::new(index, Arc::new(HashEmbedProvider::new(DIMENSION)?));

    println!("Index state: {:?}\n", service.state());

    let ingestor = Ingestor::new(&service, TextSplitter::new(200, 40)?);

    let pages = vec![
        "Derivatives measure rate of change. The derivative of x squared is two x. \
         Tangent lines touch a curve at exactly one point near the contact."
            .to_string(),
        String::new(),
        "Integrals accumulate area under a curve. The fundamental theorem links \
         integration and differentiation."
            .to_string(),
    ];
    let report = ingestor
        .ingest_pages("math", &pages, Some("calculus-notes"), None)
        .await?;
    println!(
        "Ingested {} chunks from {} pages as {}",
        report.chunks, report.pages, report.document_id
    );

    let report = ingestor
        .ingest_transcript(
            "history",
            "Today we cover the printing press and how it spread literacy across Europe.",
            None,
            None,
        )
        .await?;
    println!("Ingested transcript as {}\n", report.document_id);

    let results = service
        .search_similar("rate of change", Some("math"), 3)
        .await?;
    println!("Search 'rate of change' in math:");
    for result in &results {
        println!("  {:.3} | page {} | {}", result.score, result.metadata["page"], result.content);
    }

    let materials = service.get_subject_materials("history", None, 10).await;
    println!("\nHistory materials:\n{materials}\n");

    let deleted = service.delete_subject_materials("math").await?;
    println!("Deleted {deleted} math points, {} points left", backend.len().await);

    Ok(())
}
