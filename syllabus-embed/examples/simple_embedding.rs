//! Simple example generating embeddings through an OpenAI-compatible endpoint
//!
//! Reads `OPENAI_API_KEY` (and optionally `OPENAI_BASE_URL`, `EMBEDDING_MODEL`,
//! `EMBEDDING_DIMENSION`) from the environment.

use syllabus_embed::{EmbeddingProvider, OpenAiEmbedProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let provider = OpenAiEmbedProvider::from_env()?;

    println!("Provider: {}", provider.provider_name());
    println!("   Model: {}", provider.config().model_name);
    println!("   Dimension: {}", provider.embedding_dimension());

    // Generate embedding for a single text
    let text = "Derivatives measure rate of change.";
    let embedding = provider.embed_text(text).await?;

    println!("\nText: \"{text}\"");
    println!(
        "   First 5 values: {:?}",
        &embedding[..5.min(embedding.len())]
    );

    // Generate embeddings for multiple texts
    let texts = vec![
        "Integrals accumulate area under a curve.".to_string(),
        "The chain rule differentiates composed functions.".to_string(),
        "Limits describe behaviour near a point.".to_string(),
    ];

    let result = provider.embed_texts(&texts).await?;

    println!("\nGenerated {} embeddings", result.len());
    for (i, (text, embedding)) in texts.iter().zip(result.embeddings.iter()).enumerate() {
        println!("   Text {}: \"{}\"", i + 1, text);
        println!(
            "   First 3 values: {:?}",
            &embedding[..3.min(embedding.len())]
        );
    }

    Ok(())
}
