use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use syllabus_retriever::{
    config::RetrieverConfig,
    index::{IndexState, Payload},
    ingest::{Ingestor, PagedTextFile},
    service::{DEFAULT_MATERIALS_LIMIT, DEFAULT_SEARCH_LIMIT, RetrievalService, SearchResult},
};
use tracing_subscriber::EnvFilter;

/// A CLI tool to index and query subject materials.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file; environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Embed and store one piece of text
    Add {
        #[arg(short, long)]
        subject: String,
        /// Text to store
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        text: Option<String>,
        /// Read the text from a file
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        document_id: Option<String>,
        /// Extra payload as a JSON object
        #[arg(long)]
        metadata: Option<String>,
    },
    /// Chunk and store a text file whose pages are separated by form feeds
    Ingest {
        #[arg(short, long)]
        subject: String,
        file: PathBuf,
        #[arg(long)]
        document_id: Option<String>,
        /// Extra payload as a JSON object
        #[arg(long)]
        metadata: Option<String>,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Search for similar materials
    Search {
        query: String,
        #[arg(short, long)]
        subject: Option<String>,
        /// Maximum number of results
        #[arg(short, long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Print the materials of a subject joined by separators
    Materials {
        subject: String,
        #[arg(short, long)]
        query: Option<String>,
        #[arg(short, long, default_value_t = DEFAULT_MATERIALS_LIMIT)]
        limit: usize,
    },
    /// Delete every point of a document
    DeleteDocument { document_id: String },
    /// Delete up to one page of a subject's points
    DeleteSubject {
        subject: String,
        /// Repeat until the subject is empty
        #[arg(long)]
        all: bool,
    },
    /// Show index state and configuration
    Status {
        /// Also count the points of this subject
        #[arg(short, long)]
        subject: Option<String>,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[derive(Serialize)]
struct StatusOutput {
    #[serde(flatten)]
    state: IndexState,
    url: String,
    collection: String,
    dimension: usize,
    embedding_provider: String,
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject_points: Option<usize>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn parse_metadata(raw: Option<&str>) -> anyhow::Result<Option<Payload>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match serde_json::from_str::<serde_json::Value>(raw)? {
        serde_json::Value::Object(map) => Ok(Some(map)),
        _ => Err(anyhow::anyhow!("Metadata must be a JSON object")),
    }
}

fn print_results(results: &[SearchResult], format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(results)?);
        }
        OutputFormat::Summary => {
            println!("Found {} results:", results.len());
            for result in results {
                println!(
                    "  Score: {:.3} | Subject: {} | Document: {}",
                    result.score, result.subject, result.document_id
                );
                println!(
                    "    {}",
                    result.content.chars().take(100).collect::<String>()
                );
            }
        }
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = RetrieverConfig::load(args.config.as_deref())?;
    let service = RetrievalService::from_config(&config).await?;

    match args.command {
        Commands::Add {
            subject,
            text,
            file,
            document_id,
            metadata,
        } => {
            let content = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)?,
                (None, None) => return Err(anyhow::anyhow!("Either --text or --file is required")),
            };
            let metadata = parse_metadata(metadata.as_deref())?;

            let document_id = service
                .add_document(&subject, &content, document_id.as_deref(), metadata)
                .await?;
            println!("{document_id}");
            Ok(())
        }
        Commands::Ingest {
            subject,
            file,
            document_id,
            metadata,
            format,
        } => {
            let metadata = parse_metadata(metadata.as_deref())?;
            let ingestor = Ingestor::new(&service, config.chunking.splitter()?);

            let report = ingestor
                .ingest_source(
                    &subject,
                    &PagedTextFile::new(&file),
                    document_id.as_deref(),
                    metadata,
                )
                .await?;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Summary => println!(
                    "Indexed {} chunks from {} pages as document {}",
                    report.chunks, report.pages, report.document_id
                ),
            }
            Ok(())
        }
        Commands::Search {
            query,
            subject,
            limit,
            format,
        } => {
            let results = service
                .search_similar(&query, subject.as_deref(), limit)
                .await?;
            print_results(&results, &format)
        }
        Commands::Materials {
            subject,
            query,
            limit,
        } => {
            let materials = service
                .get_subject_materials(&subject, query.as_deref(), limit)
                .await;
            if !materials.is_empty() {
                println!("{materials}");
            }
            Ok(())
        }
        Commands::DeleteDocument { document_id } => {
            let deleted = service.delete_document(&document_id).await?;
            println!("Deleted {deleted} points");
            Ok(())
        }
        Commands::DeleteSubject { subject, all } => {
            let mut total = service.delete_subject_materials(&subject).await?;
            if all {
                loop {
                    let deleted = service.delete_subject_materials(&subject).await?;
                    if deleted == 0 {
                        break;
                    }
                    total += deleted;
                }
            }
            println!("Deleted {total} points");
            Ok(())
        }
        Commands::Status { subject, format } => {
            let subject_points = match (&subject, service.index().is_ready()) {
                (Some(subject), true) => Some(service.count_subject_points(subject).await?),
                _ => None,
            };

            let output = StatusOutput {
                state: service.state(),
                url: config.index.url.clone(),
                collection: config.index.collection.clone(),
                dimension: config.collection_dimension(),
                embedding_provider: service.embedder().provider_name().to_string(),
                model: config.embedding.model_name.clone(),
                subject_points,
            };

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Summary => {
                    match &output.state {
                        IndexState::Ready => println!("Index: ready"),
                        IndexState::Disabled { reason } => {
                            println!("Index: disabled ({reason})")
                        }
                    }
                    println!("  URL: {}", output.url);
                    println!("  Collection: {}", output.collection);
                    println!("  Dimension: {}", output.dimension);
                    println!(
                        "  Embeddings: {} ({})",
                        output.embedding_provider, output.model
                    );
                    if let (Some(subject), Some(count)) = (&subject, output.subject_points) {
                        println!("  Points in {subject}: {count}");
                    }
                }
            }
            Ok(())
        }
    }
}
