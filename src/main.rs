//! # Fulltext Vault CLI (`ftv`)
//!
//! The `ftv` binary runs the HTTP service and provides direct commands for
//! uploading, searching, and listing documents against the configured object
//! store.
//!
//! ## Usage
//!
//! ```bash
//! ftv --config ./config/ftv.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ftv serve` | Start the HTTP server |
//! | `ftv upload <path>` | Process and index one document |
//! | `ftv search "<query>"` | Search the stored corpus |
//! | `ftv documents` | List all known document ids |

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use fulltext_vault::admission::AdmissionController;
use fulltext_vault::ocr::DisabledOcr;
use fulltext_vault::pipeline::DocumentProcessor;
use fulltext_vault::search::SearchEngine;
use fulltext_vault::store::{MemoryObjectStore, ObjectStore, S3ObjectStore, StorageGateway};
use fulltext_vault::{config, server};

/// Fulltext Vault — an encrypted per-document full-text indexing and search
/// service.
#[derive(Parser)]
#[command(
    name = "ftv",
    about = "Fulltext Vault — encrypted per-document full-text search",
    version,
    long_about = "Fulltext Vault ingests documents, builds a per-document full-text index, \
    encrypts it at rest, and persists it together with its key in an S3-compatible object \
    store. Searches reconstruct a combined index on demand by fetching, decrypting, and \
    merging every per-document index."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ftv.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind` and serves the upload, search, and health
    /// endpoints until terminated.
    Serve,

    /// Process and index a single document.
    ///
    /// Reads the file, runs it through the full pipeline, and prints the
    /// upload receipt as JSON.
    Upload {
        /// Path to the document to upload.
        path: PathBuf,

        /// Declared MIME type. Inferred from the file extension when omitted.
        #[arg(long)]
        mime_type: Option<String>,

        /// File name recorded in the index. Defaults to the path's file name.
        #[arg(long)]
        file_name: Option<String>,
    },

    /// Search the stored corpus.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// List all known document ids.
    Documents,
}

/// Infer a MIME type from a file extension, for the `upload` convenience
/// command. Unknown extensions fall through to a type the pipeline rejects.
fn detect_mime_type(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some("pdf") => "application/pdf".to_string(),
        Some("txt") => "text/plain".to_string(),
        Some("xml") => "application/xml".to_string(),
        Some("json") => "application/json".to_string(),
        _ => "application/octet-stream".to_string(),
    }
}

fn build_store(cfg: &config::Config) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match cfg.store.backend.as_str() {
        "s3" => Ok(Arc::new(S3ObjectStore::new(
            cfg.store.bucket.clone(),
            cfg.store.region.clone(),
            cfg.store.endpoint_url.clone(),
        )?)),
        "memory" => {
            warn!("memory store backend is ephemeral; data is lost on exit");
            Ok(Arc::new(MemoryObjectStore::new()))
        }
        other => anyhow::bail!("unknown store backend: {other}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    let store = build_store(&cfg)?;
    let storage = StorageGateway::new(store);
    if cfg.store.auto_create_bucket {
        storage.ensure_bucket().await;
    }

    let admission = AdmissionController::new(cfg.upload.max_parallel);
    let processor = Arc::new(DocumentProcessor::new(
        admission,
        storage.clone(),
        Arc::new(DisabledOcr),
        cfg.encryption.key_size,
    ));
    let search = Arc::new(SearchEngine::new(storage.clone()));

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg, processor, search).await?;
        }
        Commands::Upload {
            path,
            mime_type,
            file_name,
        } => {
            let data = std::fs::read(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let mime_type = mime_type.unwrap_or_else(|| detect_mime_type(&path));
            let file_name = file_name.unwrap_or_else(|| {
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "unknown".to_string())
            });

            let receipt = processor.process(file_name, mime_type, data).await?;
            println!("{}", serde_json::to_string_pretty(&receipt)?);
        }
        Commands::Search { query, limit } => {
            let response = search.search(&query, limit).await?;
            if response.results.is_empty() {
                println!("No results.");
            } else {
                for result in &response.results {
                    println!(
                        "{:.4}  {}  {}\n       {}",
                        result.score, result.document_id, result.file_name, result.snippet
                    );
                }
                println!("{} result(s)", response.total_hits);
            }
        }
        Commands::Documents => {
            let ids = storage.list_document_ids().await;
            for id in &ids {
                println!("{}", id);
            }
            println!("{} document(s)", ids.len());
        }
    }

    Ok(())
}
