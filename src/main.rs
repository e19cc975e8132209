//! # docchat CLI
//!
//! The `docchat` binary is the thin front end over the retrieval-augmented
//! chat core. It provides commands for database initialization, document
//! ingestion and removal, asking questions, and inspecting index health.
//!
//! ## Usage
//!
//! ```bash
//! docchat --config ./config/docchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat init` | Create the SQLite database and run schema migrations |
//! | `docchat add <file>` | Ingest a document (pdf, txt, md) |
//! | `docchat list` | List ingested documents |
//! | `docchat remove <id>` | Remove a document and its chunks |
//! | `docchat ask "<question>"` | Ask a question over the ingested documents |
//! | `docchat stats` | Show document/chunk counts and database size |
//! | `docchat status` | Check generation backend reachability |
//! | `docchat models` | List models offered by the generation backend |

use anyhow::Result;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::path::PathBuf;

use docchat::config::{load_config, Config};
use docchat::service::RagService;

/// docchat — chat with your documents, locally.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Missing sections fall back to defaults (local Ollama backends,
/// `./data` storage).
#[derive(Parser)]
#[command(
    name = "docchat",
    about = "A local-first retrieval-augmented chat core for private document collections",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Ingest a document into the index.
    Add {
        /// Path to a pdf, txt, or md file.
        file: PathBuf,
    },

    /// List ingested documents.
    List,

    /// Remove a document and all of its chunks.
    Remove {
        /// Document id (as shown by `list`).
        id: String,
    },

    /// Ask a question over the ingested documents.
    Ask {
        /// The question.
        question: String,

        /// Stream the answer as it is generated.
        #[arg(long)]
        stream: bool,
    },

    /// Show index statistics.
    Stats,

    /// Check generation backend reachability and document counts.
    Status,

    /// List models offered by the generation backend.
    Models,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    // A missing config file is fine for every command: defaults stand in.
    let config = if cli.config.exists() {
        load_config(&cli.config)?
    } else {
        Config::default()
    };

    match cli.command {
        Commands::Init => run_init(config).await,
        Commands::Add { file } => run_add(config, &file).await,
        Commands::List => run_list(config).await,
        Commands::Remove { id } => run_remove(config, &id).await,
        Commands::Ask { question, stream } => run_ask(config, &question, stream).await,
        Commands::Stats => run_stats(config).await,
        Commands::Status => run_status(config).await,
        Commands::Models => run_models(config).await,
    }
}

async fn run_init(config: Config) -> Result<()> {
    let pool = docchat::db::connect(&config.storage.db_path).await?;
    docchat::migrate::run_migrations(&pool).await?;
    pool.close().await;
    println!("initialized {}", config.storage.db_path.display());
    Ok(())
}

async fn run_add(config: Config, file: &PathBuf) -> Result<()> {
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("invalid file name: {}", file.display()))?
        .to_string();
    let content = std::fs::read(file)?;

    let service = RagService::open(config).await?;
    let doc = service.ingest(&filename, &content).await?;

    println!("add {}", doc.name);
    println!("  id: {}", doc.id);
    println!("  chunks: {}", doc.chunk_count);
    println!("  size: {}", format_bytes(doc.size_bytes));
    println!("ok");
    Ok(())
}

async fn run_list(config: Config) -> Result<()> {
    let service = RagService::open(config).await?;
    let documents = service.documents();

    if documents.is_empty() {
        println!("No documents.");
        return Ok(());
    }

    println!(
        "{:<18} {:<32} {:>6} {:>10}   {}",
        "ID", "NAME", "CHUNKS", "SIZE", "ADDED"
    );
    for doc in documents {
        println!(
            "{:<18} {:<32} {:>6} {:>10}   {}",
            doc.id,
            doc.name,
            doc.chunk_count,
            format_bytes(doc.size_bytes),
            doc.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

async fn run_remove(config: Config, id: &str) -> Result<()> {
    let service = RagService::open(config).await?;
    if service.remove(id).await? {
        println!("removed {}", id);
    } else {
        println!("not found: {}", id);
    }
    Ok(())
}

async fn run_ask(config: Config, question: &str, stream: bool) -> Result<()> {
    let service = RagService::open(config).await?;

    if stream {
        use std::io::Write;
        let mut chat = service.ask_stream(question, &[]).await?;
        while let Some(fragment) = chat.stream.next().await {
            print!("{}", fragment?);
            std::io::stdout().flush()?;
        }
        println!();
        print_sources(&chat.sources);
    } else {
        let outcome = service.ask(question, &[]).await?;
        println!("{}", outcome.answer);
        print_sources(&outcome.sources);
        println!();
        println!("  model: {}  ({} ms)", outcome.model_used, outcome.elapsed_ms);
    }
    Ok(())
}

fn print_sources(sources: &[docchat::models::SourceMatch]) {
    if sources.is_empty() {
        return;
    }
    println!();
    println!("Sources:");
    for source in sources {
        println!(
            "  [{:.3}] {} (chunk {})",
            source.relevance_score, source.document_name, source.chunk_index
        );
    }
}

async fn run_stats(config: Config) -> Result<()> {
    let db_path = config.storage.db_path.clone();
    let service = RagService::open(config).await?;
    let stats = service.stats().await?;

    let db_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    println!("docchat — Index Stats");
    println!("=====================");
    println!();
    println!("  Database:    {}", db_path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Documents:   {}", stats.document_count);
    println!("  Chunks:      {}", stats.chunk_count);
    Ok(())
}

async fn run_status(config: Config) -> Result<()> {
    let service = RagService::open(config).await?;
    let health = service.health().await;

    println!(
        "generation backend: {}",
        if health.generator_available {
            "connected"
        } else {
            "unreachable"
        }
    );
    println!("documents: {}", health.document_count);
    if !health.available_models.is_empty() {
        println!("models:");
        for model in &health.available_models {
            println!("  {}", model);
        }
    }
    Ok(())
}

async fn run_models(config: Config) -> Result<()> {
    let service = RagService::open(config).await?;
    let current = service.generator().model_name().to_string();
    let models = service.generator().list_models().await;

    if models.is_empty() {
        println!("No models available (is the backend running?).");
    } else {
        for model in &models {
            let marker = if model == &current { " *" } else { "" };
            println!("{}{}", model, marker);
        }
    }
    println!("current: {}", current);
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
