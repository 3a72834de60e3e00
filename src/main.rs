use anyhow::Context;
use clap::{Parser, Subcommand};
use docbot::Result;
use docbot::commands::{
    clear_index, ingest_files, list_documents, query, remove_document, show_status,
};
use docbot::config::{get_config_dir, run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "docbot")]
#[command(about = "Chunk, embed and search local documents")]
#[command(version)]
struct Cli {
    /// Configuration directory (defaults to ~/.docbot)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedding provider, chunking and retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Chunk, embed and index text files
    Ingest {
        /// Files containing extracted document text
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Name used to derive the document ID instead of the file name
        #[arg(long)]
        name: Option<String>,
        /// Explicit document ID (single file only)
        #[arg(long)]
        id: Option<String>,
    },
    /// Search the index for chunks relevant to a question
    Query {
        /// Free-text query
        text: String,
        /// Number of results to return
        #[arg(long)]
        top_k: Option<usize>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a document and all its chunks
    Remove {
        /// Document ID as shown by `list`
        document_id: String,
    },
    /// List indexed documents
    List,
    /// Show configuration, index and embedder status
    Status,
    /// Remove every document from the index
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir().context("Failed to determine configuration directory")?,
    };

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Ingest { paths, name, id } => {
            ingest_files(&config_dir, &paths, name.as_deref(), id.as_deref())?;
        }
        Commands::Query { text, top_k, json } => {
            query(&config_dir, &text, top_k, json)?;
        }
        Commands::Remove { document_id } => {
            remove_document(&config_dir, &document_id)?;
        }
        Commands::List => {
            list_documents(&config_dir)?;
        }
        Commands::Status => {
            show_status(&config_dir)?;
        }
        Commands::Clear { yes } => {
            clear_index(&config_dir, yes)?;
        }
    }

    Ok(())
}
