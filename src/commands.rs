use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::embeddings::{DocumentId, EmbeddingBackend};
use crate::index::{VectorIndex, snapshot};
use crate::retrieval::{EngineOptions, RetrievalEngine};

/// Outcome of an `ingest` run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub ingested: Vec<(DocumentId, usize)>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Load the saved index, or an empty one sized for the configured dimension
#[inline]
pub fn load_index(config: &Config) -> Result<VectorIndex> {
    let path = config.snapshot_path();
    if !path.exists() {
        debug!("No snapshot at {}, starting empty", path.display());
        return Ok(VectorIndex::new(config.embedding.dimension));
    }

    snapshot::load(&path)
        .with_context(|| format!("Failed to load index snapshot: {}", path.display()))
}

/// Build the configured embedder and attach it to the saved index
#[inline]
pub fn open_engine(config: &Config) -> Result<RetrievalEngine<EmbeddingBackend>> {
    let embedder = EmbeddingBackend::from_config(config)?;
    let index = load_index(config)?;

    RetrievalEngine::with_index(embedder, index, EngineOptions::from_config(config)).with_context(
        || {
            format!(
                "Saved index does not match the configured embedding dimension; run 'docbot clear' or restore dimension in {}",
                config.config_file_path().display()
            )
        },
    )
}

/// Ingest UTF-8 text files into the index
#[inline]
pub fn ingest_files(
    config_dir: &Path,
    paths: &[PathBuf],
    name: Option<&str>,
    id: Option<&str>,
) -> Result<IngestReport> {
    if id.is_some() && paths.len() > 1 {
        bail!("--id can only be used when ingesting a single file");
    }

    let config = Config::load(config_dir).context("Failed to load configuration")?;
    let engine = open_engine(&config)?;
    let mut report = IngestReport::default();

    let bar = if console::user_attended_stderr() {
        ProgressBar::new(paths.len() as u64).with_style(
            ProgressStyle::with_template("{bar:30} [{pos}/{len}] Ingesting {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        )
    } else {
        ProgressBar::hidden()
    };

    for path in paths {
        bar.set_message(path.display().to_string());

        match ingest_file(&engine, path, name, id) {
            Ok((document_id, chunk_count)) => {
                bar.println(format!(
                    "{} {} → {} ({} chunks)",
                    style("✓").green(),
                    path.display(),
                    document_id,
                    chunk_count
                ));
                report.ingested.push((document_id, chunk_count));
            }
            Err(e) => {
                warn!("Skipping {}: {:#}", path.display(), e);
                bar.println(format!(
                    "{} {}: {:#}",
                    style("✗").red(),
                    path.display(),
                    e
                ));
                report.failed.push((path.clone(), format!("{:#}", e)));
            }
        }

        bar.inc(1);
    }
    bar.finish_and_clear();

    if !report.ingested.is_empty() {
        engine
            .save_snapshot(config.snapshot_path())
            .context("Failed to save index snapshot")?;
    }

    println!(
        "Ingested {} document(s), {} failed. Index holds {} chunks.",
        report.ingested.len(),
        report.failed.len(),
        engine.count()
    );

    Ok(report)
}

fn ingest_file(
    engine: &RetrievalEngine<EmbeddingBackend>,
    path: &Path,
    name: Option<&str>,
    id: Option<&str>,
) -> Result<(DocumentId, usize)> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let document_id = match id {
        Some(id) => DocumentId::new(id),
        None => {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            DocumentId::derive(&bytes, name.unwrap_or(&file_name))
        }
    };

    let text = String::from_utf8(bytes).context("File is not valid UTF-8 text")?;
    let chunks = engine.ingest(&text, &document_id)?;

    info!("Ingested {} as {}", path.display(), document_id);
    Ok((document_id, chunks.len()))
}

/// Query the index and print the ranked chunks
#[inline]
pub fn query(config_dir: &Path, text: &str, top_k: Option<usize>, json: bool) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;
    let engine = open_engine(&config)?;

    let results = engine.query(text, top_k)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&results).context("Failed to serialize results")?
        );
        return Ok(());
    }

    if results.is_empty() {
        println!("No results. Use 'docbot ingest <path>' to add documents.");
        return Ok(());
    }

    for (rank, result) in results.iter().enumerate() {
        println!(
            "{}. {} #{} (score {:.4})",
            rank + 1,
            style(&result.chunk.document_id).cyan(),
            result.chunk.position_index,
            result.similarity_score
        );
        for line in result.chunk.text.lines() {
            println!("   {}", line);
        }
        println!();
    }

    Ok(())
}

/// Remove a document from the saved index
#[inline]
pub fn remove_document(config_dir: &Path, document_id: &str) -> Result<usize> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;
    let mut index = load_index(&config)?;

    let removed = index.remove(&DocumentId::new(document_id));
    if removed == 0 {
        println!("Document {} is not indexed.", document_id);
        return Ok(0);
    }

    snapshot::save(&index, config.snapshot_path()).context("Failed to save index snapshot")?;
    println!(
        "✓ Removed document {} ({} chunks)",
        document_id, removed
    );
    Ok(removed)
}

/// List indexed documents with their chunk counts
#[inline]
pub fn list_documents(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;
    let index = load_index(&config)?;
    let documents = index.documents();

    if documents.is_empty() {
        println!("No documents have been ingested yet.");
        println!("Use 'docbot ingest <path>' to add a document.");
        return Ok(());
    }

    println!("Indexed Documents ({} total):", documents.len());
    println!();
    for document in &documents {
        println!(
            "📄 {} ({} chunks)",
            document.document_id, document.chunk_count
        );
    }
    println!();
    println!("Total chunks: {}", index.count());

    Ok(())
}

/// Show configuration, index and embedder health
#[inline]
pub fn show_status(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    println!("📊 Docbot Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🗂️  Configuration:");
    println!("   📁 Directory: {}", config_dir.display());
    println!("   🔌 Provider: {}", config.embedding.provider);
    println!("   🔢 Dimension: {}", config.embedding.dimension);
    println!();

    println!("🔍 Index Status:");
    match load_index(&config) {
        Ok(index) => {
            println!("   ✅ Snapshot: {}", config.snapshot_path().display());
            println!("   📚 Documents: {}", index.documents().len());
            println!("   🧩 Chunks: {}", index.count());
            if index.dimension() != config.embedding.dimension {
                println!(
                    "   ⚠️  Index dimension {} differs from configured {}",
                    index.dimension(),
                    config.embedding.dimension
                );
            }
        }
        Err(e) => println!("   ❌ Snapshot unreadable - {:#}", e),
    }
    println!();

    println!("🤖 Embedder Status:");
    match EmbeddingBackend::from_config(&config) {
        Ok(backend) => match backend.health_check() {
            Ok(()) => {
                println!(
                    "   ✅ {}: Connected and healthy",
                    backend.provider()
                );
                println!("   📋 Model: {}", backend.model());
            }
            Err(e) => println!("   ⚠️  {}: Unhealthy - {:#}", backend.provider(), e),
        },
        Err(e) => println!("   ❌ Failed to initialize - {:#}", e),
    }

    Ok(())
}

/// Remove every document from the saved index
#[inline]
pub fn clear_index(config_dir: &Path, yes: bool) -> Result<bool> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;
    let path = config.snapshot_path();

    if !path.exists() {
        println!("Index is already empty.");
        return Ok(false);
    }

    if !yes
        && !Confirm::new()
            .with_prompt("Remove all indexed documents? This action cannot be undone.")
            .default(false)
            .interact()?
    {
        println!("Index not cleared.");
        return Ok(false);
    }

    fs::remove_file(&path)
        .with_context(|| format!("Failed to remove snapshot: {}", path.display()))?;
    println!("✓ Index cleared");
    Ok(true)
}
