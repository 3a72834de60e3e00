
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::path::Path;

use super::{Config, ConfigError, EmbeddingProvider, OllamaConfig, OpenAiConfig};
use crate::embeddings::FailurePolicy;
use crate::embeddings::chunking::ChunkingConfig;

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 Docbot Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir)?;

    eprintln!("{}", style("Embedding Provider").bold().yellow());
    eprintln!("Choose where chunk embeddings are generated.");
    eprintln!();

    configure_embedding(&mut config)?;

    eprintln!();
    match config.embedding.provider {
        EmbeddingProvider::Ollama => {
            eprintln!("{}", style("Ollama Configuration").bold().yellow());
            configure_ollama(&mut config.ollama)?;

            eprintln!();
            eprintln!("{}", style("Testing configuration...").yellow());
            if test_ollama_connection(&config.ollama) {
                eprintln!("{}", style("✓ Ollama connection successful!").green());
            } else {
                eprintln!(
                    "{}",
                    style("⚠ Warning: Could not connect to Ollama").yellow()
                );
                eprintln!("You can continue, but make sure Ollama is running before ingesting.");
            }
        }
        EmbeddingProvider::OpenAi => {
            eprintln!("{}", style("OpenAI Configuration").bold().yellow());
            configure_openai(&mut config.openai)?;

            if std::env::var(&config.openai.api_key_env).is_err() {
                eprintln!(
                    "{}",
                    style(format!(
                        "⚠ Warning: {} is not set in this environment",
                        config.openai.api_key_env
                    ))
                    .yellow()
                );
            }
        }
    }

    eprintln!();
    eprintln!("{}", style("Chunking & Retrieval").bold().yellow());
    configure_chunking(&mut config.chunking)?;
    configure_retrieval(&mut config)?;

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Embedding Settings:").bold().yellow());
    eprintln!("  Provider: {}", style(config.embedding.provider).cyan());
    eprintln!("  Dimension: {}", style(config.embedding.dimension).cyan());
    eprintln!(
        "  On Failure: {}",
        style(policy_label(config.embedding.failure_policy)).cyan()
    );
    eprintln!(
        "  Retries: {} (initial backoff {} ms)",
        style(config.embedding.retry_attempts).cyan(),
        config.embedding.initial_backoff_ms
    );

    eprintln!();
    match config.embedding.provider {
        EmbeddingProvider::Ollama => {
            eprintln!("{}", style("Ollama Settings:").bold().yellow());
            eprintln!("  Model: {}", style(&config.ollama.model).cyan());
            eprintln!("  Batch Size: {}", style(config.ollama.batch_size).cyan());
            match config.ollama_url() {
                Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
                Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
            }
        }
        EmbeddingProvider::OpenAi => {
            eprintln!("{}", style("OpenAI Settings:").bold().yellow());
            eprintln!("  Model: {}", style(&config.openai.model).cyan());
            eprintln!("  Batch Size: {}", style(config.openai.batch_size).cyan());
            eprintln!("  API Key Variable: {}", style(&config.openai.api_key_env).cyan());
            match config.openai.embeddings_url() {
                Ok(url) => eprintln!("  Endpoint: {}", style(url).cyan()),
                Err(e) => eprintln!("  Endpoint: {} ({})", style("Invalid").red(), e),
            }
        }
    }

    eprintln!();
    eprintln!("{}", style("Chunking & Retrieval:").bold().yellow());
    eprintln!("  Chunk Size: {}", style(config.chunking.chunk_size).cyan());
    eprintln!(
        "  Chunk Overlap: {}",
        style(config.chunking.chunk_overlap).cyan()
    );
    eprintln!(
        "  Default top_k: {}",
        style(config.retrieval.default_top_k).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );
    eprintln!("Index snapshot: {}", style(config.snapshot_path().display()).dim());

    Ok(())
}

fn load_existing_config(config_dir: &Path) -> Result<Config> {
    if config_dir.join("config.toml").exists() {
        let config = Config::load(config_dir).context("Failed to load existing configuration")?;
        eprintln!("{}", style("Found existing configuration.").green());
        Ok(config)
    } else {
        eprintln!(
            "{}",
            style("No existing configuration found. Using defaults.").yellow()
        );
        Config::load(config_dir)
    }
}

fn policy_label(policy: FailurePolicy) -> &'static str {
    match policy {
        FailurePolicy::ZeroVector => "store zero vector",
        FailurePolicy::Abort => "abort ingestion",
    }
}

fn configure_embedding(config: &mut Config) -> Result<()> {
    let providers = [EmbeddingProvider::Ollama, EmbeddingProvider::OpenAi];
    let labels = ["ollama (local)", "openai (hosted)"];
    let default_index = providers
        .iter()
        .position(|&p| p == config.embedding.provider)
        .unwrap_or(0);

    let provider_index = Select::new()
        .with_prompt("Embedding provider")
        .default(default_index)
        .items(&labels)
        .interact()?;
    let provider = providers
        .get(provider_index)
        .copied()
        .unwrap_or_default();

    let dimension: usize = Input::new()
        .with_prompt("Embedding dimension")
        .default(config.embedding.dimension)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=8192).contains(input) {
                Ok(())
            } else {
                Err("Dimension must be between 1 and 8192")
            }
        })
        .interact_text()?;

    let policies = [FailurePolicy::ZeroVector, FailurePolicy::Abort];
    let policy_labels: Vec<&str> = policies.iter().map(|&p| policy_label(p)).collect();
    let default_policy = policies
        .iter()
        .position(|&p| p == config.embedding.failure_policy)
        .unwrap_or(0);

    let policy_index = Select::new()
        .with_prompt("When a chunk fails to embed")
        .default(default_policy)
        .items(&policy_labels)
        .interact()?;

    config.embedding.provider = provider;
    config.embedding.set_dimension(dimension)?;
    config.embedding.failure_policy = policies
        .get(policy_index)
        .copied()
        .unwrap_or_default();

    Ok(())
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = ["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(&protocols)
        .interact()?;

    let protocol = protocols
        .get(protocol_index)
        .copied()
        .unwrap_or("http")
        .to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            OllamaConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..OllamaConfig::default()
            }
            .validate()
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(ollama.model.clone())
        .validate_with(non_empty("Model name cannot be empty"))
        .interact_text()?;

    let batch_size = prompt_batch_size(ollama.batch_size)?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;
    ollama.set_model(model)?;
    ollama.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_openai(openai: &mut OpenAiConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("API base URL")
        .default(openai.base_url.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            OpenAiConfig {
                base_url: input.clone(),
                ..OpenAiConfig::default()
            }
            .embeddings_url()
            .map(|_| ())
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(openai.model.clone())
        .validate_with(non_empty("Model name cannot be empty"))
        .interact_text()?;

    let api_key_env: String = Input::new()
        .with_prompt("Environment variable holding the API key")
        .default(openai.api_key_env.clone())
        .validate_with(non_empty("Variable name cannot be empty"))
        .interact_text()?;

    let batch_size = prompt_batch_size(openai.batch_size)?;

    let updated = OpenAiConfig {
        base_url,
        model,
        api_key_env,
        batch_size,
    };
    updated.validate()?;
    *openai = updated;

    Ok(())
}

fn configure_chunking(chunking: &mut ChunkingConfig) -> Result<()> {
    let chunk_size: usize = Input::new()
        .with_prompt("Chunk size (characters)")
        .default(chunking.chunk_size)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=100_000).contains(input) {
                Ok(())
            } else {
                Err("Chunk size must be between 1 and 100000")
            }
        })
        .interact_text()?;

    let chunk_overlap: usize = Input::new()
        .with_prompt("Chunk overlap (characters)")
        .default(chunking.chunk_overlap.min(chunk_size.saturating_sub(1)))
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input < chunk_size {
                Ok(())
            } else {
                Err("Overlap must be smaller than the chunk size")
            }
        })
        .interact_text()?;

    let updated = ChunkingConfig {
        chunk_size,
        chunk_overlap,
    };
    updated.validate()?;
    *chunking = updated;

    Ok(())
}

fn configure_retrieval(config: &mut Config) -> Result<()> {
    let default_top_k: usize = Input::new()
        .with_prompt("Default number of results per query")
        .default(config.retrieval.default_top_k)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=1000).contains(input) {
                Ok(())
            } else {
                Err("Must be between 1 and 1000")
            }
        })
        .interact_text()?;

    config.retrieval.default_top_k = default_top_k;
    config.retrieval.validate()?;
    Ok(())
}

fn prompt_batch_size(current: usize) -> Result<usize> {
    let batch_size: usize = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(current)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 1000 {
                Err("Batch size must be 1000 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    Ok(batch_size)
}

fn non_empty(message: &'static str) -> impl FnMut(&String) -> Result<(), &'static str> {
    move |input: &String| {
        if input.trim().is_empty() {
            Err(message)
        } else {
            Ok(())
        }
    }
}

fn test_ollama_connection(ollama: &OllamaConfig) -> bool {
    let Ok(base) = ollama.ollama_url() else {
        return false;
    };
    let Ok(url) = base.join("api/version") else {
        return false;
    };

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(url.as_str()).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) => (400..500).contains(&code),
        Err(_) => false,
    }
}
