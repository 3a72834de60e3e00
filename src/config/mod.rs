// Configuration management module
// TOML settings for the embedding back-ends, chunking and retrieval

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, DEFAULT_EMBEDDING_DIMENSION, EmbeddingConfig, EmbeddingProvider,
    OllamaConfig, OpenAiConfig, RetrievalConfig,
};

/// Get the default configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_dir()
}
