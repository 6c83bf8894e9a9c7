// Configuration management module
// TOML settings plus the interactive editor used by `campus-rag config`

pub mod interactive;
pub mod settings;

#[cfg(test)]
mod tests;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    CompleterKind, Config, ConfigError, EmbedderKind, GenerationConfig, KnowledgeBaseConfig,
    OllamaConfig, RetrievalConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
