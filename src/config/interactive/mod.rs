#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{CompleterKind, Config, ConfigError, EmbedderKind, GenerationConfig, OllamaConfig};

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 Campus RAG Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Ollama Configuration").bold().yellow());
    eprintln!("Configure your local Ollama instance for embeddings and chat.");
    eprintln!();

    configure_ollama(&mut config.ollama)?;

    eprintln!();
    eprintln!("{}", style("Retrieval Configuration").bold().yellow());
    configure_retrieval(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Answer Generation").bold().yellow());
    configure_generation(&mut config.generation)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_ollama_connection(&config.ollama)? {
        eprintln!("{}", style("✓ Ollama connection successful!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not connect to Ollama").yellow()
        );
        eprintln!("You can continue, but make sure Ollama is running before indexing.");
    }

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
pub fn show_config() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    eprintln!("  Host: {}", style(&config.ollama.host).cyan());
    eprintln!("  Port: {}", style(config.ollama.port).cyan());
    eprintln!(
        "  Embedding Model: {}",
        style(&config.ollama.embedding_model).cyan()
    );
    eprintln!("  Chat Model: {}", style(&config.ollama.chat_model).cyan());
    eprintln!("  Batch Size: {}", style(config.ollama.batch_size).cyan());
    match config.ollama_url() {
        Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }

    eprintln!();
    eprintln!("{}", style("Retrieval:").bold().yellow());
    eprintln!("  Embedder: {}", style(config.retrieval.embedder).cyan());
    if config.retrieval.embedder == EmbedderKind::Hashing {
        eprintln!(
            "  Hashing Dimension: {}",
            style(config.retrieval.hashing_dimension).cyan()
        );
    }
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());
    eprintln!(
        "  History Window: {}",
        style(config.retrieval.history_window).cyan()
    );
    eprintln!(
        "  Minimum Chunk Length: {}",
        style(config.chunking.min_chunk_chars).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Generation:").bold().yellow());
    eprintln!("  Backend: {}", style(config.generation.backend).cyan());
    if config.generation.backend == CompleterKind::OpenAi {
        eprintln!("  Endpoint: {}", style(&config.generation.endpoint).cyan());
        eprintln!("  Model: {}", style(&config.generation.model).cyan());
        eprintln!(
            "  API Key Variable: {}",
            style(&config.generation.api_key_env).cyan()
        );
    }
    eprintln!(
        "  Temperature: {}",
        style(config.generation.temperature).cyan()
    );
    eprintln!("  Max Tokens: {}", style(config.generation.max_tokens).cyan());
    eprintln!(
        "  Timeout: {}s",
        style(config.generation.timeout_secs).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Knowledge Base:").bold().yellow());
    eprintln!("  Documents: {}", style(config.docs_dir().display()).cyan());
    eprintln!(
        "  Locations: {}",
        style(config.locations_dir().display()).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    Config::load_default().map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Ok(Config::default())
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = OllamaConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..OllamaConfig::default()
            };
            temp_config.ollama_url()?;
            Ok(())
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

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(ollama.embedding_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let chat_model: String = Input::new()
        .with_prompt("Chat model")
        .default(ollama.chat_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(ollama.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 1000 {
                Err("Batch size must be 1000 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;
    ollama.set_embedding_model(embedding_model)?;
    ollama.set_chat_model(chat_model)?;
    ollama.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_retrieval(config: &mut Config) -> Result<()> {
    let embedders = &[EmbedderKind::Ollama, EmbedderKind::Hashing];
    let default_index = embedders
        .iter()
        .position(|&e| e == config.retrieval.embedder)
        .unwrap_or(0);

    let embedder_index = Select::new()
        .with_prompt("Embedding backend")
        .default(default_index)
        .items(&["ollama (semantic)", "hashing (offline, lexical)"])
        .interact()?;
    config.retrieval.embedder = embedders[embedder_index];

    if config.retrieval.embedder == EmbedderKind::Hashing {
        config.retrieval.hashing_dimension = Input::new()
            .with_prompt("Hashing vector dimension")
            .default(config.retrieval.hashing_dimension)
            .validate_with(|input: &usize| -> Result<(), &str> {
                if (16..=16384).contains(input) {
                    Ok(())
                } else {
                    Err("Must be between 16 and 16384")
                }
            })
            .interact_text()?;
    }

    config.retrieval.top_k = Input::new()
        .with_prompt("Passages retrieved per question")
        .default(config.retrieval.top_k)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=50).contains(input) {
                Ok(())
            } else {
                Err("Must be between 1 and 50")
            }
        })
        .interact_text()?;

    config.retrieval.history_window = Input::new()
        .with_prompt("Previous turns forwarded to the model (0 = latest question only)")
        .default(config.retrieval.history_window)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input <= 50 {
                Ok(())
            } else {
                Err("Must be 50 or less")
            }
        })
        .interact_text()?;

    Ok(())
}

fn configure_generation(generation: &mut GenerationConfig) -> Result<()> {
    let backends = &[CompleterKind::Ollama, CompleterKind::OpenAi];
    let default_index = backends
        .iter()
        .position(|&b| b == generation.backend)
        .unwrap_or(0);

    let backend_index = Select::new()
        .with_prompt("Chat backend")
        .default(default_index)
        .items(&["ollama", "openai-compatible API"])
        .interact()?;
    generation.backend = backends[backend_index];

    if generation.backend == CompleterKind::OpenAi {
        generation.endpoint = Input::new()
            .with_prompt("API base URL")
            .default(generation.endpoint.clone())
            .validate_with(|input: &String| -> Result<(), ConfigError> {
                url::Url::parse(input).map_err(|_| ConfigError::InvalidUrl(input.clone()))?;
                Ok(())
            })
            .interact_text()?;

        generation.model = Input::new()
            .with_prompt("Model")
            .default(generation.model.clone())
            .validate_with(non_empty)
            .interact_text()?;

        generation.api_key_env = Input::new()
            .with_prompt("Environment variable holding the API key")
            .default(generation.api_key_env.clone())
            .validate_with(non_empty)
            .interact_text()?;
    }

    generation.timeout_secs = Input::new()
        .with_prompt("Answer timeout (seconds)")
        .default(generation.timeout_secs)
        .validate_with(|input: &u64| -> Result<(), &str> {
            if (1..=600).contains(input) {
                Ok(())
            } else {
                Err("Must be between 1 and 600")
            }
        })
        .interact_text()?;

    Ok(())
}

fn non_empty(input: &String) -> Result<(), &'static str> {
    if input.trim().is_empty() {
        Err("Value cannot be empty")
    } else {
        Ok(())
    }
}

fn test_ollama_connection(ollama: &OllamaConfig) -> Result<bool> {
    let url = format!(
        "{}://{}:{}/api/version",
        ollama.protocol, ollama.host, ollama.port
    );

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(&url).call() {
        Ok(_) => Ok(true),
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => Ok(true),
        Err(_) => Ok(false),
    }
}
