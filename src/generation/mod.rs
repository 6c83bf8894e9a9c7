// Answer generation
// Chat-completion backends behind the Completer trait

pub mod ollama;
pub mod openai;


use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::{CompleterKind, Config};
use crate::{CampusError, Result};

pub use ollama::OllamaCompleter;
pub use openai::OpenAiCompleter;

pub const ROLE_SYSTEM: &str = "system";
pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ROLE_SYSTEM, content)
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ROLE_USER, content)
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ROLE_ASSISTANT, content)
    }
}

/// Everything a backend needs to produce one reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub system_prompt: String,
    /// Retrieved passages, or a placeholder when nothing matched
    pub context: String,
    /// Conversation turns to forward, oldest first, ending with the question
    pub history: Vec<ChatMessage>,
}

impl GenerationRequest {
    /// The message list sent to chat-completion APIs
    #[inline]
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.push(ChatMessage::system(format!(
            "Relevant context from documents:\n{}",
            self.context
        )));
        messages.extend(self.history.iter().cloned());
        messages
    }
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("could not reach the model provider: {0}")]
    Transport(String),

    #[error("model provider returned HTTP {status}")]
    Provider { status: u16 },

    #[error("unexpected response from model provider: {0}")]
    MalformedResponse(String),

    #[error("{0}")]
    Configuration(String),

    #[error("generation was interrupted: {0}")]
    Interrupted(String),
}

impl GenerationError {
    pub(crate) fn from_ureq(error: ureq::Error, timeout: Duration) -> Self {
        match error {
            ureq::Error::StatusCode(status) => Self::Provider { status },
            ureq::Error::Timeout(_) => Self::Timeout(timeout),
            other => Self::Transport(other.to_string()),
        }
    }
}

/// A chat-completion backend. Calls block; async callers use `spawn_blocking`.
pub trait Completer: Send + Sync {
    fn name(&self) -> &str;

    fn complete(&self, request: &GenerationRequest) -> std::result::Result<String, GenerationError>;
}

/// Sampling parameters sent with every completion request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl SamplingOptions {
    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self {
            temperature: config.generation.temperature,
            max_tokens: config.generation.max_tokens,
        }
    }
}

pub(crate) fn http_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// Build the completer selected in the configuration
#[inline]
pub fn build_completer(config: &Config) -> Result<Arc<dyn Completer>> {
    let completer: Arc<dyn Completer> = match config.generation.backend {
        CompleterKind::Ollama => Arc::new(
            OllamaCompleter::new(config)
                .map_err(|e| CampusError::Config(format!("Failed to create Ollama completer: {e:#}")))?,
        ),
        CompleterKind::OpenAi => Arc::new(
            OpenAiCompleter::new(config)
                .map_err(|e| CampusError::Config(format!("Failed to create API completer: {e:#}")))?,
        ),
    };

    info!("Using {} backend for answers", completer.name());
    Ok(completer)
}
