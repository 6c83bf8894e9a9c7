
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::generation::{
    ChatMessage, Completer, GenerationError, GenerationRequest, SamplingOptions, http_agent,
};

/// Chat completions from a local Ollama server via `/api/chat`
#[derive(Debug, Clone)]
pub struct OllamaCompleter {
    chat_url: Url,
    model: String,
    options: SamplingOptions,
    timeout: Duration,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

impl OllamaCompleter {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let chat_url = config
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?
            .join("/api/chat")
            .context("Failed to build chat URL")?;

        let timeout = Duration::from_secs(config.generation.timeout_secs);

        Ok(Self {
            chat_url,
            model: config.ollama.chat_model.clone(),
            options: SamplingOptions::from_config(config),
            timeout,
            agent: http_agent(timeout),
        })
    }
}

impl Completer for OllamaCompleter {
    fn name(&self) -> &str {
        "ollama"
    }

    fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let messages = request.to_messages();
        let body = ChatRequest {
            model: &self.model,
            messages: &messages,
            stream: false,
            options: ChatOptions {
                temperature: self.options.temperature,
                num_predict: self.options.max_tokens,
            },
        };

        let request_json = serde_json::to_string(&body)
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

        debug!(
            "Requesting chat completion from {} with model {}",
            self.chat_url, self.model
        );

        let response_text = self
            .agent
            .post(self.chat_url.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| GenerationError::from_ureq(e, self.timeout))?;

        let response: ChatResponse = serde_json::from_str(&response_text)
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

        Ok(response.message.content)
    }
}
