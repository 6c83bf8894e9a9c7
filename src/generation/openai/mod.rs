
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::generation::{
    ChatMessage, Completer, GenerationError, GenerationRequest, SamplingOptions, http_agent,
};

/// Chat completions from any OpenAI-compatible `/chat/completions` endpoint,
/// such as a hosted inference router
#[derive(Debug, Clone)]
pub struct OpenAiCompleter {
    completions_url: String,
    model: String,
    api_key: Option<String>,
    api_key_env: String,
    options: SamplingOptions,
    timeout: Duration,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompleter {
    /// The API key is read from the configured environment variable now;
    /// a missing key only fails when an answer is requested.
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let endpoint = url::Url::parse(&config.generation.endpoint)
            .with_context(|| format!("Invalid endpoint: {}", config.generation.endpoint))?;

        let api_key_env = config.generation.api_key_env.clone();
        let api_key = std::env::var(&api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            warn!("{} is not set, answers will fail until it is", api_key_env);
        }

        let timeout = Duration::from_secs(config.generation.timeout_secs);

        Ok(Self {
            completions_url: format!(
                "{}/chat/completions",
                endpoint.as_str().trim_end_matches('/')
            ),
            model: config.generation.model.clone(),
            api_key,
            api_key_env,
            options: SamplingOptions::from_config(config),
            timeout,
            agent: http_agent(timeout),
        })
    }

    #[inline]
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

impl Completer for OpenAiCompleter {
    fn name(&self) -> &str {
        "openai"
    }

    fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            GenerationError::Configuration(format!(
                "API key missing, set the {} environment variable",
                self.api_key_env
            ))
        })?;

        let messages = request.to_messages();
        let body = CompletionRequest {
            model: &self.model,
            messages: &messages,
            temperature: self.options.temperature,
            max_tokens: self.options.max_tokens,
        };

        let request_json = serde_json::to_string(&body)
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

        debug!(
            "Requesting chat completion from {} with model {}",
            self.completions_url, self.model
        );

        let response_text = self
            .agent
            .post(self.completions_url.as_str())
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {api_key}"))
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| GenerationError::from_ureq(e, self.timeout))?;

        let response: CompletionResponse = serde_json::from_str(&response_text)
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::MalformedResponse("no choices in response".to_string()))
    }
}
