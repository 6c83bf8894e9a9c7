// Answer policy
// Turns a chat history into a single reply using retrieval and a chat backend


use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use fancy_regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::generation::{
    ChatMessage, Completer, GenerationError, GenerationRequest, ROLE_ASSISTANT, ROLE_USER,
};
use crate::retrieval::RetrievalStore;

pub const INVALID_HISTORY_REPLY: &str = "Please send a valid chat history.";
pub const EMPTY_QUESTION_REPLY: &str = "Please ask a valid question.";
pub const GREETING_REPLY: &str =
    "Hello! I'm your campus assistant. How can I help you with campus information today?";
pub const NO_CONTEXT_PLACEHOLDER: &str = "No context found.";
pub const OUT_OF_SCOPE_REPLY: &str =
    "I'm sorry, I can only help with questions about the campus and its services.";

const GREETINGS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
];

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"));

static SYSTEM_PROMPT: LazyLock<String> = LazyLock::new(|| {
    format!(
        "You are CampusGPT, a helpful assistant for a college campus.\n\
         Answer only questions about the campus: its facilities, staff, departments, courses, \
         events, contact details and other official information. Use the provided context \
         when it is relevant.\n\
         If a question is unrelated to the campus, reply exactly: \"{OUT_OF_SCOPE_REPLY}\"\n\
         Judge every question on its own. An earlier unrelated question must not stop you \
         from answering a later campus question.\n\
         Reply with the final answer only. Never include <think> tags or describe your reasoning."
    )
});

/// The fixed instruction sent with every generation request
#[inline]
pub fn system_prompt() -> &'static str {
    SYSTEM_PROMPT.as_str()
}

/// Why a chat payload was rejected
#[derive(Error, Debug, PartialEq, Eq)]
pub enum HistoryError {
    #[error("history is missing or not a list")]
    NotAList,

    #[error("history is empty")]
    Empty,

    #[error("turn {0} is not a role/content object")]
    InvalidTurn(usize),
}

/// Read `{"history": [{"role": ..., "content": ...}, ...]}`
#[inline]
pub fn parse_history(payload: &serde_json::Value) -> Result<Vec<ChatMessage>, HistoryError> {
    let turns = payload
        .get("history")
        .and_then(serde_json::Value::as_array)
        .ok_or(HistoryError::NotAList)?;

    if turns.is_empty() {
        return Err(HistoryError::Empty);
    }

    turns
        .iter()
        .enumerate()
        .map(|(position, turn)| {
            serde_json::from_value(turn.clone()).map_err(|_| HistoryError::InvalidTurn(position))
        })
        .collect()
}

/// Remove `<think>` blocks and surrounding whitespace from a model reply
#[inline]
pub fn sanitize_reply(raw: &str) -> String {
    THINK_BLOCK.replace_all(raw, "").trim().to_string()
}

fn is_greeting(content: &str) -> bool {
    let normalized = content.trim().to_lowercase();
    GREETINGS.contains(&normalized.as_str())
}

/// The outcome of answering one chat history
#[derive(Debug)]
pub enum Reply {
    /// The history could not be answered as sent
    Validation(&'static str),
    Greeting,
    Generated(String),
    GenerationFailed(GenerationError),
}

impl Reply {
    /// The text shown to the user
    #[inline]
    pub fn into_text(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Reply {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(message) => f.write_str(message),
            Self::Greeting => f.write_str(GREETING_REPLY),
            Self::Generated(text) => f.write_str(text),
            Self::GenerationFailed(error) => write!(f, "Error generating answer: {error}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerSettings {
    /// Passages retrieved per question
    pub top_k: usize,
    /// Earlier user/assistant turns forwarded with the question
    pub history_window: usize,
    /// Upper bound on one generation call
    pub timeout: Duration,
}

impl AnswerSettings {
    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            history_window: config.retrieval.history_window,
            timeout: Duration::from_secs(config.generation.timeout_secs),
        }
    }
}

impl Default for AnswerSettings {
    #[inline]
    fn default() -> Self {
        Self {
            top_k: 5,
            history_window: 0,
            timeout: Duration::from_secs(60),
        }
    }
}

pub struct AnswerPolicy {
    store: Arc<RetrievalStore>,
    completer: Arc<dyn Completer>,
    settings: AnswerSettings,
}

impl AnswerPolicy {
    #[inline]
    pub fn new(
        store: Arc<RetrievalStore>,
        completer: Arc<dyn Completer>,
        settings: AnswerSettings,
    ) -> Self {
        Self {
            store,
            completer,
            settings,
        }
    }

    #[inline]
    pub fn settings(&self) -> &AnswerSettings {
        &self.settings
    }

    /// Answer a raw chat payload. Never fails; every problem becomes reply text.
    #[inline]
    pub async fn answer_payload(&self, payload: &serde_json::Value) -> String {
        match parse_history(payload) {
            Ok(history) => self.answer(&history).await,
            Err(e) => {
                debug!("Rejected chat payload: {}", e);
                INVALID_HISTORY_REPLY.to_string()
            }
        }
    }

    #[inline]
    pub async fn answer(&self, history: &[ChatMessage]) -> String {
        self.respond(history).await.into_text()
    }

    /// Decide how to answer the latest user turn of `history`
    #[inline]
    pub async fn respond(&self, history: &[ChatMessage]) -> Reply {
        let Some((latest, earlier)) = history.split_last() else {
            return Reply::Validation(INVALID_HISTORY_REPLY);
        };

        if latest.role != ROLE_USER || latest.content.trim().is_empty() {
            return Reply::Validation(EMPTY_QUESTION_REPLY);
        }

        if is_greeting(&latest.content) {
            debug!("Greeting detected, skipping retrieval");
            return Reply::Greeting;
        }

        let passages = self
            .store
            .retrieve(&latest.content, self.settings.top_k)
            .await;
        debug!("Using {} passages as context", passages.len());

        let context = if passages.is_empty() {
            NO_CONTEXT_PLACEHOLDER.to_string()
        } else {
            passages.join("\n\n")
        };

        let request = GenerationRequest {
            system_prompt: system_prompt().to_string(),
            context,
            history: self.conversation_window(earlier, latest),
        };

        match self.generate(request).await {
            Ok(raw) => Reply::Generated(sanitize_reply(&raw)),
            Err(e) => {
                warn!("Answer generation failed: {}", e);
                Reply::GenerationFailed(e)
            }
        }
    }

    fn conversation_window(&self, earlier: &[ChatMessage], latest: &ChatMessage) -> Vec<ChatMessage> {
        let conversational: Vec<&ChatMessage> = earlier
            .iter()
            .filter(|turn| turn.role == ROLE_USER || turn.role == ROLE_ASSISTANT)
            .filter(|turn| !turn.content.trim().is_empty())
            .collect();

        let skip = conversational
            .len()
            .saturating_sub(self.settings.history_window);

        conversational
            .into_iter()
            .skip(skip)
            .cloned()
            .chain(std::iter::once(latest.clone()))
            .collect()
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let completer = Arc::clone(&self.completer);
        let timeout = self.settings.timeout;

        info!(
            "Generating answer with {} ({} messages)",
            completer.name(),
            request.history.len() + 2
        );

        let task = tokio::task::spawn_blocking(move || completer.complete(&request));

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(GenerationError::Interrupted(join_error.to_string())),
            Err(_) => Err(GenerationError::Timeout(timeout)),
        }
    }
}
