//! LM client abstraction for the operator layer.
//!
//! Providers sit behind one enum so operators stay provider-agnostic:
//! - OpenRouter via rig-core (the production path)
//! - A scripted backend replaying canned replies (tests, offline dry runs)
//!
//! Transient failures are retried here with exponential backoff; permanent
//! failures propagate to the caller.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rig::client::CompletionClient;
use rig::completion::{AssistantContent, CompletionModel, Message};
use rig::message::{Text, UserContent};
use rig::one_or_many::OneOrMany;
use rig::providers::openrouter;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SkillfabError};

/// Retry attempts for transient LM failures.
pub const MAX_LM_RETRIES: u32 = 3;

/// Base delay for exponential backoff between retries.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

/// Rough chars-per-token ratio used for usage estimation.
const CHARS_PER_TOKEN: f64 = 4.0;

/// Generation knobs applied to every completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmConfig {
    /// Model identifier, e.g. `anthropic/claude-3.5-sonnet`
    pub model: String,
    /// Sampling temperature
    pub temperature: f64,
    /// Response token budget
    pub max_tokens: u64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            model: "anthropic/claude-3.5-sonnet".to_string(),
            temperature: 0.7,
            max_tokens: 8192,
        }
    }
}

/// Usage record returned with every reply.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct LmUsage {
    /// Estimated prompt tokens (chars / 4)
    pub prompt_tokens: u64,
    /// Estimated completion tokens (chars / 4)
    pub completion_tokens: u64,
    /// Wall-clock latency of the call
    pub latency_ms: u64,
}

/// A completed LM call: raw text plus usage.
#[derive(Debug, Clone)]
pub struct LmReply {
    pub text: String,
    pub usage: LmUsage,
}

/// One canned reply for the scripted backend.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Return this JSON value, serialized, as the reply text
    Value(serde_json::Value),
    /// Fail once with a transient error (consumed by retry logic)
    Transient(String),
    /// Fail with a permanent error
    Permanent(String),
}

/// Deterministic offline backend replaying a reply queue.
#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<ScriptedReply>>,
}

impl ScriptedBackend {
    pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
        }
    }

    /// Append a reply to the back of the queue.
    pub fn push(&self, reply: ScriptedReply) {
        self.replies.lock().push_back(reply);
    }

    /// Remaining queued replies.
    pub fn remaining(&self) -> usize {
        self.replies.lock().len()
    }

    fn next(&self) -> Result<String> {
        match self.replies.lock().pop_front() {
            Some(ScriptedReply::Value(value)) => Ok(value.to_string()),
            Some(ScriptedReply::Transient(msg)) => Err(SkillfabError::LmTransient(msg)),
            Some(ScriptedReply::Permanent(msg)) => Err(SkillfabError::LmPermanent(msg)),
            None => Err(SkillfabError::LmPermanent(
                "scripted backend exhausted".to_string(),
            )),
        }
    }
}

/// The provider behind an [`LmClient`].
pub enum LmProvider {
    /// OpenRouter via rig-core
    OpenRouter(openrouter::CompletionModel),
    /// Canned replies for tests and offline runs
    Scripted(ScriptedBackend),
}

/// Provider-agnostic LM client used by every operator.
pub struct LmClient {
    provider: LmProvider,
    config: LmConfig,
}

impl LmClient {
    /// Build an OpenRouter-backed client.
    pub fn openrouter(api_key: &str, config: LmConfig) -> Self {
        let client = openrouter::Client::new(api_key);
        let model = client.completion_model(&config.model);
        Self {
            provider: LmProvider::OpenRouter(model),
            config,
        }
    }

    /// Build a scripted client for tests and dry runs.
    pub fn scripted(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            provider: LmProvider::Scripted(ScriptedBackend::new(replies)),
            config: LmConfig::default(),
        }
    }

    pub fn config(&self) -> &LmConfig {
        &self.config
    }

    /// One completion attempt, no retry.
    async fn complete_once(&self, system: &str, user: &str) -> Result<String> {
        match &self.provider {
            LmProvider::Scripted(backend) => backend.next(),
            LmProvider::OpenRouter(model) => {
                let request = rig::completion::CompletionRequest {
                    preamble: Some(system.to_string()),
                    chat_history: OneOrMany::one(Message::User {
                        content: OneOrMany::one(UserContent::Text(Text {
                            text: user.to_string(),
                        })),
                    }),
                    documents: vec![],
                    tools: vec![],
                    temperature: Some(self.config.temperature),
                    max_tokens: Some(self.config.max_tokens),
                    tool_choice: None,
                    additional_params: None,
                };

                let response = model.completion(request).await.map_err(classify_error)?;

                let mut text = String::new();
                for content in response.choice.iter() {
                    if let AssistantContent::Text(part) = content {
                        text.push_str(&part.text);
                    }
                }
                Ok(text)
            }
        }
    }

    /// Complete with retry: transient failures back off exponentially, up to
    /// [`MAX_LM_RETRIES`] extra attempts; permanent failures return at once.
    pub async fn complete(&self, system: &str, user: &str) -> Result<LmReply> {
        let started = Instant::now();
        let mut attempt = 0u32;

        let text = loop {
            match self.complete_once(system, user).await {
                Ok(text) => break text,
                Err(e) if e.is_transient() && attempt < MAX_LM_RETRIES => {
                    let delay = RETRY_BASE_DELAY * 2u32.pow(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "transient LM failure, backing off: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        let usage = LmUsage {
            prompt_tokens: estimate_tokens(system) + estimate_tokens(user),
            completion_tokens: estimate_tokens(&text),
            latency_ms: started.elapsed().as_millis() as u64,
        };
        Ok(LmReply { text, usage })
    }
}

/// Estimate token count from text length.
fn estimate_tokens(text: &str) -> u64 {
    (text.len() as f64 / CHARS_PER_TOKEN).ceil() as u64
}

/// Classify a provider error as transient (retryable) or permanent.
fn classify_error(error: rig::completion::CompletionError) -> SkillfabError {
    let message = error.to_string();
    let lowered = message.to_lowercase();
    let transient = ["429", "rate limit", "timeout", "timed out", "503", "502", "overloaded"]
        .iter()
        .any(|marker| lowered.contains(marker));
    if transient {
        SkillfabError::LmTransient(message)
    } else {
        SkillfabError::LmPermanent(message)
    }
}
