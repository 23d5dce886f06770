//! The language-model port and its backends.
//!
//! Two methods make up the whole contract:
//!
//! - [`LanguageModel::sample_text`] returns only the completion,
//!   truncated at the first configured terminator.
//! - [`LanguageModel::sample_choice`] presents options numbered from 1,
//!   asks for a number, extracts the first integer from the reply, and
//!   retries up to three times before failing with
//!   [`LlmError::InvalidResponse`].
//!
//! Backends use enum dispatch instead of trait objects because async
//! methods are not dyn-compatible in Rust.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use regex::Regex;
use tracing::warn;

use crate::error::LlmError;

/// Default maximum completion tokens.
pub const DEFAULT_MAX_TOKENS: u32 = 5000;
/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f64 = 1.0;
/// Default nucleus-sampling cutoff.
pub const DEFAULT_TOP_P: f64 = 0.95;
/// Default top-k cutoff.
pub const DEFAULT_TOP_K: u32 = 64;
/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// How many times `sample_choice` re-asks before giving up.
const CHOICE_ATTEMPTS: u32 = 3;

/// Tunable sampling parameters for one `sample_text` call.
#[derive(Debug, Clone)]
pub struct SampleOptions {
    /// Maximum number of completion tokens.
    pub max_tokens: u32,
    /// The completion is cut before the first occurrence of any of these.
    pub terminators: Vec<String>,
    /// Sampling temperature.
    pub temperature: f64,
    /// Nucleus-sampling cutoff.
    pub top_p: f64,
    /// Top-k cutoff (advisory; not every backend supports it).
    pub top_k: u32,
    /// Per-call timeout.
    pub timeout: Duration,
    /// Optional sampling seed for reproducibility.
    pub seed: Option<u64>,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            terminators: Vec::new(),
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            top_k: DEFAULT_TOP_K,
            timeout: DEFAULT_TIMEOUT,
            seed: None,
        }
    }
}

/// The outcome of a `sample_choice` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    /// Zero-based index of the selected option.
    pub index: usize,
    /// The text of the selected option.
    pub response: String,
    /// Extra information about the sampling (raw reply, attempts).
    pub info: BTreeMap<String, String>,
}

/// A language-model backend.
pub enum LanguageModel {
    /// OpenAI-compatible chat completions API over HTTP.
    OpenAi(OpenAiModel),
    /// Scripted responses for tests and offline development. Held by
    /// `Arc` so a test can keep a handle for queueing replies and
    /// inspecting recorded prompts after the model is wrapped.
    Scripted(std::sync::Arc<ScriptedModel>),
}

impl LanguageModel {
    /// Human-readable backend name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::OpenAi(_) => "openai-compatible",
            Self::Scripted(_) => "scripted",
        }
    }

    /// Sample a completion for `prompt`.
    ///
    /// Returns only the completion, truncated before the first occurrence
    /// of any terminator in `options.terminators`.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError`] if the backend fails.
    pub async fn sample_text(
        &self,
        prompt: &str,
        options: &SampleOptions,
    ) -> Result<String, LlmError> {
        let raw = match self {
            Self::OpenAi(backend) => backend.complete(None, prompt, options).await?,
            Self::Scripted(backend) => {
                backend.record_prompt(prompt);
                backend.next_response()?
            }
        };
        Ok(truncate_at_terminators(raw, &options.terminators))
    }

    /// Sample a completion conditioned on a system prompt.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError`] if the backend fails.
    pub async fn sample_with_system_prompt(
        &self,
        system: &str,
        user: &str,
        options: &SampleOptions,
    ) -> Result<String, LlmError> {
        let raw = match self {
            Self::OpenAi(backend) => backend.complete(Some(system), user, options).await?,
            Self::Scripted(backend) => {
                backend.record_prompt(&format!("{system}\n\n{user}"));
                backend.next_response()?
            }
        };
        Ok(truncate_at_terminators(raw, &options.terminators))
    }

    /// Ask the model to pick one of `responses`.
    ///
    /// Options are numbered from 1; the first integer found in the reply
    /// selects the option. Up to three attempts are made.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::InvalidResponse`] when no attempt produces a
    /// valid number, or the backend's error if every attempt fails at
    /// the transport level.
    pub async fn sample_choice(
        &self,
        prompt: &str,
        responses: &[String],
        seed: Option<u64>,
    ) -> Result<Choice, LlmError> {
        if responses.is_empty() {
            return Err(LlmError::InvalidResponse { attempts: 0 });
        }

        let options_text: String = responses
            .iter()
            .enumerate()
            .map(|(idx, response)| format!("{}. {response}\n", idx.saturating_add(1)))
            .collect();
        let selection_prompt = format!(
            "{prompt}\n\nChoose ONE of the following options by responding with just \
             the number:\n{options_text}\nYour choice (number only):"
        );
        let sample_options = SampleOptions {
            seed,
            ..SampleOptions::default()
        };

        for attempt in 1..=CHOICE_ATTEMPTS {
            let reply = match self.sample_text(&selection_prompt, &sample_options).await {
                Ok(reply) => reply,
                Err(err) => {
                    warn!(attempt, %err, "sample_choice attempt failed");
                    continue;
                }
            };

            if let Some(number) = first_integer(&reply)
                && number >= 1
                && number <= responses.len()
            {
                let index = number.saturating_sub(1);
                let Some(response) = responses.get(index) else {
                    continue;
                };
                let mut info = BTreeMap::new();
                info.insert(String::from("raw_response"), reply.trim().to_owned());
                info.insert(String::from("attempts"), attempt.to_string());
                return Ok(Choice {
                    index,
                    response: response.clone(),
                    info,
                });
            }
            warn!(attempt, reply = %reply.trim(), "sample_choice reply had no valid number");
        }

        Err(LlmError::InvalidResponse {
            attempts: CHOICE_ATTEMPTS,
        })
    }
}

/// Cut `text` before the first occurrence of any terminator.
fn truncate_at_terminators(text: String, terminators: &[String]) -> String {
    let mut cut = text.len();
    for terminator in terminators {
        if terminator.is_empty() {
            continue;
        }
        if let Some(position) = text.find(terminator.as_str()) {
            cut = cut.min(position);
        }
    }
    text.get(..cut).unwrap_or_default().to_owned()
}

/// Extract the first unsigned integer appearing in `text`.
#[allow(clippy::unwrap_used)]
fn first_integer(text: &str) -> Option<usize> {
    static PATTERN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    // The literal pattern is valid; a parse failure is unreachable.
    let regex = PATTERN.get_or_init(|| Regex::new(r"\d+").unwrap());
    regex.find(text)?.as_str().parse().ok()
}

// ---------------------------------------------------------------------------
// OpenAI-compatible backend
// ---------------------------------------------------------------------------

/// Backend for OpenAI-compatible chat completions APIs.
///
/// Works with any endpoint exposing `{base_url}/chat/completions`
/// (`OpenAI`, `OpenRouter`, Ollama, vLLM).
pub struct OpenAiModel {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiModel {
    /// Create an OpenAI-compatible backend.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// The configured model name.
    pub fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        system: Option<&str>,
        user: &str,
        options: &SampleOptions,
    ) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        messages.push(serde_json::json!({"role": "user", "content": user}));

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": options.temperature,
            "top_p": options.top_p,
            "max_tokens": options.max_tokens,
        });
        if let (Some(seed), Some(map)) = (options.seed, body.as_object_mut()) {
            map.insert(String::from("seed"), serde_json::json!(seed));
        }

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .timeout(options.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Backend {
                message: format!("request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unable to read error body"));
            return Err(LlmError::Backend {
                message: format!("backend returned {status}: {error_body}"),
            });
        }

        let json: serde_json::Value = response.json().await.map_err(|e| LlmError::Backend {
            message: format!("response parse failed: {e}"),
        })?;

        extract_openai_content(&json)
    }
}

/// Extract the text content from an OpenAI chat completions response.
fn extract_openai_content(json: &serde_json::Value) -> Result<String, LlmError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| LlmError::Backend {
            message: String::from("response missing choices[0].message.content"),
        })
}

// ---------------------------------------------------------------------------
// Scripted backend
// ---------------------------------------------------------------------------

/// One queued scripted reply: either a completion or an injected failure.
enum ScriptedReply {
    Text(String),
    Failure(String),
}

/// A backend that replays queued responses.
///
/// Used by the test suite and by offline development runs. Prompts are
/// never inspected; replies come back in queue order. An empty queue is
/// an error so tests notice missing expectations immediately.
#[derive(Default)]
pub struct ScriptedModel {
    queue: Mutex<VecDeque<ScriptedReply>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    /// Create an empty scripted backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful completion.
    pub fn push_response(&self, text: impl Into<String>) {
        lock_ignore_poison(&self.queue).push_back(ScriptedReply::Text(text.into()));
    }

    /// Queue a transport-level failure.
    pub fn push_failure(&self, message: impl Into<String>) {
        lock_ignore_poison(&self.queue).push_back(ScriptedReply::Failure(message.into()));
    }

    /// How many replies remain queued.
    pub fn remaining(&self) -> usize {
        lock_ignore_poison(&self.queue).len()
    }

    fn next_response(&self) -> Result<String, LlmError> {
        match lock_ignore_poison(&self.queue).pop_front() {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Failure(message)) => Err(LlmError::Backend { message }),
            None => Err(LlmError::ScriptExhausted),
        }
    }

    /// Record a prompt for later inspection by tests.
    pub(crate) fn record_prompt(&self, prompt: &str) {
        lock_ignore_poison(&self.prompts).push(prompt.to_owned());
    }

    /// The prompts recorded so far.
    pub fn recorded_prompts(&self) -> Vec<String> {
        lock_ignore_poison(&self.prompts).clone()
    }
}

/// Lock a mutex, recovering the guard if a test thread panicked.
fn lock_ignore_poison<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
