//! Retrying, caching controller over the language-model port.
//!
//! Agents and the Archon never call a backend directly; they go through
//! an [`LlmController`], which adds a bounded retry loop (default 3
//! attempts) and an optional in-memory response cache keyed by
//! `(prompt, max_tokens, temperature)`.

use std::collections::BTreeMap;
use std::sync::Mutex;

use tracing::warn;

use crate::error::LlmError;
use crate::model::{Choice, LanguageModel, SampleOptions};

/// Default retry budget for controller calls.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// High-level controller for LLM operations.
pub struct LlmController {
    model: LanguageModel,
    max_retries: u32,
    cache: Option<Mutex<BTreeMap<String, String>>>,
}

impl LlmController {
    /// Wrap a model with the default retry budget and no cache.
    pub const fn new(model: LanguageModel) -> Self {
        Self {
            model,
            max_retries: DEFAULT_MAX_RETRIES,
            cache: None,
        }
    }

    /// Override the retry budget.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Enable the in-memory response cache.
    #[must_use]
    pub fn with_caching(mut self) -> Self {
        self.cache = Some(Mutex::new(BTreeMap::new()));
        self
    }

    /// The wrapped backend's name.
    pub const fn backend_name(&self) -> &str {
        self.model.name()
    }

    /// Generate a completion with automatic retries.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::RetriesExhausted`] when every attempt fails.
    pub async fn generate(
        &self,
        prompt: &str,
        options: &SampleOptions,
    ) -> Result<String, LlmError> {
        let cache_key = cache_key(prompt, options);
        if let Some(cached) = self.cache_lookup(&cache_key) {
            return Ok(cached);
        }

        let mut last_error = String::new();
        for attempt in 1..=self.max_retries.max(1) {
            match self.model.sample_text(prompt, options).await {
                Ok(result) => {
                    self.cache_store(cache_key, &result);
                    return Ok(result);
                }
                Err(err) => {
                    warn!(attempt, %err, "llm generate attempt failed");
                    last_error = err.to_string();
                }
            }
        }
        Err(LlmError::RetriesExhausted {
            attempts: self.max_retries.max(1),
            last_error,
        })
    }

    /// Generate a completion conditioned on a system prompt, with
    /// automatic retries. System-prompted calls bypass the cache.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::RetriesExhausted`] when every attempt fails.
    pub async fn generate_with_system_prompt(
        &self,
        system: &str,
        user: &str,
        options: &SampleOptions,
    ) -> Result<String, LlmError> {
        let mut last_error = String::new();
        for attempt in 1..=self.max_retries.max(1) {
            match self
                .model
                .sample_with_system_prompt(system, user, options)
                .await
            {
                Ok(result) => return Ok(result),
                Err(err) => {
                    warn!(attempt, %err, "llm system-prompt attempt failed");
                    last_error = err.to_string();
                }
            }
        }
        Err(LlmError::RetriesExhausted {
            attempts: self.max_retries.max(1),
            last_error,
        })
    }

    /// Ask the model to pick one of `options`.
    ///
    /// The choice protocol carries its own three-attempt loop inside the
    /// port, so the controller does not retry on top of it.
    ///
    /// # Errors
    ///
    /// Propagates [`LlmError::InvalidResponse`] from the port.
    pub async fn choose(
        &self,
        prompt: &str,
        options: &[String],
        seed: Option<u64>,
    ) -> Result<Choice, LlmError> {
        self.model.sample_choice(prompt, options, seed).await
    }

    /// Drop every cached response.
    pub fn clear_cache(&self) {
        if let Some(ref cache) = self.cache {
            lock_ignore_poison(cache).clear();
        }
    }

    fn cache_lookup(&self, key: &str) -> Option<String> {
        let cache = self.cache.as_ref()?;
        lock_ignore_poison(cache).get(key).cloned()
    }

    fn cache_store(&self, key: String, value: &str) {
        if let Some(ref cache) = self.cache {
            lock_ignore_poison(cache).insert(key, value.to_owned());
        }
    }
}

/// Cache key over the parameters that change a completion.
fn cache_key(prompt: &str, options: &SampleOptions) -> String {
    format!("{prompt}:{}:{}", options.max_tokens, options.temperature)
}

fn lock_ignore_poison<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::model::ScriptedModel;

    use super::*;

    #[tokio::test]
    async fn generate_retries_past_transient_failures() {
        let scripted = ScriptedModel::new();
        scripted.push_failure("connection reset");
        scripted.push_failure("gateway timeout");
        scripted.push_response("finally");
        let controller = LlmController::new(LanguageModel::Scripted(std::sync::Arc::new(scripted)));

        let result = controller
            .generate("prompt", &SampleOptions::default())
            .await
            .unwrap();
        assert_eq!(result, "finally");
    }

    #[tokio::test]
    async fn generate_exhausts_retry_budget() {
        let scripted = ScriptedModel::new();
        scripted.push_failure("down");
        scripted.push_failure("down");
        scripted.push_failure("down");
        let controller = LlmController::new(LanguageModel::Scripted(std::sync::Arc::new(scripted)));

        let err = controller
            .generate("prompt", &SampleOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::RetriesExhausted { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn cache_serves_repeat_prompts() {
        let scripted = ScriptedModel::new();
        scripted.push_response("cached answer");
        let controller = LlmController::new(LanguageModel::Scripted(std::sync::Arc::new(scripted))).with_caching();

        let options = SampleOptions::default();
        let first = controller.generate("same prompt", &options).await.unwrap();
        // The queue is now empty; a cache miss would fail.
        let second = controller.generate("same prompt", &options).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn cache_key_includes_temperature() {
        let scripted = ScriptedModel::new();
        scripted.push_response("hot");
        scripted.push_response("cold");
        let controller = LlmController::new(LanguageModel::Scripted(std::sync::Arc::new(scripted))).with_caching();

        let hot = SampleOptions {
            temperature: 1.0,
            ..SampleOptions::default()
        };
        let cold = SampleOptions {
            temperature: 0.2,
            ..SampleOptions::default()
        };
        assert_eq!(controller.generate("p", &hot).await.unwrap(), "hot");
        assert_eq!(controller.generate("p", &cold).await.unwrap(), "cold");
    }

    #[tokio::test]
    async fn clear_cache_forces_regeneration() {
        let scripted = ScriptedModel::new();
        scripted.push_response("one");
        scripted.push_response("two");
        let controller = LlmController::new(LanguageModel::Scripted(std::sync::Arc::new(scripted))).with_caching();

        let options = SampleOptions::default();
        assert_eq!(controller.generate("p", &options).await.unwrap(), "one");
        controller.clear_cache();
        assert_eq!(controller.generate("p", &options).await.unwrap(), "two");
    }
}
