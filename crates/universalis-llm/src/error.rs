//! Error types for language-model access.

/// Errors raised by LLM backends and the controller.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The backend HTTP call failed or returned an unusable payload.
    #[error("llm backend error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },

    /// `sample_choice` could not extract a valid option number within
    /// the attempt budget.
    #[error("no valid choice after {attempts} attempts")]
    InvalidResponse {
        /// How many attempts were made.
        attempts: u32,
    },

    /// The retry budget of the controller is exhausted.
    #[error("llm call failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// How many attempts were made.
        attempts: u32,
        /// The message of the final failure.
        last_error: String,
    },

    /// The scripted backend ran out of queued responses.
    #[error("scripted backend has no response queued")]
    ScriptExhausted,
}
