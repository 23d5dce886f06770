//! Error types for the agent runtime.

use universalis_llm::LlmError;
use universalis_memory::MemoryError;

/// Errors raised while generating an intent.
///
/// The Archon catches these per actor: one failing agent never stops
/// the other actors from acting.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The LLM call failed.
    #[error("llm failure for {actor_id}: {source}")]
    Llm {
        /// The acting agent.
        actor_id: String,
        /// The underlying LLM error.
        source: LlmError,
    },

    /// A memory operation failed.
    #[error("memory failure for {actor_id}: {source}")]
    Memory {
        /// The acting agent.
        actor_id: String,
        /// The underlying memory error.
        source: MemoryError,
    },

    /// The prompt template failed to render.
    #[error("prompt render failure for {actor_id}: {source}")]
    Prompt {
        /// The acting agent.
        actor_id: String,
        /// The underlying template error.
        source: minijinja::Error,
    },
}
