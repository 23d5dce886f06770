//! Error types for the memory systems.

use universalis_llm::LlmError;

/// Errors raised by memory-bank operations.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// Importance must lie in `[0, 1]`.
    #[error("importance {value} out of range [0, 1]")]
    InvalidImportance {
        /// The rejected value.
        value: f64,
    },

    /// The embedder failed.
    #[error("embedding failed: {source}")]
    Embedding {
        /// The underlying LLM error.
        #[from]
        source: LlmError,
    },
}
