//! Error types for the adjudication pipeline and tick engine.

use universalis_llm::LlmError;
use universalis_store::StoreError;

/// Errors raised by the Archon's `run_cycle`.
///
/// Per-actor failures never surface here -- they are captured in the
/// pipeline state's error map. What does surface is a failure of the
/// single summarization call; the tick engine maps it to an
/// `"Adjudication error: ..."` summary and lets the cycle advance.
#[derive(Debug, thiserror::Error)]
pub enum ArchonError {
    /// The referee summarization call failed.
    #[error("summarization failed: {source}")]
    Summarization {
        /// The underlying LLM error.
        #[from]
        source: LlmError,
    },
}

/// Errors raised by tick-engine control operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A state store operation failed.
    #[error("state store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: StoreError,
    },

    /// `attach_archon` was called while an archon is already attached.
    #[error("an archon is already attached to this engine")]
    ArchonAlreadyAttached,
}
