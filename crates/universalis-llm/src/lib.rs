//! Language-model access for the Universalis simulation.
//!
//! The rest of the workspace talks to LLMs only through the narrow port
//! in [`model`]: `sample_text` for free-form completions and
//! `sample_choice` for numbered-option selection. Backends are an enum
//! ([`LanguageModel`]) rather than trait objects because async methods
//! are not dyn-compatible; the scripted backend makes every pipeline
//! test deterministic without touching the network.
//!
//! [`controller::LlmController`] layers bounded retries and an optional
//! response cache on top of the port. [`embedding`] holds the text
//! embedders used by the memory bank.

pub mod controller;
pub mod embedding;
pub mod error;
pub mod model;

pub use controller::LlmController;
pub use embedding::{Embedder, EmbeddingClient};
pub use error::LlmError;
pub use model::{Choice, LanguageModel, OpenAiModel, SampleOptions, ScriptedModel};
