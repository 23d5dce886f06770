//! The per-actor agent runtime.
//!
//! Each actor is instantiated at most once per simulation and cached by
//! actor id -- instance identity across ticks is a correctness
//! requirement, not a performance hint, because agents accumulate
//! relationship state through their memory writes. Macro agents reason
//! strategically; micro agents additionally log INTENT events to the
//! stream.
//!
//! Prompt text is rendered through `minijinja` templates embedded in
//! [`prompt`], so the exact wording lives in one reviewable place.

pub mod agent;
pub mod cache;
pub mod error;
pub mod prompt;

pub use agent::{ActorAgent, AgentDeps, MacroAgent, MicroAgent};
pub use cache::AgentCache;
pub use error::AgentError;
