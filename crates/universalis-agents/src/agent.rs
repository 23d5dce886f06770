//! Macro and micro agents.
//!
//! Both agent kinds follow the same contract: given the world and this
//! cycle's perception sphere, retrieve relevant memories, prompt the
//! LLM for a one-paragraph intent, record the intent as a private
//! memory, and return it. Micro agents additionally log an INTENT
//! event to the stream. Failures propagate to the caller (the Archon
//! catches them per actor).
//!
//! Enum dispatch instead of trait objects: async methods are not
//! dyn-compatible.

use std::sync::Arc;

use tracing::debug;

use universalis_llm::{LlmController, SampleOptions};
use universalis_memory::{EventStream, MemoryBank, MemoryParams, ScopeFilter};
use universalis_types::{Actor, Intent, PerceptionSphere, Resolution, WorldState};

use crate::error::AgentError;
use crate::prompt;

/// How many memories an agent retrieves per cycle.
const MEMORY_RETRIEVAL_K: usize = 5;

/// Importance of a self-recorded intent memory.
const INTENT_IMPORTANCE: f64 = 0.5;

/// Shared dependencies injected into every agent at creation.
#[derive(Clone)]
pub struct AgentDeps {
    /// The LLM controller shared across the simulation.
    pub llm: Arc<LlmController>,
    /// The memory bank; absent in degraded no-memory mode.
    pub memory: Option<Arc<MemoryBank>>,
    /// The event stream; absent in degraded no-memory mode.
    pub stream: Option<Arc<EventStream>>,
}

/// A strategic-resolution agent.
pub struct MacroAgent {
    actor_id: String,
    deps: AgentDeps,
}

/// An individual-resolution agent; also logs INTENT events.
pub struct MicroAgent {
    actor_id: String,
    deps: AgentDeps,
}

/// An instantiated actor agent.
pub enum ActorAgent {
    /// Strategic resolution.
    Macro(MacroAgent),
    /// Individual resolution.
    Micro(MicroAgent),
}

impl ActorAgent {
    /// Instantiate the agent kind matching the actor's resolution.
    pub fn for_actor(actor: &Actor, deps: AgentDeps) -> Self {
        match actor.resolution {
            Resolution::Macro => Self::Macro(MacroAgent {
                actor_id: actor.actor_id.clone(),
                deps,
            }),
            Resolution::Micro => Self::Micro(MicroAgent {
                actor_id: actor.actor_id.clone(),
                deps,
            }),
        }
    }

    /// The actor this agent embodies.
    pub fn actor_id(&self) -> &str {
        match self {
            Self::Macro(agent) => &agent.actor_id,
            Self::Micro(agent) => &agent.actor_id,
        }
    }

    /// Whether this agent logs INTENT events to the stream.
    pub const fn is_micro(&self) -> bool {
        matches!(self, Self::Micro(_))
    }

    /// Generate this cycle's intent.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if memory retrieval, prompt rendering,
    /// the LLM call, or the post-success memory write fails.
    pub async fn generate_intent(
        &self,
        actor: &Actor,
        world: &WorldState,
        sphere: &PerceptionSphere,
    ) -> Result<Intent, AgentError> {
        let deps = match self {
            Self::Macro(agent) => &agent.deps,
            Self::Micro(agent) => &agent.deps,
        };
        let actor_id = self.actor_id();
        let cycle = world.environment.cycle;

        // 1. Retrieve memories this agent is allowed to see.
        let memories = match deps.memory.as_ref() {
            Some(bank) => {
                let filter =
                    ScopeFilter::for_agent(actor_id).with_groups(actor.groups());
                let query = prompt::memory_query(actor, sphere);
                bank.retrieve_associative(&query, MEMORY_RETRIEVAL_K, &filter)
                    .await
                    .map_err(|source| AgentError::Memory {
                        actor_id: actor_id.to_owned(),
                        source,
                    })?
            }
            None => Vec::new(),
        };

        // 2. Render the prompt.
        let rendered = prompt::render_intent_prompt(actor, &world.environment, sphere, &memories)
            .map_err(|source| AgentError::Prompt {
                actor_id: actor_id.to_owned(),
                source,
            })?;

        // 3. One LLM call for a one-paragraph intent.
        let text = deps
            .llm
            .generate(&rendered, &SampleOptions::default())
            .await
            .map_err(|source| AgentError::Llm {
                actor_id: actor_id.to_owned(),
                source,
            })?;
        let text = text.trim().to_owned();
        debug!(actor_id, cycle, intent = %truncate_for_log(&text), "Intent generated");

        // 4. Record the intent: a private memory, and for micro agents
        //    an INTENT stream event.
        if let Some(bank) = deps.memory.as_ref() {
            bank.add(
                &text,
                MemoryParams::private(actor_id, cycle).with_importance(INTENT_IMPORTANCE),
            )
            .await
            .map_err(|source| AgentError::Memory {
                actor_id: actor_id.to_owned(),
                source,
            })?;
        }
        if self.is_micro()
            && let Some(stream) = deps.stream.as_ref()
        {
            stream.add_intent(text.clone(), cycle, actor_id);
        }

        Ok(Intent::new(actor_id, text, cycle))
    }
}

/// Clip long intents for log lines.
fn truncate_for_log(text: &str) -> &str {
    let mut end = text.len().min(60);
    while !text.is_char_boundary(end) {
        end = end.saturating_sub(1);
    }
    text.get(..end).unwrap_or_default()
}
