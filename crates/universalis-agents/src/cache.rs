//! The per-simulation agent cache.
//!
//! The cache guarantees that the instance returned for a given actor id
//! is the *same object* across cycles for the lifetime of the engine
//! process. Callers compare with `Arc::ptr_eq` to verify identity.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use universalis_types::Actor;

use crate::agent::{ActorAgent, AgentDeps};

/// Cache of instantiated agents keyed by actor id.
#[derive(Default)]
pub struct AgentCache {
    agents: Mutex<BTreeMap<String, Arc<ActorAgent>>>,
}

impl AgentCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached agent for this actor, creating it on first
    /// sight. The actor's resolution decides the agent kind at creation
    /// time; later resolution changes do not re-instantiate.
    pub fn get_or_create(&self, actor: &Actor, deps: &AgentDeps) -> Arc<ActorAgent> {
        let mut agents = self
            .agents
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(agent) = agents.get(&actor.actor_id) {
            return Arc::clone(agent);
        }
        debug!(actor_id = %actor.actor_id, resolution = ?actor.resolution, "Agent instantiated");
        let agent = Arc::new(ActorAgent::for_actor(actor, deps.clone()));
        agents.insert(actor.actor_id.clone(), Arc::clone(&agent));
        agent
    }

    /// The cached agent for an actor id, if one was instantiated.
    pub fn get(&self, actor_id: &str) -> Option<Arc<ActorAgent>> {
        self.agents
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(actor_id)
            .map(Arc::clone)
    }

    /// Number of instantiated agents.
    pub fn len(&self) -> usize {
        self.agents
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Whether no agent has been instantiated yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached instance.
    pub fn clear(&self) {
        self.agents
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }
}
