//! The Archon: the omniscient referee that resolves a cycle.
//!
//! `run_cycle` threads a shared [`ArchonState`] record through three
//! nodes in sequence:
//!
//! 1. **Perception** -- build a perception sphere per actor from the
//!    state store, look up (or create) the cached agent, and collect
//!    each agent's intent. Per-actor failures land in the error map and
//!    never stop the other actors.
//! 2. **Feasibility** -- grade every collected intent through the
//!    feasibility engine.
//! 3. **Adjudication** -- one referee LLM call over the assembled
//!    per-actor block; the summary is appended (non-mutatingly) to the
//!    environment's global event log, an ADJUDICATION event carrying
//!    the full cycle context lands in the stream, and a rationale is
//!    recorded.
//!
//! Memory systems are injected by the engine before the first tick;
//! running without them is a supported degraded mode that logs a
//! warning each cycle.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, info, warn};

use universalis_agents::{ActorAgent, AgentCache, AgentDeps};
use universalis_llm::{LlmController, SampleOptions};
use universalis_memory::{EventStream, MemoryBank};
use universalis_store::{StateStore, StoreError};
use universalis_types::{
    Actor, ControlledAsset, FeasibilityReport, Intent, NearbyEntity, PerceptionSphere,
    TerrainSummary, WorldState,
};

use crate::error::ArchonError;
use crate::feasibility::FeasibilityEngine;

/// Default perception radius in degrees.
pub const DEFAULT_PERCEPTION_RADIUS: f64 = 0.1;

/// How many global events feed each actor's perception sphere.
const RECENT_EVENT_WINDOW: usize = 3;

/// How many nearby actor names appear in the adjudication block.
const NEARBY_NAMES_IN_BLOCK: usize = 3;

/// System prompt for the referee call.
const ARCHON_SYSTEM_PROMPT: &str = "\
You are the Archon, the omniscient referee of a simulation. Your goal is \
to adjudicate actor actions and simulate environmental shifts. Analyze \
the current state, each actor's perceived surroundings, their declared \
intents, and the feasibility verdicts. Output a concise narrative of what \
happens next: describe actions that fail feasibility and why, continue \
past actors that errored, respect the spatial context, and update the \
global event log.";

/// Reasoning tag recorded with every rationale.
const RATIONALE_REASONING: &str = "LLM-based adjudication";

/// One rationale record for traceability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rationale {
    /// The adjudicated cycle.
    pub cycle: u64,
    /// Every actor's intent text.
    pub intents: BTreeMap<String, String>,
    /// The referee's narrative summary.
    pub summary: String,
    /// How the summary was produced.
    pub reasoning: String,
}

/// The shared record threaded through the pipeline nodes.
#[derive(Debug, Clone)]
pub struct ArchonState {
    /// The world being adjudicated (a working copy; the caller's input
    /// is never mutated).
    pub world_state: WorldState,
    /// Collected intents keyed by actor id.
    pub actor_intents: BTreeMap<String, Intent>,
    /// Per-actor failures keyed by actor id.
    pub actor_errors: BTreeMap<String, String>,
    /// Feasibility reports keyed by actor id.
    pub feasibility_reports: BTreeMap<String, FeasibilityReport>,
    /// Perception spheres keyed by actor id.
    pub perception_context: BTreeMap<String, PerceptionSphere>,
    /// The referee's narrative summary.
    pub archon_summary: String,
    /// Rationales recorded this cycle.
    pub rationales: Vec<Rationale>,
}

impl ArchonState {
    fn new(world_state: WorldState) -> Self {
        Self {
            world_state,
            actor_intents: BTreeMap::new(),
            actor_errors: BTreeMap::new(),
            feasibility_reports: BTreeMap::new(),
            perception_context: BTreeMap::new(),
            archon_summary: String::new(),
            rationales: Vec::new(),
        }
    }
}

/// The result of one adjudicated cycle.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    /// The world with the summary appended to its global events.
    pub world_state: WorldState,
    /// The referee's narrative summary.
    pub archon_summary: String,
    /// Rationales recorded this cycle.
    pub rationales: Vec<Rationale>,
}

/// The adjudicator.
pub struct Archon {
    llm: Arc<LlmController>,
    store: Arc<StateStore>,
    feasibility: FeasibilityEngine,
    cache: AgentCache,
    perception_radius: f64,
    sample_options: SampleOptions,
    memory: Mutex<Option<Arc<MemoryBank>>>,
    stream: Mutex<Option<Arc<EventStream>>>,
}

impl Archon {
    /// Create an Archon over a store and LLM controller.
    pub fn new(llm: Arc<LlmController>, store: Arc<StateStore>, perception_radius: f64) -> Self {
        let feasibility = FeasibilityEngine::new(Arc::clone(&store));
        Self {
            llm,
            store,
            feasibility,
            cache: AgentCache::new(),
            perception_radius,
            sample_options: SampleOptions {
                temperature: 0.7,
                ..SampleOptions::default()
            },
            memory: Mutex::new(None),
            stream: Mutex::new(None),
        }
    }

    /// Override the sampling options used for every Archon LLM call.
    #[must_use]
    pub fn with_sample_options(mut self, sample_options: SampleOptions) -> Self {
        self.sample_options = sample_options;
        self
    }

    /// Inject the memory systems. The engine calls this at
    /// `attach_archon`; agents created afterwards receive references to
    /// both systems.
    pub fn set_memory_systems(&self, memory: Arc<MemoryBank>, stream: Arc<EventStream>) {
        *lock_ignore_poison(&self.memory) = Some(memory);
        *lock_ignore_poison(&self.stream) = Some(stream);
        info!("Memory systems injected into Archon");
    }

    /// The feasibility engine (shared with the tick engine's helpers).
    pub const fn feasibility(&self) -> &FeasibilityEngine {
        &self.feasibility
    }

    /// The cached agent for an actor, if one was instantiated.
    pub fn cached_agent(&self, actor_id: &str) -> Option<Arc<ActorAgent>> {
        self.cache.get(actor_id)
    }

    /// Drop every cached agent instance.
    ///
    /// Called by the engine on reset: a cleared world must not be
    /// served by agents keyed to the old actor set.
    pub fn reset_agents(&self) {
        self.cache.clear();
    }

    /// Run a full perception → feasibility → adjudication cycle.
    ///
    /// # Errors
    ///
    /// Returns [`ArchonError::Summarization`] if the single referee LLM
    /// call fails; per-actor failures are captured in the state instead.
    pub async fn run_cycle(&self, world_state: WorldState) -> Result<CycleOutcome, ArchonError> {
        if lock_ignore_poison(&self.memory).is_none() {
            warn!("Archon operating without memory systems (degraded mode)");
        }

        let mut state = ArchonState::new(world_state);
        self.perception_node(&mut state).await;
        self.feasibility_node(&mut state).await;
        self.adjudication_node(&mut state).await?;

        Ok(CycleOutcome {
            world_state: state.world_state,
            archon_summary: state.archon_summary,
            rationales: state.rationales,
        })
    }

    /// Node 1: perception and intent collection.
    async fn perception_node(&self, state: &mut ArchonState) {
        info!(
            cycle = state.world_state.environment.cycle,
            actors = state.world_state.actors.len(),
            "Perception node"
        );
        let deps = self.agent_deps();
        let actors: Vec<Actor> = state.world_state.actors.values().cloned().collect();

        for actor in actors {
            let actor_id = actor.actor_id.clone();
            let sphere = match self.build_sphere(&actor, &state.world_state).await {
                Ok(sphere) => sphere,
                Err(err) => {
                    warn!(%actor_id, %err, "Perception failed");
                    state
                        .actor_errors
                        .insert(actor_id, format!("perception failed: {err}"));
                    continue;
                }
            };

            let agent = self.cache.get_or_create(&actor, &deps);
            match agent
                .generate_intent(&actor, &state.world_state, &sphere)
                .await
            {
                Ok(intent) => {
                    debug!(%actor_id, "Intent collected");
                    state.actor_intents.insert(actor_id.clone(), intent);
                }
                Err(err) => {
                    warn!(%actor_id, %err, "Agent failed to act");
                    state.actor_errors.insert(actor_id.clone(), err.to_string());
                }
            }
            state.perception_context.insert(actor_id, sphere);
        }
    }

    /// Node 2: feasibility grading.
    async fn feasibility_node(&self, state: &mut ArchonState) {
        info!(intents = state.actor_intents.len(), "Feasibility node");
        for (actor_id, intent) in &state.actor_intents {
            let report = self
                .feasibility
                .check_feasibility(&intent.text, &state.world_state)
                .await;
            state.feasibility_reports.insert(actor_id.clone(), report);
        }
    }

    /// Node 3: the referee call and bookkeeping.
    async fn adjudication_node(&self, state: &mut ArchonState) -> Result<(), ArchonError> {
        info!("Adjudication node");
        let environment = &state.world_state.environment;
        let recent_events = tail(&environment.global_events, RECENT_EVENT_WINDOW);

        let actor_block = build_actor_block(state);
        let user_prompt = format!(
            "Current Cycle: {}\nCurrent Time: {}\nCurrent Weather: {}\nRecent Events:\n{}\n\nActors:\n{}\nAdjudicate the result of this cycle:",
            environment.cycle,
            environment.time,
            environment.weather,
            if recent_events.is_empty() {
                String::from("- None")
            } else {
                recent_events
                    .iter()
                    .map(|event| format!("- {event}"))
                    .collect::<Vec<_>>()
                    .join("\n")
            },
            actor_block,
        );

        let summary = self
            .llm
            .generate_with_system_prompt(ARCHON_SYSTEM_PROMPT, &user_prompt, &self.sample_options)
            .await?;
        let summary = summary.trim().to_owned();

        // Ground truth update: append, never rewrite.
        state
            .world_state
            .environment
            .global_events
            .push(summary.clone());
        state.archon_summary = summary.clone();

        let cycle = state.world_state.environment.cycle;
        let intents: BTreeMap<String, String> = state
            .actor_intents
            .iter()
            .map(|(actor_id, intent)| (actor_id.clone(), intent.text.clone()))
            .collect();

        if let Some(stream) = lock_ignore_poison(&self.stream).clone() {
            let mut metadata = BTreeMap::new();
            metadata.insert(
                String::from("intents"),
                serde_json::to_value(&intents).unwrap_or(serde_json::Value::Null),
            );
            metadata.insert(
                String::from("feasibility_reports"),
                serde_json::to_value(&state.feasibility_reports)
                    .unwrap_or(serde_json::Value::Null),
            );
            metadata.insert(
                String::from("perception_context"),
                serde_json::to_value(&state.perception_context).unwrap_or(serde_json::Value::Null),
            );
            metadata.insert(
                String::from("errors"),
                serde_json::to_value(&state.actor_errors).unwrap_or(serde_json::Value::Null),
            );
            let adjudication = stream.add_adjudication(summary.clone(), cycle, metadata);
            stream.add_rationale(
                format!("Adjudicated cycle {cycle}: {} intents, {} errors", state.actor_intents.len(), state.actor_errors.len()),
                cycle,
                Some(adjudication.event_id),
            );
        } else {
            debug!("No event stream attached; skipping ADJUDICATION event");
        }

        state.rationales.push(Rationale {
            cycle,
            intents,
            summary,
            reasoning: String::from(RATIONALE_REASONING),
        });
        Ok(())
    }

    /// Assemble one actor's perception sphere from the state store.
    async fn build_sphere(
        &self,
        actor: &Actor,
        world: &WorldState,
    ) -> Result<PerceptionSphere, StoreError> {
        let mut sphere = PerceptionSphere {
            controlled_assets: actor
                .assets
                .iter()
                .filter_map(|asset_id| world.assets.get(asset_id))
                .map(|asset| ControlledAsset {
                    asset_id: asset.asset_id.clone(),
                    name: asset.name.clone(),
                    status: asset.status.clone(),
                })
                .collect(),
            recent_events: tail(&world.environment.global_events, RECENT_EVENT_WINDOW),
            ..PerceptionSphere::default()
        };

        let Some(ref location) = actor.location else {
            // Unplaced actors perceive only their own command.
            return Ok(sphere);
        };

        let hits = self
            .store
            .get_entities_within_distance(
                location.lon,
                location.lat,
                self.perception_radius,
                None,
            )
            .await?;
        for hit in hits {
            if hit.id == actor.actor_id {
                continue;
            }
            let entity = NearbyEntity {
                id: hit.id,
                name: hit.name,
                lon: hit.lon,
                lat: hit.lat,
                distance: hit.distance,
                status: hit.status,
            };
            match hit.entity_type.as_str() {
                "actor" => sphere.nearby_actors.push(entity),
                "asset" => sphere.nearby_assets.push(entity),
                _ => {}
            }
        }

        if let Some(terrain) = self
            .store
            .get_terrain_at_point(location.lon, location.lat)
            .await?
        {
            sphere.terrain = Some(TerrainSummary {
                terrain_id: terrain.terrain_id,
                name: terrain.name,
                terrain_type: terrain.terrain_type,
                movement_cost: terrain.movement_cost,
                passable: terrain.passable,
            });
        }

        Ok(sphere)
    }

    fn agent_deps(&self) -> AgentDeps {
        AgentDeps {
            llm: Arc::clone(&self.llm),
            memory: lock_ignore_poison(&self.memory).clone(),
            stream: lock_ignore_poison(&self.stream).clone(),
        }
    }
}

/// Build the per-actor block of the referee prompt, in the world's
/// actor iteration order.
fn build_actor_block(state: &ArchonState) -> String {
    let mut lines = Vec::new();
    for actor_id in state.world_state.actors.keys() {
        if let Some(error) = state.actor_errors.get(actor_id) {
            lines.push(format!("- ERROR - {actor_id}: {error}"));
            continue;
        }
        let Some(intent) = state.actor_intents.get(actor_id) else {
            continue;
        };

        let context = state.perception_context.get(actor_id).map_or_else(
            || String::from("terrain: unknown; nearby: none"),
            |sphere| {
                let terrain = sphere
                    .terrain
                    .as_ref()
                    .map_or_else(|| String::from("unknown"), |t| t.terrain_type.to_string());
                let names = sphere.nearby_actor_names(NEARBY_NAMES_IN_BLOCK);
                let nearby = if names.is_empty() {
                    String::from("none")
                } else {
                    names.join(", ")
                };
                format!("terrain: {terrain}; nearby: {nearby}")
            },
        );
        lines.push(format!("- {actor_id} [{context}]: {}", intent.text));

        match state.feasibility_reports.get(actor_id) {
            Some(report) if !report.feasible => {
                let messages: Vec<&str> = report
                    .violations
                    .iter()
                    .map(|violation| violation.message.as_str())
                    .collect();
                lines.push(format!("  Feasibility: FAILED - {}", messages.join("; ")));
            }
            Some(_) => lines.push(String::from("  Feasibility: PASSED")),
            None => {}
        }
    }
    let mut block = lines.join("\n");
    block.push('\n');
    block
}

/// The last `count` entries of a list, oldest first.
fn tail(items: &[String], count: usize) -> Vec<String> {
    let skip = items.len().saturating_sub(count);
    items.iter().skip(skip).cloned().collect()
}

fn lock_ignore_poison<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use universalis_llm::{LanguageModel, ScriptedModel};
    use universalis_memory::EventType;
    use universalis_types::{Asset, Environment, TerrainFeature, TerrainType};

    use super::*;

    fn scripted_llm(responses: &[&str]) -> (Arc<LlmController>, Arc<ScriptedModel>) {
        let scripted = Arc::new(ScriptedModel::new());
        for response in responses {
            scripted.push_response(*response);
        }
        let controller = Arc::new(LlmController::new(LanguageModel::Scripted(Arc::clone(
            &scripted,
        ))));
        (controller, scripted)
    }

    fn make_world(cycle: u64) -> WorldState {
        let mut environment = Environment::default();
        environment.cycle = cycle;
        environment.time = String::from("06:00");
        environment.weather = String::from("Dry, High Winds");
        environment
            .global_events
            .push(String::from("Simulation Initialized: Wildfire Warning in effect."));

        let mut world = WorldState::new("Alpha_Scenario", environment);
        world.assets.insert(
            String::from("Truck_01"),
            Asset {
                asset_id: String::from("Truck_01"),
                name: String::from("Truck 01"),
                asset_type: String::from("vehicle"),
                location: BTreeMap::from([
                    (String::from("lat"), 34.05),
                    (String::from("lon"), -118.25),
                ]),
                attributes: BTreeMap::new(),
                status: String::from("active"),
            },
        );
        world.actors.insert(
            String::from("Actor_FireChief"),
            serde_json::from_value(serde_json::json!({
                "actor_id": "Actor_FireChief",
                "role": "Fire Chief",
                "description": "Coordinates the county fire response.",
                "resolution": "macro",
                "assets": ["Truck_01"],
                "objectives": ["Contain the wildfire"],
                "location": {"lat": 34.05, "lon": -118.25},
            }))
            .unwrap(),
        );
        world
    }

    async fn make_archon(
        responses: &[&str],
    ) -> (Arc<Archon>, Arc<ScriptedModel>, Arc<MemoryBank>, Arc<EventStream>) {
        let (llm, scripted) = scripted_llm(responses);
        let store = Arc::new(StateStore::open_in_memory("Alpha_Scenario").await.unwrap());
        let archon = Arc::new(Archon::new(llm, store, DEFAULT_PERCEPTION_RADIUS));
        let memory = Arc::new(MemoryBank::new(
            "Alpha_Scenario",
            "memories",
            universalis_llm::Embedder::HashSeeded { dim: 16 },
        ));
        let stream = Arc::new(EventStream::new("Alpha_Scenario"));
        archon.set_memory_systems(Arc::clone(&memory), Arc::clone(&stream));
        (archon, scripted, memory, stream)
    }

    #[tokio::test]
    async fn run_cycle_collects_intent_and_appends_summary() {
        let (archon, _scripted, memory, stream) = make_archon(&[
            "Deploy Truck 01 along the eastern fire break.",
            "The fire chief stages Truck 01 east; the fire line holds.",
        ])
        .await;

        let world = make_world(1);
        let outcome = archon.run_cycle(world.clone()).await.unwrap();

        assert_eq!(
            outcome.archon_summary,
            "The fire chief stages Truck 01 east; the fire line holds."
        );
        // Appended, not rewritten; the input world is untouched.
        assert_eq!(outcome.world_state.environment.global_events.len(), 2);
        assert_eq!(world.environment.global_events.len(), 1);

        // The intent landed as a private memory.
        let own = universalis_memory::ScopeFilter::for_agent("Actor_FireChief");
        let remembered = memory
            .retrieve_associative("fire break", 5, &own)
            .await
            .unwrap();
        assert!(!remembered.is_empty());

        // Exactly one ADJUDICATION event with full metadata.
        let events = stream.events_by_type(EventType::Adjudication, None);
        assert_eq!(events.len(), 1);
        let event = events.first().unwrap();
        assert_eq!(event.cycle, 1);
        assert!(
            event
                .metadata
                .get("intents")
                .and_then(|v| v.get("Actor_FireChief"))
                .is_some()
        );
        assert!(
            event
                .metadata
                .get("feasibility_reports")
                .and_then(|v| v.get("Actor_FireChief"))
                .is_some()
        );

        // One rationale, in-state and in-stream.
        assert_eq!(outcome.rationales.len(), 1);
        assert_eq!(outcome.rationales.first().unwrap().cycle, 1);
        assert_eq!(stream.rationales_for_cycle(1).len(), 1);
    }

    #[tokio::test]
    async fn agent_identity_persists_across_cycles() {
        let (archon, scripted, _memory, _stream) =
            make_archon(&["Intent one.", "Summary one."]).await;

        archon.run_cycle(make_world(1)).await.unwrap();
        let first = archon.cached_agent("Actor_FireChief").unwrap();

        scripted.push_response("Intent two.");
        scripted.push_response("Summary two.");
        archon.run_cycle(make_world(2)).await.unwrap();
        let second = archon.cached_agent("Actor_FireChief").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn agent_error_is_captured_and_narrated() {
        let mut world = make_world(1);
        world.actors.insert(
            String::from("Actor_Mayor"),
            serde_json::from_value(serde_json::json!({
                "actor_id": "Actor_Mayor",
                "role": "Mayor",
                "location": {"lat": 34.06, "lon": -118.26},
            }))
            .unwrap(),
        );

        // FireChief sorts first: his call succeeds, the Mayor's three
        // attempts all fail, then the summary call succeeds.
        let (archon, scripted, _memory, _stream) = make_archon(&["Chief intent."]).await;
        scripted.push_failure("model offline");
        scripted.push_failure("model offline");
        scripted.push_failure("model offline");
        scripted.push_response("The mayor is silent this cycle; the chief acts.");

        let outcome = archon.run_cycle(world).await.unwrap();
        assert_eq!(
            outcome.archon_summary,
            "The mayor is silent this cycle; the chief acts."
        );

        // The failed actor appears with an ERROR prefix in the referee
        // prompt; the healthy actor proceeds normally.
        let prompts = scripted.recorded_prompts();
        let referee_prompt = prompts.last().unwrap();
        assert!(referee_prompt.contains("ERROR - Actor_Mayor"));
        assert!(referee_prompt.contains("Actor_FireChief"));
        assert!(referee_prompt.contains("Feasibility: PASSED"));
    }

    #[tokio::test]
    async fn infeasible_intent_marked_failed_in_referee_prompt() {
        let mut world = make_world(1);
        // A second actor with no assets tries to use the chief's truck.
        world.actors.insert(
            String::from("Actor_Mayor"),
            serde_json::from_value(serde_json::json!({
                "actor_id": "Actor_Mayor",
                "role": "Mayor",
                "location": {"lat": 34.06, "lon": -118.26},
            }))
            .unwrap(),
        );

        let (archon, scripted, _memory, _stream) = make_archon(&[
            "Monitor the perimeter.",
            "Actor_Mayor commandeers Truck_01 for a press tour.",
            "The mayor's request is denied; the truck stays on the line.",
        ])
        .await;

        let outcome = archon.run_cycle(world).await.unwrap();
        assert!(outcome.archon_summary.contains("denied"));

        let prompts = scripted.recorded_prompts();
        let referee_prompt = prompts.last().unwrap();
        assert!(referee_prompt.contains("FAILED"));
        assert!(referee_prompt.contains("not authorized"));
    }

    #[tokio::test]
    async fn summarization_failure_propagates() {
        let (archon, scripted, _memory, _stream) = make_archon(&["An intent."]).await;
        scripted.push_failure("llm down");
        scripted.push_failure("llm down");
        scripted.push_failure("llm down");

        let err = archon.run_cycle(make_world(1)).await.unwrap_err();
        assert!(matches!(err, ArchonError::Summarization { .. }));
    }

    #[tokio::test]
    async fn perception_sphere_sees_nearby_entities_and_terrain() {
        let (archon, scripted, _memory, _stream) = make_archon(&[]).await;

        // Persist a world so the distance queries have rows to find.
        let mut world = make_world(1);
        world.actors.insert(
            String::from("Actor_Mayor"),
            serde_json::from_value(serde_json::json!({
                "actor_id": "Actor_Mayor",
                "role": "Mayor",
                "location": {"lat": 34.06, "lon": -118.26},
            }))
            .unwrap(),
        );
        archon.store.save_world_state(&world).await.unwrap();
        archon
            .store
            .add_terrain(&TerrainFeature::new(
                "terrain_hills",
                "Griffith Hills",
                TerrainType::Forest,
                "POLYGON((-118.30 34.00, -118.20 34.00, -118.20 34.10, -118.30 34.10, -118.30 34.00))",
            ))
            .await
            .unwrap();

        // Two intents plus a summary.
        scripted.push_response("Chief intent.");
        scripted.push_response("Mayor intent.");
        scripted.push_response("Summary.");
        let outcome = archon.run_cycle(world).await.unwrap();
        drop(outcome);

        // Inspect what the chief's prompt contained.
        let prompts = scripted.recorded_prompts();
        let chief_prompt = prompts.first().unwrap();
        assert!(chief_prompt.contains("Nearby actors: Mayor"));
        assert!(chief_prompt.contains("Griffith Hills"));
        assert!(chief_prompt.contains("Truck 01"));
    }

    #[tokio::test]
    async fn degraded_mode_without_memory_still_adjudicates() {
        let (llm, _scripted) = scripted_llm(&["An intent.", "A summary."]);
        let store = Arc::new(StateStore::open_in_memory("Alpha_Scenario").await.unwrap());
        let archon = Archon::new(llm, store, DEFAULT_PERCEPTION_RADIUS);

        let outcome = archon.run_cycle(make_world(1)).await.unwrap();
        assert_eq!(outcome.archon_summary, "A summary.");
    }

    #[tokio::test]
    async fn unplaced_actor_gets_empty_sphere_but_still_acts() {
        let mut world = make_world(1);
        if let Some(actor) = world.actors.get_mut("Actor_FireChief") {
            actor.location = None;
        }

        let (archon, scripted, _memory, _stream) =
            make_archon(&["Coordinate by radio.", "Summary."]).await;
        let outcome = archon.run_cycle(world).await.unwrap();

        assert_eq!(outcome.rationales.first().unwrap().intents.len(), 1);
        let prompts = scripted.recorded_prompts();
        assert!(prompts.first().unwrap().contains("Terrain here: unknown"));
    }
}
