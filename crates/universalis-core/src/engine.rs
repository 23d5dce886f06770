//! The tick engine: master clock and cycle orchestration.
//!
//! One engine exists per simulation. Each tick: wait on the pause gate,
//! bump the cycle counter, load the latest snapshot (or synthesize a
//! minimal world on a cold start), hand the world to the Archon, and
//! persist whatever comes back. Every failure mode keeps the clock
//! moving -- an adjudication error falls back to the loaded snapshot,
//! and a failed save is retried implicitly by the next tick's save.
//!
//! The pause gate is an `AtomicBool` plus a `Notify` with "set =
//! running" semantics: `pause` clears it, `resume` sets it, and
//! `async_step` awaits it at the top. The run loop is cooperative;
//! `stop` lets the current tick drain and then exits cleanly.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::Utc;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use universalis_memory::{EventStream, MemoryBank};
use universalis_store::{EntityHit, StateStore};
use universalis_types::{Environment, FeasibilityReport, WorldState};

use crate::archon::Archon;
use crate::error::EngineError;
use crate::feasibility::FeasibilityEngine;

/// Outcome status of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    /// The cycle was adjudicated (possibly with a degraded summary).
    Adjudicated,
    /// The tick failed before adjudication could run.
    Error,
}

/// The report returned by every tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// The cycle that ran.
    pub cycle: u64,
    /// Outcome status.
    pub status: TickStatus,
    /// The Archon's summary, or a description of the failure.
    pub summary: String,
}

/// The master clock for one simulation.
pub struct TickEngine {
    simulation_id: String,
    steps: AtomicU64,
    running: AtomicBool,
    paused: AtomicBool,
    resume_notify: Notify,
    store: Arc<StateStore>,
    memory: Arc<MemoryBank>,
    stream: Arc<EventStream>,
    feasibility: FeasibilityEngine,
    archon: std::sync::Mutex<Option<Arc<Archon>>>,
}

impl TickEngine {
    /// Create an engine over its storage and memory systems.
    ///
    /// The cycle counter restores from the latest persisted snapshot,
    /// so a restarted engine continues where the last run stopped.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the snapshot probe fails.
    pub async fn new(
        store: Arc<StateStore>,
        memory: Arc<MemoryBank>,
        stream: Arc<EventStream>,
    ) -> Result<Self, EngineError> {
        let latest = store.get_world_state(None).await?;
        let steps = latest.map_or(0, |world| world.environment.cycle);
        let simulation_id = store.simulation_id().to_owned();
        info!(%simulation_id, cycle = steps, "Tick engine initialized");

        Ok(Self {
            simulation_id,
            steps: AtomicU64::new(steps),
            running: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            resume_notify: Notify::new(),
            feasibility: FeasibilityEngine::new(Arc::clone(&store)),
            store,
            memory,
            stream,
            archon: std::sync::Mutex::new(None),
        })
    }

    /// The simulation this engine drives.
    pub fn simulation_id(&self) -> &str {
        &self.simulation_id
    }

    /// The current cycle counter.
    pub fn steps(&self) -> u64 {
        self.steps.load(Ordering::Acquire)
    }

    /// Whether the engine is paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Whether the run loop is active.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    // =========================================================================
    // Wiring
    // =========================================================================

    /// Attach the Archon and inject the memory systems into it.
    ///
    /// Required before productive ticking; without an archon, ticks
    /// pass the world through unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ArchonAlreadyAttached`] on a second call.
    pub fn attach_archon(&self, archon: Arc<Archon>) -> Result<(), EngineError> {
        let mut guard = self
            .archon
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if guard.is_some() {
            return Err(EngineError::ArchonAlreadyAttached);
        }
        archon.set_memory_systems(Arc::clone(&self.memory), Arc::clone(&self.stream));
        *guard = Some(archon);
        info!(simulation_id = %self.simulation_id, "Archon attached to engine");
        Ok(())
    }

    fn attached_archon(&self) -> Option<Arc<Archon>> {
        self.archon
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    // =========================================================================
    // State access
    // =========================================================================

    /// The latest persisted world state.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] on query failure.
    pub async fn get_current_state(&self) -> Result<Option<WorldState>, EngineError> {
        Ok(self.store.get_world_state(None).await?)
    }

    /// Persist an adjudicated world, stamping `last_updated`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] on write failure.
    pub async fn save_adjudicated_state(&self, mut world: WorldState) -> Result<(), EngineError> {
        world.last_updated = Utc::now();
        self.store.save_world_state(&world).await?;
        Ok(())
    }

    // =========================================================================
    // Ticking
    // =========================================================================

    /// Perform one full tick.
    ///
    /// Blocks on the pause gate, increments the cycle, loads (or
    /// synthesizes) the world, runs the Archon, and persists the
    /// result. Adjudication and persistence failures degrade the
    /// summary but never abort the cycle.
    pub async fn async_step(&self) -> TickReport {
        self.wait_if_paused().await;

        let cycle = self.steps.fetch_add(1, Ordering::AcqRel).saturating_add(1);
        debug!(cycle, "Tick started");

        let loaded = match self.store.get_world_state(None).await {
            Ok(loaded) => loaded,
            Err(err) => {
                error!(cycle, %err, "Failed to load world state");
                return TickReport {
                    cycle,
                    status: TickStatus::Error,
                    summary: format!("Step failed: {err}"),
                };
            }
        };

        let mut world = loaded.unwrap_or_else(|| {
            // Cold start without a seeded world: synthesize a minimal one.
            warn!(cycle, "No persisted world; synthesizing a minimal state");
            WorldState::new(
                self.simulation_id.clone(),
                Environment::new(cycle, Utc::now().format("%H:%M").to_string()),
            )
        });
        world.environment.cycle = cycle;

        let (final_world, summary) = match self.attached_archon() {
            Some(archon) => match archon.run_cycle(world.clone()).await {
                Ok(outcome) => (outcome.world_state, outcome.archon_summary),
                Err(err) => {
                    error!(cycle, %err, "Archon adjudication failed");
                    (world, format!("Adjudication error: {err}"))
                }
            },
            None => {
                warn!(cycle, "No archon attached; passing world state through unchanged");
                (world, String::from("No adjudication (archon not attached)"))
            }
        };

        if let Err(err) = self.save_adjudicated_state(final_world).await {
            // The next successful save overwrites; keep ticking.
            error!(cycle, %err, "Failed to persist adjudicated state");
        } else {
            info!(cycle, "Cycle adjudicated and saved");
        }

        TickReport {
            cycle,
            status: TickStatus::Adjudicated,
            summary,
        }
    }

    /// Run ticks until [`stop`](Self::stop), sleeping `tick_interval_ms`
    /// between them. Honors the pause gate through `async_step`.
    pub async fn run_loop(&self, tick_interval_ms: u64) {
        self.running.store(true, Ordering::Release);
        info!(
            simulation_id = %self.simulation_id,
            tick_interval_ms,
            "Tick loop starting"
        );

        while self.running.load(Ordering::Acquire) {
            let report = self.async_step().await;
            debug!(cycle = report.cycle, summary = %report.summary, "Tick complete");

            if tick_interval_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(tick_interval_ms)).await;
            }
        }
        info!(simulation_id = %self.simulation_id, "Tick loop stopped");
    }

    /// Clear the pause gate; the next `async_step` blocks at the top.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
        info!(simulation_id = %self.simulation_id, "Engine paused");
    }

    /// Set the pause gate and wake a blocked tick.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.resume_notify.notify_one();
        info!(simulation_id = %self.simulation_id, "Engine resumed");
    }

    /// Request a cooperative stop of the run loop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Clear the state store, drop the attached archon's cached agents,
    /// and reset the cycle counter to zero.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the purge fails.
    pub async fn reset(&self) -> Result<(), EngineError> {
        self.store.clear_simulation().await?;
        if let Some(archon) = self.attached_archon() {
            archon.reset_agents();
        }
        self.steps.store(0, Ordering::Release);
        info!(simulation_id = %self.simulation_id, "Engine reset to cycle 0");
        Ok(())
    }

    /// Stop the loop and close the state store. Terminal.
    pub async fn shutdown(&self) {
        self.stop();
        // A paused engine would block the drain forever.
        self.resume_notify.notify_one();
        self.store.close().await;
        info!(simulation_id = %self.simulation_id, "Engine shutdown complete");
    }

    async fn wait_if_paused(&self) {
        while self.paused.load(Ordering::Acquire) {
            self.resume_notify.notified().await;
        }
    }

    // =========================================================================
    // Convenience queries
    // =========================================================================

    /// Entities within `radius_degrees` of a point (store passthrough).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] on query failure.
    pub async fn get_entities_near(
        &self,
        lon: f64,
        lat: f64,
        radius_degrees: f64,
    ) -> Result<Vec<EntityHit>, EngineError> {
        Ok(self
            .store
            .get_entities_within_distance(lon, lat, radius_degrees, None)
            .await?)
    }

    /// Movement feasibility for one entity (feasibility passthrough).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] on query failure.
    pub async fn check_movement_feasible(
        &self,
        entity_id: &str,
        target_lon: f64,
        target_lat: f64,
        max_distance: Option<f64>,
    ) -> Result<FeasibilityReport, EngineError> {
        Ok(self
            .feasibility
            .check_movement_feasibility(entity_id, target_lon, target_lat, max_distance)
            .await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use universalis_llm::{Embedder, LanguageModel, LlmController, ScriptedModel};
    use universalis_memory::{EventType, ScopeFilter};
    use universalis_types::{Asset, Location, Resolution};

    use crate::archon::DEFAULT_PERCEPTION_RADIUS;

    use super::*;

    struct Rig {
        engine: Arc<TickEngine>,
        archon: Arc<Archon>,
        scripted: Arc<ScriptedModel>,
        memory: Arc<MemoryBank>,
        stream: Arc<EventStream>,
        store: Arc<StateStore>,
    }

    async fn make_rig() -> Rig {
        let store = Arc::new(StateStore::open_in_memory("Alpha_Scenario").await.unwrap());
        let memory = Arc::new(MemoryBank::new(
            "Alpha_Scenario",
            "memories",
            Embedder::HashSeeded { dim: 16 },
        ));
        let stream = Arc::new(EventStream::new("Alpha_Scenario"));
        let scripted = Arc::new(ScriptedModel::new());
        let llm = Arc::new(LlmController::new(LanguageModel::Scripted(Arc::clone(
            &scripted,
        ))));
        let archon = Arc::new(Archon::new(
            llm,
            Arc::clone(&store),
            DEFAULT_PERCEPTION_RADIUS,
        ));
        let engine = Arc::new(
            TickEngine::new(Arc::clone(&store), Arc::clone(&memory), Arc::clone(&stream))
                .await
                .unwrap(),
        );
        engine.attach_archon(Arc::clone(&archon)).unwrap();
        Rig {
            engine,
            archon,
            scripted,
            memory,
            stream,
            store,
        }
    }

    fn wildfire_world(cycle: u64) -> WorldState {
        let mut environment = Environment::new(cycle, String::from("06:00"));
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
        world.assets.insert(
            String::from("Helo_Alpha"),
            Asset {
                asset_id: String::from("Helo_Alpha"),
                name: String::from("Helo Alpha"),
                asset_type: String::from("helicopter"),
                location: BTreeMap::from([
                    (String::from("lat"), 34.10),
                    (String::from("lon"), -118.30),
                ]),
                attributes: BTreeMap::new(),
                status: String::from("ready"),
            },
        );
        world.actors.insert(
            String::from("Actor_FireChief"),
            universalis_types::Actor {
                actor_id: String::from("Actor_FireChief"),
                role: String::from("Fire Chief"),
                description: String::from("Coordinates the county fire response."),
                resolution: Resolution::Macro,
                assets: vec![String::from("Truck_01"), String::from("Helo_Alpha")],
                objectives: vec![String::from("Contain the wildfire")],
                location: Some(Location::new(34.05, -118.25)),
                attributes: BTreeMap::new(),
                status: String::from("active"),
            },
        );
        world
    }

    /// Queue enough scripted replies for `ticks` full cycles of a
    /// one-actor world.
    fn script_ticks(scripted: &ScriptedModel, ticks: usize) {
        for index in 0..ticks {
            scripted.push_response(format!("Intent for tick {index}."));
            scripted.push_response(format!("Summary for tick {index}."));
        }
    }

    #[tokio::test]
    async fn single_actor_wildfire_tick() {
        let rig = make_rig().await;
        rig.store
            .save_world_state(&wildfire_world(0))
            .await
            .unwrap();
        rig.scripted
            .push_response("Dispatch Truck 01 to the eastern perimeter.");
        rig.scripted
            .push_response("The chief stages Truck 01 east; wind holds steady.");

        let report = rig.engine.async_step().await;
        assert_eq!(report.cycle, 1);
        assert_eq!(report.status, TickStatus::Adjudicated);
        assert!(report.summary.contains("stages Truck 01"));

        // Exactly one ADJUDICATION event for cycle 1, with metadata for
        // the actor's intent and feasibility report.
        let adjudications = rig.stream.events_by_type(EventType::Adjudication, None);
        assert_eq!(adjudications.len(), 1);
        let event = adjudications.first().unwrap();
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

        // The intent is stored as a PRIVATE memory for the chief.
        let own = ScopeFilter::for_agent("Actor_FireChief");
        let remembered = rig
            .memory
            .retrieve_associative("eastern perimeter", 5, &own)
            .await
            .unwrap();
        assert!(
            remembered
                .iter()
                .any(|text| text.contains("eastern perimeter"))
        );

        // The persisted snapshot carries the new cycle and summary.
        let persisted = rig.engine.get_current_state().await.unwrap().unwrap();
        assert_eq!(persisted.environment.cycle, 1);
        assert!(
            persisted
                .environment
                .global_events
                .iter()
                .any(|event| event.contains("stages Truck 01"))
        );
    }

    #[tokio::test]
    async fn cycles_are_strictly_increasing() {
        let rig = make_rig().await;
        rig.store
            .save_world_state(&wildfire_world(0))
            .await
            .unwrap();
        script_ticks(&rig.scripted, 3);

        let mut cycles = Vec::new();
        for _ in 0..3 {
            let report = rig.engine.async_step().await;
            assert_eq!(report.status, TickStatus::Adjudicated);
            cycles.push(report.cycle);
            let persisted = rig.engine.get_current_state().await.unwrap().unwrap();
            assert_eq!(persisted.environment.cycle, report.cycle);
        }
        assert_eq!(cycles, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn agent_instance_identical_across_consecutive_ticks() {
        let rig = make_rig().await;
        rig.store
            .save_world_state(&wildfire_world(0))
            .await
            .unwrap();
        script_ticks(&rig.scripted, 2);

        rig.engine.async_step().await;
        let first = rig.archon.cached_agent("Actor_FireChief").unwrap();
        rig.engine.async_step().await;
        let second = rig.archon.cached_agent("Actor_FireChief").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn cold_start_synthesizes_minimal_world() {
        let rig = make_rig().await;
        // No seeded world, no actors: the only LLM call is the summary.
        rig.scripted.push_response("An empty world turns over.");

        let report = rig.engine.async_step().await;
        assert_eq!(report.cycle, 1);
        assert_eq!(report.status, TickStatus::Adjudicated);

        let persisted = rig.engine.get_current_state().await.unwrap().unwrap();
        assert_eq!(persisted.environment.cycle, 1);
        assert!(persisted.actors.is_empty());
    }

    #[tokio::test]
    async fn adjudication_error_falls_back_to_loaded_world() {
        let rig = make_rig().await;
        rig.store
            .save_world_state(&wildfire_world(0))
            .await
            .unwrap();
        // Agent succeeds; all three summary attempts fail.
        rig.scripted.push_response("Hold the line.");
        rig.scripted.push_failure("llm down");
        rig.scripted.push_failure("llm down");
        rig.scripted.push_failure("llm down");

        let report = rig.engine.async_step().await;
        assert_eq!(report.cycle, 1);
        assert_eq!(report.status, TickStatus::Adjudicated);
        assert!(report.summary.starts_with("Adjudication error:"));

        // The cycle still advanced and persisted the loaded world.
        let persisted = rig.engine.get_current_state().await.unwrap().unwrap();
        assert_eq!(persisted.environment.cycle, 1);
        // No summary was appended to the event log.
        assert_eq!(persisted.environment.global_events.len(), 1);
    }

    #[tokio::test]
    async fn engine_without_archon_passes_world_through() {
        let store = Arc::new(StateStore::open_in_memory("Alpha_Scenario").await.unwrap());
        let memory = Arc::new(MemoryBank::new(
            "Alpha_Scenario",
            "memories",
            Embedder::HashSeeded { dim: 16 },
        ));
        let stream = Arc::new(EventStream::new("Alpha_Scenario"));
        let engine = TickEngine::new(Arc::clone(&store), memory, stream)
            .await
            .unwrap();
        store.save_world_state(&wildfire_world(0)).await.unwrap();

        let report = engine.async_step().await;
        assert_eq!(report.cycle, 1);
        assert_eq!(report.summary, "No adjudication (archon not attached)");
    }

    #[tokio::test]
    async fn attach_twice_is_rejected() {
        let rig = make_rig().await;
        let second = Arc::new(Archon::new(
            Arc::new(LlmController::new(LanguageModel::Scripted(Arc::new(
                ScriptedModel::new(),
            )))),
            Arc::clone(&rig.store),
            DEFAULT_PERCEPTION_RADIUS,
        ));
        let err = rig.engine.attach_archon(second).unwrap_err();
        assert!(matches!(err, EngineError::ArchonAlreadyAttached));
    }

    #[tokio::test]
    async fn steps_restore_from_persisted_snapshot() {
        let store = Arc::new(StateStore::open_in_memory("Alpha_Scenario").await.unwrap());
        store.save_world_state(&wildfire_world(7)).await.unwrap();

        let memory = Arc::new(MemoryBank::new(
            "Alpha_Scenario",
            "memories",
            Embedder::HashSeeded { dim: 16 },
        ));
        let stream = Arc::new(EventStream::new("Alpha_Scenario"));
        let engine = TickEngine::new(store, memory, stream).await.unwrap();
        assert_eq!(engine.steps(), 7);
    }

    #[tokio::test]
    async fn pause_quiesces_and_resume_continues() {
        let rig = make_rig().await;
        rig.store
            .save_world_state(&wildfire_world(0))
            .await
            .unwrap();
        script_ticks(&rig.scripted, 100);

        let engine = Arc::clone(&rig.engine);
        let loop_handle = tokio::spawn(async move {
            engine.run_loop(20).await;
        });

        // Let a couple of ticks land.
        tokio::time::sleep(std::time::Duration::from_millis(120)).await;
        rig.engine.pause();
        assert!(rig.engine.is_paused());
        // Allow the in-flight tick to drain before sampling.
        tokio::time::sleep(std::time::Duration::from_millis(80)).await;
        let paused_cycle = rig.engine.steps();
        assert!(paused_cycle >= 2);

        // No snapshot advances while paused, at any interval.
        tokio::time::sleep(std::time::Duration::from_millis(250)).await;
        assert_eq!(rig.engine.steps(), paused_cycle);
        let persisted = rig.engine.get_current_state().await.unwrap().unwrap();
        assert_eq!(persisted.environment.cycle, paused_cycle);

        rig.engine.resume();
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        assert!(rig.engine.steps() >= paused_cycle.saturating_add(2));

        rig.engine.stop();
        rig.engine.resume();
        loop_handle.await.unwrap();
    }

    #[tokio::test]
    async fn reset_clears_store_counter_and_agents() {
        let rig = make_rig().await;
        rig.store
            .save_world_state(&wildfire_world(0))
            .await
            .unwrap();
        script_ticks(&rig.scripted, 1);
        rig.engine.async_step().await;
        assert_eq!(rig.engine.steps(), 1);
        assert!(rig.archon.cached_agent("Actor_FireChief").is_some());

        rig.engine.reset().await.unwrap();
        assert_eq!(rig.engine.steps(), 0);
        assert!(rig.engine.get_current_state().await.unwrap().is_none());
        // Stale agent instances do not survive a reset.
        assert!(rig.archon.cached_agent("Actor_FireChief").is_none());
    }

    #[tokio::test]
    async fn convenience_queries_pass_through() {
        let rig = make_rig().await;
        rig.store
            .save_world_state(&wildfire_world(0))
            .await
            .unwrap();

        let near = rig
            .engine
            .get_entities_near(-118.25, 34.05, 0.2)
            .await
            .unwrap();
        assert!(!near.is_empty());

        let report = rig
            .engine
            .check_movement_feasible("Truck_01", -118.20, 34.05, Some(1.0))
            .await
            .unwrap();
        assert!(report.feasible);
    }
}
