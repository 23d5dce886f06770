//! The Universalis core: adjudication and the master clock.
//!
//! Three subsystems assemble the per-cycle workflow:
//!
//! - [`feasibility`] -- a registry of named constraints that grades
//!   each actor intent against the world and the spatial store.
//! - [`archon`] -- the adjudicator: a three-node pipeline (perception,
//!   feasibility, adjudication) threading a shared state record, ending
//!   in a single referee LLM call.
//! - [`engine`] -- the tick engine: cycle counter, pause gate,
//!   cooperative loop, snapshot persistence.
//!
//! [`config`] holds the process-wide configuration these subsystems are
//! wired from.

pub mod archon;
pub mod config;
pub mod engine;
pub mod error;
pub mod feasibility;

pub use archon::{Archon, ArchonState, CycleOutcome, Rationale};
pub use config::{
    ConfigError, LlmConfig, MemoryConfig, SimulationConfig, StoreConfig, UniversalisConfig,
};
pub use engine::{TickEngine, TickReport, TickStatus};
pub use error::{ArchonError, EngineError};
pub use feasibility::{Constraint, ConstraintCheck, FeasibilityEngine};
