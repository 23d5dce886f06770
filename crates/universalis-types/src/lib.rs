//! Shared type definitions for the Universalis simulation.
//!
//! Every crate in the workspace speaks these types: the geographic data
//! model (locations, terrain), the entity model (actors and the assets
//! they control), the per-cycle world snapshot, and the records exchanged
//! between the adjudication pipeline stages (intents, feasibility
//! reports, perception spheres).
//!
//! Validation happens at this boundary: coordinates, importance scores,
//! and identifiers are checked when values enter the system, so the
//! pipeline downstream never sees malformed data.

pub mod enums;
pub mod intent;
pub mod perception;
pub mod terrain;
pub mod world;

// Re-export primary types for convenience.
pub use enums::{ConstraintType, Resolution, TerrainType};
pub use intent::{ConstraintViolation, FeasibilityReport, Intent};
pub use perception::{ControlledAsset, NearbyEntity, PerceptionSphere, TerrainSummary};
pub use terrain::TerrainFeature;
pub use world::{
    Actor, Asset, Environment, IntegrityError, Location, WorldState, is_valid_time_of_day,
};
