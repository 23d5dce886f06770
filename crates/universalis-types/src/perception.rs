//! Perception spheres: the slice of the world an actor sees each cycle.
//!
//! The Archon builds one [`PerceptionSphere`] per actor from the state
//! store before asking the agent for an intent. The sphere deliberately
//! excludes anything outside the configured perception radius; agents
//! reason only about what they can plausibly observe.

use serde::{Deserialize, Serialize};

use crate::enums::TerrainType;

/// An actor or asset observed within the perception radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyEntity {
    /// The entity's id.
    pub id: String,

    /// The entity's display name.
    pub name: String,

    /// Longitude of the observed position.
    pub lon: f64,

    /// Latitude of the observed position.
    pub lat: f64,

    /// Euclidean degree distance from the perceiving actor.
    pub distance: f64,

    /// The entity's lifecycle status at observation time.
    pub status: String,
}

/// Terrain summary at the perceiving actor's own position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainSummary {
    /// Terrain feature id.
    pub terrain_id: String,

    /// Terrain feature name.
    pub name: String,

    /// Terrain classification.
    pub terrain_type: TerrainType,

    /// Movement cost multiplier at this point.
    pub movement_cost: f64,

    /// Whether the terrain is passable.
    pub passable: bool,
}

/// Status line for an asset under the perceiving actor's command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlledAsset {
    /// Asset id.
    pub asset_id: String,

    /// Asset display name.
    pub name: String,

    /// Operational status.
    pub status: String,
}

/// Everything one actor perceives in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PerceptionSphere {
    /// Other actors within the perception radius, nearest first.
    pub nearby_actors: Vec<NearbyEntity>,

    /// Assets within the perception radius, nearest first.
    pub nearby_assets: Vec<NearbyEntity>,

    /// Terrain at the actor's own position, if any polygon contains it.
    pub terrain: Option<TerrainSummary>,

    /// The actor's own assets with their current status.
    pub controlled_assets: Vec<ControlledAsset>,

    /// The most recent global environment events, oldest first.
    pub recent_events: Vec<String>,
}

impl PerceptionSphere {
    /// Names of up to `limit` nearby actors, used in the adjudication
    /// prompt's per-actor context line.
    pub fn nearby_actor_names(&self, limit: usize) -> Vec<&str> {
        self.nearby_actors
            .iter()
            .take(limit)
            .map(|entity| entity.name.as_str())
            .collect()
    }
}
