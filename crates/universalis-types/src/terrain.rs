//! Polygonal terrain features.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::enums::TerrainType;

/// A polygonal region with passability and movement-cost attributes.
///
/// Geometry is carried as WKT (`POLYGON` or `MULTIPOLYGON`); the world
/// crate parses and validates the ring when the feature enters the state
/// store. `movement_cost` may be `f64::INFINITY` for terrain that is
/// formally impassable (deep water, cliffs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct TerrainFeature {
    /// Unique terrain identifier.
    #[validate(length(min = 1))]
    pub terrain_id: String,

    /// Display name (e.g. `Los Angeles River`).
    #[validate(length(min = 1))]
    pub name: String,

    /// Terrain classification.
    pub terrain_type: TerrainType,

    /// Polygon geometry in WKT form.
    #[validate(length(min = 1))]
    pub geometry_wkt: String,

    /// Movement cost multiplier, `>= 0`. `1.0` is unmodified movement.
    #[serde(default = "default_movement_cost")]
    #[validate(range(min = 0.0))]
    pub movement_cost: f64,

    /// Whether entities can traverse this terrain at all.
    #[serde(default = "default_passable")]
    pub passable: bool,

    /// Free-form attributes.
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

const fn default_passable() -> bool {
    true
}

const fn default_movement_cost() -> f64 {
    1.0
}

impl TerrainFeature {
    /// Create a passable terrain feature with unit movement cost.
    pub fn new(
        terrain_id: impl Into<String>,
        name: impl Into<String>,
        terrain_type: TerrainType,
        geometry_wkt: impl Into<String>,
    ) -> Self {
        Self {
            terrain_id: terrain_id.into(),
            name: name.into(),
            terrain_type,
            geometry_wkt: geometry_wkt.into(),
            movement_cost: 1.0,
            passable: true,
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style movement cost override.
    #[must_use]
    pub const fn with_movement_cost(mut self, cost: f64) -> Self {
        self.movement_cost = cost;
        self
    }

    /// Builder-style passability override.
    #[must_use]
    pub const fn with_passable(mut self, passable: bool) -> Self {
        self.passable = passable;
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_cost_and_passability() {
        let water = TerrainFeature::new(
            "terrain_river",
            "LA River",
            TerrainType::Water,
            "POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))",
        )
        .with_movement_cost(f64::INFINITY)
        .with_passable(false);

        assert!(!water.passable);
        assert!(water.movement_cost.is_infinite());
        assert!(water.validate().is_ok());
    }

    #[test]
    fn deserialization_defaults() {
        let json = r#"{
            "terrain_id": "terrain_plain",
            "name": "Central Plain",
            "terrain_type": "PLAINS",
            "geometry_wkt": "POLYGON((0 0, 2 0, 2 2, 0 2, 0 0))"
        }"#;
        let terrain: TerrainFeature = serde_json::from_str(json).unwrap();
        assert!(terrain.passable);
        assert!((terrain.movement_cost - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn validation_rejects_negative_cost() {
        let mut terrain = TerrainFeature::new(
            "terrain_bad",
            "Bad",
            TerrainType::Desert,
            "POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))",
        );
        terrain.movement_cost = -1.0;
        assert!(terrain.validate().is_err());
    }
}
