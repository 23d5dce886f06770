//! Closed enumerations shared across the simulation.

use serde::{Deserialize, Serialize};

/// Resolution tag for an actor.
///
/// Macro actors reason strategically over their whole command; micro
/// actors additionally log their intents to the event stream so that
/// individual behavior can be traced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// Strategic / organizational resolution (the default).
    #[default]
    Macro,
    /// Individual / social resolution.
    Micro,
}

/// Terrain classification for a polygonal feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TerrainType {
    /// Open plains.
    Plains,
    /// Mountain range.
    Mountains,
    /// Forested area.
    Forest,
    /// Body of water.
    Water,
    /// Built-up urban area.
    Urban,
    /// Desert.
    Desert,
    /// Road network segment.
    Road,
}

impl core::fmt::Display for TerrainType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Plains => "PLAINS",
            Self::Mountains => "MOUNTAINS",
            Self::Forest => "FOREST",
            Self::Water => "WATER",
            Self::Urban => "URBAN",
            Self::Desert => "DESERT",
            Self::Road => "ROAD",
        };
        write!(f, "{name}")
    }
}

/// The category of a feasibility constraint.
///
/// Categories drive the fixed recommendation table: a violated resource
/// constraint suggests reallocation, a violated path constraint suggests
/// a different route, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintType {
    /// Resource availability (fuel, supplies, destroyed assets).
    Resource,
    /// Physical / operational status of an asset.
    Physical,
    /// Authorization and command policy.
    Policy,
    /// Terrain passability at a named point.
    Spatial,
    /// Movement distance limits.
    Distance,
    /// Terrain passability at a movement target.
    Terrain,
    /// Straight-line path blocking by impassable terrain.
    Path,
}

impl core::fmt::Display for ConstraintType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Resource => "resource",
            Self::Physical => "physical",
            Self::Policy => "policy",
            Self::Spatial => "spatial",
            Self::Distance => "distance",
            Self::Terrain => "terrain",
            Self::Path => "path",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn resolution_defaults_to_macro() {
        assert_eq!(Resolution::default(), Resolution::Macro);
    }

    #[test]
    fn resolution_serializes_lowercase() {
        let json = serde_json::to_string(&Resolution::Micro).unwrap();
        assert_eq!(json, "\"micro\"");
        let back: Resolution = serde_json::from_str("\"macro\"").unwrap();
        assert_eq!(back, Resolution::Macro);
    }

    #[test]
    fn terrain_type_serializes_uppercase() {
        let json = serde_json::to_string(&TerrainType::Water).unwrap();
        assert_eq!(json, "\"WATER\"");
        let back: TerrainType = serde_json::from_str("\"MOUNTAINS\"").unwrap();
        assert_eq!(back, TerrainType::Mountains);
    }

    #[test]
    fn terrain_type_display_matches_serde() {
        assert_eq!(TerrainType::Urban.to_string(), "URBAN");
        assert_eq!(TerrainType::Road.to_string(), "ROAD");
    }

    #[test]
    fn constraint_type_display() {
        assert_eq!(ConstraintType::Resource.to_string(), "resource");
        assert_eq!(ConstraintType::Path.to_string(), "path");
    }
}
