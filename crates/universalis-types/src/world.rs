//! The entity model and per-cycle world snapshot.
//!
//! A [`WorldState`] is the ground truth for one simulation cycle: the
//! shared [`Environment`], every [`Actor`] keyed by id, and every
//! [`Asset`] keyed by id. Snapshots are persisted once per cycle and are
//! never mutated across cycles.
//!
//! Actor and asset maps are `BTreeMap`s on purpose: iteration order over
//! actors feeds the adjudication prompt, and the same input world must
//! yield the same prompt.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::enums::Resolution;

/// A geographic point: latitude, longitude, optional elevation in meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Location {
    /// Latitude in decimal degrees.
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,

    /// Longitude in decimal degrees.
    #[validate(range(min = -180.0, max = 180.0))]
    pub lon: f64,

    /// Elevation in meters above sea level, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
}

impl Location {
    /// Create a location from latitude and longitude.
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            elevation: None,
        }
    }

    /// Serialize this point as a WKT `POINT(lon lat)` string.
    pub fn to_wkt(&self) -> String {
        format!("POINT({} {})", self.lon, self.lat)
    }
}

/// The shared environmental state of a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    /// Monotonically increasing cycle counter.
    #[serde(default)]
    pub cycle: u64,

    /// Simulated time of day in `HH:MM` form (wall-clock free).
    #[serde(default = "default_time")]
    pub time: String,

    /// Free-form weather description.
    #[serde(default = "default_weather")]
    pub weather: String,

    /// Running log of major world events, newest last.
    #[serde(default)]
    pub global_events: Vec<String>,

    /// Mapping of terrain-type name to movement modifier.
    #[serde(default)]
    pub terrain_modifiers: BTreeMap<String, f64>,
}

impl Environment {
    /// Create an environment at a specific cycle and time of day.
    pub fn new(cycle: u64, time: String) -> Self {
        Self {
            cycle,
            time,
            ..Self::default()
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            cycle: 0,
            time: default_time(),
            weather: default_weather(),
            global_events: Vec::new(),
            terrain_modifiers: BTreeMap::new(),
        }
    }
}

fn default_time() -> String {
    String::from("08:00")
}

fn default_weather() -> String {
    String::from("Clear")
}

/// Whether a string is a valid `HH:MM` time of day.
pub fn is_valid_time_of_day(time: &str) -> bool {
    let parts: Vec<&str> = time.split(':').collect();
    let [hours, minutes] = parts.as_slice() else {
        return false;
    };
    hours.len() == 2
        && minutes.len() == 2
        && hours.parse::<u8>().is_ok_and(|h| h < 24)
        && minutes.parse::<u8>().is_ok_and(|m| m < 60)
}

/// A decision-making entity: perceives the world, forms intents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Actor {
    /// Unique actor identifier (e.g. `Actor_FireChief`).
    #[validate(length(min = 1))]
    pub actor_id: String,

    /// The actor's role (e.g. `Fire Chief`, `Commander_Red`).
    #[validate(length(min = 1))]
    pub role: String,

    /// Free-form description shown in the actor's prompt.
    #[serde(default)]
    pub description: String,

    /// Strategic (macro) or individual (micro) resolution.
    #[serde(default)]
    pub resolution: Resolution,

    /// Ids of the assets under this actor's command.
    #[serde(default)]
    pub assets: Vec<String>,

    /// Ordered objectives for this actor.
    #[serde(default)]
    pub objectives: Vec<String>,

    /// Current position, if the actor is placed on the map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub location: Option<Location>,

    /// Free-form attributes (groups, doctrine, morale, ...).
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,

    /// Lifecycle status (`active`, `deleted`, ...).
    #[serde(default = "default_status")]
    pub status: String,
}

impl Actor {
    /// The shared-memory groups this actor belongs to, read from the
    /// `groups` attribute when present.
    pub fn groups(&self) -> Vec<String> {
        self.attributes
            .get("groups")
            .and_then(serde_json::Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(serde_json::Value::as_str)
                    .map(ToOwned::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A controllable resource: vehicle, facility, formation.
///
/// Asset locations are a loose `{lat, lon, elevation?}` mapping because
/// seed files frequently omit keys; [`Asset::location_point`] lifts the
/// mapping into a typed [`Location`] when both coordinates are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Asset {
    /// Unique asset identifier (e.g. `Truck_01`).
    #[validate(length(min = 1))]
    pub asset_id: String,

    /// Display name.
    #[validate(length(min = 1))]
    pub name: String,

    /// Free-form type tag (e.g. `vehicle`, `battalion`, `facility`).
    #[serde(default)]
    pub asset_type: String,

    /// Position mapping with optional `lat` / `lon` / `elevation` keys.
    #[serde(default)]
    pub location: BTreeMap<String, f64>,

    /// Free-form attributes (`fuel`, capacity, ...).
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,

    /// Operational status (`active`, `ready`, `standby`, `destroyed`,
    /// `unavailable`, `deleted`, ...).
    #[serde(default = "default_status")]
    pub status: String,
}

impl Asset {
    /// The asset's position as a typed [`Location`], if both coordinates
    /// are present in the location mapping.
    pub fn location_point(&self) -> Option<Location> {
        let lat = self.location.get("lat").copied()?;
        let lon = self.location.get("lon").copied()?;
        Some(Location {
            lat,
            lon,
            elevation: self.location.get("elevation").copied(),
        })
    }
}

fn default_status() -> String {
    String::from("active")
}

/// Integrity violations detected at snapshot commit.
#[derive(Debug, thiserror::Error)]
pub enum IntegrityError {
    /// The environment's time of day is not `HH:MM`.
    #[error("time of day '{time}' is not HH:MM")]
    BadTimeOfDay {
        /// The rejected time string.
        time: String,
    },

    /// An actor references an asset id that is not in the world's asset set.
    #[error("actor {actor_id} references unknown asset {asset_id}")]
    UnknownAsset {
        /// The referencing actor.
        actor_id: String,
        /// The missing asset id.
        asset_id: String,
    },

    /// A map key does not match the entity's own id field.
    #[error("map key {key} does not match entity id {entity_id}")]
    KeyMismatch {
        /// The key under which the entity is stored.
        key: String,
        /// The id the entity carries.
        entity_id: String,
    },

    /// An entity failed field-level validation.
    #[error("entity {entity_id} failed validation: {source}")]
    Invalid {
        /// The offending entity id.
        entity_id: String,
        /// Field-level validation failures.
        source: validator::ValidationErrors,
    },
}

/// The complete state of the simulation world at one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    /// The simulation this snapshot belongs to.
    pub simulation_id: String,

    /// Shared environmental state.
    pub environment: Environment,

    /// All actors, keyed by actor id.
    #[serde(default)]
    pub actors: BTreeMap<String, Actor>,

    /// All assets, keyed by asset id.
    #[serde(default)]
    pub assets: BTreeMap<String, Asset>,

    /// Free-form snapshot metadata (scenario variables, provenance).
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,

    /// Wall-clock timestamp of the last save.
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
}

impl WorldState {
    /// Create an empty world at the given cycle for a simulation.
    pub fn new(simulation_id: impl Into<String>, environment: Environment) -> Self {
        Self {
            simulation_id: simulation_id.into(),
            environment,
            actors: BTreeMap::new(),
            assets: BTreeMap::new(),
            metadata: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }

    /// Validate the snapshot before commit.
    ///
    /// Checks field-level validity of every actor and asset, that map keys
    /// match entity ids, and that every asset id referenced by an actor
    /// exists in the asset set.
    ///
    /// # Errors
    ///
    /// Returns the first [`IntegrityError`] encountered.
    pub fn validate_integrity(&self) -> Result<(), IntegrityError> {
        if !is_valid_time_of_day(&self.environment.time) {
            return Err(IntegrityError::BadTimeOfDay {
                time: self.environment.time.clone(),
            });
        }
        for (key, actor) in &self.actors {
            if key != &actor.actor_id {
                return Err(IntegrityError::KeyMismatch {
                    key: key.clone(),
                    entity_id: actor.actor_id.clone(),
                });
            }
            actor.validate().map_err(|source| IntegrityError::Invalid {
                entity_id: actor.actor_id.clone(),
                source,
            })?;
            for asset_id in &actor.assets {
                if !self.assets.contains_key(asset_id) {
                    return Err(IntegrityError::UnknownAsset {
                        actor_id: actor.actor_id.clone(),
                        asset_id: asset_id.clone(),
                    });
                }
            }
        }
        for (key, asset) in &self.assets {
            if key != &asset.asset_id {
                return Err(IntegrityError::KeyMismatch {
                    key: key.clone(),
                    entity_id: asset.asset_id.clone(),
                });
            }
            asset.validate().map_err(|source| IntegrityError::Invalid {
                entity_id: asset.asset_id.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn make_actor(actor_id: &str, assets: Vec<String>) -> Actor {
        Actor {
            actor_id: actor_id.to_owned(),
            role: String::from("Fire Chief"),
            description: String::from("Coordinates the county fire response."),
            resolution: Resolution::Macro,
            assets,
            objectives: vec![String::from("Contain the wildfire")],
            location: Some(Location::new(34.05, -118.25)),
            attributes: BTreeMap::new(),
            status: String::from("active"),
        }
    }

    fn make_asset(asset_id: &str) -> Asset {
        let mut location = BTreeMap::new();
        location.insert(String::from("lat"), 34.05);
        location.insert(String::from("lon"), -118.25);
        Asset {
            asset_id: asset_id.to_owned(),
            name: asset_id.to_owned(),
            asset_type: String::from("vehicle"),
            location,
            attributes: BTreeMap::new(),
            status: String::from("active"),
        }
    }

    #[test]
    fn location_wkt_is_lon_lat() {
        let loc = Location::new(34.05, -118.25);
        assert_eq!(loc.to_wkt(), "POINT(-118.25 34.05)");
    }

    #[test]
    fn location_validation_rejects_out_of_range() {
        let bad = Location::new(91.0, 0.0);
        assert!(bad.validate().is_err());
        let bad = Location::new(0.0, -181.0);
        assert!(bad.validate().is_err());
        let good = Location::new(-90.0, 180.0);
        assert!(good.validate().is_ok());
    }

    #[test]
    fn time_of_day_validation() {
        assert!(is_valid_time_of_day("08:00"));
        assert!(is_valid_time_of_day("23:59"));
        assert!(!is_valid_time_of_day("24:00"));
        assert!(!is_valid_time_of_day("9:30"));
        assert!(!is_valid_time_of_day("not a time"));

        let mut world = WorldState::new("Alpha_Scenario", Environment::default());
        world.environment.time = String::from("99:99");
        let err = world.validate_integrity().unwrap_err();
        assert!(matches!(err, IntegrityError::BadTimeOfDay { .. }));
    }

    #[test]
    fn asset_location_point_requires_both_coordinates() {
        let asset = make_asset("Truck_01");
        let point = asset.location_point().unwrap();
        assert!((point.lat - 34.05).abs() < f64::EPSILON);
        assert!((point.lon - (-118.25)).abs() < f64::EPSILON);

        let mut partial = make_asset("Helo_Alpha");
        partial.location.remove("lon");
        assert!(partial.location_point().is_none());
    }

    #[test]
    fn actor_groups_read_from_attributes() {
        let mut actor = make_actor("Actor_A", Vec::new());
        assert!(actor.groups().is_empty());
        actor.attributes.insert(
            String::from("groups"),
            serde_json::json!(["ops", "command"]),
        );
        assert_eq!(actor.groups(), vec!["ops", "command"]);
    }

    #[test]
    fn integrity_rejects_unknown_asset_reference() {
        let mut world = WorldState::new("Alpha_Scenario", Environment::default());
        world.actors.insert(
            String::from("Actor_A"),
            make_actor("Actor_A", vec![String::from("Truck_01")]),
        );
        let err = world.validate_integrity().unwrap_err();
        assert!(matches!(err, IntegrityError::UnknownAsset { .. }));

        world
            .assets
            .insert(String::from("Truck_01"), make_asset("Truck_01"));
        assert!(world.validate_integrity().is_ok());
    }

    #[test]
    fn integrity_rejects_key_mismatch() {
        let mut world = WorldState::new("Alpha_Scenario", Environment::default());
        world
            .actors
            .insert(String::from("Wrong_Key"), make_actor("Actor_A", Vec::new()));
        let err = world.validate_integrity().unwrap_err();
        assert!(matches!(err, IntegrityError::KeyMismatch { .. }));
    }

    #[test]
    fn world_state_round_trips_through_json() {
        let mut world = WorldState::new("Alpha_Scenario", Environment::default());
        world
            .assets
            .insert(String::from("Truck_01"), make_asset("Truck_01"));
        world.actors.insert(
            String::from("Actor_A"),
            make_actor("Actor_A", vec![String::from("Truck_01")]),
        );

        let json = serde_json::to_string(&world).unwrap();
        let back: WorldState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, world);
    }

    #[test]
    fn missing_optional_fields_default() {
        let json = r#"{
            "simulation_id": "Alpha_Scenario",
            "environment": {"cycle": 3}
        }"#;
        let world: WorldState = serde_json::from_str(json).unwrap();
        assert_eq!(world.environment.cycle, 3);
        assert_eq!(world.environment.time, "08:00");
        assert_eq!(world.environment.weather, "Clear");
        assert!(world.actors.is_empty());
        assert!(world.assets.is_empty());
    }
}
