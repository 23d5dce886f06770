//! Scenario deltas: declarative edits layered over a base world.
//!
//! A scenario document names a base world, an ordered list of RFC 6902
//! JSON Patch operations, and explicit overrides (initial cycle, time,
//! weather, events, actor and asset lists). Assembly is strictly
//! ordered: deep-copy the base as JSON, apply patches in sequence, then
//! overlay the explicit fields. The free-form `variables` map rides
//! along into snapshot metadata so downstream tooling can recover the
//! scenario's parameters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use universalis_types::{Actor, Asset, Environment, IntegrityError, WorldState};

/// Errors raised while assembling a scenario.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// A JSON pointer was syntactically invalid.
    #[error("invalid JSON pointer '{pointer}'")]
    BadPointer {
        /// The offending pointer text.
        pointer: String,
    },

    /// A patch operation referenced a path that does not exist.
    #[error("patch target '{pointer}' not found")]
    MissingTarget {
        /// The pointer that failed to resolve.
        pointer: String,
    },

    /// A `test` operation found a different value than expected.
    #[error("test failed at '{pointer}': expected {expected}, found {found}")]
    TestFailed {
        /// The tested pointer.
        pointer: String,
        /// The value the scenario expected.
        expected: Value,
        /// The value actually present.
        found: Value,
    },

    /// The patched document no longer deserializes as a world state.
    #[error("patched world does not deserialize: {source}")]
    Malformed {
        /// The underlying serde error.
        #[from]
        source: serde_json::Error,
    },

    /// The assembled world failed integrity validation.
    #[error("assembled world failed validation: {source}")]
    Invalid {
        /// The underlying integrity error.
        #[from]
        source: IntegrityError,
    },
}

/// One RFC 6902 patch operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    /// Insert or append a value at `path`.
    Add {
        /// Target pointer.
        path: String,
        /// Value to insert.
        value: Value,
    },
    /// Remove the value at `path`.
    Remove {
        /// Target pointer.
        path: String,
    },
    /// Replace the existing value at `path`.
    Replace {
        /// Target pointer.
        path: String,
        /// Replacement value.
        value: Value,
    },
    /// Remove the value at `from` and add it at `path`.
    Move {
        /// Source pointer.
        from: String,
        /// Target pointer.
        path: String,
    },
    /// Copy the value at `from` to `path`.
    Copy {
        /// Source pointer.
        from: String,
        /// Target pointer.
        path: String,
    },
    /// Assert that the value at `path` equals `value`.
    Test {
        /// Target pointer.
        path: String,
        /// Expected value.
        value: Value,
    },
}

/// A scenario document: base world reference, patches, and overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDelta {
    /// Unique scenario identifier.
    pub scenario_id: String,

    /// Optional id of the base world this scenario derives from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_id: Option<String>,

    /// Override for the initial cycle number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_cycle: Option<u64>,

    /// Override for the initial time of day.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_time: Option<String>,

    /// Override for the initial weather.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_weather: Option<String>,

    /// Global events seeded into the environment.
    #[serde(default)]
    pub initial_events: Vec<String>,

    /// Actors inserted (or overwritten by id) after patching.
    #[serde(default)]
    pub actors: Vec<Actor>,

    /// Assets inserted (or overwritten by id) after patching.
    #[serde(default)]
    pub assets: Vec<Asset>,

    /// Ordered RFC 6902 operations applied to the base world.
    #[serde(default)]
    pub patch: Vec<PatchOp>,

    /// Free-form scenario parameters, carried into snapshot metadata.
    #[serde(default)]
    pub variables: BTreeMap<String, Value>,
}

impl ScenarioDelta {
    /// Assemble a world from this scenario and a base world.
    ///
    /// The base is deep-copied; patches apply in order; explicit fields
    /// overlay last. The result is integrity-validated before return.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError`] if a patch fails, the patched document
    /// no longer deserializes, or the assembled world is invalid.
    pub fn apply(&self, base: &WorldState) -> Result<WorldState, ScenarioError> {
        let mut doc = serde_json::to_value(base)?;
        apply_patch(&mut doc, &self.patch)?;
        let mut world: WorldState = serde_json::from_value(doc)?;

        if let Some(cycle) = self.initial_cycle {
            world.environment.cycle = cycle;
        }
        if let Some(ref time) = self.initial_time {
            world.environment.time = time.clone();
        }
        if let Some(ref weather) = self.initial_weather {
            world.environment.weather = weather.clone();
        }
        world
            .environment
            .global_events
            .extend(self.initial_events.iter().cloned());

        for actor in &self.actors {
            world.actors.insert(actor.actor_id.clone(), actor.clone());
        }
        for asset in &self.assets {
            world.assets.insert(asset.asset_id.clone(), asset.clone());
        }

        world.metadata.insert(
            String::from("scenario_id"),
            Value::String(self.scenario_id.clone()),
        );
        if let Some(ref world_id) = self.world_id {
            world
                .metadata
                .insert(String::from("world_id"), Value::String(world_id.clone()));
        }
        if !self.variables.is_empty() {
            world.metadata.insert(
                String::from("variables"),
                serde_json::to_value(&self.variables)?,
            );
        }

        world.validate_integrity()?;
        info!(
            scenario_id = %self.scenario_id,
            actors = world.actors.len(),
            assets = world.assets.len(),
            "Scenario assembled"
        );
        Ok(world)
    }

    /// Assemble a world with no base: patches apply over an empty world
    /// for the given simulation id.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`apply`](Self::apply).
    pub fn apply_fresh(&self, simulation_id: &str) -> Result<WorldState, ScenarioError> {
        let base = WorldState::new(simulation_id, Environment::default());
        self.apply(&base)
    }
}

/// Apply an ordered list of patch operations to a JSON document.
///
/// # Errors
///
/// Returns [`ScenarioError`] on the first failing operation; earlier
/// operations remain applied (callers patch a scratch copy).
pub fn apply_patch(doc: &mut Value, ops: &[PatchOp]) -> Result<(), ScenarioError> {
    for op in ops {
        match op {
            PatchOp::Add { path, value } => add(doc, path, value.clone())?,
            PatchOp::Remove { path } => {
                remove(doc, path)?;
            }
            PatchOp::Replace { path, value } => {
                let target = doc
                    .pointer_mut(path)
                    .ok_or_else(|| ScenarioError::MissingTarget {
                        pointer: path.clone(),
                    })?;
                *target = value.clone();
            }
            PatchOp::Move { from, path } => {
                let value = remove(doc, from)?;
                add(doc, path, value)?;
            }
            PatchOp::Copy { from, path } => {
                let value = doc
                    .pointer(from)
                    .cloned()
                    .ok_or_else(|| ScenarioError::MissingTarget {
                        pointer: from.clone(),
                    })?;
                add(doc, path, value)?;
            }
            PatchOp::Test { path, value } => {
                let found = doc
                    .pointer(path)
                    .ok_or_else(|| ScenarioError::MissingTarget {
                        pointer: path.clone(),
                    })?;
                if found != value {
                    return Err(ScenarioError::TestFailed {
                        pointer: path.clone(),
                        expected: value.clone(),
                        found: found.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}

/// Split a pointer into its parent pointer and final (unescaped) token.
fn split_pointer(pointer: &str) -> Result<(&str, String), ScenarioError> {
    if pointer.is_empty() || !pointer.starts_with('/') {
        return Err(ScenarioError::BadPointer {
            pointer: pointer.to_owned(),
        });
    }
    let split_at = pointer.rfind('/').unwrap_or(0);
    let parent = pointer.get(..split_at).unwrap_or_default();
    let raw_token = pointer.get(split_at.saturating_add(1)..).unwrap_or_default();
    // RFC 6901 escape order: ~1 first, then ~0.
    let token = raw_token.replace("~1", "/").replace("~0", "~");
    Ok((parent, token))
}

/// Insert `value` at `pointer` (object insert, array index insert, or
/// `-` append).
fn add(doc: &mut Value, pointer: &str, value: Value) -> Result<(), ScenarioError> {
    let (parent_ptr, token) = split_pointer(pointer)?;
    let parent = doc
        .pointer_mut(parent_ptr)
        .ok_or_else(|| ScenarioError::MissingTarget {
            pointer: parent_ptr.to_owned(),
        })?;

    match parent {
        Value::Object(map) => {
            map.insert(token, value);
            Ok(())
        }
        Value::Array(items) => {
            if token == "-" {
                items.push(value);
                return Ok(());
            }
            let index: usize = token.parse().map_err(|_err| ScenarioError::BadPointer {
                pointer: pointer.to_owned(),
            })?;
            if index > items.len() {
                return Err(ScenarioError::MissingTarget {
                    pointer: pointer.to_owned(),
                });
            }
            items.insert(index, value);
            Ok(())
        }
        _ => Err(ScenarioError::MissingTarget {
            pointer: parent_ptr.to_owned(),
        }),
    }
}

/// Remove and return the value at `pointer`.
fn remove(doc: &mut Value, pointer: &str) -> Result<Value, ScenarioError> {
    let (parent_ptr, token) = split_pointer(pointer)?;
    let parent = doc
        .pointer_mut(parent_ptr)
        .ok_or_else(|| ScenarioError::MissingTarget {
            pointer: parent_ptr.to_owned(),
        })?;

    match parent {
        Value::Object(map) => map.remove(&token).ok_or_else(|| ScenarioError::MissingTarget {
            pointer: pointer.to_owned(),
        }),
        Value::Array(items) => {
            let index: usize = token.parse().map_err(|_err| ScenarioError::BadPointer {
                pointer: pointer.to_owned(),
            })?;
            if index >= items.len() {
                return Err(ScenarioError::MissingTarget {
                    pointer: pointer.to_owned(),
                });
            }
            Ok(items.remove(index))
        }
        _ => Err(ScenarioError::MissingTarget {
            pointer: parent_ptr.to_owned(),
        }),
    }
}
