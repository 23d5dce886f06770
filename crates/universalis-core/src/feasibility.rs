//! The feasibility engine: named constraints over intents.
//!
//! Every intent is graded against a registry of constraints before the
//! Archon narrates the cycle. Violations are first-class values, never
//! errors; a constraint whose *evaluation* fails (store outage, bad
//! geometry) is logged and skipped rather than counted against the
//! actor.
//!
//! Asset and actor references are matched by case-insensitive substring
//! of the intent text, and movement coordinates are pulled out with a
//! regex -- a deliberately blunt instrument carried over from the
//! original design so its behavior stays observable. Intents that
//! mention numbers for other reasons ("send 50 units") can trip the
//! spatial check.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::warn;

use universalis_store::StateStore;
use universalis_types::{
    ConstraintType, ConstraintViolation, FeasibilityReport, WorldState,
};

/// Verbs that mark an intent as a movement order.
const MOVEMENT_VERBS: &[&str] = &["move", "go", "travel", "deploy", "relocate", "dispatch", "send"];

/// Asset statuses considered operational.
const OPERATIONAL_STATUSES: &[&str] = &["active", "ready", "standby"];

/// A predicate over `(intent, world)`.
pub type ConstraintPredicate = Box<dyn Fn(&str, &WorldState) -> bool + Send + Sync>;

/// How a constraint is evaluated.
pub enum ConstraintCheck {
    /// A synchronous predicate over intent text and world state.
    Predicate(ConstraintPredicate),
    /// The built-in spatial movement check (terrain passability at every
    /// coordinate pair extracted from the intent).
    SpatialMovement,
}

/// A named constraint in the registry.
pub struct Constraint {
    /// Registry name (e.g. `actor_authorized`).
    pub name: String,
    /// Category, driving the recommendation table.
    pub constraint_type: ConstraintType,
    /// How the constraint is evaluated.
    pub check: ConstraintCheck,
    /// Message recorded when the constraint is violated.
    pub error_message: String,
}

/// Registry of constraints plus the spatial helpers built on the store.
pub struct FeasibilityEngine {
    store: Arc<StateStore>,
    constraints: Vec<Constraint>,
}

impl FeasibilityEngine {
    /// Create an engine with the default constraint set.
    pub fn new(store: Arc<StateStore>) -> Self {
        let mut engine = Self {
            store,
            constraints: Vec::new(),
        };
        engine.register_default_constraints();
        engine
    }

    fn register_default_constraints(&mut self) {
        self.register_constraint(Constraint {
            name: String::from("resource_availability"),
            constraint_type: ConstraintType::Resource,
            check: ConstraintCheck::Predicate(Box::new(check_resource_availability)),
            error_message: String::from("Required resources are not available"),
        });
        self.register_constraint(Constraint {
            name: String::from("asset_operational"),
            constraint_type: ConstraintType::Physical,
            check: ConstraintCheck::Predicate(Box::new(check_asset_operational)),
            error_message: String::from("Referenced asset is not operational"),
        });
        self.register_constraint(Constraint {
            name: String::from("actor_authorized"),
            constraint_type: ConstraintType::Policy,
            check: ConstraintCheck::Predicate(Box::new(check_actor_authorization)),
            error_message: String::from("Actor is not authorized to perform this action"),
        });
        self.register_constraint(Constraint {
            name: String::from("spatial_movement"),
            constraint_type: ConstraintType::Spatial,
            check: ConstraintCheck::SpatialMovement,
            error_message: String::from("Intent requires movement through impassable terrain"),
        });
    }

    /// Register an additional constraint.
    pub fn register_constraint(&mut self, constraint: Constraint) {
        tracing::debug!(name = %constraint.name, "Constraint registered");
        self.constraints.push(constraint);
    }

    /// Names of the registered constraints, in evaluation order.
    pub fn constraint_names(&self) -> Vec<&str> {
        self.constraints
            .iter()
            .map(|constraint| constraint.name.as_str())
            .collect()
    }

    /// Grade one intent against every registered constraint.
    pub async fn check_feasibility(&self, intent: &str, world: &WorldState) -> FeasibilityReport {
        let mut constraints_checked = Vec::with_capacity(self.constraints.len());
        let mut violations = Vec::new();

        for constraint in &self.constraints {
            constraints_checked.push(constraint.name.clone());
            let passed = match &constraint.check {
                ConstraintCheck::Predicate(predicate) => predicate(intent, world),
                ConstraintCheck::SpatialMovement => {
                    match self.check_spatial_movement(intent).await {
                        Ok(passed) => passed,
                        Err(err) => {
                            // Evaluation failures are not violations.
                            warn!(constraint = %constraint.name, %err, "Constraint check failed");
                            true
                        }
                    }
                }
            };
            if !passed {
                violations.push(ConstraintViolation {
                    constraint: constraint.name.clone(),
                    constraint_type: constraint.constraint_type,
                    message: constraint.error_message.clone(),
                });
            }
        }

        let recommendations = violations
            .iter()
            .filter_map(|violation| recommend(violation.constraint_type))
            .map(ToOwned::to_owned)
            .collect();

        FeasibilityReport::from_checks(intent, constraints_checked, violations, recommendations)
    }

    /// The spatial movement check: an intent with a movement verb and
    /// coordinate pairs fails if any extracted point is impassable.
    async fn check_spatial_movement(
        &self,
        intent: &str,
    ) -> Result<bool, universalis_store::StoreError> {
        if !has_movement_verb(intent) {
            return Ok(true);
        }
        for (lat, lon) in extract_coordinate_pairs(intent) {
            if let Some(terrain) = self.store.get_terrain_at_point(lon, lat).await?
                && !terrain.passable
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    // =========================================================================
    // Spatial helpers used by the Archon and tests
    // =========================================================================

    /// Full movement validation for one entity: distance limit (when
    /// given), terrain passability at the target, and path blocking.
    pub async fn check_movement_feasibility(
        &self,
        entity_id: &str,
        target_lon: f64,
        target_lat: f64,
        max_distance: Option<f64>,
    ) -> Result<FeasibilityReport, universalis_store::StoreError> {
        let intent = format!("move {entity_id} to ({target_lat}, {target_lon})");
        let mut constraints_checked = Vec::new();
        let mut violations = Vec::new();

        let position = self.store.entity_position(entity_id).await?;
        let Some(start) = position else {
            constraints_checked.push(String::from("entity_located"));
            violations.push(ConstraintViolation {
                constraint: String::from("entity_located"),
                constraint_type: ConstraintType::Distance,
                message: format!("Entity {entity_id} not found or has no geometry"),
            });
            let recommendations = violations
                .iter()
                .filter_map(|violation| recommend(violation.constraint_type))
                .map(ToOwned::to_owned)
                .collect();
            return Ok(FeasibilityReport::from_checks(
                intent,
                constraints_checked,
                violations,
                recommendations,
            ));
        };

        if let Some(max_distance) = max_distance {
            constraints_checked.push(String::from("movement_distance"));
            let distance = universalis_world::geometry::distance_degrees(
                start,
                (target_lon, target_lat),
            );
            if distance > max_distance {
                violations.push(ConstraintViolation {
                    constraint: String::from("movement_distance"),
                    constraint_type: ConstraintType::Distance,
                    message: format!(
                        "Movement distance {distance:.4} exceeds limit {max_distance:.4}"
                    ),
                });
            }
        }

        constraints_checked.push(String::from("terrain_passability"));
        if let Some(terrain) = self.store.get_terrain_at_point(target_lon, target_lat).await?
            && !terrain.passable
        {
            violations.push(ConstraintViolation {
                constraint: String::from("terrain_passability"),
                constraint_type: ConstraintType::Terrain,
                message: format!(
                    "Terrain '{}' ({}) at target is impassable",
                    terrain.name, terrain.terrain_type
                ),
            });
        }

        constraints_checked.push(String::from("path_clearance"));
        if let Some(blocker) = self
            .store
            .check_path_blocked(start, (target_lon, target_lat))
            .await?
        {
            violations.push(ConstraintViolation {
                constraint: String::from("path_clearance"),
                constraint_type: ConstraintType::Path,
                message: format!("Path blocked by {blocker}"),
            });
        }

        let recommendations = violations
            .iter()
            .filter_map(|violation| recommend(violation.constraint_type))
            .map(ToOwned::to_owned)
            .collect();
        Ok(FeasibilityReport::from_checks(
            intent,
            constraints_checked,
            violations,
            recommendations,
        ))
    }

    /// Whether two entities sit within `max_distance` degrees.
    /// Unlocatable entities fail the check.
    pub async fn check_distance_constraint(
        &self,
        entity1_id: &str,
        entity2_id: &str,
        max_distance: f64,
    ) -> Result<bool, universalis_store::StoreError> {
        let distance = self.store.calculate_distance(entity1_id, entity2_id).await?;
        Ok(distance.is_some_and(|distance| distance <= max_distance))
    }

    /// Path feasibility between two points: `(clear, cost, blocker)`.
    pub async fn check_path_feasibility(
        &self,
        start: (f64, f64),
        end: (f64, f64),
    ) -> Result<(bool, f64, Option<String>), universalis_store::StoreError> {
        let blocker = self.store.check_path_blocked(start, end).await?;
        let cost = self.store.calculate_path_cost(start, end).await?;
        Ok((blocker.is_none(), cost, blocker))
    }
}

/// Fixed recommendation table keyed by constraint type.
const fn recommend(constraint_type: ConstraintType) -> Option<&'static str> {
    match constraint_type {
        ConstraintType::Resource => {
            Some("Consider reallocating resources or waiting for replenishment")
        }
        ConstraintType::Physical => Some("Asset may need repairs or status update before use"),
        ConstraintType::Policy => Some("Request authorization or use assets under your control"),
        ConstraintType::Spatial | ConstraintType::Path => {
            Some("Choose a different route around impassable terrain")
        }
        ConstraintType::Distance => Some("Stage closer before attempting this movement"),
        ConstraintType::Terrain => Some("Select a passable destination"),
    }
}

/// Does the intent mention an asset by id or name (case-insensitive
/// substring)?
fn intent_mentions(intent_lower: &str, needle: &str) -> bool {
    !needle.is_empty() && intent_lower.contains(&needle.to_lowercase())
}

/// Default constraint: mentioned assets must not be destroyed,
/// unavailable, or out of fuel.
fn check_resource_availability(intent: &str, world: &WorldState) -> bool {
    let intent_lower = intent.to_lowercase();
    for (asset_id, asset) in &world.assets {
        if !intent_mentions(&intent_lower, asset_id) && !intent_mentions(&intent_lower, &asset.name)
        {
            continue;
        }
        if asset.status == "destroyed" || asset.status == "unavailable" {
            return false;
        }
        if let Some(fuel) = asset.attributes.get("fuel").and_then(serde_json::Value::as_f64)
            && fuel <= 0.0
        {
            return false;
        }
    }
    true
}

/// Default constraint: mentioned assets must be in an operational status.
fn check_asset_operational(intent: &str, world: &WorldState) -> bool {
    let intent_lower = intent.to_lowercase();
    for (asset_id, asset) in &world.assets {
        if intent_mentions(&intent_lower, asset_id) || intent_mentions(&intent_lower, &asset.name) {
            if !OPERATIONAL_STATUSES.contains(&asset.status.as_str()) {
                return false;
            }
        }
    }
    true
}

/// Default constraint: an intent naming an actor and an asset fails when
/// the asset is not under that actor's command.
fn check_actor_authorization(intent: &str, world: &WorldState) -> bool {
    let intent_lower = intent.to_lowercase();
    for (actor_id, actor) in &world.actors {
        if !intent_mentions(&intent_lower, actor_id) {
            continue;
        }
        for asset_id in world.assets.keys() {
            if intent_mentions(&intent_lower, asset_id) && !actor.assets.contains(asset_id) {
                return false;
            }
        }
    }
    true
}

/// Whether the intent contains a movement verb as a whole word.
#[allow(clippy::unwrap_used)]
fn has_movement_verb(intent: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Built from a fixed verb list; a parse failure is unreachable.
    let regex = PATTERN.get_or_init(|| {
        let pattern = format!(r"(?i)\b({})\b", MOVEMENT_VERBS.join("|"));
        Regex::new(&pattern).unwrap()
    });
    regex.is_match(intent)
}

/// Extract `(lat, lon)` pairs from the intent text.
///
/// Pairs are any two floats separated by a comma and/or whitespace; the
/// first number is read as latitude. Numeric tokens that are not
/// coordinates will also match -- a known limitation, preserved so the
/// behavior stays observable.
#[allow(clippy::unwrap_used)]
fn extract_coordinate_pairs(intent: &str) -> Vec<(f64, f64)> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // The literal pattern is valid; a parse failure is unreachable.
    let regex =
        PATTERN.get_or_init(|| Regex::new(r"(-?\d+\.?\d*)[,\s]+(-?\d+\.?\d*)").unwrap());
    regex
        .captures_iter(intent)
        .filter_map(|captures| {
            let lat = captures.get(1)?.as_str().parse::<f64>().ok()?;
            let lon = captures.get(2)?.as_str().parse::<f64>().ok()?;
            Some((lat, lon))
        })
        .collect()
}
