//! The state store: snapshots, entities, environment, terrain.
//!
//! Table layout follows the snapshot-plus-projection model: the
//! authoritative per-cycle record is the full snapshot JSON in
//! `world_state_snapshots`, while `entities` and `environment` hold a
//! queryable projection of the latest state. If snapshots are missing
//! (store migrated, or seeded directly into the projection tables),
//! [`StateStore::get_world_state`] reconstructs a snapshot from the
//! projection.

use std::path::Path;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::{debug, info, warn};
use validator::Validate;

use universalis_types::{
    Actor, Asset, Environment, Location, Resolution, TerrainFeature, TerrainType, WorldState,
};
use universalis_world::geometry;

use crate::error::StoreError;

/// An entity returned by a distance query.
///
/// Rows carry the fields the perception and feasibility layers need:
/// identity, position, distance from the query center, and the raw
/// properties JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityHit {
    /// Entity id.
    pub id: String,
    /// `actor` or `asset`.
    pub entity_type: String,
    /// Display name.
    pub name: String,
    /// Longitude.
    pub lon: f64,
    /// Latitude.
    pub lat: f64,
    /// Euclidean degree distance from the query center.
    pub distance: f64,
    /// Raw properties JSON stored with the entity.
    pub properties: serde_json::Value,
    /// Lifecycle status.
    pub status: String,
}

/// Terrain information at a queried point.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainHit {
    /// Terrain feature id.
    pub terrain_id: String,
    /// Terrain feature name.
    pub name: String,
    /// Terrain classification.
    pub terrain_type: TerrainType,
    /// Movement cost multiplier.
    pub movement_cost: f64,
    /// Whether the terrain is passable.
    pub passable: bool,
    /// Raw attributes JSON stored with the feature.
    pub attributes: serde_json::Value,
}

/// SQLite-backed state store scoped to one simulation.
#[derive(Debug, Clone)]
pub struct StateStore {
    pool: SqlitePool,
    simulation_id: String,
}

#[derive(sqlx::FromRow)]
struct EntityRow {
    id: String,
    entity_type: String,
    name: String,
    description: String,
    lon: Option<f64>,
    lat: Option<f64>,
    properties: String,
    status: String,
}

#[derive(sqlx::FromRow)]
struct EnvironmentRow {
    cycle: i64,
    time_of_day: String,
    weather: String,
    global_events: String,
    terrain_modifiers: String,
}

#[derive(sqlx::FromRow)]
struct TerrainRow {
    id: String,
    name: String,
    terrain_type: String,
    geometry_wkt: String,
    movement_cost: f64,
    passable: bool,
    properties: String,
}

impl StateStore {
    /// Open (or create) a store at `path`, scoped to `simulation_id`.
    ///
    /// The pool holds a single connection: the engine is the only writer
    /// per simulation, and one connection gives SQLite serialized access
    /// for free. Schema is created unless `read_only` is set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the database cannot be opened
    /// or the schema cannot be created.
    pub async fn open(
        path: &Path,
        simulation_id: impl Into<String>,
        read_only: bool,
    ) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            // Ignore failure here; the connect below will surface it.
            let _ = std::fs::create_dir_all(parent);
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(!read_only)
            .read_only(read_only);
        let store = Self::from_options(options, simulation_id, read_only).await?;
        info!(path = %path.display(), simulation_id = %store.simulation_id, "State store opened");
        Ok(store)
    }

    /// Open an in-memory store (used by tests and throwaway runs).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection fails.
    pub async fn open_in_memory(simulation_id: impl Into<String>) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new().in_memory(true);
        Self::from_options(options, simulation_id, false).await
    }

    async fn from_options(
        options: SqliteConnectOptions,
        simulation_id: impl Into<String>,
        read_only: bool,
    ) -> Result<Self, StoreError> {
        // One connection, never recycled: an in-memory database lives and
        // dies with its connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<std::time::Duration>)
            .max_lifetime(None::<std::time::Duration>)
            .connect_with(options)
            .await?;

        let store = Self {
            pool,
            simulation_id: simulation_id.into(),
        };
        if !read_only {
            store.init_schema().await?;
        }
        Ok(store)
    }

    /// The simulation this store is scoped to.
    pub fn simulation_id(&self) -> &str {
        &self.simulation_id
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        let statements = [
            r"CREATE TABLE IF NOT EXISTS entities (
                id TEXT NOT NULL,
                simulation_id TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                lon REAL,
                lat REAL,
                properties TEXT NOT NULL DEFAULT '{}',
                status TEXT NOT NULL DEFAULT 'active',
                updated_at TEXT NOT NULL DEFAULT '',
                PRIMARY KEY (simulation_id, id)
            )",
            r"CREATE TABLE IF NOT EXISTS environment (
                id TEXT PRIMARY KEY,
                simulation_id TEXT NOT NULL,
                cycle INTEGER NOT NULL DEFAULT 0,
                time_of_day TEXT NOT NULL DEFAULT '00:00',
                weather TEXT NOT NULL DEFAULT 'Clear',
                global_events TEXT NOT NULL DEFAULT '[]',
                terrain_modifiers TEXT NOT NULL DEFAULT '{}',
                updated_at TEXT NOT NULL DEFAULT ''
            )",
            r"CREATE TABLE IF NOT EXISTS terrain (
                id TEXT NOT NULL,
                simulation_id TEXT NOT NULL,
                name TEXT NOT NULL,
                terrain_type TEXT NOT NULL,
                geometry_wkt TEXT NOT NULL,
                movement_cost REAL NOT NULL DEFAULT 1.0,
                passable INTEGER NOT NULL DEFAULT 1,
                properties TEXT NOT NULL DEFAULT '{}',
                PRIMARY KEY (simulation_id, id)
            )",
            r"CREATE TABLE IF NOT EXISTS world_state_snapshots (
                id TEXT PRIMARY KEY,
                simulation_id TEXT NOT NULL,
                cycle INTEGER NOT NULL,
                state_json TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT ''
            )",
        ];
        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("State store schema initialized");
        Ok(())
    }

    // =========================================================================
    // World state operations
    // =========================================================================

    /// Persist a world snapshot.
    ///
    /// Writes the full snapshot JSON at `(simulation_id, cycle)` and
    /// upserts the environment row plus one entity row per actor and
    /// asset -- all in one transaction. Re-saving the same cycle updates
    /// in place.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Integrity`] if the snapshot violates the
    /// data-model invariants, or [`StoreError::Database`] on write
    /// failure (the transaction rolls back).
    pub async fn save_world_state(&self, world: &WorldState) -> Result<(), StoreError> {
        world.validate_integrity()?;

        let cycle = world.environment.cycle;
        let cycle_i64 = i64::try_from(cycle).unwrap_or(i64::MAX);
        let snapshot_id = format!("{}_cycle_{cycle}", self.simulation_id);
        let state_json = serde_json::to_string(world)?;
        let now = chrono::Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"INSERT OR REPLACE INTO world_state_snapshots (id, simulation_id, cycle, state_json, created_at)
              VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&snapshot_id)
        .bind(&self.simulation_id)
        .bind(cycle_i64)
        .bind(&state_json)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let env_id = format!("{}_env", self.simulation_id);
        sqlx::query(
            r"INSERT OR REPLACE INTO environment
              (id, simulation_id, cycle, time_of_day, weather, global_events, terrain_modifiers, updated_at)
              VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&env_id)
        .bind(&self.simulation_id)
        .bind(cycle_i64)
        .bind(&world.environment.time)
        .bind(&world.environment.weather)
        .bind(serde_json::to_string(&world.environment.global_events)?)
        .bind(serde_json::to_string(&world.environment.terrain_modifiers)?)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        for actor in world.actors.values() {
            let properties = serde_json::json!({
                "role": actor.role,
                "resolution": actor.resolution,
                "assets": actor.assets,
                "objectives": actor.objectives,
                "attributes": actor.attributes,
            });
            upsert_entity(
                &mut tx,
                &self.simulation_id,
                &actor.actor_id,
                "actor",
                &actor.role,
                &actor.description,
                actor.location.as_ref().map(|loc| (loc.lon, loc.lat)),
                &properties,
                &actor.status,
                &now,
            )
            .await?;
        }

        for asset in world.assets.values() {
            let properties = serde_json::json!({
                "asset_type": asset.asset_type,
                "attributes": asset.attributes,
            });
            let point = asset.location_point().map(|loc| (loc.lon, loc.lat));
            upsert_entity(
                &mut tx,
                &self.simulation_id,
                &asset.asset_id,
                "asset",
                &asset.name,
                "",
                point,
                &properties,
                &asset.status,
                &now,
            )
            .await?;
        }

        tx.commit().await?;
        info!(cycle, "World state saved");
        Ok(())
    }

    /// Fetch the world snapshot at `cycle`, or the latest when `cycle`
    /// is `None`.
    ///
    /// Falls back to reconstruction from the entity and environment
    /// projection when no snapshot rows exist. Returns `Ok(None)` when
    /// the store holds nothing for this simulation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure or corrupt snapshot JSON.
    pub async fn get_world_state(&self, cycle: Option<u64>) -> Result<Option<WorldState>, StoreError> {
        let row: Option<(String,)> = match cycle {
            Some(cycle) => {
                let cycle_i64 = i64::try_from(cycle).unwrap_or(i64::MAX);
                sqlx::query_as(
                    r"SELECT state_json FROM world_state_snapshots
                      WHERE simulation_id = ? AND cycle = ?
                      LIMIT 1",
                )
                .bind(&self.simulation_id)
                .bind(cycle_i64)
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    r"SELECT state_json FROM world_state_snapshots
                      WHERE simulation_id = ?
                      ORDER BY cycle DESC
                      LIMIT 1",
                )
                .bind(&self.simulation_id)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        if let Some((state_json,)) = row {
            let world: WorldState = serde_json::from_str(&state_json)?;
            return Ok(Some(world));
        }

        self.reconstruct_world_state().await
    }

    /// Rebuild a snapshot from the entity and environment projection.
    ///
    /// Used when the snapshot table is empty (seeded or migrated store).
    async fn reconstruct_world_state(&self) -> Result<Option<WorldState>, StoreError> {
        let env_row: Option<EnvironmentRow> = sqlx::query_as(
            r"SELECT cycle, time_of_day, weather, global_events, terrain_modifiers
              FROM environment
              WHERE simulation_id = ?
              ORDER BY cycle DESC
              LIMIT 1",
        )
        .bind(&self.simulation_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(env_row) = env_row else {
            return Ok(None);
        };

        let environment = Environment {
            cycle: u64::try_from(env_row.cycle).unwrap_or(0),
            time: env_row.time_of_day,
            weather: env_row.weather,
            global_events: serde_json::from_str(&env_row.global_events).unwrap_or_default(),
            terrain_modifiers: serde_json::from_str(&env_row.terrain_modifiers).unwrap_or_default(),
        };

        let rows: Vec<EntityRow> = sqlx::query_as(
            r"SELECT id, entity_type, name, description, lon, lat, properties, status
              FROM entities
              WHERE simulation_id = ? AND status != 'deleted'
              ORDER BY id",
        )
        .bind(&self.simulation_id)
        .fetch_all(&self.pool)
        .await?;

        let mut world = WorldState::new(self.simulation_id.clone(), environment);
        for row in rows {
            match row.entity_type.as_str() {
                "actor" => {
                    let actor = actor_from_row(&row);
                    world.actors.insert(actor.actor_id.clone(), actor);
                }
                "asset" => {
                    let asset = asset_from_row(&row);
                    world.assets.insert(asset.asset_id.clone(), asset);
                }
                other => {
                    warn!(entity_id = %row.id, entity_type = %other, "Skipping unknown entity type");
                }
            }
        }

        debug!(
            actors = world.actors.len(),
            assets = world.assets.len(),
            "World state reconstructed from projection"
        );
        Ok(Some(world))
    }

    /// The latest cycle recorded in the environment projection, 0 if none.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on query failure.
    pub async fn get_current_cycle(&self) -> Result<u64, StoreError> {
        let max: Option<i64> =
            sqlx::query_scalar(r"SELECT MAX(cycle) FROM environment WHERE simulation_id = ?")
                .bind(&self.simulation_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(max.and_then(|value| u64::try_from(value).ok()).unwrap_or(0))
    }

    // =========================================================================
    // Spatial queries
    // =========================================================================

    /// All non-deleted entities within `radius_degrees` of the center,
    /// ordered by ascending distance. Entities without geometry never
    /// appear. `entity_type` optionally restricts to `actor` / `asset`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on query failure.
    pub async fn get_entities_within_distance(
        &self,
        center_lon: f64,
        center_lat: f64,
        radius_degrees: f64,
        entity_type: Option<&str>,
    ) -> Result<Vec<EntityHit>, StoreError> {
        let rows: Vec<EntityRow> = match entity_type {
            Some(entity_type) => {
                sqlx::query_as(
                    r"SELECT id, entity_type, name, description, lon, lat, properties, status
                      FROM entities
                      WHERE simulation_id = ? AND entity_type = ?
                        AND lon IS NOT NULL AND lat IS NOT NULL
                        AND status != 'deleted'",
                )
                .bind(&self.simulation_id)
                .bind(entity_type)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    r"SELECT id, entity_type, name, description, lon, lat, properties, status
                      FROM entities
                      WHERE simulation_id = ?
                        AND lon IS NOT NULL AND lat IS NOT NULL
                        AND status != 'deleted'",
                )
                .bind(&self.simulation_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut hits: Vec<EntityHit> = rows
            .into_iter()
            .filter_map(|row| {
                let lon = row.lon?;
                let lat = row.lat?;
                let distance = geometry::distance_degrees((center_lon, center_lat), (lon, lat));
                if distance > radius_degrees {
                    return None;
                }
                Some(EntityHit {
                    id: row.id,
                    entity_type: row.entity_type,
                    name: row.name,
                    lon,
                    lat,
                    distance,
                    properties: serde_json::from_str(&row.properties)
                        .unwrap_or(serde_json::Value::Null),
                    status: row.status,
                })
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(hits)
    }

    /// The terrain feature whose polygon contains `(lon, lat)`, if any.
    ///
    /// When several polygons overlap, the earliest-inserted row wins.
    /// Rows whose WKT fails to parse are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on query failure.
    pub async fn get_terrain_at_point(
        &self,
        lon: f64,
        lat: f64,
    ) -> Result<Option<TerrainHit>, StoreError> {
        let rows = self.load_terrain_rows().await?;
        for row in rows {
            match geometry::parse_wkt(&row.geometry_wkt) {
                Ok(polygon) => {
                    if geometry::contains_point(&polygon, lon, lat) {
                        return Ok(Some(terrain_hit_from_row(&row)));
                    }
                }
                Err(err) => {
                    warn!(terrain_id = %row.id, %err, "Skipping terrain with bad geometry");
                }
            }
        }
        Ok(None)
    }

    /// Check whether the straight segment from `start` to `end` crosses
    /// any impassable terrain. Returns the blocker's name when blocked.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on query failure.
    pub async fn check_path_blocked(
        &self,
        start: (f64, f64),
        end: (f64, f64),
    ) -> Result<Option<String>, StoreError> {
        let rows = self.load_terrain_rows().await?;
        for row in rows.into_iter().filter(|row| !row.passable) {
            match geometry::parse_wkt(&row.geometry_wkt) {
                Ok(polygon) => {
                    if geometry::segment_intersects(&polygon, start, end) {
                        return Ok(Some(row.name));
                    }
                }
                Err(err) => {
                    warn!(terrain_id = %row.id, %err, "Skipping terrain with bad geometry");
                }
            }
        }
        Ok(None)
    }

    /// Movement cost for the straight segment from `start` to `end`:
    /// the maximum `movement_cost` across intersected terrain polygons,
    /// or `1.0` when the segment crosses none.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on query failure.
    pub async fn calculate_path_cost(
        &self,
        start: (f64, f64),
        end: (f64, f64),
    ) -> Result<f64, StoreError> {
        let rows = self.load_terrain_rows().await?;
        let mut cost = 1.0_f64;
        for row in rows {
            match geometry::parse_wkt(&row.geometry_wkt) {
                Ok(polygon) => {
                    if geometry::segment_intersects(&polygon, start, end) {
                        cost = cost.max(row.movement_cost);
                    }
                }
                Err(err) => {
                    warn!(terrain_id = %row.id, %err, "Skipping terrain with bad geometry");
                }
            }
        }
        Ok(cost)
    }

    /// Euclidean degree distance between two entities' point geometries.
    /// `None` when either entity is missing or has no geometry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on query failure.
    pub async fn calculate_distance(
        &self,
        entity1_id: &str,
        entity2_id: &str,
    ) -> Result<Option<f64>, StoreError> {
        let first = self.entity_position(entity1_id).await?;
        let second = self.entity_position(entity2_id).await?;
        Ok(match (first, second) {
            (Some(a), Some(b)) => Some(geometry::distance_degrees(a, b)),
            _ => None,
        })
    }

    /// The `(lon, lat)` of one entity, if present with geometry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on query failure.
    pub async fn entity_position(&self, entity_id: &str) -> Result<Option<(f64, f64)>, StoreError> {
        let row: Option<(Option<f64>, Option<f64>)> = sqlx::query_as(
            r"SELECT lon, lat FROM entities
              WHERE simulation_id = ? AND id = ? AND status != 'deleted'",
        )
        .bind(&self.simulation_id)
        .bind(entity_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.and_then(|(lon, lat)| Some((lon?, lat?))))
    }

    // =========================================================================
    // Terrain operations
    // =========================================================================

    /// Upsert a terrain feature.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidTerrain`] or
    /// [`StoreError::Geometry`] if the feature fails validation, or
    /// [`StoreError::Database`] on write failure.
    pub async fn add_terrain(&self, terrain: &TerrainFeature) -> Result<(), StoreError> {
        terrain.validate()?;
        geometry::parse_wkt(&terrain.geometry_wkt)?;

        sqlx::query(
            r"INSERT OR REPLACE INTO terrain
              (id, simulation_id, name, terrain_type, geometry_wkt, movement_cost, passable, properties)
              VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&terrain.terrain_id)
        .bind(&self.simulation_id)
        .bind(&terrain.name)
        .bind(terrain.terrain_type.to_string())
        .bind(&terrain.geometry_wkt)
        .bind(terrain.movement_cost)
        .bind(terrain.passable)
        .bind(serde_json::to_string(&terrain.attributes)?)
        .execute(&self.pool)
        .await?;

        debug!(terrain_id = %terrain.terrain_id, "Terrain upserted");
        Ok(())
    }

    async fn load_terrain_rows(&self) -> Result<Vec<TerrainRow>, StoreError> {
        let rows: Vec<TerrainRow> = sqlx::query_as(
            r"SELECT id, name, terrain_type, geometry_wkt, movement_cost, passable, properties
              FROM terrain
              WHERE simulation_id = ?
              ORDER BY rowid",
        )
        .bind(&self.simulation_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // =========================================================================
    // Cleanup
    // =========================================================================

    /// Purge every row belonging to this simulation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on delete failure.
    pub async fn clear_simulation(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for table in ["entities", "environment", "terrain", "world_state_snapshots"] {
            let statement = format!("DELETE FROM {table} WHERE simulation_id = ?");
            sqlx::query(&statement)
                .bind(&self.simulation_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        info!(simulation_id = %self.simulation_id, "Simulation cleared");
        Ok(())
    }

    /// Close the underlying connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("State store closed");
    }
}

#[allow(clippy::too_many_arguments)]
async fn upsert_entity(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    simulation_id: &str,
    entity_id: &str,
    entity_type: &str,
    name: &str,
    description: &str,
    position: Option<(f64, f64)>,
    properties: &serde_json::Value,
    status: &str,
    now: &str,
) -> Result<(), StoreError> {
    let (lon, lat) = match position {
        Some((lon, lat)) => (Some(lon), Some(lat)),
        None => (None, None),
    };
    sqlx::query(
        r"INSERT OR REPLACE INTO entities
          (id, simulation_id, entity_type, name, description, lon, lat, properties, status, updated_at)
          VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(entity_id)
    .bind(simulation_id)
    .bind(entity_type)
    .bind(name)
    .bind(description)
    .bind(lon)
    .bind(lat)
    .bind(serde_json::to_string(properties)?)
    .bind(status)
    .bind(now)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn actor_from_row(row: &EntityRow) -> Actor {
    let props: serde_json::Value =
        serde_json::from_str(&row.properties).unwrap_or(serde_json::Value::Null);
    let resolution = props
        .get("resolution")
        .and_then(|value| serde_json::from_value::<Resolution>(value.clone()).ok())
        .unwrap_or_default();
    let assets = props
        .get("assets")
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default();
    let objectives = props
        .get("objectives")
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default();
    let attributes = props
        .get("attributes")
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default();
    let role = props
        .get("role")
        .and_then(serde_json::Value::as_str)
        .map_or_else(|| row.name.clone(), ToOwned::to_owned);

    Actor {
        actor_id: row.id.clone(),
        role,
        description: row.description.clone(),
        resolution,
        assets,
        objectives,
        location: match (row.lat, row.lon) {
            (Some(lat), Some(lon)) => Some(Location::new(lat, lon)),
            _ => None,
        },
        attributes,
        status: row.status.clone(),
    }
}

fn asset_from_row(row: &EntityRow) -> Asset {
    let props: serde_json::Value =
        serde_json::from_str(&row.properties).unwrap_or(serde_json::Value::Null);
    let asset_type = props
        .get("asset_type")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("Unknown")
        .to_owned();
    let attributes = props
        .get("attributes")
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default();

    let mut location = std::collections::BTreeMap::new();
    if let (Some(lat), Some(lon)) = (row.lat, row.lon) {
        location.insert(String::from("lat"), lat);
        location.insert(String::from("lon"), lon);
    }

    Asset {
        asset_id: row.id.clone(),
        name: row.name.clone(),
        asset_type,
        location,
        attributes,
        status: row.status.clone(),
    }
}

fn terrain_hit_from_row(row: &TerrainRow) -> TerrainHit {
    let terrain_type =
        serde_json::from_value::<TerrainType>(serde_json::Value::String(row.terrain_type.clone()))
            .unwrap_or(TerrainType::Plains);
    TerrainHit {
        terrain_id: row.id.clone(),
        name: row.name.clone(),
        terrain_type,
        movement_cost: row.movement_cost,
        passable: row.passable,
        attributes: serde_json::from_str(&row.properties).unwrap_or(serde_json::Value::Null),
    }
}
