//! Spatial state store for the Universalis simulation.
//!
//! SQLite is the system of record for the physical world: per-cycle
//! snapshot JSON, per-entity rows (actors and assets with point
//! geometry), the environment row, and terrain polygons as WKT. The
//! engine is the single writer per simulation, so the store runs on a
//! one-connection pool; snapshot writes and entity upserts share a
//! transaction so a failed save never leaves a partial cycle behind.
//!
//! Spatial predicates (distance queries, point-in-polygon, segment
//! blocking, path cost) evaluate in Rust over geometries parsed from the
//! stored rows -- see `universalis-world::geometry`.

pub mod error;
pub mod state_store;

pub use error::StoreError;
pub use state_store::{EntityHit, StateStore, TerrainHit};
