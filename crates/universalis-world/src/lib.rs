//! Geography and scenario assembly for the Universalis simulation.
//!
//! Two concerns live here:
//!
//! - [`geometry`] -- parsing WKT terrain polygons into [`geo_types`]
//!   geometries and the spatial predicates (point containment, segment
//!   intersection, euclidean degree distance) that the state store and
//!   feasibility engine evaluate.
//! - [`scenario`] -- the scenario-delta document and the seed-to-state
//!   pipeline: deep-copy a base world, apply RFC 6902 patch operations,
//!   overlay scenario fields, validate, return the assembled world.

pub mod geometry;
pub mod scenario;

pub use geometry::{GeometryError, parse_wkt};
pub use scenario::{PatchOp, ScenarioDelta, ScenarioError};
