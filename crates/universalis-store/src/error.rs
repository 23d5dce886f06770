//! Shared error type for the state store.

use universalis_types::IntegrityError;
use universalis_world::GeometryError;

/// Errors raised by state store operations.
///
/// Any storage failure is fatal to the calling tick; the tick engine
/// logs it and retries implicitly on the next cycle.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying SQLite operation failed.
    #[error("database error: {source}")]
    Database {
        /// The underlying sqlx error.
        #[from]
        source: sqlx::Error,
    },

    /// A snapshot failed integrity validation before commit.
    #[error("snapshot rejected: {source}")]
    Integrity {
        /// The underlying integrity error.
        #[from]
        source: IntegrityError,
    },

    /// A terrain feature failed field validation.
    #[error("terrain rejected: {source}")]
    InvalidTerrain {
        /// Field-level validation failures.
        #[from]
        source: validator::ValidationErrors,
    },

    /// Terrain geometry did not parse as a closed WKT polygon.
    #[error("terrain geometry rejected: {source}")]
    Geometry {
        /// The underlying geometry error.
        #[from]
        source: GeometryError,
    },

    /// Stored JSON failed to (de)serialize.
    #[error("serialization error: {source}")]
    Serde {
        /// The underlying serde error.
        #[from]
        source: serde_json::Error,
    },
}
