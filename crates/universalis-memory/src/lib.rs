//! Scoped associative memory and the chronological event stream.
//!
//! Agents remember through two complementary systems:
//!
//! - The [`bank::MemoryBank`] holds vector-indexed memories with
//!   scope-based access control (public / private / shared-group).
//!   Duplicate adds are idempotent no-ops keyed by a content hash of
//!   `(text, owner, scope)`.
//! - The [`stream::EventStream`] is a bounded append-only log of typed
//!   events used for traceability and rationale reconstruction.
//!
//! [`pruning`] keeps the bank from growing without bound: relevance
//! decay, consolidation of near-duplicates, and a hard cap.

pub mod bank;
pub mod error;
pub mod pruning;
pub mod scopes;
pub mod stream;

pub use bank::{BankState, MemoryBank, MemoryParams, MemoryRecord};
pub use error::MemoryError;
pub use pruning::{MemoryPruner, PruneStats, PruningConfig};
pub use scopes::{MemoryScope, ScopeFilter};
pub use stream::{EventStream, EventType, StreamEvent, StreamState};
