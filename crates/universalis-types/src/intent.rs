//! Intents and feasibility reports.
//!
//! An intent is what an actor proposes to do in one cycle, expressed as
//! a paragraph of text. The feasibility engine grades each intent
//! against the registered constraints and produces a
//! [`FeasibilityReport`]; constraint violations are first-class values
//! here, never errors.

use serde::{Deserialize, Serialize};

use crate::enums::ConstraintType;

/// A proposed action for one actor in one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    /// The proposing actor.
    pub actor_id: String,

    /// The one-paragraph intent text produced by the actor's agent.
    pub text: String,

    /// The cycle this intent was formed in.
    pub cycle: u64,
}

impl Intent {
    /// Create an intent.
    pub fn new(actor_id: impl Into<String>, text: impl Into<String>, cycle: u64) -> Self {
        Self {
            actor_id: actor_id.into(),
            text: text.into(),
            cycle,
        }
    }
}

/// A single violated constraint within a feasibility report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintViolation {
    /// Name of the violated constraint (e.g. `actor_authorized`).
    pub constraint: String,

    /// Category of the constraint, driving recommendations.
    #[serde(rename = "type")]
    pub constraint_type: ConstraintType,

    /// Human-readable explanation.
    pub message: String,
}

/// The outcome of checking one intent against all registered constraints.
///
/// Invariant: `feasible` is true iff `violations` is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeasibilityReport {
    /// Whether the intent passed every constraint.
    pub feasible: bool,

    /// The intent text that was checked.
    pub intent: String,

    /// Names of the constraints that were evaluated.
    pub constraints_checked: Vec<String>,

    /// Constraints the intent violated, empty when feasible.
    pub violations: Vec<ConstraintViolation>,

    /// Remediation hints keyed off the violated constraint types.
    pub recommendations: Vec<String>,
}

impl FeasibilityReport {
    /// Assemble a report from the checked constraints and any violations,
    /// deriving `feasible` from the violation list.
    pub fn from_checks(
        intent: impl Into<String>,
        constraints_checked: Vec<String>,
        violations: Vec<ConstraintViolation>,
        recommendations: Vec<String>,
    ) -> Self {
        Self {
            feasible: violations.is_empty(),
            intent: intent.into(),
            constraints_checked,
            violations,
            recommendations,
        }
    }

    /// A report that passed every listed constraint.
    pub fn passing(intent: impl Into<String>, constraints_checked: Vec<String>) -> Self {
        Self::from_checks(intent, constraints_checked, Vec::new(), Vec::new())
    }
}
