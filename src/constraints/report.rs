//! Reports returned by the constraint orchestrator

use serde::Serialize;

pub use crate::database::{StatementFailure, StatementOutcome};

/// Result of repairing one foreign key
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepairOutcome {
    pub schema: String,
    pub table: String,
    pub column: String,
    /// Referencing values that had no match, as text
    pub invalid_values: Vec<String>,
    /// Rows whose value was set to NULL
    pub rows_updated: u64,
    /// Set when the repair was rolled back
    pub error: Option<String>,
}

impl RepairOutcome {
    /// No orphaned values were found
    pub fn is_clean(&self) -> bool {
        self.error.is_none() && self.invalid_values.is_empty()
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Everything [`apply_all`](super::ConstraintOrchestrator::apply_all) did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConstraintReport {
    pub repairs: Vec<RepairOutcome>,
    pub primary_keys: Vec<StatementOutcome>,
    pub unique_keys: Vec<StatementOutcome>,
    pub foreign_keys: Vec<StatementOutcome>,
}

impl ConstraintReport {
    /// Statement outcomes of all three constraint phases, in order
    pub fn statements(&self) -> impl Iterator<Item = &StatementOutcome> {
        self.primary_keys
            .iter()
            .chain(&self.unique_keys)
            .chain(&self.foreign_keys)
    }

    /// Constraint statements the server rejected
    pub fn failures(&self) -> impl Iterator<Item = &StatementFailure> {
        self.statements().filter_map(StatementOutcome::failure)
    }

    /// True when every repair and every statement succeeded
    pub fn is_success(&self) -> bool {
        self.repairs.iter().all(|r| !r.is_failed()) && self.failures().next().is_none()
    }

    /// Total number of foreign key values set to NULL
    pub fn rows_repaired(&self) -> u64 {
        self.repairs.iter().map(|r| r.rows_updated).sum()
    }
}

/// The repair statements for one foreign key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairPlan {
    pub schema: String,
    pub table: String,
    pub column: String,
    pub orphan_query: String,
    pub nullify_statement: String,
}

/// SQL that [`apply_all`](super::ConstraintOrchestrator::apply_all) would run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConstraintPlan {
    pub repairs: Vec<RepairPlan>,
    pub primary_keys: Vec<String>,
    pub unique_keys: Vec<String>,
    pub foreign_keys: Vec<String>,
}

impl ConstraintPlan {
    /// Every statement in execution order
    pub fn statements(&self) -> Vec<&str> {
        let repairs = self
            .repairs
            .iter()
            .flat_map(|r| [r.orphan_query.as_str(), r.nullify_statement.as_str()]);
        repairs
            .chain(self.primary_keys.iter().map(String::as_str))
            .chain(self.unique_keys.iter().map(String::as_str))
            .chain(self.foreign_keys.iter().map(String::as_str))
            .collect()
    }
}
