//! Error types for constraint orchestration

use std::path::PathBuf;

use thiserror::Error;

use crate::database::DatabaseError;
use crate::schema::SchemaError;

use super::orchestrator::OrchestratorState;

/// Errors returned by the constraint orchestrator
#[derive(Error, Debug)]
pub enum ConstraintError {
    /// No declarations have been loaded
    #[error("Constraints have not been loaded")]
    NotLoaded,

    /// The operation is not valid in the current state
    #[error("Cannot {operation} in state '{state}'")]
    OutOfOrder {
        operation: &'static str,
        state: OrchestratorState,
    },

    /// The declarations could not be parsed or are unsafe to emit
    #[error("Invalid constraint declarations: {0}")]
    Declarations(String),

    /// The declaration file could not be read
    #[error("Cannot read constraint file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A statement could not be built
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The database handle is unusable
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl ConstraintError {
    /// User-facing message with a hint for the usual fix
    pub fn user_message(&self) -> String {
        match self {
            ConstraintError::NotLoaded => {
                "No constraints loaded. Provide a constraint file before applying constraints.".to_string()
            }
            ConstraintError::OutOfOrder { .. } => format!(
                "{}. Constraints are applied in order: repair, primary keys, unique keys, foreign keys.",
                self
            ),
            other => other.to_string(),
        }
    }
}
