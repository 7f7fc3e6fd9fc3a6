//! CLI error types

use std::path::PathBuf;

use thiserror::Error;

use crate::batch::csv::IngestError;
use crate::constraints::ConstraintError;
use crate::database::DatabaseError;
use crate::legacy::NormalizationFailure;
use crate::schema::SchemaError;
use crate::upload::UploadError;

/// Errors surfaced by CLI commands
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to read file {0}: {1}")]
    FileReadError(PathBuf, String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Upload failed: {0}")]
    Upload(#[from] UploadError),

    #[error("{}", .0.user_message())]
    Constraints(#[from] ConstraintError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Normalization failed: {0}")]
    Normalization(#[from] NormalizationFailure),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Constraints were applied but some statements failed
    #[error("{0} constraint statement(s) failed")]
    ConstraintFailures(usize),
}
