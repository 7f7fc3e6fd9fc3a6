//! tabload - schema inference and constraint-safe loading of tabular data
//!
//! Provides:
//! - Column type inference from observed values
//! - Detection and JSON normalization of legacy serialized blobs
//! - CREATE TABLE generation with hardened identifier quoting
//! - Ordered application of primary, unique and foreign key constraints,
//!   repairing orphaned foreign key values first
//! - CSV ingestion and a directory upload pipeline for PostgreSQL

pub mod batch;
#[cfg(feature = "cli")]
pub mod cli;
pub mod constraints;
pub mod database;
pub mod inference;
pub mod legacy;
pub mod schema;
#[cfg(feature = "ingest")]
pub mod upload;
pub mod validation;

// Re-export commonly used types
pub use batch::{BatchError, CellValue, Column, ColumnKind, TabularBatch};
pub use constraints::{
    ConstraintError, ConstraintOrchestrator, ConstraintPlan, ConstraintReport, ConstraintSet, OrchestratorState,
};
pub use database::{ConnectionConfig, Database, DatabaseError, SchemaHandle, StatementFailure, StatementOutcome};
#[cfg(feature = "postgres-backend")]
pub use database::PostgresDatabase;
pub use inference::{ClassifierConfig, SqlType, TypeClassifier, classify};
pub use legacy::{LegacyDetection, LegacyError, LegacyNormalizer, NormalizationFailure, normalize};
pub use schema::{SchemaError, SchemaGenerator};
#[cfg(feature = "ingest")]
pub use upload::{SchemaUploader, UploadConfig, UploadError, run_pipeline};
pub use validation::ValidationError;
