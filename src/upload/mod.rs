//! Directory upload pipeline
//!
//! Loads a directory of CSV exports into a PostgreSQL schema:
//!
//! 1. recreate the target schema
//! 2. per file: infer column types, create the table, normalize legacy blobs
//!    and bulk load the rows with `COPY`
//! 3. repair orphaned foreign keys and apply the declared constraints
//!
//! One failing file never stops the others.

mod config;
mod uploader;

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{Instrument, Span, info, info_span};

use crate::batch::csv::IngestError;
use crate::constraints::{ConstraintError, ConstraintOrchestrator, ConstraintReport, ConstraintSet};
use crate::database::{Database, DatabaseError, StatementOutcome};
use crate::legacy::NormalizationStats;
use crate::schema::SchemaError;

pub use config::UploadConfig;
pub use uploader::{SchemaUploader, table_name_for};

/// Errors that stop an upload
#[derive(Error, Debug)]
pub enum UploadError {
    /// The data directory is missing
    #[error("Data directory does not exist: {0}")]
    MissingDirectory(PathBuf),

    /// A data file could not be read
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// SQL could not be generated
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Bulk loading a table failed
    #[error("Failed to load table {table}: {source}")]
    Load {
        table: String,
        #[source]
        source: DatabaseError,
    },

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Constraints(#[from] ConstraintError),

    /// Configuration could not be loaded
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome for one uploaded table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableUpload {
    pub table: String,
    /// File the batch was read from
    pub source: Option<PathBuf>,
    /// Rows in the batch
    pub rows: usize,
    /// The CREATE TABLE statement
    pub create: StatementOutcome,
    pub normalization: NormalizationStats,
    /// Rows reported by COPY
    pub rows_loaded: Option<u64>,
    /// Set when loading failed
    pub error: Option<String>,
}

/// A file that was not uploaded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of [`SchemaUploader::upload_directory`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UploadReport {
    pub tables: Vec<TableUpload>,
    pub skipped: Vec<SkippedFile>,
}

impl UploadReport {
    /// Total rows loaded across tables
    pub fn rows_loaded(&self) -> u64 {
        self.tables.iter().filter_map(|t| t.rows_loaded).sum()
    }
}

/// Result of [`run_pipeline`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineReport {
    /// Schema drop / create statements
    pub schema: Vec<StatementOutcome>,
    pub upload: UploadReport,
    /// Present when a constraint file was configured
    pub constraints: Option<ConstraintReport>,
}

/// Run the full upload for `config` against `database`.
///
/// The constraint file is read and validated before anything is written, so
/// a bad file fails the run without touching the database. Once the upload
/// starts, the connection is closed on every exit path.
pub async fn run_pipeline<D: Database>(database: D, config: &UploadConfig) -> Result<PipelineReport, UploadError> {
    run_pipeline_in(database, config, info_span!("upload", schema = %config.schema)).await
}

/// [`run_pipeline`] with an explicit span
pub async fn run_pipeline_in<D: Database>(
    database: D,
    config: &UploadConfig,
    span: Span,
) -> Result<PipelineReport, UploadError> {
    let constraints = match &config.constraints_file {
        Some(path) => Some(read_constraints(path)?),
        None => None,
    };

    let mut uploader = SchemaUploader::from_config(database, config).with_span(span.clone());
    let mut report = PipelineReport::default();
    let loaded = load_tables(&mut uploader, config, &mut report, &span).await;

    let mut orchestrator = ConstraintOrchestrator::new(uploader.into_handle());
    let applied = match (loaded, constraints) {
        (Err(e), _) => Err(e),
        (Ok(()), None) => Ok(()),
        (Ok(()), Some(set)) => match orchestrator.load(set) {
            Ok(()) => orchestrator
                .apply_all(None)
                .instrument(span.clone())
                .await
                .map(|constraints| report.constraints = Some(constraints))
                .map_err(UploadError::from),
            Err(e) => Err(e.into()),
        },
    };
    let closed = orchestrator.close().await;
    applied?;
    closed?;
    Ok(report)
}

/// Parse and validate a constraint file
fn read_constraints(path: &Path) -> Result<ConstraintSet, ConstraintError> {
    let json = std::fs::read_to_string(path).map_err(|source| ConstraintError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let set = ConstraintSet::from_json(&json).map_err(|e| ConstraintError::Declarations(e.to_string()))?;
    set.validate()
        .map_err(|e| ConstraintError::Declarations(e.to_string()))?;
    Ok(set)
}

async fn load_tables<D: Database>(
    uploader: &mut SchemaUploader<D>,
    config: &UploadConfig,
    report: &mut PipelineReport,
    span: &Span,
) -> Result<(), UploadError> {
    if config.reset_schema {
        report.schema = uploader.init_schema(None).await?;
    }
    report.upload = uploader.upload_directory(&config.data_dir, None).await?;
    span.in_scope(|| {
        info!(
            tables = report.upload.tables.len(),
            skipped = report.upload.skipped.len(),
            rows = report.upload.rows_loaded(),
            "Upload finished"
        )
    });
    Ok(())
}
