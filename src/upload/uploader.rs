//! Table creation and bulk loading

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{Instrument, Span, error, info};

use crate::batch::TabularBatch;
use crate::batch::csv::{CsvReadOptions, read_csv_file, write_csv};
use crate::database::{Database, DatabaseError, SchemaHandle, StatementOutcome};
use crate::inference::TypeClassifier;
use crate::legacy::LegacyNormalizer;
use crate::schema::{SchemaGenerator, copy_from_stdin_sql, create_schema_sql, drop_schema_sql, drop_table_sql};

use super::config::UploadConfig;
use super::{SkippedFile, TableUpload, UploadError, UploadReport};

/// `<table>.csv` or `<table>.csv.gz`; the table is everything before the first dot
static DATA_FILE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([^.]+)(?:\.[^.]+)*\.csv(?:\.gz)?$").unwrap());

/// Table name for a data file, or `None` when the file is not CSV
pub fn table_name_for(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    DATA_FILE
        .captures(name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Creates tables from batches and loads them with `COPY`
pub struct SchemaUploader<D: Database> {
    handle: SchemaHandle<D>,
    generator: SchemaGenerator,
    normalizer: LegacyNormalizer,
    csv_options: CsvReadOptions,
    drop_existing_tables: bool,
}

impl<D: Database> SchemaUploader<D> {
    pub fn new(handle: SchemaHandle<D>) -> Self {
        let generator = SchemaGenerator::new(handle.default_schema()).with_span(handle.span().clone());
        let normalizer = LegacyNormalizer::new().with_span(handle.span().clone());
        Self {
            handle,
            generator,
            normalizer,
            csv_options: CsvReadOptions::default(),
            drop_existing_tables: false,
        }
    }

    /// Build an uploader from a configuration
    pub fn from_config(database: D, config: &UploadConfig) -> Self {
        let handle = SchemaHandle::new(database, config.schema.clone());
        let mut uploader = Self::new(handle);
        uploader.generator = uploader
            .generator
            .with_classifier(TypeClassifier::with_config(config.classifier.clone()));
        uploader.normalizer = uploader.normalizer.with_detection(config.legacy_detection());
        uploader.csv_options = config.csv.clone();
        uploader.drop_existing_tables = config.drop_existing_tables;
        uploader
    }

    /// Set the span used by the uploader and the components it drives
    pub fn with_span(mut self, span: Span) -> Self {
        self.generator = self.generator.with_span(span.clone());
        self.normalizer = self.normalizer.with_span(span.clone());
        self.handle = self.handle.with_span(span);
        self
    }

    pub fn with_drop_existing_tables(mut self, drop: bool) -> Self {
        self.drop_existing_tables = drop;
        self
    }

    pub fn handle(&self) -> &SchemaHandle<D> {
        &self.handle
    }

    /// Give back the schema handle, e.g. to apply constraints
    pub fn into_handle(self) -> SchemaHandle<D> {
        self.handle
    }

    fn schema<'a>(&'a self, schema: Option<&'a str>) -> &'a str {
        schema.unwrap_or(self.handle.default_schema())
    }

    /// Drop the schema with everything in it, then create it again
    pub async fn init_schema(&mut self, schema: Option<&str>) -> Result<Vec<StatementOutcome>, UploadError> {
        let schema = self.schema(schema).to_string();
        let drop = drop_schema_sql(&schema)?;
        let create = create_schema_sql(&schema)?;

        let outcomes = vec![
            self.handle.execute_statement(&drop).await,
            self.handle.execute_statement(&create).await,
        ];
        self.handle.span().in_scope(|| info!("Schema '{}' recreated", schema));
        Ok(outcomes)
    }

    /// Create `schema.table` from the batch, optionally dropping it first
    pub async fn create_table(
        &mut self,
        batch: &TabularBatch,
        table: &str,
        schema: Option<&str>,
    ) -> Result<StatementOutcome, UploadError> {
        let schema = self.schema(schema).to_string();
        let ddl = self.generator.generate_ddl(batch, table, Some(schema.as_str()))?;

        if self.drop_existing_tables {
            let drop = drop_table_sql(&schema, table)?;
            self.handle.execute_statement(&drop).await;
        }
        Ok(self.handle.execute_statement(&ddl).await)
    }

    /// Stream the batch into an existing table with `COPY FROM STDIN`
    pub async fn load_batch(
        &mut self,
        batch: &TabularBatch,
        table: &str,
        schema: Option<&str>,
    ) -> Result<u64, UploadError> {
        let schema = self.schema(schema).to_string();
        let copy = copy_from_stdin_sql(&schema, table, &batch.column_names())?;
        let data = write_csv(batch)?;

        let span = self.handle.span().clone();
        let result = match self.handle.database() {
            Ok(db) => db.copy_in(&copy, data).instrument(span.clone()).await,
            Err(e) => Err(e),
        };

        span.in_scope(|| match &result {
            Ok(rows) => info!("Loaded {} rows into {}.{}", rows, schema, table),
            Err(e) => error!("Failed to load {}.{}: {}", schema, table, e),
        });
        result.map_err(|source: DatabaseError| UploadError::Load {
            table: format!("{}.{}", schema, table),
            source,
        })
    }

    /// Create the table from the raw batch, normalize legacy blobs, then load.
    ///
    /// Classification sees the raw values so legacy blob columns become
    /// JSONB; the normalized JSON is what gets loaded.
    pub async fn upload_batch(
        &mut self,
        mut batch: TabularBatch,
        table: &str,
        schema: Option<&str>,
    ) -> Result<TableUpload, UploadError> {
        let create = self.create_table(&batch, table, schema).await?;
        let normalization = self.normalizer.preprocess_batch(&mut batch);

        let mut upload = TableUpload {
            table: table.to_string(),
            source: None,
            rows: batch.row_count(),
            create,
            normalization,
            rows_loaded: None,
            error: None,
        };
        match self.load_batch(&batch, table, schema).await {
            Ok(rows) => upload.rows_loaded = Some(rows),
            Err(e) => upload.error = Some(e.to_string()),
        }
        Ok(upload)
    }

    /// Upload every `.csv` / `.csv.gz` file of `dir`, in file name order.
    ///
    /// A file that cannot be read or loaded is reported and skipped; the
    /// remaining files are still processed.
    pub async fn upload_directory(&mut self, dir: &Path, schema: Option<&str>) -> Result<UploadReport, UploadError> {
        if !dir.is_dir() {
            self.handle
                .span()
                .in_scope(|| error!("Directory {} does not exist", dir.display()));
            return Err(UploadError::MissingDirectory(dir.to_path_buf()));
        }

        let mut files: Vec<(PathBuf, String)> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .filter_map(|path| table_name_for(&path).map(|table| (path, table)))
            .collect();
        files.sort();

        let mut report = UploadReport::default();
        for (path, table) in files {
            let batch = match read_csv_file(&path, &self.csv_options) {
                Ok(batch) => batch,
                Err(e) => {
                    self.handle
                        .span()
                        .in_scope(|| error!("Failed to read {}: {}", path.display(), e));
                    report.skipped.push(SkippedFile {
                        path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            self.handle
                .span()
                .in_scope(|| info!("Uploading {} into table {}", path.display(), table));
            match self.upload_batch(batch, &table, schema).await {
                Ok(mut upload) => {
                    upload.source = Some(path);
                    report.tables.push(upload);
                }
                Err(e) => {
                    self.handle
                        .span()
                        .in_scope(|| error!("Failed to upload {}: {}", path.display(), e));
                    report.skipped.push(SkippedFile {
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }
}
