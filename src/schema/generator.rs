//! CREATE TABLE generation

use tracing::{Span, debug, info_span};

use crate::batch::TabularBatch;
use crate::inference::TypeClassifier;
use crate::validation::{quote_identifier, quote_qualified};

use super::SchemaError;

/// Schema used when neither the caller nor the generator names one
pub const DEFAULT_SCHEMA: &str = "public";

/// Generates `CREATE TABLE` statements from tabular batches
#[derive(Debug, Clone)]
pub struct SchemaGenerator {
    default_schema: String,
    classifier: TypeClassifier,
    span: Span,
}

impl Default for SchemaGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SCHEMA)
    }
}

impl SchemaGenerator {
    /// Create a generator targeting `default_schema`
    pub fn new(default_schema: impl Into<String>) -> Self {
        Self {
            default_schema: default_schema.into(),
            classifier: TypeClassifier::default(),
            span: info_span!("schema_generator"),
        }
    }

    /// Use a custom classifier
    pub fn with_classifier(mut self, classifier: TypeClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Set the span events are recorded in
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Schema used when [`generate_ddl`](Self::generate_ddl) gets none
    pub fn default_schema(&self) -> &str {
        &self.default_schema
    }

    /// Build `CREATE TABLE "schema"."table" ("col" TYPE, ...);`.
    ///
    /// Columns keep batch order and are classified from all of their values.
    pub fn generate_ddl(
        &self,
        batch: &TabularBatch,
        table: &str,
        schema: Option<&str>,
    ) -> Result<String, SchemaError> {
        let schema = schema.unwrap_or(self.default_schema.as_str());
        let qualified = quote_qualified(schema, table)?;

        if batch.column_count() == 0 {
            return Err(SchemaError::NoColumns(table.to_string()));
        }

        let columns = batch
            .columns()
            .iter()
            .map(|column| -> Result<String, SchemaError> {
                let sql_type = self.classifier.classify_column(column);
                self.span.in_scope(|| {
                    debug!(
                        column = %column.name,
                        kind = %column.kind,
                        sql_type = %sql_type,
                        "Classified column"
                    );
                });
                Ok(format!(
                    "{} {}",
                    quote_identifier(&column.name, "column name")?,
                    sql_type
                ))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(format!("CREATE TABLE {} ({});", qualified, columns.join(", ")))
    }
}
