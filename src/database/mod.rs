//! Database capability
//!
//! The loader and the constraint orchestrator talk to the target database
//! through the [`Database`] trait so they can run against PostgreSQL in
//! production and against an in-memory double in tests.
//!
//! [`SchemaHandle`] owns a database connection together with the default
//! schema and the logging span used for every statement it issues.

pub mod config;
#[cfg(feature = "postgres-backend")]
pub mod postgres;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{Instrument, Span, error, info, info_span};

pub use config::ConnectionConfig;
#[cfg(feature = "postgres-backend")]
pub use postgres::PostgresDatabase;

/// One result row; cells are text, `None` for SQL NULL
pub type Row = Vec<Option<String>>;

/// Errors raised by a [`Database`] implementation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DatabaseError {
    /// The connection could not be established or was lost
    #[error("Connection error: {0}")]
    Connection(String),

    /// A statement was rejected by the server
    #[error("Query error: {0}")]
    Query(String),

    /// Streaming data with COPY failed
    #[error("COPY error: {0}")]
    Copy(String),

    /// Connection settings are incomplete or malformed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The handle was already closed
    #[error("Database connection is closed")]
    Closed,
}

/// Minimal async database interface.
///
/// Implementations run statements in autocommit mode unless [`begin`]
/// was called, in which case they stay in the transaction until [`commit`] or
/// [`rollback`].
///
/// [`begin`]: Database::begin
/// [`commit`]: Database::commit
/// [`rollback`]: Database::rollback
#[async_trait]
pub trait Database: Send {
    /// Run a statement without parameters, returning the affected row count
    async fn execute(&mut self, sql: &str) -> Result<u64, DatabaseError>;

    /// Run a statement whose single parameter `$1` is a `text[]`
    async fn execute_with_text_array(&mut self, sql: &str, values: &[String]) -> Result<u64, DatabaseError>;

    /// Run a query and return its rows as text
    async fn query(&mut self, sql: &str) -> Result<Vec<Row>, DatabaseError>;

    /// Run a `COPY ... FROM STDIN` statement fed with `data`
    async fn copy_in(&mut self, sql: &str, data: Vec<u8>) -> Result<u64, DatabaseError>;

    async fn begin(&mut self) -> Result<(), DatabaseError>;

    async fn commit(&mut self) -> Result<(), DatabaseError>;

    async fn rollback(&mut self) -> Result<(), DatabaseError>;

    /// Release the connection
    async fn close(&mut self) -> Result<(), DatabaseError>;
}

/// A statement that the server rejected
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("{message} (statement: {sql})")]
pub struct StatementFailure {
    pub sql: String,
    pub message: String,
}

/// Result of one logged statement
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatementOutcome {
    Applied { sql: String, rows_affected: u64 },
    Failed(StatementFailure),
}

impl StatementOutcome {
    /// SQL text of the statement
    pub fn sql(&self) -> &str {
        match self {
            StatementOutcome::Applied { sql, .. } => sql,
            StatementOutcome::Failed(failure) => &failure.sql,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, StatementOutcome::Applied { .. })
    }

    /// The failure, if the statement was rejected
    pub fn failure(&self) -> Option<&StatementFailure> {
        match self {
            StatementOutcome::Failed(failure) => Some(failure),
            StatementOutcome::Applied { .. } => None,
        }
    }
}

/// Split `schema.table` at the first dot.
///
/// An explicit `schema_override` wins over the qualifier, which wins over
/// `default_schema`. The table part never keeps the qualifier.
///
/// # Examples
///
/// ```
/// use tabload::database::split_schema_table;
///
/// assert_eq!(split_schema_table("sales.orders", None, "public"), ("sales", "orders"));
/// assert_eq!(split_schema_table("sales.orders", Some("tmp"), "public"), ("tmp", "orders"));
/// assert_eq!(split_schema_table("orders", None, "public"), ("public", "orders"));
/// ```
pub fn split_schema_table<'a>(
    table: &'a str,
    schema_override: Option<&'a str>,
    default_schema: &'a str,
) -> (&'a str, &'a str) {
    let (qualifier, name) = match table.split_once('.') {
        Some((schema, name)) => (Some(schema), name),
        None => (None, table),
    };
    (schema_override.or(qualifier).unwrap_or(default_schema), name)
}

/// A database connection bound to a default schema and a logging span.
///
/// The connection is released by [`close`](Self::close) or, on any other
/// exit path, when the handle is dropped.
pub struct SchemaHandle<D: Database> {
    database: Option<D>,
    default_schema: String,
    span: Span,
}

impl<D: Database> SchemaHandle<D> {
    pub fn new(database: D, default_schema: impl Into<String>) -> Self {
        let default_schema = default_schema.into();
        let span = info_span!("schema", schema = %default_schema);
        Self {
            database: Some(database),
            default_schema,
            span,
        }
    }

    /// Set the span events are recorded in
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn default_schema(&self) -> &str {
        &self.default_schema
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn is_closed(&self) -> bool {
        self.database.is_none()
    }

    /// Access the open connection
    pub fn database(&mut self) -> Result<&mut D, DatabaseError> {
        self.database.as_mut().ok_or(DatabaseError::Closed)
    }

    /// Execute one statement, logging the outcome.
    ///
    /// Failures are logged with the statement text and returned as
    /// [`StatementOutcome::Failed`]; they are never propagated.
    pub async fn execute_statement(&mut self, sql: &str) -> StatementOutcome {
        let span = self.span.clone();
        async {
            let result = match self.database() {
                Ok(db) => db.execute(sql).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(rows_affected) => {
                    info!("Statement executed: {}", sql);
                    StatementOutcome::Applied {
                        sql: sql.to_string(),
                        rows_affected,
                    }
                }
                Err(e) => {
                    error!("Statement failed: {}\nStatement: {}", e, sql);
                    StatementOutcome::Failed(StatementFailure {
                        sql: sql.to_string(),
                        message: e.to_string(),
                    })
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Close the connection. Closing twice is a no-op.
    pub async fn close(&mut self) -> Result<(), DatabaseError> {
        match self.database.take() {
            Some(mut db) => {
                let result = db.close().await;
                self.span.in_scope(|| info!("Database connection closed"));
                result
            }
            None => Ok(()),
        }
    }
}

impl<D: Database + std::fmt::Debug> std::fmt::Debug for SchemaHandle<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaHandle")
            .field("database", &self.database)
            .field("default_schema", &self.default_schema)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_schema_table_precedence() {
        assert_eq!(split_schema_table("t", None, "d"), ("d", "t"));
        assert_eq!(split_schema_table("q.t", None, "d"), ("q", "t"));
        assert_eq!(split_schema_table("q.t", Some("o"), "d"), ("o", "t"));
        assert_eq!(split_schema_table("t", Some("o"), "d"), ("o", "t"));
        assert_eq!(split_schema_table("a.b.c", None, "d"), ("a", "b.c"));
    }

    #[test]
    fn test_statement_outcome_serializes_with_status() {
        let outcome = StatementOutcome::Failed(StatementFailure {
            sql: "SELECT 1".to_string(),
            message: "boom".to_string(),
        });
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["message"], "boom");
        assert_eq!(outcome.sql(), "SELECT 1");
        assert!(!outcome.is_applied());
    }
}
