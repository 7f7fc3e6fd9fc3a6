//! DDL generation for inferred tables
//!
//! [`SchemaGenerator`] turns a [`TabularBatch`](crate::batch::TabularBatch)
//! into a `CREATE TABLE` statement. The free functions in this module build
//! the surrounding statements used when loading a table.

mod generator;

use thiserror::Error;

use crate::validation::{ValidationError, quote_identifier, quote_qualified};

pub use generator::{DEFAULT_SCHEMA, SchemaGenerator};

/// Errors raised while generating SQL
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// A schema, table or column name cannot be emitted safely
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(#[from] ValidationError),

    /// The batch has no columns
    #[error("Table '{0}' has no columns")]
    NoColumns(String),
}

/// `CREATE SCHEMA IF NOT EXISTS "schema";`
pub fn create_schema_sql(schema: &str) -> Result<String, SchemaError> {
    Ok(format!(
        "CREATE SCHEMA IF NOT EXISTS {};",
        quote_identifier(schema, "schema name")?
    ))
}

/// `DROP SCHEMA IF EXISTS "schema" CASCADE;`
pub fn drop_schema_sql(schema: &str) -> Result<String, SchemaError> {
    Ok(format!(
        "DROP SCHEMA IF EXISTS {} CASCADE;",
        quote_identifier(schema, "schema name")?
    ))
}

/// `DROP TABLE IF EXISTS "schema"."table";`
pub fn drop_table_sql(schema: &str, table: &str) -> Result<String, SchemaError> {
    Ok(format!("DROP TABLE IF EXISTS {};", quote_qualified(schema, table)?))
}

/// `COPY` statement reading CSV with a header row from the client.
///
/// Every column is listed in `FORCE_NULL` so empty fields load as NULL even
/// when quoted.
pub fn copy_from_stdin_sql(schema: &str, table: &str, columns: &[&str]) -> Result<String, SchemaError> {
    if columns.is_empty() {
        return Err(SchemaError::NoColumns(table.to_string()));
    }
    let quoted = columns
        .iter()
        .map(|c| quote_identifier(c, "column name"))
        .collect::<Result<Vec<_>, _>>()?
        .join(", ");
    Ok(format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT csv, HEADER true, FORCE_NULL ({}))",
        quote_qualified(schema, table)?,
        quoted,
        quoted
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_statements() {
        assert_eq!(
            create_schema_sql("staging").unwrap(),
            "CREATE SCHEMA IF NOT EXISTS \"staging\";"
        );
        assert_eq!(
            drop_schema_sql("staging").unwrap(),
            "DROP SCHEMA IF EXISTS \"staging\" CASCADE;"
        );
        assert_eq!(
            drop_table_sql("staging", "orders").unwrap(),
            "DROP TABLE IF EXISTS \"staging\".\"orders\";"
        );
    }

    #[test]
    fn test_copy_statement() {
        assert_eq!(
            copy_from_stdin_sql("public", "t", &["a", "b"]).unwrap(),
            "COPY \"public\".\"t\" (\"a\", \"b\") FROM STDIN WITH (FORMAT csv, HEADER true, FORCE_NULL (\"a\", \"b\"))"
        );
        assert!(matches!(
            copy_from_stdin_sql("public", "t", &[]),
            Err(SchemaError::NoColumns(_))
        ));
    }

    #[test]
    fn test_helpers_reject_quotes() {
        assert!(matches!(
            drop_schema_sql("x\"; DROP"),
            Err(SchemaError::InvalidIdentifier(_))
        ));
    }
}
