//! Identifier validation and quoting.
//!
//! Generated SQL double-quotes every identifier and does not escape embedded
//! quote characters. Identifiers are therefore validated before they are
//! quoted: anything that could break out of the quotes is rejected.
//!
//! # Security
//!
//! Validation prevents:
//! - SQL injection via table/column names carrying `"`
//! - Truncated statements via NUL bytes
//! - Log and terminal injection via control characters

use serde::Serialize;
use thiserror::Error;

/// Maximum length for identifiers in general
pub const MAX_IDENTIFIER_LENGTH: usize = 255;

/// Errors that can occur during identifier validation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum ValidationError {
    /// Input is empty when a value is required
    #[error("{0} cannot be empty")]
    Empty(&'static str),

    /// Input exceeds maximum allowed length
    #[error("{field} exceeds maximum length (max: {max}, got: {actual})")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    /// Input contains invalid characters
    #[error("{field} '{value}' contains invalid characters: {reason}")]
    InvalidCharacters {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate an identifier that will be emitted between double quotes.
///
/// # Rules
///
/// - Must not be empty
/// - Must not exceed 255 bytes
/// - Must not contain `"`, NUL or other control characters
///
/// Reserved words, spaces and punctuation are accepted since the identifier
/// is always quoted.
///
/// # Examples
///
/// ```
/// use tabload::validation::input::validate_identifier;
///
/// assert!(validate_identifier("orders", "table name").is_ok());
/// assert!(validate_identifier("order date", "column name").is_ok());
/// assert!(validate_identifier("x\"; DROP TABLE y; --", "table name").is_err());
/// ```
pub fn validate_identifier(name: &str, field: &'static str) -> ValidationResult<()> {
    if name.is_empty() {
        return Err(ValidationError::Empty(field));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_IDENTIFIER_LENGTH,
            actual: name.len(),
        });
    }

    for c in name.chars() {
        let reason = if c == '"' {
            "double quote"
        } else if c == '\0' {
            "null byte"
        } else if c.is_control() {
            "control character"
        } else {
            continue;
        };
        return Err(ValidationError::InvalidCharacters {
            field,
            value: name.escape_debug().to_string(),
            reason: reason.to_string(),
        });
    }

    Ok(())
}

/// Validate and double-quote an identifier.
///
/// # Examples
///
/// ```
/// use tabload::validation::input::quote_identifier;
///
/// assert_eq!(quote_identifier("users", "table name").unwrap(), "\"users\"");
/// ```
pub fn quote_identifier(name: &str, field: &'static str) -> ValidationResult<String> {
    validate_identifier(name, field)?;
    Ok(format!("\"{}\"", name))
}

/// Validate and quote a `"schema"."table"` pair.
pub fn quote_qualified(schema: &str, table: &str) -> ValidationResult<String> {
    Ok(format!(
        "{}.{}",
        quote_identifier(schema, "schema name")?,
        quote_identifier(table, "table name")?
    ))
}
