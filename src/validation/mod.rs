//! Validation functionality
//!
//! Provides validation of SQL identifiers before they are quoted into
//! generated statements.

pub mod input;

pub use input::{ValidationError, ValidationResult, quote_identifier, quote_qualified, validate_identifier};
