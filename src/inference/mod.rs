//! Column type inference for tabular data
//!
//! Maps each column's declared kind and observed values to the narrowest SQL
//! type that is safe for all of them.
//!
//! ## Rules
//!
//! - **Integer** - BIGINT when a value exceeds the 32-bit range, BOOLEAN when
//!   the only values are 0 and 1, otherwise INTEGER
//! - **Float** - FLOAT
//! - **Boolean** - BOOLEAN
//! - **Text** - JSONB when a legacy blob is detected, otherwise VARCHAR or
//!   TEXT depending on the longest value
//! - **Timestamp** - TIMESTAMP
//! - anything else - TEXT
//!
//! ## Example
//!
//! ```rust
//! use tabload::batch::Column;
//! use tabload::inference::{SqlType, TypeClassifier};
//!
//! let column = Column::integers("amount", [10, 3_000_000_000]);
//! assert_eq!(TypeClassifier::new().classify_column(&column), SqlType::Bigint);
//! ```

mod classifier;
mod config;
mod types;

pub use classifier::{INTEGER_MAX, TypeClassifier, classify};
pub use config::{ClassifierConfig, ClassifierConfigBuilder, DEFAULT_VARCHAR_MAX_LENGTH};
pub use types::SqlType;
