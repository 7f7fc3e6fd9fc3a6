//! SQL column types produced by inference

use std::fmt;

use serde::{Deserialize, Serialize};

/// Inferred SQL column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SqlType {
    Integer,
    /// Integer wider than 32 bits
    Bigint,
    Boolean,
    Float,
    /// Short text, bounded by the configured length
    Varchar,
    Text,
    /// Normalized legacy blobs
    Jsonb,
    Timestamp,
}

impl SqlType {
    /// Keyword as emitted in DDL
    pub fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Bigint => "BIGINT",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Float => "FLOAT",
            SqlType::Varchar => "VARCHAR",
            SqlType::Text => "TEXT",
            SqlType::Jsonb => "JSONB",
            SqlType::Timestamp => "TIMESTAMP",
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}
