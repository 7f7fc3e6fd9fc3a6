//! Tabular batch model
//!
//! A [`TabularBatch`] is an ordered set of equally long [`Column`]s. Each
//! column carries the kind of value it was read as and the observed cells,
//! with [`CellValue::Missing`] marking absent values.

#[cfg(feature = "ingest")]
pub mod csv;

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Declared value kind of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    /// Whole numbers
    Integer,
    /// Floating point numbers
    Float,
    /// True / false
    Boolean,
    /// Strings and anything read as an opaque object
    Text,
    /// Date and time without time zone
    Timestamp,
    /// Anything else (durations, mixed data from other sources, ...)
    Other,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Integer => "integer",
            ColumnKind::Float => "float",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Text => "text",
            ColumnKind::Timestamp => "timestamp",
            ColumnKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// A single cell of a column
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// Absent value
    Missing,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl CellValue {
    /// Check whether this cell is the missing sentinel
    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }

    /// Get the text content if this is a text cell
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the integer content if this is an integer cell
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            CellValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// String coercion used for length measurement and CSV output.
    ///
    /// Returns `None` for missing cells.
    pub fn to_text(&self) -> Option<String> {
        match self {
            CellValue::Missing => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Missing => Ok(()),
            CellValue::Integer(n) => write!(f, "{}", n),
            CellValue::Float(x) => write!(f, "{}", x),
            CellValue::Boolean(b) => write!(f, "{}", b),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Integer(n)
    }
}

impl From<f64> for CellValue {
    fn from(x: f64) -> Self {
        CellValue::Float(x)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Missing)
    }
}

/// A named column with its declared kind and observed values
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub values: Vec<CellValue>,
}

impl Column {
    /// Create a new column
    pub fn new(name: impl Into<String>, kind: ColumnKind, values: Vec<CellValue>) -> Self {
        Self {
            name: name.into(),
            kind,
            values,
        }
    }

    /// Convenience constructor for integer columns
    pub fn integers(name: impl Into<String>, values: impl IntoIterator<Item = i64>) -> Self {
        Self::new(
            name,
            ColumnKind::Integer,
            values.into_iter().map(CellValue::Integer).collect(),
        )
    }

    /// Convenience constructor for text columns
    pub fn texts<S: Into<String>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = Option<S>>,
    ) -> Self {
        Self::new(
            name,
            ColumnKind::Text,
            values
                .into_iter()
                .map(|v| v.map(|s| CellValue::Text(s.into())).unwrap_or(CellValue::Missing))
                .collect(),
        )
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the column has no cells
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over non-missing cells
    pub fn present(&self) -> impl Iterator<Item = &CellValue> {
        self.values.iter().filter(|v| !v.is_missing())
    }
}

/// Errors raised while assembling a batch
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BatchError {
    /// Two columns share a name
    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),

    /// Column lengths differ
    #[error("Column '{column}' has {actual} values, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
}

/// An ordered set of equally long columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabularBatch {
    columns: Vec<Column>,
}

impl TabularBatch {
    /// Build a batch, checking names are unique and lengths agree
    pub fn new(columns: Vec<Column>) -> Result<Self, BatchError> {
        let mut batch = Self::default();
        for column in columns {
            batch.push(column)?;
        }
        Ok(batch)
    }

    /// Append a column
    pub fn push(&mut self, column: Column) -> Result<(), BatchError> {
        if self.columns.iter().any(|c| c.name == column.name) {
            return Err(BatchError::DuplicateColumn(column.name));
        }
        if let Some(first) = self.columns.first() {
            if first.len() != column.len() {
                let actual = column.len();
                return Err(BatchError::LengthMismatch {
                    column: column.name,
                    expected: first.len(),
                    actual,
                });
            }
        }
        self.columns.push(column);
        Ok(())
    }

    /// Columns in declared order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Mutable access to the columns (lengths must be preserved)
    pub fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column names in declared order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Number of rows
    pub fn row_count(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    /// Number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Iterate over the cells of one row in column order
    pub fn row(&self, index: usize) -> impl Iterator<Item = &CellValue> {
        self.columns.iter().filter_map(move |c| c.values.get(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_rejects_length_mismatch() {
        let result = TabularBatch::new(vec![
            Column::integers("id", [1, 2, 3]),
            Column::integers("other", [1, 2]),
        ]);
        assert_eq!(
            result.unwrap_err(),
            BatchError::LengthMismatch {
                column: "other".to_string(),
                expected: 3,
                actual: 2,
            }
        );
    }

    #[test]
    fn test_push_keeps_batch_on_length_mismatch() {
        let mut batch = TabularBatch::new(vec![Column::integers("id", [1, 2])]).unwrap();
        let err = batch.push(Column::texts("name", [Some("a")])).unwrap_err();
        assert!(err.to_string().contains("name"));
        assert_eq!(batch.columns().len(), 1);
    }

    #[test]
    fn test_batch_rejects_duplicate_names() {
        let result = TabularBatch::new(vec![
            Column::integers("id", [1]),
            Column::integers("id", [2]),
        ]);
        assert_eq!(result, Err(BatchError::DuplicateColumn("id".to_string())));
    }

    #[test]
    fn test_row_access() {
        let batch = TabularBatch::new(vec![
            Column::integers("id", [1, 2]),
            Column::texts("name", [Some("a"), None]),
        ])
        .unwrap();

        assert_eq!(batch.row_count(), 2);
        let row: Vec<_> = batch.row(1).cloned().collect();
        assert_eq!(row, vec![CellValue::Integer(2), CellValue::Missing]);
    }

    #[test]
    fn test_cell_text_coercion() {
        assert_eq!(CellValue::Missing.to_text(), None);
        assert_eq!(CellValue::Integer(42).to_text().as_deref(), Some("42"));
        assert_eq!(CellValue::Float(1.5).to_text().as_deref(), Some("1.5"));
        assert_eq!(CellValue::Boolean(true).to_text().as_deref(), Some("true"));
    }
}
