//! Column type classifier
//!
//! Maps a column's declared kind and observed values to the narrowest SQL
//! type that can hold every value.

use std::collections::BTreeSet;

use crate::batch::{CellValue, Column, ColumnKind};

use super::config::ClassifierConfig;
use super::types::SqlType;

/// Largest value that fits a 32-bit INTEGER column
pub const INTEGER_MAX: i64 = i32::MAX as i64;

/// Classify with the default configuration.
///
/// # Examples
///
/// ```
/// use tabload::batch::{CellValue, ColumnKind};
/// use tabload::inference::{classify, SqlType};
///
/// let values = [CellValue::Integer(0), CellValue::Integer(1), CellValue::Missing];
/// assert_eq!(classify(ColumnKind::Integer, Some(&values)), SqlType::Boolean);
/// assert_eq!(classify(ColumnKind::Text, None), SqlType::Text);
/// ```
pub fn classify(kind: ColumnKind, values: Option<&[CellValue]>) -> SqlType {
    TypeClassifier::default().classify(kind, values)
}

/// Stateless classifier parameterised by [`ClassifierConfig`]
#[derive(Debug, Clone, Default)]
pub struct TypeClassifier {
    config: ClassifierConfig,
}

impl TypeClassifier {
    /// Create a classifier with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a classifier with a custom configuration
    pub fn with_config(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Get the configuration
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify a whole column using all of its values
    pub fn classify_column(&self, column: &Column) -> SqlType {
        self.classify(column.kind, Some(&column.values))
    }

    /// Classify a declared kind with optional observed values.
    ///
    /// Never fails; an absent or empty value set yields the widest type for
    /// the kind.
    pub fn classify(&self, kind: ColumnKind, values: Option<&[CellValue]>) -> SqlType {
        match kind {
            ColumnKind::Integer => values.map_or(SqlType::Integer, classify_integers),
            ColumnKind::Float => SqlType::Float,
            ColumnKind::Boolean => SqlType::Boolean,
            ColumnKind::Text => values.map_or(SqlType::Text, |v| self.classify_text(v)),
            ColumnKind::Timestamp => SqlType::Timestamp,
            ColumnKind::Other => SqlType::Text,
        }
    }

    fn classify_text(&self, values: &[CellValue]) -> SqlType {
        let detection = self.config.legacy_detection;
        if values
            .iter()
            .filter_map(CellValue::as_text)
            .any(|v| detection.detects(v))
        {
            return SqlType::Jsonb;
        }

        let longest = values
            .iter()
            .filter_map(CellValue::to_text)
            .map(|s| s.chars().count())
            .max();

        match longest {
            None => SqlType::Text,
            Some(len) if len <= self.config.varchar_max_length => SqlType::Varchar,
            Some(_) => SqlType::Text,
        }
    }
}

fn classify_integers(values: &[CellValue]) -> SqlType {
    let integers = values.iter().filter_map(CellValue::as_integer);

    let mut distinct = BTreeSet::new();
    for n in integers {
        if n > INTEGER_MAX {
            return SqlType::Bigint;
        }
        // Only the {0, 1} case matters; stop collecting once it is ruled out.
        if distinct.len() <= 2 {
            distinct.insert(n);
        }
    }

    if distinct.len() == 2 && distinct.contains(&0) && distinct.contains(&1) {
        SqlType::Boolean
    } else {
        SqlType::Integer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::legacy::LegacyDetection;

    fn ints(values: &[i64]) -> Vec<CellValue> {
        values.iter().copied().map(CellValue::Integer).collect()
    }

    fn texts(values: &[&str]) -> Vec<CellValue> {
        values.iter().copied().map(CellValue::from).collect()
    }

    #[test]
    fn test_integer_rules() {
        assert_eq!(classify(ColumnKind::Integer, Some(&ints(&[1, 2, 3]))), SqlType::Integer);
        assert_eq!(
            classify(ColumnKind::Integer, Some(&ints(&[1, 3_000_000_000]))),
            SqlType::Bigint
        );
        assert_eq!(
            classify(ColumnKind::Integer, Some(&ints(&[2_147_483_647]))),
            SqlType::Integer
        );
        assert_eq!(classify(ColumnKind::Integer, Some(&ints(&[0, 1, 1, 0]))), SqlType::Boolean);
        assert_eq!(classify(ColumnKind::Integer, Some(&ints(&[1, 1]))), SqlType::Integer);
        assert_eq!(classify(ColumnKind::Integer, Some(&ints(&[0, 1, 2]))), SqlType::Integer);
        assert_eq!(classify(ColumnKind::Integer, Some(&[])), SqlType::Integer);
        assert_eq!(classify(ColumnKind::Integer, None), SqlType::Integer);
    }

    #[test]
    fn test_bigint_wins_over_boolean_check() {
        assert_eq!(
            classify(ColumnKind::Integer, Some(&ints(&[0, 1, 1, 5_000_000_000]))),
            SqlType::Bigint
        );
    }

    #[test]
    fn test_fixed_kinds() {
        assert_eq!(classify(ColumnKind::Float, None), SqlType::Float);
        assert_eq!(classify(ColumnKind::Boolean, None), SqlType::Boolean);
        assert_eq!(classify(ColumnKind::Timestamp, None), SqlType::Timestamp);
        assert_eq!(classify(ColumnKind::Other, Some(&texts(&["x"]))), SqlType::Text);
    }

    #[test]
    fn test_text_length_boundary() {
        let at_limit = "x".repeat(255);
        let over_limit = "x".repeat(256);
        assert_eq!(classify(ColumnKind::Text, Some(&texts(&[&at_limit]))), SqlType::Varchar);
        assert_eq!(classify(ColumnKind::Text, Some(&texts(&[&over_limit]))), SqlType::Text);
    }

    #[test]
    fn test_text_length_counts_characters() {
        let accented = "é".repeat(255);
        assert_eq!(classify(ColumnKind::Text, Some(&texts(&[&accented]))), SqlType::Varchar);
    }

    #[test]
    fn test_empty_text_column() {
        assert_eq!(classify(ColumnKind::Text, Some(&[CellValue::Missing])), SqlType::Text);
        assert_eq!(classify(ColumnKind::Text, Some(&[])), SqlType::Text);
        assert_eq!(classify(ColumnKind::Text, None), SqlType::Text);
    }

    #[test]
    fn test_legacy_blob_detection() {
        let values = texts(&["plain", "a:1:{i:0;s:1:\"x\";}"]);
        assert_eq!(classify(ColumnKind::Text, Some(&values)), SqlType::Jsonb);
    }

    #[test]
    fn test_strict_detection_ignores_lookalikes() {
        let classifier = TypeClassifier::with_config(
            ClassifierConfig::builder()
                .legacy_detection(LegacyDetection::Strict)
                .build(),
        );
        let values = texts(&["s: see notes"]);
        assert_eq!(classifier.classify(ColumnKind::Text, Some(&values)), SqlType::Varchar);
        assert_eq!(classify(ColumnKind::Text, Some(&values)), SqlType::Jsonb);
    }

    #[test]
    fn test_custom_varchar_bound() {
        let classifier = TypeClassifier::with_config(ClassifierConfig::builder().varchar_max_length(3).build());
        assert_eq!(
            classifier.classify(ColumnKind::Text, Some(&texts(&["abcd"]))),
            SqlType::Text
        );
    }
}
