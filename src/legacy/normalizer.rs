//! Batch preprocessing of legacy blob columns

use serde::Serialize;
use tracing::{Span, debug, info_span, warn};

use crate::batch::{CellValue, Column, ColumnKind, TabularBatch};

use super::{LegacyDetection, normalize};

/// Counters returned by [`LegacyNormalizer::preprocess_batch`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationStats {
    /// Columns that were rewritten
    pub columns: Vec<String>,
    /// Cells converted to JSON
    pub cells_normalized: usize,
    /// Cells that failed and were replaced with a missing value
    pub cells_failed: usize,
}

/// Rewrites legacy blobs to JSON text, one cell at a time.
///
/// Failures never abort the batch: the cell becomes [`CellValue::Missing`] and
/// a warning is recorded inside the normalizer's span.
#[derive(Debug, Clone)]
pub struct LegacyNormalizer {
    detection: LegacyDetection,
    span: Span,
}

impl Default for LegacyNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl LegacyNormalizer {
    pub fn new() -> Self {
        Self {
            detection: LegacyDetection::default(),
            span: info_span!("legacy_normalizer"),
        }
    }

    /// Set the detection rule used to pick columns
    pub fn with_detection(mut self, detection: LegacyDetection) -> Self {
        self.detection = detection;
        self
    }

    /// Set the span events are recorded in
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Whether any text value of the column is detected as a legacy blob
    pub fn column_needs_normalization(&self, column: &Column) -> bool {
        column
            .values
            .iter()
            .filter_map(CellValue::as_text)
            .any(|v| self.detection.detects(v))
    }

    /// Normalize one cell.
    ///
    /// Missing stays missing. Text is parsed and re-encoded; anything that
    /// cannot be normalized (including non-text cells) becomes missing.
    pub fn normalize_cell(&self, value: &CellValue) -> CellValue {
        let _guard = self.span.enter();
        match value {
            CellValue::Missing => CellValue::Missing,
            CellValue::Text(text) => match normalize(text) {
                Ok(json) => CellValue::Text(json),
                Err(e) => {
                    warn!("Legacy blob normalization failed: {}", e);
                    CellValue::Missing
                }
            },
            other => {
                warn!("Legacy blob normalization failed: expected text, found '{}'", other);
                CellValue::Missing
            }
        }
    }

    /// Rewrite every column containing at least one detected blob.
    ///
    /// Rewritten columns keep their name and position; their kind becomes
    /// [`ColumnKind::Text`].
    pub fn preprocess_batch(&self, batch: &mut TabularBatch) -> NormalizationStats {
        let mut stats = NormalizationStats::default();
        for column in batch.columns_mut() {
            if !self.column_needs_normalization(column) {
                continue;
            }
            let mut failed = 0;
            let mut normalized = 0;
            for value in column.values.iter_mut() {
                if value.is_missing() {
                    continue;
                }
                let replacement = self.normalize_cell(value);
                if replacement.is_missing() {
                    failed += 1;
                } else {
                    normalized += 1;
                }
                *value = replacement;
            }
            column.kind = ColumnKind::Text;

            self.span.in_scope(|| {
                debug!(
                    column = %column.name,
                    normalized,
                    failed,
                    "Normalized legacy blob column"
                );
            });
            stats.columns.push(column.name.clone());
            stats.cells_normalized += normalized;
            stats.cells_failed += failed;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> TabularBatch {
        TabularBatch::new(vec![
            Column::integers("id", [1, 2, 3]),
            Column::texts(
                "payload",
                [Some("a:1:{s:1:\"k\";i:1;}"), Some("a:1:{broken"), None],
            ),
            Column::texts("note", [Some("plain"), Some("text"), Some("s: but short")]),
        ])
        .unwrap()
    }

    #[test]
    fn test_preprocess_rewrites_detected_columns() {
        let mut batch = batch();
        let stats = LegacyNormalizer::new()
            .with_detection(LegacyDetection::Strict)
            .preprocess_batch(&mut batch);

        assert_eq!(stats.columns, vec!["payload".to_string()]);
        assert_eq!(stats.cells_normalized, 1);
        assert_eq!(stats.cells_failed, 1);

        let payload = batch.column("payload").unwrap();
        assert_eq!(
            payload.values,
            vec![
                CellValue::Text("{\"k\":1}".to_string()),
                CellValue::Missing,
                CellValue::Missing,
            ]
        );
        assert_eq!(batch.column("note").unwrap().values[0], CellValue::from("plain"));
    }

    #[test]
    fn test_prefix_detection_rewrites_lookalike_columns() {
        let mut batch = batch();
        let stats = LegacyNormalizer::new().preprocess_batch(&mut batch);

        // "s: but short" matches the prefix heuristic, so every cell in that
        // column is attempted and the unparseable ones become missing.
        assert_eq!(stats.columns, vec!["payload".to_string(), "note".to_string()]);
        assert!(batch.column("note").unwrap().values.iter().all(CellValue::is_missing));
    }

    #[test]
    fn test_normalize_cell_non_text() {
        let normalizer = LegacyNormalizer::new();
        assert_eq!(normalizer.normalize_cell(&CellValue::Integer(4)), CellValue::Missing);
        assert_eq!(normalizer.normalize_cell(&CellValue::Missing), CellValue::Missing);
    }
}
