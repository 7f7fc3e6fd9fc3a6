//! CSV reading and writing for tabular batches
//!
//! Reading mirrors the defaults of a dataframe CSV reader: a fixed list of
//! NA markers becomes [`CellValue::Missing`], and each column gets the
//! narrowest kind that accepts all of its present values. Integer columns
//! with gaps are widened to floats, boolean columns with gaps fall back to
//! text. Files ending in `.gz` are decompressed transparently.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use csv::{ReaderBuilder, WriterBuilder};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{BatchError, CellValue, Column, ColumnKind, TabularBatch};

/// Default markers treated as missing values
pub const DEFAULT_NA_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// Errors that can occur while reading or writing CSV data
#[derive(Error, Debug)]
pub enum IngestError {
    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Malformed CSV content
    #[error("CSV error in {path}: {message}")]
    Csv { path: PathBuf, message: String },

    /// Header produced an unusable batch
    #[error("Invalid batch in {path}: {source}")]
    Batch {
        path: PathBuf,
        #[source]
        source: BatchError,
    },

    /// Invalid read options
    #[error("Invalid CSV options: {0}")]
    InvalidOptions(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Options for reading CSV files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvReadOptions {
    /// Field delimiter (must be ASCII)
    pub delimiter: char,
    /// Cell contents treated as missing
    pub na_values: Vec<String>,
    /// Parse `YYYY-MM-DD HH:MM:SS` style columns as timestamps
    pub detect_timestamps: bool,
}

impl Default for CsvReadOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            na_values: DEFAULT_NA_VALUES.iter().map(|s| s.to_string()).collect(),
            detect_timestamps: false,
        }
    }
}

impl CsvReadOptions {
    /// Create options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the delimiter
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Replace the NA marker list
    pub fn with_na_values<S: Into<String>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.na_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable timestamp detection
    pub fn with_detect_timestamps(mut self, detect: bool) -> Self {
        self.detect_timestamps = detect;
        self
    }

    fn delimiter_byte(&self) -> Result<u8, IngestError> {
        if self.delimiter.is_ascii() {
            Ok(self.delimiter as u8)
        } else {
            Err(IngestError::InvalidOptions(format!(
                "delimiter must be ASCII, got '{}'",
                self.delimiter
            )))
        }
    }

    fn is_na(&self, raw: &str) -> bool {
        self.na_values.iter().any(|na| na == raw)
    }
}

/// Read a `.csv` or `.csv.gz` file into a batch
pub fn read_csv_file(path: &Path, options: &CsvReadOptions) -> Result<TabularBatch, IngestError> {
    if !path.exists() {
        return Err(IngestError::FileNotFound(path.to_path_buf()));
    }

    let file = BufReader::new(File::open(path)?);
    let is_gzip = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);

    if is_gzip {
        read_csv(GzDecoder::new(file), options, path)
    } else {
        read_csv(file, options, path)
    }
}

/// Read CSV data from any reader into a batch
///
/// `origin` is only used for error messages.
pub fn read_csv<R: Read>(
    reader: R,
    options: &CsvReadOptions,
    origin: &Path,
) -> Result<TabularBatch, IngestError> {
    let csv_error = |e: csv::Error| IngestError::Csv {
        path: origin.to_path_buf(),
        message: e.to_string(),
    };

    let mut rdr = ReaderBuilder::new()
        .delimiter(options.delimiter_byte()?)
        .has_headers(true)
        .from_reader(reader);

    let headers = dedupe_headers(rdr.headers().map_err(csv_error)?.iter());
    let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];

    for record in rdr.records() {
        let record = record.map_err(csv_error)?;
        for (idx, field) in record.iter().enumerate() {
            let cell = if options.is_na(field) {
                None
            } else {
                Some(field.to_string())
            };
            raw[idx].push(cell);
        }
    }

    let columns = headers
        .into_iter()
        .zip(raw)
        .map(|(name, cells)| build_column(name, cells, options))
        .collect();

    TabularBatch::new(columns).map_err(|source| IngestError::Batch {
        path: origin.to_path_buf(),
        source,
    })
}

/// Serialize a batch to CSV with a header row
///
/// Missing cells are written as empty fields.
pub fn write_csv(batch: &TabularBatch) -> Result<Vec<u8>, IngestError> {
    let csv_error = |e: csv::Error| IngestError::Csv {
        path: PathBuf::from("<memory>"),
        message: e.to_string(),
    };

    let mut wtr = WriterBuilder::new().from_writer(Vec::new());
    wtr.write_record(batch.column_names()).map_err(csv_error)?;

    for index in 0..batch.row_count() {
        let record: Vec<String> = batch
            .row(index)
            .map(|cell| cell.to_text().unwrap_or_default())
            .collect();
        wtr.write_record(&record).map_err(csv_error)?;
    }

    wtr.into_inner().map_err(|e| IngestError::Io(e.into_error()))
}

/// Rename repeated headers to `name.1`, `name.2`, ...
fn dedupe_headers<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for header in headers {
        let mut candidate = header.to_string();
        let mut suffix = 1;
        while names.contains(&candidate) {
            candidate = format!("{}.{}", header, suffix);
            suffix += 1;
        }
        names.push(candidate);
    }
    names
}

fn build_column(name: String, cells: Vec<Option<String>>, options: &CsvReadOptions) -> Column {
    let present: Vec<&str> = cells.iter().flatten().map(|s| s.trim()).collect();
    let has_missing = present.len() < cells.len();

    if present.is_empty() {
        return Column::new(name, ColumnKind::Text, vec![CellValue::Missing; cells.len()]);
    }

    if present.iter().all(|s| s.parse::<i64>().is_ok()) {
        return if has_missing {
            map_cells(name, ColumnKind::Float, &cells, |s| {
                s.trim().parse::<i64>().ok().map(|n| CellValue::Float(n as f64))
            })
        } else {
            map_cells(name, ColumnKind::Integer, &cells, |s| {
                s.trim().parse::<i64>().ok().map(CellValue::Integer)
            })
        };
    }

    if present.iter().all(|s| s.parse::<f64>().is_ok()) {
        return map_cells(name, ColumnKind::Float, &cells, |s| {
            s.trim().parse::<f64>().ok().map(CellValue::Float)
        });
    }

    if !has_missing && present.iter().all(|s| parse_bool(s).is_some()) {
        return map_cells(name, ColumnKind::Boolean, &cells, |s| {
            parse_bool(s.trim()).map(CellValue::Boolean)
        });
    }

    if options.detect_timestamps && present.iter().all(|s| parse_timestamp(s).is_some()) {
        return map_cells(name, ColumnKind::Timestamp, &cells, |s| {
            parse_timestamp(s.trim()).map(CellValue::Timestamp)
        });
    }

    // Text keeps the untrimmed content
    map_cells(name, ColumnKind::Text, &cells, |s| Some(CellValue::Text(s.to_string())))
}

fn map_cells(
    name: String,
    kind: ColumnKind,
    cells: &[Option<String>],
    convert: impl Fn(&str) -> Option<CellValue>,
) -> Column {
    let values = cells
        .iter()
        .map(|cell| {
            cell.as_deref()
                .and_then(&convert)
                .unwrap_or(CellValue::Missing)
        })
        .collect();
    Column::new(name, kind, values)
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "True" | "TRUE" | "true" => Some(true),
        "False" | "FALSE" | "false" => Some(false),
        _ => None,
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}
