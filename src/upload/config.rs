//! Upload pipeline configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::batch::csv::CsvReadOptions;
use crate::database::ConnectionConfig;
use crate::inference::ClassifierConfig;
use crate::legacy::LegacyDetection;
use crate::schema::DEFAULT_SCHEMA;

#[cfg(feature = "toml")]
use super::UploadError;

/// Configuration for uploading a directory of CSV files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Directory holding `.csv` / `.csv.gz` files, one table per file
    pub data_dir: PathBuf,

    /// Target schema
    pub schema: String,

    /// Optional JSON file with constraint declarations
    pub constraints_file: Option<PathBuf>,

    /// Drop and recreate the schema before loading
    pub reset_schema: bool,

    /// Drop each table before creating it
    pub drop_existing_tables: bool,

    /// CSV reading options
    pub csv: CsvReadOptions,

    /// Type classification options
    pub classifier: ClassifierConfig,

    /// Connection settings
    pub database: ConnectionConfig,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            schema: DEFAULT_SCHEMA.to_string(),
            constraints_file: None,
            reset_schema: true,
            drop_existing_tables: false,
            csv: CsvReadOptions::default(),
            classifier: ClassifierConfig::default(),
            database: ConnectionConfig::default(),
        }
    }
}

impl UploadConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn with_constraints_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.constraints_file = Some(path.into());
        self
    }

    pub fn with_reset_schema(mut self, reset: bool) -> Self {
        self.reset_schema = reset;
        self
    }

    pub fn with_drop_existing_tables(mut self, drop: bool) -> Self {
        self.drop_existing_tables = drop;
        self
    }

    pub fn with_csv_options(mut self, options: CsvReadOptions) -> Self {
        self.csv = options;
        self
    }

    pub fn with_classifier(mut self, classifier: ClassifierConfig) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_database(mut self, database: ConnectionConfig) -> Self {
        self.database = database;
        self
    }

    /// Detection rule shared by the classifier and the normalizer
    pub fn legacy_detection(&self) -> LegacyDetection {
        self.classifier.legacy_detection
    }

    /// Parse a TOML document
    #[cfg(feature = "toml")]
    pub fn from_toml_str(content: &str) -> Result<Self, UploadError> {
        toml::from_str(content).map_err(|e| UploadError::Config(e.to_string()))
    }

    /// Load a TOML file.
    ///
    /// Relative `data_dir` and `constraints_file` paths are resolved against
    /// the directory containing the file.
    #[cfg(feature = "toml")]
    pub fn from_file(path: &Path) -> Result<Self, UploadError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| UploadError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let mut config = Self::from_toml_str(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Make relative paths relative to `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        if self.data_dir.is_relative() {
            self.data_dir = base.join(&self.data_dir);
        }
        if let Some(constraints) = &self.constraints_file {
            if constraints.is_relative() {
                self.constraints_file = Some(base.join(constraints));
            }
        }
    }
}
