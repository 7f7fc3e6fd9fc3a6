//! Configuration for column type classification

use serde::{Deserialize, Serialize};

use crate::legacy::LegacyDetection;

/// Default upper bound (in characters) for VARCHAR columns
pub const DEFAULT_VARCHAR_MAX_LENGTH: usize = 255;

/// Configuration for the type classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ClassifierConfig {
    /// Longest text value that still maps to VARCHAR
    pub varchar_max_length: usize,

    /// How text values are recognised as legacy blobs
    pub legacy_detection: LegacyDetection,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            varchar_max_length: DEFAULT_VARCHAR_MAX_LENGTH,
            legacy_detection: LegacyDetection::Prefix,
        }
    }
}

impl ClassifierConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for custom configuration
    pub fn builder() -> ClassifierConfigBuilder {
        ClassifierConfigBuilder::default()
    }
}

/// Builder for ClassifierConfig
#[derive(Debug, Default)]
pub struct ClassifierConfigBuilder {
    config: ClassifierConfig,
}

impl ClassifierConfigBuilder {
    /// Set the VARCHAR length bound
    pub fn varchar_max_length(mut self, length: usize) -> Self {
        self.config.varchar_max_length = length;
        self
    }

    /// Set the legacy blob detection rule
    pub fn legacy_detection(mut self, detection: LegacyDetection) -> Self {
        self.config.legacy_detection = detection;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ClassifierConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClassifierConfig::default();
        assert_eq!(config.varchar_max_length, 255);
        assert_eq!(config.legacy_detection, LegacyDetection::Prefix);
    }

    #[test]
    fn test_builder() {
        let config = ClassifierConfig::builder()
            .varchar_max_length(64)
            .legacy_detection(LegacyDetection::Strict)
            .build();

        assert_eq!(config.varchar_max_length, 64);
        assert_eq!(config.legacy_detection, LegacyDetection::Strict);
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let config: ClassifierConfig = serde_json::from_str(r#"{"legacy_detection":"strict"}"#).unwrap();
        assert_eq!(config.varchar_max_length, 255);
        assert_eq!(config.legacy_detection, LegacyDetection::Strict);
    }
}
