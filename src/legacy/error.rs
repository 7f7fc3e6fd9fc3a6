//! Error types for legacy blob parsing

use thiserror::Error;

/// Errors raised while parsing the legacy serialization grammar
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LegacyError {
    /// Input ended inside a value
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEnd { offset: usize },

    /// A structural byte did not match the grammar
    #[error("expected '{expected}' at offset {offset}, found '{found}'")]
    UnexpectedByte {
        expected: char,
        found: char,
        offset: usize,
    },

    /// A length, count, integer or float could not be parsed
    #[error("invalid number '{text}' at offset {offset}")]
    InvalidNumber { text: String, offset: usize },

    /// Type tag outside the supported set
    #[error("unsupported type tag '{tag}' at offset {offset}")]
    UnsupportedTag { tag: char, offset: usize },

    /// Array or object key that is neither an integer nor a string
    #[error("invalid key tag '{tag}' at offset {offset}")]
    InvalidKey { tag: char, offset: usize },

    /// Non-whitespace content after the top-level value
    #[error("trailing data at offset {offset}")]
    TrailingData { offset: usize },

    /// Containers nested too deeply
    #[error("maximum nesting depth exceeded: {depth} > {max}")]
    MaxDepthExceeded { depth: usize, max: usize },
}

/// A single cell that could not be normalized
#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot normalize legacy blob '{preview}': {source}")]
pub struct NormalizationFailure {
    /// Leading characters of the offending value
    pub preview: String,
    #[source]
    pub source: LegacyError,
}

impl NormalizationFailure {
    const PREVIEW_CHARS: usize = 40;

    pub(crate) fn new(value: &str, source: LegacyError) -> Self {
        let mut preview: String = value.chars().take(Self::PREVIEW_CHARS).collect();
        if value.chars().count() > Self::PREVIEW_CHARS {
            preview.push('…');
        }
        Self {
            preview: preview.escape_debug().to_string(),
            source,
        }
    }
}
