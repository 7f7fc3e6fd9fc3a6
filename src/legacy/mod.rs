//! Legacy serialized-blob support
//!
//! Some exports carry values written by PHP's `serialize()` inside plain text
//! columns. This module detects those values, parses them and rewrites them as
//! JSON so they can be stored in a `JSONB` column.
//!
//! # Example
//!
//! ```
//! use tabload::legacy::{looks_like_legacy_blob, normalize};
//!
//! let blob = r#"a:2:{s:4:"name";s:3:"Ann";s:4:"tags";a:1:{i:0;s:3:"vip";}}"#;
//! assert!(looks_like_legacy_blob(blob));
//! assert_eq!(
//!     normalize(blob).unwrap(),
//!     r#"{"name":"Ann","tags":{"0":"vip"}}"#
//! );
//! ```

pub mod error;
pub mod normalizer;
pub mod parser;

use serde::{Deserialize, Serialize};

pub use error::{LegacyError, NormalizationFailure};
pub use normalizer::{LegacyNormalizer, NormalizationStats};
pub use parser::{CLASS_NAME_KEY, LegacyKey, LegacyValue, MAX_DEPTH, parse};

/// Prefix check: after trimming, the value starts with `a:`, `O:` or `s:`.
///
/// This is a heuristic. Ordinary text such as `"s: see notes"` also matches;
/// use [`looks_like_legacy_blob_strict`] when that matters.
pub fn looks_like_legacy_blob(value: &str) -> bool {
    matches!(value.trim_start().as_bytes(), [b'a' | b'O' | b's', b':', ..])
}

/// Prefix check followed by a full parse
pub fn looks_like_legacy_blob_strict(value: &str) -> bool {
    looks_like_legacy_blob(value) && parse(value).is_ok()
}

/// Normalize one legacy blob to compact JSON.
///
/// Byte strings are decoded as lossy UTF-8, arrays become JSON objects keyed
/// by their stringified keys, objects carry a leading `__class_name` field.
pub fn normalize(value: &str) -> Result<String, NormalizationFailure> {
    let parsed = parse(value).map_err(|e| NormalizationFailure::new(value, e))?;
    Ok(parsed.into_json().to_string())
}

/// How text values are recognised as legacy blobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegacyDetection {
    /// Prefix heuristic only
    #[default]
    Prefix,
    /// Prefix heuristic plus a successful parse
    Strict,
}

impl LegacyDetection {
    /// Check a single value
    pub fn detects(self, value: &str) -> bool {
        match self {
            LegacyDetection::Prefix => looks_like_legacy_blob(value),
            LegacyDetection::Strict => looks_like_legacy_blob_strict(value),
        }
    }
}
