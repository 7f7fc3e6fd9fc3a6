//! Parser for the length-prefixed legacy serialization grammar.
//!
//! ```text
//! N;                                  null
//! b:0; | b:1;                         boolean
//! i:<int>;                            integer
//! d:<float>;                          float (INF, -INF and NAN allowed)
//! s:<len>:"<bytes>";                  byte string, <len> counts bytes
//! a:<n>:{<key><value>...}             ordered map
//! O:<len>:"<class>":<n>:{<key><value>...}
//! ```
//!
//! Keys are `i:` or `s:` values. Byte strings are kept as raw bytes here and
//! only decoded when converting to JSON.

use serde_json::{Map, Number, Value};

use super::error::LegacyError;

/// Maximum container nesting accepted by [`parse`]
pub const MAX_DEPTH: usize = 64;

/// Reserved JSON key carrying the class name of a serialized object
pub const CLASS_NAME_KEY: &str = "__class_name";

/// Key of an array or object entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegacyKey {
    Int(i64),
    Bytes(Vec<u8>),
}

impl LegacyKey {
    /// Key rendered as JSON object key
    pub fn to_key_string(&self) -> String {
        match self {
            LegacyKey::Int(n) => n.to_string(),
            LegacyKey::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }
}

/// A parsed legacy value
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
    /// Ordered map, entries in source order
    Array(Vec<(LegacyKey, LegacyValue)>),
    /// Serialized object with its class name and attributes
    Object {
        class: Vec<u8>,
        fields: Vec<(LegacyKey, LegacyValue)>,
    },
}

impl LegacyValue {
    /// Convert to JSON.
    ///
    /// Arrays become objects keyed by their stringified keys, objects carry
    /// [`CLASS_NAME_KEY`] first, byte strings are decoded as lossy UTF-8 and
    /// non-finite floats become `null`.
    pub fn into_json(self) -> Value {
        match self {
            LegacyValue::Null => Value::Null,
            LegacyValue::Bool(b) => Value::Bool(b),
            LegacyValue::Int(n) => Value::Number(n.into()),
            LegacyValue::Float(x) => Number::from_f64(x).map(Value::Number).unwrap_or(Value::Null),
            LegacyValue::Bytes(b) => Value::String(String::from_utf8_lossy(&b).into_owned()),
            LegacyValue::Array(entries) => Value::Object(entries_to_map(Map::new(), entries)),
            LegacyValue::Object { class, fields } => {
                let mut map = Map::new();
                map.insert(
                    CLASS_NAME_KEY.to_string(),
                    Value::String(String::from_utf8_lossy(&class).into_owned()),
                );
                Value::Object(entries_to_map(map, fields))
            }
        }
    }
}

fn entries_to_map(mut map: Map<String, Value>, entries: Vec<(LegacyKey, LegacyValue)>) -> Map<String, Value> {
    for (key, value) in entries {
        map.insert(key.to_key_string(), value.into_json());
    }
    map
}

/// Parse a complete legacy value.
///
/// Leading and trailing whitespace is ignored; anything else after the value
/// is an error.
///
/// # Examples
///
/// ```
/// use tabload::legacy::{parse, LegacyValue};
///
/// assert_eq!(parse("i:42;").unwrap(), LegacyValue::Int(42));
/// assert!(parse("i:42;junk").is_err());
/// ```
pub fn parse(input: &str) -> Result<LegacyValue, LegacyError> {
    let trimmed = input.trim();
    let mut parser = Parser {
        input: trimmed.as_bytes(),
        pos: 0,
    };
    let value = parser.parse_value(0)?;
    if parser.pos < parser.input.len() {
        return Err(LegacyError::TrailingData { offset: parser.pos });
    }
    Ok(value)
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn parse_value(&mut self, depth: usize) -> Result<LegacyValue, LegacyError> {
        let offset = self.pos;
        let tag = self.next()?;
        match tag {
            b'N' => {
                self.expect(b';')?;
                Ok(LegacyValue::Null)
            }
            b'b' => {
                self.expect(b':')?;
                let start = self.pos;
                match self.read_until(b';')? {
                    b"0" => Ok(LegacyValue::Bool(false)),
                    b"1" => Ok(LegacyValue::Bool(true)),
                    other => Err(invalid_number(other, start)),
                }
            }
            b'i' => {
                self.expect(b':')?;
                Ok(LegacyValue::Int(self.read_int(b';')?))
            }
            b'd' => {
                self.expect(b':')?;
                let start = self.pos;
                let raw = self.read_until(b';')?;
                parse_float(raw).map(LegacyValue::Float).ok_or_else(|| invalid_number(raw, start))
            }
            b's' => {
                self.expect(b':')?;
                Ok(LegacyValue::Bytes(self.read_string()?))
            }
            b'a' => {
                self.expect(b':')?;
                let entries = self.read_entries(depth)?;
                Ok(LegacyValue::Array(entries))
            }
            b'O' => {
                self.expect(b':')?;
                let class = self.read_string_body()?;
                self.expect(b':')?;
                let fields = self.read_entries(depth)?;
                Ok(LegacyValue::Object { class, fields })
            }
            other => Err(LegacyError::UnsupportedTag {
                tag: other as char,
                offset,
            }),
        }
    }

    /// `<n>:{<key><value>...}` with the leading tag and colon consumed
    fn read_entries(&mut self, depth: usize) -> Result<Vec<(LegacyKey, LegacyValue)>, LegacyError> {
        if depth + 1 > MAX_DEPTH {
            return Err(LegacyError::MaxDepthExceeded {
                depth: depth + 1,
                max: MAX_DEPTH,
            });
        }
        let count = self.read_len(b':')?;
        self.expect(b'{')?;
        // The count is untrusted; cap the up-front allocation.
        let mut entries = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let key = self.parse_key()?;
            let value = self.parse_value(depth + 1)?;
            entries.push((key, value));
        }
        self.expect(b'}')?;
        Ok(entries)
    }

    fn parse_key(&mut self) -> Result<LegacyKey, LegacyError> {
        let offset = self.pos;
        match self.next()? {
            b'i' => {
                self.expect(b':')?;
                Ok(LegacyKey::Int(self.read_int(b';')?))
            }
            b's' => {
                self.expect(b':')?;
                Ok(LegacyKey::Bytes(self.read_string()?))
            }
            other => Err(LegacyError::InvalidKey {
                tag: other as char,
                offset,
            }),
        }
    }

    /// `<len>:"<bytes>";` with the leading tag and colon consumed
    fn read_string(&mut self) -> Result<Vec<u8>, LegacyError> {
        let bytes = self.read_string_body()?;
        self.expect(b';')?;
        Ok(bytes)
    }

    /// `<len>:"<bytes>"`
    fn read_string_body(&mut self) -> Result<Vec<u8>, LegacyError> {
        let len = self.read_len(b':')?;
        self.expect(b'"')?;
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.input.len())
            .ok_or(LegacyError::UnexpectedEnd {
                offset: self.input.len(),
            })?;
        let bytes = self.input[self.pos..end].to_vec();
        self.pos = end;
        self.expect(b'"')?;
        Ok(bytes)
    }

    fn read_len(&mut self, terminator: u8) -> Result<usize, LegacyError> {
        let start = self.pos;
        let raw = self.read_until(terminator)?;
        std::str::from_utf8(raw)
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or_else(|| invalid_number(raw, start))
    }

    fn read_int(&mut self, terminator: u8) -> Result<i64, LegacyError> {
        let start = self.pos;
        let raw = self.read_until(terminator)?;
        std::str::from_utf8(raw)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| invalid_number(raw, start))
    }

    /// Bytes up to `terminator`, consuming the terminator
    fn read_until(&mut self, terminator: u8) -> Result<&'a [u8], LegacyError> {
        let rest = &self.input[self.pos..];
        let idx = rest
            .iter()
            .position(|b| *b == terminator)
            .ok_or(LegacyError::UnexpectedEnd {
                offset: self.input.len(),
            })?;
        let slice = &rest[..idx];
        self.pos += idx + 1;
        Ok(slice)
    }

    fn next(&mut self) -> Result<u8, LegacyError> {
        let byte = *self
            .input
            .get(self.pos)
            .ok_or(LegacyError::UnexpectedEnd { offset: self.pos })?;
        self.pos += 1;
        Ok(byte)
    }

    fn expect(&mut self, expected: u8) -> Result<(), LegacyError> {
        let offset = self.pos;
        let found = self.next()?;
        if found == expected {
            Ok(())
        } else {
            Err(LegacyError::UnexpectedByte {
                expected: expected as char,
                found: found as char,
                offset,
            })
        }
    }
}

fn parse_float(raw: &[u8]) -> Option<f64> {
    match raw {
        b"INF" => Some(f64::INFINITY),
        b"-INF" => Some(f64::NEG_INFINITY),
        b"NAN" => Some(f64::NAN),
        _ => std::str::from_utf8(raw).ok()?.parse::<f64>().ok(),
    }
}

fn invalid_number(raw: &[u8], offset: usize) -> LegacyError {
    LegacyError::InvalidNumber {
        text: String::from_utf8_lossy(raw).into_owned(),
        offset,
    }
}
