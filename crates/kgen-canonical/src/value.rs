use base64::Engine;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::number::CanonicalNumber;

/// Map key under which byte strings are serialized. Reserved in user maps.
pub const BYTES_TAG: &str = "$bytes";

/// Normalized form of any input value.
///
/// Map entries are always sorted by the raw bytes of their keys and keys are
/// unique. List order is preserved: arrays are ordered data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CanonicalValue {
    /// Absent value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Number in canonical decimal text.
    Number(CanonicalNumber),
    /// UTF-8 string.
    String(String),
    /// Opaque byte string.
    Bytes(Vec<u8>),
    /// Ordered sequence.
    List(Vec<CanonicalValue>),
    /// Entries sorted by key bytes.
    Map(Vec<(String, CanonicalValue)>),
}

impl CanonicalValue {
    /// Builds a map from unsorted entries. Later duplicates replace earlier ones.
    pub fn map_from(entries: impl IntoIterator<Item = (String, CanonicalValue)>) -> Self {
        let mut sorted: Vec<(String, CanonicalValue)> = Vec::new();
        for (key, value) in entries {
            match sorted.binary_search_by(|(k, _)| k.as_bytes().cmp(key.as_bytes())) {
                Ok(idx) => sorted[idx].1 = value,
                Err(idx) => sorted.insert(idx, (key, value)),
            }
        }
        CanonicalValue::Map(sorted)
    }

    /// Looks up a key in a map value.
    pub fn get(&self, key: &str) -> Option<&CanonicalValue> {
        match self {
            CanonicalValue::Map(entries) => entries
                .binary_search_by(|(k, _)| k.as_bytes().cmp(key.as_bytes()))
                .ok()
                .map(|idx| &entries[idx].1),
            _ => None,
        }
    }

    /// Looks up an index in a list value.
    pub fn index(&self, idx: usize) -> Option<&CanonicalValue> {
        match self {
            CanonicalValue::List(items) => items.get(idx),
            _ => None,
        }
    }

    /// Returns the string slice if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CanonicalValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Short type name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            CanonicalValue::Null => "null",
            CanonicalValue::Bool(_) => "bool",
            CanonicalValue::Number(_) => "number",
            CanonicalValue::String(_) => "string",
            CanonicalValue::Bytes(_) => "bytes",
            CanonicalValue::List(_) => "list",
            CanonicalValue::Map(_) => "map",
        }
    }

    /// Renders the stable byte serialization of this value.
    pub fn to_canonical_bytes(&self) -> Vec<u8> {
        stable_serialize(self)
    }
}

/// Renders a canonical value to its canonical byte string.
///
/// UTF-8, no insignificant whitespace, map keys in sorted order, strings
/// JSON-escaped, numbers in canonical decimal text, byte strings as
/// `{"$bytes":"<base64url>"}`.
pub fn stable_serialize(value: &CanonicalValue) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    write_value(value, &mut out);
    out
}

fn write_value(value: &CanonicalValue, out: &mut Vec<u8>) {
    match value {
        CanonicalValue::Null => out.extend_from_slice(b"null"),
        CanonicalValue::Bool(true) => out.extend_from_slice(b"true"),
        CanonicalValue::Bool(false) => out.extend_from_slice(b"false"),
        CanonicalValue::Number(n) => out.extend_from_slice(n.as_str().as_bytes()),
        CanonicalValue::String(s) => write_string(s, out),
        CanonicalValue::Bytes(bytes) => {
            out.push(b'{');
            write_string(BYTES_TAG, out);
            out.push(b':');
            write_string(&encode_bytes(bytes), out);
            out.push(b'}');
        }
        CanonicalValue::List(items) => {
            out.push(b'[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(b',');
                }
                write_value(item, out);
            }
            out.push(b']');
        }
        CanonicalValue::Map(entries) => {
            out.push(b'{');
            for (idx, (key, item)) in entries.iter().enumerate() {
                if idx > 0 {
                    out.push(b',');
                }
                write_string(key, out);
                out.push(b':');
                write_value(item, out);
            }
            out.push(b'}');
        }
    }
}

fn write_string(s: &str, out: &mut Vec<u8>) {
    out.push(b'"');
    for ch in s.chars() {
        match ch {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            '\u{08}' => out.extend_from_slice(b"\\b"),
            '\u{0c}' => out.extend_from_slice(b"\\f"),
            c if (c as u32) < 0x20 => {
                out.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}

fn encode_bytes(bytes: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

impl Serialize for CanonicalValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CanonicalValue::Null => serializer.serialize_unit(),
            CanonicalValue::Bool(b) => serializer.serialize_bool(*b),
            CanonicalValue::Number(n) => serialize_number(n, serializer),
            CanonicalValue::String(s) => serializer.serialize_str(s),
            CanonicalValue::Bytes(bytes) => serializer.serialize_bytes(bytes),
            CanonicalValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            CanonicalValue::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, item) in entries {
                    map.serialize_entry(key, item)?;
                }
                map.end()
            }
        }
    }
}

fn serialize_number<S: Serializer>(n: &CanonicalNumber, serializer: S) -> Result<S::Ok, S::Error> {
    let text = n.as_str();
    if n.is_integer() {
        if let Ok(v) = text.parse::<i64>() {
            return serializer.serialize_i64(v);
        }
        if let Ok(v) = text.parse::<u64>() {
            return serializer.serialize_u64(v);
        }
        if let Ok(v) = text.parse::<i128>() {
            return serializer.serialize_i128(v);
        }
        if let Ok(v) = text.parse::<u128>() {
            return serializer.serialize_u128(v);
        }
    }
    match text.parse::<f64>() {
        Ok(v) => serializer.serialize_f64(v),
        Err(_) => serializer.serialize_str(text),
    }
}
