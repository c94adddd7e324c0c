//! serde `Serializer` that produces [`CanonicalValue`] trees.

use serde::ser::{self, Impossible, Serialize};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;

use crate::canonicalizer::{CanonicalizationError, Path, MAX_DEPTH};
use crate::number::CanonicalNumber;
use crate::value::{CanonicalValue, BYTES_TAG};

/// Error raised inside the serializer.
///
/// `Custom` comes from a `Serialize` impl refusing to serialize itself and
/// does not know its path yet; the caller attaches it.
#[derive(Debug)]
pub(crate) enum SerError {
    Canonical(CanonicalizationError),
    Custom(String),
}

impl SerError {
    pub(crate) fn at(self, path: &Path) -> CanonicalizationError {
        match self {
            SerError::Canonical(err) => err,
            SerError::Custom(reason) => CanonicalizationError::UnsupportedType {
                path: path.to_string(),
                reason,
            },
        }
    }
}

impl fmt::Display for SerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerError::Canonical(err) => write!(f, "{}", err),
            SerError::Custom(reason) => f.write_str(reason),
        }
    }
}

impl std::error::Error for SerError {}

impl ser::Error for SerError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        SerError::Custom(msg.to_string())
    }
}

fn unsupported(path: &Path, reason: impl Into<String>) -> SerError {
    SerError::Canonical(CanonicalizationError::UnsupportedType {
        path: path.to_string(),
        reason: reason.into(),
    })
}

/// Shared state of one canonicalization run.
pub(crate) struct Context<'a> {
    ignored: &'a BTreeSet<String>,
    stripped: RefCell<Vec<String>>,
}

impl<'a> Context<'a> {
    pub(crate) fn new(ignored: &'a BTreeSet<String>) -> Self {
        Self {
            ignored,
            stripped: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn into_stripped(self) -> Vec<String> {
        self.stripped.into_inner()
    }

    fn strips(&self, key: &str, path: &Path) -> bool {
        if self.ignored.contains(key) {
            self.stripped.borrow_mut().push(path.to_string());
            true
        } else {
            false
        }
    }
}

pub(crate) struct ValueSerializer<'a> {
    ctx: &'a Context<'a>,
    path: Path,
    depth: usize,
}

impl<'a> ValueSerializer<'a> {
    pub(crate) fn new(ctx: &'a Context<'a>, path: Path, depth: usize) -> Self {
        Self { ctx, path, depth }
    }

    fn child(&self, path: Path) -> Result<ValueSerializer<'a>, SerError> {
        let depth = self.depth + 1;
        if depth > MAX_DEPTH {
            return Err(SerError::Canonical(CanonicalizationError::CyclicInput {
                path: path.to_string(),
                limit: MAX_DEPTH,
            }));
        }
        Ok(ValueSerializer::new(self.ctx, path, depth))
    }

    fn nested<T: Serialize + ?Sized>(&self, path: Path, value: &T) -> Result<CanonicalValue, SerError> {
        let child = self.child(path.clone())?;
        value
            .serialize(child)
            .map_err(|err| SerError::Canonical(err.at(&path)))
    }

    fn float(&self, value: f64) -> Result<CanonicalValue, SerError> {
        CanonicalNumber::from_f64(value)
            .map(CanonicalValue::Number)
            .ok_or_else(|| unsupported(&self.path, format!("non-finite number {}", value)))
    }

    fn seq(self, variant: Option<&'static str>, len: Option<usize>) -> SeqBuilder<'a> {
        SeqBuilder {
            items: Vec::with_capacity(len.unwrap_or(0)),
            ser: self,
            variant,
        }
    }

    fn map(self, variant: Option<&'static str>) -> MapBuilder<'a> {
        MapBuilder {
            ser: self,
            entries: Vec::new(),
            pending_key: None,
            skip_value: false,
            variant,
        }
    }
}

fn wrap_variant(variant: Option<&'static str>, value: CanonicalValue) -> CanonicalValue {
    match variant {
        Some(name) => CanonicalValue::Map(vec![(name.to_string(), value)]),
        None => value,
    }
}

impl<'a> ser::Serializer for ValueSerializer<'a> {
    type Ok = CanonicalValue;
    type Error = SerError;
    type SerializeSeq = SeqBuilder<'a>;
    type SerializeTuple = SeqBuilder<'a>;
    type SerializeTupleStruct = SeqBuilder<'a>;
    type SerializeTupleVariant = SeqBuilder<'a>;
    type SerializeMap = MapBuilder<'a>;
    type SerializeStruct = MapBuilder<'a>;
    type SerializeStructVariant = MapBuilder<'a>;

    fn serialize_bool(self, v: bool) -> Result<CanonicalValue, SerError> {
        Ok(CanonicalValue::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<CanonicalValue, SerError> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<CanonicalValue, SerError> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<CanonicalValue, SerError> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<CanonicalValue, SerError> {
        Ok(CanonicalValue::Number(CanonicalNumber::from_i64(v)))
    }

    fn serialize_i128(self, v: i128) -> Result<CanonicalValue, SerError> {
        Ok(CanonicalValue::Number(CanonicalNumber::from_i128(v)))
    }

    fn serialize_u8(self, v: u8) -> Result<CanonicalValue, SerError> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<CanonicalValue, SerError> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<CanonicalValue, SerError> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<CanonicalValue, SerError> {
        Ok(CanonicalValue::Number(CanonicalNumber::from_u64(v)))
    }

    fn serialize_u128(self, v: u128) -> Result<CanonicalValue, SerError> {
        Ok(CanonicalValue::Number(CanonicalNumber::from_u128(v)))
    }

    fn serialize_f32(self, v: f32) -> Result<CanonicalValue, SerError> {
        // Widening through the shortest f32 text keeps 0.1f32 as "0.1".
        let widened = v.to_string().parse::<f64>().unwrap_or(f64::from(v));
        self.float(widened)
    }

    fn serialize_f64(self, v: f64) -> Result<CanonicalValue, SerError> {
        self.float(v)
    }

    fn serialize_char(self, v: char) -> Result<CanonicalValue, SerError> {
        Ok(CanonicalValue::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<CanonicalValue, SerError> {
        Ok(CanonicalValue::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<CanonicalValue, SerError> {
        Ok(CanonicalValue::Bytes(v.to_vec()))
    }

    fn serialize_none(self) -> Result<CanonicalValue, SerError> {
        Ok(CanonicalValue::Null)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<CanonicalValue, SerError> {
        self.nested(self.path.clone(), value)
    }

    fn serialize_unit(self) -> Result<CanonicalValue, SerError> {
        Ok(CanonicalValue::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<CanonicalValue, SerError> {
        Ok(CanonicalValue::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<CanonicalValue, SerError> {
        Ok(CanonicalValue::String(variant.to_string()))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<CanonicalValue, SerError> {
        self.nested(self.path.clone(), value)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<CanonicalValue, SerError> {
        let inner = self.nested(self.path.push_field(variant), value)?;
        Ok(wrap_variant(Some(variant), inner))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqBuilder<'a>, SerError> {
        Ok(self.seq(None, len))
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqBuilder<'a>, SerError> {
        Ok(self.seq(None, Some(len)))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqBuilder<'a>, SerError> {
        Ok(self.seq(None, Some(len)))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SeqBuilder<'a>, SerError> {
        Ok(self.seq(Some(variant), Some(len)))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapBuilder<'a>, SerError> {
        Ok(self.map(None))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<MapBuilder<'a>, SerError> {
        Ok(self.map(None))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<MapBuilder<'a>, SerError> {
        Ok(self.map(Some(variant)))
    }
}

pub(crate) struct SeqBuilder<'a> {
    ser: ValueSerializer<'a>,
    items: Vec<CanonicalValue>,
    variant: Option<&'static str>,
}

impl<'a> SeqBuilder<'a> {
    fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), SerError> {
        let path = self.ser.path.push_index(self.items.len());
        let item = self.ser.nested(path, value)?;
        self.items.push(item);
        Ok(())
    }

    fn finish(self) -> CanonicalValue {
        wrap_variant(self.variant, CanonicalValue::List(self.items))
    }
}

impl<'a> ser::SerializeSeq for SeqBuilder<'a> {
    type Ok = CanonicalValue;
    type Error = SerError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), SerError> {
        self.push(value)
    }

    fn end(self) -> Result<CanonicalValue, SerError> {
        Ok(self.finish())
    }
}

impl<'a> ser::SerializeTuple for SeqBuilder<'a> {
    type Ok = CanonicalValue;
    type Error = SerError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), SerError> {
        self.push(value)
    }

    fn end(self) -> Result<CanonicalValue, SerError> {
        Ok(self.finish())
    }
}

impl<'a> ser::SerializeTupleStruct for SeqBuilder<'a> {
    type Ok = CanonicalValue;
    type Error = SerError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), SerError> {
        self.push(value)
    }

    fn end(self) -> Result<CanonicalValue, SerError> {
        Ok(self.finish())
    }
}

impl<'a> ser::SerializeTupleVariant for SeqBuilder<'a> {
    type Ok = CanonicalValue;
    type Error = SerError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), SerError> {
        self.push(value)
    }

    fn end(self) -> Result<CanonicalValue, SerError> {
        Ok(self.finish())
    }
}

pub(crate) struct MapBuilder<'a> {
    ser: ValueSerializer<'a>,
    entries: Vec<(String, CanonicalValue)>,
    pending_key: Option<String>,
    skip_value: bool,
    variant: Option<&'static str>,
}

impl<'a> MapBuilder<'a> {
    /// Returns `false` when the key is ignored and its value must be skipped.
    fn accept_key(&mut self, key: String) -> Result<bool, SerError> {
        let path = self.ser.path.push_field(&key);
        if key == BYTES_TAG {
            return Err(unsupported(&path, format!("reserved key '{}'", BYTES_TAG)));
        }
        if self.ser.ctx.strips(&key, &path) {
            return Ok(false);
        }
        self.pending_key = Some(key);
        Ok(true)
    }

    fn accept_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), SerError> {
        let key = match self.pending_key.take() {
            Some(key) => key,
            None => return Err(unsupported(&self.ser.path, "map value without key")),
        };
        let item = self.ser.nested(self.ser.path.push_field(&key), value)?;
        self.entries.push((key, item));
        Ok(())
    }

    fn field<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), SerError> {
        if self.accept_key(key.to_string())? {
            self.accept_value(value)?;
        }
        Ok(())
    }

    fn finish(self) -> Result<CanonicalValue, SerError> {
        let mut entries = self.entries;
        entries.sort_by(|(a, _), (b, _)| a.as_bytes().cmp(b.as_bytes()));
        if let Some(pair) = entries.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(SerError::Canonical(CanonicalizationError::DuplicateKey(
                self.ser.path.push_field(&pair[0].0).to_string(),
            )));
        }
        Ok(wrap_variant(self.variant, CanonicalValue::Map(entries)))
    }
}

impl<'a> ser::SerializeMap for MapBuilder<'a> {
    type Ok = CanonicalValue;
    type Error = SerError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), SerError> {
        let key = key.serialize(KeySerializer { path: &self.ser.path })?;
        self.skip_value = !self.accept_key(key)?;
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), SerError> {
        if std::mem::take(&mut self.skip_value) {
            return Ok(());
        }
        self.accept_value(value)
    }

    fn end(self) -> Result<CanonicalValue, SerError> {
        self.finish()
    }
}

impl<'a> ser::SerializeStruct for MapBuilder<'a> {
    type Ok = CanonicalValue;
    type Error = SerError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), SerError> {
        self.field(key, value)
    }

    fn end(self) -> Result<CanonicalValue, SerError> {
        self.finish()
    }
}

impl<'a> ser::SerializeStructVariant for MapBuilder<'a> {
    type Ok = CanonicalValue;
    type Error = SerError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), SerError> {
        self.field(key, value)
    }

    fn end(self) -> Result<CanonicalValue, SerError> {
        self.finish()
    }
}

/// Map keys must become strings; integers use their decimal text.
struct KeySerializer<'p> {
    path: &'p Path,
}

impl<'p> KeySerializer<'p> {
    fn reject(&self, kind: &str) -> SerError {
        unsupported(self.path, format!("map key of type {}", kind))
    }
}

impl<'p> ser::Serializer for KeySerializer<'p> {
    type Ok = String;
    type Error = SerError;
    type SerializeSeq = Impossible<String, SerError>;
    type SerializeTuple = Impossible<String, SerError>;
    type SerializeTupleStruct = Impossible<String, SerError>;
    type SerializeTupleVariant = Impossible<String, SerError>;
    type SerializeMap = Impossible<String, SerError>;
    type SerializeStruct = Impossible<String, SerError>;
    type SerializeStructVariant = Impossible<String, SerError>;

    fn serialize_bool(self, _v: bool) -> Result<String, SerError> {
        Err(self.reject("bool"))
    }

    fn serialize_i8(self, v: i8) -> Result<String, SerError> {
        Ok(v.to_string())
    }

    fn serialize_i16(self, v: i16) -> Result<String, SerError> {
        Ok(v.to_string())
    }

    fn serialize_i32(self, v: i32) -> Result<String, SerError> {
        Ok(v.to_string())
    }

    fn serialize_i64(self, v: i64) -> Result<String, SerError> {
        Ok(v.to_string())
    }

    fn serialize_i128(self, v: i128) -> Result<String, SerError> {
        Ok(v.to_string())
    }

    fn serialize_u8(self, v: u8) -> Result<String, SerError> {
        Ok(v.to_string())
    }

    fn serialize_u16(self, v: u16) -> Result<String, SerError> {
        Ok(v.to_string())
    }

    fn serialize_u32(self, v: u32) -> Result<String, SerError> {
        Ok(v.to_string())
    }

    fn serialize_u64(self, v: u64) -> Result<String, SerError> {
        Ok(v.to_string())
    }

    fn serialize_u128(self, v: u128) -> Result<String, SerError> {
        Ok(v.to_string())
    }

    fn serialize_f32(self, _v: f32) -> Result<String, SerError> {
        Err(self.reject("float"))
    }

    fn serialize_f64(self, _v: f64) -> Result<String, SerError> {
        Err(self.reject("float"))
    }

    fn serialize_char(self, v: char) -> Result<String, SerError> {
        Ok(v.to_string())
    }

    fn serialize_str(self, v: &str) -> Result<String, SerError> {
        Ok(v.to_string())
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<String, SerError> {
        Err(self.reject("bytes"))
    }

    fn serialize_none(self) -> Result<String, SerError> {
        Err(self.reject("none"))
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<String, SerError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<String, SerError> {
        Err(self.reject("unit"))
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<String, SerError> {
        Err(self.reject(name))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<String, SerError> {
        Ok(variant.to_string())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<String, SerError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        name: &'static str,
        _index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<String, SerError> {
        Err(self.reject(name))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, SerError> {
        Err(self.reject("sequence"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, SerError> {
        Err(self.reject("tuple"))
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, SerError> {
        Err(self.reject(name))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, SerError> {
        Err(self.reject(name))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, SerError> {
        Err(self.reject("map"))
    }

    fn serialize_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, SerError> {
        Err(self.reject(name))
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, SerError> {
        Err(self.reject(name))
    }
}
