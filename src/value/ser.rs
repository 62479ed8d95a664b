//! Lowering of `serde::Serialize` values into [`Value`].
//!
//! Mapping:
//! - structs become named records, field order preserved
//! - unit enum variants become enum symbols
//! - `Option::None` and `()` become null, `Some(v)` becomes `v`
//! - sequences and tuples become arrays, maps become maps (string keys only)
//! - newtype structs are transparent
//!
//! Data-carrying enum variants have no schema counterpart and are rejected.

use std::collections::BTreeMap;

use serde::ser::{self, Impossible, Serialize};

use super::{Record, Value};
use crate::error::EncodingError;

/// Lower any serializable value.
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value, EncodingError> {
    value.serialize(ValueSerializer)
}

struct ValueSerializer;

fn unsupported(what: &str) -> EncodingError {
    EncodingError::Unclassifiable(format!("{what} values have no schema counterpart"))
}

impl ser::Serializer for ValueSerializer {
    type Ok = Value;
    type Error = EncodingError;
    type SerializeSeq = SeqSerializer;
    type SerializeTuple = SeqSerializer;
    type SerializeTupleStruct = SeqSerializer;
    type SerializeTupleVariant = Impossible<Value, EncodingError>;
    type SerializeMap = MapSerializer;
    type SerializeStruct = StructSerializer;
    type SerializeStructVariant = Impossible<Value, EncodingError>;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn serialize_bool(self, v: bool) -> Result<Value, EncodingError> {
        Ok(Value::Boolean(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value, EncodingError> {
        self.serialize_i32(v as i32)
    }

    fn serialize_i16(self, v: i16) -> Result<Value, EncodingError> {
        self.serialize_i32(v as i32)
    }

    fn serialize_i32(self, v: i32) -> Result<Value, EncodingError> {
        Ok(Value::Int(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Value, EncodingError> {
        Ok(Value::Long(v))
    }

    fn serialize_u8(self, v: u8) -> Result<Value, EncodingError> {
        self.serialize_i32(v as i32)
    }

    fn serialize_u16(self, v: u16) -> Result<Value, EncodingError> {
        self.serialize_i32(v as i32)
    }

    fn serialize_u32(self, v: u32) -> Result<Value, EncodingError> {
        self.serialize_i64(v as i64)
    }

    fn serialize_u64(self, v: u64) -> Result<Value, EncodingError> {
        i64::try_from(v)
            .map(Value::Long)
            .map_err(|_| EncodingError::Custom(format!("{v} does not fit in a long")))
    }

    fn serialize_f32(self, v: f32) -> Result<Value, EncodingError> {
        Ok(Value::Float(v))
    }

    fn serialize_f64(self, v: f64) -> Result<Value, EncodingError> {
        Ok(Value::Double(v))
    }

    fn serialize_char(self, v: char) -> Result<Value, EncodingError> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value, EncodingError> {
        Ok(Value::String(v.to_owned()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value, EncodingError> {
        Ok(Value::Bytes(v.to_vec()))
    }

    fn serialize_none(self) -> Result<Value, EncodingError> {
        Ok(Value::Null)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, v: &T) -> Result<Value, EncodingError> {
        v.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value, EncodingError> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, EncodingError> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value, EncodingError> {
        Ok(Value::Enum(variant.to_owned()))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Value, EncodingError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _value: &T,
    ) -> Result<Value, EncodingError> {
        Err(unsupported(&format!("enum variant {name}::{variant}")))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqSerializer, EncodingError> {
        Ok(SeqSerializer { items: Vec::with_capacity(len.unwrap_or(0)) })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqSerializer, EncodingError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SeqSerializer, EncodingError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, EncodingError> {
        Err(unsupported(&format!("enum variant {name}::{variant}")))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapSerializer, EncodingError> {
        Ok(MapSerializer { entries: BTreeMap::new(), pending_key: None })
    }

    fn serialize_struct(self, name: &'static str, len: usize) -> Result<StructSerializer, EncodingError> {
        Ok(StructSerializer {
            record: Record { name: Some(name.to_owned()), fields: Vec::with_capacity(len) },
        })
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, EncodingError> {
        Err(unsupported(&format!("enum variant {name}::{variant}")))
    }
}

struct SeqSerializer {
    items: Vec<Value>,
}

impl ser::SerializeSeq for SeqSerializer {
    type Ok = Value;
    type Error = EncodingError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodingError> {
        self.items.push(to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value, EncodingError> {
        Ok(Value::Array(self.items))
    }
}

impl ser::SerializeTuple for SeqSerializer {
    type Ok = Value;
    type Error = EncodingError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodingError> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value, EncodingError> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SeqSerializer {
    type Ok = Value;
    type Error = EncodingError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodingError> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value, EncodingError> {
        ser::SerializeSeq::end(self)
    }
}

struct MapSerializer {
    entries: BTreeMap<String, Value>,
    pending_key: Option<String>,
}

impl ser::SerializeMap for MapSerializer {
    type Ok = Value;
    type Error = EncodingError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), EncodingError> {
        match to_value(key)? {
            Value::String(k) | Value::Enum(k) => {
                self.pending_key = Some(k);
                Ok(())
            }
            other => Err(EncodingError::Unclassifiable(format!(
                "map keyed by {}: keys must be strings",
                other.kind()
            ))),
        }
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodingError> {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| EncodingError::Custom("map value without a key".into()))?;
        self.entries.insert(key, to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value, EncodingError> {
        Ok(Value::Map(self.entries))
    }
}

struct StructSerializer {
    record: Record,
}

impl ser::SerializeStruct for StructSerializer {
    type Ok = Value;
    type Error = EncodingError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T) -> Result<(), EncodingError> {
        self.record.fields.push((key.to_owned(), to_value(value)?));
        Ok(())
    }

    fn skip_field(&mut self, _key: &'static str) -> Result<(), EncodingError> {
        // Skipped fields stay absent; the encoder reports them as missing.
        Ok(())
    }

    fn end(self) -> Result<Value, EncodingError> {
        Ok(Value::Record(self.record))
    }
}
