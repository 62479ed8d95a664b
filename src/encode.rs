//! Schema-directed value encoder.
//!
//! [`ValueEncoder`] walks a schema node and a [`Value`] together and emits
//! the binary encoding through [`WireWrite`].  The encoder writes straight to
//! its sink; callers that need all-or-nothing behaviour (the container
//! writer) remember the sink offset and rewind on error.

use std::borrow::Cow;
use std::io::Write;

use crate::error::{EncodingError, Result};
use crate::schema::{Names, Schema};
use crate::value::{Record, Value};
use crate::wire::WireWrite;

/// Deepest value nesting the encoder will follow.
pub const MAX_DEPTH: usize = 128;

/// A validated schema together with its named-type table.
#[derive(Debug, Clone)]
pub struct ValueEncoder {
    schema: Schema,
    names: Names,
}

impl ValueEncoder {
    pub fn new(schema: Schema) -> Result<Self, EncodingError> {
        let names = schema.validate()?;
        Ok(Self { schema, names })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Encode one value under the root schema.
    pub fn encode<W: Write + ?Sized>(&self, value: &Value, out: &mut W) -> Result<()> {
        self.write(&self.schema, value, out, 0)
    }

    /// Encode into a fresh buffer.
    pub fn to_bytes(&self, value: &Value) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode(value, &mut out)?;
        Ok(out)
    }

    fn write<W: Write + ?Sized>(&self, schema: &Schema, value: &Value, out: &mut W, depth: usize) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(EncodingError::DepthLimit(MAX_DEPTH).into());
        }
        let mismatch = || EncodingError::TypeMismatch {
            expected: schema.kind().to_owned(),
            found: value.kind(),
        };

        match (schema, value) {
            (Schema::Ref(_), _) => {
                let target = self.names.resolve(schema)?;
                self.write(target, value, out, depth)?;
            }
            (Schema::Null, Value::Null) => out.write_null()?,
            (Schema::Boolean, Value::Boolean(b)) => out.write_boolean(*b)?,
            (Schema::Int, Value::Int(n)) => out.write_int(*n)?,
            (Schema::Long, Value::Int(n)) => out.write_long(*n as i64)?,
            (Schema::Long, Value::Long(n)) => out.write_long(*n)?,
            (Schema::Float, v) => out.write_float(as_f32(v).ok_or_else(mismatch)?)?,
            (Schema::Double, Value::Double(d)) => out.write_double(*d)?,
            (Schema::Double, v) => out.write_double(as_f64(v).ok_or_else(mismatch)?)?,
            (Schema::String, Value::String(s)) => out.write_string(s)?,
            (Schema::Bytes, v) => out.write_bytes(&byte_view(v).ok_or_else(mismatch)?)?,
            (Schema::Fixed(fixed), v) => {
                let bytes = byte_view(v).ok_or_else(mismatch)?;
                if bytes.len() != fixed.size {
                    return Err(EncodingError::FixedLength {
                        name: fixed.name.clone(),
                        expected: fixed.size,
                        actual: bytes.len(),
                    }
                    .into());
                }
                out.write_fixed(&bytes)?;
            }
            (Schema::Enum(e), Value::Enum(symbol)) => {
                let index = e.symbols.iter().position(|s| s == symbol).ok_or_else(|| {
                    EncodingError::UnknownSymbol { name: e.name.clone(), symbol: symbol.clone() }
                })?;
                out.write_long(index as i64)?;
            }
            (Schema::Record(r), Value::Record(record)) => {
                for field in &r.fields {
                    let v = record.get(&field.name).ok_or_else(|| EncodingError::MissingField {
                        record: r.name.clone(),
                        field: field.name.clone(),
                    })?;
                    self.write(&field.schema, v, out, depth + 1)?;
                }
            }
            (Schema::Array(items), Value::Array(values)) => {
                if !values.is_empty() {
                    out.write_long(values.len() as i64)?;
                    for v in values {
                        self.write(items, v, out, depth + 1)?;
                    }
                }
                out.write_long(0)?;
            }
            (Schema::Map(values_schema), Value::Map(entries)) => {
                if !entries.is_empty() {
                    out.write_long(entries.len() as i64)?;
                    for (k, v) in entries {
                        out.write_string(k)?;
                        self.write(values_schema, v, out, depth + 1)?;
                    }
                }
                out.write_long(0)?;
            }
            (Schema::Union(branches), v) => {
                // An int array only stands in for bytes when no array branch
                // could take it as is.
                let byte_arrays = !branches
                    .iter()
                    .any(|b| matches!(self.names.resolve(b), Ok(Schema::Array(_))));
                // Declaration order decides, not the closest fit.
                let index = branches
                    .iter()
                    .position(|b| self.matches(b, v, byte_arrays))
                    .ok_or(EncodingError::NoUnionBranch { found: v.kind() })?;
                out.write_long(index as i64)?;
                self.write(&branches[index], v, out, depth)?;
            }
            _ => return Err(mismatch().into()),
        }
        Ok(())
    }

    /// Whether `value` has the shape `schema` describes, for union dispatch.
    fn matches(&self, schema: &Schema, value: &Value, byte_arrays: bool) -> bool {
        match (schema, value) {
            (Schema::Ref(_), _) => match self.names.resolve(schema) {
                Ok(target) => self.matches(target, value, byte_arrays),
                Err(_) => false,
            },
            (Schema::Null, Value::Null)
            | (Schema::Boolean, Value::Boolean(_))
            | (Schema::Int, Value::Int(_))
            | (Schema::Long, Value::Int(_) | Value::Long(_))
            | (Schema::String, Value::String(_))
            | (Schema::Array(_), Value::Array(_))
            | (Schema::Map(_), Value::Map(_)) => true,
            (Schema::Float, v) => as_f32(v).is_some(),
            (Schema::Double, v) => as_f64(v).is_some(),
            (Schema::Bytes | Schema::Fixed(_), Value::Array(_)) if !byte_arrays => false,
            (Schema::Bytes, v) => byte_view(v).is_some(),
            (Schema::Fixed(f), v) => byte_view(v).is_some_and(|b| b.len() == f.size),
            (Schema::Enum(e), Value::Enum(symbol)) => e.symbols.contains(symbol),
            (Schema::Record(r), Value::Record(record)) => {
                names_agree(&r.name, record) && r.fields.iter().all(|f| record.get(&f.name).is_some())
            }
            _ => false,
        }
    }
}

/// Widening to `float`; a double never narrows.
fn as_f32(value: &Value) -> Option<f32> {
    match value {
        Value::Int(n) => Some(*n as f32),
        Value::Long(n) => Some(*n as f32),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(*n as f64),
        Value::Long(n) => Some(*n as f64),
        Value::Float(f) => Some(*f as f64),
        Value::Double(d) => Some(*d),
        _ => None,
    }
}

/// Raw bytes of a blob value.  A byte array that serde lowered into a
/// sequence of small ints is accepted as well.
fn byte_view(value: &Value) -> Option<Cow<'_, [u8]>> {
    match value {
        Value::Bytes(b) | Value::Fixed(b) => Some(Cow::Borrowed(b)),
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::Int(n) => u8::try_from(*n).ok(),
                _ => None,
            })
            .collect::<Option<Vec<u8>>>()
            .map(Cow::Owned),
        _ => None,
    }
}

/// An unnamed record value matches any record; a named one only a record
/// with the same full or short name.
fn names_agree(schema_name: &str, record: &Record) -> bool {
    match &record.name {
        None => true,
        Some(name) => {
            let short = schema_name.rsplit('.').next().unwrap_or(schema_name);
            name == schema_name || name == short
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EnumSchema, Field, FixedSchema, RecordSchema};
    use std::collections::BTreeMap;

    fn encode(schema: Schema, value: Value) -> Result<Vec<u8>> {
        ValueEncoder::new(schema)?.to_bytes(&value)
    }

    fn nullable_int() -> Schema {
        Schema::Union(vec![Schema::Null, Schema::Int])
    }

    #[test]
    fn union_branch_index_follows_declaration_order() {
        assert_eq!(encode(nullable_int(), Value::Null).unwrap(), [0x00]);
        assert_eq!(encode(nullable_int(), Value::Int(5)).unwrap(), [0x02, 0x0a]);

        // An int also fits `long`; the earlier branch wins.
        let wide_first = Schema::Union(vec![Schema::Long, Schema::Int]);
        assert_eq!(encode(wide_first, Value::Int(1)).unwrap(), [0x00, 0x02]);

        let err = encode(nullable_int(), Value::String("x".into())).unwrap_err();
        assert!(matches!(err, crate::Error::Encoding(EncodingError::NoUnionBranch { found: "string" })));
    }

    #[test]
    fn double_never_lands_in_float_branch() {
        let numbers = Schema::Union(vec![Schema::Null, Schema::Float, Schema::Double]);
        let mut expected = vec![0x04];
        expected.extend_from_slice(&0.1f64.to_le_bytes());
        assert_eq!(encode(numbers.clone(), Value::Double(0.1)).unwrap(), expected);

        let mut expected = vec![0x02];
        expected.extend_from_slice(&0.1f32.to_le_bytes());
        assert_eq!(encode(numbers, Value::Float(0.1)).unwrap(), expected);

        let float_only = Schema::Union(vec![Schema::Null, Schema::Float]);
        assert!(matches!(
            encode(float_only, Value::Double(0.1)),
            Err(crate::Error::Encoding(EncodingError::NoUnionBranch { found: "double" }))
        ));
    }

    #[test]
    fn arrays_prefer_array_branch_over_bytes() {
        let blob_or_list = Schema::Union(vec![Schema::Bytes, Schema::Array(Box::new(Schema::String))]);
        assert_eq!(encode(blob_or_list.clone(), Value::Array(vec![])).unwrap(), [0x02, 0x00]);
        assert_eq!(encode(blob_or_list.clone(), Value::Bytes(vec![9])).unwrap(), [0x00, 0x02, 0x09]);
        // The array branch is chosen, and its string items reject the int.
        assert!(encode(blob_or_list, Value::Array(vec![Value::Int(1)])).is_err());

        // Without an array branch the lowered form of `[u8; N]` still selects fixed.
        let id = Schema::Fixed(FixedSchema { name: "Id".into(), size: 2 });
        let maybe_id = Schema::Union(vec![Schema::Null, id]);
        let lowered = Value::Array(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(encode(maybe_id, lowered).unwrap(), [0x02, 1, 2]);
    }

    #[test]
    fn record_fields_in_declared_order() {
        let schema = Schema::Record(RecordSchema {
            name: "Pair".into(),
            fields: vec![
                Field { name: "a".into(), schema: Schema::Long },
                Field { name: "b".into(), schema: Schema::String },
            ],
        });
        // Value order does not matter, schema order does.
        let value = Record::new().with("b", "hi").with("a", 1i64);
        assert_eq!(encode(schema.clone(), value.into()).unwrap(), [0x02, 0x04, b'h', b'i']);

        let missing = Record::new().with("a", 1i64);
        let err = encode(schema, missing.into()).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Encoding(EncodingError::MissingField { ref field, .. }) if field == "b"
        ));
    }

    #[test]
    fn collections_end_with_zero_block() {
        let ints = Schema::Array(Box::new(Schema::Int));
        assert_eq!(encode(ints.clone(), Value::Array(vec![])).unwrap(), [0x00]);
        assert_eq!(
            encode(ints, Value::Array(vec![Value::Int(1), Value::Int(-1)])).unwrap(),
            [0x04, 0x02, 0x01, 0x00]
        );

        let map = Schema::Map(Box::new(Schema::Boolean));
        let value = Value::Map(BTreeMap::from([("k".to_string(), Value::Boolean(true))]));
        assert_eq!(encode(map, value).unwrap(), [0x02, 0x02, b'k', 0x01, 0x00]);
    }

    #[test]
    fn enums_and_fixed() {
        let suit = Schema::Enum(EnumSchema {
            name: "Suit".into(),
            symbols: vec!["HEARTS".into(), "SPADES".into()],
        });
        assert_eq!(encode(suit.clone(), Value::Enum("SPADES".into())).unwrap(), [0x02]);
        assert!(matches!(
            encode(suit, Value::Enum("CLUBS".into())),
            Err(crate::Error::Encoding(EncodingError::UnknownSymbol { .. }))
        ));

        let id = Schema::Fixed(FixedSchema { name: "Id".into(), size: 2 });
        assert_eq!(encode(id.clone(), Value::Fixed(vec![7, 8])).unwrap(), [7, 8]);
        assert_eq!(encode(id.clone(), Value::Array(vec![Value::Int(7), Value::Int(8)])).unwrap(), [7, 8]);
        assert!(matches!(
            encode(id, Value::Fixed(vec![1, 2, 3])),
            Err(crate::Error::Encoding(EncodingError::FixedLength { expected: 2, actual: 3, .. }))
        ));
    }

    #[test]
    fn numeric_promotions() {
        assert_eq!(encode(Schema::Long, Value::Int(-3)).unwrap(), [0x05]);
        assert_eq!(encode(Schema::Double, Value::Int(2)).unwrap(), 2.0f64.to_le_bytes());
        assert_eq!(encode(Schema::Float, Value::Long(4)).unwrap(), 4.0f32.to_le_bytes());
        assert!(matches!(
            encode(Schema::Float, Value::Double(0.5)),
            Err(crate::Error::Encoding(EncodingError::TypeMismatch { found: "double", .. }))
        ));
        assert!(encode(Schema::Int, Value::Long(1)).is_err());
    }

    #[test]
    fn recursive_schema_and_depth_limit() {
        let list = Schema::Record(RecordSchema {
            name: "List".into(),
            fields: vec![
                Field { name: "head".into(), schema: Schema::Int },
                Field {
                    name: "tail".into(),
                    schema: Schema::Union(vec![Schema::Null, Schema::Ref("List".into())]),
                },
            ],
        });
        let enc = ValueEncoder::new(list).unwrap();

        let cons = |head: i32, tail: Value| Value::Record(Record::new().with("head", head).with("tail", tail));
        let short = cons(1, cons(2, Value::Null));
        assert_eq!(enc.to_bytes(&short).unwrap(), [0x02, 0x02, 0x04, 0x00]);

        let mut deep = Value::Null;
        for i in 0..(MAX_DEPTH as i32 + 2) {
            deep = cons(i, deep);
        }
        assert!(enc.to_bytes(&deep).is_err());
    }
}
