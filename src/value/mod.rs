//! Runtime value model.
//!
//! A [`Value`] is the dynamically typed form of an application value, the
//! thing the encoder walks alongside a [`Schema`](crate::schema::Schema).
//! Any `serde::Serialize` type can be lowered into one with [`to_value`].

mod ser;

pub use ser::to_value;

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bytes(Vec<u8>),
    String(String),
    Record(Record),
    /// An enum symbol.
    Enum(String),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Fixed(Vec<u8>),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Bytes(_) => "bytes",
            Value::String(_) => "string",
            Value::Record(_) => "record",
            Value::Enum(_) => "enum",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Fixed(_) => "fixed",
        }
    }
}

/// Ordered field list, optionally tagged with the record's type name.
///
/// The name only matters when a union has several record branches: a named
/// value never matches a branch with a different name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub name: Option<String>,
    pub fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), fields: Vec::new() }
    }

    /// Builder form of [`Record::put`].
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.put(field, value);
        self
    }

    /// Set a field, replacing any previous value under the same name.
    pub fn put(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((field, value)),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.iter().find(|(name, _)| name == field).map(|(_, v)| v)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

macro_rules! value_from {
    ($variant:ident: $($ty:ty),+) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v.into())
            }
        })+
    };
}

value_from!(Boolean: bool);
value_from!(Int: i8, i16, i32, u8, u16);
value_from!(Long: i64, u32);
value_from!(Float: f32);
value_from!(Double: f64);
value_from!(Bytes: Vec<u8>, &[u8]);
value_from!(String: String, &str);

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl FromIterator<Value> for Value {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Value::Array(iter.into_iter().collect())
    }
}
