//! Schema generation from Rust type shapes.
//!
//! Each application type describes itself once through [`HasSchema`]; the
//! [`SchemaGenerator`] walks those descriptions depth-first.  Every record
//! field is required: optionality exists only where the type says so, as an
//! `Option<T>` that becomes the union `["null", T]`.
//!
//! ```
//! use avrow::schema::{HasSchema, Schema, SchemaGenerator};
//! use avrow::EncodingError;
//!
//! struct Node { value: i64, children: Vec<Node> }
//!
//! impl HasSchema for Node {
//!     fn describe(gen: &mut SchemaGenerator) -> Result<Schema, EncodingError> {
//!         gen.record("Node", |r| {
//!             r.field::<i64>("value")?.field::<Vec<Node>>("children")?;
//!             Ok(())
//!         })
//!     }
//! }
//!
//! let schema = SchemaGenerator::generate::<Node>()?;
//! assert_eq!(
//!     schema.canonical_json(),
//!     r#"{"type":"record","name":"Node","fields":[{"name":"value","type":"long"},{"name":"children","type":{"type":"array","items":"Node"}}]}"#,
//! );
//! # Ok::<(), EncodingError>(())
//! ```

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::sync::Arc;

use super::{validate_name, validate_symbols, EnumSchema, Field, FixedSchema, RecordSchema, Schema};
use crate::error::EncodingError;

/// A type whose shape can be described as a schema.
pub trait HasSchema {
    fn describe(gen: &mut SchemaGenerator) -> Result<Schema, EncodingError>;
}

/// Tracks named types across one generation pass.
#[derive(Debug, Default)]
pub struct SchemaGenerator {
    /// Names already defined or currently being expanded.
    known: HashSet<String>,
}

impl SchemaGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate and validate the schema of `T` in a fresh pass.
    pub fn generate<T: HasSchema + ?Sized>() -> Result<Schema, EncodingError> {
        let schema = Self::new().schema_of::<T>()?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn schema_of<T: HasSchema + ?Sized>(&mut self) -> Result<Schema, EncodingError> {
        T::describe(self)
    }

    /// Returns a reference when `name` was seen before in this pass.
    fn seen(&mut self, name: &str) -> Result<Option<Schema>, EncodingError> {
        validate_name(name)?;
        if self.known.contains(name) {
            return Ok(Some(Schema::Ref(name.to_owned())));
        }
        self.known.insert(name.to_owned());
        Ok(None)
    }

    /// Describe a record.  `build` declares its fields in order.
    ///
    /// The name is registered before `build` runs, so a field of the record's
    /// own type (directly or through any nesting) becomes a reference.
    pub fn record<F>(&mut self, name: &str, build: F) -> Result<Schema, EncodingError>
    where
        F: FnOnce(&mut RecordBuilder<'_>) -> Result<(), EncodingError>,
    {
        if let Some(reference) = self.seen(name)? {
            return Ok(reference);
        }
        let mut builder = RecordBuilder { gen: self, record: name, fields: Vec::new() };
        build(&mut builder)?;
        let fields = builder.fields;
        Ok(Schema::Record(RecordSchema { name: name.to_owned(), fields }))
    }

    pub fn enumeration(&mut self, name: &str, symbols: &[&str]) -> Result<Schema, EncodingError> {
        if let Some(reference) = self.seen(name)? {
            return Ok(reference);
        }
        let symbols: Vec<String> = symbols.iter().map(|s| s.to_string()).collect();
        validate_symbols(name, &symbols)?;
        Ok(Schema::Enum(EnumSchema { name: name.to_owned(), symbols }))
    }

    pub fn fixed(&mut self, name: &str, size: usize) -> Result<Schema, EncodingError> {
        if let Some(reference) = self.seen(name)? {
            return Ok(reference);
        }
        Ok(Schema::Fixed(FixedSchema { name: name.to_owned(), size }))
    }
}

/// Collects the fields of one record.
pub struct RecordBuilder<'g> {
    gen: &'g mut SchemaGenerator,
    record: &'g str,
    fields: Vec<Field>,
}

impl<'g> RecordBuilder<'g> {
    /// Append a required field whose shape is `T`.
    pub fn field<T: HasSchema + ?Sized>(&mut self, name: &str) -> Result<&mut Self, EncodingError> {
        let schema = self.gen.schema_of::<T>()?;
        self.field_with(name, schema)
    }

    /// Append a required field with an explicitly built schema.
    pub fn field_with(&mut self, name: &str, schema: Schema) -> Result<&mut Self, EncodingError> {
        if name.contains('.') || validate_name(name).is_err() {
            return Err(EncodingError::Unclassifiable(format!(
                "field `{name}` of `{}`: not a valid field name",
                self.record
            )));
        }
        if self.fields.iter().any(|f| f.name == name) {
            return Err(EncodingError::Unclassifiable(format!(
                "field `{name}` of `{}`: declared twice",
                self.record
            )));
        }
        self.fields.push(Field { name: name.to_owned(), schema });
        Ok(self)
    }

    /// The generator, for building nested schemas by hand.
    pub fn generator(&mut self) -> &mut SchemaGenerator {
        &mut *self.gen
    }
}

// ── Built-in shapes ──────────────────────────────────────────────────────────

macro_rules! primitive_shape {
    ($schema:ident: $($ty:ty),+) => {
        $(impl HasSchema for $ty {
            fn describe(_: &mut SchemaGenerator) -> Result<Schema, EncodingError> {
                Ok(Schema::$schema)
            }
        })+
    };
}

primitive_shape!(Null: ());
primitive_shape!(Boolean: bool);
primitive_shape!(Int: i8, i16, i32, u8, u16);
primitive_shape!(Long: i64, u32, u64, isize, usize);
primitive_shape!(Float: f32);
primitive_shape!(Double: f64);
primitive_shape!(String: String, str, char);
primitive_shape!(Bytes: serde_bytes::ByteBuf, serde_bytes::Bytes);

impl<T: HasSchema> HasSchema for Option<T> {
    fn describe(gen: &mut SchemaGenerator) -> Result<Schema, EncodingError> {
        match gen.schema_of::<T>()? {
            Schema::Union(branches) if branches.contains(&Schema::Null) => Ok(Schema::Union(branches)),
            Schema::Union(mut branches) => {
                branches.insert(0, Schema::Null);
                Ok(Schema::Union(branches))
            }
            inner => Ok(Schema::Union(vec![Schema::Null, inner])),
        }
    }
}

macro_rules! sequence_shape {
    ($($ty:ty),+) => {
        $(impl<T: HasSchema> HasSchema for $ty {
            fn describe(gen: &mut SchemaGenerator) -> Result<Schema, EncodingError> {
                Ok(Schema::Array(Box::new(gen.schema_of::<T>()?)))
            }
        })+
    };
}

sequence_shape!(Vec<T>, [T], VecDeque<T>);

fn map_shape<K: HasSchema, V: HasSchema>(gen: &mut SchemaGenerator) -> Result<Schema, EncodingError> {
    match gen.schema_of::<K>()? {
        Schema::String => Ok(Schema::Map(Box::new(gen.schema_of::<V>()?))),
        other => Err(EncodingError::Unclassifiable(format!(
            "map keyed by {}: keys must be strings",
            other.kind()
        ))),
    }
}

impl<K: HasSchema, V: HasSchema, S> HasSchema for HashMap<K, V, S> {
    fn describe(gen: &mut SchemaGenerator) -> Result<Schema, EncodingError> {
        map_shape::<K, V>(gen)
    }
}

impl<K: HasSchema, V: HasSchema> HasSchema for BTreeMap<K, V> {
    fn describe(gen: &mut SchemaGenerator) -> Result<Schema, EncodingError> {
        map_shape::<K, V>(gen)
    }
}

impl<const N: usize> HasSchema for [u8; N] {
    fn describe(gen: &mut SchemaGenerator) -> Result<Schema, EncodingError> {
        gen.fixed(&format!("fixed_{N}"), N)
    }
}

macro_rules! transparent_shape {
    ($($ty:ty),+) => {
        $(impl<T: HasSchema + ?Sized> HasSchema for $ty {
            fn describe(gen: &mut SchemaGenerator) -> Result<Schema, EncodingError> {
                gen.schema_of::<T>()
            }
        })+
    };
}

transparent_shape!(&T, Box<T>, Rc<T>, Arc<T>);
