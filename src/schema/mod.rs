//! Schema model.
//!
//! A [`Schema`] is a closed tree of primitive, composite and named nodes.
//! Named types (records, enums, fixed) are written out in full at their first
//! occurrence; any later occurrence is a [`Schema::Ref`] carrying the full
//! name.  That is what lets a record contain itself without the tree being
//! infinite.
//!
//! The canonical JSON rendering has no whitespace and a fixed key order, so
//! the same tree always renders to the same bytes.

mod generate;
mod parse;

pub use generate::{HasSchema, RecordBuilder, SchemaGenerator};

use std::collections::{HashMap, HashSet};

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::error::EncodingError;

#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
    Record(RecordSchema),
    Enum(EnumSchema),
    Array(Box<Schema>),
    Map(Box<Schema>),
    Union(Vec<Schema>),
    Fixed(FixedSchema),
    /// Reference to a named type defined elsewhere in the same tree.
    Ref(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    pub name: String,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub schema: Schema,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumSchema {
    pub name: String,
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixedSchema {
    pub name: String,
    pub size: usize,
}

impl Schema {
    /// Parse schema JSON text.
    pub fn parse(json: &str) -> Result<Schema, EncodingError> {
        parse::parse(json)
    }

    /// Render the canonical JSON form.
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).expect("schema maps are keyed by strings")
    }

    /// Full name of a named type, `None` for everything else.
    pub fn name(&self) -> Option<&str> {
        match self {
            Schema::Record(r) => Some(&r.name),
            Schema::Enum(e) => Some(&e.name),
            Schema::Fixed(f) => Some(&f.name),
            Schema::Ref(n) => Some(n),
            _ => None,
        }
    }

    /// Short label used in error messages and union uniqueness checks.
    pub fn kind(&self) -> &'static str {
        match self {
            Schema::Null => "null",
            Schema::Boolean => "boolean",
            Schema::Int => "int",
            Schema::Long => "long",
            Schema::Float => "float",
            Schema::Double => "double",
            Schema::Bytes => "bytes",
            Schema::String => "string",
            Schema::Record(_) => "record",
            Schema::Enum(_) => "enum",
            Schema::Array(_) => "array",
            Schema::Map(_) => "map",
            Schema::Union(_) => "union",
            Schema::Fixed(_) => "fixed",
            Schema::Ref(_) => "reference",
        }
    }

    /// Check structural rules and return the table of named types.
    ///
    /// Every `Ref` must point at a type defined earlier in document order,
    /// and no name may be defined twice.
    pub fn validate(&self) -> Result<Names, EncodingError> {
        let mut names = Names::default();
        names.collect(self)?;
        Ok(names)
    }
}

impl std::fmt::Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical_json())
    }
}

// ── Name table ───────────────────────────────────────────────────────────────

/// Named types of one schema tree, keyed by full name.
#[derive(Debug, Clone, Default)]
pub struct Names {
    defined: HashMap<String, Schema>,
}

impl Names {
    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.defined.get(name)
    }

    /// Follow a `Ref` to its definition; other nodes resolve to themselves.
    pub fn resolve<'a>(&'a self, schema: &'a Schema) -> Result<&'a Schema, EncodingError> {
        match schema {
            Schema::Ref(name) => self
                .get(name)
                .ok_or_else(|| EncodingError::UnresolvedName(name.clone())),
            other => Ok(other),
        }
    }

    pub fn len(&self) -> usize {
        self.defined.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defined.is_empty()
    }

    fn define(&mut self, name: &str, schema: &Schema) -> Result<(), EncodingError> {
        validate_name(name)?;
        if self.defined.insert(name.to_owned(), schema.clone()).is_some() {
            return Err(EncodingError::InvalidSchema(format!("`{name}` is defined twice")));
        }
        Ok(())
    }

    fn collect(&mut self, schema: &Schema) -> Result<(), EncodingError> {
        match schema {
            Schema::Record(r) => {
                self.define(&r.name, schema)?;
                let mut seen = HashSet::new();
                for field in &r.fields {
                    validate_identifier(&field.name)?;
                    if !seen.insert(field.name.as_str()) {
                        return Err(EncodingError::InvalidSchema(format!(
                            "record `{}` declares field `{}` twice",
                            r.name, field.name
                        )));
                    }
                    self.collect(&field.schema)?;
                }
            }
            Schema::Enum(e) => {
                self.define(&e.name, schema)?;
                validate_symbols(&e.name, &e.symbols)?;
            }
            Schema::Fixed(f) => self.define(&f.name, schema)?,
            Schema::Array(items) => self.collect(items)?,
            Schema::Map(values) => self.collect(values)?,
            Schema::Union(branches) => {
                validate_union(branches)?;
                for branch in branches {
                    self.collect(branch)?;
                }
            }
            Schema::Ref(name) => {
                if !self.defined.contains_key(name) {
                    return Err(EncodingError::UnresolvedName(name.clone()));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

// ── Structural rules ─────────────────────────────────────────────────────────

fn validate_identifier(ident: &str) -> Result<(), EncodingError> {
    let mut chars = ident.chars();
    let ok = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(EncodingError::InvalidSchema(format!("`{ident}` is not a valid name")))
    }
}

/// A full name is one or more identifiers joined by dots.
pub(crate) fn validate_name(name: &str) -> Result<(), EncodingError> {
    name.split('.').try_for_each(validate_identifier)
}

pub(crate) fn validate_symbols(name: &str, symbols: &[String]) -> Result<(), EncodingError> {
    if symbols.is_empty() {
        return Err(EncodingError::InvalidSchema(format!("enum `{name}` has no symbols")));
    }
    let mut seen = HashSet::new();
    for symbol in symbols {
        validate_identifier(symbol)?;
        if !seen.insert(symbol.as_str()) {
            return Err(EncodingError::InvalidSchema(format!(
                "enum `{name}` repeats symbol `{symbol}`"
            )));
        }
    }
    Ok(())
}

pub(crate) fn validate_union(branches: &[Schema]) -> Result<(), EncodingError> {
    let mut seen = HashSet::new();
    for branch in branches {
        if let Schema::Union(_) = branch {
            return Err(EncodingError::InvalidSchema("unions may not directly contain unions".into()));
        }
        // Named branches are told apart by name, the rest by kind.
        let key = branch.name().unwrap_or_else(|| branch.kind());
        if !seen.insert(key) {
            return Err(EncodingError::InvalidSchema(format!("union repeats branch `{key}`")));
        }
    }
    Ok(())
}

// ── Canonical JSON ───────────────────────────────────────────────────────────

impl Serialize for Schema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Schema::Record(r) => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("type", "record")?;
                map.serialize_entry("name", &r.name)?;
                map.serialize_entry("fields", &r.fields)?;
                map.end()
            }
            Schema::Enum(e) => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("type", "enum")?;
                map.serialize_entry("name", &e.name)?;
                map.serialize_entry("symbols", &e.symbols)?;
                map.end()
            }
            Schema::Array(items) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "array")?;
                map.serialize_entry("items", items)?;
                map.end()
            }
            Schema::Map(values) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "map")?;
                map.serialize_entry("values", values)?;
                map.end()
            }
            Schema::Union(branches) => {
                let mut seq = serializer.serialize_seq(Some(branches.len()))?;
                for branch in branches {
                    seq.serialize_element(branch)?;
                }
                seq.end()
            }
            Schema::Fixed(f) => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("type", "fixed")?;
                map.serialize_entry("name", &f.name)?;
                map.serialize_entry("size", &f.size)?;
                map.end()
            }
            Schema::Ref(name) => serializer.serialize_str(name),
            primitive => serializer.serialize_str(primitive.kind()),
        }
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("name", &self.name)?;
        map.serialize_entry("type", &self.schema)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> Schema {
        Schema::Record(RecordSchema {
            name: "Node".into(),
            fields: vec![
                Field { name: "value".into(), schema: Schema::Long },
                Field {
                    name: "next".into(),
                    schema: Schema::Union(vec![Schema::Null, Schema::Ref("Node".into())]),
                },
            ],
        })
    }

    #[test]
    fn renders_canonical_json() {
        assert_eq!(
            node().canonical_json(),
            r#"{"type":"record","name":"Node","fields":[{"name":"value","type":"long"},{"name":"next","type":["null","Node"]}]}"#
        );
        assert_eq!(Schema::Array(Box::new(Schema::Bytes)).to_string(), r#"{"type":"array","items":"bytes"}"#);
        assert_eq!(
            Schema::Fixed(FixedSchema { name: "md5".into(), size: 16 }).to_string(),
            r#"{"type":"fixed","name":"md5","size":16}"#
        );
    }

    #[test]
    fn self_reference_resolves() {
        let schema = node();
        let names = schema.validate().unwrap();
        assert_eq!(names.len(), 1);
        let reference = Schema::Ref("Node".into());
        assert_eq!(names.resolve(&reference).unwrap(), &schema);
    }

    #[test]
    fn rejects_forward_and_unknown_refs() {
        let schema = Schema::Array(Box::new(Schema::Ref("Missing".into())));
        assert!(matches!(schema.validate(), Err(EncodingError::UnresolvedName(n)) if n == "Missing"));
    }

    #[test]
    fn rejects_bad_unions() {
        let nested = Schema::Union(vec![Schema::Null, Schema::Union(vec![Schema::Int])]);
        assert!(nested.validate().is_err());
        let repeated = Schema::Union(vec![Schema::Int, Schema::Int]);
        assert!(repeated.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_fields_and_symbols() {
        let record = Schema::Record(RecordSchema {
            name: "Twice".into(),
            fields: vec![
                Field { name: "a".into(), schema: Schema::Int },
                Field { name: "a".into(), schema: Schema::Int },
            ],
        });
        assert!(record.validate().is_err());
        let empty = Schema::Enum(EnumSchema { name: "Empty".into(), symbols: vec![] });
        assert!(empty.validate().is_err());
        assert!(validate_name("com.example.Thing").is_ok());
        assert!(validate_name("9lives").is_err());
    }
}
