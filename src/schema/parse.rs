use std::collections::HashSet;

use serde_json::{Map, Value as Json};

use super::{EnumSchema, Field, FixedSchema, RecordSchema, Schema};
use crate::error::EncodingError;

pub(super) fn parse(text: &str) -> Result<Schema, EncodingError> {
    let json: Json = serde_json::from_str(text)
        .map_err(|e| EncodingError::InvalidSchema(format!("not JSON: {e}")))?;
    let mut parser = Parser::default();
    let schema = parser.node(&json, None)?;
    schema.validate()?;
    Ok(schema)
}

#[derive(Default)]
struct Parser {
    /// Full names defined so far, in document order.
    defined: HashSet<String>,
}

fn invalid(msg: impl Into<String>) -> EncodingError {
    EncodingError::InvalidSchema(msg.into())
}

fn primitive(name: &str) -> Option<Schema> {
    Some(match name {
        "null" => Schema::Null,
        "boolean" => Schema::Boolean,
        "int" => Schema::Int,
        "long" => Schema::Long,
        "float" => Schema::Float,
        "double" => Schema::Double,
        "bytes" => Schema::Bytes,
        "string" => Schema::String,
        _ => return None,
    })
}

fn full_name(name: &str, namespace: Option<&str>) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() && !name.contains('.') => format!("{ns}.{name}"),
        _ => name.to_owned(),
    }
}

fn str_attr<'j>(obj: &'j Map<String, Json>, key: &str) -> Result<Option<&'j str>, EncodingError> {
    match obj.get(key) {
        None => Ok(None),
        Some(Json::String(s)) => Ok(Some(s)),
        Some(other) => Err(invalid(format!("`{key}` must be a string, got {other}"))),
    }
}

impl Parser {
    fn node(&mut self, json: &Json, namespace: Option<&str>) -> Result<Schema, EncodingError> {
        match json {
            Json::String(name) => self.named_or_primitive(name, namespace),
            Json::Array(branches) => branches
                .iter()
                .map(|b| self.node(b, namespace))
                .collect::<Result<Vec<_>, _>>()
                .map(Schema::Union),
            Json::Object(obj) => self.complex(obj, namespace),
            other => Err(invalid(format!("unexpected schema element {other}"))),
        }
    }

    fn named_or_primitive(&self, name: &str, namespace: Option<&str>) -> Result<Schema, EncodingError> {
        if let Some(p) = primitive(name) {
            return Ok(p);
        }
        let qualified = full_name(name, namespace);
        if self.defined.contains(&qualified) {
            Ok(Schema::Ref(qualified))
        } else if self.defined.contains(name) {
            Ok(Schema::Ref(name.to_owned()))
        } else {
            Err(EncodingError::UnresolvedName(qualified))
        }
    }

    fn complex(&mut self, obj: &Map<String, Json>, namespace: Option<&str>) -> Result<Schema, EncodingError> {
        let kind = match obj.get("type") {
            Some(Json::String(kind)) => kind.as_str(),
            Some(nested) => return self.node(nested, namespace),
            None => return Err(invalid("object schema without `type`")),
        };
        match kind {
            "record" | "error" => self.record(obj, namespace),
            "enum" => {
                let name = self.declare(obj, namespace)?;
                let symbols = match obj.get("symbols") {
                    Some(Json::Array(items)) => items
                        .iter()
                        .map(|s| s.as_str().map(str::to_owned).ok_or_else(|| invalid("enum symbols must be strings")))
                        .collect::<Result<Vec<_>, _>>()?,
                    _ => return Err(invalid(format!("enum `{name}` needs a `symbols` array"))),
                };
                Ok(Schema::Enum(EnumSchema { name, symbols }))
            }
            "fixed" => {
                let name = self.declare(obj, namespace)?;
                let size = obj
                    .get("size")
                    .and_then(Json::as_u64)
                    .ok_or_else(|| invalid(format!("fixed `{name}` needs a non-negative integer `size`")))?;
                Ok(Schema::Fixed(FixedSchema { name, size: size as usize }))
            }
            "array" => {
                let items = obj.get("items").ok_or_else(|| invalid("array without `items`"))?;
                Ok(Schema::Array(Box::new(self.node(items, namespace)?)))
            }
            "map" => {
                let values = obj.get("values").ok_or_else(|| invalid("map without `values`"))?;
                Ok(Schema::Map(Box::new(self.node(values, namespace)?)))
            }
            other => self.named_or_primitive(other, namespace),
        }
    }

    /// Register the full name of a named type before its body is parsed, so
    /// the body may refer back to it.
    fn declare(&mut self, obj: &Map<String, Json>, namespace: Option<&str>) -> Result<String, EncodingError> {
        let name = str_attr(obj, "name")?.ok_or_else(|| invalid("named type without `name`"))?;
        let ns = str_attr(obj, "namespace")?.or(namespace);
        let full = full_name(name, ns);
        if !self.defined.insert(full.clone()) {
            return Err(invalid(format!("`{full}` is defined twice")));
        }
        Ok(full)
    }

    fn record(&mut self, obj: &Map<String, Json>, namespace: Option<&str>) -> Result<Schema, EncodingError> {
        let name = self.declare(obj, namespace)?;
        // Fields resolve relative names against the record's own namespace.
        let inner_ns = name.rfind('.').map(|i| name[..i].to_owned());
        let fields = match obj.get("fields") {
            Some(Json::Array(fields)) => fields,
            _ => return Err(invalid(format!("record `{name}` needs a `fields` array"))),
        };
        let fields = fields
            .iter()
            .map(|f| {
                let f = f.as_object().ok_or_else(|| invalid("record fields must be objects"))?;
                let field_name = str_attr(f, "name")?.ok_or_else(|| invalid("field without `name`"))?;
                let ty = f.get("type").ok_or_else(|| invalid(format!("field `{field_name}` without `type`")))?;
                Ok::<_, EncodingError>(Field {
                    name: field_name.to_owned(),
                    schema: self.node(ty, inner_ns.as_deref())?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Schema::Record(RecordSchema { name, fields }))
    }
}
