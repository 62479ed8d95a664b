//! One-shot conversion between application values and container files.
//!
//! ```
//! use avrow::schema::{HasSchema, Schema, SchemaGenerator};
//! use avrow::{CodecId, EncodingError};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Reading { sensor: String, celsius: f64 }
//!
//! impl HasSchema for Reading {
//!     fn describe(gen: &mut SchemaGenerator) -> Result<Schema, EncodingError> {
//!         gen.record("Reading", |r| {
//!             r.field::<String>("sensor")?.field::<f64>("celsius")?;
//!             Ok(())
//!         })
//!     }
//! }
//!
//! let json = avrow::generate_schema::<Reading>()?;
//! assert!(json.starts_with(r#"{"type":"record","name":"Reading""#));
//!
//! let reading = Reading { sensor: "north".into(), celsius: 21.5 };
//! let file = avrow::serialize(&reading, CodecId::Deflate)?;
//! assert_eq!(&file[..4], b"Obj\x01");
//! # Ok::<(), avrow::Error>(())
//! ```

use serde::Serialize;

use crate::codec::CodecId;
use crate::container::{ContainerWriter, WriterOptions};
use crate::error::Result;
use crate::schema::{HasSchema, Schema, SchemaGenerator};

/// Canonical schema JSON for `T`.
pub fn generate_schema<T: HasSchema + ?Sized>() -> Result<String> {
    Ok(SchemaGenerator::generate::<T>()?.canonical_json())
}

/// Canonical schema JSON for the type of `value`.
pub fn generate_schema_of<T: HasSchema + ?Sized>(_value: &T) -> Result<String> {
    generate_schema::<T>()
}

/// Write `value` as a single-record container file, schema generated from
/// its type.
pub fn serialize<T: Serialize + HasSchema + ?Sized>(value: &T, codec: CodecId) -> Result<Vec<u8>> {
    let schema = SchemaGenerator::generate::<T>()?;
    write_one(value, schema, &WriterOptions::with_codec(codec))
}

/// Write `value` as a single-record container file under a caller-supplied
/// schema.
pub fn serialize_with_schema<T: Serialize + ?Sized>(value: &T, schema: &str, codec: CodecId) -> Result<Vec<u8>> {
    let schema = Schema::parse(schema)?;
    write_one(value, schema, &WriterOptions::with_codec(codec))
}

fn write_one<T: Serialize + ?Sized>(value: &T, schema: Schema, opts: &WriterOptions) -> Result<Vec<u8>> {
    let mut writer = ContainerWriter::with_options(Vec::new(), schema, opts)?;
    writer.append_ser(value)?;
    writer.close()
}
