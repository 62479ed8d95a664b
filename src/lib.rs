pub mod error;
pub mod wire;
pub mod codec;
pub mod schema;
pub mod value;
pub mod encode;
pub mod block;
pub mod header;
pub mod container;
pub mod convert;

pub use error::{EncodingError, Error, Result};
pub use codec::{CodecId, get_codec};
pub use schema::{HasSchema, Schema, SchemaGenerator};
pub use value::{to_value, Record, Value};
pub use encode::ValueEncoder;
pub use container::{ContainerWriter, WriterOptions, WriterState};
pub use convert::{generate_schema, generate_schema_of, serialize, serialize_with_schema};
