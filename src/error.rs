//! Error taxonomy for schema generation, value encoding and container writing.
//!
//! Configuration and state errors are raised before the writer mutates any
//! of its buffers.  Encoding errors carry the precise cause; when they occur
//! during an append the partially encoded record has already been rewound by
//! the time the caller sees them.

use std::io;
use thiserror::Error;

use crate::codec::CodecError;

/// Everything that can go wrong while turning a value into bytes.
#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("Value does not match schema: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: &'static str },
    #[error("Record `{record}` is missing required field `{field}`")]
    MissingField { record: String, field: String },
    #[error("Symbol `{symbol}` is not part of enum `{name}`")]
    UnknownSymbol { name: String, symbol: String },
    #[error("No union branch matches a {found} value")]
    NoUnionBranch { found: &'static str },
    #[error("Fixed `{name}` holds exactly {expected} bytes, got {actual}")]
    FixedLength { name: String, expected: usize, actual: usize },
    #[error("Reference to undefined named type `{0}`")]
    UnresolvedName(String),
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
    #[error("Cannot derive a schema for {0}")]
    Unclassifiable(String),
    #[error("Nesting depth limit of {0} exceeded")]
    DepthLimit(usize),
    #[error("{0}")]
    Custom(String),
}

impl serde::ser::Error for EncodingError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        EncodingError::Custom(msg.to_string())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),
    #[error("Invalid writer state: {0}")]
    State(String),
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
