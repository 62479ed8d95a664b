//! Container file header: magic, metadata map and sync marker.
//!
//! ```text
//! "Obj\x01" | count | (key string, value bytes)* | 0 | sync marker (16 B)
//! ```

use std::io::{self, Write};

use uuid::Uuid;

use crate::wire::WireWrite;

pub const MAGIC: &[u8; 4] = b"Obj\x01";
pub const SYNC_SIZE: usize = 16;

/// Metadata keys starting with this prefix belong to the format.
pub const RESERVED_PREFIX: &str = "avro.";
pub const CODEC_KEY: &str = "avro.codec";
pub const SCHEMA_KEY: &str = "avro.schema";

/// Fresh sync marker for a newly opened file.
pub fn new_sync_marker() -> [u8; SYNC_SIZE] {
    Uuid::new_v4().into_bytes()
}

pub fn is_reserved(key: &str) -> bool {
    key.starts_with(RESERVED_PREFIX)
}

#[derive(Debug, Clone)]
pub struct Header {
    pub magic: [u8; 4],
    /// Insertion ordered key/value pairs.
    pub metadata: Vec<(String, Vec<u8>)>,
    pub sync_marker: [u8; SYNC_SIZE],
}

impl Header {
    pub fn new(metadata: Vec<(String, Vec<u8>)>, sync_marker: [u8; SYNC_SIZE]) -> Self {
        Self { magic: *MAGIC, metadata, sync_marker }
    }

    pub fn write<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_fixed(&self.magic)?;
        if !self.metadata.is_empty() {
            writer.write_long(self.metadata.len() as i64)?;
            for (key, value) in &self.metadata {
                writer.write_string(key)?;
                writer.write_bytes(value)?;
            }
        }
        writer.write_long(0)?;
        writer.write_fixed(&self.sync_marker)?;
        Ok(())
    }
}
