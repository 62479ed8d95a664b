//! Block codec registry.
//!
//! # Identity rules
//! Every codec is identified by the name written under the `avro.codec`
//! metadata key of the container header.  A reader selects the inverse
//! transform from that name alone, so names are frozen:
//!
//! | Codec       | Name          | Payload layout                                   |
//! |-------------|---------------|--------------------------------------------------|
//! | Null        | `null`        | block bytes verbatim                             |
//! | Deflate     | `deflate`     | raw RFC 1951 stream, no zlib header or trailer   |
//! | Snappy      | `snappy`      | raw snappy block + CRC32 (big-endian) of input   |
//! | Zstandard   | `zstandard`   | one zstd frame                                   |
//! | Xz          | `xz`          | xz container stream                              |
//!
//! The codec is chosen once, when the writer is opened, and applies to every
//! block of the file.

use std::io::{self, Read, Write};
use thiserror::Error;

/// Default level handed to codecs that take one.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 6;

// ── CodecId enum ─────────────────────────────────────────────────────────────

/// Runtime codec discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CodecId {
    #[default]
    Null,
    Deflate,
    Snappy,
    Zstandard,
    Xz,
}

impl CodecId {
    pub const ALL: [CodecId; 5] = [
        CodecId::Null,
        CodecId::Deflate,
        CodecId::Snappy,
        CodecId::Zstandard,
        CodecId::Xz,
    ];

    /// The name recorded in file metadata.
    pub fn name(self) -> &'static str {
        match self {
            CodecId::Null      => "null",
            CodecId::Deflate   => "deflate",
            CodecId::Snappy    => "snappy",
            CodecId::Zstandard => "zstandard",
            CodecId::Xz        => "xz",
        }
    }

    /// Resolve a metadata name to a CodecId.
    /// Returns `None` if the name is not recognised by this build.
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "null"      => Some(CodecId::Null),
            "deflate"   => Some(CodecId::Deflate),
            "snappy"    => Some(CodecId::Snappy),
            "zstandard" => Some(CodecId::Zstandard),
            "xz"        => Some(CodecId::Xz),
            _           => None,
        }
    }
}

impl std::fmt::Display for CodecId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("Decompression error: {0}")]
    Decompression(String),
    #[error("Snappy checksum mismatch: stored {stored:08x}, computed {computed:08x}")]
    Checksum { stored: u32, computed: u32 },
    #[error("Codec `{0}` is not available in this build")]
    UnavailableCodec(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── Codec trait ──────────────────────────────────────────────────────────────

pub trait Codec: Send + Sync {
    fn codec_id(&self) -> CodecId;
    fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>, CodecError>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;

    fn name(&self) -> &'static str {
        self.codec_id().name()
    }
}

// ── Built-in codec implementations ──────────────────────────────────────────

pub struct NullCodec;
impl Codec for NullCodec {
    fn codec_id(&self) -> CodecId { CodecId::Null }
    fn compress(&self, data: &[u8], _: i32) -> Result<Vec<u8>, CodecError> { Ok(data.to_vec()) }
    fn decompress(&self, data: &[u8])        -> Result<Vec<u8>, CodecError> { Ok(data.to_vec()) }
}

pub struct DeflateCodec;
impl Codec for DeflateCodec {
    fn codec_id(&self) -> CodecId { CodecId::Deflate }
    fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>, CodecError> {
        let level = flate2::Compression::new(level.clamp(0, 9) as u32);
        let mut enc = flate2::write::DeflateEncoder::new(Vec::new(), level);
        enc.write_all(data).map_err(|e| CodecError::Compression(e.to_string()))?;
        enc.finish().map_err(|e| CodecError::Compression(e.to_string()))
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        flate2::read::DeflateDecoder::new(data)
            .read_to_end(&mut out)
            .map_err(|e| CodecError::Decompression(e.to_string()))?;
        Ok(out)
    }
}

/// Length of the CRC32 trailer appended to every snappy block.
const SNAPPY_CRC_LEN: usize = 4;

pub struct SnappyCodec;
impl Codec for SnappyCodec {
    fn codec_id(&self) -> CodecId { CodecId::Snappy }
    fn compress(&self, data: &[u8], _: i32) -> Result<Vec<u8>, CodecError> {
        let mut out = snap::raw::Encoder::new()
            .compress_vec(data)
            .map_err(|e| CodecError::Compression(e.to_string()))?;
        out.extend_from_slice(&crc32fast::hash(data).to_be_bytes());
        Ok(out)
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        if data.len() < SNAPPY_CRC_LEN {
            return Err(CodecError::Decompression("snappy block shorter than its checksum".into()));
        }
        let (body, trailer) = data.split_at(data.len() - SNAPPY_CRC_LEN);
        let out = snap::raw::Decoder::new()
            .decompress_vec(body)
            .map_err(|e| CodecError::Decompression(e.to_string()))?;
        let stored = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        let computed = crc32fast::hash(&out);
        if stored != computed {
            return Err(CodecError::Checksum { stored, computed });
        }
        Ok(out)
    }
}

pub struct ZstandardCodec;
impl Codec for ZstandardCodec {
    fn codec_id(&self) -> CodecId { CodecId::Zstandard }
    fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>, CodecError> {
        zstd::encode_all(data, level).map_err(|e| CodecError::Compression(e.to_string()))
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        zstd::decode_all(data).map_err(|e| CodecError::Decompression(e.to_string()))
    }
}

pub struct XzCodec;
impl Codec for XzCodec {
    fn codec_id(&self) -> CodecId { CodecId::Xz }
    fn compress(&self, data: &[u8], _: i32) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        lzma_rs::xz_compress(&mut io::Cursor::new(data), &mut out)
            .map_err(|e| CodecError::Compression(e.to_string()))?;
        Ok(out)
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        lzma_rs::xz_decompress(&mut io::Cursor::new(data), &mut out)
            .map_err(|e| CodecError::Decompression(e.to_string()))?;
        Ok(out)
    }
}

// ── Factory ──────────────────────────────────────────────────────────────────

/// Resolve a metadata name to a built-in codec.
///
/// Returns `Err(CodecError::UnavailableCodec)` if the name is not recognised.
pub fn get_codec_by_name(name: &str) -> Result<Box<dyn Codec>, CodecError> {
    match CodecId::from_name(name) {
        Some(id) => Ok(get_codec(id)),
        None     => Err(CodecError::UnavailableCodec(name.to_owned())),
    }
}

/// Resolve a CodecId to a built-in codec.
pub fn get_codec(id: CodecId) -> Box<dyn Codec> {
    match id {
        CodecId::Null      => Box::new(NullCodec),
        CodecId::Deflate   => Box::new(DeflateCodec),
        CodecId::Snappy    => Box::new(SnappyCodec),
        CodecId::Zstandard => Box::new(ZstandardCodec),
        CodecId::Xz        => Box::new(XzCodec),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = b"the quick brown fox jumps over the lazy dog, the quick brown fox";

    #[test]
    fn every_codec_inverts() {
        for id in CodecId::ALL {
            let codec = get_codec(id);
            let packed = codec.compress(SAMPLE, DEFAULT_COMPRESSION_LEVEL).unwrap();
            assert_eq!(codec.decompress(&packed).unwrap(), SAMPLE, "codec {id}");
        }
    }

    #[test]
    fn null_is_identity() {
        assert_eq!(NullCodec.compress(SAMPLE, 0).unwrap(), SAMPLE);
    }

    #[test]
    fn snappy_appends_big_endian_crc() {
        let packed = SnappyCodec.compress(SAMPLE, 0).unwrap();
        let crc = crc32fast::hash(SAMPLE).to_be_bytes();
        assert_eq!(&packed[packed.len() - 4..], &crc);

        let mut corrupt = packed.clone();
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0xff;
        assert!(matches!(SnappyCodec.decompress(&corrupt), Err(CodecError::Checksum { .. })));
    }

    #[test]
    fn names_round_trip() {
        for id in CodecId::ALL {
            assert_eq!(CodecId::from_name(id.name()), Some(id));
        }
        assert!(get_codec_by_name("bzip2").is_err());
    }
}
