//! Binary encoding primitives.
//!
//! Integers are zigzag-mapped and written as base-128 varints, least
//! significant group first, high bit set on every byte but the last.
//! Floating point values are little-endian IEEE 754.  Bytes and strings are
//! a varint length followed by the raw bytes; fixed values have no prefix.
//!
//! Nothing here buffers: every call goes straight to the underlying sink.

use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{self, Write};

/// Longest possible varint for a 64-bit value.
pub const MAX_VARINT_LEN: usize = 10;

/// Map a signed value onto the unsigned range so small magnitudes stay small.
#[inline]
pub fn zigzag(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Inverse of [`zigzag`].
#[inline]
pub fn unzigzag(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

/// Write `n` as a varint into `buf`, returning the number of bytes used.
pub fn encode_varint(mut n: u64, buf: &mut [u8; MAX_VARINT_LEN]) -> usize {
    let mut i = 0;
    while n >= 0x80 {
        buf[i] = (n as u8) | 0x80;
        n >>= 7;
        i += 1;
    }
    buf[i] = n as u8;
    i + 1
}

/// Avro binary primitives for any [`Write`] sink.
pub trait WireWrite: Write {
    fn write_null(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn write_boolean(&mut self, b: bool) -> io::Result<()> {
        self.write_u8(b as u8)
    }

    fn write_int(&mut self, n: i32) -> io::Result<()> {
        self.write_long(n as i64)
    }

    fn write_long(&mut self, n: i64) -> io::Result<()> {
        let mut buf = [0u8; MAX_VARINT_LEN];
        let len = encode_varint(zigzag(n), &mut buf);
        self.write_all(&buf[..len])
    }

    fn write_float(&mut self, f: f32) -> io::Result<()> {
        self.write_f32::<LittleEndian>(f)
    }

    fn write_double(&mut self, d: f64) -> io::Result<()> {
        self.write_f64::<LittleEndian>(d)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_long(bytes.len() as i64)?;
        self.write_all(bytes)
    }

    fn write_string(&mut self, s: &str) -> io::Result<()> {
        self.write_bytes(s.as_bytes())
    }

    fn write_fixed(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_all(bytes)
    }
}

impl<W: Write + ?Sized> WireWrite for W {}

#[cfg(test)]
mod tests {
    use super::*;

    fn long(n: i64) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_long(n).unwrap();
        out
    }

    #[test]
    fn zigzag_vectors() {
        assert_eq!(long(0), [0x00]);
        assert_eq!(long(-1), [0x01]);
        assert_eq!(long(1), [0x02]);
        assert_eq!(long(-2), [0x03]);
        assert_eq!(long(-64), [0x7f]);
        assert_eq!(long(64), [0x80, 0x01]);
        assert_eq!(long(8192), [0x80, 0x80, 0x01]);
        assert_eq!(long(i64::MAX).len(), MAX_VARINT_LEN);
        assert_eq!(long(i64::MIN).len(), MAX_VARINT_LEN);
    }

    #[test]
    fn zigzag_extremes() {
        assert_eq!(zigzag(i64::MIN), u64::MAX);
        assert_eq!(zigzag(i64::MAX), u64::MAX - 1);
        assert_eq!(unzigzag(u64::MAX), i64::MIN);
    }

    #[test]
    fn strings_and_floats() {
        let mut out = Vec::new();
        out.write_string("foo").unwrap();
        assert_eq!(out, [0x06, b'f', b'o', b'o']);

        let mut out = Vec::new();
        out.write_double(1.0).unwrap();
        assert_eq!(out, 1.0f64.to_le_bytes());

        let mut out = Vec::new();
        out.write_float(-2.5).unwrap();
        out.write_boolean(true).unwrap();
        out.write_null().unwrap();
        out.write_fixed(&[9, 9]).unwrap();
        assert_eq!(out, [0x00, 0x00, 0x20, 0xc0, 0x01, 0x09, 0x09]);
    }
}
