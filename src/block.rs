use crate::codec::{Codec, CodecError};
use crate::header::SYNC_SIZE;
use crate::wire::WireWrite;

/// Uncompressed records waiting to become the next block.
///
/// Owned by exactly one writer.  After every flush it is replaced by a fresh
/// buffer rather than cleared, so a flushed block's allocation is never
/// reused for the next one.
#[derive(Debug, Default)]
pub struct BlockBuffer {
    bytes: Vec<u8>,
    count: u64,
}

impl BlockBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current write offset, i.e. buffered uncompressed bytes.
    pub fn offset(&self) -> usize {
        self.bytes.len()
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Sink for the value encoder.
    pub fn sink(&mut self) -> &mut Vec<u8> {
        &mut self.bytes
    }

    /// Drop everything written after `offset`.
    pub fn rewind(&mut self, offset: usize) {
        self.bytes.truncate(offset);
    }

    /// Count one fully encoded record.
    pub fn commit(&mut self) {
        self.count += 1;
    }

    /// Hand out the buffered block and leave a fresh buffer in its place.
    pub fn take(&mut self) -> (u64, Vec<u8>) {
        let BlockBuffer { bytes, count } = std::mem::take(self);
        (count, bytes)
    }
}

/// Frame one block: record count, compressed length, compressed payload and
/// the sync marker, assembled in memory so the sink receives it in one piece.
pub fn encode_block(
    count: u64,
    data: &[u8],
    codec: &dyn Codec,
    level: i32,
    sync_marker: &[u8; SYNC_SIZE],
) -> Result<Vec<u8>, CodecError> {
    let payload = codec.compress(data, level)?;
    let mut framed = Vec::with_capacity(payload.len() + SYNC_SIZE + 20);
    framed.write_long(count as i64)?;
    framed.write_bytes(&payload)?;
    framed.write_fixed(sync_marker)?;
    Ok(framed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::NullCodec;

    #[test]
    fn take_replaces_buffer() {
        let mut block = BlockBuffer::new();
        block.sink().extend_from_slice(b"abc");
        block.commit();
        let (count, bytes) = block.take();
        assert_eq!((count, bytes.as_slice()), (1, &b"abc"[..]));
        assert!(block.is_empty());
        assert_eq!(block.offset(), 0);
    }

    #[test]
    fn rewind_discards_tail() {
        let mut block = BlockBuffer::new();
        block.sink().extend_from_slice(b"keep");
        let mark = block.offset();
        block.sink().extend_from_slice(b"junk");
        block.rewind(mark);
        assert_eq!(block.take().1, b"keep");
    }

    #[test]
    fn framing_layout() {
        let sync = [0xAB; SYNC_SIZE];
        let framed = encode_block(2, b"xyz", &NullCodec, 0, &sync).unwrap();
        let mut expected = vec![0x04, 0x06, b'x', b'y', b'z'];
        expected.extend_from_slice(&sync);
        assert_eq!(framed, expected);
    }
}
