//! Object container writer.
//!
//! # Layout
//! ```text
//! header : magic "Obj\x01" | metadata map | sync marker (16 B)
//! block* : record count (varint) | payload length (varint) | payload | sync marker
//! ```
//! The metadata map always carries `avro.codec` and `avro.schema`; user
//! entries come first, in insertion order.
//!
//! # States
//! ```text
//! HeaderPending ──first append / flush──▶ Open ──close──▶ Closed
//!       │      └──────────────────close──────────────────────▲
//!       └────────sink error────────▶ Failed ◀──sink error──────┘
//! ```
//! The header is written lazily so metadata set right after opening still
//! lands in it.  Once written it is never rewritten: later `set_meta` calls
//! fail.  Every operation on a closed writer fails with a state error.
//!
//! A sink that rejects a write may already hold part of it.  The writer then
//! moves to `Failed` and refuses all further output, so nothing is appended
//! after a torn header or block.
//!
//! # Failure model
//! Records are encoded into an in-memory block.  The block offset is noted
//! before each record and restored if encoding fails, so a rejected record
//! leaves no bytes behind and the writer stays usable.  A block reaches the
//! sink in a single write once it is complete: count, payload and marker.

use std::io::Write;

use serde::Serialize;

use crate::block::{encode_block, BlockBuffer};
use crate::codec::{get_codec, Codec, CodecId, DEFAULT_COMPRESSION_LEVEL};
use crate::encode::ValueEncoder;
use crate::error::{Error, Result};
use crate::header::{is_reserved, new_sync_marker, Header, CODEC_KEY, SCHEMA_KEY, SYNC_SIZE};
use crate::schema::Schema;
use crate::value::{to_value, Value};

/// Default block size threshold in uncompressed bytes.
pub const DEFAULT_SYNC_INTERVAL: usize = 16 * 4000;
/// Smallest accepted sync interval.
pub const MIN_SYNC_INTERVAL: usize = 32;
/// Sync intervals must stay below this bound.
pub const MAX_SYNC_INTERVAL: usize = 1 << 30;

// ── WriterOptions ─────────────────────────────────────────────────────────────

/// Configuration for [`ContainerWriter::with_options`].
#[derive(Debug, Clone)]
pub struct WriterOptions {
    pub codec:         CodecId,
    pub level:         i32,
    /// A block is flushed once this many uncompressed bytes are buffered.
    pub sync_interval: usize,
    /// Fixed sync marker; a random one is drawn when unset.
    pub sync_marker:   Option<[u8; SYNC_SIZE]>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            codec:         CodecId::Null,
            level:         DEFAULT_COMPRESSION_LEVEL,
            sync_interval: DEFAULT_SYNC_INTERVAL,
            sync_marker:   None,
        }
    }
}

impl WriterOptions {
    pub fn with_codec(codec: CodecId) -> Self {
        Self { codec, ..Self::default() }
    }
}

fn check_sync_interval(interval: usize) -> Result<()> {
    if !(MIN_SYNC_INTERVAL..MAX_SYNC_INTERVAL).contains(&interval) {
        return Err(Error::Configuration(format!(
            "sync interval {interval} outside [{MIN_SYNC_INTERVAL}, {MAX_SYNC_INTERVAL})"
        )));
    }
    Ok(())
}

// ── ContainerWriter ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    HeaderPending,
    Open,
    /// The sink failed mid-write; its contents end at an unknown offset.
    Failed,
    Closed,
}

pub struct ContainerWriter<W: Write> {
    sink:           Option<W>,
    encoder:        ValueEncoder,
    codec:          Box<dyn Codec>,
    level:          i32,
    sync_interval:  usize,
    sync_marker:    [u8; SYNC_SIZE],
    metadata:       Vec<(String, Vec<u8>)>,
    block:          BlockBuffer,
    state:          WriterState,
    bytes_written:  u64,
    blocks_written: u64,
}

impl<W: Write> ContainerWriter<W> {
    pub fn new(sink: W, schema: Schema) -> Result<Self> {
        Self::with_options(sink, schema, &WriterOptions::default())
    }

    pub fn with_options(sink: W, schema: Schema, opts: &WriterOptions) -> Result<Self> {
        check_sync_interval(opts.sync_interval)?;
        let encoder = ValueEncoder::new(schema)?;
        Ok(Self {
            sink:           Some(sink),
            encoder,
            codec:          get_codec(opts.codec),
            level:          opts.level,
            sync_interval:  opts.sync_interval,
            sync_marker:    opts.sync_marker.unwrap_or_else(new_sync_marker),
            metadata:       Vec::new(),
            block:          BlockBuffer::new(),
            state:          WriterState::HeaderPending,
            bytes_written:  0,
            blocks_written: 0,
        })
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn state(&self) -> WriterState { self.state }
    pub fn schema(&self) -> &Schema { self.encoder.schema() }
    pub fn codec(&self) -> CodecId { self.codec.codec_id() }
    pub fn sync_marker(&self) -> &[u8; SYNC_SIZE] { &self.sync_marker }
    pub fn sync_interval(&self) -> usize { self.sync_interval }
    /// Uncompressed bytes buffered for the next block.
    pub fn block_offset(&self) -> usize { self.block.offset() }
    /// Records buffered for the next block.
    pub fn block_count(&self) -> u64 { self.block.count() }
    /// Bytes handed to the sink so far.
    pub fn bytes_written(&self) -> u64 { self.bytes_written }
    pub fn blocks_written(&self) -> u64 { self.blocks_written }

    // ── Configuration ────────────────────────────────────────────────────────

    pub fn set_sync_interval(&mut self, interval: usize) -> Result<()> {
        self.assert_open()?;
        check_sync_interval(interval)?;
        self.sync_interval = interval;
        Ok(())
    }

    /// Attach a user metadata entry.  Must happen before the header is
    /// written; setting a key twice keeps the latest value.
    pub fn set_meta(&mut self, key: &str, value: &[u8]) -> Result<()> {
        if is_reserved(key) {
            return Err(Error::Configuration(format!("cannot set reserved meta key `{key}`")));
        }
        self.assert_open()?;
        if self.state != WriterState::HeaderPending {
            return Err(Error::State(format!("header already written, cannot set `{key}`")));
        }
        match self.metadata.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_vec(),
            None => self.metadata.push((key.to_owned(), value.to_vec())),
        }
        Ok(())
    }

    pub fn set_meta_str(&mut self, key: &str, value: &str) -> Result<()> {
        self.set_meta(key, value.as_bytes())
    }

    pub fn set_meta_long(&mut self, key: &str, value: i64) -> Result<()> {
        self.set_meta(key, value.to_string().as_bytes())
    }

    // ── Writing ──────────────────────────────────────────────────────────────

    /// Encode one record into the current block.
    ///
    /// On an encoding error the block is rewound to where it was before the
    /// call and the writer remains usable.
    ///
    /// Once encoded, the record is committed.  If the threshold flush that
    /// follows fails, the error is returned but the record is not taken
    /// back: after a codec error it stays buffered for the next flush, after
    /// a sink error the writer is `Failed`.  Either way, appending it again
    /// would duplicate it.
    pub fn append(&mut self, value: &Value) -> Result<()> {
        self.assert_open()?;
        self.ensure_header()?;

        let offset = self.block.offset();
        if let Err(e) = self.encoder.encode(value, self.block.sink()) {
            self.block.rewind(offset);
            tracing::debug!(offset, error = %e, "record rejected, block rewound");
            return Err(e);
        }
        self.block.commit();
        tracing::trace!(records = self.block.count(), buffered = self.block.offset(), "record appended");

        if self.block.offset() >= self.sync_interval {
            self.write_block()?;
        }
        Ok(())
    }

    /// Lower a serializable value and append it.
    pub fn append_ser<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.assert_open()?;
        let value = to_value(value)?;
        self.append(&value)
    }

    /// Write out the pending block and flush the sink.
    pub fn flush(&mut self) -> Result<()> {
        self.sync().map(|_| ())
    }

    /// Like [`flush`](Self::flush), returning the number of bytes written so
    /// far: a block boundary a reader can seek to.
    pub fn sync(&mut self) -> Result<u64> {
        self.assert_open()?;
        self.ensure_header()?;
        self.write_block()?;
        self.flush_sink()?;
        Ok(self.bytes_written)
    }

    /// Flush everything and hand back the sink.
    ///
    /// The writer is closed afterwards even when this returns an error; in
    /// that case the sink has been dropped.
    pub fn close(&mut self) -> Result<W> {
        self.assert_open()?;
        let result = self.finish();
        self.state = WriterState::Closed;
        let sink = self.sink.take();
        result?;
        tracing::debug!(bytes = self.bytes_written, blocks = self.blocks_written, "container closed");
        sink.ok_or_else(|| Error::State("sink already released".into()))
    }

    pub fn into_inner(mut self) -> Result<W> {
        self.close()
    }

    fn finish(&mut self) -> Result<()> {
        self.ensure_header()?;
        self.write_block()?;
        self.flush_sink()
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn assert_open(&self) -> Result<()> {
        match self.state {
            WriterState::Closed => Err(Error::State("container writer is closed".into())),
            WriterState::Failed => Err(Error::State("container writer failed on an earlier sink error".into())),
            _ => Ok(()),
        }
    }

    fn sink_mut(&mut self) -> Result<&mut W> {
        self.sink
            .as_mut()
            .ok_or_else(|| Error::State("sink already released".into()))
    }

    /// Hand `bytes` to the sink in one piece, failing the writer if it
    /// refuses them.
    fn emit(&mut self, bytes: &[u8]) -> Result<()> {
        if let Err(e) = self.sink_mut()?.write_all(bytes) {
            self.state = WriterState::Failed;
            tracing::warn!(error = %e, offset = self.bytes_written, "sink write failed");
            return Err(e.into());
        }
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    fn flush_sink(&mut self) -> Result<()> {
        if let Err(e) = self.sink_mut()?.flush() {
            self.state = WriterState::Failed;
            tracing::warn!(error = %e, "sink flush failed");
            return Err(e.into());
        }
        Ok(())
    }

    fn ensure_header(&mut self) -> Result<()> {
        if self.state != WriterState::HeaderPending {
            return Ok(());
        }
        let mut metadata = self.metadata.clone();
        metadata.push((CODEC_KEY.to_owned(), self.codec.name().as_bytes().to_vec()));
        metadata.push((SCHEMA_KEY.to_owned(), self.encoder.schema().canonical_json().into_bytes()));
        let mut header = Vec::new();
        Header::new(metadata, self.sync_marker).write(&mut header)?;

        self.emit(&header)?;
        self.state = WriterState::Open;
        tracing::debug!(codec = self.codec.name(), entries = self.metadata.len() + 2, "header written");
        Ok(())
    }

    /// Frame, compress and emit the buffered block.  No-op when empty.
    fn write_block(&mut self) -> Result<()> {
        if self.block.is_empty() {
            return Ok(());
        }
        let framed = encode_block(
            self.block.count(),
            self.block.bytes(),
            self.codec.as_ref(),
            self.level,
            &self.sync_marker,
        )?;
        // From here on the block is gone whether or not the sink accepts it.
        let (count, data) = self.block.take();

        self.emit(&framed)?;
        self.blocks_written += 1;
        tracing::debug!(records = count, raw = data.len(), framed = framed.len(), "block written");
        Ok(())
    }
}

impl<W: Write> Drop for ContainerWriter<W> {
    fn drop(&mut self) {
        if matches!(self.state, WriterState::Closed | WriterState::Failed) {
            return;
        }
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "container writer dropped without a clean close");
        }
    }
}
