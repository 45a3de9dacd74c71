//! Bit-granular reader/writer over a byte-addressable sink/source.
//!
//! The writer accumulates bits in a `BitBuffer`, commits full bytes to the
//! underlying sink as they fill, and on an unaligned append rewrites the
//! trailing partial byte on the next call rather than tracking a separate
//! "current byte under construction" field. This is the same technique the
//! reference crate's `AdaptiveHuffman::put_code`/`drop_leading_bits` uses for
//! a fixed-width code, generalised here to an arbitrary-length `BitBuffer`.

use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};

use super::buffer::BitBuffer;

/// Writes bits, LSB-first, to a seekable byte sink.
pub struct BitStreamWriter<W: Write + Seek> {
    writer: BufWriter<W>,
    /// Bits written since the last byte-aligned commit. Holds only the
    /// not-yet-finalised trailing partial byte between calls to `write_bits`.
    pending: BitBuffer,
    bit_position: u64,
}

impl<W: Write + Seek> BitStreamWriter<W> {
    /// Opens a writer at the sink's current position.
    pub fn new(inner: W) -> Self {
        Self {
            writer: BufWriter::new(inner),
            pending: BitBuffer::new(),
            bit_position: 0,
        }
    }

    /// Opens a writer positioned at `offset` bytes from the start of the sink.
    pub fn at_offset(mut inner: W, offset: u64) -> io::Result<Self> {
        inner.seek(SeekFrom::Start(offset))?;
        Ok(Self::new(inner))
    }

    /// Appends `buf`'s bits to the stream, committing full bytes as they fill.
    pub fn write_bits(&mut self, buf: &BitBuffer) -> io::Result<()> {
        self.pending.append(buf);
        self.bit_position += buf.len() as u64;
        let bytes = self.pending.to_bytes_lsb0();
        self.writer.write_all(&bytes)?;
        let whole_bytes_bits = 8 * (self.pending.len() / 8);
        if self.pending.len() % 8 != 0 {
            self.writer.seek(SeekFrom::Current(-1))?;
            self.pending.drop_leading(whole_bytes_bits);
        } else {
            self.pending = BitBuffer::new();
        }
        Ok(())
    }

    /// Current bit offset since this writer was opened.
    pub fn position(&self) -> u64 {
        self.bit_position
    }

    /// Flushes any partial byte already committed (pad bits are zero, see
    /// `write_bits`) and releases the sink.
    pub fn close(mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Reads bits, LSB-first, from a byte source.
pub struct BitStreamReader<R: Read> {
    reader: BufReader<R>,
    /// Bits read from the source but not yet consumed by `read_bit`.
    pending: BitBuffer,
    ptr: usize,
    bit_position: u64,
}

impl<R: Read> BitStreamReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            pending: BitBuffer::new(),
            ptr: 0,
            bit_position: 0,
        }
    }

    /// Returns the next bit, refilling from the source one byte at a time.
    pub fn read_bit(&mut self) -> io::Result<bool> {
        if self.ptr == self.pending.len() {
            let mut byte = [0u8; 1];
            self.reader.read_exact(&mut byte)?;
            if self.ptr > 512 {
                self.pending.drop_leading(self.ptr);
                self.ptr = 0;
            }
            self.pending.push_byte_lsb0(byte[0]);
        }
        let bit = self.pending.get(self.ptr);
        self.ptr += 1;
        self.bit_position += 1;
        Ok(bit)
    }

    pub fn position(&self) -> u64 {
        self.bit_position
    }

    pub fn close(self) {}
}

impl<R: Read + Seek> BitStreamReader<R> {
    /// Opens a reader positioned at `offset` bytes from the start of the source.
    pub fn at_offset(mut inner: R, offset: u64) -> io::Result<Self> {
        inner.seek(SeekFrom::Start(offset))?;
        Ok(Self::new(inner))
    }
}
