//! Byte sinks the codecs write into
//!
//! All fixed-width values are little-endian. [`BufferSink`] writes into a
//! caller-provided slice without allocating, `Vec<u8>` grows as needed, and
//! [`WriteSink`] forwards to any [`std::io::Write`].

use std::io::Write;

use crate::error::{Error, Result};
use crate::varint;

/// Destination for encoded bytes
///
/// Only [`Sink::put_bytes`] is required; every other method is expressed in
/// terms of it.
pub trait Sink {
    /// Write raw bytes without length prefix
    fn put_bytes(&mut self, bytes: &[u8]) -> Result<()>;

    /// Write a u8 value
    #[inline]
    fn put_u8(&mut self, value: u8) -> Result<()> {
        self.put_bytes(&[value])
    }

    /// Write a u16 value (little-endian)
    #[inline]
    fn put_u16(&mut self, value: u16) -> Result<()> {
        self.put_bytes(&value.to_le_bytes())
    }

    /// Write a u32 value (little-endian)
    #[inline]
    fn put_u32(&mut self, value: u32) -> Result<()> {
        self.put_bytes(&value.to_le_bytes())
    }

    /// Write a u64 value (little-endian)
    #[inline]
    fn put_u64(&mut self, value: u64) -> Result<()> {
        self.put_bytes(&value.to_le_bytes())
    }

    /// Write an i32 value (little-endian)
    #[inline]
    fn put_i32(&mut self, value: i32) -> Result<()> {
        self.put_u32(value as u32)
    }

    /// Write an i64 value (little-endian)
    #[inline]
    fn put_i64(&mut self, value: i64) -> Result<()> {
        self.put_u64(value as u64)
    }

    /// Write a varint-encoded u64
    #[inline]
    fn put_varint_u64(&mut self, value: u64) -> Result<()> {
        let mut buf = [0u8; varint::MAX_VARINT_U64_SIZE];
        let len = varint::encode_u64(value, &mut buf)?;
        self.put_bytes(&buf[..len])
    }

    /// Write variable-length bytes with a varint length prefix
    #[inline]
    fn put_varbytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.put_varint_u64(bytes.len() as u64)?;
        self.put_bytes(bytes)
    }

    /// Write UTF-8 text with a varint length prefix
    #[inline]
    fn put_str(&mut self, text: &str) -> Result<()> {
        self.put_varbytes(text.as_bytes())
    }

    /// Write a byte block with a 4-byte length prefix
    #[inline]
    fn put_block(&mut self, block: &[u8]) -> Result<()> {
        let len = u32::try_from(block.len()).map_err(|_| Error::ShortBuffer)?;
        self.put_u32(len)?;
        self.put_bytes(block)
    }
}

impl Sink for Vec<u8> {
    #[inline]
    fn put_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

impl<S: Sink + ?Sized> Sink for &mut S {
    #[inline]
    fn put_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).put_bytes(bytes)
    }
}

/// Sink that writes into a user-provided buffer
#[derive(Debug)]
pub struct BufferSink<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> BufferSink<'a> {
    /// Create new sink over the given buffer
    #[inline]
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Get current position in buffer
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Get remaining buffer capacity
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Reset sink for reuse with the same buffer
    #[inline]
    pub fn reset(&mut self) {
        self.pos = 0;
    }

    /// Get a slice of the encoded data
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.pos]
    }
}

impl Sink for BufferSink<'_> {
    #[inline]
    fn put_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if self.pos + bytes.len() > self.buf.len() {
            return Err(Error::ShortBuffer);
        }
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        Ok(())
    }
}

/// Sink forwarding to an [`std::io::Write`]
///
/// No buffering is added; wrap the writer in a `BufWriter` when it is
/// unbuffered.
#[derive(Debug)]
pub struct WriteSink<W> {
    inner: W,
}

impl<W: Write> WriteSink<W> {
    /// Wrap a writer
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Flush the writer and hand it back
    pub fn finish(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Sink for WriteSink<W> {
    #[inline]
    fn put_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        Ok(())
    }
}
