//! Byte sources the codecs read from
//!
//! [`ByteCursor`] reads a borrowed slice with zero-copy access,
//! [`ReadSource`] pulls from any [`std::io::Read`].

use std::io::Read;

use crate::error::{Corruption, Result};
use crate::varint;

/// Upper bound on a single speculative allocation driven by a length header
const READ_CHUNK: usize = 64 * 1024;

/// Origin of encoded bytes
///
/// Only [`Source::get_exact`] is required. Running out of input is reported
/// as [`Corruption::UnexpectedEof`].
pub trait Source {
    /// Fill `buf` completely
    fn get_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Read `len` bytes into a fresh vector
    ///
    /// The vector grows in bounded steps, so a corrupt length header fails
    /// on end of input instead of reserving the claimed size up front.
    fn get_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(len.min(READ_CHUNK));
        while out.len() < len {
            let start = out.len();
            let step = (len - start).min(READ_CHUNK);
            out.resize(start + step, 0);
            self.get_exact(&mut out[start..])?;
        }
        Ok(out)
    }

    /// Read a u8 value
    #[inline]
    fn get_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.get_exact(&mut buf)?;
        Ok(buf[0])
    }

    /// Read a u16 value (little-endian)
    #[inline]
    fn get_u16(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.get_exact(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    /// Read a u32 value (little-endian)
    #[inline]
    fn get_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.get_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Read a u64 value (little-endian)
    #[inline]
    fn get_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.get_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Read an i32 value (little-endian)
    #[inline]
    fn get_i32(&mut self) -> Result<i32> {
        Ok(self.get_u32()? as i32)
    }

    /// Read an i64 value (little-endian)
    #[inline]
    fn get_i64(&mut self) -> Result<i64> {
        Ok(self.get_u64()? as i64)
    }

    /// Read a varint-encoded u64
    #[inline]
    fn get_varint_u64(&mut self) -> Result<u64> {
        varint::read_u64(|| self.get_u8())
    }

    /// Read variable-length bytes with a varint length prefix
    fn get_varbytes(&mut self) -> Result<Vec<u8>> {
        let len = self.get_varint_u64()?;
        let len = usize::try_from(len).map_err(|_| Corruption::UnexpectedEof)?;
        self.get_vec(len)
    }

    /// Read UTF-8 text with a varint length prefix
    fn get_string(&mut self) -> Result<String> {
        let bytes = self.get_varbytes()?;
        String::from_utf8(bytes).map_err(|_| Corruption::InvalidUtf8.into())
    }

    /// Read a byte block with a 4-byte length prefix
    fn get_block(&mut self) -> Result<Vec<u8>> {
        let len = self.get_u32()? as usize;
        self.get_vec(len)
    }
}

impl<S: Source + ?Sized> Source for &mut S {
    #[inline]
    fn get_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        (**self).get_exact(buf)
    }

    #[inline]
    fn get_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        (**self).get_vec(len)
    }
}

/// Cursor over a borrowed buffer with position tracking
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    /// Create a cursor at the start of `buf`
    #[inline]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current read position
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Get remaining bytes in cursor
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Check if cursor is at end
    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Skip bytes in the cursor
    #[inline]
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.get_slice(n).map(|_| ())
    }

    /// Read raw bytes without copying
    #[inline]
    pub fn get_slice(&mut self, len: usize) -> Result<&'a [u8]> {
        let bytes = self.peek_bytes(len)?;
        self.pos += len;
        Ok(bytes)
    }

    /// Peek at bytes without advancing cursor
    #[inline]
    pub fn peek_bytes(&self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(Corruption::UnexpectedEof.into());
        }
        Ok(&self.buf[self.pos..self.pos + len])
    }
}

impl Source for ByteCursor<'_> {
    #[inline]
    fn get_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let bytes = self.get_slice(buf.len())?;
        buf.copy_from_slice(bytes);
        Ok(())
    }

    #[inline]
    fn get_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        self.get_slice(len).map(<[u8]>::to_vec)
    }
}

/// Source pulling from an [`std::io::Read`]
#[derive(Debug)]
pub struct ReadSource<R> {
    inner: R,
}

impl<R: Read> ReadSource<R> {
    /// Wrap a reader
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read> Source for ReadSource<R> {
    #[inline]
    fn get_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Sink;
    use crate::error::Error;

    #[test]
    fn test_cursor_basic() {
        let mut buf: Vec<u8> = Vec::new();
        buf.put_u64(1_000_000_000).unwrap();
        buf.put_i64(-50_000_000).unwrap();
        buf.put_u32(100).unwrap();

        let mut cursor = ByteCursor::new(&buf);
        assert_eq!(cursor.get_u64().unwrap(), 1_000_000_000);
        assert_eq!(cursor.get_i64().unwrap(), -50_000_000);
        assert_eq!(cursor.get_u32().unwrap(), 100);
        assert!(cursor.is_at_end());
    }

    #[test]
    fn test_cursor_strings() {
        let mut buf: Vec<u8> = Vec::new();
        buf.put_str("AAPL").unwrap();
        buf.put_str("").unwrap();
        buf.put_str("Hello, World!").unwrap();

        let mut cursor = ByteCursor::new(&buf);
        assert_eq!(cursor.get_string().unwrap(), "AAPL");
        assert_eq!(cursor.get_string().unwrap(), "");
        assert_eq!(cursor.get_string().unwrap(), "Hello, World!");
        assert!(cursor.is_at_end());
    }

    #[test]
    fn test_cursor_eof() {
        let buf = [1u8, 2, 3];
        let mut cursor = ByteCursor::new(&buf);

        assert!(matches!(
            cursor.get_u32(),
            Err(Error::StreamCorruption(Corruption::UnexpectedEof))
        ));
        assert_eq!(cursor.position(), 0);
        assert_eq!(cursor.peek_bytes(2).unwrap(), &[1, 2]);
        cursor.skip(2).unwrap();
        assert_eq!(cursor.remaining(), 1);
    }

    #[test]
    fn test_block_with_lying_length() {
        let mut buf: Vec<u8> = Vec::new();
        buf.put_u32(u32::MAX).unwrap();
        buf.put_bytes(&[0; 16]).unwrap();

        let mut cursor = ByteCursor::new(&buf);
        assert!(cursor.get_block().unwrap_err().is_corruption());

        let mut reader = ReadSource::new(&buf[..]);
        assert!(reader.get_block().unwrap_err().is_corruption());
    }

    #[test]
    fn test_invalid_utf8() {
        let mut buf: Vec<u8> = Vec::new();
        buf.put_varbytes(&[0xFF, 0xFE]).unwrap();

        let mut cursor = ByteCursor::new(&buf);
        assert!(matches!(
            cursor.get_string(),
            Err(Error::StreamCorruption(Corruption::InvalidUtf8))
        ));
    }

    #[test]
    fn test_read_source() {
        let mut buf: Vec<u8> = Vec::new();
        buf.put_u16(0xBEEF).unwrap();
        buf.put_varint_u64(300).unwrap();

        let mut source = ReadSource::new(std::io::Cursor::new(buf));
        assert_eq!(source.get_u16().unwrap(), 0xBEEF);
        assert_eq!(source.get_varint_u64().unwrap(), 300);
        assert!(source.get_u8().is_err());
    }
}
