//! Block compression for dense scalar payloads
//!
//! Primitive arrays and boxed-scalar collections pass their packed element
//! buffer through a [`BlockCompressor`] before it is written as a
//! length-prefixed block. Nothing else is compressed at this layer.
//!
//! # Compression Algorithms
//!
//! - **LZ4** (feature `lz4`, default): fast, the engine default
//! - **Deflate** (always available via flate2): better ratio, slower
//! - **None**: bytes are stored as-is

use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::error::{Corruption, Error, Result};

/// Pluggable byte-buffer compression
///
/// Implementations must be deterministic in the decompressed output; the
/// compressed bytes themselves may differ between runs.
pub trait BlockCompressor: Send + Sync + fmt::Debug {
    /// Short algorithm name used in logs
    fn name(&self) -> &'static str;

    /// Compress a packed buffer
    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>>;

    /// Decompress a block back to its packed form
    ///
    /// `expected_len` is the size the caller will insist on; implementations
    /// use it to bound allocation and may return any other length, which the
    /// caller reports as corruption.
    fn decompress(&self, compressed: &[u8], expected_len: usize) -> Result<Vec<u8>>;
}

/// Compression algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionAlgo {
    /// No compression
    None,
    /// LZ4 block compression (requires `lz4` feature)
    #[cfg(feature = "lz4")]
    Lz4,
    /// Deflate compression at the given level (1-9)
    Deflate {
        /// Compression level
        level: u32,
    },
}

impl Default for CompressionAlgo {
    fn default() -> Self {
        #[cfg(feature = "lz4")]
        {
            CompressionAlgo::Lz4
        }
        #[cfg(not(feature = "lz4"))]
        {
            CompressionAlgo::Deflate { level: 6 }
        }
    }
}

impl CompressionAlgo {
    /// Instantiate the compressor for this algorithm
    pub fn compressor(self) -> Arc<dyn BlockCompressor> {
        match self {
            CompressionAlgo::None => Arc::new(Stored),
            #[cfg(feature = "lz4")]
            CompressionAlgo::Lz4 => Arc::new(Lz4),
            CompressionAlgo::Deflate { level } => Arc::new(Deflate::new(level)),
        }
    }
}

/// Pass-through compressor
#[derive(Debug, Clone, Copy, Default)]
pub struct Stored;

impl BlockCompressor for Stored {
    fn name(&self) -> &'static str {
        "stored"
    }

    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        Ok(raw.to_vec())
    }

    fn decompress(&self, compressed: &[u8], _expected_len: usize) -> Result<Vec<u8>> {
        Ok(compressed.to_vec())
    }
}

/// LZ4 block format with the uncompressed size prepended
#[cfg(feature = "lz4")]
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4;

#[cfg(feature = "lz4")]
impl BlockCompressor for Lz4 {
    fn name(&self) -> &'static str {
        "lz4"
    }

    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        Ok(lz4_flex::compress_prepend_size(raw))
    }

    fn decompress(&self, compressed: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        let prefix: [u8; 4] = compressed
            .get(..4)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(Corruption::Decompression)?;
        let declared = u32::from_le_bytes(prefix) as usize;
        if declared != expected_len {
            return Err(Corruption::CountMismatch {
                expected: expected_len,
                actual: declared,
            }
            .into());
        }
        lz4_flex::decompress_size_prepended(compressed)
            .map_err(|_| Error::StreamCorruption(Corruption::Decompression))
    }
}

/// Raw deflate stream via flate2
#[derive(Debug, Clone, Copy)]
pub struct Deflate {
    level: u32,
}

impl Deflate {
    /// Create a deflate compressor; `level` is clamped to 0-9
    pub fn new(level: u32) -> Self {
        Self {
            level: level.min(9),
        }
    }
}

impl Default for Deflate {
    fn default() -> Self {
        Self::new(6)
    }
}

impl BlockCompressor for Deflate {
    fn name(&self) -> &'static str {
        "deflate"
    }

    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(self.level));
        encoder.write_all(raw)?;
        Ok(encoder.finish()?)
    }

    fn decompress(&self, compressed: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        // one byte of slack lets the caller see an overlong block
        let limit = expected_len as u64 + 1;
        let mut output = Vec::with_capacity(expected_len.min(1 << 20));
        DeflateDecoder::new(compressed)
            .take(limit)
            .read_to_end(&mut output)
            .map_err(|_| Error::StreamCorruption(Corruption::Decompression))?;
        Ok(output)
    }
}
