//! Outer whole-stream envelopes for the top-level API
//!
//! The envelope wraps the complete codec output and never looks inside it.
//!
//! # Framed layout
//!
//! ```text
//! +-----------+--------+----------+-------------+---------+
//! | Magic u16 | Ver u8 | Flags u8 | RawLen u32  | Len u32 |
//! +-----------+--------+----------+-------------+---------+
//! | Body (Len bytes, block-compressed if flagged)         |
//! | CRC32C u32 over header + body                         |
//! +-------------------------------------------------------+
//! ```

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::compress::BlockCompressor;
use crate::crc32c::Crc32c;
use crate::error::{Corruption, Error, Result};
use crate::frame::{FrameFlags, FrameHeader};

/// Whole-stream wrapper applied by `serialize` and removed by `deserialize`
pub trait Envelope: Send + Sync + fmt::Debug {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Write `payload` wrapped into `out`
    fn seal(&self, payload: &[u8], out: &mut dyn Write) -> Result<()>;

    /// Read one wrapped payload from `input`
    fn open(&self, input: &mut dyn Read) -> Result<Vec<u8>>;
}

/// Envelope selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    /// GZIP stream (RFC 1952)
    Gzip {
        /// Compression level (0-9)
        level: u32,
    },
    /// Checksummed frame, body compressed with the configured block compressor
    Framed,
    /// No wrapping at all
    Plain,
}

impl Default for EnvelopeKind {
    fn default() -> Self {
        EnvelopeKind::Gzip { level: 6 }
    }
}

impl EnvelopeKind {
    /// Instantiate the envelope
    pub fn envelope(
        self,
        compressor: Arc<dyn BlockCompressor>,
        max_size: usize,
    ) -> Arc<dyn Envelope> {
        match self {
            EnvelopeKind::Gzip { level } => Arc::new(Gzip::new(level, max_size)),
            EnvelopeKind::Framed => Arc::new(Framed::new(compressor, max_size)),
            EnvelopeKind::Plain => Arc::new(Plain { max_size }),
        }
    }
}

fn stream_error(err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput => {
            Error::StreamCorruption(Corruption::Decompression)
        }
        _ => Error::from(err),
    }
}

/// Read everything left in `input`, failing once more than `max_size` bytes arrive
fn read_bounded<R: Read>(input: R, max_size: usize) -> Result<Vec<u8>> {
    let mut out: Vec<u8> = Vec::new();
    input
        .take(max_size as u64 + 1)
        .read_to_end(&mut out)
        .map_err(stream_error)?;
    if out.len() > max_size {
        return Err(Corruption::CountMismatch {
            expected: max_size,
            actual: out.len(),
        }
        .into());
    }
    Ok(out)
}

/// GZIP envelope via flate2
#[derive(Debug, Clone, Copy)]
pub struct Gzip {
    level: u32,
    max_size: usize,
}

impl Gzip {
    /// Create a gzip envelope; `level` is clamped to 0-9
    pub fn new(level: u32, max_size: usize) -> Self {
        Self {
            level: level.min(9),
            max_size,
        }
    }
}

impl Envelope for Gzip {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn seal(&self, payload: &[u8], out: &mut dyn Write) -> Result<()> {
        let mut encoder = GzEncoder::new(out, Compression::new(self.level));
        encoder.write_all(payload)?;
        encoder.finish()?.flush()?;
        Ok(())
    }

    fn open(&self, input: &mut dyn Read) -> Result<Vec<u8>> {
        read_bounded(GzDecoder::new(input), self.max_size)
    }
}

/// CRC32C-checked frame
#[derive(Debug, Clone)]
pub struct Framed {
    compressor: Arc<dyn BlockCompressor>,
    max_size: usize,
}

impl Framed {
    /// Create a framed envelope compressing its body with `compressor`
    pub fn new(compressor: Arc<dyn BlockCompressor>, max_size: usize) -> Self {
        Self {
            compressor,
            max_size,
        }
    }
}

impl Envelope for Framed {
    fn name(&self) -> &'static str {
        "framed"
    }

    fn seal(&self, payload: &[u8], out: &mut dyn Write) -> Result<()> {
        let compressed = self.compressor.compress(payload)?;
        let (flags, body) = if compressed.len() < payload.len() {
            (FrameFlags::COMPRESSED, compressed.as_slice())
        } else {
            (0, payload)
        };

        let raw_len = u32::try_from(payload.len()).map_err(|_| Error::ShortBuffer)?;
        let len = u32::try_from(body.len()).map_err(|_| Error::ShortBuffer)?;
        let mut header = FrameHeader::new(raw_len, len);
        header.set_flag(flags);

        let header = header.encode();
        let mut crc = Crc32c::new();
        crc.update(&header);
        crc.update(body);

        out.write_all(&header)?;
        out.write_all(body)?;
        out.write_all(&crc.finish().to_le_bytes())?;
        out.flush()?;
        Ok(())
    }

    fn open(&self, input: &mut dyn Read) -> Result<Vec<u8>> {
        let mut head = [0u8; FrameHeader::SIZE];
        input.read_exact(&mut head)?;
        let header = FrameHeader::decode(&head)?;
        header.validate(self.max_size)?;

        // grows with the bytes that actually arrive, not the declared length
        let len = header.len as usize;
        let mut body: Vec<u8> = Vec::new();
        (&mut *input).take(len as u64).read_to_end(&mut body)?;
        if body.len() != len {
            return Err(Corruption::UnexpectedEof.into());
        }
        let mut stored = [0u8; FrameHeader::CRC_SIZE];
        input.read_exact(&mut stored)?;

        let mut crc = Crc32c::new();
        crc.update(&head);
        crc.update(&body);
        if crc.finish() != u32::from_le_bytes(stored) {
            return Err(Corruption::CrcMismatch.into());
        }

        if !header.has_flag(FrameFlags::COMPRESSED) {
            return Ok(body);
        }

        let raw_len = header.raw_len as usize;
        let payload = self.compressor.decompress(&body, raw_len)?;
        if payload.len() != raw_len {
            return Err(Corruption::CountMismatch {
                expected: raw_len,
                actual: payload.len(),
            }
            .into());
        }
        Ok(payload)
    }
}

/// Identity envelope
#[derive(Debug, Clone, Copy)]
pub struct Plain {
    max_size: usize,
}

impl Envelope for Plain {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn seal(&self, payload: &[u8], out: &mut dyn Write) -> Result<()> {
        out.write_all(payload)?;
        Ok(())
    }

    fn open(&self, input: &mut dyn Read) -> Result<Vec<u8>> {
        read_bounded(input, self.max_size)
    }
}
