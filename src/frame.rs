//! Header of the framed envelope

use crate::error::{Corruption, Result};

/// Magic number opening every framed envelope
pub const ENVELOPE_MAGIC: u16 = 0xF1D0;

/// Current envelope version
pub const ENVELOPE_VERSION: u8 = 1;

/// Envelope header structure (12 bytes, little-endian)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Magic number
    pub magic: u16,
    /// Envelope version
    pub ver: u8,
    /// Frame flags
    pub flags: u8,
    /// Payload length before compression
    pub raw_len: u32,
    /// Body length in bytes
    pub len: u32,
}

/// Frame flags bit definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFlags;

impl FrameFlags {
    /// Body went through the block compressor (bit 0)
    pub const COMPRESSED: u8 = 0x01;

    /// Reserved flags mask
    pub const RESERVED: u8 = 0xFE;
}

impl FrameHeader {
    /// Header size in bytes (fixed)
    pub const SIZE: usize = 12;

    /// Trailing checksum size in bytes
    pub const CRC_SIZE: usize = 4;

    /// Create a new frame header
    #[inline]
    pub fn new(raw_len: u32, len: u32) -> Self {
        Self {
            magic: ENVELOPE_MAGIC,
            ver: ENVELOPE_VERSION,
            flags: 0,
            raw_len,
            len,
        }
    }

    /// Set a flag bit
    #[inline]
    pub fn set_flag(&mut self, flag: u8) {
        self.flags |= flag;
    }

    /// Check if a flag bit is set
    #[inline]
    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    /// Validate frame header against a size limit for the whole frame
    #[inline]
    pub fn validate(&self, max_size: usize) -> Result<()> {
        if self.magic != ENVELOPE_MAGIC {
            return Err(Corruption::InvalidMagic.into());
        }

        if self.ver != ENVELOPE_VERSION || self.flags & FrameFlags::RESERVED != 0 {
            return Err(Corruption::UnsupportedVersion.into());
        }

        if self.total_size() > max_size || self.raw_len as usize > max_size {
            return Err(Corruption::CountMismatch {
                expected: max_size,
                actual: self.total_size().max(self.raw_len as usize),
            }
            .into());
        }

        if !self.has_flag(FrameFlags::COMPRESSED) && self.raw_len != self.len {
            return Err(Corruption::CountMismatch {
                expected: self.raw_len as usize,
                actual: self.len as usize,
            }
            .into());
        }

        Ok(())
    }

    /// Encode header to bytes (little-endian)
    #[inline]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..2].copy_from_slice(&self.magic.to_le_bytes());
        buf[2] = self.ver;
        buf[3] = self.flags;
        buf[4..8].copy_from_slice(&self.raw_len.to_le_bytes());
        buf[8..12].copy_from_slice(&self.len.to_le_bytes());
        buf
    }

    /// Decode header from bytes (little-endian); does not validate
    #[inline]
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(Corruption::UnexpectedEof.into());
        }

        Ok(Self {
            magic: u16::from_le_bytes([buf[0], buf[1]]),
            ver: buf[2],
            flags: buf[3],
            raw_len: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            len: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
        })
    }

    /// Calculate total frame size including header and CRC
    #[inline]
    pub fn total_size(&self) -> usize {
        Self::SIZE + self.len as usize + Self::CRC_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_header_encode_decode() {
        let mut header = FrameHeader::new(1000, 100);
        header.set_flag(FrameFlags::COMPRESSED);

        let buf = header.encode();
        let decoded = FrameHeader::decode(&buf).unwrap();
        assert_eq!(header, decoded);
        assert!(decoded.validate(1 << 20).is_ok());
        assert_eq!(decoded.total_size(), 116);
    }

    #[test]
    fn test_header_validation() {
        let mut header = FrameHeader::new(10, 10);
        assert!(header.validate(1024).is_ok());

        header.magic = 0x1234;
        assert!(matches!(
            header.validate(1024),
            Err(Error::StreamCorruption(Corruption::InvalidMagic))
        ));
        header.magic = ENVELOPE_MAGIC;

        header.ver = 99;
        assert!(matches!(
            header.validate(1024),
            Err(Error::StreamCorruption(Corruption::UnsupportedVersion))
        ));
        header.ver = ENVELOPE_VERSION;

        header.flags = 0x80;
        assert!(header.validate(1024).is_err());
        header.flags = 0;

        // uncompressed body must match its declared raw length
        header.len = 11;
        assert!(header.validate(1024).is_err());
        header.len = 10;

        assert!(header.validate(20).is_err());
    }

    #[test]
    fn test_short_header() {
        assert!(FrameHeader::decode(&[0u8; 5]).is_err());
    }
}
