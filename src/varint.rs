//! Variable-length integer encoding (LEB128)
//!
//! Used for text length prefixes and inside the integer-set encoding.

use crate::error::{Corruption, Error, Result};

/// Maximum bytes needed for a u64 varint (10 bytes)
pub const MAX_VARINT_U64_SIZE: usize = 10;

/// Encode a u64 as varint into the given buffer
///
/// Returns the number of bytes written, or `Error::ShortBuffer` if insufficient space.
#[inline]
pub fn encode_u64(value: u64, buf: &mut [u8]) -> Result<usize> {
    let mut value = value;
    let mut pos = 0;

    loop {
        if pos >= buf.len() {
            return Err(Error::ShortBuffer);
        }

        if value < 0x80 {
            buf[pos] = value as u8;
            return Ok(pos + 1);
        }

        buf[pos] = (value as u8) | 0x80;
        value >>= 7;
        pos += 1;
    }
}

/// Number of bytes `value` occupies once encoded
#[inline]
pub const fn encoded_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    (bits + 6) / 7
}

/// Decode a u64 varint pulling one byte at a time from `next`
///
/// `next` reports end of input through its own error.
#[inline]
pub fn read_u64<F>(mut next: F) -> Result<u64>
where
    F: FnMut() -> Result<u8>,
{
    let mut result = 0u64;
    let mut shift = 0u32;

    loop {
        let byte = next()?;

        if shift == 63 && byte > 1 {
            return Err(Corruption::InvalidVarint.into());
        }

        result |= u64::from(byte & 0x7F) << shift;

        if byte & 0x80 == 0 {
            return Ok(result);
        }

        shift += 7;
    }
}
