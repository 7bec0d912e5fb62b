//! CRC32C (Castagnoli) checksum guarding the framed envelope

/// CRC32C polynomial (Castagnoli, reflected)
const CRC32C_POLYNOMIAL: u32 = 0x82F63B78;

/// Pre-computed CRC32C lookup table
static CRC32C_TABLE: [u32; 256] = generate_crc32c_table();

/// Generate CRC32C lookup table at compile time
const fn generate_crc32c_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;

        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ CRC32C_POLYNOMIAL;
            } else {
                crc >>= 1;
            }
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Incremental CRC32C state
#[derive(Debug, Clone, Copy)]
pub struct Crc32c {
    state: u32,
}

impl Default for Crc32c {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc32c {
    /// Fresh checksum state
    #[inline]
    pub const fn new() -> Self {
        Self { state: 0xFFFFFFFF }
    }

    /// Feed more bytes
    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        let mut crc = self.state;
        for &byte in data {
            let table_idx = ((crc ^ byte as u32) & 0xFF) as usize;
            crc = (crc >> 8) ^ CRC32C_TABLE[table_idx];
        }
        self.state = crc;
    }

    /// Final checksum value
    #[inline]
    pub const fn finish(self) -> u32 {
        !self.state
    }
}

/// Compute CRC32C checksum of the given data
#[inline]
pub fn crc32c(data: &[u8]) -> u32 {
    let mut crc = Crc32c::new();
    crc.update(data);
    crc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_value() {
        assert_eq!(crc32c(b"123456789"), 0xE3069283);
        assert_eq!(crc32c(b""), 0);
    }

    #[test]
    fn test_incremental_matches_oneshot() {
        let data = b"Lorem ipsum dolor sit amet, consectetur adipiscing elit";
        let mut crc = Crc32c::new();
        crc.update(&data[..10]);
        crc.update(&data[10..]);
        assert_eq!(crc.finish(), crc32c(data));
        assert_ne!(crc32c(data), crc32c(&data[1..]));
    }
}
