//! Engine configuration

use crate::compress::CompressionAlgo;
use crate::envelope::EnvelopeKind;

/// Default upper bound on an enveloped stream (1 GiB)
pub const DEFAULT_MAX_ENVELOPE_SIZE: usize = 1 << 30;

/// Default upper bound on a decoded element count
pub const DEFAULT_MAX_SEQUENCE_LEN: usize = 1 << 24;

/// Settings fixed when a [`Registry`](crate::Registry) is created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Block compressor for dense scalar payloads
    pub compression: CompressionAlgo,
    /// Outer envelope used by `serialize`/`deserialize`
    pub envelope: EnvelopeKind,
    /// Largest enveloped stream accepted when reading, in bytes
    pub max_envelope_size: usize,
    /// Largest element count accepted for an array, collection or map
    pub max_sequence_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            compression: CompressionAlgo::default(),
            envelope: EnvelopeKind::default(),
            max_envelope_size: DEFAULT_MAX_ENVELOPE_SIZE,
            max_sequence_len: DEFAULT_MAX_SEQUENCE_LEN,
        }
    }
}

impl Config {
    /// Select the block compressor
    pub fn with_compression(mut self, compression: CompressionAlgo) -> Self {
        self.compression = compression;
        self
    }

    /// Select the outer envelope
    pub fn with_envelope(mut self, envelope: EnvelopeKind) -> Self {
        self.envelope = envelope;
        self
    }

    /// Cap the size of enveloped input
    pub fn with_max_envelope_size(mut self, max_envelope_size: usize) -> Self {
        self.max_envelope_size = max_envelope_size;
        self
    }

    /// Cap the element count of decoded sequences
    pub fn with_max_sequence_len(mut self, max_sequence_len: usize) -> Self {
        self.max_sequence_len = max_sequence_len;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.envelope, EnvelopeKind::Gzip { level: 6 });
        assert_eq!(config.max_envelope_size, DEFAULT_MAX_ENVELOPE_SIZE);
        assert_eq!(config.max_sequence_len, DEFAULT_MAX_SEQUENCE_LEN);
        #[cfg(feature = "lz4")]
        assert_eq!(config.compression, CompressionAlgo::Lz4);
    }

    #[test]
    fn test_builder_chain() {
        let config = Config::default()
            .with_compression(CompressionAlgo::None)
            .with_envelope(EnvelopeKind::Framed)
            .with_max_envelope_size(4096)
            .with_max_sequence_len(16);

        assert_eq!(config.compression, CompressionAlgo::None);
        assert_eq!(config.envelope, EnvelopeKind::Framed);
        assert_eq!(config.max_envelope_size, 4096);
        assert_eq!(config.max_sequence_len, 16);
    }
}
