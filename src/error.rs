//! Error types for codec construction, encoding and decoding

use core::fmt;

/// Boxed error used for failures raised by user code (factories, delegates)
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by the engine
///
/// Schema-level problems (`UnsupportedType`, `MissingConstructor`) are raised
/// when a codec is built, never while a value is being encoded.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No codec family matches the type
    #[error("unsupported type `{type_name}`: {reason}")]
    UnsupportedType {
        /// Offending type
        type_name: &'static str,
        /// Why dispatch rejected it
        reason: &'static str,
    },

    /// The type has no zero-argument construction strategy
    #[error("type `{0}` has no zero-argument factory")]
    MissingConstructor(&'static str),

    /// The factory ran and failed at decode time
    #[error("failed to construct `{type_name}`")]
    ConstructionFailure {
        /// Type being constructed
        type_name: &'static str,
        /// Error returned by the factory
        #[source]
        source: BoxError,
    },

    /// Input bytes do not describe a valid value
    #[error("stream corruption: {0}")]
    StreamCorruption(Corruption),

    /// The opaque delegate failed to (de)serialize
    #[error("opaque delegate failed for `{type_name}`")]
    DelegateFailure {
        /// Type handed to the delegate
        type_name: &'static str,
        /// Delegate error
        #[source]
        source: BoxError,
    },

    /// Fixed-size sink ran out of room
    #[error("buffer too small for operation")]
    ShortBuffer,

    /// Underlying reader or writer failed
    #[error(transparent)]
    Io(std::io::Error),
}

/// Detail of a [`Error::StreamCorruption`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Corruption {
    /// Fewer bytes than a header promised
    UnexpectedEof,
    /// Decoded length differs from the declared count
    CountMismatch {
        /// Declared in the stream
        expected: usize,
        /// Actually decoded
        actual: usize,
    },
    /// Presence byte other than 0 or 1
    InvalidPresence(u8),
    /// Null marker for a value that cannot be null
    UnexpectedNull,
    /// Malformed LEB128 integer
    InvalidVarint,
    /// Declared element count above the configured limit
    SequenceTooLong(usize),
    /// Text is not UTF-8
    InvalidUtf8,
    /// Not a Unicode scalar value
    InvalidChar(u32),
    /// Enumeration constant name not declared by the type
    UnknownVariant(String),
    /// Integer set is malformed or indexes past its sequence
    InvalidIndexSet,
    /// Temporal components out of range
    InvalidTemporal,
    /// Block compressor rejected its input
    Decompression,
    /// Envelope checksum mismatch
    CrcMismatch,
    /// Envelope magic number mismatch
    InvalidMagic,
    /// Envelope version or flags not understood
    UnsupportedVersion,
}

impl Corruption {
    /// Returns a human-readable description of the corruption
    pub const fn description(&self) -> &'static str {
        match self {
            Corruption::UnexpectedEof => "unexpected end of stream",
            Corruption::CountMismatch { .. } => "decoded length differs from declared count",
            Corruption::InvalidPresence(_) => "invalid presence byte",
            Corruption::UnexpectedNull => "null value for a non-optional slot",
            Corruption::InvalidVarint => "invalid varint encoding",
            Corruption::SequenceTooLong(_) => "element count exceeds the configured limit",
            Corruption::InvalidUtf8 => "text is not valid UTF-8",
            Corruption::InvalidChar(_) => "invalid unicode scalar value",
            Corruption::UnknownVariant(_) => "unknown enumeration constant",
            Corruption::InvalidIndexSet => "malformed integer set",
            Corruption::InvalidTemporal => "temporal value out of range",
            Corruption::Decompression => "block decompression failed",
            Corruption::CrcMismatch => "CRC32C checksum verification failed",
            Corruption::InvalidMagic => "invalid magic number in envelope header",
            Corruption::UnsupportedVersion => "unsupported envelope version",
        }
    }
}

impl fmt::Display for Corruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Corruption::CountMismatch { expected, actual } => {
                write!(f, "{} (expected {expected}, got {actual})", self.description())
            }
            Corruption::InvalidPresence(byte) => write!(f, "{} ({byte:#04x})", self.description()),
            Corruption::InvalidChar(code) => write!(f, "{} ({code:#x})", self.description()),
            Corruption::SequenceTooLong(count) => write!(f, "{} ({count})", self.description()),
            Corruption::UnknownVariant(name) => write!(f, "{} `{name}`", self.description()),
            _ => f.write_str(self.description()),
        }
    }
}

impl From<Corruption> for Error {
    fn from(corruption: Corruption) -> Self {
        Error::StreamCorruption(corruption)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::StreamCorruption(Corruption::UnexpectedEof)
        } else {
            Error::Io(err)
        }
    }
}

impl Error {
    /// Build an [`Error::UnsupportedType`] for `T`
    pub fn unsupported<T: ?Sized>(reason: &'static str) -> Self {
        Error::UnsupportedType {
            type_name: core::any::type_name::<T>(),
            reason,
        }
    }

    /// Returns `true` for errors raised while reading malformed input
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::StreamCorruption(_))
    }
}

/// Result type alias for engine operations
pub type Result<T> = core::result::Result<T, Error>;
