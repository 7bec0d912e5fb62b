//! Codec contract, type shapes and presence framing
//!
//! Every nullable value is preceded by one presence byte (`0` = null,
//! `1` = present). Fixed-width scalars and class values carry none: the
//! schema alone determines how many bytes follow.

use std::sync::Arc;

use crate::decoder::Source;
use crate::encoder::Sink;
use crate::error::{Corruption, Error, Result};
use crate::lang::EnumTable;
use crate::primitive::{BoxedAccess, ScalarAccess};
use crate::registry::{self, Registry};
use crate::schema::ClassDescriptor;

/// Presence byte for a null value
pub const ABSENT: u8 = 0;

/// Presence byte for a non-null value
pub const PRESENT: u8 = 1;

/// Largest number of elements reserved up front from a decoded count
pub(crate) const MAX_PREALLOC: usize = 4096;

/// Encode/decode behavior for one logical type
///
/// Codecs hold no mutable state once built and may be shared across
/// threads.
pub trait Codec<T>: Send + Sync {
    /// Write `value` into `sink`
    fn encode(&self, value: &T, sink: &mut dyn Sink) -> Result<()>;

    /// Read one value from `source`
    fn decode(&self, source: &mut dyn Source) -> Result<T>;
}

impl<T, C: Codec<T> + ?Sized> Codec<T> for &'static C {
    #[inline]
    fn encode(&self, value: &T, sink: &mut dyn Sink) -> Result<()> {
        (**self).encode(value, sink)
    }

    #[inline]
    fn decode(&self, source: &mut dyn Source) -> Result<T> {
        (**self).decode(source)
    }
}

/// Builds a payload codec, resolving component codecs through the registry
pub type Resolver<T> = fn(&Registry) -> Result<Arc<dyn Codec<T>>>;

/// Codec family of a type, in dispatch precedence order
///
/// The first variant that applies wins; [`Externalize::shape`] picks it at
/// compile time.
pub enum Shape<T: 'static> {
    /// Fixed-width scalar, never null, no presence byte
    Primitive(Arc<dyn ScalarAccess<T>>),
    /// `Vec`-like array; the resolver dispatches on the element kind
    Array(Resolver<T>),
    /// Collection built through a zero-argument factory
    Collection(Resolver<T>),
    /// Map built through a zero-argument factory
    Map(Resolver<T>),
    /// UTF-8 text
    Text(&'static dyn Codec<T>),
    /// Optional scalar
    Boxed(Arc<dyn ScalarAccess<T>>),
    /// Enumeration encoded by constant name
    Enum(EnumTable<T>),
    /// Calendar, instant or duration value
    Temporal(&'static dyn Codec<T>),
    /// Structural codec built from the class descriptor
    Class(fn() -> ClassDescriptor<T>),
    /// Optional non-scalar value
    Nullable(Resolver<T>),
    /// Opaque blob produced by a generic delegate
    Opaque(Resolver<T>),
    /// No codec family applies
    Unsupported(&'static str),
}

impl<T: 'static> Shape<T> {
    /// Family name, used in logs
    pub fn family(&self) -> &'static str {
        match self {
            Shape::Primitive(_) => "primitive",
            Shape::Array(_) => "array",
            Shape::Collection(_) => "collection",
            Shape::Map(_) => "map",
            Shape::Text(_) => "text",
            Shape::Boxed(_) => "boxed",
            Shape::Enum(_) => "enum",
            Shape::Temporal(_) => "temporal",
            Shape::Class(_) => "class",
            Shape::Nullable(_) => "nullable",
            Shape::Opaque(_) => "opaque",
            Shape::Unsupported(_) => "unsupported",
        }
    }

    /// Whether the payload codec already handles presence on its own
    ///
    /// Scalars and classes are never null; boxed and nullable payloads write
    /// their own presence byte. Every other family gets a mandatory one.
    pub(crate) fn frames_itself(&self) -> bool {
        matches!(
            self,
            Shape::Primitive(_) | Shape::Boxed(_) | Shape::Class(_) | Shape::Nullable(_)
        )
    }
}

/// Types the engine can derive a codec for
///
/// Implemented for scalars, `String`, `Option`, `Vec`, the std collections
/// and maps, temporal types, and via `#[derive(Externalize)]` for structs
/// and unit-only enums.
pub trait Externalize: Sized + 'static {
    /// Codec family of `Self`
    fn shape() -> Shape<Self>;
}

impl<E: Externalize> Externalize for Option<E> {
    fn shape() -> Shape<Self> {
        match E::shape() {
            Shape::Primitive(access) => Shape::Boxed(Arc::new(BoxedAccess::new(access))),
            Shape::Boxed(_) | Shape::Nullable(_) => {
                Shape::Unsupported("nested optional values have no wire form")
            }
            Shape::Unsupported(reason) => Shape::Unsupported(reason),
            _ => Shape::Nullable(registry::resolve_nullable::<E>),
        }
    }
}

/// Read a presence byte; `true` means a payload follows
#[inline]
pub fn read_presence(source: &mut dyn Source) -> Result<bool> {
    match source.get_u8()? {
        ABSENT => Ok(false),
        PRESENT => Ok(true),
        other => Err(Corruption::InvalidPresence(other).into()),
    }
}

/// Write an element count as 4 bytes
#[inline]
pub(crate) fn put_count(sink: &mut dyn Sink, count: usize) -> Result<()> {
    let count = u32::try_from(count).map_err(|_| Error::ShortBuffer)?;
    sink.put_u32(count)
}

/// Read an element count written by [`put_count`], rejecting counts above `max_len`
#[inline]
pub(crate) fn get_count(source: &mut dyn Source, max_len: usize) -> Result<usize> {
    let count = source.get_u32()? as usize;
    if count > max_len {
        return Err(Corruption::SequenceTooLong(count).into());
    }
    Ok(count)
}

/// Presence-framed codec for a value that must not be null
///
/// Writes `1` before the payload; reading `0` is corruption.
pub struct Required<T> {
    payload: Arc<dyn Codec<T>>,
}

impl<T> Required<T> {
    /// Wrap a payload codec
    pub fn new(payload: Arc<dyn Codec<T>>) -> Self {
        Self { payload }
    }
}

impl<T> Codec<T> for Required<T> {
    fn encode(&self, value: &T, sink: &mut dyn Sink) -> Result<()> {
        sink.put_u8(PRESENT)?;
        self.payload.encode(value, sink)
    }

    fn decode(&self, source: &mut dyn Source) -> Result<T> {
        if !read_presence(source)? {
            return Err(Corruption::UnexpectedNull.into());
        }
        self.payload.decode(source)
    }
}

/// Presence-framed codec for an optional value
pub struct Optional<T> {
    payload: Arc<dyn Codec<T>>,
}

impl<T> Optional<T> {
    /// Wrap a payload codec
    pub fn new(payload: Arc<dyn Codec<T>>) -> Self {
        Self { payload }
    }
}

impl<T> Codec<Option<T>> for Optional<T> {
    fn encode(&self, value: &Option<T>, sink: &mut dyn Sink) -> Result<()> {
        match value {
            Some(value) => {
                sink.put_u8(PRESENT)?;
                self.payload.encode(value, sink)
            }
            None => sink.put_u8(ABSENT),
        }
    }

    fn decode(&self, source: &mut dyn Source) -> Result<Option<T>> {
        if read_presence(source)? {
            self.payload.decode(source).map(Some)
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::ByteCursor;
    use crate::lang::TextCodec;

    static TEXT: TextCodec = TextCodec;

    #[test]
    fn test_required_framing() {
        let codec = Required::new(Arc::new(&TEXT) as Arc<dyn Codec<String>>);
        let mut buf: Vec<u8> = Vec::new();
        codec.encode(&"hi".to_string(), &mut buf).unwrap();
        assert_eq!(buf, [PRESENT, 2, b'h', b'i']);

        let decoded = codec.decode(&mut ByteCursor::new(&buf)).unwrap();
        assert_eq!(decoded, "hi");

        assert!(matches!(
            codec.decode(&mut ByteCursor::new(&[ABSENT])),
            Err(Error::StreamCorruption(Corruption::UnexpectedNull))
        ));
        assert!(matches!(
            codec.decode(&mut ByteCursor::new(&[7])),
            Err(Error::StreamCorruption(Corruption::InvalidPresence(7)))
        ));
    }

    #[test]
    fn test_optional_framing() {
        let codec = Optional::new(Arc::new(&TEXT) as Arc<dyn Codec<String>>);
        let mut buf: Vec<u8> = Vec::new();
        codec.encode(&None, &mut buf).unwrap();
        codec.encode(&Some("x".to_string()), &mut buf).unwrap();
        assert_eq!(buf, [ABSENT, PRESENT, 1, b'x']);

        let mut cursor = ByteCursor::new(&buf);
        assert_eq!(codec.decode(&mut cursor).unwrap(), None);
        assert_eq!(codec.decode(&mut cursor).unwrap(), Some("x".to_string()));
        assert!(cursor.is_at_end());
    }

    #[test]
    fn test_option_shapes() {
        assert_eq!(<Option<i32>>::shape().family(), "boxed");
        assert_eq!(<Option<String>>::shape().family(), "nullable");
        assert_eq!(<Option<Option<i32>>>::shape().family(), "unsupported");
        assert_eq!(<Option<Option<String>>>::shape().family(), "unsupported");
        assert!(i64::shape().frames_itself());
        assert!(!String::shape().frames_itself());
    }
}
