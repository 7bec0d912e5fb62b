//! Fixed-width scalar codecs
//!
//! Twelve scalar kinds share one representation: the value's bit pattern
//! widened to `u64`, written as the low `width` bytes in little-endian
//! order. The same packing feeds the dense buffers of arrays and compact
//! collections.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::codec::{read_presence, Codec, Externalize, Shape, ABSENT, PRESENT};
use crate::compress::BlockCompressor;
use crate::decoder::Source;
use crate::encoder::Sink;
use crate::error::{Corruption, Result};

/// Scalar kinds and their wire width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// `bool`, one byte
    Bool,
    /// `i8`
    I8,
    /// `u8`
    U8,
    /// `i16`
    I16,
    /// `u16`
    U16,
    /// `char` as a 4-byte code point
    Char,
    /// `i32`
    I32,
    /// `u32`
    U32,
    /// `f32` IEEE bits
    F32,
    /// `i64`
    I64,
    /// `u64`
    U64,
    /// `f64` IEEE bits
    F64,
}

impl ScalarKind {
    /// Size in bytes
    #[inline]
    pub const fn width(self) -> usize {
        match self {
            ScalarKind::Bool | ScalarKind::I8 | ScalarKind::U8 => 1,
            ScalarKind::I16 | ScalarKind::U16 => 2,
            ScalarKind::Char | ScalarKind::I32 | ScalarKind::U32 | ScalarKind::F32 => 4,
            ScalarKind::I64 | ScalarKind::U64 | ScalarKind::F64 => 8,
        }
    }
}

/// Plain scalar value convertible to and from its bit pattern
pub trait Scalar: Copy + Send + Sync + 'static {
    /// Kind of the scalar
    const KIND: ScalarKind;

    /// Bit pattern, zero-extended
    fn to_bits(self) -> u64;

    /// Rebuild from a bit pattern read off the wire
    fn from_bits(bits: u64) -> Result<Self>;
}

/// Type-erased access to the bits of a scalar-like value
///
/// `None` bits stand for null; only boxed scalars produce or accept it.
pub trait ScalarAccess<T>: Send + Sync {
    /// Kind of the underlying scalar
    fn kind(&self) -> ScalarKind;

    /// Bits of `value`, `None` when it is null
    fn bits(&self, value: &T) -> Option<u64>;

    /// Rebuild a value; `None` requests a null
    fn from_bits(&self, bits: Option<u64>) -> Result<T>;
}

/// Shape of a plain scalar, for use in hand-written [`Externalize`] impls
pub fn scalar_shape<S: Scalar>() -> Shape<S> {
    Shape::Primitive(Arc::new(PlainAccess::<S>(PhantomData)))
}

struct PlainAccess<S>(PhantomData<fn() -> S>);

impl<S: Scalar> ScalarAccess<S> for PlainAccess<S> {
    #[inline]
    fn kind(&self) -> ScalarKind {
        S::KIND
    }

    #[inline]
    fn bits(&self, value: &S) -> Option<u64> {
        Some(value.to_bits())
    }

    #[inline]
    fn from_bits(&self, bits: Option<u64>) -> Result<S> {
        match bits {
            Some(bits) => S::from_bits(bits),
            None => Err(Corruption::UnexpectedNull.into()),
        }
    }
}

/// Nullable view over a plain scalar access
pub(crate) struct BoxedAccess<E> {
    inner: Arc<dyn ScalarAccess<E>>,
}

impl<E> BoxedAccess<E> {
    pub(crate) fn new(inner: Arc<dyn ScalarAccess<E>>) -> Self {
        Self { inner }
    }
}

impl<E> ScalarAccess<Option<E>> for BoxedAccess<E> {
    #[inline]
    fn kind(&self) -> ScalarKind {
        self.inner.kind()
    }

    #[inline]
    fn bits(&self, value: &Option<E>) -> Option<u64> {
        value.as_ref().and_then(|value| self.inner.bits(value))
    }

    #[inline]
    fn from_bits(&self, bits: Option<u64>) -> Result<Option<E>> {
        match bits {
            Some(bits) => self.inner.from_bits(Some(bits)).map(Some),
            None => Ok(None),
        }
    }
}

macro_rules! scalar_impl {
    ($($ty:ty => $kind:ident, |$v:ident| $to:expr, |$b:ident| $from:expr;)*) => {$(
        impl Scalar for $ty {
            const KIND: ScalarKind = ScalarKind::$kind;

            #[inline]
            fn to_bits(self) -> u64 {
                let $v = self;
                $to
            }

            #[inline]
            fn from_bits($b: u64) -> Result<Self> {
                $from
            }
        }

        impl Externalize for $ty {
            fn shape() -> Shape<Self> {
                scalar_shape::<$ty>()
            }
        }
    )*};
}

scalar_impl! {
    bool => Bool, |v| u64::from(v), |b| Ok(b != 0);
    i8 => I8, |v| u64::from(v as u8), |b| Ok(b as u8 as i8);
    u8 => U8, |v| u64::from(v), |b| Ok(b as u8);
    i16 => I16, |v| u64::from(v as u16), |b| Ok(b as u16 as i16);
    u16 => U16, |v| u64::from(v), |b| Ok(b as u16);
    i32 => I32, |v| u64::from(v as u32), |b| Ok(b as u32 as i32);
    u32 => U32, |v| u64::from(v), |b| Ok(b as u32);
    i64 => I64, |v| v as u64, |b| Ok(b as i64);
    u64 => U64, |v| v, |b| Ok(b);
    f32 => F32, |v| u64::from(v.to_bits()), |b| Ok(f32::from_bits(b as u32));
    f64 => F64, |v| v.to_bits(), |b| Ok(f64::from_bits(b));
    char => Char, |v| u64::from(u32::from(v)),
        |b| char::from_u32(b as u32).ok_or_else(|| Corruption::InvalidChar(b as u32).into());
}

/// Write the low `kind.width()` bytes of `bits`
#[inline]
pub(crate) fn put_bits(sink: &mut dyn Sink, kind: ScalarKind, bits: u64) -> Result<()> {
    sink.put_bytes(&bits.to_le_bytes()[..kind.width()])
}

/// Read `kind.width()` bytes into a zero-extended bit pattern
#[inline]
pub(crate) fn get_bits(source: &mut dyn Source, kind: ScalarKind) -> Result<u64> {
    let mut buf = [0u8; 8];
    source.get_exact(&mut buf[..kind.width()])?;
    Ok(u64::from_le_bytes(buf))
}

/// Packed, fixed-width element buffer
#[derive(Debug)]
pub(crate) struct DenseBuffer {
    kind: ScalarKind,
    bytes: Vec<u8>,
}

impl DenseBuffer {
    pub(crate) fn with_capacity(kind: ScalarKind, count: usize) -> Self {
        Self {
            kind,
            bytes: Vec::with_capacity(count.saturating_mul(kind.width())),
        }
    }

    #[inline]
    pub(crate) fn push(&mut self, bits: u64) {
        self.bytes
            .extend_from_slice(&bits.to_le_bytes()[..self.kind.width()]);
    }

    /// Compress and write as a length-prefixed block
    pub(crate) fn write(&self, sink: &mut dyn Sink, compressor: &dyn BlockCompressor) -> Result<()> {
        let compressed = compressor.compress(&self.bytes)?;
        sink.put_block(&compressed)
    }

    /// Read a block holding exactly `count` elements
    pub(crate) fn read(
        source: &mut dyn Source,
        compressor: &dyn BlockCompressor,
        kind: ScalarKind,
        count: usize,
    ) -> Result<Self> {
        let expected = count
            .checked_mul(kind.width())
            .ok_or(Corruption::CountMismatch {
                expected: count,
                actual: 0,
            })?;
        let block = source.get_block()?;
        let bytes = compressor.decompress(&block, expected)?;
        if bytes.len() != expected {
            return Err(Corruption::CountMismatch {
                expected: count,
                actual: bytes.len() / kind.width(),
            }
            .into());
        }
        Ok(Self { kind, bytes })
    }

    /// Element bit patterns in order
    pub(crate) fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        let width = self.kind.width();
        self.bytes.chunks_exact(width).map(move |chunk| {
            let mut buf = [0u8; 8];
            buf[..width].copy_from_slice(chunk);
            u64::from_le_bytes(buf)
        })
    }
}

/// Codec for a never-null scalar: the value's bytes and nothing else
pub struct PrimitiveCodec<T> {
    access: Arc<dyn ScalarAccess<T>>,
}

impl<T> PrimitiveCodec<T> {
    /// Build over a scalar access
    pub fn new(access: Arc<dyn ScalarAccess<T>>) -> Self {
        Self { access }
    }
}

impl<T> Codec<T> for PrimitiveCodec<T> {
    #[inline]
    fn encode(&self, value: &T, sink: &mut dyn Sink) -> Result<()> {
        let bits = self.access.bits(value).unwrap_or_default();
        put_bits(sink, self.access.kind(), bits)
    }

    #[inline]
    fn decode(&self, source: &mut dyn Source) -> Result<T> {
        let bits = get_bits(source, self.access.kind())?;
        self.access.from_bits(Some(bits))
    }
}

/// Codec for an optional scalar: presence byte, then the value's bytes
pub struct BoxedCodec<T> {
    access: Arc<dyn ScalarAccess<T>>,
}

impl<T> BoxedCodec<T> {
    /// Build over a nullable scalar access
    pub fn new(access: Arc<dyn ScalarAccess<T>>) -> Self {
        Self { access }
    }
}

impl<T> Codec<T> for BoxedCodec<T> {
    fn encode(&self, value: &T, sink: &mut dyn Sink) -> Result<()> {
        match self.access.bits(value) {
            Some(bits) => {
                sink.put_u8(PRESENT)?;
                put_bits(sink, self.access.kind(), bits)
            }
            None => sink.put_u8(ABSENT),
        }
    }

    fn decode(&self, source: &mut dyn Source) -> Result<T> {
        if read_presence(source)? {
            let bits = get_bits(source, self.access.kind())?;
            self.access.from_bits(Some(bits))
        } else {
            self.access.from_bits(None)
        }
    }
}
