//! Type dispatch, class cache and top-level entry points
//!
//! A [`Registry`] turns a type's [`Shape`] into a codec. Scalar, text,
//! enum and temporal codecs are stateless and built on the spot; class
//! schemas are built once per type and cached for the registry's lifetime.
//!
//! # Cache
//!
//! The cache is insert-only. A schema is built without holding any lock
//! and installed with entry-or-insert: when two threads race on the same
//! type, both may build, one result is kept, and every caller gets that
//! one. A build that fails leaves nothing behind, so a later call retries.

use std::any::{type_name, Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, warn};

use crate::codec::{Codec, Externalize, Optional, Required, Shape};
use crate::compress::BlockCompressor;
use crate::config::Config;
use crate::decoder::{ByteCursor, ReadSource};
use crate::encoder::WriteSink;
use crate::envelope::Envelope;
use crate::error::{Error, Result};
use crate::lang::EnumCodec;
use crate::primitive::{BoxedCodec, PrimitiveCodec};
use crate::schema::{ClassDescriptor, ClassSchema, Describe};

type CachedSchema = Arc<dyn Any + Send + Sync>;

thread_local! {
    // schemas under construction on this thread, innermost last
    static BUILDING: RefCell<Vec<TypeId>> = const { RefCell::new(Vec::new()) };
}

/// Marks a type as under construction until dropped
struct BuildGuard {
    key: TypeId,
}

impl BuildGuard {
    fn enter<T: 'static>() -> Result<Self> {
        let key = TypeId::of::<T>();
        BUILDING.with(|building| {
            let mut building = building.borrow_mut();
            if building.contains(&key) {
                warn!("rejecting recursive type graph through {}", type_name::<T>());
                return Err(Error::unsupported::<T>("type contains itself"));
            }
            building.push(key);
            Ok(Self { key })
        })
    }
}

impl Drop for BuildGuard {
    fn drop(&mut self) {
        BUILDING.with(|building| {
            let mut building = building.borrow_mut();
            if let Some(pos) = building.iter().rposition(|key| *key == self.key) {
                building.remove(pos);
            }
        });
    }
}

/// Codec registry and serialization entry point
///
/// # Example
///
/// ```rust
/// use fieldwire::{Externalize, Registry};
///
/// #[derive(Debug, Default, PartialEq, Externalize)]
/// struct Quote {
///     bid: i64,
///     ask: i64,
///     venue: Option<String>,
/// }
///
/// let registry = Registry::default();
/// let quote = Quote { bid: 100, ask: 101, venue: None };
///
/// let bytes = registry.to_bytes(&quote)?;
/// let back: Quote = registry.from_bytes(&bytes)?;
/// assert_eq!(back, quote);
/// # Ok::<(), fieldwire::Error>(())
/// ```
pub struct Registry {
    config: Config,
    compressor: Arc<dyn BlockCompressor>,
    envelope: Arc<dyn Envelope>,
    classes: DashMap<TypeId, CachedSchema>,
}

impl Registry {
    /// Create an empty registry
    pub fn new(config: Config) -> Self {
        let compressor = config.compression.compressor();
        let envelope = config
            .envelope
            .envelope(Arc::clone(&compressor), config.max_envelope_size);
        Self {
            config,
            compressor,
            envelope,
            classes: DashMap::new(),
        }
    }

    /// Replace the configured block compressor
    ///
    /// Codecs built afterwards use it; call this before resolving anything.
    pub fn with_compressor(mut self, compressor: Arc<dyn BlockCompressor>) -> Self {
        self.envelope = self
            .config
            .envelope
            .envelope(Arc::clone(&compressor), self.config.max_envelope_size);
        self.compressor = compressor;
        self
    }

    /// Configuration the registry was created with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Block compressor used for dense scalar payloads
    pub fn compressor(&self) -> &Arc<dyn BlockCompressor> {
        &self.compressor
    }

    /// Field-level codec for `T`
    ///
    /// Families that can be null on the wire get a presence byte; plain
    /// scalars and classes are written bare.
    pub fn resolve<T: Externalize>(&self) -> Result<Arc<dyn Codec<T>>> {
        let shape = T::shape();
        if shape.frames_itself() {
            self.build(shape)
        } else {
            Ok(Arc::new(Required::new(self.build(shape)?)))
        }
    }

    /// Codec for `T`'s payload, without any presence byte of its own
    pub fn payload<T: Externalize>(&self) -> Result<Arc<dyn Codec<T>>> {
        self.build(T::shape())
    }

    /// Codec used by the top-level entry points
    ///
    /// Same as [`Registry::resolve`]; class types come from the cache.
    pub fn codec_for<T: Externalize>(&self) -> Result<Arc<dyn Codec<T>>> {
        self.resolve::<T>()
    }

    fn build<T: Externalize>(&self, shape: Shape<T>) -> Result<Arc<dyn Codec<T>>> {
        match shape {
            Shape::Primitive(access) => Ok(Arc::new(PrimitiveCodec::new(access))),
            Shape::Array(resolver)
            | Shape::Collection(resolver)
            | Shape::Map(resolver)
            | Shape::Nullable(resolver)
            | Shape::Opaque(resolver) => resolver(self),
            Shape::Text(codec) | Shape::Temporal(codec) => Ok(Arc::new(codec)),
            Shape::Boxed(access) => Ok(Arc::new(BoxedCodec::new(access))),
            Shape::Enum(table) => Ok(Arc::new(EnumCodec::new(table))),
            Shape::Class(describe) => Ok(self.schema_with(describe)?),
            Shape::Unsupported(reason) => Err(Error::unsupported::<T>(reason)),
        }
    }

    /// Cached schema of `T`, built on first use
    pub fn schema<T: Describe>(&self) -> Result<Arc<ClassSchema<T>>> {
        self.schema_with(T::describe)
    }

    fn schema_with<T: 'static>(
        &self,
        describe: fn() -> ClassDescriptor<T>,
    ) -> Result<Arc<ClassSchema<T>>> {
        let key = TypeId::of::<T>();
        let cached = self.classes.get(&key).map(|entry| Arc::clone(entry.value()));
        if let Some(cached) = cached {
            return downcast(cached);
        }

        let schema = {
            let _guard = BuildGuard::enter::<T>()?;
            Arc::new(ClassSchema::build(self, describe())?)
        };

        match self.classes.entry(key) {
            Entry::Occupied(entry) => {
                debug!("schema for {} built concurrently, keeping the installed one", type_name::<T>());
                downcast(Arc::clone(entry.get()))
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&schema) as CachedSchema);
                Ok(schema)
            }
        }
    }

    /// Whether a schema for `T` is cached
    pub fn is_cached<T: 'static>(&self) -> bool {
        self.classes.contains_key(&TypeId::of::<T>())
    }

    /// Number of cached class schemas
    pub fn cached_classes(&self) -> usize {
        self.classes.len()
    }

    /// Encode `value` and write it wrapped in the configured envelope
    pub fn serialize<T: Externalize, W: Write>(&self, value: &T, mut writer: W) -> Result<()> {
        let raw = self.to_raw_bytes(value)?;
        self.envelope.seal(&raw, &mut writer)
    }

    /// Read an enveloped stream written by [`Registry::serialize`]
    pub fn deserialize<T: Externalize, R: Read>(&self, mut reader: R) -> Result<T> {
        let raw = self.envelope.open(&mut reader)?;
        self.from_raw_bytes(&raw)
    }

    /// Encode `value` straight into `writer`, no envelope
    pub fn serialize_raw<T: Externalize, W: Write>(&self, value: &T, writer: W) -> Result<()> {
        let codec = self.codec_for::<T>()?;
        let mut sink = WriteSink::new(writer);
        codec.encode(value, &mut sink)?;
        sink.finish()?;
        Ok(())
    }

    /// Decode a value written by [`Registry::serialize_raw`]
    pub fn deserialize_raw<T: Externalize, R: Read>(&self, reader: R) -> Result<T> {
        let codec = self.codec_for::<T>()?;
        codec.decode(&mut ReadSource::new(reader))
    }

    /// [`Registry::serialize`] into a new buffer
    pub fn to_bytes<T: Externalize>(&self, value: &T) -> Result<Vec<u8>> {
        let mut out: Vec<u8> = Vec::new();
        self.serialize(value, &mut out)?;
        Ok(out)
    }

    /// [`Registry::deserialize`] from a byte slice
    pub fn from_bytes<T: Externalize>(&self, bytes: &[u8]) -> Result<T> {
        self.deserialize(bytes)
    }

    /// [`Registry::serialize_raw`] into a new buffer
    pub fn to_raw_bytes<T: Externalize>(&self, value: &T) -> Result<Vec<u8>> {
        let codec = self.codec_for::<T>()?;
        let mut out: Vec<u8> = Vec::new();
        codec.encode(value, &mut out)?;
        Ok(out)
    }

    /// [`Registry::deserialize_raw`] from a byte slice
    pub fn from_raw_bytes<T: Externalize>(&self, bytes: &[u8]) -> Result<T> {
        let codec = self.codec_for::<T>()?;
        codec.decode(&mut ByteCursor::new(bytes))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("compressor", &self.compressor.name())
            .field("envelope", &self.envelope.name())
            .field("cached_classes", &self.classes.len())
            .finish()
    }
}

fn downcast<T: 'static>(cached: CachedSchema) -> Result<Arc<ClassSchema<T>>> {
    cached
        .downcast::<ClassSchema<T>>()
        .map_err(|_| Error::unsupported::<T>("class cache entry has a different type"))
}

/// Presence-framed codec for `Option<E>` when `E` is not a scalar
pub(crate) fn resolve_nullable<E: Externalize>(
    registry: &Registry,
) -> Result<Arc<dyn Codec<Option<E>>>> {
    Ok(Arc::new(Optional::new(registry.payload::<E>()?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::CompressionAlgo;
    use crate::envelope::EnvelopeKind;
    use crate::error::Corruption;
    use crate::schema::FieldDescriptor;

    #[derive(Debug, Default, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    impl Describe for Point {
        fn describe() -> ClassDescriptor<Self> {
            ClassDescriptor::<Self>::new()
                .factory(|| Ok(Point::default()))
                .field(FieldDescriptor::<Self>::new("x", |v| &v.x, |v| &mut v.x))
                .field(FieldDescriptor::<Self>::new("y", |v| &v.y, |v| &mut v.y))
        }
    }

    impl Externalize for Point {
        fn shape() -> Shape<Self> {
            Shape::Class(Point::describe)
        }
    }

    #[derive(Debug, Default)]
    struct Tree {
        children: Vec<Tree>,
    }

    impl Describe for Tree {
        fn describe() -> ClassDescriptor<Self> {
            ClassDescriptor::<Self>::new()
                .factory(|| Ok(Tree::default()))
                .field(FieldDescriptor::<Self>::new("children", |v| &v.children, |v| &mut v.children))
        }
    }

    impl Externalize for Tree {
        fn shape() -> Shape<Self> {
            Shape::Class(Tree::describe)
        }
    }

    #[test]
    fn test_schema_cached_once() {
        let registry = Registry::default();
        assert!(!registry.is_cached::<Point>());

        let first = registry.schema::<Point>().unwrap();
        let second = registry.schema::<Point>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(registry.is_cached::<Point>());
        assert_eq!(registry.cached_classes(), 1);
    }

    #[test]
    fn test_class_has_no_framing() {
        let registry = Registry::default();
        let raw = registry.to_raw_bytes(&Point { x: 1, y: -1 }).unwrap();
        assert_eq!(raw, [1, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_recursive_type_rejected() {
        let registry = Registry::default();
        let err = registry.schema::<Tree>().err().unwrap();
        assert!(matches!(err, Error::UnsupportedType { type_name, .. } if type_name.ends_with("Tree")));
        assert_eq!(registry.cached_classes(), 0);

        // the guard is released after the failure
        assert!(registry.schema::<Point>().is_ok());
    }

    #[test]
    fn test_top_level_framing() {
        let registry = Registry::default();
        assert_eq!(registry.to_raw_bytes(&"ab".to_string()).unwrap(), [1, 2, b'a', b'b']);
        assert_eq!(registry.to_raw_bytes(&None::<String>).unwrap(), [0]);
        assert_eq!(registry.to_raw_bytes(&7u8).unwrap(), [7]);
        assert!(matches!(
            registry.from_raw_bytes::<String>(&[0]),
            Err(Error::StreamCorruption(Corruption::UnexpectedNull))
        ));
    }

    #[test]
    fn test_envelopes_roundtrip() {
        let value: Vec<Point> = (0..100).map(|i| Point { x: i, y: i * 2 }).collect();
        for envelope in [
            EnvelopeKind::Gzip { level: 6 },
            EnvelopeKind::Framed,
            EnvelopeKind::Plain,
        ] {
            let registry = Registry::new(Config::default().with_envelope(envelope));
            let bytes = registry.to_bytes(&value).unwrap();
            let back: Vec<Point> = registry.from_bytes(&bytes).unwrap();
            assert_eq!(back, value, "{envelope:?}");
        }
    }

    #[test]
    fn test_raw_stream_io() {
        let registry = Registry::new(
            Config::default().with_compression(CompressionAlgo::Deflate { level: 1 }),
        );
        let value = vec![3u64; 64];

        let mut out: Vec<u8> = Vec::new();
        registry.serialize_raw(&value, &mut out).unwrap();
        let back: Vec<u64> = registry.deserialize_raw(out.as_slice()).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_unsupported_shape() {
        let registry = Registry::default();
        let err = registry.resolve::<Option<Option<i32>>>().err().unwrap();
        assert!(matches!(err, Error::UnsupportedType { .. }));
    }

    #[test]
    fn test_debug_output() {
        let registry = Registry::default();
        let text = format!("{registry:?}");
        assert!(text.contains("cached_classes: 0"));
    }
}
