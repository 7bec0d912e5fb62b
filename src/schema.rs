//! Class schemas
//!
//! A [`ClassDescriptor`] lists a type's fields in declaration order,
//! together with the accessors needed to read and write each one. It is
//! normally produced by `#[derive(Externalize)]`. [`ClassSchema::build`]
//! flattens the descriptor, resolves a codec per field and keeps the
//! construction strategy.
//!
//! Wire order is every own field, then the parent's flattened fields.
//! Transient fields are listed in the descriptor but never written.
//! Fields follow each other with no tag or length between them.

use std::any::type_name;

use log::{debug, trace};

use crate::codec::{Codec, Externalize};
use crate::decoder::Source;
use crate::encoder::Sink;
use crate::error::{BoxError, Error, Result};
use crate::registry::Registry;

/// Zero-argument construction strategy
pub type Factory<T> = fn() -> core::result::Result<T, BoxError>;

/// Types that can describe their own fields
pub trait Describe: Sized + 'static {
    /// Field list and construction strategy of `Self`
    fn describe() -> ClassDescriptor<Self>;
}

/// Declared fields of one type, before codec resolution
pub struct ClassDescriptor<T> {
    type_name: &'static str,
    factory: Option<Factory<T>>,
    fields: Vec<FieldDescriptor<T>>,
    parent: Vec<FieldDescriptor<T>>,
}

impl<T: 'static> ClassDescriptor<T> {
    /// Empty descriptor without a factory
    pub fn new() -> Self {
        Self {
            type_name: type_name::<T>(),
            factory: None,
            fields: Vec::new(),
            parent: Vec::new(),
        }
    }

    /// Set the construction strategy
    pub fn factory(mut self, factory: Factory<T>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Append an own field
    pub fn field(mut self, field: FieldDescriptor<T>) -> Self {
        self.fields.push(field);
        self
    }

    /// Embed `P`'s flattened fields after the own fields
    ///
    /// `P`'s own factory is ignored: decoding writes into the `P` value
    /// created by `T`'s factory.
    pub fn parent<P: Describe>(mut self, get: fn(&T) -> &P, get_mut: fn(&mut T) -> &mut P) -> Self {
        self.parent = P::describe()
            .into_fields()
            .into_iter()
            .map(|field| field.project(get, get_mut))
            .collect();
        self
    }

    /// Type being described
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Names of the fields in wire order, transient ones excluded
    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .chain(&self.parent)
            .filter(|field| !field.is_transient())
            .map(|field| field.name)
            .collect()
    }

    /// Own fields then parent fields, without transient ones
    fn into_fields(self) -> Vec<FieldDescriptor<T>> {
        self.fields
            .into_iter()
            .chain(self.parent)
            .filter(|field| !field.is_transient())
            .collect()
    }
}

impl<T: 'static> Default for ClassDescriptor<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// One declared field: name, type and accessors
pub struct FieldDescriptor<T> {
    name: &'static str,
    type_name: &'static str,
    binder: Option<Box<dyn FieldBinder<T>>>,
}

impl<T: 'static> FieldDescriptor<T> {
    /// Serialized field reached through `get`/`get_mut`
    pub fn new<F: Externalize>(
        name: &'static str,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> Self {
        Self {
            name,
            type_name: type_name::<F>(),
            binder: Some(Box::new(Accessor { get, get_mut })),
        }
    }

    /// Field that is never serialized; it keeps its factory value on decode
    pub fn transient<F: ?Sized>(name: &'static str) -> Self {
        Self {
            name,
            type_name: type_name::<F>(),
            binder: None,
        }
    }

    /// Field name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared type of the field
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether the field is skipped
    pub fn is_transient(&self) -> bool {
        self.binder.is_none()
    }

    fn project<O: 'static>(self, get: fn(&O) -> &T, get_mut: fn(&mut O) -> &mut T) -> FieldDescriptor<O> {
        FieldDescriptor {
            name: self.name,
            type_name: self.type_name,
            binder: self.binder.map(|inner| {
                Box::new(Projected {
                    get,
                    get_mut,
                    inner,
                }) as Box<dyn FieldBinder<O>>
            }),
        }
    }
}

trait FieldBinder<T>: Send + Sync {
    fn bind(&self, registry: &Registry) -> Result<Box<dyn FieldCodec<T>>>;
}

trait FieldCodec<T>: Send + Sync {
    fn encode(&self, object: &T, sink: &mut dyn Sink) -> Result<()>;

    fn decode_into(&self, object: &mut T, source: &mut dyn Source) -> Result<()>;
}

struct Accessor<T, F> {
    get: fn(&T) -> &F,
    get_mut: fn(&mut T) -> &mut F,
}

impl<T: 'static, F: Externalize> FieldBinder<T> for Accessor<T, F> {
    fn bind(&self, registry: &Registry) -> Result<Box<dyn FieldCodec<T>>> {
        Ok(Box::new(BoundField {
            get: self.get,
            get_mut: self.get_mut,
            codec: registry.resolve::<F>()?,
        }))
    }
}

struct BoundField<T, F> {
    get: fn(&T) -> &F,
    get_mut: fn(&mut T) -> &mut F,
    codec: std::sync::Arc<dyn Codec<F>>,
}

impl<T, F> FieldCodec<T> for BoundField<T, F> {
    #[inline]
    fn encode(&self, object: &T, sink: &mut dyn Sink) -> Result<()> {
        self.codec.encode((self.get)(object), sink)
    }

    #[inline]
    fn decode_into(&self, object: &mut T, source: &mut dyn Source) -> Result<()> {
        *(self.get_mut)(object) = self.codec.decode(source)?;
        Ok(())
    }
}

struct Projected<O, T> {
    get: fn(&O) -> &T,
    get_mut: fn(&mut O) -> &mut T,
    inner: Box<dyn FieldBinder<T>>,
}

impl<O: 'static, T: 'static> FieldBinder<O> for Projected<O, T> {
    fn bind(&self, registry: &Registry) -> Result<Box<dyn FieldCodec<O>>> {
        Ok(Box::new(ProjectedField {
            get: self.get,
            get_mut: self.get_mut,
            inner: self.inner.bind(registry)?,
        }))
    }
}

struct ProjectedField<O, T> {
    get: fn(&O) -> &T,
    get_mut: fn(&mut O) -> &mut T,
    inner: Box<dyn FieldCodec<T>>,
}

impl<O, T> FieldCodec<O> for ProjectedField<O, T> {
    #[inline]
    fn encode(&self, object: &O, sink: &mut dyn Sink) -> Result<()> {
        self.inner.encode((self.get)(object), sink)
    }

    #[inline]
    fn decode_into(&self, object: &mut O, source: &mut dyn Source) -> Result<()> {
        self.inner.decode_into((self.get_mut)(object), source)
    }
}

struct SchemaField<T> {
    name: &'static str,
    codec: Box<dyn FieldCodec<T>>,
}

/// Resolved, ordered field codecs plus the construction strategy
///
/// Encoding writes each field in turn; decoding builds a fresh value with
/// the factory and overwrites each field in the same order.
pub struct ClassSchema<T> {
    type_name: &'static str,
    factory: Factory<T>,
    fields: Vec<SchemaField<T>>,
}

impl<T: 'static> ClassSchema<T> {
    /// Resolve every field of `descriptor`
    ///
    /// Fails with [`Error::MissingConstructor`] when the descriptor has no
    /// factory, before any field is resolved.
    pub fn build(registry: &Registry, descriptor: ClassDescriptor<T>) -> Result<Self> {
        let type_name = descriptor.type_name;
        let factory = descriptor
            .factory
            .ok_or(Error::MissingConstructor(type_name))?;

        let mut fields = Vec::with_capacity(descriptor.fields.len() + descriptor.parent.len());
        for field in descriptor.into_fields() {
            trace!("{}.{}: {}", type_name, field.name, field.type_name);
            if let Some(binder) = field.binder {
                fields.push(SchemaField {
                    name: field.name,
                    codec: binder.bind(registry)?,
                });
            }
        }

        debug!("built schema for {} ({} fields)", type_name, fields.len());
        Ok(Self {
            type_name,
            factory,
            fields,
        })
    }

    /// Field names in wire order
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|field| field.name)
    }

    /// Number of serialized fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema writes nothing at all
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Type the schema was built for
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl<T: 'static> Codec<T> for ClassSchema<T> {
    fn encode(&self, value: &T, sink: &mut dyn Sink) -> Result<()> {
        for field in &self.fields {
            field.codec.encode(value, sink)?;
        }
        Ok(())
    }

    fn decode(&self, source: &mut dyn Source) -> Result<T> {
        let mut object = (self.factory)().map_err(|source| Error::ConstructionFailure {
            type_name: self.type_name,
            source,
        })?;
        for field in &self.fields {
            field.codec.decode_into(&mut object, source)?;
        }
        Ok(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::ByteCursor;

    #[derive(Debug, Default, PartialEq)]
    struct Base {
        id: u32,
        tag: Option<String>,
    }

    impl Describe for Base {
        fn describe() -> ClassDescriptor<Self> {
            ClassDescriptor::<Self>::new()
                .factory(|| Ok(Base::default()))
                .field(FieldDescriptor::<Self>::new("id", |v| &v.id, |v| &mut v.id))
                .field(FieldDescriptor::<Self>::new("tag", |v| &v.tag, |v| &mut v.tag))
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Derived {
        base: Base,
        score: i16,
        cache: Vec<u8>,
    }

    impl Describe for Derived {
        fn describe() -> ClassDescriptor<Self> {
            ClassDescriptor::<Self>::new()
                .factory(|| Ok(Derived::default()))
                .parent(|v| &v.base, |v| &mut v.base)
                .field(FieldDescriptor::<Self>::new("score", |v| &v.score, |v| &mut v.score))
                .field(FieldDescriptor::transient::<Vec<u8>>("cache"))
        }
    }

    #[test]
    fn test_own_fields_before_parent() {
        let registry = Registry::default();
        assert_eq!(Derived::describe().field_names(), ["score", "id", "tag"]);

        let schema = ClassSchema::build(&registry, Derived::describe()).unwrap();
        assert_eq!(schema.field_names().collect::<Vec<_>>(), ["score", "id", "tag"]);

        let value = Derived {
            base: Base { id: 7, tag: None },
            score: -3,
            cache: vec![1, 2, 3],
        };
        let mut buf: Vec<u8> = Vec::new();
        schema.encode(&value, &mut buf).unwrap();
        assert_eq!(buf, [0xFD, 0xFF, 7, 0, 0, 0, 0]);

        let decoded = schema.decode(&mut ByteCursor::new(&buf)).unwrap();
        assert_eq!(decoded.base, value.base);
        assert_eq!(decoded.score, -3);
        assert!(decoded.cache.is_empty());
    }

    #[test]
    fn test_missing_factory() {
        let registry = Registry::default();
        let descriptor = ClassDescriptor::<Base>::new()
            .field(FieldDescriptor::<Base>::new("id", |v| &v.id, |v| &mut v.id));
        assert!(matches!(
            ClassSchema::build(&registry, descriptor),
            Err(Error::MissingConstructor(name)) if name.ends_with("Base")
        ));
    }

    #[test]
    fn test_factory_failure() {
        let registry = Registry::default();
        let descriptor = ClassDescriptor::<Base>::new().factory(|| Err("pool exhausted".into()));
        let schema = ClassSchema::build(&registry, descriptor).unwrap();
        assert!(schema.is_empty());

        let err = schema.decode(&mut ByteCursor::new(&[])).unwrap_err();
        assert!(matches!(err, Error::ConstructionFailure { .. }));
        assert_eq!(std::error::Error::source(&err).unwrap().to_string(), "pool exhausted");
    }
}
