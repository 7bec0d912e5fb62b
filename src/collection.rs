//! Collection and map codecs
//!
//! Collections are rebuilt through a zero-argument factory and filled in
//! iteration order. Element type decides the layout:
//!
//! ```text
//! scalar or Option<scalar>   count | IntSet nulls | u32 block len | compressed dense buffer
//! bool or Option<bool>       count | IntSet nulls | IntSet trues
//! anything else              count | element 0 | element 1 | ...
//! map                        count | key 0 | value 0 | key 1 | value 1 | ...
//! ```
//!
//! The dense buffer always holds `count` elements; null positions carry a
//! zero placeholder that decoding ignores.

use std::any::type_name;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap, HashSet, LinkedList, VecDeque};
use std::hash::Hash;
use std::sync::Arc;

use crate::bitmap::IntSet;
use crate::codec::{get_count, put_count, Codec, Externalize, Shape};
use crate::compress::BlockCompressor;
use crate::decoder::Source;
use crate::encoder::Sink;
use crate::error::{Corruption, Error, Result};
use crate::primitive::{DenseBuffer, ScalarAccess, ScalarKind};
use crate::registry::Registry;

/// Container rebuilt element by element on decode
pub trait CollectionType: Externalize {
    /// Element type
    type Element: Externalize;

    /// Zero-argument construction; `None` makes the type undecodable
    fn factory() -> Option<fn() -> Self>;

    /// Number of elements
    fn len(&self) -> usize;

    /// Elements in iteration order
    fn elements(&self) -> Box<dyn Iterator<Item = &Self::Element> + '_>;

    /// Append one decoded element
    fn insert(&mut self, element: Self::Element);
}

/// Key-value container rebuilt entry by entry on decode
pub trait MapType: Externalize {
    /// Key type
    type Key: Externalize;
    /// Value type
    type Value: Externalize;

    /// Zero-argument construction; `None` makes the type undecodable
    fn factory() -> Option<fn() -> Self>;

    /// Number of entries
    fn len(&self) -> usize;

    /// Entries in iteration order
    fn entries(&self) -> Box<dyn Iterator<Item = (&Self::Key, &Self::Value)> + '_>;

    /// Insert one decoded entry
    fn insert(&mut self, key: Self::Key, value: Self::Value);
}

/// Shape for a [`CollectionType`] implementation
pub fn collection_shape<C: CollectionType>() -> Shape<C> {
    Shape::Collection(resolve::<C>)
}

/// Shape for a [`MapType`] implementation
pub fn map_shape<M: MapType>() -> Shape<M> {
    Shape::Map(resolve_map::<M>)
}

/// Pick the collection encoding for `C`'s element type
pub fn resolve<C: CollectionType>(registry: &Registry) -> Result<Arc<dyn Codec<C>>> {
    let factory = C::factory().ok_or(Error::MissingConstructor(type_name::<C>()))?;
    let max_len = registry.config().max_sequence_len;
    match <C::Element as Externalize>::shape() {
        Shape::Primitive(access) | Shape::Boxed(access) => {
            if access.kind() == ScalarKind::Bool {
                Ok(Arc::new(BoolCollectionCodec {
                    factory,
                    access,
                    max_len,
                }))
            } else {
                Ok(Arc::new(CompactCollectionCodec {
                    factory,
                    access,
                    compressor: Arc::clone(registry.compressor()),
                    max_len,
                }))
            }
        }
        Shape::Unsupported(reason) => Err(Error::UnsupportedType {
            type_name: type_name::<C>(),
            reason,
        }),
        _ => Ok(Arc::new(GenericCollectionCodec {
            factory,
            element: registry.resolve::<C::Element>()?,
            max_len,
        })),
    }
}

/// Resolve key and value codecs for `M`
pub fn resolve_map<M: MapType>(registry: &Registry) -> Result<Arc<dyn Codec<M>>> {
    let factory = M::factory().ok_or(Error::MissingConstructor(type_name::<M>()))?;
    Ok(Arc::new(MapCodec {
        factory,
        key: registry.resolve::<M::Key>()?,
        value: registry.resolve::<M::Value>()?,
        max_len: registry.config().max_sequence_len,
    }))
}

fn null_positions<C: CollectionType>(
    value: &C,
    access: &dyn ScalarAccess<C::Element>,
) -> (IntSet, Vec<Option<u64>>) {
    let mut nulls = IntSet::new();
    let bits: Vec<Option<u64>> = value
        .elements()
        .enumerate()
        .map(|(index, element)| {
            let bits = access.bits(element);
            if bits.is_none() {
                nulls.insert(index as u32);
            }
            bits
        })
        .collect();
    (nulls, bits)
}

/// Scalars with a null set and one compressed dense buffer
struct CompactCollectionCodec<C: CollectionType> {
    factory: fn() -> C,
    access: Arc<dyn ScalarAccess<C::Element>>,
    compressor: Arc<dyn BlockCompressor>,
    max_len: usize,
}

impl<C: CollectionType> Codec<C> for CompactCollectionCodec<C> {
    fn encode(&self, value: &C, sink: &mut dyn Sink) -> Result<()> {
        let (nulls, bits) = null_positions(value, self.access.as_ref());
        put_count(sink, bits.len())?;
        nulls.encode(sink)?;

        let mut dense = DenseBuffer::with_capacity(self.access.kind(), bits.len());
        for bits in bits {
            dense.push(bits.unwrap_or_default());
        }
        dense.write(sink, self.compressor.as_ref())
    }

    fn decode(&self, source: &mut dyn Source) -> Result<C> {
        let count = get_count(source, self.max_len)?;
        let nulls = IntSet::decode_within(source, count)?;
        let dense = DenseBuffer::read(source, self.compressor.as_ref(), self.access.kind(), count)?;

        let mut collection = (self.factory)();
        for (index, bits) in dense.iter().enumerate() {
            let bits = (!nulls.contains(index as u32)).then_some(bits);
            collection.insert(self.access.from_bits(bits)?);
        }
        check_filled(count, collection.len())?;
        Ok(collection)
    }
}

/// Booleans as a null set plus a set of true positions
struct BoolCollectionCodec<C: CollectionType> {
    factory: fn() -> C,
    access: Arc<dyn ScalarAccess<C::Element>>,
    max_len: usize,
}

impl<C: CollectionType> Codec<C> for BoolCollectionCodec<C> {
    fn encode(&self, value: &C, sink: &mut dyn Sink) -> Result<()> {
        let (nulls, bits) = null_positions(value, self.access.as_ref());
        let trues: IntSet = bits
            .iter()
            .enumerate()
            .filter(|(_, bits)| matches!(bits, Some(bit) if *bit != 0))
            .map(|(index, _)| index as u32)
            .collect();

        put_count(sink, bits.len())?;
        nulls.encode(sink)?;
        trues.encode(sink)
    }

    fn decode(&self, source: &mut dyn Source) -> Result<C> {
        let count = get_count(source, self.max_len)?;
        let nulls = IntSet::decode_within(source, count)?;
        let trues = IntSet::decode_within(source, count)?;

        let mut collection = (self.factory)();
        for index in 0..count as u32 {
            let bits = if nulls.contains(index) {
                None
            } else {
                Some(u64::from(trues.contains(index)))
            };
            collection.insert(self.access.from_bits(bits)?);
        }
        check_filled(count, collection.len())?;
        Ok(collection)
    }
}

/// Each element through its own resolved codec
struct GenericCollectionCodec<C: CollectionType> {
    factory: fn() -> C,
    element: Arc<dyn Codec<C::Element>>,
    max_len: usize,
}

impl<C: CollectionType> Codec<C> for GenericCollectionCodec<C> {
    fn encode(&self, value: &C, sink: &mut dyn Sink) -> Result<()> {
        put_count(sink, value.len())?;
        for element in value.elements() {
            self.element.encode(element, sink)?;
        }
        Ok(())
    }

    fn decode(&self, source: &mut dyn Source) -> Result<C> {
        let count = get_count(source, self.max_len)?;
        let mut collection = (self.factory)();
        for _ in 0..count {
            collection.insert(self.element.decode(source)?);
        }
        check_filled(count, collection.len())?;
        Ok(collection)
    }
}

/// Sets and maps merge duplicates, so a filled container shorter than its
/// count means the stream repeated an element or key
fn check_filled(count: usize, len: usize) -> Result<()> {
    if len != count {
        return Err(Corruption::CountMismatch {
            expected: count,
            actual: len,
        }
        .into());
    }
    Ok(())
}

struct MapCodec<M: MapType> {
    factory: fn() -> M,
    key: Arc<dyn Codec<M::Key>>,
    value: Arc<dyn Codec<M::Value>>,
    max_len: usize,
}

impl<M: MapType> Codec<M> for MapCodec<M> {
    fn encode(&self, value: &M, sink: &mut dyn Sink) -> Result<()> {
        put_count(sink, value.len())?;
        for (key, value) in value.entries() {
            self.key.encode(key, sink)?;
            self.value.encode(value, sink)?;
        }
        Ok(())
    }

    fn decode(&self, source: &mut dyn Source) -> Result<M> {
        let count = get_count(source, self.max_len)?;
        let mut map = (self.factory)();
        for _ in 0..count {
            let key = self.key.decode(source)?;
            let value = self.value.decode(source)?;
            map.insert(key, value);
        }
        check_filled(count, map.len())?;
        Ok(map)
    }
}

macro_rules! collection_impl {
    ($($ty:ident, $insert:ident $(, $bound:path)*;)*) => {$(
        impl<E: Externalize $(+ $bound)*> CollectionType for $ty<E> {
            type Element = E;

            fn factory() -> Option<fn() -> Self> {
                Some($ty::new)
            }

            fn len(&self) -> usize {
                $ty::len(self)
            }

            fn elements(&self) -> Box<dyn Iterator<Item = &E> + '_> {
                Box::new(self.iter())
            }

            fn insert(&mut self, element: E) {
                self.$insert(element);
            }
        }

        impl<E: Externalize $(+ $bound)*> Externalize for $ty<E> {
            fn shape() -> Shape<Self> {
                collection_shape::<Self>()
            }
        }
    )*};
}

collection_impl! {
    VecDeque, push_back;
    LinkedList, push_back;
    HashSet, insert, Hash, Eq;
    BTreeSet, insert, Ord;
    BinaryHeap, push, Ord;
}

macro_rules! map_impl {
    ($($ty:ident $(, $bound:path)*;)*) => {$(
        impl<K: Externalize $(+ $bound)*, V: Externalize> MapType for $ty<K, V> {
            type Key = K;
            type Value = V;

            fn factory() -> Option<fn() -> Self> {
                Some($ty::new)
            }

            fn len(&self) -> usize {
                $ty::len(self)
            }

            fn entries(&self) -> Box<dyn Iterator<Item = (&K, &V)> + '_> {
                Box::new(self.iter())
            }

            fn insert(&mut self, key: K, value: V) {
                $ty::insert(self, key, value);
            }
        }

        impl<K: Externalize $(+ $bound)*, V: Externalize> Externalize for $ty<K, V> {
            fn shape() -> Shape<Self> {
                map_shape::<Self>()
            }
        }
    )*};
}

map_impl! {
    HashMap, Hash, Eq;
    BTreeMap, Ord;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::CompressionAlgo;
    use crate::config::Config;
    use crate::decoder::ByteCursor;
    use crate::error::Corruption;
    use proptest::prelude::*;

    fn stored() -> Registry {
        Registry::new(Config::default().with_compression(CompressionAlgo::None))
    }

    fn encode<T: Externalize>(registry: &Registry, value: &T) -> Vec<u8> {
        let codec = registry.payload::<T>().unwrap();
        let mut buf: Vec<u8> = Vec::new();
        codec.encode(value, &mut buf).unwrap();
        buf
    }

    fn decode<T: Externalize>(registry: &Registry, buf: &[u8]) -> Result<T> {
        let codec = registry.payload::<T>()?;
        let mut cursor = ByteCursor::new(buf);
        let value = codec.decode(&mut cursor)?;
        assert!(cursor.is_at_end());
        Ok(value)
    }

    #[test]
    fn test_boxed_collection_layout() {
        let registry = stored();
        let value: VecDeque<Option<i32>> = VecDeque::from([None, Some(5), None, Some(7)]);
        let buf = encode(&registry, &value);

        let mut expected = vec![4, 0, 0, 0];
        // nulls at 0 and 2, sparse form
        expected.extend([0, 2, 0, 2]);
        expected.extend(16u32.to_le_bytes());
        for element in [0i32, 5, 0, 7] {
            expected.extend(element.to_le_bytes());
        }
        assert_eq!(buf, expected);

        assert_eq!(decode::<VecDeque<Option<i32>>>(&registry, &buf).unwrap(), value);
    }

    #[test]
    fn test_dense_buffer_ignores_null_count() {
        let registry = stored();
        let all_null: LinkedList<Option<f64>> = [None, None, None].into_iter().collect();
        let buf = encode(&registry, &all_null);
        let block_len = u32::from_le_bytes(buf[buf.len() - 28..buf.len() - 24].try_into().unwrap());
        assert_eq!(block_len, 24);
        assert_eq!(decode::<LinkedList<Option<f64>>>(&registry, &buf).unwrap(), all_null);
    }

    #[test]
    fn test_bool_collection() {
        let registry = stored();
        let value: VecDeque<Option<bool>> = VecDeque::from([Some(true), None, Some(false), Some(true)]);
        let buf = encode(&registry, &value);
        assert_eq!(buf, [4, 0, 0, 0, 0, 1, 1, 0, 2, 0, 3]);
        assert_eq!(decode::<VecDeque<Option<bool>>>(&registry, &buf).unwrap(), value);
    }

    #[test]
    fn test_plain_scalar_collection_rejects_nulls() {
        let registry = stored();
        let value: VecDeque<Option<u16>> = VecDeque::from([Some(1), None]);
        let buf = encode(&registry, &value);
        assert!(matches!(
            decode::<VecDeque<u16>>(&registry, &buf),
            Err(Error::StreamCorruption(Corruption::UnexpectedNull))
        ));
    }

    #[test]
    fn test_generic_collections_and_maps() {
        let registry = Registry::default();

        let names: BTreeSet<String> = ["b", "a", "c"].into_iter().map(String::from).collect();
        let buf = encode(&registry, &names);
        assert_eq!(decode::<BTreeSet<String>>(&registry, &buf).unwrap(), names);

        let mut map: BTreeMap<String, Vec<i32>> = BTreeMap::new();
        map.insert("x".into(), vec![1, 2, 3]);
        map.insert("y".into(), vec![]);
        let buf = encode(&registry, &map);
        assert_eq!(decode::<BTreeMap<String, Vec<i32>>>(&registry, &buf).unwrap(), map);

        let mut sparse: HashMap<i64, Option<String>> = HashMap::new();
        sparse.insert(1, None);
        sparse.insert(2, Some("two".into()));
        let buf = encode(&registry, &sparse);
        assert_eq!(decode::<HashMap<i64, Option<String>>>(&registry, &buf).unwrap(), sparse);
    }

    #[test]
    fn test_map_entry_layout() {
        let registry = stored();
        let map: BTreeMap<i32, String> = BTreeMap::from([(3, "c".to_string())]);
        let buf = encode(&registry, &map);
        // key is a bare scalar, value a required text
        assert_eq!(buf, [1, 0, 0, 0, 3, 0, 0, 0, 1, 1, b'c']);
    }

    fn assert_short_fill<T: Externalize + std::fmt::Debug>(registry: &Registry, buf: &[u8], expected: usize) {
        match decode::<T>(registry, buf) {
            Err(Error::StreamCorruption(Corruption::CountMismatch { expected: e, actual })) => {
                assert_eq!(e, expected);
                assert!(actual < expected);
            }
            other => panic!("expected a count mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_set_elements_are_corruption() {
        let registry = stored();

        let repeated: VecDeque<String> = VecDeque::from(["a".to_string(), "a".into(), "a".into()]);
        let buf = encode(&registry, &repeated);
        assert_eq!(buf[..4], [3, 0, 0, 0]);
        assert_short_fill::<HashSet<String>>(&registry, &buf, 3);

        let compact: VecDeque<i32> = VecDeque::from([5, 5]);
        let buf = encode(&registry, &compact);
        assert_short_fill::<HashSet<i32>>(&registry, &buf, 2);
        assert_short_fill::<BTreeSet<i32>>(&registry, &buf, 2);

        let flags: VecDeque<bool> = VecDeque::from([true, true]);
        let buf = encode(&registry, &flags);
        assert_short_fill::<HashSet<bool>>(&registry, &buf, 2);
    }

    #[test]
    fn test_duplicate_map_keys_are_corruption() {
        let registry = stored();
        let mut buf = vec![2, 0, 0, 0];
        for _ in 0..2 {
            buf.extend(7i32.to_le_bytes());
            buf.extend([1, 1, b'v']);
        }
        assert_short_fill::<BTreeMap<i32, String>>(&registry, &buf, 2);

        // distinct keys with the same bytes layout still decode
        buf[11..15].copy_from_slice(&8i32.to_le_bytes());
        let map = decode::<BTreeMap<i32, String>>(&registry, &buf).unwrap();
        assert_eq!(map, BTreeMap::from([(7, "v".to_string()), (8, "v".to_string())]));
    }

    #[test]
    fn test_binary_heap_keeps_elements() {
        let registry = Registry::default();
        let heap: BinaryHeap<u32> = [5, 1, 9, 3].into_iter().collect();
        let buf = encode(&registry, &heap);
        let decoded = decode::<BinaryHeap<u32>>(&registry, &buf).unwrap();
        assert_eq!(decoded.into_sorted_vec(), vec![1, 3, 5, 9]);
    }

    struct Bag(Vec<i32>);

    impl Externalize for Bag {
        fn shape() -> Shape<Self> {
            collection_shape::<Self>()
        }
    }

    impl CollectionType for Bag {
        type Element = i32;

        fn factory() -> Option<fn() -> Self> {
            None
        }

        fn len(&self) -> usize {
            self.0.len()
        }

        fn elements(&self) -> Box<dyn Iterator<Item = &i32> + '_> {
            Box::new(self.0.iter())
        }

        fn insert(&mut self, element: i32) {
            self.0.push(element);
        }
    }

    #[test]
    fn test_missing_factory() {
        let registry = Registry::default();
        let err = registry.payload::<Bag>().err().unwrap();
        assert!(matches!(err, Error::MissingConstructor(name) if name.ends_with("Bag")));
    }

    proptest! {
        #[test]
        fn prop_boxed_collection_roundtrip(
            values in proptest::collection::vec(proptest::option::of(any::<i64>()), 0..200)
        ) {
            let registry = Registry::default();
            let value: VecDeque<Option<i64>> = values.into_iter().collect();
            let buf = encode(&registry, &value);
            prop_assert_eq!(decode::<VecDeque<Option<i64>>>(&registry, &buf).unwrap(), value);
        }

        #[test]
        fn prop_bool_collection_roundtrip(
            values in proptest::collection::vec(proptest::option::of(any::<bool>()), 0..300)
        ) {
            let registry = Registry::default();
            let value: LinkedList<Option<bool>> = values.into_iter().collect();
            let buf = encode(&registry, &value);
            prop_assert_eq!(decode::<LinkedList<Option<bool>>>(&registry, &buf).unwrap(), value);
        }
    }
}
