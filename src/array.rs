//! `Vec<E>` codecs
//!
//! Every array payload starts with a 4-byte element count. What follows
//! depends on the element kind:
//!
//! ```text
//! bool        count | IntSet of true positions
//! scalar      count | u32 block len | compressed packed elements
//! otherwise   count | element 0 | element 1 | ...
//! ```
//!
//! Element-wise arrays resolve the element codec with its own presence
//! framing, so `Vec<Option<T>>` keeps per-element nulls.

use std::any::type_name;
use std::sync::Arc;

use crate::bitmap::IntSet;
use crate::codec::{get_count, put_count, Codec, Externalize, Shape, MAX_PREALLOC};
use crate::compress::BlockCompressor;
use crate::decoder::Source;
use crate::encoder::Sink;
use crate::error::{Error, Result};
use crate::primitive::{DenseBuffer, ScalarAccess, ScalarKind};
use crate::registry::Registry;

impl<E: Externalize> Externalize for Vec<E> {
    fn shape() -> Shape<Self> {
        Shape::Array(resolve::<E>)
    }
}

/// Pick the array encoding for element type `E`
pub fn resolve<E: Externalize>(registry: &Registry) -> Result<Arc<dyn Codec<Vec<E>>>> {
    let max_len = registry.config().max_sequence_len;
    match E::shape() {
        Shape::Primitive(access) if access.kind() == ScalarKind::Bool => {
            Ok(Arc::new(BoolArrayCodec { access, max_len }))
        }
        Shape::Primitive(access) => Ok(Arc::new(PrimitiveArrayCodec {
            access,
            compressor: Arc::clone(registry.compressor()),
            max_len,
        })),
        Shape::Unsupported(reason) => Err(Error::UnsupportedType {
            type_name: type_name::<Vec<E>>(),
            reason,
        }),
        _ => Ok(Arc::new(ElementArrayCodec {
            element: registry.resolve::<E>()?,
            max_len,
        })),
    }
}

/// Boolean array as the set of positions holding `true`
struct BoolArrayCodec<E> {
    access: Arc<dyn ScalarAccess<E>>,
    max_len: usize,
}

impl<E> Codec<Vec<E>> for BoolArrayCodec<E> {
    fn encode(&self, value: &Vec<E>, sink: &mut dyn Sink) -> Result<()> {
        put_count(sink, value.len())?;
        let trues: IntSet = value
            .iter()
            .enumerate()
            .filter(|(_, element)| self.access.bits(element).unwrap_or_default() != 0)
            .map(|(index, _)| index as u32)
            .collect();
        trues.encode(sink)
    }

    fn decode(&self, source: &mut dyn Source) -> Result<Vec<E>> {
        let count = get_count(source, self.max_len)?;
        let trues = IntSet::decode_within(source, count)?;
        (0..count)
            .map(|index| {
                let bit = u64::from(trues.contains(index as u32));
                self.access.from_bits(Some(bit))
            })
            .collect()
    }
}

/// Fixed-width scalars packed into one compressed block
struct PrimitiveArrayCodec<E> {
    access: Arc<dyn ScalarAccess<E>>,
    compressor: Arc<dyn BlockCompressor>,
    max_len: usize,
}

impl<E> Codec<Vec<E>> for PrimitiveArrayCodec<E> {
    fn encode(&self, value: &Vec<E>, sink: &mut dyn Sink) -> Result<()> {
        put_count(sink, value.len())?;
        let mut dense = DenseBuffer::with_capacity(self.access.kind(), value.len());
        for element in value {
            dense.push(self.access.bits(element).unwrap_or_default());
        }
        dense.write(sink, self.compressor.as_ref())
    }

    fn decode(&self, source: &mut dyn Source) -> Result<Vec<E>> {
        let count = get_count(source, self.max_len)?;
        let dense = DenseBuffer::read(source, self.compressor.as_ref(), self.access.kind(), count)?;
        dense
            .iter()
            .map(|bits| self.access.from_bits(Some(bits)))
            .collect()
    }
}

/// Each element through its own resolved codec
struct ElementArrayCodec<E> {
    element: Arc<dyn Codec<E>>,
    max_len: usize,
}

impl<E> Codec<Vec<E>> for ElementArrayCodec<E> {
    fn encode(&self, value: &Vec<E>, sink: &mut dyn Sink) -> Result<()> {
        put_count(sink, value.len())?;
        for element in value {
            self.element.encode(element, sink)?;
        }
        Ok(())
    }

    fn decode(&self, source: &mut dyn Source) -> Result<Vec<E>> {
        let count = get_count(source, self.max_len)?;
        let mut elements = Vec::with_capacity(count.min(MAX_PREALLOC));
        for _ in 0..count {
            elements.push(self.element.decode(source)?);
        }
        Ok(elements)
    }
}
