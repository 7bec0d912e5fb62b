//! Opaque escape hatch through serde and postcard
//!
//! A type that cannot be described field by field can still be written as
//! one postcard blob: a 4-byte length, then the bytes. The engine does not
//! look inside. Opt in with `#[externalize(opaque)]` or
//! [`opaque_shape`] in a hand-written impl.

use std::any::type_name;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{Codec, Externalize, Shape};
use crate::decoder::Source;
use crate::encoder::Sink;
use crate::error::{Error, Result};
use crate::registry::Registry;

/// Shape routing `T` through the opaque delegate
pub fn opaque_shape<T>() -> Shape<T>
where
    T: Externalize + Serialize + DeserializeOwned,
{
    Shape::Opaque(resolve::<T>)
}

/// Build the opaque codec for `T`
pub fn resolve<T>(_registry: &Registry) -> Result<Arc<dyn Codec<T>>>
where
    T: Serialize + DeserializeOwned + 'static,
{
    Ok(Arc::new(OpaqueCodec::<T>(PhantomData)))
}

struct OpaqueCodec<T>(PhantomData<fn() -> T>);

impl<T: Serialize + DeserializeOwned> Codec<T> for OpaqueCodec<T> {
    fn encode(&self, value: &T, sink: &mut dyn Sink) -> Result<()> {
        let bytes = postcard::to_allocvec(value).map_err(|err| Error::DelegateFailure {
            type_name: type_name::<T>(),
            source: Box::new(err),
        })?;
        sink.put_block(&bytes)
    }

    fn decode(&self, source: &mut dyn Source) -> Result<T> {
        let bytes = source.get_block()?;
        postcard::from_bytes(&bytes).map_err(|err| Error::DelegateFailure {
            type_name: type_name::<T>(),
            source: Box::new(err),
        })
    }
}
