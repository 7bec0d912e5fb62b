//! Text and enumeration codecs

use crate::codec::{Codec, Externalize, Shape};
use crate::decoder::Source;
use crate::encoder::Sink;
use crate::error::{Corruption, Result};

/// UTF-8 text with a varint byte length
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

static TEXT: TextCodec = TextCodec;

impl Codec<String> for TextCodec {
    #[inline]
    fn encode(&self, value: &String, sink: &mut dyn Sink) -> Result<()> {
        sink.put_str(value)
    }

    #[inline]
    fn decode(&self, source: &mut dyn Source) -> Result<String> {
        source.get_string()
    }
}

impl Externalize for String {
    fn shape() -> Shape<Self> {
        Shape::Text(&TEXT)
    }
}

/// Name table of a unit-only enumeration
///
/// Constants are written by name, so reordering the declaration does not
/// change what a stream decodes to.
pub struct EnumTable<T> {
    type_name: &'static str,
    names: &'static [&'static str],
    name_of: fn(&T) -> &'static str,
    from_name: fn(&str) -> Option<T>,
}

impl<T> Clone for EnumTable<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for EnumTable<T> {}

impl<T> EnumTable<T> {
    /// Build a table from the constant names and both lookups
    pub const fn new(
        type_name: &'static str,
        names: &'static [&'static str],
        name_of: fn(&T) -> &'static str,
        from_name: fn(&str) -> Option<T>,
    ) -> Self {
        Self {
            type_name,
            names,
            name_of,
            from_name,
        }
    }

    /// Declared constant names
    pub fn names(&self) -> &'static [&'static str] {
        self.names
    }

    /// Enumeration type name
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// Codec writing an enumeration constant as its name
pub struct EnumCodec<T> {
    table: EnumTable<T>,
}

impl<T> EnumCodec<T> {
    /// Build over a name table
    pub fn new(table: EnumTable<T>) -> Self {
        Self { table }
    }
}

impl<T> Codec<T> for EnumCodec<T> {
    fn encode(&self, value: &T, sink: &mut dyn Sink) -> Result<()> {
        sink.put_str((self.table.name_of)(value))
    }

    fn decode(&self, source: &mut dyn Source) -> Result<T> {
        let name = source.get_string()?;
        (self.table.from_name)(&name).ok_or_else(|| Corruption::UnknownVariant(name).into())
    }
}
