//! fieldwire: structural binary serialization with per-type derived codecs
//!
//! A codec is derived once per type from its shape: its fields for structs,
//! its constant names for enums, its element kind for arrays and
//! collections. Class codecs are cached in a [`Registry`] and reused for
//! every value of that type. The wire format carries no tags and no
//! version; the schema alone says how many bytes follow.
//!
//! # Wire Format
//!
//! ```text
//! struct      field 0 | field 1 | ...                  (no framing at all)
//! scalar      LE bytes, fixed width                    (never null)
//! Option<_>   presence u8 (0 = null, 1 = present) | payload
//! String      presence | varint len | UTF-8
//! enum        presence | varint len | constant name
//! Vec<i32>    presence | count u32 | block len u32 | compressed LE block
//! Vec<bool>   presence | count u32 | IntSet of true positions
//! Vec<T>      presence | count u32 | element...
//! VecDeque<Option<i64>>
//!             presence | count u32 | IntSet nulls | block len u32 | compressed LE block
//! HashMap<K, V>
//!             presence | count u32 | (key | value)...
//! ```
//!
//! The whole stream is then wrapped in an envelope (gzip by default), unless
//! the `_raw` entry points are used.
//!
//! # Features
//!
//! - `#[derive(Externalize)]` for structs and unit-only enums
//! - Inherited fields through `#[externalize(parent)]`, written after own fields
//! - Null tracking with compact integer sets instead of per-element bytes
//! - Bulk block compression of homogeneous scalar payloads (LZ4 or deflate)
//! - Gzip, checksummed-frame or plain envelopes
//! - Opaque serde/postcard escape hatch for types with no field layout
//!
//! # Example
//!
//! ```rust
//! use std::collections::VecDeque;
//! use fieldwire::{Externalize, Registry};
//!
//! #[derive(Debug, Default, PartialEq, Externalize)]
//! enum Side {
//!     #[default]
//!     Buy,
//!     Sell,
//! }
//!
//! #[derive(Debug, Default, PartialEq, Externalize)]
//! struct Order {
//!     id: u64,
//!     side: Side,
//!     symbol: Option<String>,
//!     fills: VecDeque<Option<i32>>,
//! }
//!
//! let registry = Registry::default();
//! let order = Order {
//!     id: 12345,
//!     side: Side::Sell,
//!     symbol: Some("AAPL".into()),
//!     fills: VecDeque::from([Some(100), None, Some(50)]),
//! };
//!
//! let bytes = registry.to_bytes(&order)?;
//! let decoded: Order = registry.from_bytes(&bytes)?;
//! assert_eq!(decoded, order);
//! # Ok::<(), fieldwire::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

extern crate self as fieldwire;

pub mod array;
pub mod bitmap;
pub mod codec;
pub mod collection;
pub mod compress;
pub mod config;
pub mod crc32c;
pub mod decoder;
pub mod encoder;
pub mod envelope;
pub mod error;
pub mod frame;
pub mod lang;
#[cfg(feature = "opaque")]
pub mod opaque;
pub mod primitive;
pub mod registry;
pub mod schema;
pub mod time;
pub mod varint;

// Re-export main types
pub use bitmap::IntSet;
pub use codec::{Codec, Externalize, Shape};
pub use collection::{CollectionType, MapType};
pub use compress::{BlockCompressor, CompressionAlgo};
pub use config::Config;
pub use decoder::{ByteCursor, Source};
pub use encoder::{BufferSink, Sink};
pub use envelope::{Envelope, EnvelopeKind};
pub use error::{Corruption, Error, Result};
pub use lang::EnumTable;
pub use primitive::ScalarKind;
pub use registry::Registry;
pub use schema::{ClassDescriptor, ClassSchema, Describe, FieldDescriptor};
pub use time::{MonthDay, Period, Year};

pub use fieldwire_derive::Externalize;
