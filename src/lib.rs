//! # gattpacket: GATT characteristic value codec
//!
//! Encodes named field values into Bluetooth GATT characteristic payloads and decodes
//! payloads back, driven by per-characteristic schemas. Schemas come from an embedded
//! table of SIG and vendor characteristics, written in a small schema language parsed
//! with PEST, and can be extended at run time.
//!
//! ## Field types
//!
//! - Integers: `uint8`..`uint64`, `int8`..`int64` (`sint*` and `*le` aliases), 24-bit `uint24`/`int24`,
//!   big-endian `uint16be`..`int64be`
//! - IEEE-11073 `sfloat` (16-bit) and `float` (32-bit); IEEE-754 `floatle`, `floatbe`,
//!   `doublele`, `doublebe`
//! - `boolean`, `nibble` (always in adjacent pairs sharing one byte)
//! - `string`, `stringPreLenUint8`, `bufferPreLenUint8`, `buffer`, `variable`
//! - `uuid`, `addr<N>` (hex strings stored least-significant byte first)
//! - `list` (repeated scalar; element type declared per characteristic)
//!
//! Optional fields are declared in an `extra` section and selected by a `flags`
//! bitmask, a `condition` value or an `opcode` value.
//!
//! ## Example schema
//!
//! ```text
//! characteristic 0x2a37 "Heart Rate Measurement" {
//!     flags: uint8;
//!     extra {
//!         heartRate8: uint8 if 0x01 => 0x00;
//!         heartRate16: uint16 if 0x01 => 0x01;
//!     }
//! }
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use gattpacket::{GattCodec, Value, ValueObject};
//!
//! let codec = GattCodec::with_builtin()?;
//! let mut values = ValueObject::new();
//! values.insert("level".into(), Value::U8(87));
//! let bytes = codec.encode(0x2a19u16, &values)?;
//! assert_eq!(bytes, vec![87]);
//! # Ok::<(), gattpacket::CodecError>(())
//! ```

pub mod ast;
pub mod bits;
pub mod codec;
pub mod dump;
pub mod extra;
pub mod ieee11073;
pub mod overrides;
pub mod parser;
pub mod registry;
pub mod rules;
pub mod value;

pub use ast::{CharId, CharSchema, ExtraSchema, FieldType, ListElement};
pub use codec::{CodecError, Decoded, GattCodec, ValueObject};
pub use extra::Discriminant;
pub use parser::parse;
pub use registry::SchemaRegistry;
pub use value::{SpecialFloat, Value};
