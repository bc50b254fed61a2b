//! Wire-level primitives for AMQP 0-9-1 as spoken by RabbitMQ.
//!
//! This crate carries no I/O. It provides the byte [`Buffer`] the codecs
//! read from, the AMQP domain codecs (strings, field tables, timestamps),
//! the [`BasicProperties`] content properties, and the generic [`Method`]
//! value whose field layout is driven by the static [`schema`] table rather
//! than one nominal type per protocol method.

#![deny(missing_docs, missing_debug_implementations)]

pub mod buffer;
pub mod codec;
pub mod constants;
pub mod definitions;
pub mod error;
pub mod field_table;
pub mod method;
pub mod methods;
pub mod properties;
pub mod schema;

mod short_string;

pub use buffer::Buffer;
pub use error::{BufferUnderflow, DecodeError, EncodeError, ValueError};
pub use field_table::{FieldTable, FieldValue};
pub use method::{Field, Method};
pub use properties::BasicProperties;
pub use short_string::ShortString;

/// An AMQP long string: length-prefixed raw bytes, not necessarily UTF-8.
pub type LongString = Vec<u8>;
