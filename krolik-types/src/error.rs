//! Errors shared by the wire primitives

use std::str::Utf8Error;

/// Not enough readable bytes in a [`Buffer`](crate::Buffer).
///
/// A failed read never moves the read cursor, so the caller may retry the
/// same read once more bytes have been appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("buffer underflow")]
pub struct BufferUnderflow;

/// Errors decoding AMQP domain values from a buffer
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Not enough bytes; the buffer cursor is unchanged
    #[error(transparent)]
    Underflow(#[from] BufferUnderflow),

    /// A short string was not valid UTF-8
    #[error("short string is not valid UTF-8")]
    Utf8(#[from] Utf8Error),

    /// Unknown field-value type tag in a field table
    #[error("unknown field table value tag {0:#04x}")]
    UnknownFieldKind(u8),

    /// The method's class id has no schema entry
    #[error("unknown class id {0}")]
    UnknownClass(u16),

    /// The method id has no schema entry under its class
    #[error("unknown method id {method_id} for class {class_id}")]
    UnknownMethod {
        /// Class id of the offending method frame
        class_id: u16,
        /// Method id of the offending method frame
        method_id: u16,
    },
}

/// Errors encoding AMQP domain values
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// Short strings carry a one-byte length
    #[error("short string of {0} bytes exceeds 255")]
    ShortStringTooLong(usize),

    /// The method's (class id, method id) pair has no schema entry
    #[error("no schema entry for class {class_id} method {method_id}")]
    UnknownMethod {
        /// Class id of the method being encoded
        class_id: u16,
        /// Method id of the method being encoded
        method_id: u16,
    },

    /// The argument list does not line up with the schema layout
    #[error("arguments do not match the schema for {0}")]
    SchemaMismatch(&'static str),
}

/// Errors reading a typed field out of a decoded [`Method`](crate::Method)
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValueError {
    /// Field index past the end of the argument list
    #[error("no field at index {0}")]
    Index(usize),

    /// The field at this index has a different kind
    #[error("field {index} is a {found}, expected {expected}")]
    Kind {
        /// Index of the offending field
        index: usize,
        /// Kind found in the argument list
        found: &'static str,
        /// Kind the caller asked for
        expected: &'static str,
    },
}
