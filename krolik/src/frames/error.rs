use std::io;

use krolik_types::error::{BufferUnderflow, DecodeError, EncodeError};

/// Errors raised by the frame codec.
///
/// Everything here except `Io` means the peer sent malformed bytes; all of
/// them are fatal to the connection. Running out of buffered bytes is not an
/// error at this layer — the decoder reports "no frame yet" instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error from the underlying transport
    #[error("IO Error {0:?}")]
    Io(#[from] io::Error),

    /// A frame did not end with the 0xCE marker
    #[error("frame does not end with the frame-end octet")]
    FrameEndInvalid,

    /// Frame type octet outside method/header/body/heartbeat
    #[error("invalid frame type {0}")]
    InvalidFrameType(u8),

    /// A method frame named a class this client does not know
    #[error("invalid class id {0}")]
    InvalidClass(u16),

    /// A method frame named a method this client does not know
    #[error("invalid method id {method_id} for class {class_id}")]
    InvalidMethod {
        /// Class id found on the wire
        class_id: u16,
        /// Method id found on the wire
        method_id: u16,
    },

    /// A frame exceeded the negotiated frame-max
    #[error("frame of {size} bytes exceeds the negotiated maximum of {frame_max}")]
    FrameTooLarge {
        /// Total size of the offending frame
        size: usize,
        /// Current frame-max bound
        frame_max: usize,
    },

    /// The server answered the protocol header with its own version
    #[error("server speaks a different protocol version: {0:?}")]
    ProtocolVersionMismatch([u8; 8]),

    /// A frame payload was shorter or less well-formed than its size field
    /// and schema demand
    #[error("malformed frame payload")]
    Malformed,
}

impl From<BufferUnderflow> for Error {
    fn from(_: BufferUnderflow) -> Self {
        // inside a fully-buffered frame an underflow means truncated payload
        Self::Malformed
    }
}

impl From<DecodeError> for Error {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::UnknownClass(class_id) => Self::InvalidClass(class_id),
            DecodeError::UnknownMethod {
                class_id,
                method_id,
            } => Self::InvalidMethod {
                class_id,
                method_id,
            },
            DecodeError::Underflow(_) | DecodeError::Utf8(_) | DecodeError::UnknownFieldKind(_) => {
                Self::Malformed
            }
        }
    }
}

impl From<EncodeError> for Error {
    fn from(err: EncodeError) -> Self {
        Self::Io(io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))
    }
}
