//! Protocol constants from the AMQP 0-9-1 specification

/// Method frame type code
pub const FRAME_METHOD: u8 = 1;

/// Content-header frame type code
pub const FRAME_HEADER: u8 = 2;

/// Content-body frame type code
pub const FRAME_BODY: u8 = 3;

/// Heartbeat frame type code
pub const FRAME_HEARTBEAT: u8 = 8;

/// Every frame ends with this marker octet
pub const FRAME_END: u8 = 0xCE;

/// Bytes of the frame preamble: type, channel, payload size
pub const FRAME_PREAMBLE_SIZE: usize = 7;

/// Largest frame either peer may send before `connection.tune` completes
pub const FRAME_MIN_SIZE: u32 = 4096;

/// Protocol major version
pub const VERSION_MAJOR: u8 = 0;

/// Protocol minor version
pub const VERSION_MINOR: u8 = 9;

/// Protocol revision
pub const VERSION_REVISION: u8 = 1;

/// Default plain-TCP port
pub const PORT: u16 = 5672;

/// Default TLS port
pub const SECURE_PORT: u16 = 5671;
