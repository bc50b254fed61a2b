//! Implements errors associated with the connection

use std::io;

use krolik_types::{definitions::ReplyCode, error::ValueError, ShortString};
use tokio::task::JoinError;

use crate::channel;
use crate::frames;
use crate::transport;

/// Errors associated with an established [`Connection`](crate::Connection).
///
/// All of these are hard: the connection is gone once one surfaces, and
/// every pending call on every channel has been failed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error
    #[error("IO Error {0:?}")]
    Io(#[from] io::Error),

    /// The event-loop task could not be joined
    #[error(transparent)]
    JoinError(JoinError),

    /// No inbound traffic for roughly two heartbeat intervals
    #[error("idle timeout: the peer looks dead")]
    IdleTimeout,

    /// The peer sent bytes that do not form valid frames
    #[error("protocol error: {0}")]
    Protocol(frames::Error),

    /// The broker closed the connection with a hard error
    #[error("connection closed by the broker: {code} {text}")]
    Remote {
        /// Broker reply code
        code: ReplyCode,
        /// Broker reply text
        text: ShortString,
    },

    /// This client closed the connection after a protocol violation
    #[error("connection closed locally: {code} {text}")]
    Local {
        /// Reply code reported to the broker
        code: ReplyCode,
        /// Reply text reported to the broker
        text: String,
        /// Class id of the offending method, zero when none
        class_id: u16,
        /// Method id of the offending method
        method_id: u16,
    },
}

impl From<transport::Error> for Error {
    fn from(err: transport::Error) -> Self {
        match err {
            transport::Error::Io(e) => Self::Io(e),
            transport::Error::IdleTimeout => Self::IdleTimeout,
            transport::Error::Frame(e) => Self::Protocol(e),
        }
    }
}

/// Error allocating a new channel id
#[derive(Debug, thiserror::Error)]
pub(crate) enum AllocChannelError {
    #[error("connection is not open")]
    IllegalState,

    #[error("reached the negotiated channel-max")]
    ChannelMaxReached,
}

impl From<AllocChannelError> for channel::Error {
    fn from(err: AllocChannelError) -> Self {
        match err {
            AllocChannelError::IllegalState => channel::Error::ConnectionClosed,
            AllocChannelError::ChannelMaxReached => channel::Error::ChannelMaxReached,
        }
    }
}

/// Errors establishing a connection
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    /// IO error
    #[error("IO Error {0:?}")]
    Io(#[from] io::Error),

    /// Error parsing the address
    #[error(transparent)]
    UrlError(#[from] url::ParseError),

    /// Only the `amqp` scheme opens a socket here; establish TLS yourself
    /// and use `open_with_stream`
    #[error(r#"invalid scheme, only "amqp" is supported here"#)]
    InvalidScheme,

    /// Address has no host
    #[error("invalid domain")]
    InvalidDomain,

    /// The TCP connect did not finish within the configured timeout
    #[error("timed out connecting to the broker")]
    ConnectTimeout,

    /// The server answered the protocol header with its own
    #[error("protocol header mismatch, server sent {0:?}")]
    ProtocolHeaderMismatch([u8; 8]),

    /// `connection.start` announced a version other than 0-9
    #[error("server speaks {major}-{minor}, not 0-9")]
    ServerVersion {
        /// Server major version
        major: u8,
        /// Server minor version
        minor: u8,
    },

    /// The server does not offer the configured SASL mechanism
    #[error("server mechanisms {0:?} do not include the configured one")]
    MechanismNotSupported(String),

    /// The server rejected the credentials
    #[error("authentication rejected: {code} {text}")]
    SaslRejected {
        /// Broker reply code (403)
        code: ReplyCode,
        /// Broker reply text
        text: ShortString,
    },

    /// The server closed the connection during the handshake
    #[error("connection refused: {code} {text}")]
    Remote {
        /// Broker reply code
        code: ReplyCode,
        /// Broker reply text
        text: ShortString,
    },

    /// The peer broke framing during the handshake
    #[error("protocol error during handshake: {0}")]
    Protocol(frames::Error),

    /// The handshake saw a frame it cannot accept in its strict order
    #[error("unexpected frame during handshake")]
    UnexpectedFrame,

    /// A handshake reply carried arguments off its schema layout
    #[error("malformed handshake reply: {0}")]
    Handshake(#[from] ValueError),
}

impl From<transport::Error> for OpenError {
    fn from(err: transport::Error) -> Self {
        match err {
            transport::Error::Io(e) => Self::Io(e),
            transport::Error::IdleTimeout => Self::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                "idle timeout during handshake",
            )),
            transport::Error::Frame(frames::Error::ProtocolVersionMismatch(header)) => {
                Self::ProtocolHeaderMismatch(header)
            }
            transport::Error::Frame(e) => Self::Protocol(e),
        }
    }
}

impl From<Error> for OpenError {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => Self::Io(e),
            Error::JoinError(e) => Self::Io(io::Error::new(io::ErrorKind::Other, e.to_string())),
            Error::IdleTimeout => Self::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                "idle timeout during handshake",
            )),
            Error::Protocol(e) => Self::Protocol(e),
            Error::Remote { code, text } => Self::Remote { code, text },
            Error::Local { .. } => Self::UnexpectedFrame,
        }
    }
}
