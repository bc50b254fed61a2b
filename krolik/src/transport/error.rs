//! Errors raised while moving frames over the wire

use std::io;

use crate::frames;

/// Transport-level errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error from the socket
    #[error("IO Error {0:?}")]
    Io(#[from] io::Error),

    /// No inbound frame for roughly two heartbeat intervals
    #[error("idle timeout: no inbound traffic from the peer")]
    IdleTimeout,

    /// The peer sent bytes the frame codec rejects
    #[error(transparent)]
    Frame(frames::Error),
}

impl From<frames::Error> for Error {
    fn from(err: frames::Error) -> Self {
        match err {
            frames::Error::Io(e) => Self::Io(e),
            other => Self::Frame(other),
        }
    }
}
