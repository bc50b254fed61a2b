//! Implements errors associated with a channel

use krolik_types::{definitions::ReplyCode, error::ValueError, ShortString};

/// Errors raised by channel operations.
///
/// `ServerClosed` carries the broker's soft (channel-scoped) reply; the
/// connection itself stays up. Hard errors arrive as
/// [`connection::Error`](crate::connection::Error) instead and fail every
/// channel at once as `ConnectionClosed`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The broker closed the channel with `channel.close`
    #[error("channel closed by the broker: {code} {text} (class {class_id} method {method_id})")]
    ServerClosed {
        /// Broker reply code (soft, 3xx/4xx)
        code: ReplyCode,
        /// Broker reply text
        text: ShortString,
        /// Class id of the method that failed, zero when not tied to one
        class_id: u16,
        /// Method id of the method that failed
        method_id: u16,
    },

    /// The operation needs an open channel
    #[error("channel is closed")]
    ChannelClosed,

    /// The connection went away while the call was pending, failing it
    #[error("connection closed while the call was pending")]
    ConnectionClosed,

    /// The connection has reached its negotiated channel-max
    #[error("channel-max reached, no channel id available")]
    ChannelMaxReached,

    /// `tx.select` on a channel already in a transaction
    #[error("tx.select: transaction already selected on this channel")]
    TxAlreadySelected,

    /// `tx.commit`/`tx.rollback` without a prior `tx.select`
    #[error("no transaction selected on this channel")]
    TxNotSelected,

    /// `confirm.select` on a channel already in confirm mode
    #[error("confirm.select: channel is already in confirm mode")]
    ConfirmAlreadySelected,

    /// `basic.consume` with `no-wait` needs a caller-chosen consumer tag
    #[error("consume with no-wait requires a non-empty consumer tag")]
    NoWaitNeedsTag,

    /// A reply frame carried arguments off its schema layout
    #[error("malformed reply arguments: {0}")]
    Reply(#[from] ValueError),
}

impl Error {
    /// Builds `ServerClosed` out of `channel.close` arguments
    pub(crate) fn server_closed(
        code: u16,
        text: ShortString,
        class_id: u16,
        method_id: u16,
    ) -> Self {
        Self::ServerClosed {
            code: ReplyCode(code),
            text,
            class_id,
            method_id,
        }
    }
}
