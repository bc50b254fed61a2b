//! Reply codes defined in AMQP 0-9-1 section 1.2 "constants"

/// A reply code carried by `connection.close`, `channel.close` and
/// `basic.return`.
///
/// Codes in the 3xx/4xx range are soft errors scoped to a channel; 5xx codes
/// (and 320/402, which the specification marks as connection errors) are
/// hard and take the whole connection down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReplyCode(pub u16);

/// Normal completion
pub const REPLY_SUCCESS: ReplyCode = ReplyCode(200);

/// Message too large for the current limits (soft)
pub const CONTENT_TOO_LARGE: ReplyCode = ReplyCode(311);

/// Mandatory publish could not be routed (soft, via `basic.return`)
pub const NO_ROUTE: ReplyCode = ReplyCode(312);

/// Immediate publish had no ready consumer (soft, via `basic.return`)
pub const NO_CONSUMERS: ReplyCode = ReplyCode(313);

/// Operator shut the connection down (hard)
pub const CONNECTION_FORCED: ReplyCode = ReplyCode(320);

/// Virtual host does not exist (hard)
pub const INVALID_PATH: ReplyCode = ReplyCode(402);

/// Authentication or authorization failure (soft)
pub const ACCESS_REFUSED: ReplyCode = ReplyCode(403);

/// Referenced entity does not exist (soft)
pub const NOT_FOUND: ReplyCode = ReplyCode(404);

/// Exclusive-access conflict (soft)
pub const RESOURCE_LOCKED: ReplyCode = ReplyCode(405);

/// Declared entity exists with different parameters (soft)
pub const PRECONDITION_FAILED: ReplyCode = ReplyCode(406);

/// Malformed frame (hard)
pub const FRAME_ERROR: ReplyCode = ReplyCode(501);

/// Frame contained illegal values (hard)
pub const SYNTAX_ERROR: ReplyCode = ReplyCode(502);

/// Method invalid for the current state (hard)
pub const COMMAND_INVALID: ReplyCode = ReplyCode(503);

/// Frame on an unopened channel (hard)
pub const CHANNEL_ERROR: ReplyCode = ReplyCode(504);

/// Content frames out of sequence (hard)
pub const UNEXPECTED_FRAME: ReplyCode = ReplyCode(505);

/// Broker out of resources (hard)
pub const RESOURCE_ERROR: ReplyCode = ReplyCode(506);

/// Operation not permitted (hard)
pub const NOT_ALLOWED: ReplyCode = ReplyCode(530);

/// Method not implemented by the peer (hard)
pub const NOT_IMPLEMENTED: ReplyCode = ReplyCode(540);

/// Broker internal error (hard)
pub const INTERNAL_ERROR: ReplyCode = ReplyCode(541);

impl ReplyCode {
    /// Whether this code reports success rather than any error
    pub fn is_success(self) -> bool {
        self.0 == REPLY_SUCCESS.0
    }

    /// Whether this is a channel-scoped (soft) error code
    pub fn is_soft_error(self) -> bool {
        matches!(self.0, 300..=499) && !matches!(self, CONNECTION_FORCED | INVALID_PATH)
    }

    /// Whether this is a connection-scoped (hard) error code
    pub fn is_hard_error(self) -> bool {
        !self.is_success() && !self.is_soft_error()
    }
}

impl From<u16> for ReplyCode {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl From<ReplyCode> for u16 {
    fn from(code: ReplyCode) -> Self {
        code.0
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
