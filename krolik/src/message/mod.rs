//! Application-level messages assembled from content frames

use krolik_types::{definitions::ReplyCode, BasicProperties, ShortString};

use crate::Payload;

pub(crate) mod assembler;

/// A message pushed to a consumer by `basic.deliver`.
///
/// Acknowledge it through the channel with the carried `delivery_tag`; the
/// message itself holds no reference back to the channel.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Tag of the consumer this delivery belongs to
    pub consumer_tag: ShortString,
    /// Per-channel acknowledgement handle
    pub delivery_tag: u64,
    /// Whether the broker delivered this message before
    pub redelivered: bool,
    /// Exchange the message was published to
    pub exchange: ShortString,
    /// Routing key it was published with
    pub routing_key: ShortString,
    /// Content properties
    pub properties: BasicProperties,
    /// Content bytes
    pub body: Payload,
}

/// A message pulled with `basic.get`
#[derive(Debug, Clone)]
pub struct GetMessage {
    /// Per-channel acknowledgement handle
    pub delivery_tag: u64,
    /// Whether the broker delivered this message before
    pub redelivered: bool,
    /// Exchange the message was published to
    pub exchange: ShortString,
    /// Routing key it was published with
    pub routing_key: ShortString,
    /// Messages left on the queue after this one
    pub message_count: u32,
    /// Content properties
    pub properties: BasicProperties,
    /// Content bytes
    pub body: Payload,
}

/// An unroutable mandatory (or immediate) publish handed back by
/// `basic.return`
#[derive(Debug, Clone)]
pub struct Returned {
    /// Why the broker returned the message
    pub reply_code: ReplyCode,
    /// Human-readable reason
    pub reply_text: ShortString,
    /// Exchange the message was published to
    pub exchange: ShortString,
    /// Routing key it was published with
    pub routing_key: ShortString,
    /// Content properties
    pub properties: BasicProperties,
    /// Content bytes
    pub body: Payload,
}

/// A publisher-confirm event (`basic.ack` or `basic.nack` from the broker).
///
/// With `multiple` set the event covers every outstanding tag up to and
/// including `delivery_tag`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirm {
    /// Highest publish tag this event settles
    pub delivery_tag: u64,
    /// Whether the event is cumulative
    pub multiple: bool,
    /// True for `basic.nack`: the broker could not take responsibility
    pub nack: bool,
}
