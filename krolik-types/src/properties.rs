//! Content properties of the `basic` class

use bytes::{BufMut, BytesMut};

use crate::{
    codec,
    error::{DecodeError, EncodeError},
    Buffer, FieldTable, ShortString,
};

const FLAG_CONTENT_TYPE: u16 = 1 << 15;
const FLAG_CONTENT_ENCODING: u16 = 1 << 14;
const FLAG_HEADERS: u16 = 1 << 13;
const FLAG_DELIVERY_MODE: u16 = 1 << 12;
const FLAG_PRIORITY: u16 = 1 << 11;
const FLAG_CORRELATION_ID: u16 = 1 << 10;
const FLAG_REPLY_TO: u16 = 1 << 9;
const FLAG_EXPIRATION: u16 = 1 << 8;
const FLAG_MESSAGE_ID: u16 = 1 << 7;
const FLAG_TIMESTAMP: u16 = 1 << 6;
const FLAG_MESSAGE_TYPE: u16 = 1 << 5;
const FLAG_USER_ID: u16 = 1 << 4;
const FLAG_APP_ID: u16 = 1 << 3;
const FLAG_CLUSTER_ID: u16 = 1 << 2;
const FLAG_CONTINUATION: u16 = 1;

/// Message delivery mode
pub mod delivery_mode {
    /// Message is lost on broker restart
    pub const TRANSIENT: u8 = 1;
    /// Message survives broker restart (on a durable queue)
    pub const PERSISTENT: u8 = 2;
}

/// The optional content properties carried by a content-header frame.
///
/// Encoded as a u16 property-flags bitmap (highest bit first, lowest bit
/// reserved for continuation) followed by the present property values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicProperties {
    /// MIME content type
    pub content_type: Option<ShortString>,
    /// MIME content encoding
    pub content_encoding: Option<ShortString>,
    /// Application headers
    pub headers: Option<FieldTable>,
    /// 1 transient, 2 persistent
    pub delivery_mode: Option<u8>,
    /// Priority, 0 to 9
    pub priority: Option<u8>,
    /// Application correlation identifier
    pub correlation_id: Option<ShortString>,
    /// Address to reply to
    pub reply_to: Option<ShortString>,
    /// Message expiration, milliseconds as a string
    pub expiration: Option<ShortString>,
    /// Application message identifier
    pub message_id: Option<ShortString>,
    /// Message timestamp, POSIX seconds
    pub timestamp: Option<u64>,
    /// Message type name
    pub message_type: Option<ShortString>,
    /// Creating user id, verified by RabbitMQ
    pub user_id: Option<ShortString>,
    /// Creating application id
    pub app_id: Option<ShortString>,
    /// Reserved, unused by RabbitMQ
    pub cluster_id: Option<ShortString>,
}

impl BasicProperties {
    /// Properties with every field absent (a zero flags word)
    pub fn new() -> Self {
        Self::default()
    }

    fn flags(&self) -> u16 {
        let mut flags = 0;
        let mut set = |present: bool, flag: u16| {
            if present {
                flags |= flag;
            }
        };
        set(self.content_type.is_some(), FLAG_CONTENT_TYPE);
        set(self.content_encoding.is_some(), FLAG_CONTENT_ENCODING);
        set(self.headers.is_some(), FLAG_HEADERS);
        set(self.delivery_mode.is_some(), FLAG_DELIVERY_MODE);
        set(self.priority.is_some(), FLAG_PRIORITY);
        set(self.correlation_id.is_some(), FLAG_CORRELATION_ID);
        set(self.reply_to.is_some(), FLAG_REPLY_TO);
        set(self.expiration.is_some(), FLAG_EXPIRATION);
        set(self.message_id.is_some(), FLAG_MESSAGE_ID);
        set(self.timestamp.is_some(), FLAG_TIMESTAMP);
        set(self.message_type.is_some(), FLAG_MESSAGE_TYPE);
        set(self.user_id.is_some(), FLAG_USER_ID);
        set(self.app_id.is_some(), FLAG_APP_ID);
        set(self.cluster_id.is_some(), FLAG_CLUSTER_ID);
        flags
    }

    /// Encodes the flags word and the present properties
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), EncodeError> {
        dst.put_u16(self.flags());

        put_short_str(dst, &self.content_type)?;
        put_short_str(dst, &self.content_encoding)?;
        if let Some(headers) = &self.headers {
            codec::encode_field_table(dst, headers)?;
        }
        if let Some(mode) = self.delivery_mode {
            dst.put_u8(mode);
        }
        if let Some(priority) = self.priority {
            dst.put_u8(priority);
        }
        put_short_str(dst, &self.correlation_id)?;
        put_short_str(dst, &self.reply_to)?;
        put_short_str(dst, &self.expiration)?;
        put_short_str(dst, &self.message_id)?;
        if let Some(timestamp) = self.timestamp {
            dst.put_u64(timestamp);
        }
        put_short_str(dst, &self.message_type)?;
        put_short_str(dst, &self.user_id)?;
        put_short_str(dst, &self.app_id)?;
        put_short_str(dst, &self.cluster_id)?;
        Ok(())
    }

    /// Decodes the flags word and the present properties
    pub fn decode(src: &mut Buffer) -> Result<Self, DecodeError> {
        let flags = src.get_u16()?;
        // no 0-9-1 property class needs continuation words; skip any present
        let mut last = flags;
        while last & FLAG_CONTINUATION != 0 {
            last = src.get_u16()?;
        }

        let mut props = Self::new();
        let mut short_str = |flag: u16, src: &mut Buffer| -> Result<Option<ShortString>, DecodeError> {
            if flags & flag != 0 {
                Ok(Some(codec::decode_short_string(src)?))
            } else {
                Ok(None)
            }
        };
        props.content_type = short_str(FLAG_CONTENT_TYPE, src)?;
        props.content_encoding = short_str(FLAG_CONTENT_ENCODING, src)?;
        if flags & FLAG_HEADERS != 0 {
            props.headers = Some(codec::decode_field_table(src)?);
        }
        if flags & FLAG_DELIVERY_MODE != 0 {
            props.delivery_mode = Some(src.get_u8()?);
        }
        if flags & FLAG_PRIORITY != 0 {
            props.priority = Some(src.get_u8()?);
        }
        props.correlation_id = short_str(FLAG_CORRELATION_ID, src)?;
        props.reply_to = short_str(FLAG_REPLY_TO, src)?;
        props.expiration = short_str(FLAG_EXPIRATION, src)?;
        props.message_id = short_str(FLAG_MESSAGE_ID, src)?;
        if flags & FLAG_TIMESTAMP != 0 {
            props.timestamp = Some(src.get_u64()?);
        }
        props.message_type = short_str(FLAG_MESSAGE_TYPE, src)?;
        props.user_id = short_str(FLAG_USER_ID, src)?;
        props.app_id = short_str(FLAG_APP_ID, src)?;
        props.cluster_id = short_str(FLAG_CLUSTER_ID, src)?;
        Ok(props)
    }
}

fn put_short_str(dst: &mut BytesMut, value: &Option<ShortString>) -> Result<(), EncodeError> {
    match value {
        Some(s) => codec::encode_short_string(dst, s),
        None => Ok(()),
    }
}
