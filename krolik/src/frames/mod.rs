//! AMQP 0-9-1 frame type and corresponding encoder and decoder

use bytes::{Buf, BufMut, BytesMut};
use krolik_types::{
    constants::{
        FRAME_BODY, FRAME_END, FRAME_HEADER, FRAME_HEARTBEAT, FRAME_METHOD, FRAME_PREAMBLE_SIZE,
    },
    Buffer, BasicProperties, Method,
};
use tokio_util::codec::{Decoder, Encoder};

use crate::Payload;

mod error;
pub use error::Error;

/// A content-header frame payload: class id, body size and properties.
///
/// The reserved `weight` field is always encoded as zero.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentHeader {
    /// Class id of the method that carries this content
    pub class_id: u16,
    /// Total content size in bytes, across all body frames
    pub body_size: u64,
    /// Content properties
    pub properties: BasicProperties,
}

/// An AMQP frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Channel the frame belongs to; 0 is the connection itself
    pub channel: u16,

    /// Frame body
    pub body: FrameBody,
}

/// AMQP frame body
#[derive(Debug, Clone, PartialEq)]
pub enum FrameBody {
    /// A protocol method and its arguments
    Method(Method),

    /// A content header following a content-bearing method
    Header(ContentHeader),

    /// A chunk of content body
    Body(Payload),

    /// A heartbeat, only ever on channel 0
    Heartbeat,
}

impl Frame {
    /// Creates a new frame
    pub fn new(channel: u16, body: FrameBody) -> Self {
        Self { channel, body }
    }

    /// Creates a method frame
    pub fn method(channel: u16, method: Method) -> Self {
        Self::new(channel, FrameBody::Method(method))
    }

    /// Creates the heartbeat frame used to keep an idle connection alive
    pub fn heartbeat() -> Self {
        Self::new(0, FrameBody::Heartbeat)
    }
}

/// Encoder and decoder of AMQP frames.
///
/// `frame_max` starts at the pre-tune minimum and is raised to the
/// negotiated value once `connection.tune` completes.
#[derive(Debug)]
pub struct FrameCodec {
    frame_max: usize,
}

impl FrameCodec {
    /// Creates a codec bounded by the given maximum frame size
    pub fn new(frame_max: u32) -> Self {
        Self {
            frame_max: frame_max as usize,
        }
    }

    /// Raises or lowers the frame size bound after tuning
    pub fn set_frame_max(&mut self, frame_max: u32) {
        self.frame_max = frame_max as usize;
    }

    /// Largest body chunk that fits a single frame
    fn max_body_chunk(&self) -> usize {
        self.frame_max - FRAME_PREAMBLE_SIZE - 1
    }

    fn write_frame(&self, dst: &mut BytesMut, kind: u8, channel: u16, payload: &[u8]) {
        dst.reserve(FRAME_PREAMBLE_SIZE + payload.len() + 1);
        dst.put_u8(kind);
        dst.put_u16(channel);
        dst.put_u32(payload.len() as u32);
        dst.put_slice(payload);
        dst.put_u8(FRAME_END);
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item.body {
            FrameBody::Method(method) => {
                let mut payload = BytesMut::new();
                method.encode(&mut payload)?;
                self.write_frame(dst, FRAME_METHOD, item.channel, &payload);
            }
            FrameBody::Header(header) => {
                let mut payload = BytesMut::new();
                payload.put_u16(header.class_id);
                payload.put_u16(0); // weight, reserved
                payload.put_u64(header.body_size);
                header.properties.encode(&mut payload)?;
                self.write_frame(dst, FRAME_HEADER, item.channel, &payload);
            }
            FrameBody::Body(mut payload) => {
                // chunk oversized bodies into as many frames as needed
                while payload.len() > self.max_body_chunk() {
                    let chunk = payload.split_to(self.max_body_chunk());
                    self.write_frame(dst, FRAME_BODY, item.channel, &chunk);
                }
                self.write_frame(dst, FRAME_BODY, item.channel, &payload);
            }
            FrameBody::Heartbeat => {
                self.write_frame(dst, FRAME_HEARTBEAT, item.channel, &[]);
            }
        }
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // probe the preamble without consuming; partial frames stay put
        if src.len() < FRAME_PREAMBLE_SIZE {
            return Ok(None);
        }
        if &src[..4] == b"AMQP" {
            // the server answers an unsupported protocol header with its own
            if src.len() < 8 {
                return Ok(None);
            }
            let mut header = [0u8; 8];
            header.copy_from_slice(&src[..8]);
            src.advance(8);
            return Err(Error::ProtocolVersionMismatch(header));
        }

        let size = u32::from_be_bytes([src[3], src[4], src[5], src[6]]) as usize;
        if FRAME_PREAMBLE_SIZE + size + 1 > self.frame_max {
            return Err(Error::FrameTooLarge {
                size: FRAME_PREAMBLE_SIZE + size + 1,
                frame_max: self.frame_max,
            });
        }
        if src.len() < FRAME_PREAMBLE_SIZE + size + 1 {
            src.reserve(FRAME_PREAMBLE_SIZE + size + 1 - src.len());
            return Ok(None);
        }

        // the whole frame is buffered; consume it before validating so a
        // corrupt frame is never re-read as a different one
        let frame = src.split_to(FRAME_PREAMBLE_SIZE + size + 1);
        let mut buf = Buffer::from(&frame[..]);
        let kind = buf.get_u8()?;
        let channel = buf.get_u16()?;
        let _size = buf.get_u32()?;
        let payload = buf.consume(size)?;
        let mut payload = Buffer::from(payload);
        if buf.get_u8()? != FRAME_END {
            return Err(Error::FrameEndInvalid);
        }

        let body = match kind {
            FRAME_METHOD => FrameBody::Method(Method::decode(&mut payload)?),
            FRAME_HEADER => {
                let class_id = payload.get_u16()?;
                let _weight = payload.get_u16()?;
                let body_size = payload.get_u64()?;
                let properties = BasicProperties::decode(&mut payload)?;
                FrameBody::Header(ContentHeader {
                    class_id,
                    body_size,
                    properties,
                })
            }
            FRAME_BODY => FrameBody::Body(Payload::copy_from_slice(payload.as_slice())),
            FRAME_HEARTBEAT => FrameBody::Heartbeat,
            other => return Err(Error::InvalidFrameType(other)),
        };

        Ok(Some(Frame { channel, body }))
    }
}

#[cfg(test)]
mod tests {
    use krolik_types::methods;

    use super::*;

    fn codec() -> FrameCodec {
        FrameCodec::new(krolik_types::constants::FRAME_MIN_SIZE)
    }

    #[test]
    fn heartbeat_frame_bytes() {
        let mut dst = BytesMut::new();
        codec().encode(Frame::heartbeat(), &mut dst).unwrap();
        assert_eq!(&dst[..], &[8, 0, 0, 0, 0, 0, 0, 0xCE]);
    }

    #[test]
    fn method_frame_round_trip() {
        let frame = Frame::method(1, methods::basic_get("tasks", true));
        let mut dst = BytesMut::new();
        codec().encode(frame.clone(), &mut dst).unwrap();

        let decoded = codec().decode(&mut dst).unwrap().unwrap();
        assert!(dst.is_empty());
        assert_eq!(decoded, frame);
    }

    #[test]
    fn header_frame_round_trip() {
        let frame = Frame::new(
            3,
            FrameBody::Header(ContentHeader {
                class_id: 60,
                body_size: 13,
                properties: BasicProperties {
                    content_type: Some("text/plain".into()),
                    ..Default::default()
                },
            }),
        );
        let mut dst = BytesMut::new();
        codec().encode(frame.clone(), &mut dst).unwrap();
        let decoded = codec().decode(&mut dst).unwrap().unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn one_byte_at_a_time_never_errors() {
        let frames = [
            Frame::method(1, methods::queue_purge("q", false)),
            Frame::new(1, FrameBody::Body(Payload::from_static(b"payload"))),
            Frame::heartbeat(),
        ];
        let mut wire = BytesMut::new();
        let mut codec = codec();
        for frame in &frames {
            codec.encode(frame.clone(), &mut wire).unwrap();
        }

        let mut src = BytesMut::new();
        let mut decoded = Vec::new();
        for byte in &wire[..] {
            src.put_u8(*byte);
            while let Some(frame) = codec.decode(&mut src).unwrap() {
                decoded.push(frame);
            }
        }
        assert_eq!(decoded, frames);
    }

    #[test]
    fn split_and_batched_arrivals_preserve_order() {
        let frames: Vec<Frame> = (0u16..4)
            .map(|i| Frame::method(i + 1, methods::basic_ack(u64::from(i), false)))
            .collect();
        let mut wire = BytesMut::new();
        let mut codec = codec();
        for frame in &frames {
            codec.encode(frame.clone(), &mut wire).unwrap();
        }

        // all at once
        let mut src = wire.clone();
        let mut all_at_once = Vec::new();
        while let Some(frame) = codec.decode(&mut src).unwrap() {
            all_at_once.push(frame);
        }

        // split at an arbitrary mid-frame boundary
        let mut first = wire.clone();
        let second = first.split_off(wire.len() / 2 + 3);
        let mut src = BytesMut::new();
        let mut split_up = Vec::new();
        for part in [first, second] {
            src.extend_from_slice(&part);
            while let Some(frame) = codec.decode(&mut src).unwrap() {
                split_up.push(frame);
            }
        }

        assert_eq!(all_at_once, frames);
        assert_eq!(split_up, frames);
    }

    #[test]
    fn corrupt_frame_end_consumes_the_frame() {
        let mut wire = BytesMut::new();
        let mut codec = codec();
        codec
            .encode(Frame::method(1, methods::tx_select()), &mut wire)
            .unwrap();
        let last = wire.len() - 1;
        wire[last] = 0x00;
        codec.encode(Frame::heartbeat(), &mut wire).unwrap();

        assert!(matches!(codec.decode(&mut wire), Err(Error::FrameEndInvalid)));
        // the corrupted frame is gone; the next frame is intact behind it
        let next = codec.decode(&mut wire).unwrap().unwrap();
        assert_eq!(next, Frame::heartbeat());
    }

    #[test]
    fn oversized_body_is_chunked_on_encode() {
        let mut codec = codec();
        let body = Payload::from(vec![0xAB; 9000]);
        let frame = Frame::new(1, FrameBody::Body(body.clone()));
        let mut wire = BytesMut::new();
        codec.encode(frame, &mut wire).unwrap();

        let mut collected = BytesMut::new();
        let mut frames = 0;
        while let Some(frame) = codec.decode(&mut wire).unwrap() {
            match frame.body {
                FrameBody::Body(chunk) => collected.extend_from_slice(&chunk),
                other => panic!("unexpected {other:?}"),
            }
            frames += 1;
        }
        assert_eq!(frames, 3);
        assert_eq!(&collected[..], &body[..]);
    }

    #[test]
    fn server_protocol_header_reply_is_a_version_mismatch() {
        let mut src = BytesMut::from(&b"AMQP\x00\x00\x09\x00"[..]);
        assert!(matches!(
            codec().decode(&mut src),
            Err(Error::ProtocolVersionMismatch(_))
        ));
    }

    #[test]
    fn unknown_method_is_rejected() {
        let mut codec = codec();
        // class 60, method 255: no schema entry
        let payload = [0x00u8, 0x3C, 0x00, 0xFF];
        let mut wire = BytesMut::new();
        wire.put_u8(1);
        wire.put_u16(1);
        wire.put_u32(payload.len() as u32);
        wire.put_slice(&payload);
        wire.put_u8(FRAME_END);
        assert!(matches!(codec.decode(&mut wire), Err(Error::InvalidMethod { .. })));
    }
}
