//! Reassembles method + header + body frame runs into complete messages
//!
//! The same machinery serves `basic.deliver`, `basic.get-ok` and
//! `basic.return`; only the arming context differs. A channel has at most
//! one reassembly in flight, and content frames must arrive contiguously on
//! it, so any out-of-place frame here is a protocol error that takes the
//! connection down.

use bytes::BytesMut;
use krolik_types::{definitions::ReplyCode, BasicProperties, ShortString};

use crate::frames::ContentHeader;
use crate::Payload;

use super::{Delivery, GetMessage, Returned};

/// The method frame that armed the reassembly
#[derive(Debug)]
pub(crate) enum DeliveryContext {
    /// `basic.deliver`
    Deliver {
        consumer_tag: ShortString,
        delivery_tag: u64,
        redelivered: bool,
        exchange: ShortString,
        routing_key: ShortString,
    },
    /// `basic.get-ok`
    GetOk {
        delivery_tag: u64,
        redelivered: bool,
        exchange: ShortString,
        routing_key: ShortString,
        message_count: u32,
    },
    /// `basic.return`
    Return {
        reply_code: ReplyCode,
        reply_text: ShortString,
        exchange: ShortString,
        routing_key: ShortString,
    },
}

/// A finished message, tagged by how it should be dispatched
#[derive(Debug)]
pub(crate) enum CompletedMessage {
    Delivery(Delivery),
    Get(GetMessage),
    Returned(Returned),
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum AssembleError {
    #[error("content-bearing method while a delivery is already being assembled")]
    DeliveryInProgress,

    #[error("content header without a content-bearing method, or repeated")]
    UnexpectedHeader,

    #[error("content body without a preceding content header")]
    UnexpectedBody,

    #[error("content body overruns the announced size of {expected} bytes")]
    BodyOverflow {
        expected: u64,
    },
}

#[derive(Debug)]
struct PartialMessage {
    context: DeliveryContext,
    // body size announced by the content header; None until it arrives
    expected: Option<u64>,
    properties: BasicProperties,
    body: BytesMut,
}

impl PartialMessage {
    fn complete(self) -> CompletedMessage {
        let properties = self.properties;
        let body: Payload = self.body.freeze();
        match self.context {
            DeliveryContext::Deliver {
                consumer_tag,
                delivery_tag,
                redelivered,
                exchange,
                routing_key,
            } => CompletedMessage::Delivery(Delivery {
                consumer_tag,
                delivery_tag,
                redelivered,
                exchange,
                routing_key,
                properties,
                body,
            }),
            DeliveryContext::GetOk {
                delivery_tag,
                redelivered,
                exchange,
                routing_key,
                message_count,
            } => CompletedMessage::Get(GetMessage {
                delivery_tag,
                redelivered,
                exchange,
                routing_key,
                message_count,
                properties,
                body,
            }),
            DeliveryContext::Return {
                reply_code,
                reply_text,
                exchange,
                routing_key,
            } => CompletedMessage::Returned(Returned {
                reply_code,
                reply_text,
                exchange,
                routing_key,
                properties,
                body,
            }),
        }
    }
}

/// Per-channel content reassembly cursor
#[derive(Debug, Default)]
pub(crate) struct MessageAssembler {
    in_flight: Option<PartialMessage>,
}

impl MessageAssembler {
    /// Whether a reassembly is in flight
    pub fn is_armed(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Starts a reassembly for the given method context
    pub fn arm(&mut self, context: DeliveryContext) -> Result<(), AssembleError> {
        if self.in_flight.is_some() {
            return Err(AssembleError::DeliveryInProgress);
        }
        self.in_flight = Some(PartialMessage {
            context,
            expected: None,
            properties: BasicProperties::default(),
            body: BytesMut::new(),
        });
        Ok(())
    }

    /// Feeds the content header; a zero body size completes immediately
    pub fn on_header(
        &mut self,
        header: ContentHeader,
    ) -> Result<Option<CompletedMessage>, AssembleError> {
        let partial = match &mut self.in_flight {
            Some(partial) if partial.expected.is_none() => partial,
            _ => return Err(AssembleError::UnexpectedHeader),
        };
        partial.expected = Some(header.body_size);
        partial.properties = header.properties;
        if header.body_size == 0 {
            return Ok(self.in_flight.take().map(PartialMessage::complete));
        }
        Ok(None)
    }

    /// Feeds one body frame; completes once the announced size is collected
    pub fn on_body(&mut self, payload: Payload) -> Result<Option<CompletedMessage>, AssembleError> {
        let (partial, expected) = match &mut self.in_flight {
            Some(partial) => match partial.expected {
                Some(expected) => (partial, expected),
                None => return Err(AssembleError::UnexpectedBody),
            },
            None => return Err(AssembleError::UnexpectedBody),
        };
        if partial.body.len() as u64 + payload.len() as u64 > expected {
            return Err(AssembleError::BodyOverflow { expected });
        }
        partial.body.extend_from_slice(&payload);
        if partial.body.len() as u64 == expected {
            return Ok(self.in_flight.take().map(PartialMessage::complete));
        }
        Ok(None)
    }

    /// Discards any partial message (channel or connection teardown)
    pub fn abort(&mut self) {
        self.in_flight = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deliver_context() -> DeliveryContext {
        DeliveryContext::Deliver {
            consumer_tag: "ctag-1".into(),
            delivery_tag: 1,
            redelivered: false,
            exchange: "".into(),
            routing_key: "q".into(),
        }
    }

    fn header(body_size: u64) -> ContentHeader {
        ContentHeader {
            class_id: 60,
            body_size,
            properties: BasicProperties::default(),
        }
    }

    #[test]
    fn any_split_of_the_body_yields_one_message() {
        let payload = b"abcdefghij";
        for split in 0..=payload.len() {
            let mut assembler = MessageAssembler::default();
            assembler.arm(deliver_context()).unwrap();
            assert!(assembler.on_header(header(payload.len() as u64)).unwrap().is_none());

            let (a, b) = payload.split_at(split);
            let mut completed = Vec::new();
            for chunk in [a, b] {
                if chunk.is_empty() {
                    continue;
                }
                if let Some(message) = assembler
                    .on_body(Payload::copy_from_slice(chunk))
                    .unwrap()
                {
                    completed.push(message);
                }
            }

            assert_eq!(completed.len(), 1, "split at {split}");
            match &completed[0] {
                CompletedMessage::Delivery(delivery) => {
                    assert_eq!(&delivery.body[..], payload);
                }
                other => panic!("unexpected {other:?}"),
            }
            assert!(!assembler.is_armed());
        }
    }

    #[test]
    fn zero_body_size_completes_at_the_header() {
        let mut assembler = MessageAssembler::default();
        assembler.arm(deliver_context()).unwrap();
        let message = assembler.on_header(header(0)).unwrap().unwrap();
        match message {
            CompletedMessage::Delivery(delivery) => assert!(delivery.body.is_empty()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn second_arm_while_in_flight_is_rejected() {
        let mut assembler = MessageAssembler::default();
        assembler.arm(deliver_context()).unwrap();
        assert!(matches!(
            assembler.arm(deliver_context()),
            Err(AssembleError::DeliveryInProgress)
        ));
    }

    #[test]
    fn stray_header_and_body_are_rejected() {
        let mut assembler = MessageAssembler::default();
        assert!(matches!(
            assembler.on_header(header(1)),
            Err(AssembleError::UnexpectedHeader)
        ));
        assert!(matches!(
            assembler.on_body(Payload::from_static(b"x")),
            Err(AssembleError::UnexpectedBody)
        ));

        // body before header, while armed
        assembler.arm(deliver_context()).unwrap();
        assert!(matches!(
            assembler.on_body(Payload::from_static(b"x")),
            Err(AssembleError::UnexpectedBody)
        ));

        // a second header is just as wrong
        assembler.on_header(header(2)).unwrap();
        assert!(matches!(
            assembler.on_header(header(2)),
            Err(AssembleError::UnexpectedHeader)
        ));
    }

    #[test]
    fn body_overflow_is_rejected() {
        let mut assembler = MessageAssembler::default();
        assembler.arm(deliver_context()).unwrap();
        assembler.on_header(header(3)).unwrap();
        assert!(matches!(
            assembler.on_body(Payload::from_static(b"abcd")),
            Err(AssembleError::BodyOverflow { expected: 3 })
        ));
    }

    #[test]
    fn abort_discards_the_partial() {
        let mut assembler = MessageAssembler::default();
        assembler.arm(deliver_context()).unwrap();
        assembler.on_header(header(5)).unwrap();
        assembler.on_body(Payload::from_static(b"ab")).unwrap();
        assembler.abort();
        assert!(!assembler.is_armed());
        assert!(assembler.arm(deliver_context()).is_ok());
    }
}
