//! The delivery stream behind `basic.consume`

use krolik_types::ShortString;
use tokio::sync::mpsc;

use crate::message::Delivery;

/// A registered consumer.
///
/// Deliveries arrive through [`recv`](Self::recv), each exactly once. The
/// stream ends (`None`) when the consumer is cancelled from either side or
/// the channel goes away. Cancel it with
/// [`ChannelHandle::cancel`](crate::ChannelHandle::cancel).
#[derive(Debug)]
pub struct Consumer {
    tag: ShortString,
    deliveries: mpsc::UnboundedReceiver<Delivery>,
}

impl Consumer {
    pub(crate) fn new(tag: ShortString, deliveries: mpsc::UnboundedReceiver<Delivery>) -> Self {
        Self { tag, deliveries }
    }

    /// The consumer tag the broker knows this consumer by
    pub fn tag(&self) -> &ShortString {
        &self.tag
    }

    /// Waits for the next delivery
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.deliveries.recv().await
    }
}
