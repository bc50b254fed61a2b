//! Controls sent from handles to the Connection and Channel event loops

use krolik_types::{Method, ShortString};
use tokio::sync::{mpsc, oneshot};

use crate::channel::{self, frame::ChannelFrame};
use crate::connection::AllocChannelError;
use crate::frames::ContentHeader;
use crate::message::{Confirm, Delivery, GetMessage, Returned};
use crate::Payload;

/// The set of replies that may resolve a synchronous call
pub(crate) type Expected = &'static [(u16, u16)];

pub(crate) enum ConnectionControl {
    /// Graceful close requested by the handle
    Close,
    /// A channel engine saw a protocol violation; take the connection down
    CloseWithError {
        code: u16,
        text: String,
        class_id: u16,
        method_id: u16,
    },
    AllocateChannel {
        tx: mpsc::Sender<ChannelFrame>,
        responder: oneshot::Sender<Result<u16, AllocChannelError>>,
    },
    DeallocateChannel(u16),
}

pub(crate) enum ChannelControl {
    /// A synchronous call: write `request`, resolve with the reply matching
    /// `expect`
    Rpc {
        request: Method,
        expect: Expected,
        responder: oneshot::Sender<Result<Method, channel::Error>>,
    },
    /// A fire-and-forget method (ack, nack, reject, recover-async)
    Send {
        request: Method,
        responder: oneshot::Sender<Result<(), channel::Error>>,
    },
    /// `basic.publish` plus its content; resolves with the publish tag when
    /// confirms are enabled
    Publish {
        method: Method,
        header: ContentHeader,
        body: Payload,
        responder: oneshot::Sender<Result<Option<u64>, channel::Error>>,
    },
    /// `basic.consume`; deliveries flow to `deliveries` once registered
    Consume {
        request: Method,
        tag: ShortString,
        no_wait: bool,
        deliveries: mpsc::UnboundedSender<Delivery>,
        responder: oneshot::Sender<Result<ShortString, channel::Error>>,
    },
    /// `basic.cancel`
    Cancel {
        request: Method,
        tag: ShortString,
        responder: oneshot::Sender<Result<(), channel::Error>>,
    },
    /// `basic.get`; resolves `None` on `get-empty`
    Get {
        request: Method,
        responder: oneshot::Sender<Result<Option<GetMessage>, channel::Error>>,
    },
    /// `channel.flow`; resolves with the broker's active flag
    Flow {
        active: bool,
        responder: oneshot::Sender<Result<bool, channel::Error>>,
    },
    TxSelect {
        responder: oneshot::Sender<Result<(), channel::Error>>,
    },
    TxCommit {
        responder: oneshot::Sender<Result<(), channel::Error>>,
    },
    TxRollback {
        responder: oneshot::Sender<Result<(), channel::Error>>,
    },
    /// `confirm.select`; resolves with the stream of broker confirms
    ConfirmSelect {
        responder: oneshot::Sender<Result<mpsc::UnboundedReceiver<Confirm>, channel::Error>>,
    },
    /// Registers a `basic.return` listener
    ReturnListener {
        responder: oneshot::Sender<mpsc::UnboundedReceiver<Returned>>,
    },
    Close {
        responder: oneshot::Sender<Result<(), channel::Error>>,
    },
}
