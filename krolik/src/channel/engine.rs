//! The channel event loop
//!
//! Owns all per-channel protocol state: the FIFO queue of pending
//! synchronous calls, the consumer registry, transaction and confirm
//! sub-states and the content reassembly cursor. Frames reach it from the
//! connection event loop; controls reach it from the
//! [`ChannelHandle`](super::ChannelHandle).

use std::collections::{HashMap, VecDeque};

use krolik_types::{
    definitions::{SYNTAX_ERROR, UNEXPECTED_FRAME},
    error::ValueError,
    methods,
    schema::{basic, channel as chan, class},
    Method, ShortString,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, trace};

use crate::control::{ChannelControl, ConnectionControl, Expected};
use crate::frames::Frame;
use crate::message::assembler::{
    AssembleError, CompletedMessage, DeliveryContext, MessageAssembler,
};
use crate::message::{Confirm, Delivery, GetMessage};
use crate::util::Running;

use super::frame::ChannelFrame;
use super::{goodbye, reply, ChannelState, Error};

#[derive(Debug)]
enum TxState {
    None,
    Selected,
}

#[derive(Debug)]
enum ConfirmState {
    Disabled,
    Enabled {
        next_publish_tag: u64,
        handler: mpsc::UnboundedSender<Confirm>,
    },
}

/// One queued synchronous call: the replies that may resolve it and what to
/// do when one arrives. Resolution is strictly FIFO per channel.
struct PendingRpc {
    expect: Expected,
    kind: PendingKind,
}

enum PendingKind {
    Method(oneshot::Sender<Result<Method, Error>>),
    Get(oneshot::Sender<Result<Option<GetMessage>, Error>>),
    Consume {
        deliveries: mpsc::UnboundedSender<Delivery>,
        responder: oneshot::Sender<Result<ShortString, Error>>,
    },
    Cancel {
        tag: ShortString,
        responder: oneshot::Sender<Result<(), Error>>,
    },
    Flow(oneshot::Sender<Result<bool, Error>>),
    TxSelect(oneshot::Sender<Result<(), Error>>),
    TxDone(oneshot::Sender<Result<(), Error>>),
    ConfirmSelect {
        handler: mpsc::UnboundedSender<Confirm>,
        stream: mpsc::UnboundedReceiver<Confirm>,
        responder: oneshot::Sender<Result<mpsc::UnboundedReceiver<Confirm>, Error>>,
    },
    Close(Option<oneshot::Sender<Result<(), Error>>>),
}

impl PendingKind {
    fn fail(self, err: Error) {
        match self {
            PendingKind::Method(responder) => drop(responder.send(Err(err))),
            PendingKind::Get(responder) => drop(responder.send(Err(err))),
            PendingKind::Consume { responder, .. } => drop(responder.send(Err(err))),
            PendingKind::Cancel { responder, .. } => drop(responder.send(Err(err))),
            PendingKind::Flow(responder) => drop(responder.send(Err(err))),
            PendingKind::TxSelect(responder) => drop(responder.send(Err(err))),
            PendingKind::TxDone(responder) => drop(responder.send(Err(err))),
            PendingKind::ConfirmSelect { responder, .. } => drop(responder.send(Err(err))),
            PendingKind::Close(responder) => {
                if let Some(responder) = responder {
                    let _ = responder.send(Err(err));
                }
            }
        }
    }
}

/// A protocol violation observed on this channel; connection-fatal
#[derive(Debug, thiserror::Error)]
enum Violation {
    #[error("unexpected frame: {name} (class {class_id} method {method_id})")]
    UnexpectedFrame {
        class_id: u16,
        method_id: u16,
        name: &'static str,
    },

    #[error(transparent)]
    Assemble(#[from] AssembleError),

    #[error("reply arguments off schema: {0}")]
    BadArguments(#[from] ValueError),
}

impl Violation {
    fn unexpected(method: &Method) -> Self {
        Self::UnexpectedFrame {
            class_id: method.class_id,
            method_id: method.method_id,
            name: method.name(),
        }
    }

    /// `connection.close` arguments reporting this violation to the broker
    fn close_args(&self) -> (u16, String, u16, u16) {
        match self {
            Violation::UnexpectedFrame {
                class_id,
                method_id,
                ..
            } => (
                UNEXPECTED_FRAME.0,
                self.to_string(),
                *class_id,
                *method_id,
            ),
            Violation::Assemble(_) => (UNEXPECTED_FRAME.0, self.to_string(), 0, 0),
            Violation::BadArguments(_) => (SYNTAX_ERROR.0, self.to_string(), 0, 0),
        }
    }
}

/// The per-channel protocol state machine
pub(crate) struct Channel {
    id: u16,
    state: ChannelState,
    pending: VecDeque<PendingRpc>,
    consumers: HashMap<ShortString, mpsc::UnboundedSender<Delivery>>,
    returns: Vec<mpsc::UnboundedSender<crate::message::Returned>>,
    tx_state: TxState,
    confirm: ConfirmState,
    assembler: MessageAssembler,
    // parked continuation of a basic.get between get-ok and content end
    pending_get: Option<oneshot::Sender<Result<Option<GetMessage>, Error>>>,
    flow_active: bool,
}

impl Channel {
    pub(crate) fn new(id: u16) -> Self {
        Self {
            id,
            state: ChannelState::Closed,
            pending: VecDeque::new(),
            consumers: HashMap::new(),
            returns: Vec::new(),
            tx_state: TxState::None,
            confirm: ConfirmState::Disabled,
            assembler: MessageAssembler::default(),
            pending_get: None,
            flow_active: true,
        }
    }

    fn fail_pending(&mut self, err: Error) {
        for pending in self.pending.drain(..) {
            pending.kind.fail(err.clone());
        }
        if let Some(responder) = self.pending_get.take() {
            let _ = responder.send(Err(err));
        }
    }

    fn teardown(&mut self, err: Error) {
        self.fail_pending(err);
        self.assembler.abort();
        self.consumers.clear();
        self.returns.clear();
        self.confirm = ConfirmState::Disabled;
        self.state = ChannelState::Closed;
    }
}

pub(crate) struct ChannelEngine {
    conn_control: mpsc::Sender<ConnectionControl>,
    channel: Channel,
    control: mpsc::Receiver<ChannelControl>,
    incoming: mpsc::Receiver<ChannelFrame>,
    outgoing: mpsc::Sender<Frame>,
    control_open: bool,
}

impl ChannelEngine {
    /// Performs the `channel.open`/`open-ok` handshake and returns the
    /// engine ready to spawn
    pub(crate) async fn open(
        conn_control: mpsc::Sender<ConnectionControl>,
        channel: Channel,
        control: mpsc::Receiver<ChannelControl>,
        incoming: mpsc::Receiver<ChannelFrame>,
        outgoing: mpsc::Sender<Frame>,
    ) -> Result<Self, Error> {
        let mut engine = Self {
            conn_control,
            channel,
            control,
            incoming,
            outgoing,
            control_open: true,
        };

        engine.send_method(methods::channel_open()).await?;
        match engine.incoming.recv().await {
            Some(ChannelFrame::Method(method)) if method.is(class::CHANNEL, chan::OPEN_OK) => {
                engine.channel.state = ChannelState::Open;
                Ok(engine)
            }
            Some(ChannelFrame::Method(method)) if method.is(class::CHANNEL, chan::CLOSE) => {
                let _ = engine.send_method(methods::channel_close_ok()).await;
                Err(Error::server_closed(
                    method.short(0)?,
                    method.short_str(1)?.clone(),
                    method.short(2)?,
                    method.short(3)?,
                ))
            }
            Some(_) => Err(Error::ChannelClosed),
            None => Err(Error::ConnectionClosed),
        }
    }

    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.event_loop())
    }

    async fn send_frame(&mut self, frame: Frame) -> Result<(), Error> {
        self.outgoing
            .send(frame)
            .await
            .map_err(|_| Error::ConnectionClosed)
    }

    async fn send_method(&mut self, method: Method) -> Result<(), Error> {
        let frame = Frame::method(self.channel.id, method);
        self.send_frame(frame).await
    }

    /// The connection event loop is gone mid-operation; nothing pending may
    /// be left unresolved
    fn stop_disconnected(&mut self) -> Running {
        self.channel.teardown(Error::ConnectionClosed);
        Running::Stop
    }

    #[instrument(name = "Channel::event_loop", skip(self), fields(channel = %self.channel.id))]
    async fn event_loop(mut self) {
        loop {
            let result = tokio::select! {
                incoming = self.incoming.recv() => match incoming {
                    Some(frame) => self.on_incoming(frame).await,
                    None => {
                        // the connection event loop is gone; every pending
                        // call must fail rather than hang forever
                        self.channel.teardown(Error::ConnectionClosed);
                        Ok(Running::Stop)
                    }
                },
                control = self.control.recv(), if self.control_open => match control {
                    Some(control) => self.on_control(control).await,
                    None => self.on_handle_dropped().await,
                },
            };

            match result {
                Ok(Running::Continue) => {}
                Ok(Running::Stop) => break,
                Err(violation) => {
                    self.on_violation(violation).await;
                    break;
                }
            }
        }

        let _ = self
            .conn_control
            .send(ConnectionControl::DeallocateChannel(self.channel.id))
            .await;
        debug!("stopped");
    }

    async fn on_incoming(&mut self, frame: ChannelFrame) -> Result<Running, Violation> {
        match frame {
            ChannelFrame::Method(method) => self.on_incoming_method(method).await,
            ChannelFrame::Header(header) => {
                if let Some(message) = self.channel.assembler.on_header(header)? {
                    self.dispatch(message);
                }
                Ok(Running::Continue)
            }
            ChannelFrame::Body(payload) => {
                if let Some(message) = self.channel.assembler.on_body(payload)? {
                    self.dispatch(message);
                }
                Ok(Running::Continue)
            }
        }
    }

    async fn on_incoming_method(&mut self, method: Method) -> Result<Running, Violation> {
        trace!(method = method.name(), "RECV");

        // content frames must follow their method contiguously; only a
        // server close may interrupt an armed reassembly
        if self.channel.assembler.is_armed() && !method.is(class::CHANNEL, chan::CLOSE) {
            return Err(Violation::unexpected(&method));
        }

        match (method.class_id, method.method_id) {
            (class::BASIC, basic::DELIVER) => {
                let context = DeliveryContext::Deliver {
                    consumer_tag: method.short_str(0)?.clone(),
                    delivery_tag: method.long_long(1)?,
                    redelivered: method.bit(2)?,
                    exchange: method.short_str(3)?.clone(),
                    routing_key: method.short_str(4)?.clone(),
                };
                self.channel.assembler.arm(context)?;
                Ok(Running::Continue)
            }
            (class::BASIC, basic::RETURN) => {
                let context = DeliveryContext::Return {
                    reply_code: method.short(0)?.into(),
                    reply_text: method.short_str(1)?.clone(),
                    exchange: method.short_str(2)?.clone(),
                    routing_key: method.short_str(3)?.clone(),
                };
                self.channel.assembler.arm(context)?;
                Ok(Running::Continue)
            }
            (class::BASIC, basic::ACK) | (class::BASIC, basic::NACK) => {
                self.on_broker_confirm(method)
            }
            (class::BASIC, basic::CANCEL) => {
                // broker-initiated cancel (queue deleted, node failover);
                // ending the stream is the signal to the consumer
                let tag = method.short_str(0)?;
                self.channel.consumers.remove(tag.as_str());
                Ok(Running::Continue)
            }
            (class::CHANNEL, chan::FLOW) => {
                let active = method.bit(0)?;
                self.channel.flow_active = active;
                if self.send_method(methods::channel_flow_ok(active)).await.is_err() {
                    return Ok(self.stop_disconnected());
                }
                Ok(Running::Continue)
            }
            (class::CHANNEL, chan::CLOSE) => self.on_server_close(method).await,
            _ => self.resolve_pending(method).await,
        }
    }

    /// Routes a broker `basic.ack`/`basic.nack` to the confirm handler
    fn on_broker_confirm(&mut self, method: Method) -> Result<Running, Violation> {
        let handler = match &self.channel.confirm {
            ConfirmState::Enabled { handler, .. } => handler,
            ConfirmState::Disabled => return Err(Violation::unexpected(&method)),
        };
        let confirm = Confirm {
            delivery_tag: method.long_long(0)?,
            multiple: method.bit(1)?,
            nack: method.is(class::BASIC, basic::NACK),
        };
        // the application may have dropped the stream; confirms are then
        // silently discarded
        let _ = handler.send(confirm);
        Ok(Running::Continue)
    }

    async fn on_server_close(&mut self, method: Method) -> Result<Running, Violation> {
        let err = Error::server_closed(
            method.short(0)?,
            method.short_str(1)?.clone(),
            method.short(2)?,
            method.short(3)?,
        );
        debug!(%err, "server closed the channel");
        let _ = self.send_method(methods::channel_close_ok()).await;
        self.channel.teardown(err);
        Ok(Running::Stop)
    }

    /// Matches a reply against the oldest pending call (FIFO)
    async fn resolve_pending(&mut self, method: Method) -> Result<Running, Violation> {
        let key = (method.class_id, method.method_id);
        match self.channel.pending.pop_front() {
            Some(pending) if pending.expect.contains(&key) => {
                self.complete(pending.kind, method).await
            }
            Some(pending) => {
                self.channel.pending.push_front(pending);
                Err(Violation::unexpected(&method))
            }
            None => Err(Violation::unexpected(&method)),
        }
    }

    async fn complete(&mut self, kind: PendingKind, reply: Method) -> Result<Running, Violation> {
        match kind {
            PendingKind::Method(responder) => {
                let _ = responder.send(Ok(reply));
            }
            PendingKind::Get(responder) => {
                if reply.is(class::BASIC, basic::GET_EMPTY) {
                    let _ = responder.send(Ok(None));
                } else {
                    let context = DeliveryContext::GetOk {
                        delivery_tag: reply.long_long(0)?,
                        redelivered: reply.bit(1)?,
                        exchange: reply.short_str(2)?.clone(),
                        routing_key: reply.short_str(3)?.clone(),
                        message_count: reply.long(4)?,
                    };
                    self.channel.assembler.arm(context)?;
                    self.channel.pending_get = Some(responder);
                }
            }
            PendingKind::Consume {
                deliveries,
                responder,
            } => {
                let tag = reply.short_str(0)?.clone();
                self.channel.consumers.insert(tag.clone(), deliveries);
                let _ = responder.send(Ok(tag));
            }
            PendingKind::Cancel { tag, responder } => {
                self.channel.consumers.remove(&tag);
                let _ = responder.send(Ok(()));
            }
            PendingKind::Flow(responder) => {
                let active = reply.bit(0)?;
                self.channel.flow_active = active;
                let _ = responder.send(Ok(active));
            }
            PendingKind::TxSelect(responder) => {
                self.channel.tx_state = TxState::Selected;
                let _ = responder.send(Ok(()));
            }
            PendingKind::TxDone(responder) => {
                let _ = responder.send(Ok(()));
            }
            PendingKind::ConfirmSelect {
                handler,
                stream,
                responder,
            } => {
                self.channel.confirm = ConfirmState::Enabled {
                    next_publish_tag: 1,
                    handler,
                };
                let _ = responder.send(Ok(stream));
            }
            PendingKind::Close(responder) => {
                self.channel.state = ChannelState::Closed;
                self.channel.fail_pending(Error::ChannelClosed);
                if let Some(responder) = responder {
                    let _ = responder.send(Ok(()));
                }
                return Ok(Running::Stop);
            }
        }
        Ok(Running::Continue)
    }

    fn dispatch(&mut self, message: CompletedMessage) {
        match message {
            CompletedMessage::Delivery(delivery) => {
                match self.channel.consumers.get(&delivery.consumer_tag) {
                    // a dropped Consumer just discards its deliveries
                    Some(tx) => drop(tx.send(delivery)),
                    None => trace!(
                        consumer_tag = %delivery.consumer_tag,
                        "delivery for an unknown consumer dropped"
                    ),
                }
            }
            CompletedMessage::Get(message) => match self.channel.pending_get.take() {
                Some(responder) => drop(responder.send(Ok(Some(message)))),
                None => trace!("get-ok content completed without a waiting caller"),
            },
            CompletedMessage::Returned(returned) => {
                self.channel
                    .returns
                    .retain(|tx| tx.send(returned.clone()).is_ok());
            }
        }
    }

    async fn on_control(&mut self, control: ChannelControl) -> Result<Running, Violation> {
        if !matches!(self.channel.state, ChannelState::Open) {
            reject_control(control, Error::ChannelClosed);
            return Ok(Running::Continue);
        }

        match control {
            ChannelControl::Rpc {
                request,
                expect,
                responder,
            } => {
                if let Err(err) = self.send_method(request).await {
                    let _ = responder.send(Err(err));
                    return Ok(self.stop_disconnected());
                }
                self.channel.pending.push_back(PendingRpc {
                    expect,
                    kind: PendingKind::Method(responder),
                });
            }
            ChannelControl::Send { request, responder } => {
                let result = self.send_method(request).await;
                let stop = result.is_err();
                let _ = responder.send(result);
                if stop {
                    return Ok(self.stop_disconnected());
                }
            }
            ChannelControl::Publish {
                method,
                header,
                body,
                responder,
            } => {
                if !self.channel.flow_active {
                    debug!("publishing while the broker has flow paused on this channel");
                }
                let sent = async {
                    self.send_method(method).await?;
                    let id = self.channel.id;
                    self.send_frame(Frame::new(id, crate::frames::FrameBody::Header(header)))
                        .await?;
                    if !body.is_empty() {
                        self.send_frame(Frame::new(id, crate::frames::FrameBody::Body(body)))
                            .await?;
                    }
                    Ok(())
                }
                .await;
                match sent {
                    Ok(()) => {
                        let tag = match &mut self.channel.confirm {
                            ConfirmState::Enabled {
                                next_publish_tag, ..
                            } => {
                                let tag = *next_publish_tag;
                                *next_publish_tag += 1;
                                Some(tag)
                            }
                            ConfirmState::Disabled => None,
                        };
                        let _ = responder.send(Ok(tag));
                    }
                    Err(err) => {
                        let _ = responder.send(Err(err));
                        return Ok(self.stop_disconnected());
                    }
                }
            }
            ChannelControl::Consume {
                request,
                tag,
                no_wait,
                deliveries,
                responder,
            } => {
                if let Err(err) = self.send_method(request).await {
                    let _ = responder.send(Err(err));
                    return Ok(self.stop_disconnected());
                }
                if no_wait {
                    self.channel.consumers.insert(tag.clone(), deliveries);
                    let _ = responder.send(Ok(tag));
                } else {
                    self.channel.pending.push_back(PendingRpc {
                        expect: reply::BASIC_CONSUME_OK,
                        kind: PendingKind::Consume {
                            deliveries,
                            responder,
                        },
                    });
                }
            }
            ChannelControl::Cancel {
                request,
                tag,
                responder,
            } => {
                if let Err(err) = self.send_method(request).await {
                    let _ = responder.send(Err(err));
                    return Ok(self.stop_disconnected());
                }
                self.channel.pending.push_back(PendingRpc {
                    expect: reply::BASIC_CANCEL_OK,
                    kind: PendingKind::Cancel { tag, responder },
                });
            }
            ChannelControl::Get { request, responder } => {
                if let Err(err) = self.send_method(request).await {
                    let _ = responder.send(Err(err));
                    return Ok(self.stop_disconnected());
                }
                self.channel.pending.push_back(PendingRpc {
                    expect: reply::BASIC_GET_REPLIES,
                    kind: PendingKind::Get(responder),
                });
            }
            ChannelControl::Flow { active, responder } => {
                if let Err(err) = self.send_method(methods::channel_flow(active)).await {
                    let _ = responder.send(Err(err));
                    return Ok(self.stop_disconnected());
                }
                self.channel.pending.push_back(PendingRpc {
                    expect: reply::CHANNEL_FLOW_OK,
                    kind: PendingKind::Flow(responder),
                });
            }
            ChannelControl::TxSelect { responder } => {
                if matches!(self.channel.tx_state, TxState::Selected) {
                    let _ = responder.send(Err(Error::TxAlreadySelected));
                    return Ok(Running::Continue);
                }
                if let Err(err) = self.send_method(methods::tx_select()).await {
                    let _ = responder.send(Err(err));
                    return Ok(self.stop_disconnected());
                }
                self.channel.pending.push_back(PendingRpc {
                    expect: reply::TX_SELECT_OK,
                    kind: PendingKind::TxSelect(responder),
                });
            }
            ChannelControl::TxCommit { responder } => {
                if matches!(self.channel.tx_state, TxState::None) {
                    let _ = responder.send(Err(Error::TxNotSelected));
                    return Ok(Running::Continue);
                }
                if let Err(err) = self.send_method(methods::tx_commit()).await {
                    let _ = responder.send(Err(err));
                    return Ok(self.stop_disconnected());
                }
                self.channel.pending.push_back(PendingRpc {
                    expect: reply::TX_COMMIT_OK,
                    kind: PendingKind::TxDone(responder),
                });
            }
            ChannelControl::TxRollback { responder } => {
                if matches!(self.channel.tx_state, TxState::None) {
                    let _ = responder.send(Err(Error::TxNotSelected));
                    return Ok(Running::Continue);
                }
                if let Err(err) = self.send_method(methods::tx_rollback()).await {
                    let _ = responder.send(Err(err));
                    return Ok(self.stop_disconnected());
                }
                self.channel.pending.push_back(PendingRpc {
                    expect: reply::TX_ROLLBACK_OK,
                    kind: PendingKind::TxDone(responder),
                });
            }
            ChannelControl::ConfirmSelect { responder } => {
                if matches!(self.channel.confirm, ConfirmState::Enabled { .. }) {
                    let _ = responder.send(Err(Error::ConfirmAlreadySelected));
                    return Ok(Running::Continue);
                }
                if let Err(err) = self.send_method(methods::confirm_select(false)).await {
                    let _ = responder.send(Err(err));
                    return Ok(self.stop_disconnected());
                }
                let (handler, stream) = mpsc::unbounded_channel();
                self.channel.pending.push_back(PendingRpc {
                    expect: reply::CONFIRM_SELECT_OK,
                    kind: PendingKind::ConfirmSelect {
                        handler,
                        stream,
                        responder,
                    },
                });
            }
            ChannelControl::ReturnListener { responder } => {
                let (tx, rx) = mpsc::unbounded_channel();
                self.channel.returns.push(tx);
                let _ = responder.send(rx);
            }
            ChannelControl::Close { responder } => {
                if let Err(err) = self.send_method(goodbye()).await {
                    let _ = responder.send(Err(err));
                    return Ok(self.stop_disconnected());
                }
                self.channel.state = ChannelState::Closing;
                self.channel.pending.push_back(PendingRpc {
                    expect: reply::CHANNEL_CLOSE_OK,
                    kind: PendingKind::Close(Some(responder)),
                });
            }
        }
        Ok(Running::Continue)
    }

    /// Every handle is gone; close the channel at the broker too
    async fn on_handle_dropped(&mut self) -> Result<Running, Violation> {
        self.control_open = false;
        match self.channel.state {
            ChannelState::Open => {
                if self.send_method(goodbye()).await.is_err() {
                    return Ok(self.stop_disconnected());
                }
                self.channel.state = ChannelState::Closing;
                self.channel.pending.push_back(PendingRpc {
                    expect: reply::CHANNEL_CLOSE_OK,
                    kind: PendingKind::Close(None),
                });
                Ok(Running::Continue)
            }
            ChannelState::Closing => Ok(Running::Continue),
            ChannelState::Closed => Ok(Running::Stop),
        }
    }

    async fn on_violation(&mut self, violation: Violation) {
        error!(%violation, "protocol violation, closing the connection");
        let (code, text, class_id, method_id) = violation.close_args();
        let _ = self
            .conn_control
            .send(ConnectionControl::CloseWithError {
                code,
                text,
                class_id,
                method_id,
            })
            .await;
        self.channel.teardown(Error::ConnectionClosed);
    }
}

/// Fails the responder of a control that arrived on a non-open channel
fn reject_control(control: ChannelControl, err: Error) {
    match control {
        ChannelControl::Rpc { responder, .. } => drop(responder.send(Err(err))),
        ChannelControl::Send { responder, .. } => drop(responder.send(Err(err))),
        ChannelControl::Publish { responder, .. } => drop(responder.send(Err(err))),
        ChannelControl::Consume { responder, .. } => drop(responder.send(Err(err))),
        ChannelControl::Cancel { responder, .. } => drop(responder.send(Err(err))),
        ChannelControl::Get { responder, .. } => drop(responder.send(Err(err))),
        ChannelControl::Flow { responder, .. } => drop(responder.send(Err(err))),
        ChannelControl::TxSelect { responder } => drop(responder.send(Err(err))),
        ChannelControl::TxCommit { responder } => drop(responder.send(Err(err))),
        ChannelControl::TxRollback { responder } => drop(responder.send(Err(err))),
        ChannelControl::ConfirmSelect { responder } => drop(responder.send(Err(err))),
        // a listener registration cannot fail; drop ends the stream at once
        ChannelControl::ReturnListener { responder } => drop(responder),
        ChannelControl::Close { responder } => drop(responder.send(Ok(()))),
    }
}
