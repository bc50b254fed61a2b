//! The connection event loop
//!
//! Drives the handshake, then multiplexes: inbound frames are handled on
//! channel 0 or routed to the owning channel's event loop, outbound frames
//! from every channel funnel through here onto the single socket, and the
//! heartbeat timer fills silent stretches.

use std::collections::HashSet;
use std::io;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use krolik_types::{
    constants::{VERSION_MAJOR, VERSION_MINOR},
    definitions::{
        ReplyCode, ACCESS_REFUSED, CHANNEL_ERROR, COMMAND_INVALID, FRAME_ERROR, REPLY_SUCCESS,
    },
    methods,
    schema::{channel as chan, class, connection as conn},
    FieldTable, Method,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, instrument, trace, warn};

use crate::channel::frame::ChannelFrame;
use crate::channel::goodbye;
use crate::control::ConnectionControl;
use crate::frames::{self, Frame, FrameBody};
use crate::sasl_profile::SaslProfile;
use crate::transport::Transport;
use crate::util::Running;

use super::heartbeat::HeartBeat;
use super::{Connection, ConnectionState, Error, OpenError};

/// Everything the handshake needs from the builder
pub(crate) struct HandshakeConfig {
    pub profile: SaslProfile,
    pub virtual_host: String,
    pub locale: String,
    pub channel_max: u16,
    pub frame_max: u32,
    pub heartbeat: u16,
    pub client_properties: FieldTable,
}

/// Picks the mutually acceptable limit; zero means unlimited on either side
fn negotiate_u16(client: u16, server: u16) -> u16 {
    if client == 0 || server == 0 {
        client.max(server)
    } else {
        client.min(server)
    }
}

fn negotiate_u32(client: u32, server: u32) -> u32 {
    if client == 0 || server == 0 {
        client.max(server)
    } else {
        client.min(server)
    }
}

pub(crate) struct ConnectionEngine<Io> {
    transport: Transport<Io>,
    connection: Connection,
    control: mpsc::Receiver<ConnectionControl>,
    outgoing: mpsc::Receiver<Frame>,
    heartbeat: HeartBeat,
    heartbeat_period: Option<Duration>,
    last_write: Instant,
}

impl<Io> ConnectionEngine<Io>
where
    Io: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    /// Runs the strictly ordered handshake: the protocol header has been
    /// written by the caller; this drives start/start-ok, (secure,)
    /// tune/tune-ok and open/open-ok, leaving the engine ready to spawn.
    pub(crate) async fn open(
        transport: Transport<Io>,
        connection: Connection,
        control: mpsc::Receiver<ConnectionControl>,
        outgoing: mpsc::Receiver<Frame>,
        config: HandshakeConfig,
    ) -> Result<Self, OpenError> {
        let mut engine = Self {
            transport,
            connection,
            control,
            outgoing,
            heartbeat: HeartBeat::never(),
            heartbeat_period: None,
            last_write: Instant::now(),
        };
        engine.connection.set_state(ConnectionState::HeaderSent);

        // connection.start
        let start = engine.next_handshake_method().await?;
        if !start.is(class::CONNECTION, conn::START) {
            return Err(OpenError::UnexpectedFrame);
        }
        let (major, minor) = (start.octet(0)?, start.octet(1)?);
        if (major, minor) != (VERSION_MAJOR, VERSION_MINOR) {
            return Err(OpenError::ServerVersion { major, minor });
        }
        let mechanisms = String::from_utf8_lossy(start.long_str(3)?).into_owned();
        if !config.profile.is_offered(&mechanisms) {
            return Err(OpenError::MechanismNotSupported(mechanisms));
        }
        engine.connection.set_state(ConnectionState::StartReceived);

        let start_ok = methods::connection_start_ok(
            config.client_properties.clone(),
            config.profile.mechanism(),
            config.profile.response(),
            config.locale.as_str(),
        );
        engine.send_method_0(start_ok).await?;

        // connection.tune, possibly preceded by secure challenges
        let tune = loop {
            let method = engine.next_handshake_method().await?;
            if method.is(class::CONNECTION, conn::SECURE) {
                // PLAIN and EXTERNAL have no challenge step; repeat the
                // initial response
                let secure_ok = methods::connection_secure_ok(config.profile.response());
                engine.send_method_0(secure_ok).await?;
                continue;
            }
            if method.is(class::CONNECTION, conn::CLOSE) {
                return Err(engine.refused(method).await?);
            }
            if method.is(class::CONNECTION, conn::TUNE) {
                break method;
            }
            return Err(OpenError::UnexpectedFrame);
        };

        let channel_max = negotiate_u16(config.channel_max, tune.short(0)?);
        let frame_max = negotiate_u32(config.frame_max, tune.long(1)?);
        // the client requests its own heartbeat interval
        engine.connection.set_state(ConnectionState::TuneReceived);
        engine
            .connection
            .apply_tune(channel_max, frame_max, config.heartbeat);
        engine.transport.set_frame_max(engine.connection.frame_max());

        let tune_ok = methods::connection_tune_ok(channel_max, frame_max, config.heartbeat);
        engine.send_method_0(tune_ok).await?;

        engine
            .send_method_0(methods::connection_open(config.virtual_host.as_str()))
            .await?;
        engine.connection.set_state(ConnectionState::OpenSent);

        let reply = engine.next_handshake_method().await?;
        if reply.is(class::CONNECTION, conn::CLOSE) {
            return Err(engine.refused(reply).await?);
        }
        if !reply.is(class::CONNECTION, conn::OPEN_OK) {
            return Err(OpenError::UnexpectedFrame);
        }
        engine.connection.set_state(ConnectionState::Opened);
        let heartbeat = engine.connection.heartbeat();
        debug!(channel_max, frame_max, heartbeat, "connection opened");

        if heartbeat > 0 {
            let period = Duration::from_secs(u64::from(heartbeat));
            engine.heartbeat = HeartBeat::new(period);
            engine.heartbeat_period = Some(period);
            // the peer is presumed dead after two silent intervals
            engine.transport.set_idle_timeout(period * 2);
        }

        Ok(engine)
    }

    /// Answers a `connection.close` received mid-handshake and converts it
    /// into the matching open error
    async fn refused(&mut self, close: Method) -> Result<OpenError, OpenError> {
        let code = ReplyCode(close.short(0)?);
        let text = close.short_str(1)?.clone();
        let _ = self.send_method_0(methods::connection_close_ok()).await;
        self.connection.set_state(ConnectionState::End);
        if code == ACCESS_REFUSED {
            Ok(OpenError::SaslRejected { code, text })
        } else {
            Ok(OpenError::Remote { code, text })
        }
    }

    /// Next channel-0 method during the handshake; heartbeats are tolerated,
    /// anything else is a handshake violation
    async fn next_handshake_method(&mut self) -> Result<Method, OpenError> {
        loop {
            let frame = match self.transport.next().await {
                Some(frame) => frame?,
                None => {
                    return Err(OpenError::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "server hung up during the handshake",
                    )))
                }
            };
            match frame.body {
                FrameBody::Method(method) if frame.channel == 0 => return Ok(method),
                FrameBody::Heartbeat => continue,
                _ => return Err(OpenError::UnexpectedFrame),
            }
        }
    }

    pub(crate) fn spawn(self) -> JoinHandle<Result<(), Error>> {
        tokio::spawn(self.event_loop())
    }

    async fn send_frame(&mut self, frame: Frame) -> Result<(), Error> {
        self.transport.send(frame).await?;
        self.last_write = Instant::now();
        Ok(())
    }

    async fn send_method_0(&mut self, method: Method) -> Result<(), Error> {
        trace!(method = method.name(), channel = 0, "SEND");
        self.send_frame(Frame::method(0, method)).await
    }

    #[instrument(name = "Connection::event_loop", skip(self))]
    async fn event_loop(mut self) -> Result<(), Error> {
        let mut outcome = Ok(());
        loop {
            let result = tokio::select! {
                _ = &mut self.heartbeat => self.on_heartbeat().await,
                incoming = self.transport.next() => match incoming {
                    Some(Ok(frame)) => self.on_incoming(frame).await,
                    Some(Err(err)) => Err(err.into()),
                    None => Err(Error::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "server hung up",
                    ))),
                },
                control = self.control.recv() => match control {
                    Some(control) => self.on_control(control).await,
                    // every handle is gone; shut down cleanly
                    None => self.close_gracefully(None).await,
                },
                frame = self.outgoing.recv() => match frame {
                    Some(frame) => self.on_outgoing(frame).await,
                    None => self.close_gracefully(None).await,
                },
            };

            match result {
                Ok(Running::Continue) => {}
                Ok(Running::Stop) => break,
                Err(err) => {
                    outcome = self.on_error(err).await;
                    break;
                }
            }
        }

        debug!("stopped");
        outcome
    }

    #[inline]
    async fn on_heartbeat(&mut self) -> Result<Running, Error> {
        let period = match self.heartbeat_period {
            Some(period) => period,
            None => return Ok(Running::Continue),
        };
        let due = self.last_write + period;
        if Instant::now() >= due {
            trace!("SEND heartbeat");
            self.send_frame(Frame::heartbeat()).await?;
            self.heartbeat.reset(self.last_write + period);
        } else {
            // regular traffic went out recently; sleep out the remainder
            self.heartbeat.reset(due);
        }
        Ok(Running::Continue)
    }

    async fn on_incoming(&mut self, frame: Frame) -> Result<Running, Error> {
        if frame.channel == 0 {
            return match frame.body {
                FrameBody::Method(method) => self.on_connection_method(method).await,
                FrameBody::Heartbeat => Ok(Running::Continue),
                FrameBody::Header(_) | FrameBody::Body(_) => Err(Error::Local {
                    code: COMMAND_INVALID,
                    text: "content frames on channel zero".to_string(),
                    class_id: 0,
                    method_id: 0,
                }),
            };
        }

        let channel = frame.channel;
        let item = match frame.body {
            FrameBody::Method(method) => ChannelFrame::Method(method),
            FrameBody::Header(header) => ChannelFrame::Header(header),
            FrameBody::Body(payload) => ChannelFrame::Body(payload),
            FrameBody::Heartbeat => {
                return Err(Error::Local {
                    code: FRAME_ERROR,
                    text: format!("heartbeat on channel {channel}"),
                    class_id: 0,
                    method_id: 0,
                })
            }
        };
        self.forward_to_channel(channel, item).await
    }

    async fn on_connection_method(&mut self, method: Method) -> Result<Running, Error> {
        trace!(method = method.name(), channel = 0, "RECV");
        match (method.class_id, method.method_id) {
            (class::CONNECTION, conn::CLOSE) => {
                let code = ReplyCode(method.short(0).map_err(|_| Error::Protocol(frames::Error::Malformed))?);
                let text = method.short_str(1).map_err(|_| Error::Protocol(frames::Error::Malformed))?.clone();
                self.connection.set_state(ConnectionState::CloseReceived);
                let _ = self.send_method_0(methods::connection_close_ok()).await;
                self.connection.set_state(ConnectionState::End);
                if code == REPLY_SUCCESS {
                    Ok(Running::Stop)
                } else {
                    Err(Error::Remote { code, text })
                }
            }
            (class::CONNECTION, conn::BLOCKED) => {
                let reason = method.short_str(0).map_err(|_| Error::Protocol(frames::Error::Malformed))?;
                warn!(%reason, "connection blocked by the broker");
                Ok(Running::Continue)
            }
            (class::CONNECTION, conn::UNBLOCKED) => {
                debug!("connection unblocked");
                Ok(Running::Continue)
            }
            _ => Err(Error::Local {
                code: COMMAND_INVALID,
                text: format!("unexpected {} on channel 0", method.name()),
                class_id: method.class_id,
                method_id: method.method_id,
            }),
        }
    }

    async fn forward_to_channel(
        &mut self,
        channel: u16,
        item: ChannelFrame,
    ) -> Result<Running, Error> {
        match self.connection.channel_tx(channel) {
            Some(tx) => {
                if tx.send(item).await.is_err() {
                    // its event loop already stopped; the deallocation
                    // control message is still in flight
                    trace!(channel, "frame for a stopped channel dropped");
                    self.connection.deallocate_channel(channel);
                }
                Ok(Running::Continue)
            }
            None => Err(Error::Local {
                code: CHANNEL_ERROR,
                text: format!("frame on unknown channel {channel}"),
                class_id: 0,
                method_id: 0,
            }),
        }
    }

    #[inline]
    async fn on_control(&mut self, control: ConnectionControl) -> Result<Running, Error> {
        match control {
            ConnectionControl::Close => self.close_gracefully(None).await,
            ConnectionControl::CloseWithError {
                code,
                text,
                class_id,
                method_id,
            } => {
                self.close_gracefully(Some((code, text, class_id, method_id)))
                    .await
            }
            ConnectionControl::AllocateChannel { tx, responder } => {
                let result = self.connection.allocate_channel(tx);
                let _ = responder.send(result);
                Ok(Running::Continue)
            }
            ConnectionControl::DeallocateChannel(id) => {
                self.connection.deallocate_channel(id);
                Ok(Running::Continue)
            }
        }
    }

    #[inline]
    async fn on_outgoing(&mut self, frame: Frame) -> Result<Running, Error> {
        if self.connection.local_state() != ConnectionState::Opened {
            // channels racing against a shutdown; nothing to write anymore
            return Ok(Running::Continue);
        }
        self.send_frame(frame).await?;
        Ok(Running::Continue)
    }

    /// Orderly shutdown: close every open channel, then the connection.
    /// With `reason` set this reports a protocol violation to the broker
    /// and resolves to the matching local error.
    async fn close_gracefully(
        &mut self,
        reason: Option<(u16, String, u16, u16)>,
    ) -> Result<Running, Error> {
        match self.connection.local_state() {
            ConnectionState::Opened => {}
            // a second disconnect joins the one already finished
            _ => return Ok(Running::Stop),
        }

        if reason.is_none() && self.close_all_channels().await? {
            return Ok(Running::Stop);
        }

        let (code, text, class_id, method_id) = reason
            .clone()
            .unwrap_or((REPLY_SUCCESS.0, "Goodbye".to_string(), 0, 0));
        let close = methods::connection_close(code, text.as_str(), class_id, method_id);
        self.send_method_0(close).await?;
        self.connection.set_state(ConnectionState::CloseSent);

        // only close-ok (or a crossing close) matters now; everything else
        // is discarded
        loop {
            match self.transport.next().await {
                None => break,
                Some(Err(err)) => {
                    trace!(%err, "transport error while awaiting close-ok");
                    break;
                }
                Some(Ok(frame)) if frame.channel == 0 => {
                    if let FrameBody::Method(method) = frame.body {
                        if method.is(class::CONNECTION, conn::CLOSE_OK) {
                            break;
                        }
                        if method.is(class::CONNECTION, conn::CLOSE) {
                            let _ = self
                                .send_method_0(methods::connection_close_ok())
                                .await;
                            break;
                        }
                    }
                }
                Some(Ok(_)) => {}
            }
        }
        self.connection.set_state(ConnectionState::End);

        match reason {
            None => Ok(Running::Stop),
            Some((code, text, class_id, method_id)) => Err(Error::Local {
                code: ReplyCode(code),
                text,
                class_id,
                method_id,
            }),
        }
    }

    /// Sends `channel.close` for every live channel and collects the
    /// `close-ok`s, forwarding unrelated frames meanwhile. Returns true when
    /// the server closed the whole connection midway (already answered).
    async fn close_all_channels(&mut self) -> Result<bool, Error> {
        let ids = self.connection.channel_ids();
        let mut awaiting: HashSet<u16> = HashSet::new();
        for id in ids {
            self.send_frame(Frame::method(id, goodbye())).await?;
            awaiting.insert(id);
        }

        while !awaiting.is_empty() {
            let frame = match self.transport.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(err)) => {
                    trace!(%err, "transport error while closing channels");
                    return Ok(false);
                }
                None => return Ok(false),
            };

            if frame.channel == 0 {
                if let FrameBody::Method(method) = frame.body {
                    if method.is(class::CONNECTION, conn::CLOSE) {
                        let _ = self
                            .send_method_0(methods::connection_close_ok())
                            .await;
                        self.connection.set_state(ConnectionState::End);
                        return Ok(true);
                    }
                }
                continue;
            }

            let channel = frame.channel;
            if awaiting.contains(&channel) {
                if let FrameBody::Method(method) = &frame.body {
                    if method.is(class::CHANNEL, chan::CLOSE_OK) {
                        awaiting.remove(&channel);
                        self.connection.deallocate_channel(channel);
                        continue;
                    }
                    if method.is(class::CHANNEL, chan::CLOSE) {
                        // both sides closing at once
                        let _ = self
                            .send_frame(Frame::method(channel, methods::channel_close_ok()))
                            .await;
                        awaiting.remove(&channel);
                        self.connection.deallocate_channel(channel);
                        continue;
                    }
                }
            }

            // a delivery or reply still in flight for some channel
            let item = match frame.body {
                FrameBody::Method(method) => ChannelFrame::Method(method),
                FrameBody::Header(header) => ChannelFrame::Header(header),
                FrameBody::Body(payload) => ChannelFrame::Body(payload),
                FrameBody::Heartbeat => continue,
            };
            if let Some(tx) = self.connection.channel_tx(channel) {
                let _ = tx.send(item).await;
            }
        }
        Ok(false)
    }

    /// A connection-fatal error: report it to the broker when it is ours to
    /// report, then resolve the event loop with it
    async fn on_error(&mut self, err: Error) -> Result<(), Error> {
        error!(%err, "connection failed");
        let close = match &err {
            Error::Protocol(frame_err) => {
                let code = match frame_err {
                    frames::Error::InvalidClass(_) | frames::Error::InvalidMethod { .. } => {
                        COMMAND_INVALID
                    }
                    _ => FRAME_ERROR,
                };
                Some(methods::connection_close(
                    code.0,
                    frame_err.to_string().as_str(),
                    0,
                    0,
                ))
            }
            Error::Local {
                code,
                text,
                class_id,
                method_id,
            } => Some(methods::connection_close(
                code.0,
                text.as_str(),
                *class_id,
                *method_id,
            )),
            // remote closes were already answered; io errors have no peer
            // left to tell
            _ => None,
        };
        // the graceful-close path resolves to `Local` after already telling
        // the broker; state End marks that nothing is left to send
        let already_closed = self.connection.local_state() == ConnectionState::End;
        if let Some(close) = close.filter(|_| !already_closed) {
            // best effort with a bounded wait; the peer may be gone already
            let farewell = async {
                let _ = self.send_method_0(close).await;
                loop {
                    match self.transport.next().await {
                        Some(Ok(frame)) if frame.channel == 0 => {
                            if let FrameBody::Method(method) = frame.body {
                                if method.is(class::CONNECTION, conn::CLOSE_OK) {
                                    break;
                                }
                            }
                        }
                        Some(Ok(_)) => {}
                        _ => break,
                    }
                }
            };
            let _ = tokio::time::timeout(Duration::from_secs(1), farewell).await;
        }
        self.connection.set_state(ConnectionState::End);
        Err(err)
    }
}
