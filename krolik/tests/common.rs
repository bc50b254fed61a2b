//! An in-process broker speaking just enough AMQP 0-9-1 for the tests
//!
//! It answers the full handshake, keeps per-queue message stores, routes
//! publishes over the default exchange (routing key == queue name), pushes
//! deliveries to consumers, hands back unroutable mandatory publishes and
//! acknowledges publishes on confirm-enabled channels. Everything runs over
//! a `tokio::io::duplex` pair, so the whole client stack is exercised
//! without a real broker.

use std::collections::{HashMap, VecDeque};

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, DuplexStream};
use tokio::sync::mpsc;

use krolik::frames::{ContentHeader, Frame, FrameBody};
use krolik::transport::Transport;
use krolik_types::{
    methods,
    schema::{basic, channel as chan, class, confirm, connection as conn, exchange, queue, tx},
    BasicProperties, Field, FieldTable, Method,
};

/// Things the broker observed, for assertions
#[derive(Debug, PartialEq, Eq)]
pub enum BrokerEvent {
    Heartbeat,
}

/// Broker configuration
pub struct MockBroker {
    /// Credentials the broker accepts
    pub username: String,
    pub password: String,
    /// Mechanisms advertised in `connection.start`
    pub mechanisms: String,
    /// Heartbeat interval proposed in `connection.tune`
    pub heartbeat: u16,
    /// `None` acks every publish immediately; `Some(n)` acks every n-th
    /// publish cumulatively (`multiple = true`)
    pub confirm_batch: Option<usize>,
    /// Split outgoing content bodies into frames of this many bytes
    pub body_chunk: Option<usize>,
    /// Reply to the protocol header with this one instead of starting
    pub reject_header: Option<[u8; 8]>,
}

impl Default for MockBroker {
    fn default() -> Self {
        Self {
            username: "guest".to_string(),
            password: "guest".to_string(),
            mechanisms: "PLAIN AMQPLAIN".to_string(),
            heartbeat: 60,
            confirm_batch: None,
            body_chunk: None,
            reject_header: None,
        }
    }
}

impl MockBroker {
    /// Spawns the broker; connect a client to the returned stream
    pub fn spawn(self) -> (DuplexStream, mpsc::UnboundedReceiver<BrokerEvent>) {
        let (client, server) = tokio::io::duplex(1 << 16);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_broker(server, self, events_tx));
        (client, events_rx)
    }
}

/// Opens a connection against a default broker
pub async fn connect() -> krolik::ConnectionHandle {
    let (stream, _events) = MockBroker::default().spawn();
    krolik::Connection::builder()
        .open_with_stream(stream)
        .await
        .expect("handshake against the mock broker")
}

struct StoredMessage {
    properties: BasicProperties,
    body: Vec<u8>,
}

struct PendingPublish {
    channel: u16,
    exchange: String,
    routing_key: String,
    mandatory: bool,
    header: Option<ContentHeader>,
    body: Vec<u8>,
}

#[derive(Default)]
struct BrokerState {
    queues: HashMap<String, VecDeque<StoredMessage>>,
    // queue -> (channel, consumer tag); one consumer per queue is enough here
    consumers: HashMap<String, (u16, String)>,
    // channel -> publishes counted since confirm.select
    confirm_counts: HashMap<u16, u64>,
    delivery_tags: HashMap<u16, u64>,
    pending: Option<PendingPublish>,
    ctag_seq: usize,
    qname_seq: usize,
}

impl BrokerState {
    fn next_delivery_tag(&mut self, channel: u16) -> u64 {
        let tag = self.delivery_tags.entry(channel).or_insert(0);
        *tag += 1;
        *tag
    }
}

type Io = Transport<DuplexStream>;

async fn send_method(transport: &mut Io, channel: u16, method: Method) {
    transport
        .send(Frame::method(channel, method))
        .await
        .expect("broker write");
}

async fn send_content(
    transport: &mut Io,
    channel: u16,
    properties: BasicProperties,
    body: &[u8],
    chunk: Option<usize>,
) {
    let header = ContentHeader {
        class_id: class::BASIC,
        body_size: body.len() as u64,
        properties,
    };
    transport
        .send(Frame::new(channel, FrameBody::Header(header)))
        .await
        .expect("broker write");
    if body.is_empty() {
        return;
    }
    let chunk = chunk.unwrap_or(body.len());
    for piece in body.chunks(chunk) {
        transport
            .send(Frame::new(channel, FrameBody::Body(Bytes::copy_from_slice(piece))))
            .await
            .expect("broker write");
    }
}

async fn run_broker(
    mut io: DuplexStream,
    cfg: MockBroker,
    events: mpsc::UnboundedSender<BrokerEvent>,
) {
    let mut header = [0u8; 8];
    io.read_exact(&mut header).await.expect("protocol header");
    assert_eq!(&header, b"AMQP\x00\x00\x09\x01", "client protocol header");

    if let Some(reply) = cfg.reject_header {
        use tokio::io::AsyncWriteExt;
        io.write_all(&reply).await.expect("header reply");
        return;
    }

    let mut transport = Transport::bind(io, 128 * 1024, None);

    // connection.start
    let mut server_properties = FieldTable::new();
    server_properties.insert("product", "krolik-mock-broker");
    let start = Method::new(
        class::CONNECTION,
        conn::START,
        vec![
            Field::Octet(0),
            Field::Octet(9),
            Field::Table(server_properties),
            Field::LongStr(cfg.mechanisms.clone().into_bytes()),
            Field::LongStr(b"en_US".to_vec()),
        ],
    );
    send_method(&mut transport, 0, start).await;

    let start_ok = expect_method(&mut transport, 0).await;
    assert!(start_ok.is(class::CONNECTION, conn::START_OK));
    let mechanism = start_ok.short_str(1).unwrap().clone();
    let response = start_ok.long_str(2).unwrap().to_vec();
    let good = format!("\0{}\0{}", cfg.username, cfg.password);
    if mechanism != "PLAIN" || response != good.as_bytes() {
        send_method(
            &mut transport,
            0,
            methods::connection_close(403, "ACCESS_REFUSED - Login was refused", 0, 0),
        )
        .await;
        let close_ok = expect_method(&mut transport, 0).await;
        assert!(close_ok.is(class::CONNECTION, conn::CLOSE_OK));
        return;
    }

    // connection.tune / tune-ok
    let tune = Method::new(
        class::CONNECTION,
        conn::TUNE,
        vec![
            Field::Short(2047),
            Field::Long(128 * 1024),
            Field::Short(cfg.heartbeat),
        ],
    );
    send_method(&mut transport, 0, tune).await;
    let tune_ok = expect_method(&mut transport, 0).await;
    assert!(tune_ok.is(class::CONNECTION, conn::TUNE_OK));
    // honor whatever frame-max the client settled on
    transport.set_frame_max(tune_ok.long(1).unwrap());

    // connection.open / open-ok
    let open = expect_method(&mut transport, 0).await;
    assert!(open.is(class::CONNECTION, conn::OPEN));
    let open_ok = Method::new(
        class::CONNECTION,
        conn::OPEN_OK,
        vec![Field::ShortStr("".into())],
    );
    send_method(&mut transport, 0, open_ok).await;

    let mut state = BrokerState::default();
    loop {
        let frame = match transport.next().await {
            Some(Ok(frame)) => frame,
            Some(Err(err)) => panic!("broker saw bad bytes: {err}"),
            None => return,
        };
        match frame.body {
            FrameBody::Heartbeat => {
                let _ = events.send(BrokerEvent::Heartbeat);
                let _ = transport.send(Frame::heartbeat()).await;
            }
            FrameBody::Header(header) => {
                let pending = state.pending.as_mut().expect("header without publish");
                pending.header = Some(header);
                try_complete_publish(&mut transport, &cfg, &mut state).await;
            }
            FrameBody::Body(payload) => {
                let pending = state.pending.as_mut().expect("body without publish");
                pending.body.extend_from_slice(&payload);
                try_complete_publish(&mut transport, &cfg, &mut state).await;
            }
            FrameBody::Method(method) => {
                if on_method(&mut transport, &cfg, &mut state, frame.channel, method).await {
                    return;
                }
            }
        }
    }
}

async fn expect_method(transport: &mut Io, channel: u16) -> Method {
    loop {
        match transport.next().await.expect("peer hung up").expect("frame") {
            Frame {
                channel: ch,
                body: FrameBody::Method(method),
            } if ch == channel => return method,
            Frame {
                body: FrameBody::Heartbeat,
                ..
            } => continue,
            other => panic!("expected method on channel {channel}, got {other:?}"),
        }
    }
}

/// Handles one inbound method; returns true once the connection closed
async fn on_method(
    transport: &mut Io,
    cfg: &MockBroker,
    state: &mut BrokerState,
    channel: u16,
    method: Method,
) -> bool {
    let key = (method.class_id, method.method_id);
    match key {
        (class::CONNECTION, conn::CLOSE) => {
            send_method(transport, 0, methods::connection_close_ok()).await;
            return true;
        }
        (class::CONNECTION, conn::CLOSE_OK) => return true,
        (class::CHANNEL, chan::OPEN) => {
            let open_ok = Method::new(
                class::CHANNEL,
                chan::OPEN_OK,
                vec![Field::LongStr(Vec::new())],
            );
            send_method(transport, channel, open_ok).await;
        }
        (class::CHANNEL, chan::CLOSE) => {
            state.consumers.retain(|_, (ch, _)| *ch != channel);
            send_method(transport, channel, methods::channel_close_ok()).await;
        }
        (class::CHANNEL, chan::CLOSE_OK) => {}
        (class::CHANNEL, chan::FLOW) => {
            let active = method.bit(0).unwrap();
            send_method(transport, channel, methods::channel_flow_ok(active)).await;
        }
        (class::QUEUE, queue::DECLARE) => {
            let mut name = method.short_str(1).unwrap().to_string();
            let passive = method.bit(2).unwrap();
            if passive && !state.queues.contains_key(&name) {
                let close = methods::channel_close(
                    404,
                    format!("NOT_FOUND - no queue '{name}' in vhost '/'").as_str(),
                    class::QUEUE,
                    queue::DECLARE,
                );
                send_method(transport, channel, close).await;
                return false;
            }
            if name.is_empty() {
                state.qname_seq += 1;
                name = format!("amq.gen-{}", state.qname_seq);
            }
            let entry = state.queues.entry(name.clone()).or_default();
            let message_count = entry.len() as u32;
            let consumer_count = u32::from(state.consumers.contains_key(&name));
            let declare_ok = Method::new(
                class::QUEUE,
                queue::DECLARE_OK,
                vec![
                    Field::ShortStr(name.into()),
                    Field::Long(message_count),
                    Field::Long(consumer_count),
                ],
            );
            send_method(transport, channel, declare_ok).await;
        }
        (class::QUEUE, queue::BIND) => {
            send_method(transport, channel, Method::new(class::QUEUE, queue::BIND_OK, vec![])).await;
        }
        (class::QUEUE, queue::UNBIND) => {
            send_method(transport, channel, Method::new(class::QUEUE, queue::UNBIND_OK, vec![]))
                .await;
        }
        (class::QUEUE, queue::PURGE) => {
            let name = method.short_str(1).unwrap().as_str();
            let count = state
                .queues
                .get_mut(name)
                .map(|q| {
                    let n = q.len() as u32;
                    q.clear();
                    n
                })
                .unwrap_or(0);
            let purge_ok = Method::new(class::QUEUE, queue::PURGE_OK, vec![Field::Long(count)]);
            send_method(transport, channel, purge_ok).await;
        }
        (class::QUEUE, queue::DELETE) => {
            let name = method.short_str(1).unwrap().as_str().to_string();
            let count = state
                .queues
                .remove(&name)
                .map(|q| q.len() as u32)
                .unwrap_or(0);
            let delete_ok = Method::new(class::QUEUE, queue::DELETE_OK, vec![Field::Long(count)]);
            send_method(transport, channel, delete_ok).await;
        }
        (class::EXCHANGE, exchange::DECLARE) => {
            send_method(
                transport,
                channel,
                Method::new(class::EXCHANGE, exchange::DECLARE_OK, vec![]),
            )
            .await;
        }
        (class::EXCHANGE, exchange::DELETE) => {
            send_method(
                transport,
                channel,
                Method::new(class::EXCHANGE, exchange::DELETE_OK, vec![]),
            )
            .await;
        }
        (class::EXCHANGE, exchange::BIND) => {
            send_method(
                transport,
                channel,
                Method::new(class::EXCHANGE, exchange::BIND_OK, vec![]),
            )
            .await;
        }
        (class::EXCHANGE, exchange::UNBIND) => {
            send_method(
                transport,
                channel,
                Method::new(class::EXCHANGE, exchange::UNBIND_OK, vec![]),
            )
            .await;
        }
        (class::BASIC, basic::QOS) => {
            send_method(transport, channel, Method::new(class::BASIC, basic::QOS_OK, vec![])).await;
        }
        (class::BASIC, basic::CONSUME) => {
            let queue_name = method.short_str(1).unwrap().to_string();
            let mut tag = method.short_str(2).unwrap().to_string();
            let no_wait = method.bit(6).unwrap();
            if tag.is_empty() {
                state.ctag_seq += 1;
                tag = format!("ctag-{}", state.ctag_seq);
            }
            state
                .consumers
                .insert(queue_name.clone(), (channel, tag.clone()));
            if !no_wait {
                let consume_ok = Method::new(
                    class::BASIC,
                    basic::CONSUME_OK,
                    vec![Field::ShortStr(tag.clone().into())],
                );
                send_method(transport, channel, consume_ok).await;
            }
            // whatever is already queued goes straight out
            let backlog: Vec<StoredMessage> = state
                .queues
                .get_mut(&queue_name)
                .map(|q| q.drain(..).collect())
                .unwrap_or_default();
            for message in backlog {
                deliver(transport, cfg, state, channel, &tag, &queue_name, message).await;
            }
        }
        (class::BASIC, basic::CANCEL) => {
            let tag = method.short_str(0).unwrap().to_string();
            state.consumers.retain(|_, (_, t)| *t != tag);
            let cancel_ok = Method::new(
                class::BASIC,
                basic::CANCEL_OK,
                vec![Field::ShortStr(tag.into())],
            );
            send_method(transport, channel, cancel_ok).await;
        }
        (class::BASIC, basic::PUBLISH) => {
            state.pending = Some(PendingPublish {
                channel,
                exchange: method.short_str(1).unwrap().to_string(),
                routing_key: method.short_str(2).unwrap().to_string(),
                mandatory: method.bit(3).unwrap(),
                header: None,
                body: Vec::new(),
            });
        }
        (class::BASIC, basic::GET) => {
            let queue_name = method.short_str(1).unwrap().to_string();
            let message = state.queues.get_mut(&queue_name).and_then(|q| q.pop_front());
            match message {
                Some(message) => {
                    let remaining = state.queues.get(&queue_name).map(|q| q.len()).unwrap_or(0);
                    let tag = state.next_delivery_tag(channel);
                    let get_ok = Method::new(
                        class::BASIC,
                        basic::GET_OK,
                        vec![
                            Field::LongLong(tag),
                            Field::Bit(false),
                            Field::ShortStr("".into()),
                            Field::ShortStr(queue_name.into()),
                            Field::Long(remaining as u32),
                        ],
                    );
                    send_method(transport, channel, get_ok).await;
                    send_content(
                        transport,
                        channel,
                        message.properties,
                        &message.body,
                        cfg.body_chunk,
                    )
                    .await;
                }
                None => {
                    let get_empty = Method::new(
                        class::BASIC,
                        basic::GET_EMPTY,
                        vec![Field::ShortStr("".into())],
                    );
                    send_method(transport, channel, get_empty).await;
                }
            }
        }
        (class::BASIC, basic::ACK) | (class::BASIC, basic::NACK) | (class::BASIC, basic::REJECT) => {
        }
        (class::BASIC, basic::RECOVER) => {
            send_method(
                transport,
                channel,
                Method::new(class::BASIC, basic::RECOVER_OK, vec![]),
            )
            .await;
        }
        (class::CONFIRM, confirm::SELECT) => {
            state.confirm_counts.insert(channel, 0);
            send_method(
                transport,
                channel,
                Method::new(class::CONFIRM, confirm::SELECT_OK, vec![]),
            )
            .await;
        }
        (class::TX, tx::SELECT) => {
            send_method(transport, channel, Method::new(class::TX, tx::SELECT_OK, vec![])).await;
        }
        (class::TX, tx::COMMIT) => {
            send_method(transport, channel, Method::new(class::TX, tx::COMMIT_OK, vec![])).await;
        }
        (class::TX, tx::ROLLBACK) => {
            send_method(transport, channel, Method::new(class::TX, tx::ROLLBACK_OK, vec![])).await;
        }
        other => panic!("mock broker got unexpected {other:?}"),
    }
    false
}

async fn deliver(
    transport: &mut Io,
    cfg: &MockBroker,
    state: &mut BrokerState,
    channel: u16,
    tag: &str,
    queue_name: &str,
    message: StoredMessage,
) {
    let delivery_tag = state.next_delivery_tag(channel);
    let deliver = Method::new(
        class::BASIC,
        basic::DELIVER,
        vec![
            Field::ShortStr(tag.into()),
            Field::LongLong(delivery_tag),
            Field::Bit(false),
            Field::ShortStr("".into()),
            Field::ShortStr(queue_name.into()),
        ],
    );
    send_method(transport, channel, deliver).await;
    send_content(
        transport,
        channel,
        message.properties,
        &message.body,
        cfg.body_chunk,
    )
    .await;
}

async fn try_complete_publish(transport: &mut Io, cfg: &MockBroker, state: &mut BrokerState) {
    let done = match &state.pending {
        Some(pending) => match &pending.header {
            Some(header) => pending.body.len() as u64 == header.body_size,
            None => false,
        },
        None => false,
    };
    if !done {
        return;
    }
    let pending = state.pending.take().expect("checked above");
    let header = pending.header.expect("checked above");

    let routable = state.queues.contains_key(&pending.routing_key);
    if !routable && pending.mandatory {
        let basic_return = Method::new(
            class::BASIC,
            basic::RETURN,
            vec![
                Field::Short(312),
                Field::ShortStr("NO_ROUTE".into()),
                Field::ShortStr(pending.exchange.as_str().into()),
                Field::ShortStr(pending.routing_key.as_str().into()),
            ],
        );
        send_method(transport, pending.channel, basic_return).await;
        send_content(
            transport,
            pending.channel,
            header.properties.clone(),
            &pending.body,
            cfg.body_chunk,
        )
        .await;
    } else if routable {
        let message = StoredMessage {
            properties: header.properties,
            body: pending.body,
        };
        match state.consumers.get(&pending.routing_key).cloned() {
            Some((channel, tag)) => {
                let queue_name = pending.routing_key.clone();
                deliver(transport, cfg, state, channel, &tag, &queue_name, message).await;
            }
            None => {
                state
                    .queues
                    .get_mut(&pending.routing_key)
                    .expect("checked routable")
                    .push_back(message);
            }
        }
    }

    if let Some(count) = state.confirm_counts.get_mut(&pending.channel) {
        *count += 1;
        let (ack_now, multiple) = match cfg.confirm_batch {
            None => (true, false),
            Some(batch) => (*count % batch as u64 == 0, true),
        };
        if ack_now {
            send_method(transport, pending.channel, methods::basic_ack(*count, multiple)).await;
        }
    }
}
