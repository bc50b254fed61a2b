//! Implements AMQP 0-9-1 channels
//!
//! A channel is a logical lane multiplexed over the connection's socket.
//! Each open channel runs as its own event-loop task
//! ([`engine::ChannelEngine`]); the [`ChannelHandle`] returned by
//! [`ConnectionHandle::open_channel`](crate::ConnectionHandle::open_channel)
//! talks to it over in-process channels. Synchronous protocol calls resolve
//! strictly in issue order per channel, while deliveries, returns and
//! confirms for the same channel keep flowing in between.

use krolik_types::{
    definitions::REPLY_SUCCESS, methods, schema::class, BasicProperties, FieldTable, Method,
    ShortString,
};
use tokio::sync::{mpsc, oneshot};

use crate::consumer::Consumer;
use crate::control::ChannelControl;
use crate::frames::ContentHeader;
use crate::message::{Confirm, GetMessage, Returned};
use crate::Payload;

mod error;
pub use error::Error;

pub(crate) mod engine;
pub(crate) mod frame;

mod reply;

/// Channel lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Usable; its id is reserved
    Open,
    /// `channel.close` sent, waiting for `close-ok`
    Closing,
    /// Fully closed; the id may be reused
    Closed,
}

/// Options for `queue.declare`
#[derive(Debug, Clone, Default)]
pub struct QueueDeclareOptions {
    /// Only check the queue exists and matches
    pub passive: bool,
    /// Survive a broker restart
    pub durable: bool,
    /// Usable by this connection only, deleted when it closes
    pub exclusive: bool,
    /// Delete once the last consumer goes away
    pub auto_delete: bool,
    /// `x-` arguments and broker extensions
    pub arguments: FieldTable,
}

/// Options for `exchange.declare`
#[derive(Debug, Clone, Default)]
pub struct ExchangeDeclareOptions {
    /// Only check the exchange exists and matches
    pub passive: bool,
    /// Survive a broker restart
    pub durable: bool,
    /// Delete once the last binding is removed
    pub auto_delete: bool,
    /// Only bindable from other exchanges, not publishable
    pub internal: bool,
    /// `x-` arguments and broker extensions
    pub arguments: FieldTable,
}

/// Options for `basic.consume`
#[derive(Debug, Clone, Default)]
pub struct ConsumeOptions {
    /// Consumer tag; empty lets the broker pick one. Required with
    /// `no_wait`.
    pub consumer_tag: ShortString,
    /// Do not deliver messages published on this connection
    pub no_local: bool,
    /// Deliveries need no acknowledgement
    pub no_ack: bool,
    /// Sole consumer of the queue
    pub exclusive: bool,
    /// Skip waiting for `consume-ok`
    pub no_wait: bool,
    /// Broker extensions
    pub arguments: FieldTable,
}

/// A message to publish: body, routing flags and content properties
#[derive(Debug, Clone, Default)]
pub struct Publish {
    /// Content bytes
    pub body: Payload,
    /// Hand the message back via `basic.return` when unroutable
    pub mandatory: bool,
    /// Hand it back when no consumer can take it right away
    pub immediate: bool,
    /// Content properties
    pub properties: BasicProperties,
}

impl Publish {
    /// A plain publish of the given bytes
    pub fn new(body: impl Into<Payload>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }

    /// Requests `basic.return` for unroutable messages
    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    /// Attaches content properties
    pub fn with_properties(mut self, properties: BasicProperties) -> Self {
        self.properties = properties;
        self
    }
}

/// Reply of `queue.declare`
#[derive(Debug, Clone)]
pub struct QueueDeclareOk {
    /// Actual queue name (matters for broker-named queues)
    pub queue: ShortString,
    /// Messages currently on the queue
    pub message_count: u32,
    /// Consumers currently attached
    pub consumer_count: u32,
}

/// Stream of publisher confirms, handed out by
/// [`ChannelHandle::confirm_select`]
#[derive(Debug)]
pub struct Confirms {
    rx: mpsc::UnboundedReceiver<Confirm>,
}

impl Confirms {
    /// Waits for the next `basic.ack`/`basic.nack` from the broker
    pub async fn recv(&mut self) -> Option<Confirm> {
        self.rx.recv().await
    }
}

/// Stream of returned (unroutable) messages, handed out by
/// [`ChannelHandle::return_listener`]
#[derive(Debug)]
pub struct Returns {
    rx: mpsc::UnboundedReceiver<Returned>,
}

impl Returns {
    /// Waits for the next `basic.return`
    pub async fn recv(&mut self) -> Option<Returned> {
        self.rx.recv().await
    }
}

/// A handle to an open channel.
///
/// Cheap operations only queue work for the channel's event loop;
/// synchronous protocol calls await the broker's reply. Dropping the handle
/// closes the channel in the background.
#[derive(Debug)]
pub struct ChannelHandle {
    id: u16,
    control: mpsc::Sender<ChannelControl>,
}

impl ChannelHandle {
    pub(crate) fn new(id: u16, control: mpsc::Sender<ChannelControl>) -> Self {
        Self { id, control }
    }

    /// The channel id on the wire
    pub fn id(&self) -> u16 {
        self.id
    }

    async fn send_control(&self, control: ChannelControl) -> Result<(), Error> {
        self.control
            .send(control)
            .await
            .map_err(|_| Error::ChannelClosed)
    }

    async fn rpc(&self, request: Method, expect: crate::control::Expected) -> Result<Method, Error> {
        let (responder, reply) = oneshot::channel();
        self.send_control(ChannelControl::Rpc {
            request,
            expect,
            responder,
        })
        .await?;
        reply.await.map_err(|_| Error::ChannelClosed)?
    }

    async fn send_nowait(&self, request: Method) -> Result<(), Error> {
        let (responder, done) = oneshot::channel();
        self.send_control(ChannelControl::Send { request, responder })
            .await?;
        done.await.map_err(|_| Error::ChannelClosed)?
    }

    /// Declares a queue; an empty name asks the broker to generate one
    pub async fn queue_declare(
        &self,
        queue: impl Into<ShortString>,
        options: QueueDeclareOptions,
    ) -> Result<QueueDeclareOk, Error> {
        let request = methods::queue_declare(
            queue,
            options.passive,
            options.durable,
            options.exclusive,
            options.auto_delete,
            false,
            options.arguments,
        );
        let ok = self.rpc(request, reply::QUEUE_DECLARE_OK).await?;
        Ok(QueueDeclareOk {
            queue: ok.short_str(0)?.clone(),
            message_count: ok.long(1)?,
            consumer_count: ok.long(2)?,
        })
    }

    /// Binds a queue to an exchange
    pub async fn queue_bind(
        &self,
        queue: impl Into<ShortString>,
        exchange: impl Into<ShortString>,
        routing_key: impl Into<ShortString>,
        arguments: FieldTable,
    ) -> Result<(), Error> {
        let request = methods::queue_bind(queue, exchange, routing_key, false, arguments);
        self.rpc(request, reply::QUEUE_BIND_OK).await?;
        Ok(())
    }

    /// Removes a binding
    pub async fn queue_unbind(
        &self,
        queue: impl Into<ShortString>,
        exchange: impl Into<ShortString>,
        routing_key: impl Into<ShortString>,
        arguments: FieldTable,
    ) -> Result<(), Error> {
        let request = methods::queue_unbind(queue, exchange, routing_key, arguments);
        self.rpc(request, reply::QUEUE_UNBIND_OK).await?;
        Ok(())
    }

    /// Drops all messages from a queue, returning how many there were
    pub async fn queue_purge(&self, queue: impl Into<ShortString>) -> Result<u32, Error> {
        let ok = self
            .rpc(methods::queue_purge(queue, false), reply::QUEUE_PURGE_OK)
            .await?;
        Ok(ok.long(0)?)
    }

    /// Deletes a queue, returning how many messages it held
    pub async fn queue_delete(
        &self,
        queue: impl Into<ShortString>,
        if_unused: bool,
        if_empty: bool,
    ) -> Result<u32, Error> {
        let request = methods::queue_delete(queue, if_unused, if_empty, false);
        let ok = self.rpc(request, reply::QUEUE_DELETE_OK).await?;
        Ok(ok.long(0)?)
    }

    /// Declares an exchange of the given type (`direct`, `fanout`, `topic`,
    /// `headers` or a plugin type)
    pub async fn exchange_declare(
        &self,
        exchange: impl Into<ShortString>,
        kind: impl Into<ShortString>,
        options: ExchangeDeclareOptions,
    ) -> Result<(), Error> {
        let request = methods::exchange_declare(
            exchange,
            kind,
            options.passive,
            options.durable,
            options.auto_delete,
            options.internal,
            false,
            options.arguments,
        );
        self.rpc(request, reply::EXCHANGE_DECLARE_OK).await?;
        Ok(())
    }

    /// Deletes an exchange
    pub async fn exchange_delete(
        &self,
        exchange: impl Into<ShortString>,
        if_unused: bool,
    ) -> Result<(), Error> {
        let request = methods::exchange_delete(exchange, if_unused, false);
        self.rpc(request, reply::EXCHANGE_DELETE_OK).await?;
        Ok(())
    }

    /// Binds an exchange to an exchange (RabbitMQ extension)
    pub async fn exchange_bind(
        &self,
        destination: impl Into<ShortString>,
        source: impl Into<ShortString>,
        routing_key: impl Into<ShortString>,
        arguments: FieldTable,
    ) -> Result<(), Error> {
        let request = methods::exchange_bind(destination, source, routing_key, false, arguments);
        self.rpc(request, reply::EXCHANGE_BIND_OK).await?;
        Ok(())
    }

    /// Removes an exchange-to-exchange binding (RabbitMQ extension)
    pub async fn exchange_unbind(
        &self,
        destination: impl Into<ShortString>,
        source: impl Into<ShortString>,
        routing_key: impl Into<ShortString>,
        arguments: FieldTable,
    ) -> Result<(), Error> {
        let request = methods::exchange_unbind(destination, source, routing_key, false, arguments);
        self.rpc(request, reply::EXCHANGE_UNBIND_OK).await?;
        Ok(())
    }

    /// Sets the prefetch window for this channel (or, with `global`, the
    /// whole connection as RabbitMQ interprets it)
    pub async fn qos(
        &self,
        prefetch_size: u32,
        prefetch_count: u16,
        global: bool,
    ) -> Result<(), Error> {
        let request = methods::basic_qos(prefetch_size, prefetch_count, global);
        self.rpc(request, reply::BASIC_QOS_OK).await?;
        Ok(())
    }

    /// Publishes a message.
    ///
    /// Returns the publish tag when the channel is in confirm mode; match it
    /// against the [`Confirms`] stream to learn the broker took the message.
    pub async fn publish(
        &self,
        exchange: impl Into<ShortString>,
        routing_key: impl Into<ShortString>,
        publish: Publish,
    ) -> Result<Option<u64>, Error> {
        let method = methods::basic_publish(
            exchange,
            routing_key,
            publish.mandatory,
            publish.immediate,
        );
        let header = ContentHeader {
            class_id: class::BASIC,
            body_size: publish.body.len() as u64,
            properties: publish.properties,
        };
        let (responder, tag) = oneshot::channel();
        self.send_control(ChannelControl::Publish {
            method,
            header,
            body: publish.body,
            responder,
        })
        .await?;
        tag.await.map_err(|_| Error::ChannelClosed)?
    }

    /// Starts a consumer on a queue
    pub async fn consume(
        &self,
        queue: impl Into<ShortString>,
        options: ConsumeOptions,
    ) -> Result<Consumer, Error> {
        if options.no_wait && options.consumer_tag.is_empty() {
            return Err(Error::NoWaitNeedsTag);
        }
        let request = methods::basic_consume(
            queue,
            options.consumer_tag.clone(),
            options.no_local,
            options.no_ack,
            options.exclusive,
            options.no_wait,
            options.arguments,
        );
        let (deliveries, stream) = mpsc::unbounded_channel();
        let (responder, tag) = oneshot::channel();
        self.send_control(ChannelControl::Consume {
            request,
            tag: options.consumer_tag,
            no_wait: options.no_wait,
            deliveries,
            responder,
        })
        .await?;
        let tag = tag.await.map_err(|_| Error::ChannelClosed)??;
        Ok(Consumer::new(tag, stream))
    }

    /// Cancels a consumer; its delivery stream ends afterwards
    pub async fn cancel(&self, consumer_tag: impl Into<ShortString>) -> Result<(), Error> {
        let tag = consumer_tag.into();
        let request = methods::basic_cancel(tag.clone(), false);
        let (responder, done) = oneshot::channel();
        self.send_control(ChannelControl::Cancel {
            request,
            tag,
            responder,
        })
        .await?;
        done.await.map_err(|_| Error::ChannelClosed)?
    }

    /// Pulls a single message; `None` when the queue is empty
    pub async fn get(
        &self,
        queue: impl Into<ShortString>,
        no_ack: bool,
    ) -> Result<Option<GetMessage>, Error> {
        let request = methods::basic_get(queue, no_ack);
        let (responder, message) = oneshot::channel();
        self.send_control(ChannelControl::Get { request, responder })
            .await?;
        message.await.map_err(|_| Error::ChannelClosed)?
    }

    /// Acknowledges a delivery; with `multiple` everything up to
    /// `delivery_tag`
    pub async fn ack(&self, delivery_tag: u64, multiple: bool) -> Result<(), Error> {
        self.send_nowait(methods::basic_ack(delivery_tag, multiple)).await
    }

    /// Negatively acknowledges deliveries (RabbitMQ extension)
    pub async fn nack(
        &self,
        delivery_tag: u64,
        multiple: bool,
        requeue: bool,
    ) -> Result<(), Error> {
        self.send_nowait(methods::basic_nack(delivery_tag, multiple, requeue))
            .await
    }

    /// Rejects a single delivery
    pub async fn reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), Error> {
        self.send_nowait(methods::basic_reject(delivery_tag, requeue))
            .await
    }

    /// Redelivers all unacknowledged messages on this channel
    pub async fn recover(&self, requeue: bool) -> Result<(), Error> {
        self.rpc(methods::basic_recover(requeue), reply::BASIC_RECOVER_OK)
            .await?;
        Ok(())
    }

    /// Asks the broker to pause (`false`) or resume (`true`) deliveries to
    /// this channel; returns the broker's answer
    pub async fn flow(&self, active: bool) -> Result<bool, Error> {
        let (responder, answer) = oneshot::channel();
        self.send_control(ChannelControl::Flow { active, responder })
            .await?;
        answer.await.map_err(|_| Error::ChannelClosed)?
    }

    /// Puts the channel in transaction mode
    pub async fn tx_select(&self) -> Result<(), Error> {
        let (responder, done) = oneshot::channel();
        self.send_control(ChannelControl::TxSelect { responder }).await?;
        done.await.map_err(|_| Error::ChannelClosed)?
    }

    /// Commits the current transaction
    pub async fn tx_commit(&self) -> Result<(), Error> {
        let (responder, done) = oneshot::channel();
        self.send_control(ChannelControl::TxCommit { responder }).await?;
        done.await.map_err(|_| Error::ChannelClosed)?
    }

    /// Rolls the current transaction back
    pub async fn tx_rollback(&self) -> Result<(), Error> {
        let (responder, done) = oneshot::channel();
        self.send_control(ChannelControl::TxRollback { responder })
            .await?;
        done.await.map_err(|_| Error::ChannelClosed)?
    }

    /// Puts the channel in publisher-confirm mode.
    ///
    /// Publishes made afterwards are tagged 1, 2, … and settled through the
    /// returned [`Confirms`] stream, cumulatively when the broker sets
    /// `multiple`.
    pub async fn confirm_select(&self) -> Result<Confirms, Error> {
        let (responder, stream) = oneshot::channel();
        self.send_control(ChannelControl::ConfirmSelect { responder })
            .await?;
        let rx = stream.await.map_err(|_| Error::ChannelClosed)??;
        Ok(Confirms { rx })
    }

    /// Registers a listener for `basic.return` of mandatory/immediate
    /// publishes the broker could not place
    pub async fn return_listener(&self) -> Result<Returns, Error> {
        let (responder, stream) = oneshot::channel();
        self.send_control(ChannelControl::ReturnListener { responder })
            .await?;
        let rx = stream.await.map_err(|_| Error::ChannelClosed)?;
        Ok(Returns { rx })
    }

    /// Closes the channel, failing any still-pending synchronous calls
    pub async fn close(&mut self) -> Result<(), Error> {
        let (responder, done) = oneshot::channel();
        if self
            .control
            .send(ChannelControl::Close { responder })
            .await
            .is_err()
        {
            // engine already gone; nothing left to close
            return Ok(());
        }
        done.await.unwrap_or(Ok(()))
    }
}

/// The `channel.close` a client sends when nothing went wrong
pub(crate) fn goodbye() -> Method {
    methods::channel_close(REPLY_SUCCESS.0, "Goodbye", 0, 0)
}
