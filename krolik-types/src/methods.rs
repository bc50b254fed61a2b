//! Constructors for the methods a client sends
//!
//! Besides the [`schema`](crate::schema) table itself, these are the only
//! place that knows argument ordering; everything above builds methods
//! through them.

use crate::{
    schema::{basic, channel, class, confirm, connection, exchange, queue, tx},
    Field, FieldTable, LongString, Method, ShortString,
};

/// `connection.start-ok`
pub fn connection_start_ok(
    client_properties: FieldTable,
    mechanism: impl Into<ShortString>,
    response: LongString,
    locale: impl Into<ShortString>,
) -> Method {
    Method::new(
        class::CONNECTION,
        connection::START_OK,
        vec![
            Field::Table(client_properties),
            Field::ShortStr(mechanism.into()),
            Field::LongStr(response),
            Field::ShortStr(locale.into()),
        ],
    )
}

/// `connection.secure-ok`
pub fn connection_secure_ok(response: LongString) -> Method {
    Method::new(
        class::CONNECTION,
        connection::SECURE_OK,
        vec![Field::LongStr(response)],
    )
}

/// `connection.tune-ok`
pub fn connection_tune_ok(channel_max: u16, frame_max: u32, heartbeat: u16) -> Method {
    Method::new(
        class::CONNECTION,
        connection::TUNE_OK,
        vec![
            Field::Short(channel_max),
            Field::Long(frame_max),
            Field::Short(heartbeat),
        ],
    )
}

/// `connection.open` (both reserved arguments zeroed)
pub fn connection_open(virtual_host: impl Into<ShortString>) -> Method {
    Method::new(
        class::CONNECTION,
        connection::OPEN,
        vec![
            Field::ShortStr(virtual_host.into()),
            Field::ShortStr(ShortString::default()),
            Field::Bit(false),
        ],
    )
}

/// `connection.close`
pub fn connection_close(
    reply_code: u16,
    reply_text: impl Into<ShortString>,
    class_id: u16,
    method_id: u16,
) -> Method {
    Method::new(
        class::CONNECTION,
        connection::CLOSE,
        vec![
            Field::Short(reply_code),
            Field::ShortStr(reply_text.into()),
            Field::Short(class_id),
            Field::Short(method_id),
        ],
    )
}

/// `connection.close-ok`
pub fn connection_close_ok() -> Method {
    Method::new(class::CONNECTION, connection::CLOSE_OK, vec![])
}

/// `channel.open` (reserved argument zeroed)
pub fn channel_open() -> Method {
    Method::new(
        class::CHANNEL,
        channel::OPEN,
        vec![Field::ShortStr(ShortString::default())],
    )
}

/// `channel.flow`
pub fn channel_flow(active: bool) -> Method {
    Method::new(class::CHANNEL, channel::FLOW, vec![Field::Bit(active)])
}

/// `channel.flow-ok`
pub fn channel_flow_ok(active: bool) -> Method {
    Method::new(class::CHANNEL, channel::FLOW_OK, vec![Field::Bit(active)])
}

/// `channel.close`
pub fn channel_close(
    reply_code: u16,
    reply_text: impl Into<ShortString>,
    class_id: u16,
    method_id: u16,
) -> Method {
    Method::new(
        class::CHANNEL,
        channel::CLOSE,
        vec![
            Field::Short(reply_code),
            Field::ShortStr(reply_text.into()),
            Field::Short(class_id),
            Field::Short(method_id),
        ],
    )
}

/// `channel.close-ok`
pub fn channel_close_ok() -> Method {
    Method::new(class::CHANNEL, channel::CLOSE_OK, vec![])
}

/// `exchange.declare`
#[allow(clippy::too_many_arguments)]
pub fn exchange_declare(
    exchange: impl Into<ShortString>,
    kind: impl Into<ShortString>,
    passive: bool,
    durable: bool,
    auto_delete: bool,
    internal: bool,
    no_wait: bool,
    arguments: FieldTable,
) -> Method {
    Method::new(
        class::EXCHANGE,
        exchange::DECLARE,
        vec![
            Field::Short(0),
            Field::ShortStr(exchange.into()),
            Field::ShortStr(kind.into()),
            Field::Bit(passive),
            Field::Bit(durable),
            Field::Bit(auto_delete),
            Field::Bit(internal),
            Field::Bit(no_wait),
            Field::Table(arguments),
        ],
    )
}

/// `exchange.delete`
pub fn exchange_delete(
    exchange: impl Into<ShortString>,
    if_unused: bool,
    no_wait: bool,
) -> Method {
    Method::new(
        class::EXCHANGE,
        exchange::DELETE,
        vec![
            Field::Short(0),
            Field::ShortStr(exchange.into()),
            Field::Bit(if_unused),
            Field::Bit(no_wait),
        ],
    )
}

/// `exchange.bind`
pub fn exchange_bind(
    destination: impl Into<ShortString>,
    source: impl Into<ShortString>,
    routing_key: impl Into<ShortString>,
    no_wait: bool,
    arguments: FieldTable,
) -> Method {
    Method::new(
        class::EXCHANGE,
        exchange::BIND,
        vec![
            Field::Short(0),
            Field::ShortStr(destination.into()),
            Field::ShortStr(source.into()),
            Field::ShortStr(routing_key.into()),
            Field::Bit(no_wait),
            Field::Table(arguments),
        ],
    )
}

/// `exchange.unbind`
pub fn exchange_unbind(
    destination: impl Into<ShortString>,
    source: impl Into<ShortString>,
    routing_key: impl Into<ShortString>,
    no_wait: bool,
    arguments: FieldTable,
) -> Method {
    Method::new(
        class::EXCHANGE,
        exchange::UNBIND,
        vec![
            Field::Short(0),
            Field::ShortStr(destination.into()),
            Field::ShortStr(source.into()),
            Field::ShortStr(routing_key.into()),
            Field::Bit(no_wait),
            Field::Table(arguments),
        ],
    )
}

/// `queue.declare`
pub fn queue_declare(
    queue: impl Into<ShortString>,
    passive: bool,
    durable: bool,
    exclusive: bool,
    auto_delete: bool,
    no_wait: bool,
    arguments: FieldTable,
) -> Method {
    Method::new(
        class::QUEUE,
        queue::DECLARE,
        vec![
            Field::Short(0),
            Field::ShortStr(queue.into()),
            Field::Bit(passive),
            Field::Bit(durable),
            Field::Bit(exclusive),
            Field::Bit(auto_delete),
            Field::Bit(no_wait),
            Field::Table(arguments),
        ],
    )
}

/// `queue.bind`
pub fn queue_bind(
    queue: impl Into<ShortString>,
    exchange: impl Into<ShortString>,
    routing_key: impl Into<ShortString>,
    no_wait: bool,
    arguments: FieldTable,
) -> Method {
    Method::new(
        class::QUEUE,
        queue::BIND,
        vec![
            Field::Short(0),
            Field::ShortStr(queue.into()),
            Field::ShortStr(exchange.into()),
            Field::ShortStr(routing_key.into()),
            Field::Bit(no_wait),
            Field::Table(arguments),
        ],
    )
}

/// `queue.purge`
pub fn queue_purge(queue: impl Into<ShortString>, no_wait: bool) -> Method {
    Method::new(
        class::QUEUE,
        queue::PURGE,
        vec![
            Field::Short(0),
            Field::ShortStr(queue.into()),
            Field::Bit(no_wait),
        ],
    )
}

/// `queue.delete`
pub fn queue_delete(
    queue: impl Into<ShortString>,
    if_unused: bool,
    if_empty: bool,
    no_wait: bool,
) -> Method {
    Method::new(
        class::QUEUE,
        queue::DELETE,
        vec![
            Field::Short(0),
            Field::ShortStr(queue.into()),
            Field::Bit(if_unused),
            Field::Bit(if_empty),
            Field::Bit(no_wait),
        ],
    )
}

/// `queue.unbind`
pub fn queue_unbind(
    queue: impl Into<ShortString>,
    exchange: impl Into<ShortString>,
    routing_key: impl Into<ShortString>,
    arguments: FieldTable,
) -> Method {
    Method::new(
        class::QUEUE,
        queue::UNBIND,
        vec![
            Field::Short(0),
            Field::ShortStr(queue.into()),
            Field::ShortStr(exchange.into()),
            Field::ShortStr(routing_key.into()),
            Field::Table(arguments),
        ],
    )
}

/// `basic.qos`
pub fn basic_qos(prefetch_size: u32, prefetch_count: u16, global: bool) -> Method {
    Method::new(
        class::BASIC,
        basic::QOS,
        vec![
            Field::Long(prefetch_size),
            Field::Short(prefetch_count),
            Field::Bit(global),
        ],
    )
}

/// `basic.consume`
pub fn basic_consume(
    queue: impl Into<ShortString>,
    consumer_tag: impl Into<ShortString>,
    no_local: bool,
    no_ack: bool,
    exclusive: bool,
    no_wait: bool,
    arguments: FieldTable,
) -> Method {
    Method::new(
        class::BASIC,
        basic::CONSUME,
        vec![
            Field::Short(0),
            Field::ShortStr(queue.into()),
            Field::ShortStr(consumer_tag.into()),
            Field::Bit(no_local),
            Field::Bit(no_ack),
            Field::Bit(exclusive),
            Field::Bit(no_wait),
            Field::Table(arguments),
        ],
    )
}

/// `basic.cancel`
pub fn basic_cancel(consumer_tag: impl Into<ShortString>, no_wait: bool) -> Method {
    Method::new(
        class::BASIC,
        basic::CANCEL,
        vec![Field::ShortStr(consumer_tag.into()), Field::Bit(no_wait)],
    )
}

/// `basic.publish`
pub fn basic_publish(
    exchange: impl Into<ShortString>,
    routing_key: impl Into<ShortString>,
    mandatory: bool,
    immediate: bool,
) -> Method {
    Method::new(
        class::BASIC,
        basic::PUBLISH,
        vec![
            Field::Short(0),
            Field::ShortStr(exchange.into()),
            Field::ShortStr(routing_key.into()),
            Field::Bit(mandatory),
            Field::Bit(immediate),
        ],
    )
}

/// `basic.get`
pub fn basic_get(queue: impl Into<ShortString>, no_ack: bool) -> Method {
    Method::new(
        class::BASIC,
        basic::GET,
        vec![
            Field::Short(0),
            Field::ShortStr(queue.into()),
            Field::Bit(no_ack),
        ],
    )
}

/// `basic.ack`
pub fn basic_ack(delivery_tag: u64, multiple: bool) -> Method {
    Method::new(
        class::BASIC,
        basic::ACK,
        vec![Field::LongLong(delivery_tag), Field::Bit(multiple)],
    )
}

/// `basic.nack`
pub fn basic_nack(delivery_tag: u64, multiple: bool, requeue: bool) -> Method {
    Method::new(
        class::BASIC,
        basic::NACK,
        vec![
            Field::LongLong(delivery_tag),
            Field::Bit(multiple),
            Field::Bit(requeue),
        ],
    )
}

/// `basic.reject`
pub fn basic_reject(delivery_tag: u64, requeue: bool) -> Method {
    Method::new(
        class::BASIC,
        basic::REJECT,
        vec![Field::LongLong(delivery_tag), Field::Bit(requeue)],
    )
}

/// `basic.recover`
pub fn basic_recover(requeue: bool) -> Method {
    Method::new(class::BASIC, basic::RECOVER, vec![Field::Bit(requeue)])
}

/// `confirm.select`
pub fn confirm_select(no_wait: bool) -> Method {
    Method::new(class::CONFIRM, confirm::SELECT, vec![Field::Bit(no_wait)])
}

/// `tx.select`
pub fn tx_select() -> Method {
    Method::new(class::TX, tx::SELECT, vec![])
}

/// `tx.commit`
pub fn tx_commit() -> Method {
    Method::new(class::TX, tx::COMMIT, vec![])
}

/// `tx.rollback`
pub fn tx_rollback() -> Method {
    Method::new(class::TX, tx::ROLLBACK, vec![])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    #[test]
    fn constructors_line_up_with_the_schema() {
        let built = [
            connection_start_ok(FieldTable::new(), "PLAIN", b"\0guest\0guest".to_vec(), "en_US"),
            connection_secure_ok(vec![]),
            connection_tune_ok(2047, 131_072, 60),
            connection_open("/"),
            connection_close(200, "Goodbye", 0, 0),
            connection_close_ok(),
            channel_open(),
            channel_flow(true),
            channel_flow_ok(true),
            channel_close(200, "Goodbye", 0, 0),
            channel_close_ok(),
            exchange_declare("logs", "fanout", false, true, false, false, false, FieldTable::new()),
            exchange_delete("logs", true, false),
            exchange_bind("dst", "src", "k", false, FieldTable::new()),
            exchange_unbind("dst", "src", "k", false, FieldTable::new()),
            queue_declare("tasks", false, true, false, false, false, FieldTable::new()),
            queue_bind("tasks", "logs", "#", false, FieldTable::new()),
            queue_purge("tasks", false),
            queue_delete("tasks", false, true, false),
            queue_unbind("tasks", "logs", "#", FieldTable::new()),
            basic_qos(0, 10, false),
            basic_consume("tasks", "", false, false, false, false, FieldTable::new()),
            basic_cancel("ctag-1", false),
            basic_publish("", "tasks", true, false),
            basic_get("tasks", true),
            basic_ack(1, false),
            basic_nack(2, true, true),
            basic_reject(3, false),
            basic_recover(true),
            confirm_select(false),
            tx_select(),
            tx_commit(),
            tx_rollback(),
        ];

        for method in built {
            let spec = schema::lookup(method.class_id, method.method_id)
                .unwrap_or_else(|| panic!("{}/{} off schema", method.class_id, method.method_id));
            assert_eq!(
                method.fields.len(),
                spec.fields.len(),
                "{} arity mismatch",
                spec.name
            );
            let mut dst = bytes::BytesMut::new();
            method.encode(&mut dst).unwrap_or_else(|e| {
                panic!("{} does not encode: {e}", spec.name);
            });
        }
    }
}
