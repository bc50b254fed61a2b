//! The static method schema
//!
//! AMQP 0-9-1 identifies every method by a (class id, method id) pair and
//! fixes its argument layout. Instead of one nominal type per method, this
//! table is the single source of truth for those layouts; the generic
//! [`Method`](crate::Method) codec walks it to (de)serialize arguments.

/// Class ids
pub mod class {
    /// `connection`
    pub const CONNECTION: u16 = 10;
    /// `channel`
    pub const CHANNEL: u16 = 20;
    /// `exchange`
    pub const EXCHANGE: u16 = 40;
    /// `queue`
    pub const QUEUE: u16 = 50;
    /// `basic`
    pub const BASIC: u16 = 60;
    /// `confirm` (RabbitMQ extension)
    pub const CONFIRM: u16 = 85;
    /// `tx`
    pub const TX: u16 = 90;
}

/// Method ids of the `connection` class
pub mod connection {
    /// `connection.start`
    pub const START: u16 = 10;
    /// `connection.start-ok`
    pub const START_OK: u16 = 11;
    /// `connection.secure`
    pub const SECURE: u16 = 20;
    /// `connection.secure-ok`
    pub const SECURE_OK: u16 = 21;
    /// `connection.tune`
    pub const TUNE: u16 = 30;
    /// `connection.tune-ok`
    pub const TUNE_OK: u16 = 31;
    /// `connection.open`
    pub const OPEN: u16 = 40;
    /// `connection.open-ok`
    pub const OPEN_OK: u16 = 41;
    /// `connection.close`
    pub const CLOSE: u16 = 50;
    /// `connection.close-ok`
    pub const CLOSE_OK: u16 = 51;
    /// `connection.blocked` (RabbitMQ extension)
    pub const BLOCKED: u16 = 60;
    /// `connection.unblocked` (RabbitMQ extension)
    pub const UNBLOCKED: u16 = 61;
}

/// Method ids of the `channel` class
pub mod channel {
    /// `channel.open`
    pub const OPEN: u16 = 10;
    /// `channel.open-ok`
    pub const OPEN_OK: u16 = 11;
    /// `channel.flow`
    pub const FLOW: u16 = 20;
    /// `channel.flow-ok`
    pub const FLOW_OK: u16 = 21;
    /// `channel.close`
    pub const CLOSE: u16 = 40;
    /// `channel.close-ok`
    pub const CLOSE_OK: u16 = 41;
}

/// Method ids of the `exchange` class
pub mod exchange {
    /// `exchange.declare`
    pub const DECLARE: u16 = 10;
    /// `exchange.declare-ok`
    pub const DECLARE_OK: u16 = 11;
    /// `exchange.delete`
    pub const DELETE: u16 = 20;
    /// `exchange.delete-ok`
    pub const DELETE_OK: u16 = 21;
    /// `exchange.bind` (RabbitMQ extension)
    pub const BIND: u16 = 30;
    /// `exchange.bind-ok`
    pub const BIND_OK: u16 = 31;
    /// `exchange.unbind` (RabbitMQ extension)
    pub const UNBIND: u16 = 40;
    /// `exchange.unbind-ok`
    pub const UNBIND_OK: u16 = 51;
}

/// Method ids of the `queue` class
pub mod queue {
    /// `queue.declare`
    pub const DECLARE: u16 = 10;
    /// `queue.declare-ok`
    pub const DECLARE_OK: u16 = 11;
    /// `queue.bind`
    pub const BIND: u16 = 20;
    /// `queue.bind-ok`
    pub const BIND_OK: u16 = 21;
    /// `queue.purge`
    pub const PURGE: u16 = 30;
    /// `queue.purge-ok`
    pub const PURGE_OK: u16 = 31;
    /// `queue.delete`
    pub const DELETE: u16 = 40;
    /// `queue.delete-ok`
    pub const DELETE_OK: u16 = 41;
    /// `queue.unbind`
    pub const UNBIND: u16 = 50;
    /// `queue.unbind-ok`
    pub const UNBIND_OK: u16 = 51;
}

/// Method ids of the `basic` class
pub mod basic {
    /// `basic.qos`
    pub const QOS: u16 = 10;
    /// `basic.qos-ok`
    pub const QOS_OK: u16 = 11;
    /// `basic.consume`
    pub const CONSUME: u16 = 20;
    /// `basic.consume-ok`
    pub const CONSUME_OK: u16 = 21;
    /// `basic.cancel`
    pub const CANCEL: u16 = 30;
    /// `basic.cancel-ok`
    pub const CANCEL_OK: u16 = 31;
    /// `basic.publish`
    pub const PUBLISH: u16 = 40;
    /// `basic.return`
    pub const RETURN: u16 = 50;
    /// `basic.deliver`
    pub const DELIVER: u16 = 60;
    /// `basic.get`
    pub const GET: u16 = 70;
    /// `basic.get-ok`
    pub const GET_OK: u16 = 71;
    /// `basic.get-empty`
    pub const GET_EMPTY: u16 = 72;
    /// `basic.ack`
    pub const ACK: u16 = 80;
    /// `basic.reject`
    pub const REJECT: u16 = 90;
    /// `basic.recover-async`
    pub const RECOVER_ASYNC: u16 = 100;
    /// `basic.recover`
    pub const RECOVER: u16 = 110;
    /// `basic.recover-ok`
    pub const RECOVER_OK: u16 = 111;
    /// `basic.nack` (RabbitMQ extension)
    pub const NACK: u16 = 120;
}

/// Method ids of the `confirm` class (RabbitMQ extension)
pub mod confirm {
    /// `confirm.select`
    pub const SELECT: u16 = 10;
    /// `confirm.select-ok`
    pub const SELECT_OK: u16 = 11;
}

/// Method ids of the `tx` class
pub mod tx {
    /// `tx.select`
    pub const SELECT: u16 = 10;
    /// `tx.select-ok`
    pub const SELECT_OK: u16 = 11;
    /// `tx.commit`
    pub const COMMIT: u16 = 20;
    /// `tx.commit-ok`
    pub const COMMIT_OK: u16 = 21;
    /// `tx.rollback`
    pub const ROLLBACK: u16 = 30;
    /// `tx.rollback-ok`
    pub const ROLLBACK_OK: u16 = 31;
}

/// Wire kind of a single method argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// u8
    Octet,
    /// u16, big-endian
    Short,
    /// u32, big-endian
    Long,
    /// u64, big-endian
    LongLong,
    /// One bit; consecutive bits share octets
    Bit,
    /// Short string
    ShortStr,
    /// Long string
    LongStr,
    /// Field table
    Table,
    /// u64 POSIX seconds
    Timestamp,
}

/// Argument layout of one protocol method
#[derive(Debug, Clone, Copy)]
pub struct MethodSpec {
    /// Class id
    pub class_id: u16,
    /// Method id within the class
    pub method_id: u16,
    /// Dotted method name, for diagnostics
    pub name: &'static str,
    /// Argument kinds in wire order
    pub fields: &'static [FieldKind],
}

macro_rules! spec {
    ($class:expr, $method:expr, $name:literal, [$($kind:ident),*]) => {
        MethodSpec {
            class_id: $class,
            method_id: $method,
            name: $name,
            fields: &[$(FieldKind::$kind),*],
        }
    };
}

/// Every method this client speaks, sorted by (class id, method id)
pub static SCHEMA: &[MethodSpec] = &[
    spec!(class::CONNECTION, connection::START, "connection.start", [Octet, Octet, Table, LongStr, LongStr]),
    spec!(class::CONNECTION, connection::START_OK, "connection.start-ok", [Table, ShortStr, LongStr, ShortStr]),
    spec!(class::CONNECTION, connection::SECURE, "connection.secure", [LongStr]),
    spec!(class::CONNECTION, connection::SECURE_OK, "connection.secure-ok", [LongStr]),
    spec!(class::CONNECTION, connection::TUNE, "connection.tune", [Short, Long, Short]),
    spec!(class::CONNECTION, connection::TUNE_OK, "connection.tune-ok", [Short, Long, Short]),
    spec!(class::CONNECTION, connection::OPEN, "connection.open", [ShortStr, ShortStr, Bit]),
    spec!(class::CONNECTION, connection::OPEN_OK, "connection.open-ok", [ShortStr]),
    spec!(class::CONNECTION, connection::CLOSE, "connection.close", [Short, ShortStr, Short, Short]),
    spec!(class::CONNECTION, connection::CLOSE_OK, "connection.close-ok", []),
    spec!(class::CONNECTION, connection::BLOCKED, "connection.blocked", [ShortStr]),
    spec!(class::CONNECTION, connection::UNBLOCKED, "connection.unblocked", []),
    spec!(class::CHANNEL, channel::OPEN, "channel.open", [ShortStr]),
    spec!(class::CHANNEL, channel::OPEN_OK, "channel.open-ok", [LongStr]),
    spec!(class::CHANNEL, channel::FLOW, "channel.flow", [Bit]),
    spec!(class::CHANNEL, channel::FLOW_OK, "channel.flow-ok", [Bit]),
    spec!(class::CHANNEL, channel::CLOSE, "channel.close", [Short, ShortStr, Short, Short]),
    spec!(class::CHANNEL, channel::CLOSE_OK, "channel.close-ok", []),
    spec!(class::EXCHANGE, exchange::DECLARE, "exchange.declare", [Short, ShortStr, ShortStr, Bit, Bit, Bit, Bit, Bit, Table]),
    spec!(class::EXCHANGE, exchange::DECLARE_OK, "exchange.declare-ok", []),
    spec!(class::EXCHANGE, exchange::DELETE, "exchange.delete", [Short, ShortStr, Bit, Bit]),
    spec!(class::EXCHANGE, exchange::DELETE_OK, "exchange.delete-ok", []),
    spec!(class::EXCHANGE, exchange::BIND, "exchange.bind", [Short, ShortStr, ShortStr, ShortStr, Bit, Table]),
    spec!(class::EXCHANGE, exchange::BIND_OK, "exchange.bind-ok", []),
    spec!(class::EXCHANGE, exchange::UNBIND, "exchange.unbind", [Short, ShortStr, ShortStr, ShortStr, Bit, Table]),
    spec!(class::EXCHANGE, exchange::UNBIND_OK, "exchange.unbind-ok", []),
    spec!(class::QUEUE, queue::DECLARE, "queue.declare", [Short, ShortStr, Bit, Bit, Bit, Bit, Bit, Table]),
    spec!(class::QUEUE, queue::DECLARE_OK, "queue.declare-ok", [ShortStr, Long, Long]),
    spec!(class::QUEUE, queue::BIND, "queue.bind", [Short, ShortStr, ShortStr, ShortStr, Bit, Table]),
    spec!(class::QUEUE, queue::BIND_OK, "queue.bind-ok", []),
    spec!(class::QUEUE, queue::PURGE, "queue.purge", [Short, ShortStr, Bit]),
    spec!(class::QUEUE, queue::PURGE_OK, "queue.purge-ok", [Long]),
    spec!(class::QUEUE, queue::DELETE, "queue.delete", [Short, ShortStr, Bit, Bit, Bit]),
    spec!(class::QUEUE, queue::DELETE_OK, "queue.delete-ok", [Long]),
    spec!(class::QUEUE, queue::UNBIND, "queue.unbind", [Short, ShortStr, ShortStr, ShortStr, Table]),
    spec!(class::QUEUE, queue::UNBIND_OK, "queue.unbind-ok", []),
    spec!(class::BASIC, basic::QOS, "basic.qos", [Long, Short, Bit]),
    spec!(class::BASIC, basic::QOS_OK, "basic.qos-ok", []),
    spec!(class::BASIC, basic::CONSUME, "basic.consume", [Short, ShortStr, ShortStr, Bit, Bit, Bit, Bit, Table]),
    spec!(class::BASIC, basic::CONSUME_OK, "basic.consume-ok", [ShortStr]),
    spec!(class::BASIC, basic::CANCEL, "basic.cancel", [ShortStr, Bit]),
    spec!(class::BASIC, basic::CANCEL_OK, "basic.cancel-ok", [ShortStr]),
    spec!(class::BASIC, basic::PUBLISH, "basic.publish", [Short, ShortStr, ShortStr, Bit, Bit]),
    spec!(class::BASIC, basic::RETURN, "basic.return", [Short, ShortStr, ShortStr, ShortStr]),
    spec!(class::BASIC, basic::DELIVER, "basic.deliver", [ShortStr, LongLong, Bit, ShortStr, ShortStr]),
    spec!(class::BASIC, basic::GET, "basic.get", [Short, ShortStr, Bit]),
    spec!(class::BASIC, basic::GET_OK, "basic.get-ok", [LongLong, Bit, ShortStr, ShortStr, Long]),
    spec!(class::BASIC, basic::GET_EMPTY, "basic.get-empty", [ShortStr]),
    spec!(class::BASIC, basic::ACK, "basic.ack", [LongLong, Bit]),
    spec!(class::BASIC, basic::REJECT, "basic.reject", [LongLong, Bit]),
    spec!(class::BASIC, basic::RECOVER_ASYNC, "basic.recover-async", [Bit]),
    spec!(class::BASIC, basic::RECOVER, "basic.recover", [Bit]),
    spec!(class::BASIC, basic::RECOVER_OK, "basic.recover-ok", []),
    spec!(class::BASIC, basic::NACK, "basic.nack", [LongLong, Bit, Bit]),
    spec!(class::CONFIRM, confirm::SELECT, "confirm.select", [Bit]),
    spec!(class::CONFIRM, confirm::SELECT_OK, "confirm.select-ok", []),
    spec!(class::TX, tx::SELECT, "tx.select", []),
    spec!(class::TX, tx::SELECT_OK, "tx.select-ok", []),
    spec!(class::TX, tx::COMMIT, "tx.commit", []),
    spec!(class::TX, tx::COMMIT_OK, "tx.commit-ok", []),
    spec!(class::TX, tx::ROLLBACK, "tx.rollback", []),
    spec!(class::TX, tx::ROLLBACK_OK, "tx.rollback-ok", []),
];

/// Looks up the argument layout of a (class id, method id) pair
pub fn lookup(class_id: u16, method_id: u16) -> Option<&'static MethodSpec> {
    SCHEMA
        .binary_search_by_key(&(class_id, method_id), |s| (s.class_id, s.method_id))
        .ok()
        .map(|i| &SCHEMA[i])
}

/// Whether any method of `class_id` is known to the schema
pub fn knows_class(class_id: u16) -> bool {
    SCHEMA.iter().any(|s| s.class_id == class_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sorted_for_binary_search() {
        let mut prev = (0u16, 0u16);
        for spec in SCHEMA {
            let key = (spec.class_id, spec.method_id);
            assert!(key > prev, "schema out of order at {}", spec.name);
            prev = key;
        }
    }

    #[test]
    fn lookup_finds_known_methods() {
        let deliver = lookup(class::BASIC, basic::DELIVER).unwrap();
        assert_eq!(deliver.name, "basic.deliver");
        assert_eq!(deliver.fields.len(), 5);

        assert!(lookup(class::TX, tx::ROLLBACK_OK).is_some());
        assert!(lookup(class::CONNECTION, 99).is_none());
        assert!(lookup(11, connection::START).is_none());
    }

    #[test]
    fn knows_class_tracks_the_table() {
        assert!(knows_class(class::CONFIRM));
        assert!(!knows_class(30));
    }
}
