//! Expected-reply sets for the synchronous channel calls

use krolik_types::schema::{basic, channel, class, confirm, exchange, queue, tx};

use crate::control::Expected;

pub(crate) const QUEUE_DECLARE_OK: Expected = &[(class::QUEUE, queue::DECLARE_OK)];
pub(crate) const QUEUE_BIND_OK: Expected = &[(class::QUEUE, queue::BIND_OK)];
pub(crate) const QUEUE_UNBIND_OK: Expected = &[(class::QUEUE, queue::UNBIND_OK)];
pub(crate) const QUEUE_PURGE_OK: Expected = &[(class::QUEUE, queue::PURGE_OK)];
pub(crate) const QUEUE_DELETE_OK: Expected = &[(class::QUEUE, queue::DELETE_OK)];

pub(crate) const EXCHANGE_DECLARE_OK: Expected = &[(class::EXCHANGE, exchange::DECLARE_OK)];
pub(crate) const EXCHANGE_DELETE_OK: Expected = &[(class::EXCHANGE, exchange::DELETE_OK)];
pub(crate) const EXCHANGE_BIND_OK: Expected = &[(class::EXCHANGE, exchange::BIND_OK)];
pub(crate) const EXCHANGE_UNBIND_OK: Expected = &[(class::EXCHANGE, exchange::UNBIND_OK)];

pub(crate) const BASIC_QOS_OK: Expected = &[(class::BASIC, basic::QOS_OK)];
pub(crate) const BASIC_RECOVER_OK: Expected = &[(class::BASIC, basic::RECOVER_OK)];
pub(crate) const BASIC_CONSUME_OK: Expected = &[(class::BASIC, basic::CONSUME_OK)];
pub(crate) const BASIC_CANCEL_OK: Expected = &[(class::BASIC, basic::CANCEL_OK)];
pub(crate) const BASIC_GET_REPLIES: Expected =
    &[(class::BASIC, basic::GET_OK), (class::BASIC, basic::GET_EMPTY)];

pub(crate) const CHANNEL_FLOW_OK: Expected = &[(class::CHANNEL, channel::FLOW_OK)];
pub(crate) const CHANNEL_CLOSE_OK: Expected = &[(class::CHANNEL, channel::CLOSE_OK)];

pub(crate) const CONFIRM_SELECT_OK: Expected = &[(class::CONFIRM, confirm::SELECT_OK)];
pub(crate) const TX_SELECT_OK: Expected = &[(class::TX, tx::SELECT_OK)];
pub(crate) const TX_COMMIT_OK: Expected = &[(class::TX, tx::COMMIT_OK)];
pub(crate) const TX_ROLLBACK_OK: Expected = &[(class::TX, tx::ROLLBACK_OK)];
