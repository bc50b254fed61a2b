//! Implements the outbound heartbeat timer
//!
//! Not a fixed interval: the deadline is pushed back whenever regular
//! traffic has been written recently, so heartbeat frames only go out on an
//! otherwise idle connection.

use std::{pin::Pin, task::Poll, time::Duration};

use futures_util::Future;
use tokio::time::{sleep_until, Instant, Sleep};

/// A resettable deadline; pends forever when heartbeats are disabled
#[derive(Debug)]
pub(crate) struct HeartBeat {
    delay: Option<Pin<Box<Sleep>>>,
}

impl HeartBeat {
    /// A heartbeat that never fires
    pub fn never() -> Self {
        Self { delay: None }
    }

    /// A heartbeat first due one period from now
    pub fn new(period: Duration) -> Self {
        Self {
            delay: Some(Box::pin(sleep_until(Instant::now() + period))),
        }
    }

    /// Moves the deadline
    pub fn reset(&mut self, deadline: Instant) {
        if let Some(delay) = &mut self.delay {
            delay.as_mut().reset(deadline);
        }
    }
}

impl Future for HeartBeat {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> Poll<Self::Output> {
        match &mut self.delay {
            Some(delay) => delay.as_mut().poll(cx),
            None => Poll::Pending,
        }
    }
}
