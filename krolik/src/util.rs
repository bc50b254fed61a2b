//! Common utilities

use std::{pin::Pin, task::Poll, time::Duration};

use futures_util::Future;
use tokio::time::{Instant, Sleep};

/// Whether an event loop should keep going after handling an event
#[derive(Debug)]
pub(crate) enum Running {
    Continue,
    Stop,
}

/// Deadline for inbound traffic; the transport yields an error when it
/// elapses without any frame arriving.
#[derive(Debug)]
pub(crate) struct IdleTimeout {
    delay: Pin<Box<Sleep>>,
    duration: Duration,
}

impl IdleTimeout {
    pub fn new(duration: Duration) -> Self {
        let delay = Box::pin(tokio::time::sleep(duration));
        Self { delay, duration }
    }

    pub fn reset(&mut self) {
        let next = Instant::now() + self.duration;
        self.delay.as_mut().reset(next);
    }
}

impl Future for IdleTimeout {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> Poll<Self::Output> {
        self.delay.as_mut().poll(cx)
    }
}
