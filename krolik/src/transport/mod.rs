//! Implements low level transport framing
//!
//! The transport owns the socket, runs the [`FrameCodec`] over it through
//! `tokio_util::codec::Framed`, and enforces the inbound idle timeout. The
//! protocol engine above only ever sees [`Frame`] values.

use std::{task::Poll, time::Duration};

use futures_util::{Future, Sink, Stream};
use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Framed;

use crate::frames::{Frame, FrameCodec};
use crate::util::IdleTimeout;

pub mod protocol_header;
pub use protocol_header::ProtocolHeader;

mod error;
pub use error::Error;

pin_project! {
    /// Frame-level view of a byte stream
    #[derive(Debug)]
    pub struct Transport<Io> {
        #[pin]
        framed: Framed<Io, FrameCodec>,
        #[pin]
        idle_timeout: Option<IdleTimeout>,
    }
}

impl<Io> Transport<Io>
where
    Io: AsyncRead + AsyncWrite + Unpin,
{
    /// Binds the codec over the socket.
    ///
    /// `frame_max` should be [`FRAME_MIN_SIZE`](krolik_types::constants::FRAME_MIN_SIZE)
    /// until `connection.tune` has negotiated the real bound.
    pub fn bind(io: Io, frame_max: u32, idle_timeout: Option<Duration>) -> Self {
        let framed = Framed::new(io, FrameCodec::new(frame_max));
        let idle_timeout = idle_timeout
            .filter(|duration| !duration.is_zero())
            .map(IdleTimeout::new);

        Self {
            framed,
            idle_timeout,
        }
    }

    /// Writes the protocol header; the server replies with
    /// `connection.start` (or its own header on version mismatch, which the
    /// codec reports as an error).
    pub async fn send_protocol_header(
        io: &mut Io,
        header: ProtocolHeader,
    ) -> Result<(), std::io::Error> {
        let buf: [u8; 8] = header.into();
        io.write_all(&buf).await
    }

    /// Applies the frame-max negotiated by `connection.tune`
    pub fn set_frame_max(&mut self, frame_max: u32) -> &mut Self {
        self.framed.codec_mut().set_frame_max(frame_max);
        self
    }

    /// Arms (or disarms, with zero) the inbound idle timeout
    pub fn set_idle_timeout(&mut self, duration: Duration) -> &mut Self {
        self.idle_timeout = match duration.is_zero() {
            true => None,
            false => Some(IdleTimeout::new(duration)),
        };
        self
    }
}

impl<Io> Sink<Frame> for Transport<Io>
where
    Io: AsyncRead + AsyncWrite + Unpin,
{
    type Error = Error;

    fn poll_ready(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        let this = self.project();
        this.framed.poll_ready(cx).map_err(Into::into)
    }

    fn start_send(self: std::pin::Pin<&mut Self>, item: Frame) -> Result<(), Self::Error> {
        let this = self.project();
        this.framed.start_send(item).map_err(Into::into)
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        let this = self.project();
        this.framed.poll_flush(cx).map_err(Into::into)
    }

    fn poll_close(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        let this = self.project();
        this.framed.poll_close(cx).map_err(Into::into)
    }
}

impl<Io> Stream for Transport<Io>
where
    Io: AsyncRead + AsyncWrite + Unpin,
{
    type Item = Result<Frame, Error>;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        let this = self.project();

        match this.framed.poll_next(cx) {
            Poll::Ready(next) => {
                // any inbound traffic proves the peer alive
                if let Some(mut delay) = this.idle_timeout.as_pin_mut() {
                    delay.reset();
                }
                Poll::Ready(next.map(|item| item.map_err(Into::into)))
            }
            Poll::Pending => {
                if let Some(delay) = this.idle_timeout.as_pin_mut() {
                    if delay.poll(cx).is_ready() {
                        return Poll::Ready(Some(Err(Error::IdleTimeout)));
                    }
                }
                Poll::Pending
            }
        }
    }
}
