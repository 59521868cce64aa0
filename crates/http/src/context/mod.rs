//! Completion-event context around one live connection.
//!
//! A [`Context`] owns the transport of a single connection, plaintext or TLS, and
//! is the only way the client and server engines touch it. It carries:
//!
//! - a read buffer filled by [`Context::post_read`] and drained with [`Context::read`]
//!   or looked at with [`Context::peek`]
//! - a write buffer staged with [`Context::write`] and flushed by [`Context::post_write`]
//! - a single deadline acting as idle/operation timer
//! - one payload owned by whichever engine drives the connection
//!
//! Every `post_*` operation takes `&mut self`, so at most one operation is
//! outstanding per context. The deadline races the operation; when the timer wins
//! the operation future is dropped and [`Completion::Timeout`] is reported
//! instead of the I/O result.
//!
//! The [`driver`] turns these completions into the event callbacks of an
//! [`EventHandler`].

mod connector;
mod driver;

pub use connector::{BoxedStream, Connector, IoStream, TcpConnector, TlsConnector};
pub use driver::{EventHandler, Exit, Operation};

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, trace};

/// Capacity reserved in the read buffer before every read
const READ_UNIT: usize = 8 * 1024;

/// Outcome of one asynchronous operation on a [`Context`].
#[derive(Debug)]
pub enum Completion {
    /// The operation finished, moving this many bytes; `0` on a read means the
    /// peer closed the transport.
    Done(usize),
    /// The deadline fired before the operation finished.
    Timeout,
    /// The transport reported an error.
    Failed(io::Error),
}

impl Completion {
    /// Whether the operation moved at least one byte.
    pub fn is_success(&self) -> bool {
        matches!(self, Completion::Done(n) if *n > 0)
    }
}

/// One connection plus its buffers, its timer and the payload of the engine
/// driving it.
pub struct Context<S, P = ()> {
    stream: Option<S>,
    read_buf: BytesMut,
    write_buf: BytesMut,
    deadline: Option<Instant>,
    peer: Option<SocketAddr>,
    payload: P,
}

impl<S, P> std::fmt::Debug for Context<S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("open", &self.stream.is_some())
            .field("peer", &self.peer)
            .field("buffered", &self.read_buf.len())
            .field("pending_write", &self.write_buf.len())
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl<S, P> Context<S, P> {
    /// Wraps an already established transport.
    pub fn new(stream: S, payload: P) -> Self {
        Self {
            stream: Some(stream),
            read_buf: BytesMut::with_capacity(READ_UNIT),
            write_buf: BytesMut::new(),
            deadline: None,
            peer: None,
            payload,
        }
    }

    /// Creates a context with no transport yet, to be connected later.
    pub fn pending(payload: P) -> Self {
        Self {
            stream: None,
            read_buf: BytesMut::new(),
            write_buf: BytesMut::new(),
            deadline: None,
            peer: None,
            payload,
        }
    }

    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Address of the remote side, if known.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Whether the context still holds a transport.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Arms the timer to fire `timeout` from now, replacing any earlier deadline.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.deadline = Some(Instant::now() + timeout);
    }

    pub fn cancel_timeout(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Moves up to `buf.len()` buffered bytes into `buf`, returning how many were moved.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = self.peek(buf);
        self.read_buf.advance(n);
        n
    }

    /// Takes up to `max` buffered bytes.
    pub fn read_bytes(&mut self, max: usize) -> Bytes {
        let n = max.min(self.read_buf.len());
        self.read_buf.split_to(n).freeze()
    }

    /// Copies up to `buf.len()` buffered bytes into `buf` without consuming them.
    pub fn peek(&self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.read_buf.len());
        buf[..n].copy_from_slice(&self.read_buf[..n]);
        n
    }

    /// Number of received bytes not consumed yet.
    pub fn buffered(&self) -> usize {
        self.read_buf.len()
    }

    pub fn read_buf_mut(&mut self) -> &mut BytesMut {
        &mut self.read_buf
    }

    /// Stages `data` to be sent by the next [`post_write`](Context::post_write).
    pub fn write(&mut self, data: &[u8]) {
        self.write_buf.extend_from_slice(data);
    }

    pub fn write_buf_mut(&mut self) -> &mut BytesMut {
        &mut self.write_buf
    }

    /// Number of staged bytes not sent yet.
    pub fn pending_write(&self) -> usize {
        self.write_buf.len()
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut P {
        &mut self.payload
    }

    /// Borrows the payload together with the write buffer.
    pub fn payload_and_write_buf(&mut self) -> (&mut P, &mut BytesMut) {
        (&mut self.payload, &mut self.write_buf)
    }

    /// Replaces the payload, handing back the previous one.
    pub fn attach<Q>(self, payload: Q) -> (Context<S, Q>, P) {
        let Self { stream, read_buf, write_buf, deadline, peer, payload: previous } = self;
        (Context { stream, read_buf, write_buf, deadline, peer, payload }, previous)
    }

    /// Takes the payload out, leaving a context that can be parked or closed.
    pub fn detach(self) -> (Context<S>, P) {
        self.attach(())
    }

    /// Clears both buffers and the timer while keeping the transport.
    pub fn reset(&mut self) {
        self.read_buf.clear();
        self.write_buf.clear();
        self.deadline = None;
    }

    pub(crate) fn set_stream(&mut self, stream: S) {
        self.stream = Some(stream);
    }
}

impl<S, P> Context<S, P>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Reads whatever the transport has next into the read buffer.
    pub async fn post_read(&mut self) -> Completion {
        let deadline = self.deadline;
        let Some(stream) = self.stream.as_mut() else {
            return Completion::Failed(io::ErrorKind::NotConnected.into());
        };

        let read_buf = &mut self.read_buf;
        read_buf.reserve(READ_UNIT);
        let completion = with_deadline(deadline, async move {
            match stream.read_buf(read_buf).await {
                Ok(n) => Completion::Done(n),
                Err(e) => Completion::Failed(e),
            }
        })
        .await;

        trace!(?completion, buffered = self.read_buf.len(), "read completed");
        completion
    }

    /// Sends everything staged in the write buffer.
    ///
    /// On failure or timeout the unsent rest stays in the buffer.
    pub async fn post_write(&mut self) -> Completion {
        let deadline = self.deadline;
        let Some(stream) = self.stream.as_mut() else {
            return Completion::Failed(io::ErrorKind::NotConnected.into());
        };

        let write_buf = &mut self.write_buf;
        let len = write_buf.len();
        let completion = with_deadline(deadline, async move {
            if let Err(e) = stream.write_all_buf(write_buf).await {
                return Completion::Failed(e);
            }
            match stream.flush().await {
                Ok(()) => Completion::Done(len),
                Err(e) => Completion::Failed(e),
            }
        })
        .await;

        trace!(?completion, "write completed");
        completion
    }

    /// Shuts the transport down and drops it; further operations fail.
    pub async fn close(&mut self) {
        self.deadline = None;
        self.read_buf.clear();
        self.write_buf.clear();
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!(cause = %e, "shutdown transport failed");
            }
        }
    }
}

impl<P> Context<BoxedStream, P> {
    /// Establishes the transport through `connector`, racing the armed deadline.
    pub async fn connect<C>(&mut self, connector: &C, address: SocketAddr) -> Completion
    where
        C: Connector + ?Sized,
    {
        let completion = with_deadline(self.deadline, async {
            match connector.connect(address).await {
                Ok(stream) => {
                    self.set_stream(stream);
                    Completion::Done(0)
                }
                Err(e) => Completion::Failed(e),
            }
        })
        .await;

        if matches!(completion, Completion::Done(_)) {
            self.peer = Some(address);
        }
        completion
    }
}

async fn with_deadline<F>(deadline: Option<Instant>, operation: F) -> Completion
where
    F: Future<Output = Completion>,
{
    match deadline {
        Some(deadline) => {
            tokio::select! {
                completion = operation => completion,
                () = sleep_until(deadline) => Completion::Timeout,
            }
        }
        None => operation.await,
    }
}
