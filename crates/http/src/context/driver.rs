//! Event-callback driver for a [`Context`].
//!
//! An engine implements [`EventHandler`]; every callback returns the next
//! [`Operation`], and [`Context::drive`] performs it and feeds the completion into
//! the matching callback. A zero-length read, a transport error or a fired timer
//! closes the context; the handler sees the timer through
//! [`EventHandler::on_timeout`] right before the close.

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, trace};

use super::{BoxedStream, Completion, Connector, Context};

/// What the driver should do next with a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Read into the read buffer, then call `on_pre_read` and `on_read_completed`
    Read,
    /// Send the write buffer, then call `on_write_completed`
    Write,
    /// Close the transport and stop
    Close,
    /// Stop while keeping the transport open for reuse
    Park,
}

/// How [`Context::drive`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// A handler returned [`Operation::Park`]; the transport is still open.
    Parked,
    /// The transport has been closed.
    Closed,
}

/// Callbacks invoked as operations on a context complete.
///
/// Handlers only act on the connection through the context they are given.
pub trait EventHandler<S, P> {
    /// Called before a connect is issued; usually arms the connect timeout.
    fn on_pre_connect(&self, _ctx: &mut Context<S, P>) {}

    /// Called once the transport is established.
    fn on_connected(&self, ctx: &mut Context<S, P>) -> Operation;

    /// Called when data has arrived, before it is handed to `on_read_completed`.
    fn on_pre_read(&self, _ctx: &mut Context<S, P>) {}

    /// Called with the number of bytes a read added to the read buffer.
    fn on_read_completed(&self, ctx: &mut Context<S, P>, read: usize) -> Operation;

    /// Called with the number of bytes a write sent.
    fn on_write_completed(&self, ctx: &mut Context<S, P>, written: usize) -> Operation;

    /// Called when the timer fired; the driver closes the context afterwards.
    fn on_timeout(&self, _ctx: &mut Context<S, P>) {}
}

impl<S, P> Context<S, P>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Runs `operation` and every operation the handler asks for after it, until
    /// the handler parks the context or the transport is closed.
    pub async fn drive<H>(&mut self, handler: &H, operation: Operation) -> Exit
    where
        H: EventHandler<S, P> + ?Sized,
    {
        let mut operation = operation;
        loop {
            trace!(?operation, "drive context");
            operation = match operation {
                Operation::Read => match self.post_read().await {
                    Completion::Done(0) => {
                        debug!(peer = ?self.peer(), "peer closed transport");
                        break;
                    }
                    Completion::Done(n) => {
                        handler.on_pre_read(self);
                        handler.on_read_completed(self, n)
                    }
                    completion => {
                        self.fail(handler, completion);
                        break;
                    }
                },
                Operation::Write => match self.post_write().await {
                    Completion::Done(n) => handler.on_write_completed(self, n),
                    completion => {
                        self.fail(handler, completion);
                        break;
                    }
                },
                Operation::Close => break,
                Operation::Park => {
                    self.cancel_timeout();
                    return Exit::Parked;
                }
            };
        }

        self.close().await;
        Exit::Closed
    }

    fn fail<H>(&mut self, handler: &H, completion: Completion)
    where
        H: EventHandler<S, P> + ?Sized,
    {
        match completion {
            Completion::Timeout => {
                debug!(peer = ?self.peer(), "context timed out");
                handler.on_timeout(self);
            }
            Completion::Failed(e) => debug!(peer = ?self.peer(), cause = %e, "transport failed"),
            Completion::Done(_) => {}
        }
    }
}

impl<P> Context<BoxedStream, P> {
    /// Connects through `connector` and, once connected, drives the context with
    /// the operations `handler` asks for.
    pub async fn dial<C, H>(&mut self, connector: &C, address: SocketAddr, handler: &H) -> Exit
    where
        C: Connector + ?Sized,
        H: EventHandler<BoxedStream, P> + ?Sized,
    {
        handler.on_pre_connect(self);
        match self.connect(connector, address).await {
            Completion::Done(_) => {
                let operation = handler.on_connected(self);
                self.drive(handler, operation).await
            }
            completion => {
                self.fail(handler, completion);
                self.close().await;
                Exit::Closed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};

    /// Answers every read with an echo, parks after `limit` bytes.
    struct Echo {
        limit: usize,
    }

    impl EventHandler<DuplexStream, usize> for Echo {
        fn on_connected(&self, _ctx: &mut Context<DuplexStream, usize>) -> Operation {
            Operation::Read
        }

        fn on_read_completed(&self, ctx: &mut Context<DuplexStream, usize>, _read: usize) -> Operation {
            let data = ctx.read_bytes(usize::MAX);
            ctx.write(&data);
            Operation::Write
        }

        fn on_write_completed(&self, ctx: &mut Context<DuplexStream, usize>, written: usize) -> Operation {
            *ctx.payload_mut() += written;
            if *ctx.payload() >= self.limit { Operation::Park } else { Operation::Read }
        }

        fn on_timeout(&self, ctx: &mut Context<DuplexStream, usize>) {
            *ctx.payload_mut() = usize::MAX;
        }
    }

    #[tokio::test]
    async fn drive_until_parked() {
        let (client, mut server) = duplex(64);
        let mut ctx = Context::new(client, 0usize);

        server.write_all(b"abcd").await.unwrap();
        let exit = ctx.drive(&Echo { limit: 4 }, Operation::Read).await;

        assert_eq!(exit, Exit::Parked);
        assert!(ctx.is_open());
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"abcd");
    }

    #[tokio::test]
    async fn peer_close_closes_context() {
        let (client, server) = duplex(64);
        let mut ctx = Context::new(client, 0usize);
        drop(server);

        let exit = ctx.drive(&Echo { limit: 4 }, Operation::Read).await;
        assert_eq!(exit, Exit::Closed);
        assert!(!ctx.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_reaches_handler_then_closes() {
        let (client, _server) = duplex(64);
        let mut ctx = Context::new(client, 0usize);
        ctx.set_timeout(Duration::from_secs(1));

        let exit = ctx.drive(&Echo { limit: 4 }, Operation::Read).await;
        assert_eq!(exit, Exit::Closed);
        assert_eq!(*ctx.payload(), usize::MAX);
    }
}
