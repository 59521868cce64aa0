//! The listening side: binding, accepting and handing sockets to connections.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::server::{ConnectionConfig, Dispatcher, HttpConnection, ServerBuilder, ServerError};

/// An HTTP/1.1 server, plaintext or TLS.
///
/// [`startup`](Self::startup) binds and starts accepting in the background,
/// [`shutdown`](Self::shutdown) stops accepting, drops open connections and waits
/// for their tasks to end. Dropping the server stops it without waiting.
pub struct HttpServer {
    address: Vec<SocketAddr>,
    dispatcher: Arc<dyn Dispatcher>,
    config: Arc<ConnectionConfig>,
    tls: Option<TlsAcceptor>,
    token: CancellationToken,
    tracker: TaskTracker,
    local_addr: Option<SocketAddr>,
}

impl HttpServer {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub(crate) fn new(
        address: Vec<SocketAddr>,
        dispatcher: Arc<dyn Dispatcher>,
        config: ConnectionConfig,
        tls: Option<Arc<rustls::ServerConfig>>,
    ) -> Self {
        Self {
            address,
            dispatcher,
            config: Arc::new(config),
            tls: tls.map(TlsAcceptor::from),
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
            local_addr: None,
        }
    }

    /// Binds the listener and spawns the accept loop on the current runtime,
    /// returning the bound address.
    pub async fn startup(&mut self) -> Result<SocketAddr, ServerError> {
        if self.local_addr.is_some() {
            return Err(ServerError::AlreadyStarted);
        }

        let first = self.address.first().copied().ok_or(ServerError::MissingAddress)?;
        let listener = TcpListener::bind(self.address.as_slice())
            .await
            .map_err(|source| ServerError::Bind { address: first, source })?;
        let local_addr = listener.local_addr().map_err(|source| ServerError::Bind { address: first, source })?;
        info!(address = %local_addr, tls = self.tls.is_some(), "start listening");

        self.tracker.spawn(accept_loop(
            listener,
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.config),
            self.tls.clone(),
            self.token.clone(),
            self.tracker.clone(),
        ));
        self.local_addr = Some(local_addr);
        Ok(local_addr)
    }

    /// The bound address once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Stops accepting, closes every open connection and waits for their tasks.
    pub async fn shutdown(&self) {
        self.token.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!(address = ?self.local_addr, "server stopped");
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl std::fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServer")
            .field("address", &self.address)
            .field("local_addr", &self.local_addr)
            .field("config", &self.config)
            .field("tls", &self.tls.is_some())
            .finish_non_exhaustive()
    }
}

async fn accept_loop(
    listener: TcpListener,
    dispatcher: Arc<dyn Dispatcher>,
    config: Arc<ConnectionConfig>,
    tls: Option<TlsAcceptor>,
    token: CancellationToken,
    tracker: TaskTracker,
) {
    loop {
        let (stream, remote) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            },
            () = token.cancelled() => {
                debug!("stop accepting");
                return;
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!(%remote, cause = %e, "set nodelay failed");
        }
        debug!(%remote, "accepted connection");

        let dispatcher = Arc::clone(&dispatcher);
        let config = Arc::clone(&config);
        let tls = tls.clone();
        let token = token.clone();
        tracker.spawn(async move {
            tokio::select! {
                () = serve(stream, remote, config, dispatcher, tls) => {}
                () = token.cancelled() => debug!(%remote, "connection dropped by shutdown"),
            }
        });
    }
}

async fn serve(
    stream: TcpStream,
    remote: SocketAddr,
    config: Arc<ConnectionConfig>,
    dispatcher: Arc<dyn Dispatcher>,
    tls: Option<TlsAcceptor>,
) {
    let Some(acceptor) = tls else {
        HttpConnection::new(stream, Some(remote), config, dispatcher).process().await;
        return;
    };

    match timeout(config.handshake_timeout, acceptor.accept(stream)).await {
        Ok(Ok(tls_stream)) => {
            debug!(%remote, "tls handshake finished");
            HttpConnection::new(tls_stream, Some(remote), config, dispatcher).process().await;
        }
        Ok(Err(e)) => warn!(%remote, cause = %e, "tls handshake failed"),
        Err(_elapsed) => warn!(%remote, "tls handshake timed out"),
    }
}
