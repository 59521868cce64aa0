use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::codec::DEFAULT_MAX_HEADER_BYTES;
use crate::server::{Dispatcher, HttpServer};

pub const DEFAULT_KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_BODY_BYTES: u64 = 16 * 1024 * 1024;

/// Limits and timeouts applied to every accepted connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Idle timer of a connection, re-armed for every request and body operation
    pub keepalive_timeout: Duration,
    /// Time allowed for a TLS handshake after accept
    pub handshake_timeout: Duration,
    pub max_header_bytes: usize,
    pub max_body_bytes: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            keepalive_timeout: DEFAULT_KEEPALIVE_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("address must be set")]
    MissingAddress,

    #[error("dispatcher must be set")]
    MissingDispatcher,

    #[error("invalid address: {source}")]
    InvalidAddress { source: std::io::Error },

    #[error("bind {address} failed: {source}")]
    Bind { address: SocketAddr, source: std::io::Error },

    #[error("server already started")]
    AlreadyStarted,
}

pub struct ServerBuilder {
    address: Option<Result<Vec<SocketAddr>, std::io::Error>>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    config: ConnectionConfig,
    tls: Option<Arc<rustls::ServerConfig>>,
}

impl ServerBuilder {
    pub(crate) fn new() -> Self {
        Self { address: None, dispatcher: None, config: ConnectionConfig::default(), tls: None }
    }

    pub fn address<A: ToSocketAddrs>(mut self, address: A) -> Self {
        self.address = Some(address.to_socket_addrs().map(Iterator::collect));
        self
    }

    pub fn dispatcher(mut self, dispatcher: impl Dispatcher + 'static) -> Self {
        self.dispatcher = Some(Arc::new(dispatcher));
        self
    }

    pub fn keepalive_timeout(mut self, timeout: Duration) -> Self {
        self.config.keepalive_timeout = timeout;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    pub fn max_header_bytes(mut self, max_header_bytes: usize) -> Self {
        self.config.max_header_bytes = max_header_bytes;
        self
    }

    pub fn max_body_bytes(mut self, max_body_bytes: u64) -> Self {
        self.config.max_body_bytes = max_body_bytes;
        self
    }

    /// Serves over TLS with `config`; every accepted socket is handshaken first.
    pub fn tls(mut self, config: Arc<rustls::ServerConfig>) -> Self {
        self.tls = Some(config);
        self
    }

    pub fn build(self) -> Result<HttpServer, ServerError> {
        let address = self.address.ok_or(ServerError::MissingAddress)?;
        let address = address.map_err(|source| ServerError::InvalidAddress { source })?;
        if address.is_empty() {
            return Err(ServerError::MissingAddress);
        }
        let dispatcher = self.dispatcher.ok_or(ServerError::MissingDispatcher)?;
        Ok(HttpServer::new(address, dispatcher, self.config, self.tls))
    }
}

impl std::fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("address", &self.address)
            .field("config", &self.config)
            .field("tls", &self.tls.is_some())
            .finish_non_exhaustive()
    }
}
