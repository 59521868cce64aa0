//! Transports a [`Context`](super::Context) can be connected through.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use rustls::ClientConfig;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Byte stream a context can drive.
pub trait IoStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> IoStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Type-erased transport, plaintext or TLS.
pub type BoxedStream = Box<dyn IoStream>;

/// Establishes outbound transports.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, address: SocketAddr) -> io::Result<BoxedStream>;
}

/// Plain TCP connector.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, address: SocketAddr) -> io::Result<BoxedStream> {
        let stream = connect_tcp(address).await?;
        Ok(Box::new(stream))
    }
}

/// TCP connector that negotiates a TLS session before handing the stream out.
#[derive(Clone)]
pub struct TlsConnector {
    inner: tokio_rustls::TlsConnector,
    server_name: ServerName<'static>,
}

impl TlsConnector {
    pub fn new(config: Arc<ClientConfig>, server_name: ServerName<'static>) -> Self {
        Self { inner: tokio_rustls::TlsConnector::from(config), server_name }
    }
}

impl fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConnector").field("server_name", &self.server_name).finish_non_exhaustive()
    }
}

#[async_trait]
impl Connector for TlsConnector {
    async fn connect(&self, address: SocketAddr) -> io::Result<BoxedStream> {
        let stream = connect_tcp(address).await?;
        match self.inner.connect(self.server_name.clone(), stream).await {
            Ok(tls_stream) => {
                debug!(%address, "tls session established");
                Ok(Box::new(tls_stream))
            }
            Err(e) => {
                warn!(%address, cause = %e, "tls handshake failed");
                Err(e)
            }
        }
    }
}

async fn connect_tcp(address: SocketAddr) -> io::Result<TcpStream> {
    let stream = TcpStream::connect(address).await?;
    stream.set_nodelay(true)?;
    Ok(stream)
}
