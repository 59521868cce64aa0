//! Server connection engine.
//!
//! [`HttpServer`] accepts sockets, optionally negotiates TLS, and runs one
//! [`HttpConnection`] state machine per socket. What a request is answered with is
//! decided by a [`Dispatcher`] working on the [`ConnectionRecord`] of the
//! connection: either an in-memory body or a file, which is then served with
//! `Range` support (`206 Partial Content`, `multipart/byteranges` for several
//! ranges).
//!
//! # Example
//!
//! ```no_run
//! use micro_transfer::server::{FileDispatcher, HttpServer};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = HttpServer::builder()
//!     .address("127.0.0.1:8080")
//!     .dispatcher(FileDispatcher::new("./public"))
//!     .build()?;
//!
//! server.startup().await?;
//! tokio::signal::ctrl_c().await?;
//! server.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod builder;
mod connection;
mod dispatch;
mod listener;
mod multipart;
mod record;

pub use builder::{
    ConnectionConfig, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_KEEPALIVE_TIMEOUT, DEFAULT_MAX_BODY_BYTES, ServerBuilder,
    ServerError,
};
pub use connection::HttpConnection;
pub use dispatch::{Dispatcher, DispatcherFn, FileDispatcher, content_type_for, make_dispatcher};
pub use listener::HttpServer;
pub use record::{ConnType, ConnectionRecord};
