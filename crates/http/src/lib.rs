//! An asynchronous HTTP/1.1 transfer engine.
//!
//! This crate turns raw byte connections into framed HTTP/1.1 exchanges on both
//! sides of a connection, built on top of tokio:
//!
//! - the **client** drives one outbound request at a time per handle through
//!   `Ready -> Connecting -> Requesting -> Responding` to a terminal status,
//!   reusing kept-alive connections and retrying once on failure
//! - the **server** drives every accepted connection through a state machine
//!   that reads a request, dispatches it, writes the response (full content, a
//!   single range or `multipart/byteranges`) and loops while keep-alive allows
//!
//! Both run on top of the same [`context::Context`] abstraction, which owns one
//! transport (plain TCP or TLS) together with its buffers, its single idle timer
//! and the state of the engine driving it.
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use http::{Request, header};
//! use micro_transfer::client::{HttpClient, RequestHandle};
//! use micro_transfer::server::{FileDispatcher, HttpServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = HttpServer::builder()
//!         .address("127.0.0.1:0")
//!         .dispatcher(FileDispatcher::new("./public"))
//!         .build()?;
//!     let address = server.startup().await?;
//!
//!     let request = Request::get("/video.mp4").header(header::RANGE, "bytes=0-1023").body(Bytes::new())?;
//!     let handle = RequestHandle::builder(address, request).build();
//!     let handle = HttpClient::plain().post(handle).await?;
//!     println!("{} -> {} bytes", handle.status(), handle.response_body().len());
//!
//!     server.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`context`]: completion-event context, connectors and the event driver
//! - [`client`]: request handles, the client engine and deferred results
//! - [`server`]: listener, connection state machine and dispatch
//! - [`protocol`]: message types, byte ranges, cookies, dates and errors
//! - [`codec`]: HTTP/1.1 head encoding and decoding, `Content-Length` bodies
//! - [`tls`]: `rustls` configuration helpers
//!
//! # Limitations
//!
//! - HTTP/1.0 and HTTP/1.1 only; other versions are answered and closed
//! - bodies are framed by `Content-Length`, chunked transfer-encoding is refused
//! - maximum number of headers: 64

pub mod client;
pub mod codec;
pub mod context;
pub mod protocol;
pub mod server;
pub mod tls;

mod utils;
pub(crate) use utils::ensure;
