//! HTTP/1.1 codecs for both sides of an exchange.
//!
//! - Server side: [`RequestDecoder`] (head plus `Content-Length` body) and
//!   [`HeaderEncoder`] for response heads.
//! - Client side: [`RequestHeaderEncoder`] for request heads and
//!   [`ResponseHeaderDecoder`] for response heads; the client reads bodies itself.
//!
//! Start lines are parsed by hand so that an unknown HTTP version is reported
//! instead of rejected, header fields are parsed with `httparse`.
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use micro_transfer::codec::RequestDecoder;
//! use micro_transfer::protocol::Message;
//! use tokio_util::codec::Decoder;
//!
//! let mut decoder = RequestDecoder::new();
//! let mut buffer = BytesMut::from("GET /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n");
//! let message = decoder.decode(&mut buffer).unwrap();
//! assert!(matches!(message, Some(Message::Header(_))));
//! ```

mod body;
mod header;
mod request_decoder;
mod start_line;

pub use body::{LengthDecoder, PayloadDecoder};
pub use header::{
    DEFAULT_MAX_HEADER_BYTES, HeaderDecoder, HeaderEncoder, RequestHeaderEncoder, ResponseHeaderDecoder,
};
pub use request_decoder::RequestDecoder;
