//! HTTP header block processing.
//!
//! - [`HeaderDecoder`]: request heads read by the server
//! - [`ResponseHeaderDecoder`]: response heads read by the client
//! - [`HeaderEncoder`]: response heads written by the server
//! - [`RequestHeaderEncoder`]: request heads written by the client
//!
//! All decoders enforce a configurable limit on the size of the head and a fixed
//! limit of 64 header fields.

mod header_decoder;
mod header_encoder;
mod request_encoder;
mod response_decoder;

pub use header_decoder::DEFAULT_MAX_HEADER_BYTES;
pub use header_decoder::HeaderDecoder;
pub use header_encoder::HeaderEncoder;
pub use request_encoder::RequestHeaderEncoder;
pub use response_decoder::ResponseHeaderDecoder;
