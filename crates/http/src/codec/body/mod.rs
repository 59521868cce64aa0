//! HTTP body decoding.
//!
//! Message bodies are framed by `Content-Length` only:
//!
//! - [`LengthDecoder`]: Processes fixed-length payloads
//! - [`PayloadDecoder`]: Chooses between a fixed-length payload and no body

mod length_decoder;
mod payload_decoder;

pub use length_decoder::LengthDecoder;
pub use payload_decoder::PayloadDecoder;
