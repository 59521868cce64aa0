//! HTTP response header handling implementation.
//!
//! The header portion of a response is a `http::Response<()>`; the body is
//! transferred separately by the engines.

use http::{Response, Version};

use crate::protocol::request::has_connection_token;

/// Type alias for HTTP response headers.
///
/// This type represents the header portion of an HTTP response, using
/// `http::Response<()>` with an empty body placeholder.
pub type ResponseHead = Response<()>;

/// Whether the peer asked to close the transport after this response.
///
/// A response with an unknown version is treated as closing.
pub fn wants_close(head: &ResponseHead) -> bool {
    match head.version() {
        Version::HTTP_11 => has_connection_token(head.headers(), "close"),
        Version::HTTP_10 => !has_connection_token(head.headers(), "keep-alive"),
        _ => true,
    }
}
