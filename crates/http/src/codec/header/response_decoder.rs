//! HTTP response header decoding for the client side.

use bytes::{Buf, BytesMut};
use http::{Response, StatusCode};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::header::header_decoder::{DEFAULT_MAX_HEADER_BYTES, decode_head, parse_payload};
use crate::codec::start_line::parse_status_line;
use crate::protocol::{ParseError, PayloadSize, ResponseHead};

/// Decodes a response head and the payload size it announces.
///
/// A response without `Content-Length` carries no body, as do `1xx`, `204` and
/// `304` responses regardless of their headers.
#[derive(Debug, Clone, Copy)]
pub struct ResponseHeaderDecoder {
    max_header_bytes: usize,
}

impl ResponseHeaderDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_header_bytes(max_header_bytes: usize) -> Self {
        Self { max_header_bytes }
    }
}

impl Default for ResponseHeaderDecoder {
    fn default() -> Self {
        Self { max_header_bytes: DEFAULT_MAX_HEADER_BYTES }
    }
}

impl Decoder for ResponseHeaderDecoder {
    type Item = (ResponseHead, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(head) = decode_head(src, self.max_header_bytes)? else {
            return Ok(None);
        };

        let (version, status) = parse_status_line(&src[..head.line_end])?;
        src.advance(head.len);

        let mut response = Response::new(());
        *response.status_mut() = status;
        *response.version_mut() = version;
        *response.headers_mut() = head.headers;

        let payload_size = if has_no_body(status) { PayloadSize::new_empty() } else { parse_payload(response.headers())? };

        trace!(status = %status, version = ?version, ?payload_size, "decoded response head");
        Ok(Some((response, payload_size)))
    }
}

fn has_no_body(status: StatusCode) -> bool {
    status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED
}
