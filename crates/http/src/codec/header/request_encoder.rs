//! HTTP request header encoding for the client side.

use bytes::{BufMut, BytesMut};
use http::{HeaderValue, Request, Version, header};
use std::io::Write;
use tokio_util::codec::Encoder;
use tracing::error;

use crate::codec::header::header_encoder::FastWrite;
use crate::protocol::{PayloadSize, SendError};

const INIT_HEADER_SIZE: usize = 1024;

/// Serializes the request line and header fields of a request.
///
/// `Content-Length` is written from the given [`PayloadSize`] whenever the payload
/// is not empty, and a `Host` header is derived from the URI authority when the
/// request does not carry one.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestHeaderEncoder;

impl<B> Encoder<(&Request<B>, PayloadSize)> for RequestHeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (&Request<B>, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (request, payload_size) = item;

        let protocol = match request.version() {
            Version::HTTP_11 => "HTTP/1.1",
            Version::HTTP_10 => "HTTP/1.0",
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(SendError::UnsupportedVersion(v));
            }
        };

        let target = request.uri().path_and_query().map_or("/", |pq| pq.as_str());

        dst.reserve(INIT_HEADER_SIZE);
        write!(FastWrite(dst), "{} {} {}\r\n", request.method(), target, protocol)?;

        let headers = request.headers();
        if !headers.contains_key(header::HOST) {
            if let Some(authority) = request.uri().authority() {
                put_field(dst, header::HOST.as_str(), authority.as_str().as_bytes());
            }
        }

        for (name, value) in headers {
            if name == header::CONTENT_LENGTH {
                continue;
            }
            put_field(dst, name.as_str(), value.as_bytes());
        }

        if !payload_size.is_empty() {
            let length = HeaderValue::from(payload_size.length());
            put_field(dst, header::CONTENT_LENGTH.as_str(), length.as_bytes());
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

fn put_field(dst: &mut BytesMut, name: &str, value: &[u8]) {
    dst.put_slice(name.as_bytes());
    dst.put_slice(b": ");
    dst.put_slice(value);
    dst.put_slice(b"\r\n");
}
