//! HTTP response header encoding.
//!
//! Serializes the status line and header fields of a [`ResponseHead`], setting
//! `Content-Length` from the [`PayloadSize`] that the body will be sent with.

use crate::protocol::{PayloadSize, ResponseHead, SendError};

use bytes::{BufMut, BytesMut};

use http::{HeaderValue, Version, header};
use std::io;
use std::io::Write;
use tokio_util::codec::Encoder;
use tracing::error;

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 4 * 1024;

/// Encoder for HTTP response headers implementing the [`Encoder`] trait.
#[derive(Debug)]
pub struct HeaderEncoder;

impl Encoder<(ResponseHead, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    /// Encodes the response head into `dst`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP version is neither HTTP/1.0 nor HTTP/1.1.
    fn encode(&mut self, item: (ResponseHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut header, payload_size) = item;

        let protocol = match header.version() {
            Version::HTTP_11 => "HTTP/1.1",
            Version::HTTP_10 => "HTTP/1.0",
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(SendError::UnsupportedVersion(v));
            }
        };

        dst.reserve(INIT_HEADER_SIZE);
        write!(
            FastWrite(dst),
            "{} {} {}\r\n",
            protocol,
            header.status().as_str(),
            header.status().canonical_reason().unwrap_or_default()
        )?;

        header.headers_mut().insert(header::CONTENT_LENGTH, HeaderValue::from(payload_size.length()));

        for (header_name, header_value) in header.headers() {
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// Writer adapter putting formatted output straight into a `BytesMut`.
pub(crate) struct FastWrite<'a>(pub(crate) &'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Response, StatusCode};

    #[test]
    fn encode_partial_content() {
        let head = Response::builder()
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_RANGE, "bytes 0-99/20000")
            .body(())
            .unwrap();

        let mut dst = BytesMut::new();
        HeaderEncoder.encode((head, PayloadSize::new_length(100)), &mut dst).unwrap();

        let text = std::str::from_utf8(&dst).unwrap();
        assert!(text.starts_with("HTTP/1.1 206 Partial Content\r\n"));
        assert!(text.contains("content-range: bytes 0-99/20000\r\n"));
        assert!(text.contains("content-length: 100\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn encode_empty_overrides_length() {
        let head = Response::builder().header(header::CONTENT_LENGTH, "999").body(()).unwrap();

        let mut dst = BytesMut::new();
        HeaderEncoder.encode((head, PayloadSize::new_empty()), &mut dst).unwrap();

        let text = std::str::from_utf8(&dst).unwrap();
        assert!(text.contains("content-length: 0\r\n"));
        assert!(!text.contains("999"));
    }

    #[test]
    fn reject_unknown_version() {
        let head = Response::builder().version(Version::HTTP_09).body(()).unwrap();
        let mut dst = BytesMut::new();
        assert!(HeaderEncoder.encode((head, PayloadSize::new_empty()), &mut dst).is_err());
    }
}
