//! HTTP request header decoding.
//!
//! Turns the raw bytes of a request head into a [`RequestHeader`] plus the
//! [`PayloadSize`] announced by `Content-Length`.
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum header size: 8KB by default, configurable per decoder
//!
//! The decoder works in three stages:
//!
//! 1. Locate and parse the request line (see [`start_line`](crate::codec::start_line))
//! 2. Parse the header fields with `httparse`
//! 3. Convert to a typed `http::Request` and derive the payload size

use bytes::{Buf, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, Request, header};
use httparse::{Error, Status};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::start_line::{find_line_end, parse_request_line};
use crate::ensure;
use crate::protocol::{ParseError, PayloadSize, RequestHeader};

/// Maximum number of headers allowed in a message
pub(crate) const MAX_HEADER_NUM: usize = 64;

/// Default maximum size in bytes allowed for the entire header section
pub const DEFAULT_MAX_HEADER_BYTES: usize = 8 * 1024;

/// Decoder for HTTP request headers implementing the [`Decoder`] trait.
#[derive(Debug, Clone, Copy)]
pub struct HeaderDecoder {
    max_header_bytes: usize,
    max_body_bytes: u64,
}

impl HeaderDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(max_header_bytes: usize, max_body_bytes: u64) -> Self {
        Self { max_header_bytes, max_body_bytes }
    }
}

impl Default for HeaderDecoder {
    fn default() -> Self {
        Self { max_header_bytes: DEFAULT_MAX_HEADER_BYTES, max_body_bytes: u64::MAX }
    }
}

impl Decoder for HeaderDecoder {
    type Item = (RequestHeader, PayloadSize);
    type Error = ParseError;

    /// Attempts to decode a request head from the provided bytes buffer.
    ///
    /// - `Ok(Some((header, payload_size)))` if a complete head was parsed and consumed
    /// - `Ok(None)` if more data is needed
    /// - `Err(ParseError)` if the head is malformed or exceeds a limit
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(head) = decode_head(src, self.max_header_bytes)? else {
            return Ok(None);
        };

        let (method, target, version) = parse_request_line(&src[..head.line_end])?;
        let mut builder = Request::builder().method(method).uri(target).version(version);
        if let Some(headers) = builder.headers_mut() {
            *headers = head.headers;
        }
        let request = builder.body(()).map_err(|_e| ParseError::InvalidUri)?;
        src.advance(head.len);

        let header = RequestHeader::from(request);
        let payload_size = parse_payload(header.headers())?;
        ensure!(
            payload_size.length() <= self.max_body_bytes,
            ParseError::too_large_body(payload_size.length(), self.max_body_bytes)
        );

        trace!(method = %header.method(), uri = %header.uri(), version = ?header.version(), "decoded request head");
        Ok(Some((header, payload_size)))
    }
}

/// A complete message head located at the front of a buffer.
pub(crate) struct RawHead {
    /// Index of the `\r\n` ending the start line
    pub(crate) line_end: usize,
    /// Length of the whole head including the empty line
    pub(crate) len: usize,
    pub(crate) headers: HeaderMap,
}

/// Locates the start line and parses the header fields that follow it, without
/// consuming anything from `src`.
pub(crate) fn decode_head(src: &BytesMut, max_header_bytes: usize) -> Result<Option<RawHead>, ParseError> {
    let Some(line_end) = find_line_end(src) else {
        ensure!(src.len() <= max_header_bytes, ParseError::too_large_header(src.len(), max_header_bytes));
        return Ok(None);
    };

    let fields_start = line_end + 2;
    let mut fields = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
    let parsed = httparse::parse_headers(&src[fields_start..], &mut fields).map_err(|e| match e {
        Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
        e => ParseError::invalid_header(e.to_string()),
    })?;

    match parsed {
        Status::Complete((offset, fields)) => {
            let len = fields_start + offset;
            ensure!(len <= max_header_bytes, ParseError::too_large_header(len, max_header_bytes));

            let mut headers = HeaderMap::with_capacity(fields.len());
            for field in fields {
                let name = HeaderName::from_bytes(field.name.as_bytes()).map_err(ParseError::invalid_header)?;
                let value = HeaderValue::from_bytes(field.value).map_err(ParseError::invalid_header)?;
                headers.append(name, value);
            }
            Ok(Some(RawHead { line_end, len, headers }))
        }
        Status::Partial => {
            ensure!(src.len() <= max_header_bytes, ParseError::too_large_header(src.len(), max_header_bytes));
            Ok(None)
        }
    }
}

/// Determines the payload size from the `Content-Length` header.
///
/// A missing header means an empty payload. `Transfer-Encoding` is not
/// supported and rejected.
pub(crate) fn parse_payload(headers: &HeaderMap) -> Result<PayloadSize, ParseError> {
    ensure!(
        !headers.contains_key(header::TRANSFER_ENCODING),
        ParseError::invalid_header("transfer-encoding is not supported")
    );

    let mut values = headers.get_all(header::CONTENT_LENGTH).iter();
    let Some(cl_value) = values.next() else {
        return Ok(PayloadSize::new_empty());
    };
    ensure!(
        values.all(|other| other == cl_value),
        ParseError::invalid_content_length("conflicting content-length values")
    );

    let cl_str = cl_value.to_str().map_err(|_e| ParseError::invalid_content_length("value can't to_str"))?;
    let length =
        cl_str.trim().parse::<u64>().map_err(|_e| ParseError::invalid_content_length(format!("value {cl_str} is not u64")))?;

    Ok(PayloadSize::new_length(length))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, Version};
    use indoc::indoc;

    #[test]
    fn test_bytes_mut_lens() {
        let str = indoc! {r##"
        GET /index.html HTTP/1.1
        Host: 127.0.0.1:8080
        User-Agent: curl/7.79.1
        Accept: */*

        123"##};
        let mut bytes = BytesMut::from(str.replace('\n', "\r\n").as_str());

        let result = HeaderDecoder::new().decode(&mut bytes).unwrap();

        assert!(result.is_some());
        assert_eq!(&bytes[..], &b"123"[..]);
    }

    #[test]
    fn from_curl() {
        let str = indoc! {r##"
        GET /index.html HTTP/1.1
        Host: 127.0.0.1:8080
        User-Agent: curl/7.79.1
        Accept: */*

        "##};
        let mut buf = BytesMut::from(str.replace('\n', "\r\n").as_str());

        let (header, payload_size) = HeaderDecoder::new().decode(&mut buf).unwrap().unwrap();

        assert!(payload_size.is_empty());
        assert!(buf.is_empty());

        assert_eq!(header.method(), &Method::GET);
        assert_eq!(header.version(), Version::HTTP_11);
        assert_eq!(header.uri().path(), "/index.html");
        assert_eq!(header.uri().query(), None);
        assert_eq!(header.headers().len(), 3);
        assert_eq!(header.headers().get(http::header::HOST), Some(&HeaderValue::from_static("127.0.0.1:8080")));
        assert_eq!(header.headers().get(http::header::USER_AGENT), Some(&HeaderValue::from_static("curl/7.79.1")));
    }

    #[test]
    fn with_content_length() {
        let mut buf = BytesMut::from("POST /upload?a=1 HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello");

        let (header, payload_size) = HeaderDecoder::new().decode(&mut buf).unwrap().unwrap();

        assert_eq!(header.method(), &Method::POST);
        assert_eq!(header.uri().query(), Some("a=1"));
        assert_eq!(payload_size, PayloadSize::Length(5));
        assert_eq!(&buf[..], b"hello");
    }

    #[test]
    fn partial_head_needs_more() {
        let mut buf = BytesMut::from("GET / HTTP/1.1\r\nVersion: 0.0.1");
        assert!(HeaderDecoder::new().decode(&mut buf).unwrap().is_none());

        let mut buf = BytesMut::from("GET / HTTP/1.1");
        assert!(HeaderDecoder::new().decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn unknown_version_is_kept() {
        let mut buf = BytesMut::from("GET / HTTP/0.9\r\n\r\n");
        let (header, _) = HeaderDecoder::new().decode(&mut buf).unwrap().unwrap();
        assert_eq!(header.version(), Version::HTTP_09);
        assert!(!header.is_known_version());
    }

    #[test]
    fn reject_bad_start_line() {
        let mut buf = BytesMut::from("GET / HTTP/1.1 Hello\r\n\r\n");
        assert!(matches!(HeaderDecoder::new().decode(&mut buf), Err(ParseError::InvalidStartLine { .. })));
    }

    #[test]
    fn reject_oversized_head() {
        let mut buf = BytesMut::from(vec![b'a'; DEFAULT_MAX_HEADER_BYTES + 1].as_slice());
        assert!(matches!(HeaderDecoder::new().decode(&mut buf), Err(ParseError::TooLargeHeader { .. })));

        let mut decoder = HeaderDecoder::with_limits(32, u64::MAX);
        let mut buf = BytesMut::from("GET / HTTP/1.1\r\nX-Long: 0123456789abcdef\r\n\r\n");
        assert!(matches!(decoder.decode(&mut buf), Err(ParseError::TooLargeHeader { .. })));
    }

    #[test]
    fn reject_oversized_body() {
        let mut decoder = HeaderDecoder::with_limits(DEFAULT_MAX_HEADER_BYTES, 4);
        let mut buf = BytesMut::from("POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello");
        assert!(matches!(decoder.decode(&mut buf), Err(ParseError::TooLargeBody { declared: 5, max_size: 4 })));
    }

    #[test]
    fn check_payload_size() {
        let mut headers = HeaderMap::new();
        assert!(parse_payload(&headers).unwrap().is_empty());

        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static(" 42 "));
        assert_eq!(parse_payload(&headers).unwrap(), PayloadSize::Length(42));

        headers.append(header::CONTENT_LENGTH, HeaderValue::from_static("43"));
        assert!(parse_payload(&headers).is_err());

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("-1"));
        assert!(parse_payload(&headers).is_err());

        let mut headers = HeaderMap::new();
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        assert!(parse_payload(&headers).is_err());
    }
}
