//! HTTP request header handling implementation.
//!
//! This module wraps the standard `http::Request` type with the helpers the
//! transfer engine needs: version classification and keep-alive negotiation.

use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version, header};

/// Represents an HTTP request header.
///
/// A request line carrying a version other than HTTP/1.0 or HTTP/1.1 is still
/// accepted; its version is recorded as [`Version::HTTP_09`], which this crate
/// treats as "unknown".
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl AsMut<Request<()>> for RequestHeader {
    fn as_mut(&mut self) -> &mut Request<()> {
        &mut self.inner
    }
}

impl RequestHeader {
    /// Returns a reference to the request's HTTP method.
    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    /// Returns a reference to the request's URI.
    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    /// Returns the request's HTTP version.
    pub fn version(&self) -> Version {
        self.inner.version()
    }

    /// Returns a reference to the request's headers.
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Returns false when the request line carried a version other than 1.0 or 1.1.
    pub fn is_known_version(&self) -> bool {
        matches!(self.version(), Version::HTTP_10 | Version::HTTP_11)
    }

    /// Whether the client allows the transport to be reused after this exchange.
    ///
    /// HTTP/1.1 is persistent unless `Connection: close` is present, HTTP/1.0 only
    /// with an explicit `Connection: keep-alive`, an unknown version never.
    pub fn keep_alive(&self) -> bool {
        match self.version() {
            Version::HTTP_11 => !has_connection_token(self.headers(), "close"),
            Version::HTTP_10 => has_connection_token(self.headers(), "keep-alive"),
            _ => false,
        }
    }
}

/// Converts request parts into a RequestHeader.
impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

/// Converts a bodyless request into a RequestHeader.
impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}

/// Checks whether the comma separated `Connection` header contains `token`, ignoring case.
pub(crate) fn has_connection_token(headers: &HeaderMap, token: &str) -> bool {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|item| item.trim().eq_ignore_ascii_case(token))
}
