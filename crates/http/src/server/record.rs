//! Per-connection state of the server.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::{HeaderValue, Response, StatusCode, Version};
use tokio::fs::File;

use crate::protocol::{ByteRange, RequestHeader, ResponseHead};
use crate::server::multipart::Multipart;

/// What the response of the current exchange is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnType {
    /// An in-memory body set by the dispatcher
    #[default]
    Normal,
    /// The content of a local file, possibly ranged
    FileDownload,
}

/// State of one accepted connection, reset between keep-alive exchanges.
///
/// The dispatcher sees the parsed request through [`request`](Self::request) and
/// [`request_body`](Self::request_body) and fills in the response, either with
/// [`set_body`](Self::set_body) or by pointing at a file with
/// [`serve_file`](Self::serve_file).
#[derive(Debug)]
pub struct ConnectionRecord {
    conn_type: ConnType,
    request: Option<RequestHeader>,
    request_body: Bytes,
    response: ResponseHead,
    response_body: Bytes,
    pub(crate) content_type: Option<HeaderValue>,
    pub(crate) file_path: Option<PathBuf>,
    pub(crate) file: Option<File>,
    pub(crate) file_size: u64,
    pub(crate) ranges: Vec<ByteRange>,
    pub(crate) range_cursor: usize,
    pub(crate) multipart: Option<Multipart>,
    remote: Option<SocketAddr>,
    pub(crate) keepalive: bool,
    started: Instant,
    pub(crate) exchanges: u64,
}

impl ConnectionRecord {
    pub fn new(remote: Option<SocketAddr>) -> Self {
        Self {
            conn_type: ConnType::Normal,
            request: None,
            request_body: Bytes::new(),
            response: ResponseHead::default(),
            response_body: Bytes::new(),
            content_type: None,
            file_path: None,
            file: None,
            file_size: 0,
            ranges: Vec::new(),
            range_cursor: 0,
            multipart: None,
            remote,
            keepalive: false,
            started: Instant::now(),
            exchanges: 0,
        }
    }

    pub fn conn_type(&self) -> ConnType {
        self.conn_type
    }

    /// The request of the current exchange; `None` before a head was read.
    pub fn request(&self) -> Option<&RequestHeader> {
        self.request.as_ref()
    }

    pub fn request_body(&self) -> &Bytes {
        &self.request_body
    }

    pub fn response(&self) -> &ResponseHead {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut ResponseHead {
        &mut self.response
    }

    pub fn set_status(&mut self, status: StatusCode) {
        *self.response.status_mut() = status;
    }

    /// Answers with an in-memory body.
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.conn_type = ConnType::Normal;
        self.response_body = body.into();
    }

    pub fn response_body(&self) -> &Bytes {
        &self.response_body
    }

    /// Answers with the content of the file at `path`, honoring `Range` requests.
    pub fn serve_file(&mut self, path: impl AsRef<Path>) {
        self.conn_type = ConnType::FileDownload;
        self.file_path = Some(path.as_ref().to_path_buf());
    }

    /// Overrides the content type otherwise derived from the file extension.
    pub fn set_content_type(&mut self, content_type: HeaderValue) {
        self.content_type = Some(content_type);
    }

    pub fn content_type(&self) -> Option<&HeaderValue> {
        self.content_type.as_ref()
    }

    /// Ranges of the file that will be sent, empty for the full content.
    pub fn ranges(&self) -> &[ByteRange] {
        &self.ranges
    }

    /// Index of the next range to send.
    pub fn range_cursor(&self) -> usize {
        self.range_cursor
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn remote(&self) -> Option<SocketAddr> {
        self.remote
    }

    pub fn keepalive(&self) -> bool {
        self.keepalive
    }

    /// Time since the current exchange started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub(crate) fn begin(&mut self, request: RequestHeader) {
        let version = match request.version() {
            Version::HTTP_10 => Version::HTTP_10,
            _ => Version::HTTP_11,
        };
        self.keepalive = request.keep_alive();
        self.request = Some(request);
        self.started = Instant::now();
        *self.response.version_mut() = version;
    }

    pub(crate) fn set_request_body(&mut self, body: Bytes) {
        self.request_body = body;
    }

    pub(crate) fn downgrade(&mut self, status: StatusCode) {
        self.conn_type = ConnType::Normal;
        self.response_body = Bytes::new();
        self.file = None;
        self.file_path = None;
        self.ranges.clear();
        self.range_cursor = 0;
        self.multipart = None;
        self.set_status(status);
    }

    /// Clears everything belonging to the finished exchange.
    pub(crate) fn reset(&mut self) {
        self.conn_type = ConnType::Normal;
        self.request = None;
        self.request_body = Bytes::new();
        self.response = Response::default();
        self.response_body = Bytes::new();
        self.content_type = None;
        self.file_path = None;
        self.file = None;
        self.file_size = 0;
        self.ranges.clear();
        self.range_cursor = 0;
        self.multipart = None;
        self.keepalive = false;
        self.started = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, Request};

    #[test]
    fn reset_clears_exchange() {
        let mut record = ConnectionRecord::new(Some("127.0.0.1:9000".parse().unwrap()));
        let request = Request::builder().method(Method::GET).uri("/a.bin").body(()).unwrap();
        record.begin(RequestHeader::from(request));
        record.serve_file("/tmp/a.bin");
        record.set_status(StatusCode::PARTIAL_CONTENT);
        record.ranges.push(ByteRange::new(0, 10, 100).unwrap());
        record.range_cursor = 1;
        record.file_size = 100;

        assert!(record.keepalive());
        assert_eq!(record.conn_type(), ConnType::FileDownload);

        record.reset();
        assert!(record.request().is_none());
        assert_eq!(record.conn_type(), ConnType::Normal);
        assert!(record.ranges().is_empty());
        assert_eq!(record.range_cursor(), 0);
        assert!(record.file.is_none());
        assert!(record.file_path.is_none());
        assert_eq!(record.response().status(), StatusCode::OK);
        assert!(record.remote().is_some());
    }
}
