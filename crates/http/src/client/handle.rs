//! The caller-owned state of one client exchange.

use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, SystemTime};

use bytes::{Bytes, BytesMut};
use http::{HeaderValue, Request, header};
use tracing::trace;

use crate::client::RequestStatus;
use crate::context::{BoxedStream, Context};
use crate::protocol::date::format_date;
use crate::protocol::{CookieStore, ResponseHead};

/// Fills the buffer with at most the given number of request body bytes and
/// returns how many it wrote.
pub type BodyWriter = Box<dyn FnMut(&mut BytesMut, usize) -> usize + Send>;

/// Receives response body bytes as they arrive.
pub type BodyReader = Box<dyn FnMut(&[u8]) + Send>;

/// Invoked once with the handle in its terminal status.
pub type CompletionCallback = Box<dyn FnMut(&RequestHandle) + Send>;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeouts of the three phases of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub request: Duration,
    pub response: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { connect: DEFAULT_CONNECT_TIMEOUT, request: DEFAULT_REQUEST_TIMEOUT, response: DEFAULT_RESPONSE_TIMEOUT }
    }
}

/// One logical request/response exchange.
///
/// The handle is moved into the client while in flight and handed back through
/// the [`Deferred`](crate::client::Deferred) once the exchange is terminal. A
/// handle whose connection was kept alive can be posted again and reuses it.
pub struct RequestHandle {
    address: SocketAddr,
    request: Request<Bytes>,
    pub(crate) status: RequestStatus,
    pub(crate) response: Option<ResponseHead>,
    pub(crate) response_body: BytesMut,
    pub(crate) request_body_size: u64,
    pub(crate) request_body_handled: u64,
    pub(crate) response_body_size: u64,
    pub(crate) response_body_handled: u64,
    pub(crate) tried_times: u32,
    pub(crate) timeouts: Timeouts,
    cookies: CookieStore,
    body_writer: Option<(u64, BodyWriter)>,
    pub(crate) body_reader: Option<BodyReader>,
    on_complete: Option<CompletionCallback>,
    pub(crate) context: Option<Context<BoxedStream>>,
}

impl RequestHandle {
    pub fn builder(address: SocketAddr, request: Request<Bytes>) -> RequestHandleBuilder {
        RequestHandleBuilder {
            address,
            request,
            timeouts: Timeouts::default(),
            cookies: None,
            body_writer: None,
            body_reader: None,
            on_complete: None,
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn request(&self) -> &Request<Bytes> {
        &self.request
    }

    /// Mutable access to the request, e.g. to change the target before posting
    /// the handle again.
    pub fn request_mut(&mut self) -> &mut Request<Bytes> {
        &mut self.request
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    /// The response head, once it has been parsed.
    pub fn response(&self) -> Option<&ResponseHead> {
        self.response.as_ref()
    }

    /// The buffered response body; empty when a body reader consumed it.
    pub fn response_body(&self) -> &[u8] {
        &self.response_body
    }

    pub fn request_body_size(&self) -> u64 {
        self.request_body_size
    }

    pub fn request_body_handled(&self) -> u64 {
        self.request_body_handled
    }

    pub fn response_body_size(&self) -> u64 {
        self.response_body_size
    }

    pub fn response_body_handled(&self) -> u64 {
        self.response_body_handled
    }

    /// Number of failed attempts of the current exchange.
    pub fn tried_times(&self) -> u32 {
        self.tried_times
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    pub fn cookie_store(&self) -> &CookieStore {
        &self.cookies
    }

    /// Whether a kept-alive connection is held for the next post.
    pub fn has_connection(&self) -> bool {
        self.context.as_ref().is_some_and(Context::is_open)
    }

    /// Prepares the request for an attempt: stamps `Date`, resets the response
    /// state, drops expired cookies and sets `Content-Length` and `Cookie`.
    pub(crate) fn preprocess(&mut self) {
        let now = SystemTime::now();
        let expired = self.cookies.expire(now);

        self.status = RequestStatus::Ready;
        self.response = None;
        self.response_body.clear();
        self.response_body_size = 0;
        self.response_body_handled = 0;
        self.request_body_handled = 0;
        self.request_body_size = match &self.body_writer {
            Some((size, _)) => *size,
            None => self.request.body().len() as u64,
        };

        let headers = self.request.headers_mut();
        if let Ok(date) = HeaderValue::from_str(&format_date(now)) {
            headers.insert(header::DATE, date);
        }
        if self.request_body_size > 0 {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(self.request_body_size));
        } else {
            headers.remove(header::CONTENT_LENGTH);
        }
        match self.cookies.header_value() {
            Some(cookie) => headers.insert(header::COOKIE, cookie),
            None => headers.remove(header::COOKIE),
        };

        trace!(body_size = self.request_body_size, expired, "request preprocessed");
    }

    /// Stages the next piece of the request body, at most `max` bytes.
    ///
    /// Returns the number of bytes staged, `0` when a body writer produced nothing.
    pub(crate) fn fill_body(&mut self, dst: &mut BytesMut, max: usize) -> usize {
        let remaining = self.request_body_size - self.request_body_handled;
        let want = usize::try_from(remaining).map_or(max, |remaining| remaining.min(max));

        let written = match &mut self.body_writer {
            Some((_, writer)) => {
                let before = dst.len();
                let reported = writer(dst, want);
                reported.min(dst.len() - before)
            }
            None => {
                // bounded by the body length, which is a usize
                #[allow(clippy::cast_possible_truncation, reason = "offset is below the in-memory body length")]
                let offset = self.request_body_handled as usize;
                let chunk = &self.request.body()[offset..offset + want];
                dst.extend_from_slice(chunk);
                chunk.len()
            }
        };

        self.request_body_handled += written as u64;
        written
    }

    /// Hands a response body chunk to the reader callback or buffers it.
    pub(crate) fn deliver(&mut self, chunk: &[u8]) {
        match &mut self.body_reader {
            Some(reader) => reader(chunk),
            None => self.response_body.extend_from_slice(chunk),
        }
        self.response_body_handled += chunk.len() as u64;
    }

    pub(crate) fn invoke_callback(&mut self) {
        if let Some(mut callback) = self.on_complete.take() {
            callback(self);
            self.on_complete = Some(callback);
        }
    }
}

impl fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle")
            .field("address", &self.address)
            .field("method", self.request.method())
            .field("uri", self.request.uri())
            .field("status", &self.status)
            .field("request_body", &(self.request_body_handled, self.request_body_size))
            .field("response_body", &(self.response_body_handled, self.response_body_size))
            .field("tried_times", &self.tried_times)
            .finish_non_exhaustive()
    }
}

/// Builder for [`RequestHandle`].
pub struct RequestHandleBuilder {
    address: SocketAddr,
    request: Request<Bytes>,
    timeouts: Timeouts,
    cookies: Option<CookieStore>,
    body_writer: Option<(u64, BodyWriter)>,
    body_reader: Option<BodyReader>,
    on_complete: Option<CompletionCallback>,
}

impl RequestHandleBuilder {
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connect = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.request = timeout;
        self
    }

    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.response = timeout;
        self
    }

    /// Shares `cookies` with this exchange; a fresh store is used otherwise.
    pub fn cookie_store(mut self, cookies: CookieStore) -> Self {
        self.cookies = Some(cookies);
        self
    }

    /// Streams a request body of exactly `size` bytes from `writer` instead of
    /// sending the body of the request.
    pub fn body_writer<F>(mut self, size: u64, writer: F) -> Self
    where
        F: FnMut(&mut BytesMut, usize) -> usize + Send + 'static,
    {
        self.body_writer = Some((size, Box::new(writer)));
        self
    }

    /// Streams the response body into `reader` instead of buffering it.
    pub fn body_reader<F>(mut self, reader: F) -> Self
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        self.body_reader = Some(Box::new(reader));
        self
    }

    /// Registers a callback invoked before the deferred result is fulfilled.
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&RequestHandle) + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn build(self) -> RequestHandle {
        RequestHandle {
            address: self.address,
            request: self.request,
            status: RequestStatus::Ready,
            response: None,
            response_body: BytesMut::new(),
            request_body_size: 0,
            request_body_handled: 0,
            response_body_size: 0,
            response_body_handled: 0,
            tried_times: 0,
            timeouts: self.timeouts,
            cookies: self.cookies.unwrap_or_default(),
            body_writer: self.body_writer,
            body_reader: self.body_reader,
            on_complete: self.on_complete,
            context: None,
        }
    }
}

impl fmt::Debug for RequestHandleBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandleBuilder")
            .field("address", &self.address)
            .field("uri", self.request.uri())
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}
