//! Server connection state machine.
//!
//! ```text
//! ReadHeader -> ReadBody -> Dispatch -> WriteHeader -> WriteBody | WriteSingleRange | WriteRanges
//!      ^                                                               |
//!      +------------------------ KeepaliveCheck <---------------------+
//!                                      |
//!                                      +-> Close
//! ```
//!
//! Every step acts on the transport only through the [`Context`]. The idle timer
//! is armed when a request is awaited and re-armed for each body read and write;
//! when it fires the connection is closed from whatever state it was in.

use std::io::SeekFrom;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::BytesMut;
use http::{HeaderValue, Method, StatusCode, Version, header};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWrite};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, info, trace, warn};

use crate::codec::{HeaderEncoder, RequestDecoder};
use crate::context::{Completion, Context};
use crate::protocol::date::DateService;
use crate::protocol::{ByteRange, Message, ParseError, PayloadItem, PayloadSize, has_connection_token};
use crate::server::dispatch::content_type_for;
use crate::server::multipart::Multipart;
use crate::server::{ConnType, ConnectionConfig, ConnectionRecord, Dispatcher};

/// Largest piece of a response body staged per write
const WRITE_UNIT: usize = 8 * 1024;

const SERVER_NAME: &str = concat!("micro-transfer/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    ReadHeader,
    ReadBody,
    Dispatch,
    WriteHeader,
    WriteBody,
    WriteSingleRange,
    WriteRanges,
    KeepaliveCheck,
    Close,
}

/// One accepted connection, plaintext or TLS, and the exchanges made over it.
pub struct HttpConnection<S> {
    ctx: Context<S, ConnectionRecord>,
    decoder: RequestDecoder,
    body: BytesMut,
    config: Arc<ConnectionConfig>,
    dispatcher: Arc<dyn Dispatcher>,
    accepted: Instant,
}

impl<S> std::fmt::Debug for HttpConnection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConnection").field("ctx", &self.ctx).field("config", &self.config).finish_non_exhaustive()
    }
}

impl<S> HttpConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, remote: Option<SocketAddr>, config: Arc<ConnectionConfig>, dispatcher: Arc<dyn Dispatcher>) -> Self {
        let mut ctx = Context::new(stream, ConnectionRecord::new(remote));
        if let Some(remote) = remote {
            ctx = ctx.with_peer(remote);
        }
        Self {
            ctx,
            decoder: RequestDecoder::with_limits(config.max_header_bytes, config.max_body_bytes),
            body: BytesMut::new(),
            config,
            dispatcher,
            accepted: Instant::now(),
        }
    }

    /// Serves requests until the peer leaves, the idle timer fires or a
    /// response does not allow the connection to be reused.
    pub async fn process(mut self) {
        self.ctx.set_timeout(self.config.keepalive_timeout);

        let mut state = State::ReadHeader;
        while state != State::Close {
            trace!(?state, "connection state");
            state = match state {
                State::ReadHeader => self.read_header().await,
                State::ReadBody => self.read_body().await,
                State::Dispatch => self.dispatch().await,
                State::WriteHeader => self.write_header().await,
                State::WriteBody => self.write_body().await,
                State::WriteSingleRange => self.write_single_range().await,
                State::WriteRanges => self.write_ranges().await,
                State::KeepaliveCheck => self.check_keepalive(),
                State::Close => State::Close,
            };
        }

        self.ctx.close().await;
        let record = self.ctx.payload();
        info!(
            remote = ?record.remote(),
            exchanges = record.exchanges,
            elapsed = ?self.accepted.elapsed(),
            "connection closed"
        );
    }

    async fn read_header(&mut self) -> State {
        loop {
            match self.decoder.decode(self.ctx.read_buf_mut()) {
                Ok(Some(Message::Header((header, payload_size)))) => {
                    debug!(
                        method = %header.method(),
                        uri = %header.uri(),
                        version = ?header.version(),
                        body_size = payload_size.length(),
                        "request head received"
                    );
                    if !header.is_known_version() {
                        warn!(remote = ?self.ctx.peer(), "unknown http version, connection will close");
                    }
                    self.ctx.payload_mut().begin(header);
                    self.body.clear();
                    return State::ReadBody;
                }
                Ok(Some(Message::Payload(_))) => {
                    warn!("payload without a request head");
                    return State::Close;
                }
                Ok(None) => {
                    if !self.read_more().await {
                        return State::Close;
                    }
                }
                Err(e) => {
                    warn!(remote = ?self.ctx.peer(), cause = %e, "reject request head");
                    let status = match e {
                        ParseError::TooLargeBody { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                        _ => StatusCode::BAD_REQUEST,
                    };
                    return self.reject(status).await;
                }
            }
        }
    }

    async fn read_body(&mut self) -> State {
        loop {
            match self.decoder.decode(self.ctx.read_buf_mut()) {
                Ok(Some(Message::Payload(PayloadItem::Chunk(bytes)))) => self.body.extend_from_slice(&bytes),
                Ok(Some(Message::Payload(PayloadItem::Eof))) => {
                    let body = self.body.split().freeze();
                    self.ctx.payload_mut().set_request_body(body);
                    return State::Dispatch;
                }
                Ok(Some(Message::Header(_))) => {
                    warn!("request head while reading a body");
                    return State::Close;
                }
                Ok(None) => {
                    self.ctx.set_timeout(self.config.keepalive_timeout);
                    if !self.read_more().await {
                        return State::Close;
                    }
                }
                Err(e) => {
                    warn!(cause = %e, "read request body failed");
                    return State::Close;
                }
            }
        }
    }

    async fn dispatch(&mut self) -> State {
        self.ctx.cancel_timeout();

        let record = self.ctx.payload_mut();
        record.exchanges += 1;
        self.dispatcher.dispatch(record).await;

        if record.conn_type() == ConnType::FileDownload {
            open_file(record).await;
        }
        State::WriteHeader
    }

    async fn write_header(&mut self) -> State {
        let (record, write_buf) = self.ctx.payload_and_write_buf();
        let head_only = record.request().is_some_and(|request| request.method() == Method::HEAD);
        let (payload_size, next) = prepare_head(record);

        let head = std::mem::take(record.response_mut());
        debug!(status = %head.status(), body_size = payload_size.length(), head_only, "write response head");
        if let Err(e) = HeaderEncoder.encode((head, payload_size), write_buf) {
            warn!(cause = %e, "encode response head failed");
            return State::Close;
        }

        if head_only || payload_size.is_empty() {
            self.ctx.set_timeout(self.config.keepalive_timeout);
            return if self.flush().await { State::KeepaliveCheck } else { State::Close };
        }
        next
    }

    async fn write_body(&mut self) -> State {
        let record = self.ctx.payload();
        match record.conn_type() {
            ConnType::Normal => {
                let body = record.response_body().clone();
                for unit in body.chunks(WRITE_UNIT) {
                    self.ctx.write(unit);
                    self.ctx.set_timeout(self.config.keepalive_timeout);
                    if !self.flush().await {
                        return State::Close;
                    }
                }
            }
            ConnType::FileDownload => {
                let size = record.file_size();
                if !self.send_file_span(0, size).await {
                    return State::Close;
                }
            }
        }
        State::KeepaliveCheck
    }

    async fn write_single_range(&mut self) -> State {
        let Some(range) = self.ctx.payload().ranges().first().copied() else {
            return State::Close;
        };
        if !self.send_file_span(range.begin(), range.length()).await {
            return State::Close;
        }
        self.ctx.payload_mut().range_cursor = 1;
        State::KeepaliveCheck
    }

    async fn write_ranges(&mut self) -> State {
        loop {
            let record = self.ctx.payload();
            let Some(multipart) = record.multipart.as_ref() else {
                return State::Close;
            };
            let Some(range) = record.ranges().get(record.range_cursor()).copied() else {
                break;
            };

            let part_head = multipart.part_head(&range);
            self.ctx.write(&part_head);
            if !self.send_file_span(range.begin(), range.length()).await {
                return State::Close;
            }
            self.ctx.write(Multipart::part_tail());
            self.ctx.payload_mut().range_cursor += 1;
        }

        let closing = self.ctx.payload().multipart.as_ref().map(Multipart::closing).unwrap_or_default();
        self.ctx.write(&closing);
        self.ctx.set_timeout(self.config.keepalive_timeout);
        if self.flush().await { State::KeepaliveCheck } else { State::Close }
    }

    fn check_keepalive(&mut self) -> State {
        let record = self.ctx.payload_mut();
        debug!(remote = ?record.remote(), elapsed = ?record.elapsed(), keepalive = record.keepalive(), "exchange finished");
        if !record.keepalive() {
            return State::Close;
        }

        record.reset();
        self.decoder.reset();
        self.ctx.set_timeout(self.config.keepalive_timeout);
        State::ReadHeader
    }

    /// Answers with an empty `status` response and closes afterwards.
    async fn reject(&mut self, status: StatusCode) -> State {
        let record = self.ctx.payload_mut();
        record.downgrade(status);
        record.keepalive = false;
        self.write_header().await
    }

    /// Streams `length` bytes of the file from offset `begin`, one unit per write.
    async fn send_file_span(&mut self, begin: u64, length: u64) -> bool {
        let (record, _) = self.ctx.payload_and_write_buf();
        let Some(file) = record.file.as_mut() else {
            return false;
        };
        if let Err(e) = file.seek(SeekFrom::Start(begin)).await {
            warn!(cause = %e, "seek file failed");
            return false;
        }

        let mut remaining = length;
        while remaining > 0 {
            let unit = usize::try_from(remaining).map_or(WRITE_UNIT, |remaining| remaining.min(WRITE_UNIT));
            let (record, write_buf) = self.ctx.payload_and_write_buf();
            let Some(file) = record.file.as_mut() else {
                return false;
            };

            let start = write_buf.len();
            write_buf.resize(start + unit, 0);
            if let Err(e) = file.read_exact(&mut write_buf[start..]).await {
                warn!(cause = %e, "read file failed");
                return false;
            }
            remaining -= unit as u64;

            self.ctx.set_timeout(self.config.keepalive_timeout);
            if !self.flush().await {
                return false;
            }
        }
        true
    }

    async fn read_more(&mut self) -> bool {
        match self.ctx.post_read().await {
            Completion::Done(0) => {
                debug!(remote = ?self.ctx.peer(), "peer closed connection");
                false
            }
            Completion::Done(_) => true,
            Completion::Timeout => {
                debug!(remote = ?self.ctx.peer(), "idle timeout");
                false
            }
            Completion::Failed(e) => {
                warn!(remote = ?self.ctx.peer(), cause = %e, "read failed");
                false
            }
        }
    }

    async fn flush(&mut self) -> bool {
        match self.ctx.post_write().await {
            Completion::Done(_) => true,
            Completion::Timeout => {
                debug!(remote = ?self.ctx.peer(), "write timed out");
                false
            }
            Completion::Failed(e) => {
                warn!(remote = ?self.ctx.peer(), cause = %e, "write failed");
                false
            }
        }
    }
}

/// Opens the file chosen by the dispatcher and resolves the requested ranges.
async fn open_file(record: &mut ConnectionRecord) {
    let Some(path) = record.file_path.clone() else {
        record.downgrade(StatusCode::INTERNAL_SERVER_ERROR);
        return;
    };

    let opened = match File::open(&path).await {
        Ok(file) => file.metadata().await.map(|metadata| (file, metadata)),
        Err(e) => Err(e),
    };
    let (file, metadata) = match opened {
        Ok((file, metadata)) if metadata.is_file() => (file, metadata),
        Ok(_) => {
            debug!(path = %path.display(), "not a regular file");
            record.downgrade(StatusCode::NOT_FOUND);
            return;
        }
        Err(e) => {
            debug!(path = %path.display(), cause = %e, "open file failed");
            record.downgrade(StatusCode::NOT_FOUND);
            return;
        }
    };

    record.file = Some(file);
    record.file_size = metadata.len();
    if record.content_type.is_none() {
        record.content_type = Some(content_type_for(&path));
    }

    let range = record
        .request()
        .and_then(|request| request.headers().get(header::RANGE))
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    if let Some(range) = range {
        record.ranges = ByteRange::parse(&range, record.file_size);
        if record.ranges.is_empty() {
            debug!(range = %range, file_size = record.file_size, "unusable range, serve full content");
        }
    }
}

/// Completes the response head and decides how the body is sent.
fn prepare_head(record: &mut ConnectionRecord) -> (PayloadSize, State) {
    let keepalive = record.keepalive() && !has_connection_token(record.response().headers(), "close");
    record.keepalive = keepalive;

    let version = record.response().version();
    let headers = record.response_mut().headers_mut();
    headers.insert(header::DATE, DateService::get_global_instance().http_date());
    headers.insert(header::SERVER, HeaderValue::from_static(SERVER_NAME));
    if !keepalive {
        headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
    } else if version == Version::HTTP_10 {
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    }

    let content_type = record.content_type.clone();
    if record.conn_type() == ConnType::Normal {
        if let Some(content_type) = content_type {
            record.response_mut().headers_mut().insert(header::CONTENT_TYPE, content_type);
        }
        let length = record.response_body().len() as u64;
        return (PayloadSize::new_length(length), State::WriteBody);
    }

    let content_type = content_type.unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
    let file_size = record.file_size;
    record.response_mut().headers_mut().insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    match record.ranges.as_slice() {
        [] => {
            record.response_mut().headers_mut().insert(header::CONTENT_TYPE, content_type);
            (PayloadSize::new_length(file_size), State::WriteBody)
        }
        [range] => {
            let range = *range;
            record.set_status(StatusCode::PARTIAL_CONTENT);
            let headers = record.response_mut().headers_mut();
            headers.insert(header::CONTENT_TYPE, content_type);
            if let Ok(content_range) = HeaderValue::from_str(&range.content_range(file_size)) {
                headers.insert(header::CONTENT_RANGE, content_range);
            }
            (PayloadSize::new_length(range.length()), State::WriteSingleRange)
        }
        ranges => {
            let multipart = Multipart::new(content_type, file_size);
            let length = multipart.body_length(ranges);
            record.set_status(StatusCode::PARTIAL_CONTENT);
            if let Some(multipart_type) = multipart.content_type() {
                record.response_mut().headers_mut().insert(header::CONTENT_TYPE, multipart_type);
            }
            record.multipart = Some(multipart);
            (PayloadSize::new_length(length), State::WriteRanges)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ResponseHeaderDecoder;
    use crate::protocol::ResponseHead;
    use crate::server::make_dispatcher;
    use std::io::Write;
    use std::time::Duration;
    use tokio::io::{AsyncWriteExt, DuplexStream, duplex};

    fn spawn_connection(dispatcher: impl Dispatcher + 'static, config: ConnectionConfig) -> DuplexStream {
        let (client, server) = duplex(64 * 1024);
        let connection = HttpConnection::new(server, None, Arc::new(config), Arc::new(dispatcher));
        tokio::spawn(connection.process());
        client
    }

    async fn read_response(stream: &mut DuplexStream, buf: &mut BytesMut) -> Option<(ResponseHead, Vec<u8>)> {
        let mut decoder = ResponseHeaderDecoder::new();
        let (head, payload_size) = loop {
            if let Some(decoded) = decoder.decode(buf).unwrap() {
                break decoded;
            }
            if stream.read_buf(buf).await.unwrap() == 0 {
                return None;
            }
        };

        let length = usize::try_from(payload_size.length()).unwrap();
        while buf.len() < length {
            assert!(stream.read_buf(buf).await.unwrap() > 0, "body cut short");
        }
        Some((head, buf.split_to(length).to_vec()))
    }

    fn hello() -> impl Dispatcher {
        make_dispatcher(|record| {
            let path = record.request().map(|request| request.uri().path().to_owned()).unwrap_or_default();
            record.set_body(format!("hello {path}"));
        })
    }

    #[tokio::test]
    async fn keepalive_serves_sequential_requests() {
        let mut stream = spawn_connection(hello(), ConnectionConfig::default());
        let mut buf = BytesMut::new();

        stream.write_all(b"GET /a HTTP/1.1\r\nHost: localhost\r\n\r\n").await.unwrap();
        let (head, body) = read_response(&mut stream, &mut buf).await.unwrap();
        assert_eq!(head.status(), StatusCode::OK);
        assert!(head.headers().contains_key(header::DATE));
        assert!(head.headers().contains_key(header::SERVER));
        assert_eq!(body, b"hello /a");

        stream.write_all(b"GET /b HTTP/1.1\r\nHost: localhost\r\n\r\n").await.unwrap();
        let (_, body) = read_response(&mut stream, &mut buf).await.unwrap();
        assert_eq!(body, b"hello /b");
    }

    #[tokio::test]
    async fn connection_close_is_honored() {
        let mut stream = spawn_connection(hello(), ConnectionConfig::default());
        let mut buf = BytesMut::new();

        stream.write_all(b"GET /a HTTP/1.1\r\nConnection: close\r\n\r\n").await.unwrap();
        let (head, _) = read_response(&mut stream, &mut buf).await.unwrap();
        assert_eq!(head.headers().get(header::CONNECTION).unwrap(), "close");
        assert!(read_response(&mut stream, &mut buf).await.is_none());
    }

    #[tokio::test]
    async fn unknown_version_is_answered_then_closed() {
        let mut stream = spawn_connection(hello(), ConnectionConfig::default());
        let mut buf = BytesMut::new();

        stream.write_all(b"GET /old HTTP/0.9\r\n\r\n").await.unwrap();
        let (head, body) = read_response(&mut stream, &mut buf).await.unwrap();
        assert_eq!(head.version(), Version::HTTP_11);
        assert_eq!(body, b"hello /old");
        assert!(read_response(&mut stream, &mut buf).await.is_none());
    }

    #[tokio::test]
    async fn request_body_reaches_dispatcher() {
        let echo = make_dispatcher(|record| {
            let body = record.request_body().clone();
            record.set_body(body);
        });
        let mut stream = spawn_connection(echo, ConnectionConfig::default());
        let mut buf = BytesMut::new();

        stream.write_all(b"POST /echo HTTP/1.1\r\nContent-Length: 11\r\n\r\nhello").await.unwrap();
        stream.write_all(b" world").await.unwrap();
        let (_, body) = read_response(&mut stream, &mut buf).await.unwrap();
        assert_eq!(body, b"hello world");
    }

    #[tokio::test]
    async fn malformed_head_gets_bad_request() {
        let mut stream = spawn_connection(hello(), ConnectionConfig::default());
        let mut buf = BytesMut::new();

        stream.write_all(b"GET / HTTP/1.1 extra\r\n\r\n").await.unwrap();
        let (head, body) = read_response(&mut stream, &mut buf).await.unwrap();
        assert_eq!(head.status(), StatusCode::BAD_REQUEST);
        assert!(body.is_empty());
        assert!(read_response(&mut stream, &mut buf).await.is_none());
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let config = ConnectionConfig { max_body_bytes: 4, ..ConnectionConfig::default() };
        let mut stream = spawn_connection(hello(), config);
        let mut buf = BytesMut::new();

        stream.write_all(b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello").await.unwrap();
        let (head, _) = read_response(&mut stream, &mut buf).await.unwrap();
        assert_eq!(head.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn serve_file_ranges() {
        let mut file = tempfile::Builder::new().suffix(".bin").tempfile().unwrap();
        let content = (0..20000u32).map(|i| (i % 251) as u8).collect::<Vec<_>>();
        file.write_all(&content).unwrap();
        let path = file.path().to_path_buf();

        let dispatcher = make_dispatcher(move |record| record.serve_file(&path));
        let mut stream = spawn_connection(dispatcher, ConnectionConfig::default());
        let mut buf = BytesMut::new();

        stream.write_all(b"GET /f HTTP/1.1\r\nRange: bytes=0-99\r\n\r\n").await.unwrap();
        let (head, body) = read_response(&mut stream, &mut buf).await.unwrap();
        assert_eq!(head.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(head.headers().get(header::CONTENT_RANGE).unwrap(), "bytes 0-99/20000");
        assert_eq!(head.headers().get(header::CONTENT_TYPE).unwrap(), "application/x-bin");
        assert_eq!(body, &content[..100]);

        stream.write_all(b"GET /f HTTP/1.1\r\nRange: bytes=5000-1\r\n\r\n").await.unwrap();
        let (head, body) = read_response(&mut stream, &mut buf).await.unwrap();
        assert_eq!(head.status(), StatusCode::OK);
        assert_eq!(head.headers().get(header::ACCEPT_RANGES).unwrap(), "bytes");
        assert_eq!(body, content);

        stream.write_all(b"HEAD /f HTTP/1.1\r\n\r\n").await.unwrap();
        let mut decoder = ResponseHeaderDecoder::new();
        let head = loop {
            if let Some((head, _)) = decoder.decode(&mut buf).unwrap() {
                break head;
            }
            assert!(stream.read_buf(&mut buf).await.unwrap() > 0);
        };
        assert_eq!(head.headers().get(header::CONTENT_LENGTH).unwrap(), "20000");
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dispatcher = make_dispatcher(|record| record.serve_file("/nonexistent/file.bin"));
        let mut stream = spawn_connection(dispatcher, ConnectionConfig::default());
        let mut buf = BytesMut::new();

        stream.write_all(b"GET /f HTTP/1.1\r\n\r\n").await.unwrap();
        let (head, body) = read_response(&mut stream, &mut buf).await.unwrap();
        assert_eq!(head.status(), StatusCode::NOT_FOUND);
        assert!(body.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timeout_closes() {
        let config = ConnectionConfig { keepalive_timeout: Duration::from_secs(2), ..ConnectionConfig::default() };
        let mut stream = spawn_connection(hello(), config);
        let mut buf = BytesMut::new();

        stream.write_all(b"GET /a HTTP/1.1\r\n").await.unwrap();
        assert!(read_response(&mut stream, &mut buf).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timeout_closes_while_reading_body() {
        let echo = make_dispatcher(|record| {
            let body = record.request_body().clone();
            record.set_body(body);
        });
        let config = ConnectionConfig { keepalive_timeout: Duration::from_secs(2), ..ConnectionConfig::default() };
        let mut stream = spawn_connection(echo, config);
        let mut buf = BytesMut::new();

        stream.write_all(b"POST /echo HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc").await.unwrap();
        assert!(read_response(&mut stream, &mut buf).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timeout_closes_while_writing_body() {
        let size = 1024 * 1024;
        let large = make_dispatcher(move |record| record.set_body(vec![b'x'; size]));
        let config = ConnectionConfig { keepalive_timeout: Duration::from_secs(2), ..ConnectionConfig::default() };
        let mut stream = spawn_connection(large, config);

        stream.write_all(b"GET /large HTTP/1.1\r\n\r\n").await.unwrap();
        // stop reading until the server gave up on the stalled write
        tokio::time::sleep(Duration::from_secs(5)).await;

        let mut received = Vec::new();
        stream.read_to_end(&mut received).await.unwrap();
        assert!(received.starts_with(b"HTTP/1.1 200 OK\r\n"));
        assert!(received.len() < size);
    }

    #[tokio::test]
    async fn large_body_is_sent_in_units() {
        let size = 200 * 1024 + 17;
        let large = make_dispatcher(move |record| record.set_body(vec![b'y'; size]));
        let mut stream = spawn_connection(large, ConnectionConfig::default());
        let mut buf = BytesMut::new();

        stream.write_all(b"GET /large HTTP/1.1\r\n\r\n").await.unwrap();
        let (head, body) = read_response(&mut stream, &mut buf).await.unwrap();
        assert_eq!(head.headers().get(header::CONTENT_LENGTH).unwrap(), &size.to_string());
        assert_eq!(body.len(), size);
        assert!(body.iter().all(|byte| *byte == b'y'));

        stream.write_all(b"GET /again HTTP/1.1\r\n\r\n").await.unwrap();
        let (_, body) = read_response(&mut stream, &mut buf).await.unwrap();
        assert_eq!(body.len(), size);
    }
}
