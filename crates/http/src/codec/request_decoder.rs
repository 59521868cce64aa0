//! Streaming request decoding.
//!
//! [`RequestDecoder`] first yields the request head, then the body as a series of
//! [`PayloadItem::Chunk`]s closed by [`PayloadItem::Eof`].

use crate::codec::body::PayloadDecoder;
use crate::codec::header::HeaderDecoder;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// A decoder for HTTP requests that handles both headers and payload.
///
/// The decoder keeps its state in the `payload_decoder` field:
/// - `None`: currently parsing a head
/// - `Some(PayloadDecoder)`: currently parsing the body of the last head
#[derive(Debug)]
pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    payload_decoder: Option<PayloadDecoder>,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates a decoder rejecting heads above `max_header_bytes` and declared
    /// bodies above `max_body_bytes`.
    pub fn with_limits(max_header_bytes: usize, max_body_bytes: u64) -> Self {
        Self { header_decoder: HeaderDecoder::with_limits(max_header_bytes, max_body_bytes), payload_decoder: None }
    }

    /// Drops any partially decoded body so the next call starts with a head.
    pub fn reset(&mut self) {
        self.payload_decoder = None;
    }
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self { header_decoder: HeaderDecoder::new(), payload_decoder: None }
    }
}

impl Decoder for RequestDecoder {
    type Item = Message<(RequestHeader, PayloadSize)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let message = match payload_decoder.decode(src)? {
                Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
                Some(item @ PayloadItem::Eof) => {
                    self.payload_decoder.take();
                    Some(Message::Payload(item))
                }
                None => None,
            };

            return Ok(message);
        }

        let message = match self.header_decoder.decode(src)? {
            Some((header, payload_size)) => {
                self.payload_decoder = Some(payload_size.into());
                Some(Message::Header((header, payload_size)))
            }
            None => None,
        };

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn head_then_body() {
        let mut decoder = RequestDecoder::new();
        let mut buf = BytesMut::from("POST /upload HTTP/1.1\r\nContent-Length: 8\r\n\r\nhell");

        let Some(Message::Header((header, payload_size))) = decoder.decode(&mut buf).unwrap() else {
            panic!("expected a head");
        };
        assert_eq!(header.uri().path(), "/upload");
        assert_eq!(payload_size, PayloadSize::Length(8));

        let item = decoder.decode(&mut buf).unwrap().and_then(Message::into_payload_item);
        assert_eq!(item, Some(PayloadItem::Chunk(Bytes::from_static(b"hell"))));
        assert!(decoder.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"o!!!GET / HTTP/1.1\r\n\r\n");
        let item = decoder.decode(&mut buf).unwrap().and_then(Message::into_payload_item);
        assert_eq!(item, Some(PayloadItem::Chunk(Bytes::from_static(b"o!!!"))));
        let item = decoder.decode(&mut buf).unwrap().and_then(Message::into_payload_item);
        assert_eq!(item, Some(PayloadItem::Eof));

        let next = decoder.decode(&mut buf).unwrap();
        assert!(next.is_some_and(|message| message.is_header()));
    }

    #[test]
    fn bodiless_request_yields_eof() {
        let mut decoder = RequestDecoder::new();
        let mut buf = BytesMut::from("GET / HTTP/1.1\r\n\r\n");

        assert!(decoder.decode(&mut buf).unwrap().is_some_and(|message| message.is_header()));
        let item = decoder.decode(&mut buf).unwrap().and_then(Message::into_payload_item);
        assert_eq!(item, Some(PayloadItem::Eof));
    }
}
