//! Decoder implementation for HTTP message payloads.
//!
//! Handles `Content-Length` framed payloads and messages with no body.

use crate::codec::body::length_decoder::LengthDecoder;
use crate::protocol::{ParseError, PayloadItem, PayloadSize};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// A unified decoder for handling HTTP message payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadDecoder {
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    /// Decode payload with a fixed content length
    Length(LengthDecoder),

    /// Handle messages with no body
    NoBody,
}

impl PayloadDecoder {
    /// Creates a PayloadDecoder for messages with no body.
    pub fn empty() -> Self {
        Self { kind: Kind::NoBody }
    }

    /// Creates a PayloadDecoder for a fixed-length payload of `size` bytes.
    pub fn fix_length(size: u64) -> Self {
        Self { kind: Kind::Length(LengthDecoder::new(size)) }
    }

    /// Returns whether this decoder handles messages with no body.
    pub fn is_empty(&self) -> bool {
        matches!(self.kind, Kind::NoBody)
    }

    /// Returns whether this decoder handles fixed-length payloads.
    pub fn is_fix_length(&self) -> bool {
        matches!(self.kind, Kind::Length(_))
    }
}

impl From<PayloadSize> for PayloadDecoder {
    fn from(payload_size: PayloadSize) -> Self {
        match payload_size {
            PayloadSize::Length(length) => PayloadDecoder::fix_length(length),
            PayloadSize::Empty => PayloadDecoder::empty(),
        }
    }
}

impl Decoder for PayloadDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::Length(length_decoder) => length_decoder.decode(src),
            Kind::NoBody => Ok(Some(PayloadItem::Eof)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_is_eof() {
        let mut decoder = PayloadDecoder::from(PayloadSize::new_empty());
        assert!(decoder.is_empty());

        let mut buffer = BytesMut::from(&b"GET / HTTP/1.1\r\n"[..]);
        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(PayloadItem::Eof));
        assert_eq!(buffer.len(), 16);
    }

    #[test]
    fn length_payload_stops_at_boundary() {
        let mut decoder = PayloadDecoder::from(PayloadSize::new_length(5));
        assert!(decoder.is_fix_length());

        let mut buffer = BytesMut::from(&b"helloGET"[..]);
        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap().as_ref(), b"hello");
        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(PayloadItem::Eof));
        assert_eq!(&buffer[..], b"GET");
    }
}
