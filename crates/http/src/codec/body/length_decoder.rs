//! `Content-Length` framed payload decoding.
//!
//! See [RFC 9112 Section 6.2](https://www.rfc-editor.org/rfc/rfc9112#section-6.2).

use std::cmp;

use crate::protocol::{ParseError, PayloadItem};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// Splits exactly `length` bytes off the input, possibly across several calls.
///
/// Bytes past the declared length stay in the buffer; they belong to the next
/// message on a persistent connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    /// Bytes still expected
    remaining: u64,
}

impl LengthDecoder {
    pub fn new(length: u64) -> Self {
        Self { remaining: length }
    }

    /// Bytes of the payload not decoded yet.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl Decoder for LengthDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.remaining == 0 {
            return Ok(Some(PayloadItem::Eof));
        }

        if src.is_empty() {
            return Ok(None);
        }

        let len = cmp::min(self.remaining, src.len() as u64);
        // len <= src.len(), which is a usize
        #[allow(clippy::cast_possible_truncation, reason = "bounded by the buffer length")]
        let bytes = src.split_to(len as usize).freeze();

        self.remaining -= bytes.len() as u64;
        Ok(Some(PayloadItem::Chunk(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_input() {
        let mut length_decoder = LengthDecoder::new(6);

        let mut buffer = BytesMut::from(&b"abc"[..]);
        let first = length_decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(first.as_bytes().unwrap().as_ref(), b"abc");
        assert!(length_decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"defNEXT");
        let second = length_decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(second.as_bytes().unwrap().as_ref(), b"def");
        assert!(length_decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
        assert_eq!(&buffer[..], b"NEXT");
    }

    #[test]
    fn test_basic() {
        let mut buffer: BytesMut = BytesMut::from(&b"101234567890abcdef\r\n\r\n"[..]);

        let mut length_decoder = LengthDecoder::new(10);
        let item = length_decoder.decode(&mut buffer);

        let payload = item.unwrap().unwrap();
        assert!(payload.is_chunk());

        let bytes = payload.as_bytes().unwrap();

        assert_eq!(bytes.len(), 10);

        assert_eq!(&bytes[..], b"1012345678");
        assert_eq!(&buffer[..], b"90abcdef\r\n\r\n");
    }
}
