use bytes::Bytes;

/// One item decoded from an HTTP byte stream: the head first, then the body
/// pieces that follow it.
#[derive(Debug)]
pub enum Message<T> {
    Header(T),
    Payload(PayloadItem),
}

impl<T> Message<T> {
    pub fn is_header(&self) -> bool {
        matches!(self, Message::Header(_))
    }

    /// The body item, or `None` for a head.
    pub fn into_payload_item(self) -> Option<PayloadItem> {
        match self {
            Message::Header(_) => None,
            Message::Payload(item) => Some(item),
        }
    }
}

/// A piece of a message body; `Eof` follows the last piece.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem {
    Chunk(Bytes),
    Eof,
}

impl PayloadItem {
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    pub fn is_chunk(&self) -> bool {
        matches!(self, PayloadItem::Chunk(_))
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        if let PayloadItem::Chunk(bytes) = self { Some(bytes) } else { None }
    }
}

/// Body size announced by `Content-Length`.
///
/// Bodies are always length-delimited; a message without `Content-Length` (or
/// with a zero length) is [`Empty`](PayloadSize::Empty).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    Length(u64),
    Empty,
}

impl PayloadSize {
    /// `Empty` for zero, `Length` otherwise.
    pub fn new_length(length: u64) -> Self {
        if length == 0 { PayloadSize::Empty } else { PayloadSize::Length(length) }
    }

    pub fn new_empty() -> Self {
        PayloadSize::Empty
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty)
    }

    pub fn length(&self) -> u64 {
        match self {
            PayloadSize::Length(length) => *length,
            PayloadSize::Empty => 0,
        }
    }
}
