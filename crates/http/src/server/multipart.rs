//! `multipart/byteranges` framing for responses carrying several ranges.
//!
//! ```text
//! --<boundary>\r\n
//! Content-Type: <type>\r\n
//! Content-Range: bytes <begin>-<end>/<total>\r\n
//! \r\n
//! <range data>\r\n
//! ... one part per range ...
//! --<boundary>--\r\n
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use http::HeaderValue;

use crate::protocol::ByteRange;

const CONTENT_TYPE_PREFIX: &str = "Content-Type: ";
const CONTENT_RANGE_PREFIX: &str = "Content-Range: ";

#[derive(Debug, Clone)]
pub(crate) struct Multipart {
    boundary: String,
    part_type: HeaderValue,
    total: u64,
}

impl Multipart {
    /// Framing for parts of type `part_type` cut from a resource of `total` bytes.
    pub(crate) fn new(part_type: HeaderValue, total: u64) -> Self {
        Self { boundary: generate_boundary(), part_type, total }
    }

    #[cfg(test)]
    fn with_boundary(boundary: &str, part_type: HeaderValue, total: u64) -> Self {
        Self { boundary: boundary.to_owned(), part_type, total }
    }

    /// `Content-Type` of the whole response.
    pub(crate) fn content_type(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&format!("multipart/byteranges; boundary={}", self.boundary)).ok()
    }

    /// Everything in front of the data of `range`.
    pub(crate) fn part_head(&self, range: &ByteRange) -> Vec<u8> {
        let mut head = Vec::with_capacity(self.part_head_len(range));
        head.extend_from_slice(b"--");
        head.extend_from_slice(self.boundary.as_bytes());
        head.extend_from_slice(b"\r\n");
        head.extend_from_slice(CONTENT_TYPE_PREFIX.as_bytes());
        head.extend_from_slice(self.part_type.as_bytes());
        head.extend_from_slice(b"\r\n");
        head.extend_from_slice(CONTENT_RANGE_PREFIX.as_bytes());
        head.extend_from_slice(range.content_range(self.total).as_bytes());
        head.extend_from_slice(b"\r\n\r\n");
        head
    }

    fn part_head_len(&self, range: &ByteRange) -> usize {
        2 + self.boundary.len()
            + 2
            + CONTENT_TYPE_PREFIX.len()
            + self.part_type.len()
            + 2
            + CONTENT_RANGE_PREFIX.len()
            + range.content_range_len(self.total)
            + 4
    }

    /// Closes the part whose data was just written.
    pub(crate) fn part_tail() -> &'static [u8] {
        b"\r\n"
    }

    /// Terminates the multipart body.
    pub(crate) fn closing(&self) -> Vec<u8> {
        format!("--{}--\r\n", self.boundary).into_bytes()
    }

    /// Exact length of the body framing `ranges`.
    pub(crate) fn body_length(&self, ranges: &[ByteRange]) -> u64 {
        let parts: u64 = ranges
            .iter()
            .map(|range| (self.part_head_len(range) + Self::part_tail().len()) as u64 + range.length())
            .sum();
        parts + (self.boundary.len() + 6) as u64
    }
}

fn generate_boundary() -> String {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_nanos());
    format!("micro_transfer_{nanos:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framing_matches_precomputed_length() {
        let multipart = Multipart::with_boundary("b0", HeaderValue::from_static("application/x-bin"), 20000);
        let ranges = ByteRange::parse("bytes=0-99,19000-", 20000);

        let mut body = Vec::new();
        for range in &ranges {
            body.extend_from_slice(&multipart.part_head(range));
            body.resize(body.len() + usize::try_from(range.length()).unwrap(), b'x');
            body.extend_from_slice(Multipart::part_tail());
        }
        body.extend_from_slice(&multipart.closing());

        assert_eq!(body.len() as u64, multipart.body_length(&ranges));
        let head = String::from_utf8(multipart.part_head(&ranges[0])).unwrap();
        assert_eq!(head, "--b0\r\nContent-Type: application/x-bin\r\nContent-Range: bytes 0-99/20000\r\n\r\n");
        assert!(body.ends_with(b"\r\n--b0--\r\n"));
    }

    #[test]
    fn content_type_names_boundary() {
        let multipart = Multipart::with_boundary("abc", HeaderValue::from_static("text/plain"), 10);
        assert_eq!(multipart.content_type().unwrap(), "multipart/byteranges; boundary=abc");
    }
}
