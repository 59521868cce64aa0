//! Byte range parsing for the `Range` request header.
//!
//! Only the `bytes` unit is understood. A header is resolved against the length
//! of the resource it targets and yields absolute `(begin, length)` pairs. Any
//! malformed or unsatisfiable element rejects the whole header: the result is
//! either empty or every range in it is valid.
//!
//! Overlapping ranges such as `0-100,50-150` are returned as given, without
//! merging.

use std::fmt;

const BYTES_UNIT: &str = "bytes";

/// A resolved byte range inside a resource of known length.
///
/// Invariant: `length > 0` and `begin + length <= resource length` for the
/// resource it was parsed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    begin: u64,
    length: u64,
}

impl ByteRange {
    /// Creates a range covering `length` bytes from `begin` in a resource of `resource_length` bytes.
    ///
    /// Returns `None` when the range is empty or does not fit the resource.
    pub fn new(begin: u64, length: u64, resource_length: u64) -> Option<Self> {
        let end = begin.checked_add(length)?;
        (length > 0 && end <= resource_length).then_some(Self { begin, length })
    }

    #[inline]
    pub fn begin(&self) -> u64 {
        self.begin
    }

    #[inline]
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Offset of the last byte covered by this range.
    #[inline]
    pub fn end(&self) -> u64 {
        self.begin + self.length - 1
    }

    /// Parses a `Range` header value against the length of the target resource.
    ///
    /// Accepted forms per element: `start-end`, `start-` and `-suffix`. Returns an
    /// empty list on any error: wrong unit, no element, non numeric token,
    /// `start > end`, `start` or `end` past the resource, or a suffix longer than
    /// the resource.
    pub fn parse(value: &str, resource_length: u64) -> Vec<ByteRange> {
        parse_ranges(value, resource_length).unwrap_or_default()
    }

    /// Renders the `Content-Range` value, e.g. `bytes 0-99/20000`.
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.begin, self.end(), total)
    }

    /// Byte length of [`content_range`](Self::content_range) without rendering it.
    pub fn content_range_len(&self, total: u64) -> usize {
        BYTES_UNIT.len() + 1 + decimal_len(self.begin) + 1 + decimal_len(self.end()) + 1 + decimal_len(total)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.begin, self.end())
    }
}

fn parse_ranges(value: &str, resource_length: u64) -> Option<Vec<ByteRange>> {
    let (unit, set) = value.trim().split_once('=')?;
    if !unit.trim().eq_ignore_ascii_case(BYTES_UNIT) {
        return None;
    }

    let mut ranges = Vec::new();
    for spec in set.split(',') {
        ranges.push(parse_spec(spec.trim(), resource_length)?);
    }
    Some(ranges)
}

fn parse_spec(spec: &str, resource_length: u64) -> Option<ByteRange> {
    let (first, last) = spec.split_once('-')?;
    let (first, last) = (first.trim(), last.trim());

    match (first.is_empty(), last.is_empty()) {
        // -suffix
        (true, false) => {
            let suffix = parse_number(last)?;
            ByteRange::new(resource_length.checked_sub(suffix)?, suffix, resource_length)
        }
        // start-
        (false, true) => {
            let start = parse_number(first)?;
            ByteRange::new(start, resource_length.checked_sub(start)?, resource_length)
        }
        // start-end
        (false, false) => {
            let start = parse_number(first)?;
            let end = parse_number(last)?;
            if start > end || end >= resource_length {
                return None;
            }
            ByteRange::new(start, end - start + 1, resource_length)
        }
        (true, true) => None,
    }
}

fn parse_number(token: &str) -> Option<u64> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

fn decimal_len(mut n: u64) -> usize {
    let mut len = 1;
    while n >= 10 {
        n /= 10;
        len += 1;
    }
    len
}
