//! Request line and status line parsing.
//!
//! `httparse` only accepts HTTP/1.x start lines, while a version this crate does
//! not speak must still be readable so the message can be answered and the
//! connection closed. The start line is therefore split by hand and only the
//! header fields are left to `httparse`.

use http::{Method, StatusCode, Version};

use crate::protocol::ParseError;

const HTTP_PREFIX: &[u8] = b"HTTP/";

/// Maps the protocol token to a version; anything but 1.0 and 1.1 is reported
/// as [`Version::HTTP_09`], meaning unknown.
pub(crate) fn parse_version(token: &[u8]) -> Result<Version, ParseError> {
    match token.strip_prefix(HTTP_PREFIX) {
        Some(b"1.1") => Ok(Version::HTTP_11),
        Some(b"1.0") => Ok(Version::HTTP_10),
        Some(_) => Ok(Version::HTTP_09),
        None => Err(ParseError::invalid_start_line(format!("bad protocol token {:?}", String::from_utf8_lossy(token)))),
    }
}

/// Parses `METHOD SP request-target SP HTTP-version`.
pub(crate) fn parse_request_line(line: &[u8]) -> Result<(Method, &str, Version), ParseError> {
    let mut tokens = line.split(|b| *b == b' ');
    let (Some(method), Some(target), Some(version), None) = (tokens.next(), tokens.next(), tokens.next(), tokens.next())
    else {
        return Err(ParseError::invalid_start_line("request line must have exactly three parts"));
    };

    if target.is_empty() {
        return Err(ParseError::InvalidUri);
    }
    let method = Method::from_bytes(method).map_err(|_e| ParseError::InvalidMethod)?;
    let target = std::str::from_utf8(target).map_err(|_e| ParseError::InvalidUri)?;
    let version = parse_version(version)?;
    Ok((method, target, version))
}

/// Parses `HTTP-version SP status-code [SP reason-phrase]`.
pub(crate) fn parse_status_line(line: &[u8]) -> Result<(Version, StatusCode), ParseError> {
    let mut tokens = line.splitn(3, |b| *b == b' ');
    let (Some(version), Some(code)) = (tokens.next(), tokens.next()) else {
        return Err(ParseError::invalid_start_line("status line needs a version and a status code"));
    };

    let version = parse_version(version)?;
    let status = StatusCode::from_bytes(code).map_err(|_e| ParseError::InvalidStatus)?;
    Ok((version, status))
}

/// Finds the end of the first line, returning the index of its `\r\n`.
pub(crate) fn find_line_end(src: &[u8]) -> Option<usize> {
    src.windows(2).position(|window| window == b"\r\n")
}
