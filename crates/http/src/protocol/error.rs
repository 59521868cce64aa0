use std::io;

use http::Version;
use thiserror::Error;

/// Failure to decode a request or response head, or the body framing it announces.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("head of {current_size} bytes exceeds the limit of {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("more than {max_num} header fields")]
    TooManyHeaders { max_num: usize },

    #[error("malformed start line: {reason}")]
    InvalidStartLine { reason: String },

    #[error("malformed header field: {reason}")]
    InvalidHeader { reason: String },

    #[error("unknown request method")]
    InvalidMethod,

    #[error("malformed request target")]
    InvalidUri,

    #[error("malformed status code")]
    InvalidStatus,

    #[error("unusable content-length: {reason}")]
    InvalidContentLength { reason: String },

    #[error("declared body of {declared} bytes exceeds the limit of {max_size}")]
    TooLargeBody { declared: u64, max_size: u64 },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_start_line<S: ToString>(reason: S) -> Self {
        Self::InvalidStartLine { reason: reason.to_string() }
    }

    pub fn invalid_header<S: ToString>(reason: S) -> Self {
        Self::InvalidHeader { reason: reason.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(reason: S) -> Self {
        Self::InvalidContentLength { reason: reason.to_string() }
    }

    pub fn too_large_body(declared: u64, max_size: u64) -> Self {
        Self::TooLargeBody { declared, max_size }
    }
}

/// Failure to serialize a head.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("cannot send a {0:?} message")]
    UnsupportedVersion(Version),

    #[error(transparent)]
    Io(#[from] io::Error),
}
