//! Core HTTP protocol abstractions shared by the client and server engines.
//!
//! - [`Message`], [`PayloadItem`] and [`PayloadSize`]: what the codecs produce
//! - [`RequestHeader`]: a parsed request head with version and keep-alive helpers
//! - [`ResponseHead`]
//! - [`ByteRange`]: `Range` header parsing
//! - [`cookie`]: [`Cookie`] parsing and the shared [`CookieStore`]
//! - [`date`]: cached `Date` header values and HTTP date parsing
//! - [`ParseError`] and [`SendError`]

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHeader;
pub(crate) use request::has_connection_token;

mod response;
pub use response::ResponseHead;
pub use response::wants_close;

mod range;
pub use range::ByteRange;

pub mod cookie;
pub use cookie::Cookie;
pub use cookie::CookieStore;

pub mod date;

mod error;
pub use error::ParseError;
pub use error::SendError;
