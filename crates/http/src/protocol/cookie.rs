//! Cookies and the shared client cookie store.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use http::HeaderValue;
use tracing::trace;

use crate::protocol::date::parse_date;

/// A single cookie as carried by `Set-Cookie` or `Cookie` headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    name: String,
    value: String,
    expires: Option<SystemTime>,
    max_age: Option<i64>,
    domain: Option<String>,
    path: Option<String>,
    secure: bool,
    http_only: bool,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            expires: None,
            max_age: None,
            domain: None,
            path: None,
            secure: false,
            http_only: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expires(&self) -> Option<SystemTime> {
        self.expires
    }

    pub fn max_age(&self) -> Option<i64> {
        self.max_age
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn is_http_only(&self) -> bool {
        self.http_only
    }

    #[must_use]
    pub fn with_expires(mut self, expires: SystemTime) -> Self {
        self.expires = Some(expires);
        self
    }

    #[must_use]
    pub fn with_max_age(mut self, max_age: i64) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Parses a `Set-Cookie` header value.
    ///
    /// The first `name=value` pair names the cookie, the remaining `;` separated
    /// items are attributes. Unknown attributes are ignored.
    pub fn parse_set_cookie(value: &str) -> Option<Cookie> {
        let mut items = value.split(';');
        let (name, value) = items.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut cookie = Cookie::new(name, value.trim());
        for item in items {
            let (key, val) = match item.split_once('=') {
                Some((key, val)) => (key.trim(), val.trim()),
                None => (item.trim(), ""),
            };

            if key.eq_ignore_ascii_case("expires") {
                cookie.expires = parse_date(val);
            } else if key.eq_ignore_ascii_case("max-age") {
                cookie.max_age = val.parse().ok();
            } else if key.eq_ignore_ascii_case("domain") {
                cookie.domain = Some(val.to_owned());
            } else if key.eq_ignore_ascii_case("path") {
                cookie.path = Some(val.to_owned());
            } else if key.eq_ignore_ascii_case("secure") {
                cookie.secure = true;
            } else if key.eq_ignore_ascii_case("httponly") {
                cookie.http_only = true;
            } else {
                trace!(attribute = key, "ignore unknown cookie attribute");
            }
        }
        Some(cookie)
    }

    /// Anchors a relative `Max-Age` to `reference`, the response `Date` or the
    /// local clock when the response carries none.
    ///
    /// A `Max-Age` of zero or less expires the cookie immediately.
    pub fn update(&mut self, reference: SystemTime) {
        match self.max_age {
            Some(max_age) if max_age <= 0 => self.expires = Some(UNIX_EPOCH),
            Some(max_age) => self.expires = reference.checked_add(Duration::from_secs(max_age.unsigned_abs())),
            None => {}
        }
    }

    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }
}

/// Parses a request `Cookie` header such as `id=123; user=foo`.
///
/// Pairs that are not exactly `name=value` are dropped.
pub fn parse_cookie_header(value: &str) -> Vec<Cookie> {
    value
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() || value.contains('=') {
                return None;
            }
            Some(Cookie::new(name, value.trim()))
        })
        .collect()
}

/// Cookie store shared by every request of one logical client.
///
/// Cloning is cheap and yields a handle to the same store; merge and expiry may
/// run concurrently from different connections.
#[derive(Debug, Clone, Default)]
pub struct CookieStore {
    cookies: Arc<DashMap<String, Cookie>>,
}

impl CookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the cookie with the same name.
    pub fn add(&self, cookie: Cookie) {
        self.cookies.insert(cookie.name.clone(), cookie);
    }

    pub fn get(&self, name: &str) -> Option<Cookie> {
        self.cookies.get(name).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, name: &str) -> Option<Cookie> {
        self.cookies.remove(name).map(|(_, cookie)| cookie)
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Drops every cookie expired at `now`, returning how many were removed.
    pub fn expire(&self, now: SystemTime) -> usize {
        let before = self.cookies.len();
        self.cookies.retain(|_, cookie| !cookie.is_expired(now));
        before.saturating_sub(self.cookies.len())
    }

    /// Renders the store as a `Cookie` request header, names in lexical order.
    pub fn header_value(&self) -> Option<HeaderValue> {
        let mut pairs =
            self.cookies.iter().map(|entry| format!("{}={}", entry.name, entry.value)).collect::<Vec<_>>();
        if pairs.is_empty() {
            return None;
        }
        pairs.sort_unstable();
        HeaderValue::from_str(&pairs.join("; ")).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_set_cookie_attributes() {
        let cookie = Cookie::parse_set_cookie(
            "id=bar; HttpOnly; Expires=Wed, 21 Oct 2015 07:28:00 GMT; Secure; Domain=www.example.com; Path=/",
        )
        .unwrap();
        assert_eq!(cookie.name(), "id");
        assert_eq!(cookie.value(), "bar");
        assert!(cookie.is_http_only());
        assert!(cookie.is_secure());
        assert_eq!(cookie.domain(), Some("www.example.com"));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.expires(), Some(UNIX_EPOCH + Duration::from_secs(1_445_412_480)));

        let cookie = Cookie::parse_set_cookie("name=foo; undef=undef; max-age=114514").unwrap();
        assert_eq!(cookie.name(), "name");
        assert_eq!(cookie.max_age(), Some(114_514));
        assert_eq!(cookie.expires(), None);

        assert!(Cookie::parse_set_cookie("no-pair").is_none());
        assert!(Cookie::parse_set_cookie("=value").is_none());
    }

    #[test]
    fn parse_request_cookies() {
        let cookies = parse_cookie_header("id=123; name=hello=xxx; user=foo");
        let names = cookies.iter().map(Cookie::name).collect::<Vec<_>>();
        assert_eq!(names, vec!["id", "user"]);
    }

    #[test]
    fn max_age_is_anchored_to_server_date() {
        let server_date = UNIX_EPOCH + Duration::from_secs(1_000);
        let mut cookie = Cookie::new("token", "1").with_max_age(10);
        cookie.update(server_date);
        assert_eq!(cookie.expires(), Some(UNIX_EPOCH + Duration::from_secs(1_010)));
        assert!(!cookie.is_expired(UNIX_EPOCH + Duration::from_secs(1_009)));
        assert!(cookie.is_expired(UNIX_EPOCH + Duration::from_secs(1_010)));
    }

    #[test]
    fn non_positive_max_age_expires_immediately() {
        let now = SystemTime::now();
        for value in ["gone=1; Max-Age=0", "neg=x; Max-Age=-1"] {
            let mut cookie = Cookie::parse_set_cookie(value).unwrap();
            assert!(cookie.max_age().is_some_and(|max_age| max_age <= 0));
            cookie.update(now);
            assert!(cookie.is_expired(now));
        }
    }

    #[test]
    fn store_expiry_and_header() {
        let store = CookieStore::new();
        store.add(Cookie::new("b", "2"));
        store.add(Cookie::new("a", "1"));
        store.add(Cookie::new("old", "x").with_expires(UNIX_EPOCH + Duration::from_secs(5)));

        assert_eq!(store.expire(UNIX_EPOCH + Duration::from_secs(10)), 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.header_value().unwrap(), "a=1; b=2");

        let shared = store.clone();
        shared.add(Cookie::new("a", "3"));
        assert_eq!(store.get("a").unwrap().value(), "3");
    }

    #[test]
    fn concurrent_merge() {
        let store = CookieStore::new();
        let handles = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for j in 0..100 {
                        store.add(Cookie::new(format!("c{i}-{j}"), "v"));
                        store.expire(SystemTime::now());
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 800);
    }
}
