//! HTTP date handling.
//!
//! Responses carry a `Date` header on every exchange, so the formatted value is
//! cached and shared between connections. The cache is refreshed on read once it
//! is older than the update interval.

use arc_swap::ArcSwap;
use http::HeaderValue;
use httpdate::{fmt_http_date, parse_http_date};
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

const UPDATE_INTERVAL: Duration = Duration::from_millis(800);

/// Maintains the current HTTP date header value.
pub struct DateService {
    current: ArcSwap<(SystemTime, HeaderValue)>,
    update_interval: Duration,
}

static DATE_SERVICE: Lazy<DateService> = Lazy::new(|| DateService::new_with_update_interval(UPDATE_INTERVAL));

impl DateService {
    /// Returns a reference to the global singleton instance of `DateService`.
    pub fn get_global_instance() -> &'static DateService {
        &DATE_SERVICE
    }

    fn new_with_update_interval(update_interval: Duration) -> Self {
        let now = SystemTime::now();
        DateService { current: ArcSwap::from_pointee((now, http_date_value(now))), update_interval }
    }

    /// The `Date` header value for "now", at most one update interval old.
    pub fn http_date(&self) -> HeaderValue {
        let current = self.current.load();
        let now = SystemTime::now();
        match now.duration_since(current.0) {
            Ok(elapsed) if elapsed < self.update_interval => current.1.clone(),
            _ => {
                let value = http_date_value(now);
                self.current.store(Arc::new((now, value.clone())));
                value
            }
        }
    }
}

impl std::fmt::Debug for DateService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DateService").field("update_interval", &self.update_interval).finish_non_exhaustive()
    }
}

/// Formats `time` as an IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn format_date(time: SystemTime) -> String {
    fmt_http_date(time)
}

/// Parses any of the three HTTP date formats, returning `None` on malformed input.
pub fn parse_date(value: &str) -> Option<SystemTime> {
    parse_http_date(value.trim()).ok()
}

fn http_date_value(time: SystemTime) -> HeaderValue {
    // IMF-fixdate is plain visible ASCII
    HeaderValue::from_str(&fmt_http_date(time)).unwrap_or_else(|_| HeaderValue::from_static("Thu, 01 Jan 1970 00:00:00 GMT"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    #[test]
    fn format_and_parse() {
        let time = UNIX_EPOCH + Duration::from_secs(784_111_777);
        assert_eq!(format_date(time), "Sun, 06 Nov 1994 08:49:37 GMT");
        assert_eq!(parse_date(" Sun, 06 Nov 1994 08:49:37 GMT "), Some(time));
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn cached_value_is_parsable() {
        let value = DateService::get_global_instance().http_date();
        let parsed = parse_date(value.to_str().unwrap()).unwrap();
        let drift = SystemTime::now().duration_since(parsed).unwrap_or_default();
        assert!(drift < Duration::from_secs(5));
    }
}
