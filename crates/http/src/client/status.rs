use std::fmt;

/// Phase of one client exchange.
///
/// ```text
/// Ready -> Connecting -> Requesting -> Responding -> Succeeded
///   |          |             |             |
///   +----------+-> ConnectFailed  RequestFailed  ResponseFailed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestStatus {
    Ready,
    Connecting,
    Requesting,
    Responding,
    Succeeded,
    ConnectFailed,
    RequestFailed,
    ResponseFailed,
}

impl RequestStatus {
    /// The status an exchange ends with when its context is released in this phase.
    ///
    /// Terminal statuses map to themselves.
    pub fn on_teardown(self) -> RequestStatus {
        match self {
            RequestStatus::Ready | RequestStatus::Connecting => RequestStatus::ConnectFailed,
            RequestStatus::Requesting => RequestStatus::RequestFailed,
            RequestStatus::Responding => RequestStatus::ResponseFailed,
            terminal => terminal,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestStatus::Succeeded
                | RequestStatus::ConnectFailed
                | RequestStatus::RequestFailed
                | RequestStatus::ResponseFailed
        )
    }

    pub fn is_failure(self) -> bool {
        self.is_terminal() && self != RequestStatus::Succeeded
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestStatus::Ready => "ready",
            RequestStatus::Connecting => "connecting",
            RequestStatus::Requesting => "requesting",
            RequestStatus::Responding => "responding",
            RequestStatus::Succeeded => "succeeded",
            RequestStatus::ConnectFailed => "connect failed",
            RequestStatus::RequestFailed => "request failed",
            RequestStatus::ResponseFailed => "response failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn teardown_maps_phase_to_failure() {
        assert_eq!(RequestStatus::Ready.on_teardown(), RequestStatus::ConnectFailed);
        assert_eq!(RequestStatus::Connecting.on_teardown(), RequestStatus::ConnectFailed);
        assert_eq!(RequestStatus::Requesting.on_teardown(), RequestStatus::RequestFailed);
        assert_eq!(RequestStatus::Responding.on_teardown(), RequestStatus::ResponseFailed);
        assert_eq!(RequestStatus::Succeeded.on_teardown(), RequestStatus::Succeeded);
        assert_eq!(RequestStatus::RequestFailed.on_teardown(), RequestStatus::RequestFailed);
    }

    #[test]
    fn classification() {
        assert!(!RequestStatus::Responding.is_terminal());
        assert!(RequestStatus::Succeeded.is_terminal());
        assert!(!RequestStatus::Succeeded.is_failure());
        assert!(RequestStatus::ConnectFailed.is_failure());
    }
}
