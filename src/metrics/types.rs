use std::time::Duration;

/// Outcome label of one request: a real HTTP status or a sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Code(u16),
    Timeout,
    ConnectionError,
    ProxyError,
    Error,
}

impl Status {
    /// True iff a numeric status in `[200, 400)` was obtained.
    #[must_use]
    pub const fn is_success(self) -> bool {
        match self {
            Status::Code(code) => code >= 200 && code < 400,
            Status::Timeout | Status::ConnectionError | Status::ProxyError | Status::Error => {
                false
            }
        }
    }

    #[must_use]
    pub fn label(self) -> String {
        match self {
            Status::Code(code) => code.to_string(),
            Status::Timeout => "TIMEOUT".to_owned(),
            Status::ConnectionError => "CONNECTION_ERROR".to_owned(),
            Status::ProxyError => "PROXY_ERROR".to_owned(),
            Status::Error => "ERROR".to_owned(),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

/// Coarse failure category of an attempt that produced no usable status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Timeout,
    Connection,
    /// Connection failure while talking to the configured proxy.
    ProxyConnection,
    /// The HTTP layer rejected a malformed or protocol-violating response.
    Protocol,
    Unclassified,
}

impl FailureKind {
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        match self {
            FailureKind::Timeout | FailureKind::Connection | FailureKind::ProxyConnection => true,
            FailureKind::Protocol | FailureKind::Unclassified => false,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            FailureKind::Timeout => "Timeout",
            FailureKind::Connection => "ConnectionError",
            FailureKind::ProxyConnection => "ProxyConnectionError",
            FailureKind::Protocol => "ProtocolError",
            FailureKind::Unclassified => "Error",
        }
    }

    /// Status reported when no real status code is known.
    #[must_use]
    pub const fn sentinel_status(self) -> Status {
        match self {
            FailureKind::Timeout => Status::Timeout,
            FailureKind::Connection => Status::ConnectionError,
            FailureKind::ProxyConnection => Status::ProxyError,
            FailureKind::Protocol | FailureKind::Unclassified => Status::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub detail: String,
}

impl Failure {
    #[must_use]
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Key used in the error histogram: `"<kind>: <detail>"`.
    #[must_use]
    pub fn histogram_key(&self) -> String {
        format!("{}: {}", self.kind.label(), self.detail)
    }
}

/// Terminal outcome of one request id, after retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestResult {
    pub request_id: u64,
    pub status: Status,
    /// Measured from the start of the final attempt only.
    pub response_time: Duration,
    pub success: bool,
    pub failure: Option<Failure>,
    pub attempts: u32,
}

impl RequestResult {
    #[must_use]
    pub const fn from_status(
        request_id: u64,
        status_code: u16,
        response_time: Duration,
        attempts: u32,
    ) -> Self {
        let status = Status::Code(status_code);
        Self {
            request_id,
            status,
            response_time,
            success: status.is_success(),
            failure: None,
            attempts,
        }
    }

    #[must_use]
    pub const fn from_failure(
        request_id: u64,
        status: Status,
        failure: Failure,
        response_time: Duration,
        attempts: u32,
    ) -> Self {
        Self {
            request_id,
            status,
            response_time,
            success: false,
            failure: Some(failure),
            attempts,
        }
    }
}

/// Running totals handed to the reporter every few results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub target: u64,
}
