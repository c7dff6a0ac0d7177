use std::error::Error as StdError;
use std::io::ErrorKind;
use std::time::Duration;

use crate::metrics::FailureKind;

use super::transport::AttemptError;

/// Maps a `reqwest` failure onto the retry taxonomy.
///
/// Checked in priority order: timeout, connection (proxy connection when a
/// proxy is configured), protocol rejection, anything else.
pub(super) fn classify_error(
    err: &reqwest::Error,
    proxied: bool,
    request_timeout: Duration,
) -> AttemptError {
    if err.is_timeout() {
        return AttemptError::new(FailureKind::Timeout, timeout_detail(request_timeout));
    }

    if is_connection_failure(err) {
        let kind = if proxied {
            FailureKind::ProxyConnection
        } else {
            FailureKind::Connection
        };
        return AttemptError::new(kind, describe_error(err));
    }

    if err.is_status()
        || err.is_decode()
        || err.is_body()
        || err.is_redirect()
        || is_protocol_rejection(err)
    {
        let mut error = AttemptError::new(FailureKind::Protocol, describe_error(err));
        error.status = err.status().map(|status| status.as_u16());
        return error;
    }

    AttemptError::new(FailureKind::Unclassified, describe_error(err))
}

/// Maps a failure while reading the body of a response whose head already
/// arrived. The connection was established, so only a timeout stays
/// retryable; anything else is a rejected response carrying `status`.
pub(super) fn classify_body_error(
    err: &reqwest::Error,
    status: u16,
    request_timeout: Duration,
) -> AttemptError {
    if err.is_timeout() {
        return AttemptError::new(FailureKind::Timeout, timeout_detail(request_timeout));
    }
    AttemptError::new(FailureKind::Protocol, describe_error(err)).with_status(status)
}

pub(crate) fn timeout_detail(request_timeout: Duration) -> String {
    if request_timeout.subsec_millis() == 0 {
        format!(
            "Request timed out after {} seconds",
            request_timeout.as_secs()
        )
    } else {
        format!(
            "Request timed out after {} ms",
            request_timeout.as_millis()
        )
    }
}

fn is_connection_failure(err: &reqwest::Error) -> bool {
    if err.is_connect() {
        return true;
    }
    error_chain(err).any(|source| {
        if let Some(io_err) = source.downcast_ref::<std::io::Error>() {
            return matches!(
                io_err.kind(),
                ErrorKind::ConnectionRefused
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::NotConnected
                    | ErrorKind::BrokenPipe
                    | ErrorKind::UnexpectedEof
            );
        }
        let message = source.to_string().to_ascii_lowercase();
        message.contains("connection closed") || message.contains("connection reset")
    })
}

fn is_protocol_rejection(err: &reqwest::Error) -> bool {
    error_chain(err).any(|source| {
        let message = source.to_string().to_ascii_lowercase();
        message.contains("invalid http")
            || message.contains("message head is too large")
            || message.contains("unexpected message")
    })
}

fn error_chain<'err>(
    err: &'err (dyn StdError + 'static),
) -> impl Iterator<Item = &'err (dyn StdError + 'static)> {
    std::iter::successors(Some(err), |&current| current.source())
}

/// Flattens the error and its sources into one line, skipping repeats.
pub(super) fn describe_error(err: &reqwest::Error) -> String {
    let mut detail = String::new();
    for source in error_chain(err) {
        let message = source.to_string();
        if message.is_empty() || detail.contains(message.as_str()) {
            continue;
        }
        if !detail.is_empty() {
            detail.push_str(": ");
        }
        detail.push_str(&message);
    }
    detail
}
