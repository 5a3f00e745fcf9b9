/// Error classification for the retry loops of the HTTP clients.
use anyhow::Error;
use reqwest::StatusCode;

/// Maximum length kept from an upstream error body.
pub(crate) const MAX_ERROR_BODY_CHARS: usize = 500;

/// How a failure should be treated by a caller that may retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    /// Transient: timeouts, connection resets, 429, 5xx.
    Retryable,
    /// Request-level problems that will fail again unchanged.
    NonRetryable,
    /// Credentials or configuration are wrong; stop the job.
    Fatal,
}

/// Non-success HTTP response from an upstream service.
#[derive(Debug, thiserror::Error)]
#[error("{service} returned error status {status}: {body}")]
pub(crate) struct UpstreamStatusError {
    pub(crate) service: &'static str,
    pub(crate) status: StatusCode,
    pub(crate) body: String,
}

impl UpstreamStatusError {
    pub(crate) fn new(service: &'static str, status: StatusCode, body: &str) -> Self {
        Self {
            service,
            status,
            body: truncate_error_message(body),
        }
    }
}

/// Cuts long upstream bodies so logs and alerts stay readable.
pub(crate) fn truncate_error_message(msg: &str) -> String {
    let char_count = msg.chars().count();
    if char_count <= MAX_ERROR_BODY_CHARS {
        return msg.to_string();
    }
    let truncated: String = msg.chars().take(MAX_ERROR_BODY_CHARS).collect();
    format!("{truncated}... (truncated, {char_count} chars)")
}

fn classify_status(status: StatusCode) -> ErrorKind {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorKind::Fatal,
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::Retryable,
        s if s.is_server_error() => ErrorKind::Retryable,
        _ => ErrorKind::NonRetryable,
    }
}

#[must_use]
pub(crate) fn classify_error(error: &Error) -> ErrorKind {
    if let Some(upstream) = error.downcast_ref::<UpstreamStatusError>() {
        return classify_status(upstream.status);
    }

    if let Some(reqwest_err) = error.downcast_ref::<reqwest::Error>() {
        if reqwest_err.is_timeout() || reqwest_err.is_connect() {
            return ErrorKind::Retryable;
        }
        if let Some(status) = reqwest_err.status() {
            return classify_status(status);
        }
    }

    ErrorKind::NonRetryable
}

#[must_use]
pub(crate) fn is_retryable(error: &Error) -> bool {
    matches!(classify_error(error), ErrorKind::Retryable)
}

#[must_use]
pub(crate) fn is_fatal(error: &Error) -> bool {
    matches!(classify_error(error), ErrorKind::Fatal)
}
