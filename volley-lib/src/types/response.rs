use std::{fmt::Display, time::Duration};

use http::{HeaderMap, StatusCode};

use crate::TransportStatus;

/// Result of executing a [`Request`](crate::Request).
///
/// A `Response` is a plain value: cloning it yields an equal value, and
/// requests which share a result (memoization followers or cache hits)
/// compare equal by value rather than by identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code; `None` when the transport failed before a status
    /// line was received
    pub status: Option<StatusCode>,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body, decoded as text
    pub body: String,
    /// Time spent in the transport
    pub elapsed: Duration,
    /// Low-level outcome of the transport operation
    pub transport_status: TransportStatus,
}

impl Response {
    /// Create a response that was delivered by the transport
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            headers: HeaderMap::new(),
            body: body.into(),
            elapsed: Duration::ZERO,
            transport_status: TransportStatus::Ok,
        }
    }

    /// Create a response for a transport operation that did not complete
    #[must_use]
    pub fn transport_failure(transport_status: TransportStatus) -> Self {
        Self {
            status: None,
            headers: HeaderMap::new(),
            body: String::new(),
            elapsed: Duration::ZERO,
            transport_status,
        }
    }

    /// Replace the headers
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Replace the elapsed time
    #[must_use]
    pub const fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// Numeric status code, `0` if none was received
    #[inline]
    #[must_use]
    pub fn code(&self) -> u16 {
        self.status.map_or(0, |code| code.as_u16())
    }

    /// Whether the transport succeeded and the status code is in the 2xx range
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.transport_status.is_ok() && self.status.is_some_and(|code| code.is_success())
    }

    /// Whether the transport failed to deliver a response
    #[inline]
    #[must_use]
    pub const fn is_transport_failure(&self) -> bool {
        !self.transport_status.is_ok()
    }

    /// Whether the transport timed out
    #[inline]
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        self.transport_status.is_timeout()
    }
}

impl Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(code) if self.transport_status.is_ok() => write!(f, "{code}")?,
            _ => write!(f, "{}", self.transport_status)?,
        }
        write!(f, " ({}ms)", self.elapsed.as_millis())
    }
}
