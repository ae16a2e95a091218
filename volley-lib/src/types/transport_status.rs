use std::fmt::Display;

use serde::Serialize;

/// Low-level outcome of a transport operation.
///
/// Transport failures are data, not errors: they travel inside a
/// [`Response`](crate::Response) through the normal completion pipeline so
/// that callbacks can inspect them uniformly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum TransportStatus {
    /// A response was received (whatever its HTTP status code)
    Ok,
    /// The connection to the host could not be established
    ConnectFailed,
    /// The request or the connection attempt timed out
    TimedOut,
    /// The redirect limit was exceeded
    TooManyRedirects,
    /// Any other failure, with a short human-readable reason
    Failed(String),
}

impl TransportStatus {
    /// Whether the transport delivered a response
    #[inline]
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Whether the operation timed out
    #[inline]
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut)
    }
}

impl Display for TransportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => f.write_str("OK"),
            Self::ConnectFailed => f.write_str("Connection failed"),
            Self::TimedOut => f.write_str("Timeout"),
            Self::TooManyRedirects => f.write_str("Too many redirects"),
            Self::Failed(reason) => write!(f, "Transport error: {reason}"),
        }
    }
}

impl From<&reqwest::Error> for TransportStatus {
    fn from(e: &reqwest::Error) -> Self {
        // Connect timeouts report both `is_connect` and `is_timeout`;
        // they are classified as timeouts.
        if e.is_timeout() {
            Self::TimedOut
        } else if e.is_connect() {
            Self::ConnectFailed
        } else if e.is_redirect() {
            Self::TooManyRedirects
        } else {
            Self::Failed(crate::transport::describe_error(e))
        }
    }
}
