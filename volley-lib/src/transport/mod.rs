//! The seam between the dispatcher and the network.
//!
//! The dispatcher never talks to sockets itself. It hands each admitted
//! request to a [`Transport`] and waits for the [`Response`]. Transport
//! failures are part of the response (see
//! [`TransportStatus`](crate::TransportStatus)), so `execute` is infallible.

mod reqwest;

use std::{error::Error, fmt::Debug};

use async_trait::async_trait;

pub use self::reqwest::ReqwestTransport;

use crate::{Request, Response};

/// Executes requests
///
/// Implementations must honor the per-request `timeout`, `connect_timeout`,
/// `follow_location` and `max_redirects` options.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Execute the request and return its response
    async fn execute(&self, request: &Request) -> Response;
}

/// A rule for matching error message patterns to short descriptions
struct ErrorRule {
    patterns: &'static [&'static str],
    message: &'static str,
}

const RULES: &[ErrorRule] = &[
    ErrorRule {
        patterns: &[
            "failed to lookup address",
            "nodename nor servname",
            "Name or service not known",
        ],
        message: "DNS resolution failed",
    },
    ErrorRule {
        patterns: &["certificate", "handshake"],
        message: "TLS handshake failed",
    },
    ErrorRule {
        patterns: &["connection reset", "Connection reset"],
        message: "Connection reset by peer",
    },
    ErrorRule {
        patterns: &["connection closed", "IncompleteMessage", "unexpected EOF"],
        message: "Connection closed before the response was complete",
    },
];

/// Describe a `reqwest` error which is neither a timeout, a connect failure
/// nor a redirect failure.
///
/// Walks the source chain looking for a recognizable cause and falls back to
/// the innermost message.
pub(crate) fn describe_error(error: &::reqwest::Error) -> String {
    if let Some(status) = error.status() {
        return format!("Unexpected HTTP status {status}");
    }

    let mut innermost = error.to_string();
    let mut source = error.source();
    while let Some(err) = source {
        if let Some(io_error) = err.downcast_ref::<std::io::Error>() {
            return format!("I/O error: {}", io_error.kind());
        }

        let message = err.to_string();
        if let Some(rule) = RULES
            .iter()
            .find(|rule| rule.patterns.iter().any(|p| message.contains(p)))
        {
            return rule.message.to_string();
        }
        innermost = message;
        source = err.source();
    }

    if error.is_body() || error.is_decode() {
        return format!("Failed to read the response body: {innermost}");
    }
    if error.is_builder() {
        return format!("Invalid request: {innermost}");
    }
    innermost
}
