use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use http::StatusCode;
use parking_lot::Mutex;

use crate::{Request, Response, Transport, TransportStatus};

/// A transport which never touches the network.
///
/// It answers every request with `200 OK` and the URL path as body. The
/// query string controls the behavior:
/// - `delay=<ms>` sleeps before answering (use paused Tokio time)
/// - `status=<code>` answers with another status code
/// - `fail=timeout|connect|panic` simulates a transport failure
#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl MockTransport {
    /// Number of requests submitted so far
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of requests that were in flight at the same time
    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// URLs in submission order
    pub(crate) fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }
}

fn param(request: &Request, name: &str) -> Option<String> {
    request
        .url()
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: &Request) -> Response {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().push(request.url().to_string());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(ms) = param(request, "delay").and_then(|ms| ms.parse().ok()) {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match param(request, "fail").as_deref() {
            Some("timeout") => return Response::transport_failure(TransportStatus::TimedOut),
            Some("connect") => return Response::transport_failure(TransportStatus::ConnectFailed),
            Some("panic") => panic!("transport exploded"),
            _ => {}
        }

        let status = param(request, "status")
            .and_then(|code| code.parse::<u16>().ok())
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::OK);
        Response::new(status, request.url().path())
    }
}
