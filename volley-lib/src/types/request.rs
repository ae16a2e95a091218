use std::{
    fmt::{self, Display},
    sync::{Arc, OnceLock},
    time::Duration,
};

use http::{HeaderMap, Method};
use parking_lot::Mutex;
use typed_builder::TypedBuilder;
use url::Url;

use crate::{CacheKey, ErrorKind, Response, Result};

/// Callback invoked with the response once a request has been resolved
pub type OnComplete = Box<dyn FnOnce(&Response) + Send>;

/// Callback invoked with the request after every other completion step.
/// This is the place to enqueue follow-up work.
pub type AfterComplete = Box<dyn FnOnce(&Request) + Send>;

/// Per-request transport and caching options.
///
/// All options are passed through to the [`Transport`](crate::Transport)
/// unmodified, except `cache_timeout` which only controls whether the cache
/// setter of the dispatcher is called.
#[derive(TypedBuilder, Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    /// HTTP method, `GET` by default
    #[builder(default = Method::GET)]
    pub method: Method,

    /// Query parameters appended to the URL, in order
    #[builder(default, setter(into))]
    pub params: Vec<(String, String)>,

    /// Additional request headers
    #[builder(default)]
    pub headers: HeaderMap,

    /// Request body
    #[builder(default, setter(strip_option, into))]
    pub body: Option<String>,

    /// Timeout for the whole request
    #[builder(default, setter(strip_option))]
    pub timeout: Option<Duration>,

    /// Timeout for the connect phase only
    #[builder(default, setter(strip_option))]
    pub connect_timeout: Option<Duration>,

    /// Time to live for the cached response.
    ///
    /// `None` means the response is never handed to the cache setter.
    /// [`Duration::ZERO`] means "cache without an explicit expiry".
    #[builder(default, setter(strip_option))]
    pub cache_timeout: Option<Duration>,

    /// Follow `Location` headers of redirect responses
    #[builder(default)]
    pub follow_location: bool,

    /// Maximum number of redirects to follow when `follow_location` is set
    #[builder(default, setter(strip_option))]
    pub max_redirects: Option<usize>,
}

impl Default for RequestOptions {
    #[inline]
    fn default() -> Self {
        Self::builder().build()
    }
}

struct Inner {
    url: Url,
    options: RequestOptions,
    cache_key: CacheKey,
    response: OnceLock<Response>,
    handled_response: OnceLock<Response>,
    on_complete: Mutex<Vec<OnComplete>>,
    after_complete: Mutex<Vec<AfterComplete>>,
}

/// A request that can be queued on a [`Dispatcher`](crate::Dispatcher).
///
/// `Request` is a cheap handle: clones refer to the same request, so the
/// caller can keep one clone and read the [`response`](Self::response) after
/// the dispatcher has run. The descriptor (URL and options) never changes
/// after construction. The response slot is filled exactly once; callbacks
/// run after that and each one runs at most once.
#[derive(Clone)]
pub struct Request {
    inner: Arc<Inner>,
}

impl Request {
    /// Create a `GET` request for the given URL
    ///
    /// # Errors
    ///
    /// Returns an `Err` if the URL cannot be parsed.
    pub fn new(url: &str) -> Result<Self> {
        Self::with_options(url, RequestOptions::default())
    }

    /// Create a request for the given URL with custom options
    ///
    /// # Errors
    ///
    /// Returns an `Err` if the URL cannot be parsed.
    pub fn with_options(url: &str, options: RequestOptions) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| (url, e))?;
        Ok(Self::from_url(parsed, options))
    }

    /// Create a request from an already parsed URL
    #[must_use]
    pub fn from_url(mut url: Url, options: RequestOptions) -> Self {
        if !options.params.is_empty() {
            url.query_pairs_mut().extend_pairs(&options.params);
        }
        let cache_key = CacheKey::new(&options.method, &url);

        Request {
            inner: Arc::new(Inner {
                url,
                options,
                cache_key,
                response: OnceLock::new(),
                handled_response: OnceLock::new(),
                on_complete: Mutex::new(Vec::new()),
                after_complete: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The effective URL, including the query parameters
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    /// The HTTP method
    #[inline]
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.inner.options.method
    }

    /// All options of this request
    #[inline]
    #[must_use]
    pub fn options(&self) -> &RequestOptions {
        &self.inner.options
    }

    /// Key used for memoization and by the cache port
    #[inline]
    #[must_use]
    pub fn cache_key(&self) -> &CacheKey {
        &self.inner.cache_key
    }

    /// Time to live requested for the cached response, if any
    #[inline]
    #[must_use]
    pub fn cache_timeout(&self) -> Option<Duration> {
        self.inner.options.cache_timeout
    }

    /// Whether this is a `GET` request.
    /// Only `GET` requests are memoized or served from the cache.
    #[inline]
    #[must_use]
    pub fn is_get(&self) -> bool {
        self.inner.options.method == Method::GET
    }

    /// The response, once the request has been resolved
    #[inline]
    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        self.inner.response.get()
    }

    /// The response after cache and hook processing.
    /// It is always equal by value to [`Request::response`].
    #[inline]
    #[must_use]
    pub fn handled_response(&self) -> Option<&Response> {
        self.inner.handled_response.get()
    }

    /// Whether the response slot has been filled
    #[inline]
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.inner.response.get().is_some()
    }

    /// Register a callback which receives the response.
    ///
    /// Callbacks run in registration order. A callback registered after the
    /// request has been resolved never runs.
    pub fn on_complete<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(&Response) + Send + 'static,
    {
        self.inner.on_complete.lock().push(Box::new(callback));
        self
    }

    /// Register a callback which runs after all `on_complete` callbacks and
    /// the dispatcher-wide callback. It may enqueue new requests on the
    /// dispatcher which is currently running.
    pub fn after_complete<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(&Request) + Send + 'static,
    {
        self.inner.after_complete.lock().push(Box::new(callback));
        self
    }

    /// Whether both handles refer to the same request
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Request) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Fill the response slot. Returns `false` if it was already filled.
    pub(crate) fn resolve(&self, response: Response) -> bool {
        self.inner.response.set(response).is_ok()
    }

    pub(crate) fn set_handled_response(&self, response: Response) {
        // The slot is only written right after `resolve` succeeded
        let _ = self.inner.handled_response.set(response);
    }

    // Taking the callbacks out of the lock lets them register further
    // callbacks (or inspect the request) without deadlocking.
    pub(crate) fn take_on_complete(&self) -> Vec<OnComplete> {
        std::mem::take(&mut *self.inner.on_complete.lock())
    }

    pub(crate) fn take_after_complete(&self) -> Vec<AfterComplete> {
        std::mem::take(&mut *self.inner.after_complete.lock())
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", self.method())
            .field("url", &self.inner.url.as_str())
            .field("resolved", &self.is_resolved())
            .finish_non_exhaustive()
    }
}

impl Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method(), self.inner.url)
    }
}

impl From<Url> for Request {
    fn from(url: Url) -> Self {
        Request::from_url(url, RequestOptions::default())
    }
}

impl TryFrom<&str> for Request {
    type Error = ErrorKind;

    fn try_from(s: &str) -> Result<Self> {
        Request::new(s)
    }
}

impl TryFrom<String> for Request {
    type Error = ErrorKind;

    fn try_from(s: String) -> Result<Self> {
        Request::new(&s)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use http::StatusCode;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_params_are_appended_to_the_url() {
        let options = RequestOptions::builder()
            .params(vec![("cnt".to_string(), "1".to_string())])
            .build();
        let request = Request::with_options("http://localhost:3000/foo?a=b", options).unwrap();
        assert_eq!(request.url().as_str(), "http://localhost:3000/foo?a=b&cnt=1");
    }

    #[test]
    fn test_equivalent_requests_share_a_cache_key() {
        let first = Request::new("http://localhost:3000/foo?delay=1").unwrap();
        let options = RequestOptions::builder()
            .params(vec![("delay".to_string(), "1".to_string())])
            .build();
        let second = Request::with_options("http://localhost:3000/foo", options).unwrap();
        assert_eq!(first.cache_key(), second.cache_key());
        assert!(!first.ptr_eq(&second));
    }

    #[test]
    fn test_invalid_url() {
        let err = Request::new("not a url").unwrap_err();
        assert!(matches!(err, ErrorKind::InvalidUrl(ref s, _) if s == "not a url"));
    }

    #[test]
    fn test_defaults() {
        let request = Request::try_from("http://localhost:3000").unwrap();
        assert!(request.is_get());
        assert!(!request.is_resolved());
        assert_eq!(request.cache_timeout(), None);
        assert!(!request.options().follow_location);
        assert_eq!(request.options().max_redirects, None);
    }

    #[test]
    fn test_response_slot_is_filled_once() {
        let request = Request::new("http://localhost:3000").unwrap();
        assert!(request.resolve(Response::new(StatusCode::OK, "first")));
        assert!(!request.resolve(Response::new(StatusCode::OK, "second")));
        assert_eq!(request.response().unwrap().body, "first");
    }

    #[test]
    fn test_callbacks_are_taken_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let request = Request::new("http://localhost:3000").unwrap();
        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            request.on_complete(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }

        let response = Response::new(StatusCode::OK, "");
        for callback in request.take_on_complete() {
            callback(&response);
        }
        assert!(request.take_on_complete().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_clones_share_state() {
        let request = Request::new("http://localhost:3000").unwrap();
        let handle = request.clone();
        request.resolve(Response::new(StatusCode::OK, "shared"));
        assert!(handle.ptr_eq(&request));
        assert_eq!(handle.response().unwrap().body, "shared");
    }
}
