//! Pluggable response cache.
//!
//! The dispatcher does not store responses itself. Instead, a [`CachePort`]
//! holds two optional functions supplied by the caller: a getter consulted
//! before a `GET` request is sent and a setter called after a request with a
//! `cache_timeout` was resolved. Both receive the [`Request`], so they can use
//! [`Request::cache_key`] and [`Request::cache_timeout`] to address their own
//! storage.

use std::{fmt, sync::Arc};

use crate::{ErrorKind, Request, Response};

/// Error type returned by cache functions
pub type CacheError = Box<dyn std::error::Error + Send + Sync>;

/// Looks up a stored response for a request
pub type CacheGetter =
    Arc<dyn Fn(&Request) -> Result<Option<Response>, CacheError> + Send + Sync>;

/// Stores the response of a resolved request
pub type CacheSetter = Arc<dyn Fn(&Request) -> Result<(), CacheError> + Send + Sync>;

/// A pair of optional cache functions. Without them, nothing is cached.
#[derive(Clone, Default)]
pub struct CachePort {
    getter: Option<CacheGetter>,
    setter: Option<CacheSetter>,
}

impl CachePort {
    /// Replace the getter
    pub fn set_getter<F>(&mut self, getter: F)
    where
        F: Fn(&Request) -> Result<Option<Response>, CacheError> + Send + Sync + 'static,
    {
        self.getter = Some(Arc::new(getter));
    }

    /// Replace the setter
    pub fn set_setter<F>(&mut self, setter: F)
    where
        F: Fn(&Request) -> Result<(), CacheError> + Send + Sync + 'static,
    {
        self.setter = Some(Arc::new(setter));
    }

    /// Whether a getter is configured
    #[must_use]
    pub fn has_getter(&self) -> bool {
        self.getter.is_some()
    }

    /// Whether a setter is configured
    #[must_use]
    pub fn has_setter(&self) -> bool {
        self.setter.is_some()
    }

    /// Look up a response for the request.
    ///
    /// A failing getter is reported and treated as a cache miss, so a broken
    /// cache never stops the dispatcher.
    #[must_use]
    pub fn get(&self, request: &Request) -> Option<Response> {
        let getter = self.getter.as_ref()?;
        match getter(request) {
            Ok(response) => response,
            Err(source) => {
                let error = ErrorKind::CacheRead {
                    key: request.cache_key().clone(),
                    source,
                };
                log::warn!("{error}");
                None
            }
        }
    }

    /// Hand a resolved request to the setter.
    ///
    /// Nothing happens unless the request carries a `cache_timeout`.
    /// Failures are reported and otherwise ignored: the response has already
    /// been delivered at this point.
    ///
    /// Returns whether the setter ran successfully.
    pub fn set(&self, request: &Request) -> bool {
        let Some(setter) = self.setter.as_ref() else {
            return false;
        };
        if request.cache_timeout().is_none() {
            return false;
        }
        match setter(request) {
            Ok(()) => true,
            Err(source) => {
                let error = ErrorKind::CacheWrite {
                    key: request.cache_key().clone(),
                    source,
                };
                log::warn!("{error}");
                false
            }
        }
    }
}

impl fmt::Debug for CachePort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachePort")
            .field("getter", &self.has_getter())
            .field("setter", &self.has_setter())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, time::Duration};

    use http::StatusCode;
    use parking_lot::Mutex;

    use super::*;
    use crate::{CacheKey, RequestOptions};

    fn cached_request(cache_timeout: Option<Duration>) -> Request {
        let options = match cache_timeout {
            Some(timeout) => RequestOptions::builder().cache_timeout(timeout).build(),
            None => RequestOptions::default(),
        };
        Request::with_options("http://localhost:3000/first", options).unwrap()
    }

    #[test]
    fn test_empty_port_is_a_miss() {
        let port = CachePort::default();
        assert!(port.get(&cached_request(None)).is_none());
        assert!(!port.set(&cached_request(Some(Duration::ZERO))));
    }

    #[test]
    fn test_getter_error_is_a_miss() {
        let mut port = CachePort::default();
        port.set_getter(|_| Err("storage offline".into()));
        assert!(port.get(&cached_request(None)).is_none());
    }

    #[test]
    fn test_getter_hit() {
        let mut port = CachePort::default();
        port.set_getter(|_| Ok(Some(Response::new(StatusCode::OK, "cached"))));
        let response = port.get(&cached_request(None)).unwrap();
        assert_eq!(response.body, "cached");
    }

    #[test]
    fn test_setter_requires_cache_timeout() {
        let store: Arc<Mutex<HashMap<CacheKey, Option<Duration>>>> = Arc::default();
        let mut port = CachePort::default();
        let handle = Arc::clone(&store);
        port.set_setter(move |request| {
            handle
                .lock()
                .insert(request.cache_key().clone(), request.cache_timeout());
            Ok(())
        });

        assert!(!port.set(&cached_request(None)));
        assert!(store.lock().is_empty());

        let request = cached_request(Some(Duration::ZERO));
        assert!(port.set(&request));
        assert_eq!(
            store.lock().get(request.cache_key()),
            Some(&Some(Duration::ZERO))
        );
    }

    #[test]
    fn test_setter_error_is_reported_not_raised() {
        let mut port = CachePort::default();
        port.set_setter(|_| Err("disk full".into()));
        assert!(!port.set(&cached_request(Some(Duration::from_secs(60)))));
    }
}
