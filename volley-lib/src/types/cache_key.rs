use std::fmt;

use http::Method;
use serde::{Deserialize, Serialize};
use url::Url;

/// Identity of a request for memoization and cache lookups.
///
/// Two requests with the same key are considered equivalent: they use the
/// same method and target the same normalized URL. Normalization drops the
/// fragment and sorts the query parameters, so the order in which parameters
/// were added does not matter.
///
/// # Examples
///
/// ```
/// use http::Method;
/// use url::Url;
/// use volley_lib::CacheKey;
///
/// let a = CacheKey::new(&Method::GET, &Url::parse("http://example.com/?b=2&a=1").unwrap());
/// let b = CacheKey::new(&Method::GET, &Url::parse("http://EXAMPLE.com/?a=1&b=2#top").unwrap());
/// assert_eq!(a, b);
/// assert_eq!(a.as_str(), "GET http://example.com/?a=1&b=2");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a request with the given method and URL
    #[must_use]
    pub fn new(method: &Method, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);

        let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        if pairs.is_empty() {
            url.set_query(None);
        } else {
            pairs.sort();
            url.query_pairs_mut().clear().extend_pairs(pairs);
        }

        CacheKey(format!("{method} {url}"))
    }

    /// Get the key as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the key as an owned String
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
