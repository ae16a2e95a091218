use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::ErrorKind;
use crate::types::Result;

/// A normalized hostname used by the network policy.
///
/// Hostnames are lowercased, and IPv6 addresses are stored without the
/// surrounding brackets, so `[::1]` in a URL matches an ignored host `::1`.
///
/// # Examples
///
/// ```
/// use volley_lib::policy::HostKey;
/// use url::Url;
///
/// let url = Url::parse("http://API.Example.com:8080/status").unwrap();
/// let host_key = HostKey::try_from(&url).unwrap();
/// assert_eq!(host_key.as_str(), "api.example.com");
///
/// let url = Url::parse("http://[::1]:3000/").unwrap();
/// assert_eq!(HostKey::try_from(&url).unwrap().as_str(), "::1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct HostKey(String);

impl HostKey {
    /// Get the hostname as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the hostname as an owned String
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<&Url> for HostKey {
    type Error = ErrorKind;

    fn try_from(url: &Url) -> Result<Self> {
        let host = url
            .host()
            .ok_or_else(|| ErrorKind::InvalidUrlHost(url.clone()))?;

        // `Host::to_string` brackets IPv6 addresses, so format the
        // address directly.
        let host = match host {
            url::Host::Domain(domain) => domain.to_lowercase(),
            url::Host::Ipv4(addr) => addr.to_string(),
            url::Host::Ipv6(addr) => addr.to_string(),
        };
        Ok(HostKey(host))
    }
}

impl TryFrom<Url> for HostKey {
    type Error = ErrorKind;

    fn try_from(url: Url) -> Result<Self> {
        HostKey::try_from(&url)
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for HostKey {
    fn from(host: String) -> Self {
        HostKey::from(host.as_str())
    }
}

impl From<&str> for HostKey {
    fn from(host: &str) -> Self {
        let host = host.trim();
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        HostKey(host.to_lowercase())
    }
}

impl From<HostKey> for String {
    fn from(key: HostKey) -> Self {
        key.0
    }
}
