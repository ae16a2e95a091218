//! Dispatcher settings, loadable from TOML.
//!
//! ```toml
//! max_concurrency = 50
//! memoize = true
//!
//! [transport]
//! user_agent = "my-crawler/1.0"
//! timeout = "30s"
//! connect_timeout = "5s"
//! max_redirects = 3
//!
//! [network]
//! allow_net_connect = false
//! ignore_localhost = true
//! ignore_hosts = ["api.example.com"]
//! ```

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{ErrorKind, Result, policy::NetworkPolicy};

/// Default number of requests in flight at the same time
pub const DEFAULT_MAX_CONCURRENCY: usize = 200;

/// Default number of redirects followed when `follow_location` is set
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// Default user agent of the [`ReqwestTransport`](crate::ReqwestTransport)
pub const DEFAULT_USER_AGENT: &str = concat!("volley/", env!("CARGO_PKG_VERSION"));

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_TCP_KEEPALIVE: Duration = Duration::from_secs(60);

/// Settings of a [`Dispatcher`](crate::Dispatcher)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatcherConfig {
    /// Maximum number of requests in flight at the same time
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Share one transport operation between identical `GET` requests
    #[serde(default = "default_memoize")]
    pub memoize: bool,

    /// Settings of the default transport
    #[serde(default)]
    pub transport: TransportConfig,

    /// Admission control, see [`DispatcherConfig::apply_network_policy`]
    #[serde(default)]
    pub network: NetworkPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            memoize: default_memoize(),
            transport: TransportConfig::default(),
            network: NetworkPolicy::default(),
        }
    }
}

const fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

const fn default_memoize() -> bool {
    true
}

impl DispatcherConfig {
    /// Parse and validate a TOML document
    ///
    /// # Errors
    ///
    /// Returns an `Err` if the document is not valid TOML, contains unknown
    /// keys or holds invalid values.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    ///
    /// # Errors
    ///
    /// Returns an `Err` if the file cannot be read or
    /// [`DispatcherConfig::from_toml`] fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ErrorKind::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Check values which are valid TOML but unusable
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidConfig`] for a zero `max_concurrency` or an
    /// empty user agent.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(ErrorKind::InvalidConfig(
                "`max_concurrency` must be greater than zero".into(),
            ));
        }
        if self.transport.user_agent.trim().is_empty() {
            return Err(ErrorKind::InvalidConfig(
                "`transport.user_agent` must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Install the `[network]` section as the process-wide network policy
    pub fn apply_network_policy(&self) {
        crate::policy::set_network_policy(self.network.clone());
    }
}

/// Settings of the [`ReqwestTransport`](crate::ReqwestTransport).
///
/// Per-request options take precedence over these defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportConfig {
    /// `User-Agent` header sent with every request
    pub user_agent: String,

    /// Timeout for requests which do not set their own.
    /// No timeout if unset.
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// Connect timeout for requests which do not set their own
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Interval of TCP keepalive probes
    #[serde(with = "humantime_serde")]
    pub tcp_keepalive: Duration,

    /// Redirect limit for requests which follow redirects without setting
    /// `max_redirects`
    pub max_redirects: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            tcp_keepalive: DEFAULT_TCP_KEEPALIVE,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}
