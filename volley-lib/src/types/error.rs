use std::path::PathBuf;
use thiserror::Error;
use url::Url;

use crate::cache::CacheError;
use crate::CacheKey;

/// Possible errors when interacting with `volley_lib`
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The network policy forbids contacting the host of the given URL.
    /// The request was not queued.
    #[error("Real network connections are disabled, refusing to enqueue a request to `{0}`")]
    NetConnectNotAllowed(Url),

    /// The given string can not be parsed into a valid request URL
    #[error("Cannot parse `{0}` as a request URL")]
    InvalidUrl(String, #[source] url::ParseError),

    /// An URL with an invalid host was found
    #[error("URL `{0}` is missing a host")]
    InvalidUrlHost(Url),

    /// The HTTP client backing the default transport could not be created
    #[error("Failed to build the HTTP client")]
    BuildClient(#[source] reqwest::Error),

    /// A background dispatch loop was requested outside of a Tokio runtime
    #[error("Cannot start a background dispatch loop outside of a Tokio runtime")]
    MissingRuntime(#[from] tokio::runtime::TryCurrentError),

    /// The configured cache getter failed; the lookup is treated as a miss
    #[error("Cache lookup for `{key}` failed: {source}")]
    CacheRead {
        /// Key of the request that was looked up
        key: CacheKey,
        /// Error reported by the getter
        source: CacheError,
    },

    /// The configured cache setter failed; the response is still delivered
    #[error("Storing `{key}` in the cache failed: {source}")]
    CacheWrite {
        /// Key of the request that was stored
        key: CacheKey,
        /// Error reported by the setter
        source: CacheError,
    },

    /// The configuration file could not be read
    #[error("Failed to read configuration from `{}`: {source}", path.display())]
    ReadConfig {
        /// Path of the configuration file
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The configuration is not valid TOML or contains unknown keys
    #[error("Cannot parse configuration")]
    ParseConfig(#[from] toml::de::Error),

    /// The configuration parsed but holds an unusable value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ErrorKind {
    /// Whether this error was raised by the admission-control layer
    #[must_use]
    pub const fn is_admission_denied(&self) -> bool {
        matches!(self, Self::NetConnectNotAllowed(_))
    }
}

impl From<(&str, url::ParseError)> for ErrorKind {
    fn from(value: (&str, url::ParseError)) -> Self {
        Self::InvalidUrl(value.0.to_owned(), value.1)
    }
}
