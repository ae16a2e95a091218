//! Admission control.
//!
//! Every request is checked against the process-wide [`NetworkPolicy`] when
//! it is enqueued. A rejected request never reaches the pending queue.
//! The policy is evaluated once; changing it later does not affect requests
//! that were already admitted.

mod host;

use std::{collections::HashSet, sync::LazyLock};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use url::Url;

pub use host::HostKey;

use crate::{ErrorKind, Result};

/// Hostnames treated as the local machine when `ignore_localhost` is set
pub const LOCALHOST_ALIASES: &[&str] = &["localhost", "127.0.0.1", "0.0.0.0", "::1"];

static POLICY: LazyLock<RwLock<NetworkPolicy>> =
    LazyLock::new(|| RwLock::new(NetworkPolicy::default()));

/// Which hosts requests may be sent to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkPolicy {
    /// Whether real network connections are allowed at all.
    /// When `false`, only exempted hosts are admitted.
    pub allow_net_connect: bool,
    /// Exempt [`LOCALHOST_ALIASES`] while `allow_net_connect` is `false`
    pub ignore_localhost: bool,
    /// Hosts exempted while `allow_net_connect` is `false`
    pub ignore_hosts: HashSet<HostKey>,
}

impl Default for NetworkPolicy {
    fn default() -> Self {
        Self {
            allow_net_connect: true,
            ignore_localhost: false,
            ignore_hosts: HashSet::new(),
        }
    }
}

impl NetworkPolicy {
    /// Whether a request to the given URL may be queued
    #[must_use]
    pub fn is_allowed(&self, url: &Url) -> bool {
        if self.allow_net_connect {
            return true;
        }
        let Ok(host) = HostKey::try_from(url) else {
            return false;
        };
        if self.ignore_localhost && is_localhost(&host) {
            return true;
        }
        self.ignore_hosts.contains(&host)
    }

    /// Check the given URL against the policy
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::NetConnectNotAllowed`] if the host may not be
    /// contacted.
    pub fn check(&self, url: &Url) -> Result<()> {
        if self.is_allowed(url) {
            Ok(())
        } else {
            Err(ErrorKind::NetConnectNotAllowed(url.clone()))
        }
    }
}

#[inline]
fn is_localhost(host: &HostKey) -> bool {
    LOCALHOST_ALIASES.contains(&host.as_str())
}

/// Snapshot of the process-wide policy
#[must_use]
pub fn network_policy() -> NetworkPolicy {
    POLICY.read().clone()
}

/// Replace the process-wide policy
pub fn set_network_policy(policy: NetworkPolicy) {
    log::debug!("Setting network policy: {policy:?}");
    *POLICY.write() = policy;
}

/// Restore the default policy (everything allowed)
pub fn reset_network_policy() {
    set_network_policy(NetworkPolicy::default());
}

/// Whether real network connections are allowed
#[must_use]
pub fn allow_net_connect() -> bool {
    POLICY.read().allow_net_connect
}

/// Allow or forbid real network connections
pub fn set_allow_net_connect(allow: bool) {
    POLICY.write().allow_net_connect = allow;
}

/// Whether localhost is exempted from the policy
#[must_use]
pub fn ignore_localhost() -> bool {
    POLICY.read().ignore_localhost
}

/// Exempt localhost from the policy
pub fn set_ignore_localhost(ignore: bool) {
    POLICY.write().ignore_localhost = ignore;
}

/// Hosts exempted from the policy
#[must_use]
pub fn ignore_hosts() -> HashSet<HostKey> {
    POLICY.read().ignore_hosts.clone()
}

/// Replace the set of exempted hosts
pub fn set_ignore_hosts<I, H>(hosts: I)
where
    I: IntoIterator<Item = H>,
    H: Into<HostKey>,
{
    POLICY.write().ignore_hosts = hosts.into_iter().map(Into::into).collect();
}

/// Check a URL against the process-wide policy
pub(crate) fn check(url: &Url) -> Result<()> {
    POLICY.read().check(url)
}
