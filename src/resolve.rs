//! Target host resolution.

use crate::error::{Error, Result};
use std::net::{IpAddr, ToSocketAddrs};

/// Resolved location of the remote execution service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Host name as given on the command line.
    pub host: String,
    /// Every address the host resolved to, IPv4 first.
    pub addresses: Vec<IpAddr>,
    /// Explicit service port. `None` means ask the portmapper.
    pub port: Option<u16>,
}

impl Target {
    /// Build a target from already-known addresses.
    pub fn new(host: impl Into<String>, addresses: Vec<IpAddr>, port: Option<u16>) -> Self {
        Self {
            host: host.into(),
            addresses,
            port,
        }
    }
}

/// Resolve `host` to its addresses.
///
/// The legacy service is IPv4-only in practice, so IPv4 addresses are tried
/// before any IPv6 ones. Resolution order is otherwise preserved.
pub fn resolve(host: &str, port: Option<u16>) -> Result<Target> {
    let resolved = (host, 0)
        .to_socket_addrs()
        .map_err(|e| {
            tracing::debug!(host, error = %e, "resolution failed");
            Error::resolution(host)
        })?
        .map(|addr| addr.ip());

    let (mut addresses, v6): (Vec<IpAddr>, Vec<IpAddr>) = resolved.partition(IpAddr::is_ipv4);
    addresses.extend(v6);
    addresses.dedup();

    if addresses.is_empty() {
        return Err(Error::resolution(host));
    }

    tracing::debug!(host, ?addresses, ?port, "resolved target");
    Ok(Target::new(host, addresses, port))
}
