//! Session configuration.
//!
//! Timeouts and the remote environment are fixed when the session is
//! created and do not change while it runs.

use std::time::Duration;

// ============================================================================
// Defaults
// ============================================================================

/// Timeout for each rexd call (start and wait).
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 10;

/// Total time allowed for the portmapper lookup.
pub const DEFAULT_REGISTRY_TIMEOUT_SECS: u64 = 60;

/// Interval between portmapper retransmissions (UDP).
pub const DEFAULT_REGISTRY_RETRANSMIT_SECS: u64 = 5;

/// `PATH` handed to every remote command.
pub const DEFAULT_REMOTE_PATH: &str = "PATH=/usr/ucb:/bin:/usr/bin:/usr/local/bin:/sbin:/usr/sbin";

/// Port the portmapper is asked on.
pub const DEFAULT_REGISTRY_PORT: u16 = rex_protocol::portmap::PORT;

/// Settings for one remote execution session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Timeout applied to connecting and to every RPC call on the channel.
    pub call_timeout: Duration,
    /// Total budget for discovering the service port.
    pub registry_timeout: Duration,
    /// How often the discovery request is resent.
    pub registry_retransmit: Duration,
    /// Portmapper port on the target host.
    pub registry_port: u16,
    /// Environment for the remote command, as `KEY=VALUE` entries.
    pub environment: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
            registry_timeout: Duration::from_secs(DEFAULT_REGISTRY_TIMEOUT_SECS),
            registry_retransmit: Duration::from_secs(DEFAULT_REGISTRY_RETRANSMIT_SECS),
            registry_port: DEFAULT_REGISTRY_PORT,
            environment: vec![DEFAULT_REMOTE_PATH.to_string()],
        }
    }
}

impl SessionConfig {
    /// Set the per-call timeout.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Set the portmapper lookup budget and retransmit interval.
    pub fn with_registry_timeouts(mut self, total: Duration, retransmit: Duration) -> Self {
        self.registry_timeout = total;
        self.registry_retransmit = retransmit;
        self
    }

    /// Ask the portmapper on a port other than 111.
    pub fn with_registry_port(mut self, port: u16) -> Self {
        self.registry_port = port;
        self
    }

    /// Replace the remote environment.
    pub fn with_environment(mut self, environment: Vec<String>) -> Self {
        self.environment = environment;
        self
    }
}
