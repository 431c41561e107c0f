//! Error types for rex.
//!
//! # Error Message Style Guide
//!
//! Messages follow the same shape everywhere so the one line printed before
//! exiting is enough to tell what went wrong:
//!
//! - **Format**: `"<operation> failed: <reason>"` or `"<entity> not found: <identifier>"`
//! - **Case**: all lowercase
//! - **Context**: include the host, procedure or port when available
//!
//! ```text
//! "rpc operation failed: call start: timed out after 10s"
//! "host not found: sun4.example.com"
//! "rendezvous operation failed: bind: address in use"
//! ```
//!
//! A remote refusal is the exception: the remote's message is printed verbatim.
//!
//! Every error ends the session. None of them is retried, and all of them map
//! to exit status 1; only the remote command's own status, returned by the
//! wait call, can produce a different exit code.

use std::time::Duration;
use thiserror::Error;

/// Classification of transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportErrorKind {
    /// Could not establish the connection.
    Connect,
    /// No reply within the call timeout.
    Timeout,
    /// Malformed or unexpected data on the wire.
    Protocol,
    /// The RPC layer rejected the call (program/version/procedure/auth).
    Rejected,
    /// The service is not registered with the portmapper.
    NotRegistered,
    /// Any other I/O failure on the channel.
    #[default]
    Other,
}

/// Result type alias using rex's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a remote command.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Local Input Errors
    // ========================================================================
    /// Malformed or insufficient command-line input.
    #[error("invalid usage: {0}")]
    Usage(String),

    /// Target host could not be resolved to an address.
    #[error("host not found: {host}")]
    Resolution {
        /// Host name as given.
        host: String,
    },

    // ========================================================================
    // RPC Errors
    // ========================================================================
    /// Channel creation or an RPC call failed.
    #[error("rpc operation failed: {operation}: {reason}")]
    Transport {
        /// The operation that failed (e.g., "connect", "call start").
        operation: String,
        /// The reason for the failure.
        reason: String,
        /// Classification of the failure.
        kind: TransportErrorKind,
    },

    /// The start call succeeded, but the remote refused to run the command.
    #[error("{message}")]
    RemoteRefusal {
        /// Nonzero status reported by the remote.
        status: i32,
        /// Remote-supplied diagnostic.
        message: String,
    },

    // ========================================================================
    // Local I/O Errors
    // ========================================================================
    /// Setting up the rendezvous endpoint failed.
    #[error("rendezvous operation failed: {operation}: {reason}")]
    Rendezvous {
        /// The step that failed (e.g., "socket", "bind", "listen").
        operation: String,
        /// The reason for the failure.
        reason: String,
    },

    /// Accepting or copying the remote output failed.
    #[error("output bridge failed: {operation}: {source}")]
    Bridge {
        /// The step that failed (e.g., "accept", "copy").
        operation: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    // ========================================================================
    // State Errors
    // ========================================================================
    /// A session operation was attempted in the wrong stage.
    #[error("invalid session state: expected {expected}, got {actual}")]
    InvalidState {
        /// The stage the operation requires.
        expected: String,
        /// The stage the session is in.
        actual: String,
    },
}

impl Error {
    // ========================================================================
    // Constructors
    // ========================================================================

    /// Create a usage error.
    pub fn usage(reason: impl Into<String>) -> Self {
        Self::Usage(reason.into())
    }

    /// Create a resolution error.
    pub fn resolution(host: impl Into<String>) -> Self {
        Self::Resolution { host: host.into() }
    }

    /// Create a transport error of the given kind.
    pub fn transport(
        kind: TransportErrorKind,
        operation: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Transport {
            operation: operation.into(),
            reason: reason.into(),
            kind,
        }
    }

    /// Create a timeout error for `operation`.
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::transport(
            TransportErrorKind::Timeout,
            operation,
            format!("timed out after {:?}", after),
        )
    }

    /// Create a remote refusal error.
    pub fn remote_refusal(status: i32, message: impl Into<String>) -> Self {
        Self::RemoteRefusal {
            status,
            message: message.into(),
        }
    }

    /// Create a rendezvous setup error.
    pub fn rendezvous(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rendezvous {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create an output bridge error.
    pub fn bridge(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Bridge {
            operation: operation.into(),
            source,
        }
    }

    // ========================================================================
    // Classification
    // ========================================================================

    /// Whether this is a call timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Transport {
                kind: TransportErrorKind::Timeout,
                ..
            }
        )
    }

    /// Process exit code for this error. Always 1.
    pub fn exit_code(&self) -> i32 {
        1
    }
}
