//! rex - client for the rexd remote execution service
//!
//! rex asks a remote rexd server to run one command and streams the
//! command's standard output back, exiting with the command's exit status.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │  rex CLI                                        │
//! ├─────────────────────────────────────────────────┤
//! │  Session (start -> rendezvous -> bridge -> wait)│
//! ├─────────────────────────────────────────────────┤
//! │  RPC channel (TCP, record marking, AUTH_UNIX)   │
//! ├─────────────────────────────────────────────────┤
//! │  rex-protocol (XDR, ONC RPC v2, REX messages)   │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use rex::{resolve, Credential, Session, SessionConfig};
//!
//! let target = resolve("sun4.example.com", None).unwrap();
//! let mut session =
//!     Session::connect(&target, Credential::default(), SessionConfig::default()).unwrap();
//!
//! let command = vec!["uname".to_string(), "-a".to_string()];
//! let status = session
//!     .run(&target.host, &command, &mut std::io::stdout())
//!     .unwrap();
//!
//! std::process::exit(status.code());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod credential;
pub mod error;
pub mod rendezvous;
pub mod resolve;
pub mod rpc;
pub mod session;

// Re-export main types for convenience
pub use config::SessionConfig;
pub use credential::Credential;
pub use error::{Error, Result, TransportErrorKind};
pub use resolve::{resolve, Target};
pub use session::{ExitStatus, Session, Stage};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
