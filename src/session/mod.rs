//! Remote execution session.
//!
//! A session runs exactly one command through a fixed, forward-only
//! sequence of stages:
//!
//! ```text
//! Connecting -> Starting -> AwaitingRendezvous -> Bridging -> Waiting -> Done
//!      \            \               \                 \           \
//!       `------------`---------------`-----------------`-----------`--> Failed
//! ```
//!
//! The first failure is terminal. Nothing is retried and a finished session
//! cannot be run again.

mod bridge;
mod start;
mod wait;

pub use bridge::{accept, relay, BRIDGE_BUFFER_SIZE};
pub use start::{build_request, start, working_host};
pub use wait::wait;

use crate::config::SessionConfig;
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::rendezvous::Rendezvous;
use crate::resolve::Target;
use crate::rpc::{CallChannel, TcpChannel};
use rex_protocol::{REX_PROGRAM, REX_VERSION};
use std::io::Write;
use tracing::debug;

/// Where a session is in the call sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Opening the RPC channel.
    Connecting,
    /// Opening the rendezvous endpoint and calling START.
    Starting,
    /// START accepted; waiting for the server to connect back.
    AwaitingRendezvous,
    /// Copying remote output.
    Bridging,
    /// Calling WAIT.
    Waiting,
    /// Exit status collected.
    Done,
    /// A step failed.
    Failed,
}

impl Stage {
    /// Whether the session has finished, successfully or not.
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    /// Whether moving to `next` is a legal transition.
    ///
    /// Transitions only go forward, and nothing leaves a terminal stage.
    pub fn can_advance_to(self, next: Stage) -> bool {
        !self.is_terminal() && next > self
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Connecting => "connecting",
            Stage::Starting => "starting",
            Stage::AwaitingRendezvous => "awaiting rendezvous",
            Stage::Bridging => "bridging",
            Stage::Waiting => "waiting",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Exit status of the remote command, as reported by WAIT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus(i32);

impl ExitStatus {
    /// The raw status, used as this process's exit code.
    pub fn code(self) -> i32 {
        self.0
    }

    /// Whether the remote command succeeded.
    pub fn success(self) -> bool {
        self.0 == 0
    }
}

impl From<i32> for ExitStatus {
    fn from(status: i32) -> Self {
        Self(status)
    }
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "exit status {}", self.0)
    }
}

/// One remote command execution over one RPC channel.
pub struct Session<C> {
    channel: Option<C>,
    credential: Credential,
    config: SessionConfig,
    stage: Stage,
}

impl Session<TcpChannel> {
    /// A session that has not connected yet.
    pub fn new(credential: Credential, config: SessionConfig) -> Self {
        Self {
            channel: None,
            credential,
            config,
            stage: Stage::Connecting,
        }
    }

    /// Open the RPC channel to the rexd service at `target`.
    ///
    /// A connect failure moves the session to [`Stage::Failed`].
    pub fn open(&mut self, target: &Target) -> Result<()> {
        self.expect_stage(Stage::Connecting)?;
        debug!(stage = %self.stage, host = %target.host, "opening session");

        match TcpChannel::open(target, REX_PROGRAM, REX_VERSION, &self.config) {
            Ok(channel) => {
                self.channel = Some(channel);
                self.advance(Stage::Starting);
                Ok(())
            }
            Err(e) => {
                debug!(stage = %self.stage, error = %e, "session failed");
                self.advance(Stage::Failed);
                Err(e)
            }
        }
    }

    /// Create a session and connect it to `target`.
    pub fn connect(target: &Target, credential: Credential, config: SessionConfig) -> Result<Self> {
        let mut session = Self::new(credential, config);
        session.open(target)?;
        Ok(session)
    }
}

impl<C: CallChannel> Session<C> {
    /// Wrap an already-connected channel. The session starts in
    /// [`Stage::Starting`].
    pub fn with_channel(channel: C, credential: Credential, config: SessionConfig) -> Self {
        Self {
            channel: Some(channel),
            credential,
            config,
            stage: Stage::Starting,
        }
    }

    /// Current stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Whether the session can still make progress.
    pub fn is_open(&self) -> bool {
        !self.stage.is_terminal()
    }

    /// Run `command` on `host`, copying its output to `out`.
    ///
    /// `host` is the name the user gave; its short form is sent as the
    /// working-directory host. Arguments are sent as raw bytes. Returns the
    /// remote exit status; every error leaves the session in
    /// [`Stage::Failed`].
    pub fn run<A, W>(&mut self, host: &str, command: &[A], out: &mut W) -> Result<ExitStatus>
    where
        A: AsRef<[u8]>,
        W: Write,
    {
        self.expect_stage(Stage::Starting)?;
        let Some(mut channel) = self.channel.take() else {
            return Err(self.invalid_state(Stage::Starting));
        };

        let result = self.drive(&mut channel, host, command, out);
        self.channel = Some(channel);

        match result {
            Ok(status) => {
                self.advance(Stage::Done);
                Ok(status)
            }
            Err(e) => {
                debug!(stage = %self.stage, error = %e, "session failed");
                self.advance(Stage::Failed);
                Err(e)
            }
        }
    }

    fn drive<A, W>(
        &mut self,
        channel: &mut C,
        host: &str,
        command: &[A],
        out: &mut W,
    ) -> Result<ExitStatus>
    where
        A: AsRef<[u8]>,
        W: Write,
    {
        let timeout = self.config.call_timeout;

        let rendezvous = Rendezvous::open()?;
        let request = build_request(host, command, &self.config.environment, rendezvous.port())?;
        start(channel, &self.credential, &request, timeout)?;

        self.advance(Stage::AwaitingRendezvous);
        let stream = accept(rendezvous)?;

        self.advance(Stage::Bridging);
        relay(stream, out)?;

        self.advance(Stage::Waiting);
        wait(channel, timeout)
    }
}

impl<C> Session<C> {
    fn expect_stage(&self, expected: Stage) -> Result<()> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(self.invalid_state(expected))
        }
    }

    fn invalid_state(&self, expected: Stage) -> Error {
        Error::InvalidState {
            expected: expected.to_string(),
            actual: self.stage.to_string(),
        }
    }

    fn advance(&mut self, next: Stage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "illegal stage transition {} -> {}",
            self.stage,
            next
        );
        debug!(from = %self.stage, to = %next, "stage transition");
        self.stage = next;
    }
}
