//! START: ask rexd to run the command.

use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::rpc::{CallChannel, REX_START};
use rex_protocol::{RexResult, RexStart};
use std::time::Duration;
use tracing::debug;

/// Host name sent as the working-directory host: everything before the first
/// `'.'`. Older servers expect the short name.
pub fn working_host(host: &str) -> &str {
    host.split_once('.').map_or(host, |(short, _)| short)
}

/// Build the START arguments.
///
/// The working directory is left to the server's default, and all three I/O
/// ports point at the single rendezvous port. Command arguments are sent as
/// raw bytes and need not be UTF-8.
pub fn build_request<A: AsRef<[u8]>>(
    host: &str,
    command: &[A],
    environment: &[String],
    rendezvous_port: u16,
) -> Result<RexStart> {
    if command.is_empty() {
        return Err(Error::usage("no command given"));
    }

    Ok(RexStart {
        command: command.iter().map(|arg| arg.as_ref().to_vec()).collect(),
        host: working_host(host).to_string(),
        fsname: String::new(),
        dirwithin: String::new(),
        env: environment.to_vec(),
        rendezvous_port,
        flags: 0,
    })
}

/// Send START with `credential` attached.
///
/// A nonzero status means the server refused to run the command; its
/// message is returned as a [`Error::RemoteRefusal`]. On success the server
/// has connected (or is about to connect) to the rendezvous port.
pub fn start<C: CallChannel>(
    channel: &mut C,
    credential: &Credential,
    request: &RexStart,
    timeout: Duration,
) -> Result<()> {
    channel.set_credential(credential);

    let result: RexResult = channel.call(REX_START, request, timeout)?;
    if result.status != 0 {
        debug!(status = result.status, message = %result.message, "start refused");
        return Err(Error::remote_refusal(result.status, result.message));
    }

    debug!(args = request.command.len(), "remote command started");
    Ok(())
}
