//! WAIT: collect the remote command's exit status.

use super::ExitStatus;
use crate::error::Result;
use crate::rpc::{CallChannel, REX_WAIT};
use rex_protocol::RexResult;
use std::time::Duration;
use tracing::debug;

/// Call WAIT on the channel used for START.
///
/// The returned status is the remote command's own, not a client error, so a
/// nonzero value is still `Ok`.
pub fn wait<C: CallChannel>(channel: &mut C, timeout: Duration) -> Result<ExitStatus> {
    let result: RexResult = channel.call(REX_WAIT, &(), timeout)?;
    debug!(status = result.status, "remote command finished");
    Ok(ExitStatus::from(result.status))
}
