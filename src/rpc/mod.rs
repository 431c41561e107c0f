//! RPC call channel to the remote execution service.
//!
//! The session only needs "invoke procedure P with a typed request, get a
//! typed response or fail within a timeout". [`CallChannel`] captures that,
//! and [`TcpChannel`] implements it with ONC RPC over TCP, wire-compatible
//! with legacy rexd.

mod channel;
mod portmap;

#[cfg(test)]
pub(crate) mod testing;

pub use channel::TcpChannel;
pub use portmap::lookup_port;

use crate::credential::Credential;
use crate::error::Result;
use rex_protocol::xdr::{XdrDecode, XdrEncode};
use rex_protocol::procedures;
use std::time::Duration;

/// A remote procedure: its number plus a name for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Procedure {
    /// Procedure number within the program.
    pub number: u32,
    /// Short name used in logs and error messages.
    pub name: &'static str,
}

/// rexd START.
pub const REX_START: Procedure = Procedure {
    number: procedures::START,
    name: "start",
};

/// rexd WAIT.
pub const REX_WAIT: Procedure = Procedure {
    number: procedures::WAIT,
    name: "wait",
};

/// Typed request/response exchange with a remote program.
pub trait CallChannel {
    /// Attach the identity sent with every subsequent call.
    fn set_credential(&mut self, credential: &Credential);

    /// Invoke `procedure` and block until the reply arrives or `timeout` elapses.
    ///
    /// Any failure is final for the channel; callers do not retry.
    fn call<Req, Resp>(
        &mut self,
        procedure: Procedure,
        request: &Req,
        timeout: Duration,
    ) -> Result<Resp>
    where
        Req: XdrEncode + ?Sized,
        Resp: XdrDecode;
}
