//! Caller identity presented to rexd.
//!
//! rexd authorizes the start call with an AUTH_UNIX credential and runs the
//! command as the uid/gid it carries.

use rex_protocol::{AuthUnix, OpaqueAuth};
use std::time::{SystemTime, UNIX_EPOCH};

/// Default machine name placed in the credential.
pub const DEFAULT_HOSTNAME: &str = "localhost";

/// AUTH_UNIX identity: uid, gid, machine name and supplementary groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// User id to run as.
    pub uid: u32,
    /// Group id to run as.
    pub gid: u32,
    /// Machine name claimed by the caller.
    pub hostname: String,
    /// Supplementary group ids.
    pub groups: Vec<u32>,
}

impl Default for Credential {
    fn default() -> Self {
        Self::new(0, 0, DEFAULT_HOSTNAME)
    }
}

impl Credential {
    /// Identity with `gid` as the only supplementary group.
    pub fn new(uid: u32, gid: u32, hostname: impl Into<String>) -> Self {
        Self {
            uid,
            gid,
            hostname: hostname.into(),
            groups: vec![gid],
        }
    }

    /// Encode as an AUTH_UNIX `opaque_auth`, stamped with the current time.
    pub fn to_auth(&self) -> OpaqueAuth {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or_default();
        AuthUnix {
            stamp,
            machine_name: self.hostname.clone(),
            uid: self.uid,
            gid: self.gid,
            gids: self.groups.clone(),
        }
        .to_opaque()
    }
}
