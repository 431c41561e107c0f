//! ONC RPC version 2 call and reply messages (RFC 5531).
//!
//! Both directions are provided: the client encodes calls and decodes
//! replies, while test doubles and tooling decode calls and encode replies.

use crate::xdr::{XdrDecode, XdrDecoder, XdrEncode, XdrEncoder};
use crate::DecodeError;

/// RPC protocol version carried in every call.
pub const RPC_VERSION: u32 = 2;

/// Maximum size of an authentication body.
pub const MAX_AUTH_BYTES: usize = 400;

/// Maximum AUTH_UNIX machine name length.
pub const MAX_MACHINE_NAME: usize = 255;

/// Maximum AUTH_UNIX supplementary group count.
pub const MAX_GIDS: usize = 16;

const MSG_CALL: u32 = 0;
const MSG_REPLY: u32 = 1;

const MSG_ACCEPTED: u32 = 0;
const MSG_DENIED: u32 = 1;

/// Authentication flavors.
pub mod auth_flavor {
    /// No authentication.
    pub const AUTH_NONE: u32 = 0;
    /// Traditional UNIX uid/gid authentication.
    pub const AUTH_UNIX: u32 = 1;
}

// ============================================================================
// Authentication
// ============================================================================

/// An `opaque_auth` structure: flavor plus flavor-specific body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OpaqueAuth {
    /// Authentication flavor.
    pub flavor: u32,
    /// Encoded flavor body.
    pub body: Vec<u8>,
}

impl OpaqueAuth {
    /// AUTH_NONE with an empty body.
    pub fn none() -> Self {
        Self::default()
    }
}

impl XdrEncode for OpaqueAuth {
    fn encode(&self, enc: &mut XdrEncoder) {
        enc.put_u32(self.flavor);
        enc.put_opaque(&self.body);
    }
}

impl XdrDecode for OpaqueAuth {
    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self, DecodeError> {
        let flavor = dec.get_u32()?;
        let body = dec.get_opaque(MAX_AUTH_BYTES)?.to_vec();
        Ok(Self { flavor, body })
    }
}

/// AUTH_UNIX credential body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUnix {
    /// Arbitrary stamp chosen by the caller.
    pub stamp: u32,
    /// Caller's machine name.
    pub machine_name: String,
    /// Effective user id.
    pub uid: u32,
    /// Effective group id.
    pub gid: u32,
    /// Supplementary group ids.
    pub gids: Vec<u32>,
}

impl AuthUnix {
    /// Wrap into an `opaque_auth` ready for a call header.
    pub fn to_opaque(&self) -> OpaqueAuth {
        OpaqueAuth {
            flavor: auth_flavor::AUTH_UNIX,
            body: crate::xdr::to_bytes(self),
        }
    }

    /// Parse from an `opaque_auth`, if it carries AUTH_UNIX.
    pub fn from_opaque(auth: &OpaqueAuth) -> Result<Self, DecodeError> {
        if auth.flavor != auth_flavor::AUTH_UNIX {
            return Err(DecodeError::Unexpected {
                field: "auth flavor",
                value: auth.flavor,
            });
        }
        crate::xdr::from_bytes(&auth.body)
    }
}

impl XdrEncode for AuthUnix {
    fn encode(&self, enc: &mut XdrEncoder) {
        enc.put_u32(self.stamp);
        enc.put_string(&self.machine_name);
        enc.put_u32(self.uid);
        enc.put_u32(self.gid);
        enc.put_u32(self.gids.len() as u32);
        for gid in &self.gids {
            enc.put_u32(*gid);
        }
    }
}

impl XdrDecode for AuthUnix {
    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self, DecodeError> {
        let stamp = dec.get_u32()?;
        let machine_name = dec.get_string(MAX_MACHINE_NAME)?;
        let uid = dec.get_u32()?;
        let gid = dec.get_u32()?;
        let count = dec.get_u32()? as usize;
        if count > MAX_GIDS {
            return Err(DecodeError::TooLarge(count));
        }
        let gids = (0..count)
            .map(|_| dec.get_u32())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            stamp,
            machine_name,
            uid,
            gid,
            gids,
        })
    }
}

// ============================================================================
// Call
// ============================================================================

/// Header of a call message, everything before the procedure arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallHeader {
    /// Transaction id, echoed by the reply.
    pub xid: u32,
    /// Program number.
    pub program: u32,
    /// Program version.
    pub version: u32,
    /// Procedure number.
    pub procedure: u32,
    /// Caller credential.
    pub credential: OpaqueAuth,
    /// Caller verifier.
    pub verifier: OpaqueAuth,
}

/// Encode a complete call message: header followed by `args`.
pub fn encode_call<A: XdrEncode + ?Sized>(header: &CallHeader, args: &A) -> Vec<u8> {
    let mut enc = XdrEncoder::new();
    enc.put_u32(header.xid);
    enc.put_u32(MSG_CALL);
    enc.put_u32(RPC_VERSION);
    enc.put_u32(header.program);
    enc.put_u32(header.version);
    enc.put_u32(header.procedure);
    enc.put(&header.credential);
    enc.put(&header.verifier);
    enc.put(args);
    enc.into_bytes()
}

/// Decode a call message, returning the header and the undecoded arguments.
pub fn decode_call(data: &[u8]) -> Result<(CallHeader, &[u8]), DecodeError> {
    let mut dec = XdrDecoder::new(data);
    let xid = dec.get_u32()?;
    expect(&mut dec, "message type", MSG_CALL)?;
    expect(&mut dec, "rpc version", RPC_VERSION)?;
    let program = dec.get_u32()?;
    let version = dec.get_u32()?;
    let procedure = dec.get_u32()?;
    let credential = dec.get()?;
    let verifier = dec.get()?;
    let header = CallHeader {
        xid,
        program,
        version,
        procedure,
        credential,
        verifier,
    };
    Ok((header, dec.rest()))
}

fn expect(dec: &mut XdrDecoder<'_>, field: &'static str, wanted: u32) -> Result<(), DecodeError> {
    let value = dec.get_u32()?;
    if value != wanted {
        return Err(DecodeError::Unexpected { field, value });
    }
    Ok(())
}

// ============================================================================
// Reply
// ============================================================================

/// Outcome carried by a reply message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome<'a> {
    /// Call executed; the procedure results follow.
    Success {
        /// Undecoded procedure results.
        results: &'a [u8],
    },
    /// Remote host does not export the program.
    ProgUnavail,
    /// Program exported, but not in the requested version.
    ProgMismatch {
        /// Lowest supported version.
        low: u32,
        /// Highest supported version.
        high: u32,
    },
    /// Program cannot support the requested procedure.
    ProcUnavail,
    /// Server could not decode the arguments.
    GarbageArgs,
    /// Server-side failure such as memory exhaustion.
    SystemErr,
    /// Server does not speak RPC version 2.
    RpcMismatch {
        /// Lowest supported RPC version.
        low: u32,
        /// Highest supported RPC version.
        high: u32,
    },
    /// Server rejected the credential.
    AuthError {
        /// `auth_stat` reason code.
        status: u32,
    },
}

impl std::fmt::Display for ReplyOutcome<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplyOutcome::Success { .. } => write!(f, "success"),
            ReplyOutcome::ProgUnavail => write!(f, "program unavailable"),
            ReplyOutcome::ProgMismatch { low, high } => {
                write!(f, "program/version mismatch (supported {}-{})", low, high)
            }
            ReplyOutcome::ProcUnavail => write!(f, "procedure unavailable"),
            ReplyOutcome::GarbageArgs => write!(f, "server can't decode arguments"),
            ReplyOutcome::SystemErr => write!(f, "remote system error"),
            ReplyOutcome::RpcMismatch { low, high } => {
                write!(f, "rpc version mismatch (supported {}-{})", low, high)
            }
            ReplyOutcome::AuthError { status } => {
                write!(f, "authentication error: {}", auth_stat_message(*status))
            }
        }
    }
}

/// Human-readable text for an `auth_stat` code.
pub fn auth_stat_message(status: u32) -> &'static str {
    match status {
        0 => "ok",
        1 => "bad credential (seal broken)",
        2 => "client must begin new session",
        3 => "bad verifier (seal broken)",
        4 => "verifier expired or replayed",
        5 => "rejected for security reasons",
        6 => "invalid client credential",
        7 => "server failed to authenticate",
        _ => "unknown authentication error",
    }
}

/// A decoded reply message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply<'a> {
    /// Transaction id of the call being answered.
    pub xid: u32,
    /// What the server did with the call.
    pub outcome: ReplyOutcome<'a>,
}

/// Decode a reply message.
pub fn decode_reply(data: &[u8]) -> Result<Reply<'_>, DecodeError> {
    let mut dec = XdrDecoder::new(data);
    let xid = dec.get_u32()?;
    expect(&mut dec, "message type", MSG_REPLY)?;

    let outcome = match dec.get_u32()? {
        MSG_ACCEPTED => {
            let _verifier: OpaqueAuth = dec.get()?;
            match dec.get_u32()? {
                0 => ReplyOutcome::Success { results: dec.rest() },
                1 => ReplyOutcome::ProgUnavail,
                2 => ReplyOutcome::ProgMismatch {
                    low: dec.get_u32()?,
                    high: dec.get_u32()?,
                },
                3 => ReplyOutcome::ProcUnavail,
                4 => ReplyOutcome::GarbageArgs,
                5 => ReplyOutcome::SystemErr,
                other => {
                    return Err(DecodeError::Unexpected {
                        field: "accept status",
                        value: other,
                    })
                }
            }
        }
        MSG_DENIED => match dec.get_u32()? {
            0 => ReplyOutcome::RpcMismatch {
                low: dec.get_u32()?,
                high: dec.get_u32()?,
            },
            1 => ReplyOutcome::AuthError {
                status: dec.get_u32()?,
            },
            other => {
                return Err(DecodeError::Unexpected {
                    field: "reject status",
                    value: other,
                })
            }
        },
        other => {
            return Err(DecodeError::Unexpected {
                field: "reply status",
                value: other,
            })
        }
    };

    Ok(Reply { xid, outcome })
}

/// Encode an accepted, successful reply carrying `results`.
pub fn encode_success_reply<R: XdrEncode + ?Sized>(xid: u32, results: &R) -> Vec<u8> {
    let mut enc = XdrEncoder::new();
    enc.put_u32(xid);
    enc.put_u32(MSG_REPLY);
    enc.put_u32(MSG_ACCEPTED);
    enc.put(&OpaqueAuth::none());
    enc.put_u32(0);
    enc.put(results);
    enc.into_bytes()
}

/// Encode a denied reply rejecting the credential.
pub fn encode_auth_error_reply(xid: u32, status: u32) -> Vec<u8> {
    let mut enc = XdrEncoder::new();
    enc.put_u32(xid);
    enc.put_u32(MSG_REPLY);
    enc.put_u32(MSG_DENIED);
    enc.put_u32(1);
    enc.put_u32(status);
    enc.into_bytes()
}
