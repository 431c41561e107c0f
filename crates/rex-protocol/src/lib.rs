//! Protocol types for the rexd remote execution service.
//!
//! rexd is an ONC RPC program. Calls travel over TCP using record marking,
//! and every message body is XDR encoded.
//!
//! ```text
//! client                                   rexd
//!   |  START(rex_start) ------------------->  |
//!   |                      <---- connect ---  |  to rst_port0..2
//!   |  <------------------- rex_result        |
//!   |  <=========== command stdout ========== |
//!   |  WAIT(void) ------------------------->  |
//!   |  <------------------- rex_result        |  rlt_stat = exit status
//! ```
//!
//! The service port is normally discovered from the portmapper, see
//! [`portmap`].

#![deny(missing_docs)]

pub mod record;
pub mod rpc;
pub mod xdr;

use xdr::{XdrDecode, XdrDecoder, XdrEncode, XdrEncoder};

pub use record::{encode_record, read_record, write_record, MAX_RECORD_SIZE};
pub use rpc::{
    decode_call, decode_reply, encode_call, encode_success_reply, AuthUnix, CallHeader,
    OpaqueAuth, Reply, ReplyOutcome,
};

/// rexd program number.
pub const REX_PROGRAM: u32 = 100017;

/// rexd program version.
pub const REX_VERSION: u32 = 1;

/// Maximum length of any rexd string.
pub const REX_STRING_SIZE: usize = 1024;

/// Maximum number of entries in a command or environment list.
const REX_MAX_LIST: usize = 1024;

/// rexd procedure numbers.
pub mod procedures {
    /// Start a command.
    pub const START: u32 = 1;
    /// Wait for the command to finish and collect its status.
    pub const WAIT: u32 = 2;
}

// ============================================================================
// rexd Messages
// ============================================================================

/// Arguments of the START procedure (`rex_start`).
///
/// The wire format has separate ports for stdin, stdout and stderr. This
/// client funnels all three through one connection, so a single
/// `rendezvous_port` is written into every port field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RexStart {
    /// Command and arguments, as raw bytes.
    pub command: Vec<Vec<u8>>,
    /// Host whose file system holds the working directory.
    pub host: String,
    /// File system name of the working directory (empty for default).
    pub fsname: String,
    /// Working directory offset within `fsname` (empty for default).
    pub dirwithin: String,
    /// Environment as `KEY=VALUE` entries.
    pub env: Vec<String>,
    /// Port the server connects back to for the command's I/O.
    pub rendezvous_port: u16,
    /// Option flags; no flags are defined for this client.
    pub flags: u32,
}

impl XdrEncode for RexStart {
    fn encode(&self, enc: &mut XdrEncoder) {
        enc.put_string_array(&self.command);
        enc.put_string(&self.host);
        enc.put_string(&self.fsname);
        enc.put_string(&self.dirwithin);
        enc.put_string_array(&self.env);
        for _ in 0..3 {
            enc.put_u16(self.rendezvous_port);
        }
        enc.put_u32(self.flags);
    }
}

impl XdrDecode for RexStart {
    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self, DecodeError> {
        let command = dec.get_opaque_array(REX_MAX_LIST, REX_STRING_SIZE)?;
        let host = dec.get_string(REX_STRING_SIZE)?;
        let fsname = dec.get_string(REX_STRING_SIZE)?;
        let dirwithin = dec.get_string(REX_STRING_SIZE)?;
        let env = dec.get_string_array(REX_MAX_LIST, REX_STRING_SIZE)?;
        let rendezvous_port = dec.get_u16()?;
        for field in ["rst_port1", "rst_port2"] {
            let port = dec.get_u16()?;
            if port != rendezvous_port {
                return Err(DecodeError::Unexpected {
                    field,
                    value: u32::from(port),
                });
            }
        }
        let flags = dec.get_u32()?;
        Ok(Self {
            command,
            host,
            fsname,
            dirwithin,
            env,
            rendezvous_port,
            flags,
        })
    }
}

/// Result of the START and WAIT procedures (`rex_result`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RexResult {
    /// Zero on success. For WAIT, the command's exit status.
    pub status: i32,
    /// Diagnostic text, meaningful only when `status` is nonzero. Bytes that
    /// are not UTF-8 are replaced when decoding.
    pub message: String,
}

impl RexResult {
    /// A successful result with no message.
    pub fn ok(status: i32) -> Self {
        Self {
            status,
            message: String::new(),
        }
    }
}

impl XdrEncode for RexResult {
    fn encode(&self, enc: &mut XdrEncoder) {
        enc.put_i32(self.status);
        enc.put_string(&self.message);
    }
}

impl XdrDecode for RexResult {
    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self, DecodeError> {
        let status = dec.get_i32()?;
        let message = dec.get_string_lossy(REX_STRING_SIZE)?;
        Ok(Self { status, message })
    }
}

// ============================================================================
// Portmapper
// ============================================================================

/// Portmapper (rpcbind version 2) definitions.
pub mod portmap {
    use super::*;

    /// Portmapper program number.
    pub const PROGRAM: u32 = 100000;
    /// Portmapper version.
    pub const VERSION: u32 = 2;
    /// Well-known portmapper port.
    pub const PORT: u16 = 111;
    /// GETPORT procedure.
    pub const GETPORT: u32 = 3;
    /// Protocol number for TCP.
    pub const IPPROTO_TCP: u32 = 6;

    /// Arguments of GETPORT (`struct mapping`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Mapping {
        /// Program number.
        pub program: u32,
        /// Program version.
        pub version: u32,
        /// Transport protocol number.
        pub protocol: u32,
        /// Port; ignored by GETPORT.
        pub port: u32,
    }

    impl Mapping {
        /// Query mapping for a TCP service.
        pub fn tcp(program: u32, version: u32) -> Self {
            Self {
                program,
                version,
                protocol: IPPROTO_TCP,
                port: 0,
            }
        }
    }

    impl XdrEncode for Mapping {
        fn encode(&self, enc: &mut XdrEncoder) {
            enc.put_u32(self.program);
            enc.put_u32(self.version);
            enc.put_u32(self.protocol);
            enc.put_u32(self.port);
        }
    }

    impl XdrDecode for Mapping {
        fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self, DecodeError> {
            Ok(Self {
                program: dec.get_u32()?,
                version: dec.get_u32()?,
                protocol: dec.get_u32()?,
                port: dec.get_u32()?,
            })
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error decoding a wire message.
#[derive(Debug)]
pub enum DecodeError {
    /// Input ended before the item was complete.
    Truncated {
        /// Bytes the item needs.
        needed: usize,
        /// Bytes left in the input.
        available: usize,
    },
    /// Length or count exceeds the protocol maximum.
    TooLarge(usize),
    /// A discriminant or fixed field had an unexpected value.
    Unexpected {
        /// Field being decoded.
        field: &'static str,
        /// Value found.
        value: u32,
    },
    /// A value does not fit the target type.
    OutOfRange {
        /// Field being decoded.
        field: &'static str,
        /// Value found.
        value: u32,
    },
    /// String is not valid UTF-8.
    InvalidUtf8,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Truncated { needed, available } => write!(
                f,
                "truncated message: needed {} bytes, {} available",
                needed, available
            ),
            DecodeError::TooLarge(size) => write!(f, "length too large: {}", size),
            DecodeError::Unexpected { field, value } => {
                write!(f, "unexpected {}: {}", field, value)
            }
            DecodeError::OutOfRange { field, value } => {
                write!(f, "{} out of range: {}", field, value)
            }
            DecodeError::InvalidUtf8 => write!(f, "string is not valid utf-8"),
        }
    }
}

impl std::error::Error for DecodeError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_start() -> RexStart {
        RexStart {
            command: vec![b"cat".to_vec(), b"/etc/motd".to_vec()],
            host: "server".to_string(),
            fsname: String::new(),
            dirwithin: String::new(),
            env: vec!["PATH=/bin".to_string()],
            rendezvous_port: 40000,
            flags: 0,
        }
    }

    #[test]
    fn test_rex_start_wire_tail() {
        let bytes = xdr::to_bytes(&sample_start());
        // Three ports and the flags word close out the structure.
        let tail: Vec<u32> = bytes[bytes.len() - 16..]
            .chunks(4)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(tail, vec![40000, 40000, 40000, 0]);
    }

    #[test]
    fn test_rex_start_decodes_what_was_encoded() {
        let start = sample_start();
        let decoded: RexStart = xdr::from_bytes(&xdr::to_bytes(&start)).unwrap();
        assert_eq!(decoded, start);
    }

    #[test]
    fn test_rex_start_rejects_split_ports() {
        let mut bytes = xdr::to_bytes(&sample_start());
        let len = bytes.len();
        // Rewrite rst_port2.
        bytes[len - 8..len - 4].copy_from_slice(&40001u32.to_be_bytes());
        let err = xdr::from_bytes::<RexStart>(&bytes).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Unexpected {
                field: "rst_port2",
                value: 40001
            }
        ));
    }

    #[test]
    fn test_rex_result_layout() {
        let result = RexResult {
            status: 7,
            message: "no such user".to_string(),
        };
        let bytes = xdr::to_bytes(&result);
        assert_eq!(&bytes[..8], &[0, 0, 0, 7, 0, 0, 0, 12]);
        assert_eq!(&bytes[8..], b"no such user");
    }

    #[test]
    fn test_rex_result_message_need_not_be_utf8() {
        let bytes = [0, 0, 0, 7, 0, 0, 0, 4, b'c', b'a', b'f', 0xe9];
        let result: RexResult = xdr::from_bytes(&bytes).unwrap();
        assert_eq!(result.status, 7);
        assert!(result.message.starts_with("caf"), "got: {:?}", result.message);
    }

    #[test]
    fn test_rex_start_command_is_bytes() {
        let mut start = sample_start();
        start.command = vec![b"ls".to_vec(), vec![b'f', 0xe9, b'e']];
        let decoded: RexStart = xdr::from_bytes(&xdr::to_bytes(&start)).unwrap();
        assert_eq!(decoded.command, start.command);
    }

    #[test]
    fn test_getport_mapping_layout() {
        let bytes = xdr::to_bytes(&portmap::Mapping::tcp(REX_PROGRAM, REX_VERSION));
        assert_eq!(
            bytes,
            [
                REX_PROGRAM.to_be_bytes(),
                REX_VERSION.to_be_bytes(),
                6u32.to_be_bytes(),
                0u32.to_be_bytes()
            ]
            .concat()
        );
    }

    #[test]
    fn test_constants() {
        assert_eq!(REX_PROGRAM, 100017);
        assert_eq!(REX_VERSION, 1);
        assert_eq!(procedures::START, 1);
        assert_eq!(procedures::WAIT, 2);
        assert_eq!(portmap::PORT, 111);
    }

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::Truncated {
            needed: 4,
            available: 1,
        };
        assert!(err.to_string().contains("truncated"));
        assert!(DecodeError::InvalidUtf8.to_string().contains("utf-8"));
    }
}
