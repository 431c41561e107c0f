//! ONC RPC client over TCP.

use super::{lookup_port, CallChannel, Procedure};
use crate::config::SessionConfig;
use crate::credential::Credential;
use crate::error::{Error, Result, TransportErrorKind};
use crate::resolve::Target;
use rex_protocol::xdr::{self, XdrDecode, XdrEncode};
use rex_protocol::{
    decode_reply, encode_call, read_record, write_record, CallHeader, OpaqueAuth, ReplyOutcome,
};
use std::io::{self, Read};
use std::net::{IpAddr, SocketAddr, TcpStream};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Connection-oriented RPC binding to one program/version on one server.
#[derive(Debug)]
pub struct TcpChannel {
    stream: TcpStream,
    peer: SocketAddr,
    program: u32,
    version: u32,
    credential: OpaqueAuth,
    next_xid: u32,
}

impl TcpChannel {
    /// Connect to `addr`, failing if no connection is made within `timeout`.
    pub fn connect(addr: SocketAddr, program: u32, version: u32, timeout: Duration) -> Result<Self> {
        let stream = TcpStream::connect_timeout(&addr, timeout).map_err(|e| {
            let kind = if is_timeout(&e) {
                TransportErrorKind::Timeout
            } else {
                TransportErrorKind::Connect
            };
            Error::transport(kind, format!("connect to {}", addr), e.to_string())
        })?;

        debug!(%addr, program, version, "rpc channel connected");
        Ok(Self {
            stream,
            peer: addr,
            program,
            version,
            credential: OpaqueAuth::none(),
            next_xid: initial_xid(),
        })
    }

    /// Connect to the first reachable address of `target`.
    ///
    /// Without an explicit port, each address's portmapper is asked where the
    /// program lives. Addresses are tried in order; the last failure is
    /// reported if none succeeds.
    pub fn open(
        target: &Target,
        program: u32,
        version: u32,
        config: &SessionConfig,
    ) -> Result<Self> {
        let mut last_err = None;

        for &ip in &target.addresses {
            match Self::open_one(ip, target.port, program, version, config) {
                Ok(channel) => return Ok(channel),
                Err(e) => {
                    warn!(address = %ip, error = %e, "connect attempt failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::resolution(target.host.clone())))
    }

    fn open_one(
        ip: IpAddr,
        port: Option<u16>,
        program: u32,
        version: u32,
        config: &SessionConfig,
    ) -> Result<Self> {
        let port = match port {
            Some(port) => port,
            None => lookup_port(
                SocketAddr::new(ip, config.registry_port),
                program,
                version,
                config,
            )?,
        };
        Self::connect(SocketAddr::new(ip, port), program, version, config.call_timeout)
    }

    /// Address of the connected server.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn take_xid(&mut self) -> u32 {
        let xid = self.next_xid;
        self.next_xid = self.next_xid.wrapping_add(1);
        xid
    }
}

impl CallChannel for TcpChannel {
    fn set_credential(&mut self, credential: &Credential) {
        self.credential = credential.to_auth();
    }

    fn call<Req, Resp>(
        &mut self,
        procedure: Procedure,
        request: &Req,
        timeout: Duration,
    ) -> Result<Resp>
    where
        Req: XdrEncode + ?Sized,
        Resp: XdrDecode,
    {
        let op = format!("call {}", procedure.name);
        let xid = self.take_xid();
        let header = CallHeader {
            xid,
            program: self.program,
            version: self.version,
            procedure: procedure.number,
            credential: self.credential.clone(),
            verifier: OpaqueAuth::none(),
        };
        let message = encode_call(&header, request);
        let deadline = Instant::now() + timeout;

        debug!(procedure = procedure.name, xid, bytes = message.len(), "sending call");

        self.stream
            .set_write_timeout(Some(timeout))
            .map_err(|e| Error::transport(TransportErrorKind::Other, &op, e.to_string()))?;
        write_record(&mut self.stream, &message).map_err(|e| io_failure(&op, e, timeout))?;

        let mut reader = DeadlineReader {
            stream: &self.stream,
            deadline,
        };
        loop {
            let record = read_record(&mut reader).map_err(|e| io_failure(&op, e, timeout))?;
            let reply = decode_reply(&record).map_err(|e| {
                Error::transport(TransportErrorKind::Protocol, &op, e.to_string())
            })?;

            if reply.xid != xid {
                warn!(expected = xid, got = reply.xid, "discarding reply to another call");
                continue;
            }

            return match reply.outcome {
                ReplyOutcome::Success { results } => xdr::from_bytes(results).map_err(|e| {
                    Error::transport(
                        TransportErrorKind::Protocol,
                        &op,
                        format!("cannot decode results: {}", e),
                    )
                }),
                rejected => Err(Error::transport(
                    TransportErrorKind::Rejected,
                    &op,
                    rejected.to_string(),
                )),
            };
        }
    }
}

/// Reads from the channel, failing with `TimedOut` once `deadline` passes.
///
/// The socket timeout is re-armed before every read, so a reply that
/// trickles in cannot stretch a call past its deadline.
struct DeadlineReader<'a> {
    stream: &'a TcpStream,
    deadline: Instant,
}

impl Read for DeadlineReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "call deadline passed"));
        }
        self.stream.set_read_timeout(Some(remaining))?;
        let mut stream = self.stream;
        stream.read(buf)
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

/// Map an I/O failure on the channel to a transport error.
fn io_failure(op: &str, e: io::Error, timeout: Duration) -> Error {
    if is_timeout(&e) {
        return Error::timeout(op, timeout);
    }
    match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            Error::transport(TransportErrorKind::Other, op, "connection closed by server")
        }
        io::ErrorKind::InvalidData => {
            Error::transport(TransportErrorKind::Protocol, op, e.to_string())
        }
        _ => Error::transport(TransportErrorKind::Other, op, e.to_string()),
    }
}

/// Starting transaction id, varied per process so replies to a previous
/// client on a reused port are not mistaken for ours.
fn initial_xid() -> u32 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() ^ d.as_secs() as u32)
        .unwrap_or_default();
    nanos ^ std::process::id()
}
