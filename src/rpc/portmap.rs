//! Service port discovery through the portmapper.
//!
//! GETPORT goes over UDP, like the classic client library does. Datagrams
//! can be lost, so the request is resent every `registry_retransmit` until
//! `registry_timeout` runs out.

use crate::config::SessionConfig;
use crate::error::{Error, Result, TransportErrorKind};
use rex_protocol::portmap::{self, Mapping};
use rex_protocol::xdr;
use rex_protocol::{decode_reply, encode_call, CallHeader, OpaqueAuth, ReplyOutcome};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::Instant;
use tracing::{debug, warn};

const OPERATION: &str = "portmap getport";

/// Largest reply datagram accepted.
const MAX_DATAGRAM: usize = 8800;

/// Ask the portmapper at `registry` for the TCP port of `program`/`version`.
pub fn lookup_port(
    registry: SocketAddr,
    program: u32,
    version: u32,
    config: &SessionConfig,
) -> Result<u16> {
    let transport = |e: io::Error| Error::transport(TransportErrorKind::Other, OPERATION, e.to_string());

    let local: SocketAddr = if registry.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(local).map_err(transport)?;
    socket.connect(registry).map_err(transport)?;

    let xid = std::process::id().rotate_left(16) ^ program;
    let header = CallHeader {
        xid,
        program: portmap::PROGRAM,
        version: portmap::VERSION,
        procedure: portmap::GETPORT,
        credential: OpaqueAuth::none(),
        verifier: OpaqueAuth::none(),
    };
    let request = encode_call(&header, &Mapping::tcp(program, version));

    let deadline = Instant::now() + config.registry_timeout;
    let mut buf = vec![0u8; MAX_DATAGRAM];

    'send: loop {
        debug!(%registry, program, version, "sending getport");
        socket.send(&request).map_err(transport)?;
        let resend_at = Instant::now() + config.registry_retransmit;

        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::timeout(OPERATION, config.registry_timeout));
            }
            if now >= resend_at {
                continue 'send;
            }
            socket
                .set_read_timeout(Some(resend_at.min(deadline) - now))
                .map_err(transport)?;

            let len = match socket.recv(&mut buf) {
                Ok(len) => len,
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    continue
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                    return Err(Error::transport(
                        TransportErrorKind::Connect,
                        OPERATION,
                        format!("portmapper unreachable at {}", registry),
                    ))
                }
                Err(e) => return Err(transport(e)),
            };

            let reply = match decode_reply(&buf[..len]) {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(error = %e, "ignoring malformed portmapper reply");
                    continue;
                }
            };
            if reply.xid != xid {
                continue;
            }

            let results = match reply.outcome {
                ReplyOutcome::Success { results } => results,
                rejected => {
                    return Err(Error::transport(
                        TransportErrorKind::Rejected,
                        OPERATION,
                        rejected.to_string(),
                    ))
                }
            };
            let port: u32 = xdr::from_bytes(results).map_err(|e| {
                Error::transport(TransportErrorKind::Protocol, OPERATION, e.to_string())
            })?;

            return match port {
                0 => Err(Error::transport(
                    TransportErrorKind::NotRegistered,
                    OPERATION,
                    format!("program {} version {} is not registered", program, version),
                )),
                port => u16::try_from(port).map_err(|_| {
                    Error::transport(
                        TransportErrorKind::Protocol,
                        OPERATION,
                        format!("port out of range: {}", port),
                    )
                }),
            }
            .inspect(|port| debug!(port, "service port discovered"));
        }
    }
}
