//! Loopback test doubles speaking the real wire format.

use rex_protocol::portmap::Mapping;
use rex_protocol::rpc::encode_auth_error_reply;
use rex_protocol::xdr;
use rex_protocol::{
    decode_call, encode_record, encode_success_reply, procedures, read_record, write_record, AuthUnix,
    CallHeader, RexResult, RexStart,
};
use std::io::Write;
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::thread::{self, JoinHandle};
use std::time::Duration;

// ============================================================================
// Scripted RPC server
// ============================================================================

/// How the scripted server answers one call.
pub(crate) enum ServerReply {
    /// Reply with a successful `rex_result`.
    Result(RexResult),
    /// Send a reply with the wrong xid first, then the real one.
    StaleThen(RexResult),
    /// Reject the credential with the given `auth_stat`.
    AuthError(u32),
    /// Send the reply one byte at a time, pausing `delay` before each.
    Trickle { result: RexResult, delay: Duration },
    /// Never answer; keep reading until the client goes away.
    Silent,
    /// Close the connection without answering.
    Hangup,
}

/// A call as the server saw it.
pub(crate) struct RecordedCall {
    pub header: CallHeader,
    pub args: Vec<u8>,
}

pub(crate) struct TestServer {
    addr: SocketAddr,
    handle: JoinHandle<Vec<RecordedCall>>,
}

impl TestServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait for the server thread and return the calls it received.
    pub fn finish(self) -> Vec<RecordedCall> {
        self.handle.join().expect("test server panicked")
    }
}

/// Accept one connection and answer its calls with `replies`, in order.
pub(crate) fn serve_once(replies: Vec<ServerReply>) -> TestServer {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = thread::spawn(move || {
        let (mut conn, _) = listener.accept().unwrap();
        let mut calls = Vec::new();

        for reply in replies {
            let Ok(record) = read_record(&mut conn) else {
                break;
            };
            let (header, args) = decode_call(&record).unwrap();
            let xid = header.xid;
            calls.push(RecordedCall {
                header,
                args: args.to_vec(),
            });

            match reply {
                ServerReply::Result(result) => {
                    write_record(&mut conn, &encode_success_reply(xid, &result)).unwrap();
                }
                ServerReply::StaleThen(result) => {
                    let stale = RexResult::ok(-1);
                    write_record(&mut conn, &encode_success_reply(xid.wrapping_sub(1), &stale))
                        .unwrap();
                    write_record(&mut conn, &encode_success_reply(xid, &result)).unwrap();
                }
                ServerReply::Trickle { result, delay } => {
                    let record = encode_record(&encode_success_reply(xid, &result));
                    for byte in record {
                        thread::sleep(delay);
                        if conn.write_all(&[byte]).is_err() {
                            break;
                        }
                    }
                }
                ServerReply::AuthError(status) => {
                    write_record(&mut conn, &encode_auth_error_reply(xid, status)).unwrap();
                }
                ServerReply::Silent => {
                    while let Ok(record) = read_record(&mut conn) {
                        let (header, args) = decode_call(&record).unwrap();
                        calls.push(RecordedCall {
                            header,
                            args: args.to_vec(),
                        });
                    }
                    break;
                }
                ServerReply::Hangup => break,
            }
        }
        calls
    });

    TestServer { addr, handle }
}

// ============================================================================
// Fake rexd
// ============================================================================

/// How the fake rexd handles START.
#[derive(Clone)]
pub(crate) enum StartBehavior {
    /// Connect back, accept the request, stream `output`, then report
    /// `exit_status` from WAIT.
    Run { output: Vec<u8>, exit_status: i32 },
    /// Refuse the request with a nonzero status.
    Refuse { status: i32, message: String },
    /// Never answer START.
    Ignore,
}

/// Everything the fake rexd observed.
#[derive(Default)]
pub(crate) struct RexdLog {
    /// Procedure numbers in the order they were called.
    pub procedures: Vec<u32>,
    /// Decoded START arguments.
    pub start: Option<RexStart>,
    /// Credential attached to START.
    pub credential: Option<AuthUnix>,
    /// Port the fake successfully connected back to.
    pub connected_port: Option<u16>,
}

pub(crate) struct FakeRexd {
    addr: SocketAddr,
    handle: JoinHandle<RexdLog>,
}

impl FakeRexd {
    pub fn spawn(behavior: StartBehavior) -> Self {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (conn, _) = listener.accept().unwrap();
            serve_rexd(conn, behavior)
        });
        Self { addr, handle }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait for the client to hang up and return what was observed.
    pub fn finish(self) -> RexdLog {
        self.handle.join().expect("fake rexd panicked")
    }
}

fn serve_rexd(mut conn: TcpStream, behavior: StartBehavior) -> RexdLog {
    let mut log = RexdLog::default();

    while let Ok(record) = read_record(&mut conn) {
        let (header, args) = decode_call(&record).unwrap();
        log.procedures.push(header.procedure);

        match header.procedure {
            procedures::START => {
                let start: RexStart = xdr::from_bytes(args).unwrap();
                let port = start.rendezvous_port;
                log.credential = AuthUnix::from_opaque(&header.credential).ok();
                log.start = Some(start);

                match &behavior {
                    StartBehavior::Run { output, .. } => {
                        let mut back = TcpStream::connect((Ipv4Addr::LOCALHOST, port)).unwrap();
                        log.connected_port = Some(port);
                        let reply = encode_success_reply(header.xid, &RexResult::ok(0));
                        write_record(&mut conn, &reply).unwrap();
                        back.write_all(output).unwrap();
                    }
                    StartBehavior::Refuse { status, message } => {
                        let result = RexResult {
                            status: *status,
                            message: message.clone(),
                        };
                        write_record(&mut conn, &encode_success_reply(header.xid, &result))
                            .unwrap();
                    }
                    StartBehavior::Ignore => {}
                }
            }
            procedures::WAIT => {
                let status = match &behavior {
                    StartBehavior::Run { exit_status, .. } => *exit_status,
                    _ => 0,
                };
                write_record(&mut conn, &encode_success_reply(header.xid, &RexResult::ok(status)))
                    .unwrap();
            }
            other => panic!("unexpected procedure {}", other),
        }
    }
    log
}

// ============================================================================
// Fake portmapper
// ============================================================================

pub(crate) struct FakePortmapper {
    addr: SocketAddr,
    handle: JoinHandle<Vec<Mapping>>,
}

impl FakePortmapper {
    /// Answer GETPORT with `port`, silently dropping the first `drop_first`
    /// requests.
    pub fn spawn(port: u32, drop_first: usize) -> Self {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        let addr = socket.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let mut seen = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let (len, from) = socket.recv_from(&mut buf).unwrap();
                let (header, args) = decode_call(&buf[..len]).unwrap();
                assert_eq!(header.program, rex_protocol::portmap::PROGRAM);
                assert_eq!(header.procedure, rex_protocol::portmap::GETPORT);
                seen.push(xdr::from_bytes::<Mapping>(args).unwrap());

                if seen.len() <= drop_first {
                    continue;
                }
                socket
                    .send_to(&encode_success_reply(header.xid, &port), from)
                    .unwrap();
                return seen;
            }
        });

        Self { addr, handle }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn finish(self) -> Vec<Mapping> {
        self.handle.join().expect("fake portmapper panicked")
    }
}
