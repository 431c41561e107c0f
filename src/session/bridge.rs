//! Output bridge: remote stdout to local output.

use crate::error::{Error, Result};
use crate::rendezvous::Rendezvous;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use tracing::debug;

/// Read buffer size.
pub const BRIDGE_BUFFER_SIZE: usize = 8192;

/// Accept the server's connection and close the listening endpoint.
///
/// Blocks without a timeout: a server that never connects back leaves the
/// client waiting here.
pub fn accept(rendezvous: Rendezvous) -> Result<TcpStream> {
    let (stream, peer) = rendezvous
        .listener()
        .accept()
        .map_err(|e| Error::bridge("accept", e))?;
    drop(rendezvous);

    debug!(%peer, "server connected to rendezvous port");
    Ok(stream)
}

/// Copy everything the server sends to `out` until it closes the connection.
///
/// The write half is shut down first so the remote command sees end of input
/// on stdin. Bytes are written unchanged and in order. Returns the number of
/// bytes copied.
pub fn relay<W: Write>(mut stream: TcpStream, out: &mut W) -> Result<u64> {
    if let Err(e) = stream.shutdown(Shutdown::Write) {
        debug!(error = %e, "shutdown of write half failed");
    }

    let mut buf = vec![0u8; BRIDGE_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::bridge("read", e)),
        };
        out.write_all(&buf[..n])
            .map_err(|e| Error::bridge("write", e))?;
        total += n as u64;
    }
    out.flush().map_err(|e| Error::bridge("flush", e))?;

    debug!(bytes = total, "remote output drained");
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::thread;

    /// Writer that fails every write.
    struct BrokenOutput;

    impl Write for BrokenOutput {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdout closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn connect_and_send(port: u16, payload: Vec<u8>) -> thread::JoinHandle<Vec<u8>> {
        thread::spawn(move || {
            let mut stream = TcpStream::connect((Ipv4Addr::LOCALHOST, port)).unwrap();
            stream.write_all(&payload).unwrap();
            stream.shutdown(Shutdown::Write).unwrap();
            // Whatever the client sends before closing its side.
            let mut received = Vec::new();
            stream.read_to_end(&mut received).unwrap();
            received
        })
    }

    #[test]
    fn test_relay_is_byte_exact() {
        let payload: Vec<u8> = (0..3 * BRIDGE_BUFFER_SIZE + 17)
            .map(|i| (i % 251) as u8)
            .chain([0, 0, b'\n', 0])
            .collect();

        let rendezvous = Rendezvous::open().unwrap();
        let remote = connect_and_send(rendezvous.port(), payload.clone());

        let stream = accept(rendezvous).unwrap();
        let mut out = Vec::new();
        let copied = relay(stream, &mut out).unwrap();

        assert_eq!(copied, payload.len() as u64);
        assert_eq!(out, payload);
        assert!(remote.join().unwrap().is_empty(), "client must send nothing");
    }

    #[test]
    fn test_relay_empty_stream() {
        let rendezvous = Rendezvous::open().unwrap();
        let remote = connect_and_send(rendezvous.port(), Vec::new());

        let stream = accept(rendezvous).unwrap();
        let mut out = Vec::new();
        assert_eq!(relay(stream, &mut out).unwrap(), 0);
        assert!(out.is_empty());
        remote.join().unwrap();
    }

    #[test]
    fn test_remote_sees_end_of_input() {
        let rendezvous = Rendezvous::open().unwrap();
        let port = rendezvous.port();
        let remote = thread::spawn(move || {
            let mut stream = TcpStream::connect((Ipv4Addr::LOCALHOST, port)).unwrap();
            // Blocks until the client shuts down its write half.
            let mut stdin = Vec::new();
            stream.read_to_end(&mut stdin).unwrap();
            stream.write_all(b"done").unwrap();
            stdin
        });

        let stream = accept(rendezvous).unwrap();
        let mut out = Vec::new();
        relay(stream, &mut out).unwrap();

        assert_eq!(out, b"done");
        assert!(remote.join().unwrap().is_empty());
    }

    #[test]
    fn test_write_failure_is_fatal() {
        let rendezvous = Rendezvous::open().unwrap();
        let remote = connect_and_send(rendezvous.port(), b"some output".to_vec());

        let stream = accept(rendezvous).unwrap();
        let err = relay(stream, &mut BrokenOutput).unwrap_err();
        assert!(matches!(err, Error::Bridge { .. }));
        assert!(err.to_string().contains("write"), "got: {}", err);
        let _ = remote.join();
    }
}
