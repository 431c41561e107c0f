//! Rendezvous endpoint for the server's connect-back.
//!
//! rexd does not send the command's output over the RPC connection. Instead
//! the client opens a listening socket, embeds its port in the start request,
//! and the server connects to it.

use crate::error::{Error, Result};
use std::net::TcpListener;

/// Pending-connection backlog. rexd makes exactly one connection.
pub const RENDEZVOUS_BACKLOG: i32 = 1;

/// A listening socket on an ephemeral port of the wildcard address.
#[derive(Debug)]
pub struct Rendezvous {
    listener: TcpListener,
    port: u16,
}

impl Rendezvous {
    /// Create the endpoint and put it in the listening state.
    pub fn open() -> Result<Self> {
        let listener = listen_wildcard()?;
        let port = listener
            .local_addr()
            .map_err(|e| Error::rendezvous("getsockname", e.to_string()))?
            .port();

        tracing::debug!(port, "rendezvous endpoint listening");
        Ok(Self { listener, port })
    }

    /// Port the server should connect to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The underlying listener.
    pub fn listener(&self) -> &TcpListener {
        &self.listener
    }
}

#[cfg(unix)]
fn listen_wildcard() -> Result<TcpListener> {
    use std::mem;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

    let last_error = || std::io::Error::last_os_error().to_string();

    // std's TcpListener::bind always listens with a large backlog, so the
    // socket is set up by hand.
    unsafe {
        let fd = libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0);
        if fd < 0 {
            return Err(Error::rendezvous("socket", last_error()));
        }
        let fd = OwnedFd::from_raw_fd(fd);

        // Zeroed: INADDR_ANY, port 0.
        let mut addr: libc::sockaddr_in = mem::zeroed();
        addr.sin_family = libc::AF_INET as libc::sa_family_t;

        if libc::bind(
            fd.as_raw_fd(),
            &addr as *const libc::sockaddr_in as *const libc::sockaddr,
            mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        ) < 0
        {
            return Err(Error::rendezvous("bind", last_error()));
        }

        if libc::listen(fd.as_raw_fd(), RENDEZVOUS_BACKLOG) < 0 {
            return Err(Error::rendezvous("listen", last_error()));
        }

        Ok(TcpListener::from(fd))
    }
}

#[cfg(not(unix))]
fn listen_wildcard() -> Result<TcpListener> {
    TcpListener::bind(("0.0.0.0", 0)).map_err(|e| Error::rendezvous("bind", e.to_string()))
}
