//! Client Connection
//!
//! One TCP stream to a memcached-compatible peer, with its read buffer.

use std::io::{self, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use bytes::Bytes;

use crate::error::{McError, Result};
use crate::protocol::ReadBuffer;

/// Outcome of a liveness probe on an idle connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// Nothing pending and the peer has not closed
    Healthy,

    /// The socket should be discarded
    Stale(&'static str),
}

/// A live connection to a peer
#[derive(Debug)]
pub struct Connection {
    /// TCP stream with accumulated unread bytes
    stream: ReadBuffer<TcpStream>,

    /// Peer address for logging
    peer_addr: SocketAddr,

    /// Set when a response was abandoned part way through
    desynced: bool,
}

impl Connection {
    /// Open a connection
    ///
    /// `connect_timeout` bounds establishment only; `timeout` is then applied
    /// to every read and write. `None` blocks indefinitely.
    pub fn open(
        addr: &str,
        connect_timeout: Option<Duration>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let stream = connect_stream(addr, connect_timeout).map_err(|source| McError::Connection {
            addr: addr.to_string(),
            source,
        })?;

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;
        stream.set_read_timeout(timeout)?;
        stream.set_write_timeout(timeout)?;

        let peer_addr = stream.peer_addr()?;
        tracing::debug!("Connected to {}", peer_addr);

        Ok(Self {
            stream: ReadBuffer::new(stream),
            peer_addr,
            desynced: false,
        })
    }

    /// Check whether an idle connection is still usable.
    ///
    /// Peeks without blocking: EOF means the peer closed the socket, and any
    /// pending byte is junk since no request is outstanding.
    pub fn probe(&mut self) -> Probe {
        if self.desynced {
            return Probe::Stale("previous response abandoned");
        }
        if !self.stream.buffered().is_empty() {
            return Probe::Stale("unread bytes buffered");
        }

        let socket = self.stream.get_ref();
        if socket.set_nonblocking(true).is_err() {
            return Probe::Stale("socket unusable");
        }
        let mut byte = [0u8; 1];
        let peeked = socket.peek(&mut byte);
        if socket.set_nonblocking(false).is_err() {
            return Probe::Stale("socket unusable");
        }

        match peeked {
            Ok(0) => Probe::Stale("closed by peer"),
            Ok(_) => Probe::Stale("unsolicited bytes pending"),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Probe::Healthy,
            Err(_) => Probe::Stale("socket error"),
        }
    }

    /// Write a complete request
    pub fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        let socket = self.stream.get_mut();
        socket.write_all(bytes)?;
        socket.flush()
    }

    /// Read one control line, terminator included
    pub fn read_line(&mut self) -> io::Result<Bytes> {
        self.stream.read_line()
    }

    /// Read exactly `len` bytes
    pub fn read_exact_len(&mut self, len: usize) -> io::Result<Bytes> {
        self.stream.read_exact_len(len)
    }

    /// Apply a new read/write timeout to the live socket
    pub fn set_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        let socket = self.stream.get_ref();
        socket.set_read_timeout(timeout)?;
        socket.set_write_timeout(timeout)
    }

    /// Mark the stream position as unknown; the next probe reports stale
    pub fn mark_desynced(&mut self) {
        self.desynced = true;
    }

    /// Close the socket
    pub fn close(self) {
        tracing::debug!("Closing connection to {}", self.peer_addr);
        // The peer may already be gone
        let _ = self.stream.get_ref().shutdown(Shutdown::Both);
    }
}

fn connect_stream(addr: &str, timeout: Option<Duration>) -> io::Result<TcpStream> {
    let timeout = match timeout {
        Some(timeout) => timeout,
        None => return TcpStream::connect(addr),
    };

    let mut last_err = None;
    for candidate in addr.to_socket_addrs()? {
        match TcpStream::connect_timeout(&candidate, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "could not resolve to any addresses",
        )
    }))
}
