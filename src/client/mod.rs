//! Client Module
//!
//! A minimal blocking client for memcached and peers speaking its text
//! protocol.
//!
//! ## Error policy
//! - Arguments are validated before any I/O.
//! - Transport failures close the socket and propagate; the next call
//!   reconnects. Nothing is retried automatically.
//! - Protocol violations are raised once the response has been fully
//!   drained, so the connection stays usable. When that is impossible the
//!   connection is marked desynchronised and replaced on the next call.

mod state;

pub use state::{ConnectionEvent, ConnectionState};

use std::collections::{HashMap, HashSet};
use std::io;
use std::time::Duration;

use bytes::Bytes;

use crate::config::{check_timeout, ClientConfig};
use crate::error::{McError, Result};
use crate::network::{Connection, Probe};
use crate::protocol::{
    encode_command, validate_args, validate_exptime, validate_key, Command, Response, TERMINATOR,
};

/// Result of a `stats` call
pub type StatsMap = HashMap<String, Option<String>>;

/// A single-connection client
///
/// The socket is opened lazily by the first command and transparently
/// replaced when it is found dead or desynchronised.
///
/// ```no_run
/// use mcwire::{Client, ClientConfig};
/// use std::time::Duration;
///
/// let config = ClientConfig::builder()
///     .addr("127.0.0.1:11211")
///     .timeout(Duration::from_secs(1))
///     .build()?;
/// let mut client = Client::new(config);
///
/// client.set("some_key", b"Some value")?;
/// assert_eq!(client.get("some_key")?, Some(b"Some value".to_vec()));
/// client.delete("another_key")?;
/// # Ok::<(), mcwire::McError>(())
/// ```
#[derive(Debug)]
pub struct Client {
    config: ClientConfig,
    state: ConnectionState,
    conn: Option<Connection>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Disconnected,
            conn: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Peer address operations are sent to
    pub fn addr(&self) -> &str {
        &self.config.addr
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.config.timeout
    }

    /// Change the read/write timeout.
    ///
    /// Remembered for future connections even if applying it to the live
    /// socket fails.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        check_timeout("timeout", timeout)?;
        self.config.timeout = timeout;
        let applied = match self.conn.as_ref() {
            Some(conn) => conn.set_timeout(timeout),
            None => Ok(()),
        };
        applied.map_err(|e| self.fail(e))
    }

    // =========================================================================
    // Connection Management
    // =========================================================================

    /// Open a fresh connection, discarding any existing one and its
    /// buffered bytes
    pub fn connect(&mut self) -> Result<()> {
        self.close();
        self.transition(ConnectionEvent::ConnectStarted);

        match Connection::open(
            &self.config.addr,
            self.config.effective_connect_timeout(),
            self.config.timeout,
        ) {
            Ok(conn) => {
                self.conn = Some(conn);
                self.transition(ConnectionEvent::Connected);
                Ok(())
            }
            Err(e) => {
                tracing::debug!("Connect to {} failed: {}", self.config.addr, e);
                self.transition(ConnectionEvent::ConnectFailed);
                Err(e)
            }
        }
    }

    /// Close the socket if open. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.close();
        }
        self.transition(ConnectionEvent::Closed);
    }

    /// Make sure a usable socket exists, replacing a stale one
    fn ensure_ready(&mut self) -> Result<()> {
        match self.conn.as_mut().map(Connection::probe) {
            Some(Probe::Healthy) => self.transition(ConnectionEvent::ProbeHealthy),
            Some(Probe::Stale(reason)) => {
                tracing::debug!("Dropping stale connection to {}: {}", self.config.addr, reason);
                self.transition(ConnectionEvent::ProbeStale);
            }
            None => {}
        }
        if self.state.needs_close() || (self.conn.is_none() && !self.state.needs_connect()) {
            self.close();
        }
        if self.state.needs_connect() {
            self.connect()?;
        }
        Ok(())
    }

    fn transition(&mut self, event: ConnectionEvent) {
        let next = self.state.on(event);
        if next != self.state {
            tracing::trace!("Connection state {:?} -> {:?} on {:?}", self.state, next, event);
        }
        self.state = next;
    }

    /// Record a transport failure: the socket is closed before the error
    /// reaches the caller
    fn fail(&mut self, err: io::Error) -> McError {
        tracing::debug!("Transport error on {}: {}", self.config.addr, err);
        self.transition(ConnectionEvent::TransportError);
        self.close();
        McError::Io(err)
    }

    /// Raise a protocol error for a response that could not be drained
    fn abandon(&mut self, reason: &str, line: &[u8]) -> McError {
        tracing::warn!(
            "Abandoning response from {}: {} '{}'",
            self.config.addr,
            reason,
            line.escape_ascii()
        );
        if let Some(conn) = self.conn.as_mut() {
            conn.mark_desynced();
        }
        McError::protocol(reason, line)
    }

    // =========================================================================
    // I/O Helpers
    // =========================================================================

    /// Send a command and return the first response line
    fn request(&mut self, command: &Command) -> Result<Bytes> {
        self.ensure_ready()?;
        tracing::trace!("Sending {} to {}", command.command_type(), self.config.addr);

        let bytes = encode_command(command);
        let sent = match self.conn.as_mut() {
            Some(conn) => conn.send(&bytes),
            None => Err(not_connected()),
        };
        sent.map_err(|e| self.fail(e))?;
        self.read_line()
    }

    fn read_line(&mut self) -> Result<Bytes> {
        let line = match self.conn.as_mut() {
            Some(conn) => conn.read_line(),
            None => Err(not_connected()),
        };
        line.map_err(|e| self.fail(e))
    }

    /// Read a data block of `len` bytes plus its terminator, which is
    /// checked and stripped
    fn read_block(&mut self, len: usize) -> Result<Bytes> {
        let total = match len.checked_add(TERMINATOR.len()) {
            Some(total) => total,
            None => return Err(self.abandon("data block too large", len.to_string().as_bytes())),
        };
        let block = match self.conn.as_mut() {
            Some(conn) => conn.read_exact_len(total),
            None => Err(not_connected()),
        };
        let mut block = block.map_err(|e| self.fail(e))?;
        if &block[len..] != TERMINATOR {
            return Err(self.abandon("data block not terminated", &block[len..]));
        }
        block.truncate(len);
        Ok(block)
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Get a single value; `None` if the key is absent
    pub fn get<K: AsRef<[u8]>>(&mut self, key: K) -> Result<Option<Vec<u8>>> {
        let mut values = self.multi_get(&[key])?;
        Ok(values.pop().flatten())
    }

    /// Get several values in one round trip.
    ///
    /// The result is aligned with `keys`, with `None` for each absent key.
    pub fn multi_get<K: AsRef<[u8]>>(&mut self, keys: &[K]) -> Result<Vec<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        for key in keys {
            validate_key(key.as_ref())?;
        }
        let mut unique = HashSet::with_capacity(keys.len());
        if !keys.iter().all(|k| unique.insert(k.as_ref())) {
            // Replies are matched by key, so duplicates would be ambiguous
            return Err(McError::Protocol("duplicate keys passed to multi_get".to_string()));
        }

        let command = Command::Get {
            keys: keys.iter().map(|k| k.as_ref().to_vec()).collect(),
        };
        let mut line = self.request(&command)?;

        let mut received: HashMap<Vec<u8>, Vec<u8>> = HashMap::with_capacity(keys.len());
        // Deferred until END so the next command starts on a clean stream
        let mut deferred: Option<McError> = None;

        loop {
            match Response::parse(&line) {
                Some(Response::End) => break,
                Some(Response::Value { key, flags, bytes }) => {
                    let data = self.read_block(bytes)?;
                    if flags != 0 && deferred.is_none() {
                        // Usually items written by a different client library
                        deferred = Some(McError::protocol("received non zero flags", &key));
                    }
                    if received.contains_key(&key) && deferred.is_none() {
                        deferred = Some(McError::protocol("duplicate results from server", &key));
                    }
                    received.insert(key, data.to_vec());
                }
                Some(resp) if resp.is_error() && received.is_empty() => {
                    return Err(McError::protocol("get failed", &line));
                }
                _ => return Err(self.abandon("get failed", &line)),
            }
            line = self.read_line()?;
        }

        if let Some(err) = deferred {
            tracing::warn!("Rejecting get response from {}: {}", self.config.addr, err);
            return Err(err);
        }
        if received.len() > keys.len() {
            return Err(McError::Protocol(format!(
                "received too many responses: {} for {} keys",
                received.len(),
                keys.len()
            )));
        }

        if keys.len() == 1 && received.len() == 1 && self.config.single_key_by_position {
            return Ok(received.into_values().map(Some).collect());
        }
        Ok(keys.iter().map(|k| received.remove(k.as_ref())).collect())
    }

    /// Store a value that never expires
    pub fn set<K: AsRef<[u8]>>(&mut self, key: K, value: &[u8]) -> Result<()> {
        self.set_with_exptime(key, value, 0)
    }

    /// Store a value with an expiry.
    ///
    /// `exptime` is seconds from now, or an absolute Unix time when larger
    /// than 30 days; 0 means never. Values are raw bytes; the size limit is
    /// left to the peer.
    pub fn set_with_exptime<K: AsRef<[u8]>>(
        &mut self,
        key: K,
        value: &[u8],
        exptime: i64,
    ) -> Result<()> {
        let key = key.as_ref();
        validate_key(key)?;
        let exptime = validate_exptime(exptime)?;

        let command = Command::Set {
            key: key.to_vec(),
            flags: 0,
            exptime: i64::from(exptime),
            value: value.to_vec(),
            noreply: false,
        };
        let line = self.request(&command)?;
        match Response::parse(&line) {
            Some(Response::Stored) => Ok(()),
            Some(_) => Err(McError::protocol("set failed", &line)),
            None => Err(self.abandon("set failed", &line)),
        }
    }

    /// Delete a key. Deleting an absent key succeeds.
    pub fn delete<K: AsRef<[u8]>>(&mut self, key: K) -> Result<()> {
        let key = key.as_ref();
        validate_key(key)?;

        let command = Command::Delete {
            key: key.to_vec(),
            noreply: false,
        };
        let line = self.request(&command)?;
        match Response::parse(&line) {
            Some(Response::Deleted) | Some(Response::NotFound) => Ok(()),
            Some(_) => Err(McError::protocol("delete failed", &line)),
            None => Err(self.abandon("delete failed", &line)),
        }
    }

    /// Run `stats`, with `args` passed verbatim (e.g. `"slabs"`)
    pub fn stats(&mut self, args: Option<&str>) -> Result<StatsMap> {
        if let Some(args) = args {
            validate_args(args)?;
        }

        let command = Command::Stats {
            args: args.map(str::to_string),
        };
        let mut line = self.request(&command)?;
        let mut stats = StatsMap::new();

        loop {
            match Response::parse(&line) {
                Some(Response::End) => return Ok(stats),
                Some(Response::Stat { name, value }) => {
                    stats.insert(name, value);
                }
                Some(resp) if resp.is_error() && stats.is_empty() => {
                    return Err(McError::protocol("stats failed", &line));
                }
                _ => return Err(self.abandon("stats failed", &line)),
            }
            line = self.read_line()?;
        }
    }

    /// Invalidate every item on the peer
    pub fn flush_all(&mut self) -> Result<()> {
        let line = self.request(&Command::FlushAll { noreply: false })?;
        match Response::parse(&line) {
            Some(Response::Ok) => Ok(()),
            Some(_) => Err(McError::protocol("flush_all failed", &line)),
            None => Err(self.abandon("flush_all failed", &line)),
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "not connected")
}
