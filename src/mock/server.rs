//! Mock Server
//!
//! A single-threaded memcached stand-in for fault-injection tests.
//!
//! ## Lifecycle
//! ```text
//! Listening ──accept──► Accepted ──► Serving ──client gone──► Closed
//! ```
//! In `Sequential` mode `Closed` is only reached at shutdown; between
//! connections the server goes back to `Listening`. After its connection
//! ends a `Once` server stays alive, idle, until shutdown is signalled.

use std::io::{self, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;

use super::store::Store;
use crate::config::{AcceptMode, MockServerConfig};
use crate::error::{McError, Result};
use crate::protocol::{decode_command, encode_value, Command, ReadBuffer, Response};

/// How often blocked accepts and reads look for a shutdown signal
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Observable server state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Listening,
    Accepted,
    Serving,
    Closed,
}

/// Why a connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Disconnected,
    Rejected,
    Shutdown,
}

/// State shared between the serving thread and its handle
#[derive(Debug)]
struct Shared {
    store: Mutex<Store>,
    state: Mutex<ServerState>,
}

impl Shared {
    fn set_state(&self, state: ServerState) {
        let mut current = self.state.lock();
        if *current != state {
            tracing::debug!("Mock server {:?} -> {:?}", *current, state);
            *current = state;
        }
    }
}

/// A bound, not yet running, mock server
#[derive(Debug)]
pub struct MockServer {
    config: MockServerConfig,
    listener: TcpListener,
    local_addr: SocketAddr,
    shared: Arc<Shared>,
}

impl MockServer {
    /// Bind the listening socket
    pub fn bind(config: MockServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr)?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            config,
            listener,
            local_addr,
            shared: Arc::new(Shared {
                store: Mutex::new(Store::new()),
                state: Mutex::new(ServerState::Listening),
            }),
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run on a background thread
    pub fn spawn(self) -> Result<MockServerHandle> {
        let (shutdown_tx, shutdown_rx) = channel::bounded(1);
        let local_addr = self.local_addr;
        let shared = Arc::clone(&self.shared);

        let thread = thread::Builder::new()
            .name(format!("mcwire-mock-{}", local_addr.port()))
            .spawn(move || self.run(shutdown_rx))?;

        Ok(MockServerHandle {
            local_addr,
            shared,
            shutdown_tx: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    /// Run on the current thread until `shutdown` receives a message or
    /// its sender is dropped
    pub fn run(self, shutdown: Receiver<()>) -> Result<()> {
        let MockServer {
            config,
            listener,
            local_addr,
            shared,
        } = self;

        listener.set_nonblocking(true)?;
        tracing::info!(
            "Mock server on {} ({:?}, get delay {:?})",
            local_addr,
            config.accept_mode,
            config.get_delay
        );

        match config.accept_mode {
            AcceptMode::Refuse => {
                // Listener stays open so handshakes land in the backlog
                tracing::info!("Not accepting connections on {}", local_addr);
                let _ = shutdown.recv();
            }
            AcceptMode::Once => {
                if let Some(stream) = accept(&listener, &shutdown)? {
                    drop(listener);
                    shared.set_state(ServerState::Accepted);
                    if serve(stream, &config, &shared, &shutdown) != SessionEnd::Shutdown {
                        shared.set_state(ServerState::Closed);
                        tracing::debug!("Mock server idle until shutdown");
                        let _ = shutdown.recv();
                    }
                }
            }
            AcceptMode::Sequential => {
                while let Some(stream) = accept(&listener, &shutdown)? {
                    shared.set_state(ServerState::Accepted);
                    if serve(stream, &config, &shared, &shutdown) == SessionEnd::Shutdown {
                        break;
                    }
                    shared.set_state(ServerState::Listening);
                }
            }
        }

        shared.set_state(ServerState::Closed);
        tracing::info!("Mock server on {} stopped", local_addr);
        Ok(())
    }
}

/// Control handle for a spawned [`MockServer`]
///
/// Dropping the handle shuts the server down and waits for its thread.
#[derive(Debug)]
pub struct MockServerHandle {
    local_addr: SocketAddr,
    shared: Arc<Shared>,
    shutdown_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<Result<()>>>,
}

impl MockServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> ServerState {
        *self.shared.state.lock()
    }

    /// Set the fictitious `cold` stat
    pub fn set_cold(&self, cold: &str) {
        self.shared.store.lock().set_cold(cold);
    }

    /// Number of live items
    pub fn item_count(&self) -> usize {
        self.shared.store.lock().len()
    }

    /// Stop the server and wait for its thread
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            // The thread may have exited already
            let _ = tx.send(());
        }
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| {
                McError::Io(io::Error::new(io::ErrorKind::Other, "mock server thread panicked"))
            })?,
            None => Ok(()),
        }
    }
}

impl Drop for MockServerHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!("Mock server on {} failed: {}", self.local_addr, e);
        }
    }
}

// =============================================================================
// Accept / Serve
// =============================================================================

fn shutdown_requested(shutdown: &Receiver<()>) -> bool {
    matches!(shutdown.try_recv(), Ok(()) | Err(TryRecvError::Disconnected))
}

/// Sleep for `delay`, returning early (true) if shutdown is signalled
fn sleep_or_shutdown(shutdown: &Receiver<()>, delay: Duration) -> bool {
    !matches!(shutdown.recv_timeout(delay), Err(RecvTimeoutError::Timeout))
}

/// Wait for a connection; `None` once shutdown is signalled
fn accept(listener: &TcpListener, shutdown: &Receiver<()>) -> Result<Option<TcpStream>> {
    loop {
        match listener.accept() {
            Ok((stream, peer)) => {
                stream.set_nonblocking(false)?;
                tracing::debug!("Accepted connection from {}", peer);
                return Ok(Some(stream));
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                if sleep_or_shutdown(shutdown, POLL_INTERVAL) {
                    return Ok(None);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

fn serve(
    stream: TcpStream,
    config: &MockServerConfig,
    shared: &Shared,
    shutdown: &Receiver<()>,
) -> SessionEnd {
    shared.store.lock().record_connection();
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let result = Session::new(stream, config, shared, shutdown).and_then(|mut s| s.run());
    match result {
        Ok(end) => {
            tracing::debug!("Connection from {} ended: {:?}", peer, end);
            end
        }
        Err(McError::Io(ref e))
            if matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
            ) =>
        {
            tracing::debug!("Client {} disconnected before response could be sent", peer);
            SessionEnd::Disconnected
        }
        Err(e) => {
            tracing::warn!("Error serving {}: {}", peer, e);
            SessionEnd::Disconnected
        }
    }
}

/// One accepted connection
struct Session<'a> {
    reader: ReadBuffer<TcpStream>,
    writer: TcpStream,
    config: &'a MockServerConfig,
    shared: &'a Shared,
    shutdown: &'a Receiver<()>,
}

impl<'a> Session<'a> {
    fn new(
        stream: TcpStream,
        config: &'a MockServerConfig,
        shared: &'a Shared,
        shutdown: &'a Receiver<()>,
    ) -> Result<Self> {
        // Reads wake up periodically to notice shutdown
        stream.set_read_timeout(Some(POLL_INTERVAL))?;
        stream.set_nodelay(true)?;
        let writer = stream.try_clone()?;
        Ok(Self {
            reader: ReadBuffer::new(stream),
            writer,
            config,
            shared,
            shutdown,
        })
    }

    fn run(&mut self) -> Result<SessionEnd> {
        self.shared.set_state(ServerState::Serving);
        loop {
            match decode_command(self.reader.buffer_mut()) {
                Ok(Some(command)) => {
                    tracing::trace!("Mock server received {:?}", command.command_type());
                    if !self.execute(command)? {
                        return Ok(SessionEnd::Shutdown);
                    }
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Rejecting request, closing connection: {}", e);
                    return Ok(SessionEnd::Rejected);
                }
            }

            match self.reader.fill() {
                Ok(0) => return Ok(SessionEnd::Disconnected),
                Ok(_) => {}
                Err(e)
                    if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
                {
                    if shutdown_requested(self.shutdown) {
                        return Ok(SessionEnd::Shutdown);
                    }
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
                    ) =>
                {
                    return Ok(SessionEnd::Disconnected)
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Apply a command and reply. Returns false if shutdown interrupted it.
    fn execute(&mut self, command: Command) -> Result<bool> {
        let noreply = command.is_noreply();
        let reply = match command {
            Command::Get { keys } => {
                let delay = self.config.get_delay;
                if !delay.is_zero() && sleep_or_shutdown(self.shutdown, delay) {
                    return Ok(false);
                }
                let mut out = Vec::new();
                let mut store = self.shared.store.lock();
                for key in &keys {
                    if let Some(entry) = store.get(key) {
                        out.extend_from_slice(&encode_value(key, entry.flags, &entry.value));
                    }
                }
                out.extend_from_slice(&Response::End.encode());
                out
            }
            Command::Set {
                key,
                flags,
                exptime,
                value,
                ..
            } => {
                self.shared.store.lock().set(key, value, flags, exptime);
                Response::Stored.encode()
            }
            Command::Delete { key, .. } => {
                if self.shared.store.lock().delete(&key) {
                    Response::Deleted.encode()
                } else {
                    Response::NotFound.encode()
                }
            }
            Command::Stats { .. } => {
                let mut out = Vec::new();
                for (name, value) in self.shared.store.lock().stats() {
                    let line = Response::Stat {
                        name: name.to_string(),
                        value: Some(value),
                    };
                    out.extend_from_slice(&line.encode());
                }
                out.extend_from_slice(&Response::End.encode());
                out
            }
            Command::FlushAll { .. } => {
                self.shared.store.lock().flush();
                Response::Ok.encode()
            }
            Command::Cold { flag } => {
                self.shared.store.lock().set_cold(flag);
                Response::Ok.encode()
            }
        };

        if !noreply {
            self.writer.write_all(&reply)?;
            self.writer.flush()?;
        }
        Ok(true)
    }
}
