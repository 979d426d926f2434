//! Error types for mcwire
//!
//! Keeps caller-side validation failures, peer protocol violations and
//! transport failures apart so callers can react to each differently.

use std::io;

use thiserror::Error;

/// Result type alias using McError
pub type Result<T> = std::result::Result<T, McError>;

/// Unified error type for client and mock server operations
#[derive(Debug, Error)]
pub enum McError {
    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    /// Send/receive failed after the connection was established.
    /// The socket has already been closed when this reaches the caller.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Connection establishment failed (refused, unreachable, timed out)
    #[error("Connection to {addr} failed: {source}")]
    Connection {
        addr: String,
        #[source]
        source: io::Error,
    },

    // -------------------------------------------------------------------------
    // Caller Errors
    // -------------------------------------------------------------------------
    /// Rejected before any network activity
    #[error("Validation error: {0}")]
    Validation(String),

    // -------------------------------------------------------------------------
    // Peer Errors
    // -------------------------------------------------------------------------
    /// The peer's response violated the grammar or a declared invariant
    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl McError {
    /// Build a validation error naming the offending item
    pub(crate) fn validation(reason: &str, item: &[u8]) -> Self {
        McError::Validation(format!("{}: '{}'", reason, item.escape_ascii()))
    }

    /// Build a protocol error naming the offending response line
    pub(crate) fn protocol(reason: &str, line: &[u8]) -> Self {
        McError::Protocol(format!("{}: '{}'", reason, line.escape_ascii()))
    }

    /// True if this error is a read/write/connect timeout
    pub fn is_timeout(&self) -> bool {
        let kind = match self {
            McError::Io(e) => e.kind(),
            McError::Connection { source, .. } => source.kind(),
            _ => return false,
        };
        // Unix reports socket timeouts as WouldBlock, Windows as TimedOut
        matches!(kind, io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
    }

    /// True for transport-level failures (connect or I/O)
    pub fn is_transport(&self) -> bool {
        matches!(self, McError::Io(_) | McError::Connection { .. })
    }
}
