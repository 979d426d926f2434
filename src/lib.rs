//! # mcwire
//!
//! A synchronous memcached text-protocol client with:
//! - Strict key and argument validation before any I/O
//! - Connection reuse with a liveness probe before every command
//! - Configurable socket timeouts that surface as errors, never hangs
//! - A mock server that injects delays and accept faults for testing
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Client                                │
//! │     (validation, state machine, response interpretation)     │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                     Connection                               │
//! │          (TCP stream, probe, buffered line reads)            │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  text protocol over TCP
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │               memcached  /  MockServer                       │
//! │        (decode_command, in-memory store, fault modes)        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use mcwire::{Client, ClientConfig};
//!
//! let config = ClientConfig::builder().addr("127.0.0.1:11211").build()?;
//! let mut client = Client::new(config);
//! client.set("greeting", b"hello")?;
//! assert_eq!(client.get("greeting")?.as_deref(), Some(&b"hello"[..]));
//! # Ok::<(), mcwire::McError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod network;
pub mod client;
pub mod mock;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{McError, Result};
pub use config::{AcceptMode, ClientConfig, MockServerConfig};
pub use client::{Client, ConnectionState, StatsMap};
pub use mock::{MockServer, MockServerHandle, ServerState};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of mcwire
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
