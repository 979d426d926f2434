//! Network Module
//!
//! Client-side TCP transport.
//!
//! ## Architecture
//! - One blocking socket per client, no pooling
//! - Reads go through a shared framing buffer
//! - Idle sockets are probed before reuse

mod connection;

pub use connection::{Connection, Probe};
