//! Mock memcached server for fault-injection tests
//!
//! Speaks enough of the text protocol to exercise [`crate::Client`] and can
//! misbehave on request: delay every `get`, accept only one connection, or
//! never accept at all. Also understands `cold <flag>`, which only sets the
//! `cold` stat so tests can tell one server instance from another.

mod server;
mod store;

pub use server::{MockServer, MockServerHandle, ServerState};
pub use store::{Entry, Store};
