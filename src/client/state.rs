//! Connection state machine
//!
//! ```text
//!               ConnectStarted            Connected
//!  Disconnected ──────────────► Connecting ─────────► Ready ◄─┐ ProbeHealthy
//!       ▲                          │                   │  └───┘
//!       │         ConnectFailed    │                   │ ProbeStale / TransportError
//!       ├──────────────────────────┘                   ▼
//!       └───────────────────── Closed ─────────────── Faulted
//! ```
//!
//! `Closed` returns any state to `Disconnected`. Transitions are pure so the
//! reconnect policy can be tested without sockets.

/// Where a client's connection currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No socket
    #[default]
    Disconnected,

    /// Establishing a socket
    Connecting,

    /// Socket open and believed usable
    Ready,

    /// Socket open but must not be reused
    Faulted,
}

/// Something that happened to the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    ConnectStarted,
    Connected,
    ConnectFailed,
    ProbeHealthy,
    ProbeStale,
    TransportError,
    Closed,
}

impl ConnectionState {
    /// Apply an event. Events that make no sense in the current state leave
    /// it unchanged.
    pub fn on(self, event: ConnectionEvent) -> ConnectionState {
        use ConnectionEvent::*;
        use ConnectionState::*;

        match (self, event) {
            (_, Closed) => Disconnected,
            (Disconnected, ConnectStarted) => Connecting,
            (Connecting, Connected) => Ready,
            (Connecting, ConnectFailed) => Disconnected,
            (Connecting, TransportError) => Faulted,
            (Ready, ProbeHealthy) => Ready,
            (Ready, ProbeStale) => Faulted,
            (Ready, TransportError) => Faulted,
            (state, _) => state,
        }
    }

    /// A fresh socket is needed before the next command
    pub fn needs_connect(&self) -> bool {
        matches!(self, ConnectionState::Disconnected)
    }

    /// The current socket has to be closed before anything else happens
    pub fn needs_close(&self) -> bool {
        matches!(self, ConnectionState::Faulted)
    }
}
