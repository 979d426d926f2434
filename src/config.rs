//! Configuration for mcwire
//!
//! Client and mock server configuration with sensible defaults.

use std::time::Duration;

use crate::error::{McError, Result};

/// Default memcached port used by the client
pub const DEFAULT_CLIENT_ADDR: &str = "127.0.0.1:11211";

/// Default port for the mock server, one above memcached's
pub const DEFAULT_MOCK_ADDR: &str = "127.0.0.1:11212";

// =============================================================================
// Client Configuration
// =============================================================================

/// Configuration for a [`Client`](crate::Client)
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Peer address (host:port)
    pub addr: String,

    /// Timeout for reads and writes once connected.
    /// `None` blocks indefinitely.
    pub timeout: Option<Duration>,

    /// Timeout for connection establishment only.
    /// Falls back to `timeout` when `None`.
    pub connect_timeout: Option<Duration>,

    /// Return the sole entry of a single-key get by position instead of
    /// matching the echoed key. Some peers (queue servers speaking the
    /// memcached grammar) relabel or omit the key in their reply.
    pub single_key_by_position: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_CLIENT_ADDR.to_string(),
            timeout: None,
            connect_timeout: None,
            single_key_by_position: false,
        }
    }
}

impl ClientConfig {
    /// Create a new config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Timeout used while connecting
    pub fn effective_connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout.or(self.timeout)
    }
}

/// Builder for ClientConfig
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the peer address (host:port)
    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.config.addr = addr.into();
        self
    }

    /// Set the read/write timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    /// Opt in to positional matching for single-key gets
    pub fn single_key_by_position(mut self, enabled: bool) -> Self {
        self.config.single_key_by_position = enabled;
        self
    }

    /// Validate and build the config
    pub fn build(self) -> Result<ClientConfig> {
        let config = self.config;
        if config.addr.is_empty() {
            return Err(McError::Config("address must not be empty".to_string()));
        }
        // std sockets reject a zero timeout
        check_timeout("timeout", config.timeout)?;
        check_timeout("connect timeout", config.connect_timeout)?;
        Ok(config)
    }
}

pub(crate) fn check_timeout(name: &str, timeout: Option<Duration>) -> Result<()> {
    match timeout {
        Some(t) if t.is_zero() => Err(McError::Config(format!("{} must be non-zero", name))),
        _ => Ok(()),
    }
}

// =============================================================================
// Mock Server Configuration
// =============================================================================

/// How the mock server treats incoming connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcceptMode {
    /// Serve exactly one connection, then idle
    #[default]
    Once,

    /// Serve connections one after another until shut down
    Sequential,

    /// Listen but never accept. Handshakes still complete in the kernel
    /// backlog, so clients connect and then time out on their first read.
    Refuse,
}

/// Configuration for a [`MockServer`](crate::mock::MockServer)
#[derive(Debug, Clone)]
pub struct MockServerConfig {
    /// Listen address (host:port). Port 0 picks an ephemeral port.
    pub listen_addr: String,

    /// Artificial delay before answering each `get`
    pub get_delay: Duration,

    /// Connection acceptance policy
    pub accept_mode: AcceptMode,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_MOCK_ADDR.to_string(),
            get_delay: Duration::ZERO,
            accept_mode: AcceptMode::Once,
        }
    }
}

impl MockServerConfig {
    /// Create a new config builder
    pub fn builder() -> MockServerConfigBuilder {
        MockServerConfigBuilder::default()
    }
}

/// Builder for MockServerConfig
#[derive(Default)]
pub struct MockServerConfigBuilder {
    config: MockServerConfig,
}

impl MockServerConfigBuilder {
    /// Set the listen address (host:port)
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the delay applied to every `get`
    pub fn get_delay(mut self, delay: Duration) -> Self {
        self.config.get_delay = delay;
        self
    }

    /// Set the accept policy
    pub fn accept_mode(mut self, mode: AcceptMode) -> Self {
        self.config.accept_mode = mode;
        self
    }

    pub fn build(self) -> MockServerConfig {
        self.config
    }
}
