//! Command definitions
//!
//! Represents requests sent to a memcached-compatible peer.

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    Get,
    Set,
    Delete,
    Stats,
    FlushAll,
    Cold,
}

impl CommandType {
    /// Command name as it appears on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::Get => "get",
            CommandType::Set => "set",
            CommandType::Delete => "delete",
            CommandType::Stats => "stats",
            CommandType::FlushAll => "flush_all",
            CommandType::Cold => "cold",
        }
    }
}

impl std::fmt::Display for CommandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Fetch one or more keys
    Get { keys: Vec<Vec<u8>> },

    /// Store a value
    Set {
        key: Vec<u8>,
        flags: u32,
        exptime: i64,
        value: Vec<u8>,
        noreply: bool,
    },

    /// Remove a key
    Delete { key: Vec<u8>, noreply: bool },

    /// Server statistics, with optional verbatim arguments
    Stats { args: Option<String> },

    /// Invalidate every item
    FlushAll { noreply: bool },

    /// Set the mock server's fictitious warmup flag
    Cold { flag: String },
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Get { .. } => CommandType::Get,
            Command::Set { .. } => CommandType::Set,
            Command::Delete { .. } => CommandType::Delete,
            Command::Stats { .. } => CommandType::Stats,
            Command::FlushAll { .. } => CommandType::FlushAll,
            Command::Cold { .. } => CommandType::Cold,
        }
    }

    /// Whether the peer is expected to stay silent
    pub fn is_noreply(&self) -> bool {
        match self {
            Command::Set { noreply, .. }
            | Command::Delete { noreply, .. }
            | Command::FlushAll { noreply } => *noreply,
            _ => false,
        }
    }
}
