//! Protocol Module
//!
//! The memcached text protocol as spoken by both the client and the mock
//! server.
//!
//! ## Wire Format
//! Every control line ends with CR LF. Data blocks are length-prefixed by
//! the line before them and followed by their own CR LF.
//!
//! ```text
//! get <key> [<key> ...]\r\n
//!     -> VALUE <key> <flags> <bytes>\r\n<data>\r\n ... END\r\n
//! set <key> <flags> <exptime> <bytes>\r\n<data>\r\n
//!     -> STORED\r\n
//! delete <key>\r\n
//!     -> DELETED\r\n | NOT_FOUND\r\n
//! stats [args]\r\n
//!     -> STAT <name> [<value>]\r\n ... END\r\n
//! flush_all\r\n
//!     -> OK\r\n
//! ```

mod codec;
mod command;
mod key;
mod response;

pub use codec::{
    decode_command, encode_command, encode_value, find_terminator, write_command, ReadBuffer,
    MAX_LINE_LENGTH, READ_CHUNK_SIZE,
};
pub use command::{Command, CommandType};
pub use key::{validate_args, validate_exptime, validate_key, MAX_KEY_LENGTH, MAX_RELATIVE_EXPTIME};
pub use response::Response;

/// Line and data block terminator
pub const TERMINATOR: &[u8] = b"\r\n";
