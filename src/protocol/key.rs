//! Key and argument validation
//!
//! Keys are 1-250 bytes of printable ASCII without space: `!` (0x21)
//! through `~` (0x7E). Anything else would either break the line-based
//! framing or be rejected by the peer.

use crate::error::{McError, Result};

/// Maximum key length accepted by memcached
pub const MAX_KEY_LENGTH: usize = 250;

/// Largest relative exptime; anything above is an absolute Unix time
pub const MAX_RELATIVE_EXPTIME: i64 = 60 * 60 * 24 * 30;

/// Check a key against the memcached key grammar
pub fn validate_key(key: &[u8]) -> Result<()> {
    if key.is_empty() || key.len() > MAX_KEY_LENGTH {
        return Err(McError::validation("invalid key length", key));
    }
    if let Some(pos) = key.iter().position(|b| !is_key_byte(*b)) {
        if pos == key.len() - 1 && key[pos] == b'\n' {
            return Err(McError::validation("trailing newline", key));
        }
        return Err(McError::validation("invalid key", key));
    }
    Ok(())
}

/// Check an exptime and narrow it to the wire width
pub fn validate_exptime(exptime: i64) -> Result<u32> {
    if exptime < 0 {
        return Err(McError::validation("exptime negative", exptime.to_string().as_bytes()));
    }
    u32::try_from(exptime)
        .map_err(|_| McError::validation("exptime out of range", exptime.to_string().as_bytes()))
}

/// Check free-form arguments that are sent verbatim on a command line
pub fn validate_args(args: &str) -> Result<()> {
    if args.bytes().any(|b| b == b'\r' || b == b'\n') {
        return Err(McError::validation("line break in arguments", args.as_bytes()));
    }
    Ok(())
}

#[inline]
fn is_key_byte(b: u8) -> bool {
    (0x21..=0x7e).contains(&b)
}
