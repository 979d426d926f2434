//! Protocol codec
//!
//! Encoding and decoding functions for the memcached text protocol, plus the
//! buffered reader both sides use to frame a byte stream.
//!
//! ## Framing
//! A TCP stream has no message boundaries, so two extraction modes are used:
//! - **line**: bytes up to and including the first CR LF. Only safe for
//!   control lines; data blocks may contain CR LF themselves.
//! - **counted**: exactly N bytes, for a data block plus its terminator,
//!   with N taken from the preceding header line.
//!
//! A single `recv` may return part of a line or several responses at once,
//! so surplus bytes stay in the buffer for the next extraction.

use std::io::{self, Read, Write};

use bytes::{Buf, Bytes, BytesMut};

use super::key::validate_key;
use super::{Command, TERMINATOR};
use crate::error::{McError, Result};

/// Bytes requested from the transport per read
pub const READ_CHUNK_SIZE: usize = 4096;

/// Longest line either side will buffer while waiting for CR LF
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

// =============================================================================
// Command Encoding
// =============================================================================

/// Encode a command to bytes, including any data block
pub fn encode_command(command: &Command) -> Vec<u8> {
    let mut out = Vec::new();
    match command {
        Command::Get { keys } => {
            out.extend_from_slice(b"get");
            for key in keys {
                out.push(b' ');
                out.extend_from_slice(key);
            }
        }
        Command::Set {
            key,
            flags,
            exptime,
            value,
            noreply,
        } => {
            out.reserve(key.len() + value.len() + 48);
            out.extend_from_slice(b"set ");
            out.extend_from_slice(key);
            out.extend_from_slice(format!(" {} {} {}", flags, exptime, value.len()).as_bytes());
            if *noreply {
                out.extend_from_slice(b" noreply");
            }
            out.extend_from_slice(TERMINATOR);
            out.extend_from_slice(value);
        }
        Command::Delete { key, noreply } => {
            out.extend_from_slice(b"delete ");
            out.extend_from_slice(key);
            if *noreply {
                out.extend_from_slice(b" noreply");
            }
        }
        Command::Stats { args } => {
            out.extend_from_slice(b"stats");
            if let Some(args) = args {
                out.push(b' ');
                out.extend_from_slice(args.as_bytes());
            }
        }
        Command::FlushAll { noreply } => {
            out.extend_from_slice(b"flush_all");
            if *noreply {
                out.extend_from_slice(b" noreply");
            }
        }
        Command::Cold { flag } => {
            out.extend_from_slice(b"cold ");
            out.extend_from_slice(flag.as_bytes());
        }
    }
    out.extend_from_slice(TERMINATOR);
    out
}

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    let bytes = encode_command(command);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Encode a `VALUE` header, its data block and the block terminator
pub fn encode_value(key: &[u8], flags: u32, data: &[u8]) -> Vec<u8> {
    let mut out = super::Response::Value {
        key: key.to_vec(),
        flags,
        bytes: data.len(),
    }
    .encode();
    out.extend_from_slice(data);
    out.extend_from_slice(TERMINATOR);
    out
}

// =============================================================================
// Command Decoding
// =============================================================================

/// Decode one complete command from the front of `buf`.
///
/// Returns `Ok(None)` without consuming anything if the command (including
/// a `set` data block) has not fully arrived yet.
pub fn decode_command(buf: &mut BytesMut) -> Result<Option<Command>> {
    let line_end = match find_terminator(&buf[..], 0) {
        Some(pos) => pos,
        None if buf.len() > MAX_LINE_LENGTH => {
            return Err(McError::Protocol(format!(
                "Command line too long: {} bytes without terminator",
                buf.len()
            )))
        }
        None => return Ok(None),
    };
    let line_len = line_end + TERMINATOR.len();

    let terms: Vec<&[u8]> = buf[..line_end]
        .split(|b| b.is_ascii_whitespace())
        .filter(|t| !t.is_empty())
        .collect();

    let command = match terms.as_slice() {
        [b"get", keys @ ..] if !keys.is_empty() => {
            for key in keys {
                validate_key(key)?;
            }
            Command::Get {
                keys: keys.iter().map(|k| k.to_vec()).collect(),
            }
        }
        [b"set", key, flags, exptime, len, rest @ ..] => {
            validate_key(key)?;
            let noreply = parse_noreply(rest, &buf[..line_end])?;
            let len: usize = parse_term(len, "bytes")?;
            let block_len = len
                .checked_add(TERMINATOR.len())
                .ok_or_else(|| McError::Protocol("bad data chunk".to_string()))?;
            let frame_len = line_len
                .checked_add(block_len)
                .ok_or_else(|| McError::Protocol("bad data chunk".to_string()))?;
            if buf.len() < frame_len {
                return Ok(None);
            }
            let block = &buf[line_len..frame_len];
            if &block[len..] != TERMINATOR {
                return Err(McError::Protocol("bad data chunk".to_string()));
            }
            let command = Command::Set {
                key: key.to_vec(),
                flags: parse_term(flags, "flags")?,
                exptime: parse_term(exptime, "exptime")?,
                value: block[..len].to_vec(),
                noreply,
            };
            buf.advance(frame_len);
            return Ok(Some(command));
        }
        [b"delete", key, rest @ ..] => {
            validate_key(key)?;
            Command::Delete {
                key: key.to_vec(),
                noreply: parse_noreply(rest, &buf[..line_end])?,
            }
        }
        [b"stats", args @ ..] => {
            let args = if args.is_empty() {
                None
            } else {
                let joined = args.join(&b' ');
                Some(
                    String::from_utf8(joined)
                        .map_err(|_| McError::Protocol("stats arguments not UTF-8".to_string()))?,
                )
            };
            Command::Stats { args }
        }
        [b"flush_all", rest @ ..] => Command::FlushAll {
            noreply: parse_noreply(rest, &buf[..line_end])?,
        },
        [b"cold", flag] => Command::Cold {
            flag: String::from_utf8_lossy(flag).into_owned(),
        },
        _ => return Err(McError::protocol("unknown command", &buf[..line_len])),
    };

    buf.advance(line_len);
    Ok(Some(command))
}

fn parse_noreply(rest: &[&[u8]], line: &[u8]) -> Result<bool> {
    match rest {
        [] => Ok(false),
        [b"noreply"] => Ok(true),
        _ => Err(McError::protocol("unexpected arguments", line)),
    }
}

fn parse_term<T: std::str::FromStr>(term: &[u8], name: &str) -> Result<T> {
    std::str::from_utf8(term)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| McError::protocol(&format!("invalid {}", name), term))
}

/// Position of the first CR LF at or after `from`
pub fn find_terminator(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(TERMINATOR.len())
        .position(|w| w == TERMINATOR)
        .map(|pos| pos + from)
}

// =============================================================================
// Buffered Reader
// =============================================================================

/// Accumulates bytes from a stream and hands out whole lines or counted
/// blocks.
///
/// Bytes already pulled from the stream survive a failed read (for example
/// a timeout), so a retry resumes where the previous call stopped.
#[derive(Debug)]
pub struct ReadBuffer<R> {
    inner: R,
    buf: BytesMut,
}

impl<R> ReadBuffer<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Bytes received but not yet consumed
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    /// Mutable access for frame decoders such as [`decode_command`]
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Drop any unconsumed bytes
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl<R: Read> ReadBuffer<R> {
    /// Pull one chunk from the stream into the buffer.
    ///
    /// Returns the number of bytes read; 0 means the peer closed the stream.
    pub fn fill(&mut self) -> io::Result<usize> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Read up to and including the next CR LF
    pub fn read_line(&mut self) -> io::Result<Bytes> {
        let mut searched = 0;
        loop {
            if let Some(pos) = find_terminator(&self.buf, searched) {
                return Ok(self.buf.split_to(pos + TERMINATOR.len()).freeze());
            }
            if self.buf.len() > MAX_LINE_LENGTH {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "line too long without terminator",
                ));
            }
            // The terminator may straddle two chunks
            searched = self.buf.len().saturating_sub(TERMINATOR.len() - 1);
            self.fill_more()?;
        }
    }

    /// Read exactly `len` bytes
    pub fn read_exact_len(&mut self, len: usize) -> io::Result<Bytes> {
        while self.buf.len() < len {
            self.fill_more()?;
        }
        Ok(self.buf.split_to(len).freeze())
    }

    fn fill_more(&mut self) -> io::Result<()> {
        if self.fill()? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "unexpected socket close on recv",
            ));
        }
        Ok(())
    }
}
