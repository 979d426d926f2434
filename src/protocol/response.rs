//! Response definitions
//!
//! Represents one control line of a peer response. Data blocks that follow
//! a `VALUE` line are framed separately by their declared length.

use super::TERMINATOR;

/// A single response line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `VALUE <key> <flags> <bytes>`, followed by a data block
    Value { key: Vec<u8>, flags: u32, bytes: usize },

    /// `END`, closes a get or stats response
    End,

    /// `STORED`
    Stored,

    /// `NOT_STORED`
    NotStored,

    /// `DELETED`
    Deleted,

    /// `NOT_FOUND`
    NotFound,

    /// `OK`
    Ok,

    /// `STAT <name> [<value>]`
    Stat { name: String, value: Option<String> },

    /// `ERROR`, the peer did not understand the command
    Error,

    /// `CLIENT_ERROR <message>`
    ClientError(String),

    /// `SERVER_ERROR <message>`
    ServerError(String),
}

impl Response {
    /// Parse a response line, with or without its trailing CR LF.
    ///
    /// Returns `None` for anything outside the grammar.
    pub fn parse(line: &[u8]) -> Option<Response> {
        let line = line.strip_suffix(TERMINATOR).unwrap_or(line);

        match line {
            b"END" => return Some(Response::End),
            b"STORED" => return Some(Response::Stored),
            b"NOT_STORED" => return Some(Response::NotStored),
            b"DELETED" => return Some(Response::Deleted),
            b"NOT_FOUND" => return Some(Response::NotFound),
            b"OK" => return Some(Response::Ok),
            b"ERROR" => return Some(Response::Error),
            _ => {}
        }

        if let Some(msg) = line.strip_prefix(b"CLIENT_ERROR ") {
            return Some(Response::ClientError(String::from_utf8_lossy(msg).into_owned()));
        }
        if let Some(msg) = line.strip_prefix(b"SERVER_ERROR ") {
            return Some(Response::ServerError(String::from_utf8_lossy(msg).into_owned()));
        }

        let terms: Vec<&[u8]> = line
            .split(|b| b.is_ascii_whitespace())
            .filter(|t| !t.is_empty())
            .collect();

        match terms.as_slice() {
            [b"VALUE", key, flags, bytes] => Some(Response::Value {
                key: key.to_vec(),
                flags: parse_number(flags)?,
                bytes: parse_number(bytes)?,
            }),
            [b"STAT", name] => Some(Response::Stat {
                name: utf8(name)?,
                value: None,
            }),
            [b"STAT", name, value] => Some(Response::Stat {
                name: utf8(name)?,
                value: Some(utf8(value)?),
            }),
            _ => None,
        }
    }

    /// True for the single-line error replies
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Response::Error | Response::ClientError(_) | Response::ServerError(_)
        )
    }

    /// Encode this line including its terminator.
    ///
    /// For `Value` only the header line is produced; the caller writes the
    /// data block.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = match self {
            Response::Value { key, flags, bytes } => {
                let mut out = Vec::with_capacity(key.len() + 32);
                out.extend_from_slice(b"VALUE ");
                out.extend_from_slice(key);
                out.extend_from_slice(format!(" {} {}", flags, bytes).as_bytes());
                out
            }
            Response::End => b"END".to_vec(),
            Response::Stored => b"STORED".to_vec(),
            Response::NotStored => b"NOT_STORED".to_vec(),
            Response::Deleted => b"DELETED".to_vec(),
            Response::NotFound => b"NOT_FOUND".to_vec(),
            Response::Ok => b"OK".to_vec(),
            Response::Stat { name, value: Some(value) } => {
                format!("STAT {} {}", name, value).into_bytes()
            }
            Response::Stat { name, value: None } => format!("STAT {}", name).into_bytes(),
            Response::Error => b"ERROR".to_vec(),
            Response::ClientError(msg) => format!("CLIENT_ERROR {}", msg).into_bytes(),
            Response::ServerError(msg) => format!("SERVER_ERROR {}", msg).into_bytes(),
        };
        out.extend_from_slice(TERMINATOR);
        out
    }
}

fn parse_number<T: std::str::FromStr>(term: &[u8]) -> Option<T> {
    std::str::from_utf8(term).ok()?.parse().ok()
}

fn utf8(term: &[u8]) -> Option<String> {
    std::str::from_utf8(term).ok().map(str::to_string)
}
