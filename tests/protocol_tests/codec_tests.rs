//! Codec Tests
//!
//! Tests for command encoding, server-side command decoding, response line
//! parsing and the buffered reader.

use std::io::Cursor;

use bytes::BytesMut;
use mcwire::protocol::{
    decode_command, encode_command, encode_value, validate_key, write_command, Command,
    CommandType, ReadBuffer, Response, MAX_KEY_LENGTH,
};
use mcwire::McError;

// =============================================================================
// Helper Functions
// =============================================================================

/// Encode then decode through a fresh buffer, asserting nothing is left over
fn decode_all(bytes: &[u8]) -> Command {
    let mut buf = BytesMut::from(bytes);
    let cmd = decode_command(&mut buf).unwrap().expect("complete command");
    assert!(buf.is_empty(), "leftover bytes: {:?}", buf);
    cmd
}

// =============================================================================
// Command Encoding Tests
// =============================================================================

#[test]
fn test_encode_get_single_and_multi() {
    let cmd = Command::Get {
        keys: vec![b"hello".to_vec()],
    };
    assert_eq!(encode_command(&cmd), b"get hello\r\n");

    let cmd = Command::Get {
        keys: vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()],
    };
    assert_eq!(encode_command(&cmd), b"get a b c\r\n");
}

#[test]
fn test_encode_set() {
    let cmd = Command::Set {
        key: b"key".to_vec(),
        flags: 0,
        exptime: 60,
        value: b"value".to_vec(),
        noreply: false,
    };
    assert_eq!(encode_command(&cmd), b"set key 0 60 5\r\nvalue\r\n");
}

#[test]
fn test_encode_set_value_with_crlf() {
    let cmd = Command::Set {
        key: b"k".to_vec(),
        flags: 0,
        exptime: 0,
        value: b"a\r\nb".to_vec(),
        noreply: true,
    };
    let encoded = encode_command(&cmd);
    assert_eq!(encoded, b"set k 0 0 4 noreply\r\na\r\nb\r\n");
    assert_eq!(decode_all(&encoded), cmd);
}

#[test]
fn test_encode_delete_stats_flush() {
    let delete = Command::Delete {
        key: b"gone".to_vec(),
        noreply: false,
    };
    assert_eq!(encode_command(&delete), b"delete gone\r\n");

    assert_eq!(encode_command(&Command::Stats { args: None }), b"stats\r\n");
    assert_eq!(
        encode_command(&Command::Stats {
            args: Some("slabs".to_string())
        }),
        b"stats slabs\r\n"
    );
    assert_eq!(
        encode_command(&Command::FlushAll { noreply: true }),
        b"flush_all noreply\r\n"
    );
    assert_eq!(
        encode_command(&Command::Cold {
            flag: "1".to_string()
        }),
        b"cold 1\r\n"
    );
}

#[test]
fn test_write_command_to_stream() {
    let mut out = Vec::new();
    write_command(&mut out, &Command::Stats { args: None }).unwrap();
    assert_eq!(out, b"stats\r\n");
}

#[test]
fn test_command_type_names() {
    let cmd = Command::FlushAll { noreply: false };
    assert_eq!(cmd.command_type(), CommandType::FlushAll);
    assert_eq!(cmd.command_type().to_string(), "flush_all");
    assert!(!cmd.is_noreply());
}

// =============================================================================
// Command Decoding Tests
// =============================================================================

#[test]
fn test_decode_multi_get() {
    match decode_all(b"get a bb ccc\r\n") {
        Command::Get { keys } => {
            assert_eq!(keys, vec![b"a".to_vec(), b"bb".to_vec(), b"ccc".to_vec()])
        }
        other => panic!("Expected GET command, got {:?}", other),
    }
}

#[test]
fn test_decode_delete_noreply() {
    assert_eq!(
        decode_all(b"delete k noreply\r\n"),
        Command::Delete {
            key: b"k".to_vec(),
            noreply: true
        }
    );
}

#[test]
fn test_decode_pipelined_commands() {
    let mut buf = BytesMut::from(&b"set a 0 0 1\r\n1\r\nget a\r\nstats\r\n"[..]);
    let types: Vec<_> = std::iter::from_fn(|| decode_command(&mut buf).unwrap())
        .map(|c| c.command_type())
        .collect();
    assert_eq!(
        types,
        vec![CommandType::Set, CommandType::Get, CommandType::Stats]
    );
    assert!(buf.is_empty());
}

#[test]
fn test_decode_incomplete_line() {
    let mut buf = BytesMut::from(&b"get some_ke"[..]);
    assert!(decode_command(&mut buf).unwrap().is_none());
    assert_eq!(&buf[..], b"get some_ke");
}

#[test]
fn test_decode_rejects_garbage() {
    for line in [&b"bogus\r\n"[..], b"get\r\n", b"set k 0 0\r\n", b"cold\r\n"] {
        let mut buf = BytesMut::from(line);
        assert!(
            matches!(decode_command(&mut buf), Err(McError::Protocol(_))),
            "accepted {:?}",
            line
        );
    }
}

#[test]
fn test_decode_rejects_bad_numbers() {
    let mut buf = BytesMut::from(&b"set k x 0 1\r\na\r\n"[..]);
    assert!(decode_command(&mut buf).is_err());

    let mut buf = BytesMut::from(&b"set k 0 0 -1\r\n"[..]);
    assert!(decode_command(&mut buf).is_err());
}

// =============================================================================
// Response Tests
// =============================================================================

#[test]
fn test_parse_simple_responses() {
    assert_eq!(Response::parse(b"END\r\n"), Some(Response::End));
    assert_eq!(Response::parse(b"STORED\r\n"), Some(Response::Stored));
    assert_eq!(Response::parse(b"NOT_FOUND\r\n"), Some(Response::NotFound));
    assert_eq!(Response::parse(b"DELETED"), Some(Response::Deleted));
    assert_eq!(Response::parse(b"OK\r\n"), Some(Response::Ok));
}

#[test]
fn test_parse_value_header() {
    assert_eq!(
        Response::parse(b"VALUE some_key 0 10\r\n"),
        Some(Response::Value {
            key: b"some_key".to_vec(),
            flags: 0,
            bytes: 10
        })
    );
    assert_eq!(Response::parse(b"VALUE k 0\r\n"), None);
    assert_eq!(Response::parse(b"VALUE k x 1\r\n"), None);
}

#[test]
fn test_parse_stat_lines() {
    assert_eq!(
        Response::parse(b"STAT curr_items 3\r\n"),
        Some(Response::Stat {
            name: "curr_items".to_string(),
            value: Some("3".to_string())
        })
    );
    assert_eq!(
        Response::parse(b"STAT lonely\r\n"),
        Some(Response::Stat {
            name: "lonely".to_string(),
            value: None
        })
    );
}

#[test]
fn test_parse_errors() {
    let resp = Response::parse(b"SERVER_ERROR out of memory\r\n").unwrap();
    assert_eq!(resp, Response::ServerError("out of memory".to_string()));
    assert!(resp.is_error());

    assert!(Response::parse(b"ERROR\r\n").unwrap().is_error());
    assert!(Response::parse(b"CLIENT_ERROR bad data chunk\r\n")
        .unwrap()
        .is_error());
    assert_eq!(Response::parse(b"HELLO\r\n"), None);
}

#[test]
fn test_encode_value_block() {
    assert_eq!(
        encode_value(b"k", 0, b"abc"),
        b"VALUE k 0 3\r\nabc\r\n".to_vec()
    );
}

#[test]
fn test_response_line_round_trip() {
    let lines = [
        Response::End,
        Response::Stat {
            name: "pid".to_string(),
            value: Some("42".to_string()),
        },
        Response::ClientError("line too long".to_string()),
    ];
    for line in lines {
        assert_eq!(Response::parse(&line.encode()), Some(line));
    }
}

// =============================================================================
// Key Validation Tests
// =============================================================================

#[test]
fn test_key_limits() {
    assert!(validate_key(&vec![b'a'; MAX_KEY_LENGTH]).is_ok());
    assert!(validate_key(&vec![b'a'; MAX_KEY_LENGTH + 1]).is_err());
    assert!(validate_key(b"").is_err());
    assert!(validate_key(b"has space").is_err());
    assert!(validate_key(b"tab\tkey").is_err());
    assert!(validate_key(b"nul\0key").is_err());
    assert!(validate_key(b"del\x7fkey").is_err());
    assert!(validate_key("caf\u{e9}".as_bytes()).is_err());
}

#[test]
fn test_trailing_newline_message() {
    let err = validate_key(b"key\n").unwrap_err();
    assert!(err.to_string().contains("trailing newline"), "{}", err);
}

// =============================================================================
// ReadBuffer Tests
// =============================================================================

#[test]
fn test_read_buffer_mixed_framing() {
    let wire = b"VALUE a 0 4\r\n\r\n\r\n\r\nEND\r\n".to_vec();
    let mut reader = ReadBuffer::new(Cursor::new(wire));

    let header = reader.read_line().unwrap();
    let len = match Response::parse(&header) {
        Some(Response::Value { bytes, .. }) => bytes,
        other => panic!("Expected VALUE, got {:?}", other),
    };
    // Counted read keeps the CR LF inside the data intact
    assert_eq!(&reader.read_exact_len(len + 2).unwrap()[..], b"\r\n\r\n\r\n");
    assert_eq!(&reader.read_line().unwrap()[..], b"END\r\n");
}
