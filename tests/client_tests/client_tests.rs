//! Tests for Client
//!
//! These tests run the client against an in-process mock server and verify:
//! - Basic get/set/delete round trips
//! - Key validation
//! - Multi-get ordering and absent keys
//! - Expiry
//! - Protocol anomalies that keep the connection usable
//! - Stats and flush_all

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use mcwire::{
    AcceptMode, Client, ClientConfig, ConnectionState, McError, MockServer, MockServerConfig,
    MockServerHandle,
};

// =============================================================================
// Helper Functions
// =============================================================================

fn spawn_mock(mode: AcceptMode) -> MockServerHandle {
    let config = MockServerConfig::builder()
        .listen_addr("127.0.0.1:0")
        .accept_mode(mode)
        .build();
    MockServer::bind(config).unwrap().spawn().unwrap()
}

fn client_for(server: &MockServerHandle) -> Client {
    let config = ClientConfig::builder()
        .addr(server.local_addr().to_string())
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();
    Client::new(config)
}

/// Send raw protocol lines on a fresh socket and return the first reply line
fn raw_request(server: &MockServerHandle, request: &[u8]) -> String {
    let mut stream = TcpStream::connect(server.local_addr()).unwrap();
    stream.write_all(request).unwrap();
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).unwrap();
    line
}

fn stat(client: &mut Client, name: &str) -> String {
    client
        .stats(None)
        .unwrap()
        .remove(name)
        .flatten()
        .unwrap_or_else(|| panic!("missing stat {}", name))
}

// =============================================================================
// Basic Operations
// =============================================================================

#[test]
fn test_set_get_delete() {
    let server = spawn_mock(AcceptMode::Once);
    let mut client = client_for(&server);

    client.set("some_key", b"Some value").unwrap();
    assert_eq!(client.get("some_key").unwrap(), Some(b"Some value".to_vec()));

    client.delete("some_key").unwrap();
    assert_eq!(client.get("some_key").unwrap(), None);
}

#[test]
fn test_get_missing_key() {
    let server = spawn_mock(AcceptMode::Once);
    let mut client = client_for(&server);
    assert_eq!(client.get("never_set").unwrap(), None);
    assert_eq!(client.state(), ConnectionState::Ready);
}

#[test]
fn test_delete_is_idempotent() {
    let server = spawn_mock(AcceptMode::Once);
    let mut client = client_for(&server);
    client.delete("absent").unwrap();
    client.delete("absent").unwrap();
}

#[test]
fn test_overwrite() {
    let server = spawn_mock(AcceptMode::Once);
    let mut client = client_for(&server);
    client.set("k", b"first").unwrap();
    client.set("k", b"second").unwrap();
    assert_eq!(client.get("k").unwrap(), Some(b"second".to_vec()));
}

#[test]
fn test_max_length_key() {
    let server = spawn_mock(AcceptMode::Once);
    let mut client = client_for(&server);
    let key = "a".repeat(250);
    client.set(&key, b"long").unwrap();
    assert_eq!(client.get(&key).unwrap(), Some(b"long".to_vec()));
}

#[test]
fn test_binary_values_survive() {
    let server = spawn_mock(AcceptMode::Once);
    let mut client = client_for(&server);

    let tricky = b"line\r\nEND\r\nVALUE x 0 1\r\n\0\xff".to_vec();
    client.set("tricky", &tricky).unwrap();
    client.set("empty", b"").unwrap();

    assert_eq!(client.get("tricky").unwrap(), Some(tricky));
    assert_eq!(client.get("empty").unwrap(), Some(Vec::new()));
}

#[test]
fn test_large_value_spans_reads() {
    let server = spawn_mock(AcceptMode::Once);
    let mut client = client_for(&server);

    let value: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    client.set("big", &value).unwrap();
    assert_eq!(client.get("big").unwrap(), Some(value));
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_invalid_keys_rejected() {
    let server = spawn_mock(AcceptMode::Once);
    let mut client = client_for(&server);

    let too_long = "a".repeat(251);
    let bad_keys: [&[u8]; 6] = [
        b"",
        too_long.as_bytes(),
        b"has space",
        b"key\n",
        b"ctrl\x01",
        "caf\u{e9}".as_bytes(),
    ];
    for key in bad_keys {
        assert!(matches!(client.get(key), Err(McError::Validation(_))));
        assert!(matches!(client.set(key, b"v"), Err(McError::Validation(_))));
        assert!(matches!(client.delete(key), Err(McError::Validation(_))));
    }

    // Nothing reached the server
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(server.item_count(), 0);
}

#[test]
fn test_negative_exptime_rejected() {
    let server = spawn_mock(AcceptMode::Once);
    let mut client = client_for(&server);
    let err = client.set_with_exptime("k", b"v", -5).unwrap_err();
    assert!(matches!(err, McError::Validation(_)));
    assert!(err.to_string().contains("exptime negative"));
}

// =============================================================================
// Multi Get
// =============================================================================

#[test]
fn test_multi_get_preserves_order() {
    let server = spawn_mock(AcceptMode::Once);
    let mut client = client_for(&server);

    client.set("one", b"1").unwrap();
    client.set("three", b"3").unwrap();

    let values = client.multi_get(&["three", "two", "one"]).unwrap();
    assert_eq!(
        values,
        vec![Some(b"3".to_vec()), None, Some(b"1".to_vec())]
    );
}

#[test]
fn test_multi_get_duplicate_keys() {
    let server = spawn_mock(AcceptMode::Once);
    let mut client = client_for(&server);
    let err = client.multi_get(&["a", "b", "a"]).unwrap_err();
    assert!(matches!(err, McError::Protocol(_)));
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

// =============================================================================
// Expiry
// =============================================================================

#[test]
fn test_relative_expiry() {
    let server = spawn_mock(AcceptMode::Once);
    let mut client = client_for(&server);

    client.set_with_exptime("short", b"lived", 1).unwrap();
    client.set("forever", b"here").unwrap();
    assert_eq!(client.get("short").unwrap(), Some(b"lived".to_vec()));

    thread::sleep(Duration::from_millis(2100));
    assert_eq!(client.get("short").unwrap(), None);
    assert_eq!(client.get("forever").unwrap(), Some(b"here".to_vec()));
}

// =============================================================================
// Protocol Anomalies
// =============================================================================

#[test]
fn test_nonzero_flags_rejected_connection_kept() {
    let server = spawn_mock(AcceptMode::Sequential);
    assert_eq!(
        raw_request(&server, b"set badflags 1 0 6\r\nxcHJFd\r\n"),
        "STORED\r\n"
    );

    let mut client = client_for(&server);
    client.set("good", b"ok").unwrap();

    let err = client.get("badflags").unwrap_err();
    assert!(matches!(err, McError::Protocol(_)));
    assert!(err.to_string().contains("non zero flags"), "{}", err);

    // Same socket carries on: the response was fully drained
    assert_eq!(client.state(), ConnectionState::Ready);
    let err = client.multi_get(&["good", "badflags"]).unwrap_err();
    assert!(matches!(err, McError::Protocol(_)));
    assert_eq!(client.get("good").unwrap(), Some(b"ok".to_vec()));
    assert_eq!(stat(&mut client, "total_connections"), "2");
}

// =============================================================================
// Stats / Flush
// =============================================================================

#[test]
fn test_stats() {
    let server = spawn_mock(AcceptMode::Once);
    let mut client = client_for(&server);

    client.set("a", b"1").unwrap();
    client.set("b", b"2").unwrap();
    client.get("a").unwrap();
    client.get("zzz").unwrap();

    let stats = client.stats(None).unwrap();
    for name in ["pid", "uptime", "curr_items", "total_items", "get_hits", "get_misses"] {
        assert!(stats.contains_key(name), "missing {}", name);
    }
    assert_eq!(stats["total_items"].as_deref(), Some("2"));
    assert_eq!(stats["curr_items"].as_deref(), Some("2"));
    assert_eq!(stats["get_hits"].as_deref(), Some("1"));
    assert_eq!(stats["get_misses"].as_deref(), Some("1"));
    assert_eq!(stats["cold"].as_deref(), Some("0"));
}

#[test]
fn test_stats_args_validated() {
    let server = spawn_mock(AcceptMode::Once);
    let mut client = client_for(&server);
    assert!(matches!(
        client.stats(Some("items\r\nflush_all")),
        Err(McError::Validation(_))
    ));
    assert!(client.stats(Some("items")).is_ok());
}

#[test]
fn test_flush_all() {
    let server = spawn_mock(AcceptMode::Once);
    let mut client = client_for(&server);

    client.set("a", b"1").unwrap();
    client.set("b", b"2").unwrap();
    assert_eq!(server.item_count(), 2);

    client.flush_all().unwrap();
    assert_eq!(client.multi_get(&["a", "b"]).unwrap(), vec![None, None]);
    assert_eq!(server.item_count(), 0);
}

// =============================================================================
// Connection Management
// =============================================================================

#[test]
fn test_connection_reused() {
    let server = spawn_mock(AcceptMode::Sequential);
    let mut client = client_for(&server);

    for i in 0..10 {
        client.set(format!("k{}", i), b"v").unwrap();
    }
    assert_eq!(stat(&mut client, "total_connections"), "1");
}

#[test]
fn test_explicit_reconnect() {
    let server = spawn_mock(AcceptMode::Sequential);
    let mut client = client_for(&server);

    client.set("k", b"v").unwrap();
    client.close();
    assert_eq!(client.state(), ConnectionState::Disconnected);

    // Let the server notice the disconnect before it can accept again
    thread::sleep(Duration::from_millis(200));
    assert_eq!(client.get("k").unwrap(), Some(b"v".to_vec()));
    assert_eq!(stat(&mut client, "total_connections"), "2");
}

#[test]
fn test_set_timeout_applies_to_live_socket() {
    let server = spawn_mock(AcceptMode::Once);
    let mut client = client_for(&server);
    client.set("k", b"v").unwrap();

    client.set_timeout(Some(Duration::from_millis(500))).unwrap();
    assert_eq!(client.timeout(), Some(Duration::from_millis(500)));
    assert!(client.set_timeout(Some(Duration::ZERO)).is_err());
    assert_eq!(client.get("k").unwrap(), Some(b"v".to_vec()));
}
