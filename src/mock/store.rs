//! In-memory item store backing the mock server
//!
//! Nothing is persisted: a restarted server starts empty.

use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::protocol::MAX_RELATIVE_EXPTIME;

/// A stored item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub value: Vec<u8>,
    pub flags: u32,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// Item map plus the counters reported by `stats`
#[derive(Debug)]
pub struct Store {
    entries: HashMap<Vec<u8>, Entry>,
    cold: String,
    total_items: u64,
    get_hits: u64,
    get_misses: u64,
    total_connections: u64,
    started: Instant,
}

impl Store {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            cold: "0".to_string(),
            total_items: 0,
            get_hits: 0,
            get_misses: 0,
            total_connections: 0,
            started: Instant::now(),
        }
    }

    /// Look up a live item, dropping it if it has expired
    pub fn get(&mut self, key: &[u8]) -> Option<Entry> {
        let now = Instant::now();
        if self.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            self.entries.remove(key);
        }

        match self.entries.get(key) {
            Some(entry) => {
                self.get_hits += 1;
                Some(entry.clone())
            }
            None => {
                self.get_misses += 1;
                None
            }
        }
    }

    /// Store an item. `exptime` follows memcached: 0 never expires, up to
    /// 30 days is relative seconds, larger is an absolute Unix time and a
    /// negative value is already expired.
    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>, flags: u32, exptime: i64) {
        self.total_items += 1;
        let expires_at = match deadline(exptime, Instant::now(), unix_now()) {
            Deadline::Never => None,
            Deadline::At(at) => Some(at),
            Deadline::Past => {
                self.entries.remove(&key);
                return;
            }
        };
        self.entries.insert(
            key,
            Entry {
                value,
                flags,
                expires_at,
            },
        );
    }

    /// Remove an item; false if it was absent or already expired
    pub fn delete(&mut self, key: &[u8]) -> bool {
        let now = Instant::now();
        match self.entries.remove(key) {
            Some(entry) => !entry.is_expired(now),
            None => false,
        }
    }

    /// Drop every item
    pub fn flush(&mut self) {
        self.entries.clear();
    }

    /// Number of live items
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.values().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count an accepted connection
    pub fn record_connection(&mut self) {
        self.total_connections += 1;
    }

    pub fn set_cold(&mut self, cold: impl Into<String>) {
        self.cold = cold.into();
    }

    /// Name/value pairs for a `stats` reply
    pub fn stats(&self) -> Vec<(&'static str, String)> {
        vec![
            ("pid", std::process::id().to_string()),
            ("uptime", self.started.elapsed().as_secs().to_string()),
            ("curr_items", self.len().to_string()),
            ("total_items", self.total_items.to_string()),
            ("get_hits", self.get_hits.to_string()),
            ("get_misses", self.get_misses.to_string()),
            ("total_connections", self.total_connections.to_string()),
            ("cold", self.cold.clone()),
        ]
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Deadline {
    Never,
    At(Instant),
    Past,
}

fn deadline(exptime: i64, now: Instant, now_unix: u64) -> Deadline {
    match exptime {
        0 => Deadline::Never,
        e if e < 0 => Deadline::Past,
        e if e <= MAX_RELATIVE_EXPTIME => Deadline::At(now + Duration::from_secs(e as u64)),
        e => match (e as u64).checked_sub(now_unix) {
            Some(remaining) if remaining > 0 => {
                Deadline::At(now + Duration::from_secs(remaining))
            }
            _ => Deadline::Past,
        },
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
