//! The expiring key-value store.
//!
//! One map holds both string values and streams. The whole map sits behind
//! a single readers-writer lock: reads proceed concurrently, writes are
//! mutually exclusive. Expiration is passive, computed from an entry's
//! creation time and TTL at access time and never swept by a background
//! task. Stream wake signals live behind their own lock so blocking XREAD
//! never contends with ordinary key access.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::Instant;

use crate::stream::{EntryId, Stream, StreamEntry, StreamIdError};

/// Errors raised by store operations, reported as error replies to the
/// command that caused them.
#[derive(Error, Debug, PartialEq)]
pub enum StoreError {
    #[error("value is not an integer or out of range")]
    NotAnInteger,
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,
    #[error(transparent)]
    StreamId(#[from] StreamIdError),
}

/// A string value with optional passive expiration. `ttl_millis <= 0`
/// means the value never expires.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpiringValue {
    pub value: String,
    pub created_at: Instant,
    pub ttl_millis: i64,
}

impl ExpiringValue {
    pub fn new(value: String, ttl_millis: Option<u64>) -> Self {
        Self {
            value,
            created_at: Instant::now(),
            ttl_millis: ttl_millis.map(|ms| ms as i64).unwrap_or(0),
        }
    }

    pub fn has_expired(&self) -> bool {
        self.ttl_millis > 0
            && self.created_at.elapsed() >= Duration::from_millis(self.ttl_millis as u64)
    }

    /// Remaining time to live in milliseconds, if an expiry is set and has
    /// not yet passed.
    pub fn remaining_ttl_millis(&self) -> Option<u64> {
        if self.ttl_millis <= 0 {
            return None;
        }
        let elapsed = self.created_at.elapsed().as_millis() as i64;
        let remaining = self.ttl_millis - elapsed;
        (remaining > 0).then(|| remaining as u64)
    }
}

#[derive(Debug)]
pub enum Entry {
    String(ExpiringValue),
    Stream(Stream),
}

#[derive(Debug)]
pub struct Store {
    entries: RwLock<HashMap<String, Entry>>,
    /// Per-key broadcast senders used to wake blocked XREAD callers when
    /// an XADD lands. Subscribing before re-checking the read predicate
    /// avoids lost wakeups.
    stream_signals: Mutex<HashMap<String, broadcast::Sender<()>>>,
    /// KEYS does not filter expired entries by default; several upstream
    /// iterations disagreed on this, so it is a construction choice rather
    /// than a buried branch.
    filter_expired_keys: bool,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self::with_expired_key_filtering(false)
    }

    pub fn with_expired_key_filtering(filter_expired_keys: bool) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            stream_signals: Mutex::new(HashMap::new()),
            filter_expired_keys,
        }
    }

    pub async fn set(&self, key: String, value: String, ttl_millis: Option<u64>) {
        let mut entries = self.entries.write().await;
        entries.insert(key, Entry::String(ExpiringValue::new(value, ttl_millis)));
    }

    /// Inserts a value recovered from a snapshot, keeping its computed TTL.
    pub async fn insert_loaded(&self, key: String, value: ExpiringValue) {
        let mut entries = self.entries.write().await;
        entries.insert(key, Entry::String(value));
    }

    /// Returns the live value for `key`, or `None` when the key is absent,
    /// expired, or holds a stream. Reading never removes an expired entry.
    pub async fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(Entry::String(value)) if !value.has_expired() => Some(value.value.clone()),
            _ => None,
        }
    }

    /// Parses the current value as a base-10 integer, increments it, and
    /// stores the result back as a string. An absent or expired key starts
    /// from zero; a non-numeric value fails without mutating anything.
    pub async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(key) {
            match entry {
                Entry::String(stored) if !stored.has_expired() => {
                    let current = stored
                        .value
                        .parse::<i64>()
                        .map_err(|_| StoreError::NotAnInteger)?;
                    let incremented = current.checked_add(1).ok_or(StoreError::NotAnInteger)?;
                    stored.value = incremented.to_string();
                    return Ok(incremented);
                }
                Entry::Stream(_) => return Err(StoreError::WrongType),
                // An expired string restarts from scratch below.
                Entry::String(_) => {}
            }
        }
        entries.insert(
            key.to_string(),
            Entry::String(ExpiringValue::new("1".to_string(), None)),
        );
        Ok(1)
    }

    /// All stored key names matching `pattern` (`*` matches everything,
    /// anything else is an exact match). Expired entries are included
    /// unless the store was built with filtering enabled.
    pub async fn keys(&self, pattern: &str) -> Vec<String> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|(key, entry)| {
                if self.filter_expired_keys {
                    if let Entry::String(value) = entry {
                        if value.has_expired() {
                            return false;
                        }
                    }
                }
                pattern == "*" || *key == pattern
            })
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub async fn value_type(&self, key: &str) -> &'static str {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(Entry::String(value)) if !value.has_expired() => "string",
            Some(Entry::Stream(_)) => "stream",
            _ => "none",
        }
    }

    /// Snapshot of all live string entries with their remaining TTLs, used
    /// to bring a freshly registered replica up to date.
    pub async fn dump_strings(&self) -> Vec<(String, String, Option<u64>)> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter_map(|(key, entry)| match entry {
                Entry::String(value) if !value.has_expired() => Some((
                    key.clone(),
                    value.value.clone(),
                    value.remaining_ttl_millis(),
                )),
                _ => None,
            })
            .collect()
    }

    /// Resolves the id argument and appends one entry to the stream at
    /// `key`, creating the stream if needed, then wakes any blocked
    /// readers of that key.
    pub async fn append_stream_entry(
        &self,
        key: &str,
        id_spec: &str,
        fields: Vec<(String, String)>,
    ) -> Result<EntryId, StoreError> {
        let id = {
            let mut entries = self.entries.write().await;
            match entries.get_mut(key) {
                Some(Entry::Stream(stream)) => stream.append(id_spec, unix_millis(), fields)?,
                Some(Entry::String(_)) => return Err(StoreError::WrongType),
                None => {
                    let mut stream = Stream::new();
                    let id = stream.append(id_spec, unix_millis(), fields)?;
                    entries.insert(key.to_string(), Entry::Stream(stream));
                    id
                }
            }
        };

        // Broadcast outside the data lock.
        let signals = self.stream_signals.lock().await;
        if let Some(sender) = signals.get(key) {
            let _ = sender.send(());
        }
        Ok(id)
    }

    /// Entries of `key` with ids in the inclusive range `[start, end]`.
    /// A missing key reads as an empty stream.
    pub async fn stream_range(
        &self,
        key: &str,
        start: EntryId,
        end: EntryId,
    ) -> Result<Vec<StreamEntry>, StoreError> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(Entry::Stream(stream)) => Ok(stream.range(start, end)),
            Some(Entry::String(_)) => Err(StoreError::WrongType),
            None => Ok(Vec::new()),
        }
    }

    /// Entries of `key` with ids strictly greater than `after`.
    pub async fn stream_entries_after(
        &self,
        key: &str,
        after: EntryId,
    ) -> Result<Vec<StreamEntry>, StoreError> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(Entry::Stream(stream)) => Ok(stream.entries_after(after)),
            Some(Entry::String(_)) => Err(StoreError::WrongType),
            None => Ok(Vec::new()),
        }
    }

    pub async fn stream_last_id(&self, key: &str) -> Option<EntryId> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(Entry::Stream(stream)) => stream.last_id(),
            _ => None,
        }
    }

    /// Subscribes to append notifications for `key`. Messages sent after
    /// subscription are buffered by the channel, so a caller may check its
    /// read predicate after subscribing without missing a wakeup.
    pub async fn stream_watcher(&self, key: &str) -> broadcast::Receiver<()> {
        let mut signals = self.stream_signals.lock().await;
        signals
            .entry(key.to_string())
            .or_insert_with(|| broadcast::channel(16).0)
            .subscribe()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
