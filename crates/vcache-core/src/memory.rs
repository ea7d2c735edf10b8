//! In-memory store (for tests and single-process deployments).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::store::{decode_counter, encode_counter, KvStore};

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    // None when the ttl overflows the clock
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Vec<u8>, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now().checked_add(ttl),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Thread-safe in-memory key/value store with per-entry expiry.
///
/// Expired entries are dropped lazily when touched, or eagerly with
/// [`MemoryStore::purge_expired`]. The store can be switched offline to make
/// every call fail with [`StoreError::Unavailable`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    offline: AtomicBool,
    round_trips: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage (`true`) or recover from one (`false`).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Whether the store is currently refusing calls.
    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    /// Number of calls served since creation, failed ones included.
    ///
    /// Batched operations count once.
    pub fn round_trips(&self) -> u64 {
        self.round_trips.load(Ordering::SeqCst)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    /// Whether there are no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry and return how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        let purged = before - entries.len();
        if purged > 0 {
            tracing::trace!(purged, "purged expired entries");
        }
        purged
    }

    fn begin(&self) -> StoreResult<()> {
        self.round_trips.fetch_add(1, Ordering::SeqCst);
        if self.is_offline() {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }

    fn live_value(entries: &mut HashMap<String, Entry>, key: &str) -> Option<Vec<u8>> {
        if entries.get(key)?.is_expired(Instant::now()) {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn has(&self, key: &str) -> StoreResult<bool> {
        self.begin()?;
        Ok(Self::live_value(&mut self.entries.lock(), key).is_some())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.begin()?;
        Ok(Self::live_value(&mut self.entries.lock(), key))
    }

    async fn get_many(&self, keys: &[String]) -> StoreResult<HashMap<String, Vec<u8>>> {
        self.begin()?;
        let mut entries = self.entries.lock();
        Ok(keys
            .iter()
            .filter_map(|key| Self::live_value(&mut entries, key).map(|v| (key.clone(), v)))
            .collect())
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreResult<()> {
        self.begin()?;
        self.entries
            .lock()
            .insert(key.to_string(), Entry::new(value, ttl));
        Ok(())
    }

    async fn set_many(&self, entries: HashMap<String, Vec<u8>>, ttl: Duration) -> StoreResult<()> {
        self.begin()?;
        let mut map = self.entries.lock();
        for (key, value) in entries {
            map.insert(key, Entry::new(value, ttl));
        }
        Ok(())
    }

    async fn increment(&self, key: &str) -> StoreResult<u64> {
        self.begin()?;
        let mut entries = self.entries.lock();
        let current = Self::live_value(&mut entries, key)
            .ok_or_else(|| StoreError::MissingKey(key.to_string()))?;
        let next = decode_counter(key, &current)?.saturating_add(1);

        // Native increments keep the existing deadline.
        if let Some(entry) = entries.get_mut(key) {
            entry.value = encode_counter(next);
        }
        Ok(next)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.begin()?;
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn increment_or_init(&self, key: &str, initial: u64, ttl: Duration) -> StoreResult<u64> {
        self.begin()?;
        let mut entries = self.entries.lock();
        let next = match Self::live_value(&mut entries, key) {
            Some(current) => decode_counter(key, &current)?.saturating_add(1),
            None => initial,
        };
        entries.insert(key.to_string(), Entry::new(encode_counter(next), ttl));
        Ok(next)
    }
}
