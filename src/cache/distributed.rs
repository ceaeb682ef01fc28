//! Distributed tier: a shared key-value store with per-key TTL.
//!
//! # Responsibilities
//! - `KeyValueStore`: the string-level contract every backend implements
//! - `MemoryKeyValueStore`: in-process backend for single-node runs and tests
//! - `DistributedTier`: JSON (de)serialization on top of any backend

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::Instant;

use crate::cache::error::{StoreError, StoreResult};

/// String key-value store with expiry.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Store `value`; `ttl` of `None` keeps it until deleted.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()>;

    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Returns whether the key existed.
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    /// Remaining TTL; `None` when the key is missing or never expires.
    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>>;

    /// Add `by` to an integer value (missing keys start at 0).
    async fn increment(&self, key: &str, by: i64) -> StoreResult<i64>;

    async fn get_many(&self, keys: &[String]) -> StoreResult<Vec<Option<String>>>;

    async fn set_many(&self, entries: &[(String, String)], ttl: Option<Duration>) -> StoreResult<()>;

    /// Drop every key.
    async fn flush(&self) -> StoreResult<()>;

    async fn ping(&self) -> StoreResult<()>;
}

struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map(|deadline| deadline > now).unwrap_or(true)
    }
}

/// `KeyValueStore` kept in process memory.
///
/// Can be switched offline to exercise store-failure paths, and counts reads
/// so callers can tell whether this tier was consulted.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: DashMap<String, MemoryEntry>,
    offline: AtomicBool,
    reads: AtomicUsize,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with a connection error until set back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of `get`/`get_many` calls served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|entry| entry.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Connection("memory store offline".into()))
        } else {
            Ok(())
        }
    }

    fn live_value(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let entry = self.entries.get(key)?;
        if entry.is_live(now) {
            return Some(entry.value.clone());
        }
        drop(entry);
        self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        None
    }

    fn put(&self, key: &str, value: &str, ttl: Option<Duration>) {
        self.entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.check_online()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.live_value(key))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        self.check_online()?;
        self.put(key, value, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.check_online()?;
        let existed = self.live_value(key).is_some();
        self.entries.remove(key);
        Ok(existed)
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.check_online()?;
        Ok(self.live_value(key).is_some())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        self.check_online()?;
        let now = Instant::now();
        match self.entries.get_mut(key) {
            Some(mut entry) if entry.is_live(now) => {
                entry.expires_at = Some(now + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        self.check_online()?;
        let now = Instant::now();
        Ok(self
            .entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .and_then(|entry| entry.expires_at)
            .map(|deadline| deadline.saturating_duration_since(now)))
    }

    async fn increment(&self, key: &str, by: i64) -> StoreResult<i64> {
        self.check_online()?;
        let now = Instant::now();
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| MemoryEntry {
            value: "0".to_string(),
            expires_at: None,
        });
        if !entry.is_live(now) {
            entry.value = "0".to_string();
            entry.expires_at = None;
        }
        let current: i64 = entry
            .value
            .parse()
            .map_err(|_| StoreError::Backend(format!("value at '{key}' is not an integer")))?;
        let next = current + by;
        entry.value = next.to_string();
        Ok(next)
    }

    async fn get_many(&self, keys: &[String]) -> StoreResult<Vec<Option<String>>> {
        self.check_online()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(keys.iter().map(|key| self.live_value(key)).collect())
    }

    async fn set_many(&self, entries: &[(String, String)], ttl: Option<Duration>) -> StoreResult<()> {
        self.check_online()?;
        for (key, value) in entries {
            self.put(key, value, ttl);
        }
        Ok(())
    }

    async fn flush(&self) -> StoreResult<()> {
        self.check_online()?;
        self.entries.clear();
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check_online()
    }
}

/// JSON view over a `KeyValueStore`.
#[derive(Clone)]
pub struct DistributedTier {
    store: Arc<dyn KeyValueStore>,
}

impl DistributedTier {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.store.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) -> StoreResult<()> {
        let raw = serde_json::to_string(value)?;
        self.store.set(key, &raw, Some(ttl)).await
    }

    /// Write one value under several keys in a single round trip.
    pub async fn set_json_many<T: Serialize + ?Sized>(&self, keys: &[String], value: &T, ttl: Duration) -> StoreResult<()> {
        let raw = serde_json::to_string(value)?;
        let entries: Vec<(String, String)> = keys.iter().map(|key| (key.clone(), raw.clone())).collect();
        self.store.set_many(&entries, Some(ttl)).await
    }

    pub async fn get_json_many<T: DeserializeOwned>(&self, keys: &[String]) -> StoreResult<Vec<Option<T>>> {
        self.store
            .get_many(keys)
            .await?
            .into_iter()
            .map(|raw| raw.map(|raw| serde_json::from_str(&raw)).transpose().map_err(StoreError::from))
            .collect()
    }

    pub async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.store.delete(key).await
    }
}
