//! Process-local tier: named, bounded TTL caches.
//!
//! # Responsibilities
//! - One `moka` cache per namespace, bounded by entry count
//! - Expire entries after the namespace TTL
//! - Keep a registry of every named cache so they can be flushed together
//!
//! # Design Decisions
//! - The registry is an ordinary value injected where needed, not a global
//! - Values are stored typed; no serialization on this tier

use std::sync::{Arc, Mutex};
use std::time::Duration;

use moka::sync::Cache;
use serde::Serialize;

/// Default capacity of each named cache.
pub const DEFAULT_LOCAL_CAPACITY: u64 = 1000;

/// A bounded TTL map for one namespace.
pub struct LocalTier<V> {
    name: String,
    ttl: Duration,
    cache: Cache<String, V>,
}

impl<V: Clone + Send + Sync + 'static> LocalTier<V> {
    pub fn new(name: impl Into<String>, capacity: u64, ttl: Duration) -> Self {
        Self {
            name: name.into(),
            ttl,
            cache: Cache::builder().max_capacity(capacity).time_to_live(ttl).build(),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.cache.get(key)
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.cache.insert(key.into(), value);
    }

    pub fn invalidate(&self, key: &str) {
        self.cache.invalidate(key);
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Type-erased view used by the registry.
pub trait NamedCache: Send + Sync {
    fn name(&self) -> &str;
    fn clear(&self);
    fn entry_count(&self) -> u64;
}

impl<V: Clone + Send + Sync + 'static> NamedCache for LocalTier<V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks();
    }

    fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }
}

/// Size of one named cache, as reported to the admin surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalCacheStats {
    pub name: String,
    pub entries: u64,
}

/// Every named local cache in the process.
#[derive(Default)]
pub struct LocalCacheRegistry {
    caches: Mutex<Vec<Arc<dyn NamedCache>>>,
}

impl LocalCacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a named cache and remember it for flushes.
    pub fn create<V: Clone + Send + Sync + 'static>(
        &self,
        name: impl Into<String>,
        capacity: u64,
        ttl: Duration,
    ) -> Arc<LocalTier<V>> {
        let tier = Arc::new(LocalTier::new(name, capacity, ttl));
        self.caches
            .lock()
            .expect("local cache registry mutex poisoned")
            .push(tier.clone());
        tier
    }

    /// Clear every registered cache. Returns (caches, entries dropped).
    pub fn clear_all(&self) -> (usize, u64) {
        let caches = self.caches.lock().expect("local cache registry mutex poisoned");
        let mut dropped = 0;
        for cache in caches.iter() {
            dropped += cache.entry_count();
            cache.clear();
        }
        (caches.len(), dropped)
    }

    pub fn stats(&self) -> Vec<LocalCacheStats> {
        self.caches
            .lock()
            .expect("local cache registry mutex poisoned")
            .iter()
            .map(|cache| LocalCacheStats {
                name: cache.name().to_string(),
                entries: cache.entry_count(),
            })
            .collect()
    }
}
