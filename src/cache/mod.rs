//! Three-tier cache subsystem.
//!
//! # Data Flow
//! ```text
//! DomainService
//!     → cascade.rs (CacheCascade<E>: ordered read, write-through)
//!         → local.rs       (moka, per-namespace TTL)
//!         → distributed.rs (KeyValueStore: redis_store.rs or in-memory)
//!         → durable.rs     (DocumentStore: postgres.rs or in-memory)
//! ```
//!
//! # Design Decisions
//! - `CacheTiers` is constructed once and handed to every service; there are
//!   no process-wide cache singletons
//! - Key grammar and TTLs live in `keys.rs` only

pub mod cascade;
pub mod distributed;
pub mod durable;
pub mod error;
pub mod keys;
pub mod local;
pub mod postgres;
pub mod redis_store;

use std::sync::Arc;

use serde::Serialize;

use crate::config::schema::CacheConfig;
use crate::observability::metrics;
use crate::resilience::RetryPolicy;

pub use cascade::{CacheCascade, CachedEntity, DurableLookup};
pub use distributed::{DistributedTier, KeyValueStore, MemoryKeyValueStore};
pub use durable::{DocumentQuery, DocumentStore, MemoryDocumentStore, SortDirection, StoredDocument};
pub use error::{StoreError, StoreResult};
pub use keys::{CacheKey, DurablePolicy, Namespace, NamespacePolicy};
pub use local::{LocalCacheRegistry, LocalCacheStats, LocalTier, DEFAULT_LOCAL_CAPACITY};
pub use postgres::PgDocumentStore;
pub use redis_store::RedisStore;

/// What an administrative flush cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub local_caches: usize,
    pub local_entries: u64,
    pub distributed_flushed: bool,
}

/// The shared tier clients every cascade is built from.
#[derive(Clone)]
pub struct CacheTiers {
    registry: Arc<LocalCacheRegistry>,
    local_capacity: u64,
    distributed: Arc<dyn KeyValueStore>,
    durable: Arc<dyn DocumentStore>,
}

impl CacheTiers {
    pub fn new(local_capacity: u64, distributed: Arc<dyn KeyValueStore>, durable: Arc<dyn DocumentStore>) -> Self {
        Self {
            registry: Arc::new(LocalCacheRegistry::new()),
            local_capacity,
            distributed,
            durable,
        }
    }

    /// All tiers in process memory.
    pub fn in_memory() -> Self {
        Self::new(
            DEFAULT_LOCAL_CAPACITY,
            Arc::new(MemoryKeyValueStore::new()),
            Arc::new(MemoryDocumentStore::new()),
        )
    }

    /// Connect the configured backends; unset URLs fall back to memory.
    pub async fn from_config(config: &CacheConfig) -> StoreResult<Self> {
        let retry = RetryPolicy::from_config(&config.store_retry);

        let distributed: Arc<dyn KeyValueStore> = match &config.redis_url {
            Some(url) => {
                let store = RedisStore::connect(url, retry)?;
                if let Err(e) = store.ping().await {
                    tracing::warn!(error = %e, "Redis not reachable at startup, reads will fall through");
                }
                Arc::new(store)
            }
            None => {
                tracing::info!("No redis_url configured, using in-memory distributed tier");
                Arc::new(MemoryKeyValueStore::new())
            }
        };

        let durable: Arc<dyn DocumentStore> = match &config.database_url {
            Some(url) => {
                let store = PgDocumentStore::connect(url, config.database_max_connections, retry).await?;
                store.ensure_schema().await?;
                Arc::new(store)
            }
            None => {
                tracing::info!("No database_url configured, using in-memory durable tier");
                Arc::new(MemoryDocumentStore::new())
            }
        };

        Ok(Self::new(config.local_capacity, distributed, durable))
    }

    pub fn registry(&self) -> &Arc<LocalCacheRegistry> {
        &self.registry
    }

    pub fn local_capacity(&self) -> u64 {
        self.local_capacity
    }

    pub fn distributed(&self) -> &Arc<dyn KeyValueStore> {
        &self.distributed
    }

    pub fn durable(&self) -> &Arc<dyn DocumentStore> {
        &self.durable
    }

    /// Clear every named local cache and the distributed store.
    ///
    /// Local caches are cleared even when the distributed flush fails.
    pub async fn flush_all(&self) -> StoreResult<FlushReport> {
        let (local_caches, local_entries) = self.registry.clear_all();
        metrics::record_flush();

        if let Err(e) = self.distributed.flush().await {
            metrics::record_store_error("distributed");
            tracing::error!(local_caches, local_entries, error = %e, "Distributed flush failed");
            return Err(e);
        }

        tracing::info!(local_caches, local_entries, "All caches flushed");
        Ok(FlushReport {
            local_caches,
            local_entries,
            distributed_flushed: true,
        })
    }
}
