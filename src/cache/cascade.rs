//! Generic three-tier cache cascade.
//!
//! # Data Flow
//! ```text
//! read:   local ──miss──▶ distributed ──miss──▶ durable ──miss──▶ None
//!           ▲                 │  hit                 │  hit
//!           └─────────────────┘◀─────────────────────┘  (backfill faster tiers)
//!
//! write:  durable (ReadWrite only) ──▶ distributed ──▶ local
//! ```
//!
//! # Design Decisions
//! - One `CacheCascade<E>` per entity family; namespace policy fixes TTL and
//!   durable behavior
//! - A failing store counts as a miss for that tier and never aborts a read
//! - A failed durable write stops the write before any faster tier is touched
//! - Every alias key of an entity is written together

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::cache::distributed::DistributedTier;
use crate::cache::durable::{DocumentQuery, DocumentStore};
use crate::cache::error::{StoreError, StoreResult};
use crate::cache::keys::{CacheKey, DurablePolicy, Namespace, NamespacePolicy};
use crate::cache::local::LocalTier;
use crate::cache::CacheTiers;
use crate::observability::metrics;

/// A value that can live in the cascade.
pub trait CachedEntity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Other keys naming the same record. Written together with the primary key.
    fn aliases(&self) -> Vec<CacheKey> {
        Vec::new()
    }

    /// Durable document id; the rendered primary key when `None`.
    fn document_id(&self) -> Option<String> {
        None
    }

    /// Whether this value means "nothing there". Such values are never cached.
    fn is_absent(&self) -> bool {
        false
    }
}

impl<T> CachedEntity for Vec<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn is_absent(&self) -> bool {
        self.is_empty()
    }
}

impl<V> CachedEntity for BTreeMap<String, V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn is_absent(&self) -> bool {
        self.is_empty()
    }
}

impl CachedEntity for Value {
    fn is_absent(&self) -> bool {
        self.is_null()
    }
}

/// How to find an entity in the durable tier.
#[derive(Debug, Clone, PartialEq)]
pub enum DurableLookup {
    /// Document with this id.
    ById(String),
    /// One field of a document.
    Field { id: String, field: String },
    /// First document matching the query.
    First(DocumentQuery),
    /// Every matching document, as a JSON array.
    Collect(DocumentQuery),
    /// Do not consult the durable tier.
    Skip,
}

impl DurableLookup {
    pub fn by_id(id: impl Into<String>) -> Self {
        DurableLookup::ById(id.into())
    }

    pub fn field(id: impl Into<String>, field: impl Into<String>) -> Self {
        DurableLookup::Field {
            id: id.into(),
            field: field.into(),
        }
    }
}

/// Tier names used in logs and metrics.
const LOCAL: &str = "local";
const DISTRIBUTED: &str = "distributed";
const DURABLE: &str = "durable";

/// Ordered read and write-through over the three tiers for one entity type.
pub struct CacheCascade<E: CachedEntity> {
    namespace: Namespace,
    policy: NamespacePolicy,
    local: Arc<LocalTier<E>>,
    distributed: DistributedTier,
    durable: Arc<dyn DocumentStore>,
}

impl<E: CachedEntity> CacheCascade<E> {
    pub fn new(namespace: Namespace, tiers: &CacheTiers) -> Self {
        Self::with_local_ttl(namespace, tiers, namespace.policy().ttl)
    }

    /// Like `new`, with a different process-local TTL.
    pub fn with_local_ttl(namespace: Namespace, tiers: &CacheTiers, local_ttl: Duration) -> Self {
        let local = tiers
            .registry()
            .create(namespace.prefix(), tiers.local_capacity(), local_ttl);
        Self {
            namespace,
            policy: namespace.policy(),
            local,
            distributed: DistributedTier::new(tiers.distributed().clone()),
            durable: tiers.durable().clone(),
        }
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn policy(&self) -> NamespacePolicy {
        self.policy
    }

    pub fn local(&self) -> &LocalTier<E> {
        &self.local
    }

    /// Look `key` up tier by tier, backfilling faster tiers on a hit.
    pub async fn read(&self, key: &CacheKey, lookup: &DurableLookup) -> Option<E> {
        // 1. Process-local
        if let Some(entity) = self.local.get(key.as_str()) {
            metrics::record_cache_hit(LOCAL);
            tracing::debug!(key = %key, tier = LOCAL, "Cache hit");
            return Some(entity);
        }

        // 2. Distributed
        match self.distributed.get_json::<E>(key.as_str()).await {
            Ok(Some(entity)) => {
                metrics::record_cache_hit(DISTRIBUTED);
                tracing::debug!(key = %key, tier = DISTRIBUTED, "Cache hit");
                self.local.insert(key.as_str(), entity.clone());
                return Some(entity);
            }
            Ok(None) => {}
            Err(e) => self.tier_failed(DISTRIBUTED, key, &e),
        }

        // 3. Durable
        if self.policy.durable != DurablePolicy::None {
            match self.read_durable(lookup).await {
                Ok(Some(entity)) => {
                    metrics::record_cache_hit(DURABLE);
                    tracing::debug!(key = %key, tier = DURABLE, "Cache hit");
                    self.populate_fast_tiers(key, &entity).await;
                    return Some(entity);
                }
                Ok(None) => {}
                Err(e) => self.tier_failed(DURABLE, key, &e),
            }
        }

        metrics::record_cache_miss();
        tracing::debug!(key = %key, "Cache miss");
        None
    }

    /// Write-through with the namespace TTL.
    pub async fn write(&self, key: &CacheKey, entity: &E) -> StoreResult<()> {
        self.write_with_ttl(key, entity, self.policy.ttl).await
    }

    /// Write-through: durable, then distributed, then local.
    ///
    /// `ttl` applies to the distributed tier; the local tier keeps the TTL it
    /// was created with. Fails only when the durable write fails, in which case
    /// no faster tier is written.
    pub async fn write_with_ttl(&self, key: &CacheKey, entity: &E, ttl: Duration) -> StoreResult<()> {
        if entity.is_absent() {
            return Ok(());
        }

        if self.policy.durable == DurablePolicy::ReadWrite {
            if let Some(collection) = self.policy.collection {
                let id = entity.document_id().unwrap_or_else(|| key.as_str().to_string());
                let document = serde_json::to_value(entity)?;
                if let Err(e) = self.durable.set(collection, &id, &document).await {
                    metrics::record_store_error(DURABLE);
                    tracing::error!(
                        key = %key,
                        collection,
                        document_id = %id,
                        error = %e,
                        "Durable write failed, skipping faster tiers"
                    );
                    return Err(e);
                }
            }
        }

        let keys = self.all_keys(key, entity);
        if let Err(e) = self.distributed.set_json_many(&keys, entity, ttl).await {
            self.tier_failed(DISTRIBUTED, key, &e);
        }
        for k in keys {
            self.local.insert(k, entity.clone());
        }
        Ok(())
    }

    /// Drop `key` from the TTL tiers. The durable tier is left alone.
    pub async fn invalidate(&self, key: &CacheKey) {
        self.local.invalidate(key.as_str());
        if let Err(e) = self.distributed.delete(key.as_str()).await {
            self.tier_failed(DISTRIBUTED, key, &e);
        }
    }

    async fn read_durable(&self, lookup: &DurableLookup) -> StoreResult<Option<E>> {
        let Some(collection) = self.policy.collection else {
            return Ok(None);
        };

        let raw = match lookup {
            DurableLookup::Skip => return Ok(None),
            DurableLookup::ById(id) => self.durable.get(collection, id).await?,
            DurableLookup::Field { id, field } => self
                .durable
                .get(collection, id)
                .await?
                .and_then(|mut doc| doc.get_mut(field.as_str()).map(Value::take)),
            DurableLookup::First(query) => {
                let query = query.clone().limit(1);
                self.durable
                    .query(collection, &query)
                    .await?
                    .into_iter()
                    .next()
                    .map(|doc| doc.body)
            }
            DurableLookup::Collect(query) => {
                let docs = self.durable.query(collection, query).await?;
                Some(Value::Array(docs.into_iter().map(|doc| doc.body).collect()))
            }
        };

        match raw {
            Some(Value::Null) | None => Ok(None),
            Some(raw) => {
                let entity: E = serde_json::from_value(raw).map_err(StoreError::from)?;
                Ok((!entity.is_absent()).then_some(entity))
            }
        }
    }

    async fn populate_fast_tiers(&self, key: &CacheKey, entity: &E) {
        let keys = self.all_keys(key, entity);
        if let Err(e) = self.distributed.set_json_many(&keys, entity, self.policy.ttl).await {
            self.tier_failed(DISTRIBUTED, key, &e);
        }
        for k in keys {
            self.local.insert(k, entity.clone());
        }
    }

    fn all_keys(&self, key: &CacheKey, entity: &E) -> Vec<String> {
        let mut keys = vec![key.as_str().to_string()];
        for alias in entity.aliases() {
            if !keys.iter().any(|k| k == alias.as_str()) {
                keys.push(alias.as_str().to_string());
            }
        }
        keys
    }

    fn tier_failed(&self, tier: &'static str, key: &CacheKey, error: &StoreError) {
        metrics::record_store_error(tier);
        tracing::warn!(
            namespace = %self.namespace,
            key = %key,
            tier,
            error = %error,
            "Cache tier unavailable, treating as miss"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::distributed::{KeyValueStore, MemoryKeyValueStore};
    use crate::cache::durable::{MemoryDocumentStore, SortDirection};
    use crate::upstream::Region;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Player {
        puuid: String,
        name: String,
        region: Region,
    }

    impl CachedEntity for Player {
        fn aliases(&self) -> Vec<CacheKey> {
            vec![CacheKey::account_by_riot_id(self.region, &self.name, "EUW")]
        }

        fn document_id(&self) -> Option<String> {
            Some(format!("{}:{}", self.region, self.puuid))
        }
    }

    struct Fixture {
        kv: Arc<MemoryKeyValueStore>,
        docs: Arc<MemoryDocumentStore>,
        tiers: CacheTiers,
    }

    fn fixture() -> Fixture {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let docs = Arc::new(MemoryDocumentStore::new());
        let tiers = CacheTiers::new(100, kv.clone(), docs.clone());
        Fixture { kv, docs, tiers }
    }

    fn player() -> Player {
        Player {
            puuid: "p-1".into(),
            name: "Caps".into(),
            region: Region::Euw,
        }
    }

    #[tokio::test]
    async fn test_write_then_read_hits_local_only() {
        let f = fixture();
        let cascade: CacheCascade<Player> = CacheCascade::new(Namespace::Account, &f.tiers);
        let key = CacheKey::account_by_puuid(Region::Euw, "p-1");

        cascade.write(&key, &player()).await.unwrap();
        let reads_before = (f.kv.reads(), f.docs.reads());

        assert_eq!(cascade.read(&key, &DurableLookup::Skip).await, Some(player()));
        assert_eq!((f.kv.reads(), f.docs.reads()), reads_before);
    }

    #[tokio::test]
    async fn test_write_through_reaches_every_tier_and_alias() {
        let f = fixture();
        let cascade: CacheCascade<Player> = CacheCascade::new(Namespace::Account, &f.tiers);
        let key = CacheKey::account_by_puuid(Region::Euw, "p-1");

        cascade.write(&key, &player()).await.unwrap();

        let stored = f.docs.get("accounts", "euw:p-1").await.unwrap().unwrap();
        assert_eq!(stored["name"], "Caps");
        assert!(f.kv.exists(key.as_str()).await.unwrap());
        assert!(f.kv.exists("account:username:Caps#EUW:euw").await.unwrap());
        assert!(cascade.local().get("account:username:Caps#EUW:euw").is_some());
    }

    #[tokio::test]
    async fn test_distributed_hit_backfills_local() {
        let f = fixture();
        let cascade: CacheCascade<Player> = CacheCascade::new(Namespace::Account, &f.tiers);
        let key = CacheKey::account_by_puuid(Region::Euw, "p-1");
        let raw = serde_json::to_string(&player()).unwrap();
        f.kv.set(key.as_str(), &raw, None).await.unwrap();

        assert_eq!(cascade.read(&key, &DurableLookup::Skip).await, Some(player()));
        assert_eq!(cascade.local().get(key.as_str()), Some(player()));
    }

    #[tokio::test]
    async fn test_durable_hit_backfills_distributed_and_local() {
        let f = fixture();
        let cascade: CacheCascade<Player> = CacheCascade::new(Namespace::Account, &f.tiers);
        let key = CacheKey::account_by_puuid(Region::Euw, "p-1");
        f.docs
            .set("accounts", "euw:p-1", &serde_json::to_value(player()).unwrap())
            .await
            .unwrap();

        let found = cascade.read(&key, &DurableLookup::by_id("euw:p-1")).await;
        assert_eq!(found, Some(player()));
        assert!(f.kv.exists(key.as_str()).await.unwrap());
        assert!(cascade.local().get(key.as_str()).is_some());
    }

    #[tokio::test]
    async fn test_failing_stores_are_misses() {
        let f = fixture();
        let cascade: CacheCascade<Player> = CacheCascade::new(Namespace::Account, &f.tiers);
        let key = CacheKey::account_by_puuid(Region::Euw, "p-1");
        f.kv.set_offline(true);
        f.docs.set_offline(true);

        assert_eq!(cascade.read(&key, &DurableLookup::by_id("euw:p-1")).await, None);
    }

    #[tokio::test]
    async fn test_failed_durable_write_skips_faster_tiers() {
        let f = fixture();
        let cascade: CacheCascade<Player> = CacheCascade::new(Namespace::Account, &f.tiers);
        let key = CacheKey::account_by_puuid(Region::Euw, "p-1");
        f.docs.set_offline(true);

        assert!(cascade.write(&key, &player()).await.is_err());
        assert!(f.kv.is_empty());
        assert!(cascade.local().get(key.as_str()).is_none());
    }

    #[tokio::test]
    async fn test_read_only_namespace_never_writes_durable() {
        let f = fixture();
        let cascade: CacheCascade<Vec<Value>> = CacheCascade::new(Namespace::ProPlayers, &f.tiers);
        let key = CacheKey::pro_players(None, None);

        cascade.write(&key, &vec![json!({"name": "Caps"})]).await.unwrap();
        assert_eq!(f.docs.count("pro_players"), 0);
        assert!(f.kv.exists(key.as_str()).await.unwrap());
    }

    #[tokio::test]
    async fn test_collect_lookup_builds_list_from_query() {
        let f = fixture();
        for (id, rank) in [("a", 2), ("b", 1)] {
            f.docs
                .set("leaderboard", id, &json!({"region": "kr", "rank": rank}))
                .await
                .unwrap();
        }
        let cascade: CacheCascade<Vec<Value>> = CacheCascade::new(Namespace::Leaderboard, &f.tiers);
        let key = CacheKey::leaderboard(Region::Kr, 10, 1);
        let query = DocumentQuery::new()
            .filter("region", "kr")
            .order_by("rank", SortDirection::Ascending);

        let rows = cascade.read(&key, &DurableLookup::Collect(query)).await.unwrap();
        assert_eq!(rows[0]["rank"], 1);
        assert_eq!(rows.len(), 2);

        let empty = DocumentQuery::new().filter("region", "na");
        let other = CacheKey::leaderboard(Region::Na, 10, 1);
        assert_eq!(cascade.read(&other, &DurableLookup::Collect(empty)).await, None);
    }

    #[tokio::test]
    async fn test_field_lookup_reads_one_field() {
        let f = fixture();
        f.docs
            .set("help", "runes", &json!({"data": {"8000": "Precision"}}))
            .await
            .unwrap();
        let cascade: CacheCascade<Value> = CacheCascade::new(Namespace::Runes, &f.tiers);

        let data = cascade
            .read(&CacheKey::runes(), &DurableLookup::field("runes", "data"))
            .await;
        assert_eq!(data, Some(json!({"8000": "Precision"})));
    }

    #[tokio::test]
    async fn test_absent_values_are_not_written() {
        let f = fixture();
        let cascade: CacheCascade<Vec<String>> = CacheCascade::new(Namespace::MatchIds, &f.tiers);
        let key = CacheKey::match_ids("p-1", 0, 20, None);

        cascade.write(&key, &Vec::new()).await.unwrap();
        assert!(f.kv.is_empty());
        assert!(cascade.local().get(key.as_str()).is_none());
    }

    #[tokio::test]
    async fn test_invalidate_clears_ttl_tiers() {
        let f = fixture();
        let cascade: CacheCascade<Vec<String>> = CacheCascade::new(Namespace::MatchIds, &f.tiers);
        let key = CacheKey::match_ids("p-1", 0, 20, None);

        cascade.write(&key, &vec!["EUW1_1".to_string()]).await.unwrap();
        cascade.invalidate(&key).await;
        assert!(!f.kv.exists(key.as_str()).await.unwrap());
        assert_eq!(cascade.read(&key, &DurableLookup::Skip).await, None);
    }
}
