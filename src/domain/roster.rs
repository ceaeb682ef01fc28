//! Editorial pro-player roster and stream status.
//!
//! These namespaces are read-only projections: reads never write the durable
//! tier, and only `ingest_roster` (the ingestion path) changes it.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;

use crate::cache::{
    CacheCascade, CacheKey, CacheTiers, DocumentQuery, DocumentStore, DurableLookup, Namespace, SortDirection,
    StoreResult, StoredDocument,
};
use crate::domain::models::{AccountNames, LiveStream, ProPlayer};

const ROSTER_COLLECTION: &str = "pro_players";
const INDEX_COLLECTION: &str = "pro_player_index";
const INDEX_DOCUMENT: &str = "account_names";

pub struct RosterService {
    durable: Arc<dyn DocumentStore>,
    players: CacheCascade<Vec<ProPlayer>>,
    names: CacheCascade<AccountNames>,
    streams: CacheCascade<Vec<LiveStream>>,
}

impl RosterService {
    pub fn new(tiers: &CacheTiers) -> Self {
        Self {
            durable: tiers.durable().clone(),
            players: CacheCascade::new(Namespace::ProPlayers, tiers),
            names: CacheCascade::new(Namespace::AccountNames, tiers),
            streams: CacheCascade::new(Namespace::LiveStreams, tiers),
        }
    }

    /// Pro players, optionally narrowed to one league and team, sorted by name.
    ///
    /// `team` only applies together with `region`.
    pub async fn pro_players(&self, region: Option<&str>, team: Option<&str>) -> Vec<ProPlayer> {
        let key = CacheKey::pro_players(region, team);

        let mut query = DocumentQuery::new();
        if let Some(region) = region {
            query = query.filter("region", region.to_ascii_uppercase());
            if let Some(team) = team {
                query = query.filter("team", team);
            }
        }
        let query = query.order_by("player", SortDirection::Ascending);

        self.players
            .read(&key, &DurableLookup::Collect(query))
            .await
            .unwrap_or_default()
    }

    /// puuid to pro player name, for every rostered account.
    pub async fn account_names(&self) -> AccountNames {
        self.names
            .read(&CacheKey::account_names(), &DurableLookup::by_id(INDEX_DOCUMENT))
            .await
            .unwrap_or_default()
    }

    pub async fn live_streams(&self, live: bool) -> Vec<LiveStream> {
        let id = if live { "live" } else { "not_live" };
        self.streams
            .read(&CacheKey::live_streams(live), &DurableLookup::field(id, "streams"))
            .await
            .unwrap_or_default()
    }

    /// Store roster records and refresh the name index, then drop every cached
    /// view they could appear in.
    pub async fn ingest_roster(&self, players: &[ProPlayer]) -> StoreResult<()> {
        if players.is_empty() {
            return Ok(());
        }

        // 1. Roster documents
        let documents = players
            .iter()
            .map(|player| -> StoreResult<StoredDocument> {
                Ok(StoredDocument {
                    id: player.document_id(),
                    body: serde_json::to_value(ProPlayer {
                        region: player.region.to_ascii_uppercase(),
                        ..player.clone()
                    })?,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;
        self.durable.batch_set(ROSTER_COLLECTION, &documents).await?;

        // 2. Name index
        let index: serde_json::Map<String, Value> = players
            .iter()
            .flat_map(|player| {
                player
                    .puuid
                    .iter()
                    .map(|puuid| (puuid.clone(), Value::String(player.player.clone())))
            })
            .collect();
        let index = Value::Object(index);
        if !self.durable.update(INDEX_COLLECTION, INDEX_DOCUMENT, &index).await? {
            self.durable.set(INDEX_COLLECTION, INDEX_DOCUMENT, &index).await?;
        }

        // 3. Cached views
        let mut stale: BTreeSet<String> = BTreeSet::new();
        stale.insert(CacheKey::pro_players(None, None).to_string());
        for player in players {
            stale.insert(CacheKey::pro_players(Some(&player.region), None).to_string());
            stale.insert(CacheKey::pro_players(Some(&player.region), Some(&player.team)).to_string());
        }
        for key in stale.iter().filter_map(|raw| CacheKey::parse(raw)) {
            self.players.invalidate(&key).await;
        }
        self.names.invalidate(&CacheKey::account_names()).await;

        tracing::info!(players = players.len(), invalidated = stale.len() + 1, "Roster ingested");
        Ok(())
    }
}
