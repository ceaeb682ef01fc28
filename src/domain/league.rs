//! Ranked standings and the regional leaderboard.

use std::sync::Arc;

use crate::cache::{CacheCascade, CacheKey, CacheTiers, DocumentQuery, DurableLookup, Namespace, SortDirection};
use crate::domain::models::{LeaderboardEntry, LeagueEntry};
use crate::domain::service::get_or_fetch;
use crate::upstream::{Region, UpstreamGatewayClient, UpstreamResult};

pub struct LeagueService {
    gateway: Arc<UpstreamGatewayClient>,
    entries: CacheCascade<Vec<LeagueEntry>>,
    leaderboard: CacheCascade<Vec<LeaderboardEntry>>,
}

impl LeagueService {
    pub fn new(gateway: Arc<UpstreamGatewayClient>, tiers: &CacheTiers) -> Self {
        Self {
            gateway,
            entries: CacheCascade::new(Namespace::LeagueEntries, tiers),
            leaderboard: CacheCascade::new(Namespace::Leaderboard, tiers),
        }
    }

    /// Every ranked queue the player is placed in. Unranked players get an empty list.
    pub async fn league_entries(&self, region: Region, puuid: &str) -> UpstreamResult<Vec<LeagueEntry>> {
        let key = CacheKey::league_entries(puuid);
        let endpoint = format!("/lol/league/v4/entries/by-puuid/{puuid}");

        let entries = get_or_fetch(&self.entries, &key, &DurableLookup::Skip, || {
            self.gateway.get_json(region.platform(), &endpoint, &[])
        })
        .await?;
        Ok(entries.unwrap_or_default())
    }

    /// One page of the precomputed leaderboard, best rank first. Pages start at 1.
    ///
    /// Served from the durable projection only; the upstream is never asked.
    pub async fn leaderboard(&self, region: Region, limit: u32, page: u32) -> Vec<LeaderboardEntry> {
        let page = page.max(1);
        let key = CacheKey::leaderboard(region, limit, page);
        let query = DocumentQuery::new()
            .filter("region", region.token())
            .order_by("rank", SortDirection::Ascending)
            .limit(limit as usize)
            .offset((page as usize - 1).saturating_mul(limit as usize));

        self.leaderboard
            .read(&key, &DurableLookup::Collect(query))
            .await
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{DocumentStore, StoredDocument};
    use crate::domain::testing::fixture;
    use serde_json::json;

    #[tokio::test]
    async fn test_entries_fetched_from_platform() {
        let f = fixture();
        f.upstream.route(
            "/lol/league/v4/entries/by-puuid/p1",
            200,
            json!([{"queueType": "RANKED_SOLO_5x5", "tier": "GOLD", "rank": "II",
                    "leaguePoints": 40, "wins": 10, "losses": 8, "hotStreak": false}]),
        );

        let entries = f.services.league.league_entries(Region::Na, "p1").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].tier, "GOLD");
        assert_eq!(f.upstream.hosts(), vec!["na1.api.riotgames.com"]);
    }

    #[tokio::test]
    async fn test_unranked_player_is_empty_and_refetched() {
        let f = fixture();
        f.upstream.route("/lol/league/v4/entries/by-puuid/p1", 200, json!([]));

        assert!(f.services.league.league_entries(Region::Na, "p1").await.unwrap().is_empty());
        assert!(f.services.league.league_entries(Region::Na, "p1").await.unwrap().is_empty());
        assert_eq!(f.upstream.total_calls(), 2);
    }

    #[tokio::test]
    async fn test_leaderboard_pages_by_rank() {
        let f = fixture();
        let rows: Vec<StoredDocument> = (1..=5)
            .map(|rank| StoredDocument {
                id: format!("kr:{rank}"),
                body: json!({"rank": rank, "puuid": format!("p{rank}"), "region": "kr", "leaguePoints": 1000 - rank}),
            })
            .chain(std::iter::once(StoredDocument {
                id: "euw:1".into(),
                body: json!({"rank": 1, "puuid": "e1", "region": "euw"}),
            }))
            .collect();
        f.docs.batch_set("leaderboard", &rows).await.unwrap();

        let page = f.services.league.leaderboard(Region::Kr, 2, 2).await;
        let ranks: Vec<u32> = page.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![3, 4]);
        assert_eq!(f.upstream.total_calls(), 0);

        assert!(f.services.league.leaderboard(Region::Na, 2, 1).await.is_empty());
    }

    #[tokio::test]
    async fn test_leaderboard_far_page_is_empty() {
        let f = fixture();
        f.docs
            .set("leaderboard", "kr:1", &json!({"rank": 1, "puuid": "p1", "region": "kr"}))
            .await
            .unwrap();

        assert!(f.services.league.leaderboard(Region::Kr, 100_000, 100_000).await.is_empty());
        assert!(f.services.league.leaderboard(Region::Kr, u32::MAX, u32::MAX).await.is_empty());
        assert_eq!(f.services.league.leaderboard(Region::Kr, 10, 1).await.len(), 1);
    }
}
