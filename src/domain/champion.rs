//! Champion catalog, aggregates, per-champion match index, mastery, and main roles.

use std::sync::Arc;

use crate::cache::{CacheCascade, CacheKey, CacheTiers, DocumentQuery, DurableLookup, Namespace, SortDirection};
use crate::domain::models::{
    ChampionMastery, ChampionMatch, ChampionNames, ChampionPositions, ChampionRates, ChampionStats,
};
use crate::domain::service::get_or_fetch;
use crate::upstream::{Region, ResourceClient, UpstreamGatewayClient, UpstreamResult};

/// Community dataset of per-role play rates.
pub const CHAMPION_RATES_URL: &str =
    "https://cdn.merakianalytics.com/riot/lol/resources/latest/en-US/championrates.json";

/// Role reported for a champion with no rates.
pub const DEFAULT_POSITION: &str = "TOP";

/// Filters for [`ChampionService::matches`].
#[derive(Debug, Clone, Default)]
pub struct ChampionMatchFilter {
    pub lane: Option<String>,
    pub versus: Option<u32>,
    /// Continue after this match id.
    pub start_after: Option<String>,
}

pub struct ChampionService {
    gateway: Arc<UpstreamGatewayClient>,
    resources: Arc<ResourceClient>,
    names: CacheCascade<ChampionNames>,
    stats: CacheCascade<ChampionStats>,
    matches: CacheCascade<Vec<ChampionMatch>>,
    mastery: CacheCascade<Vec<ChampionMastery>>,
    positions: CacheCascade<ChampionPositions>,
}

impl ChampionService {
    pub fn new(gateway: Arc<UpstreamGatewayClient>, resources: Arc<ResourceClient>, tiers: &CacheTiers) -> Self {
        Self {
            gateway,
            resources,
            names: CacheCascade::new(Namespace::ChampionNames, tiers),
            stats: CacheCascade::new(Namespace::ChampionStats, tiers),
            matches: CacheCascade::new(Namespace::ChampionMatches, tiers),
            mastery: CacheCascade::new(Namespace::ChampionMastery, tiers),
            positions: CacheCascade::new(Namespace::ChampionPositions, tiers),
        }
    }

    /// Champion id to name. Empty until the catalog has been ingested.
    pub async fn names(&self) -> ChampionNames {
        self.names
            .read(&CacheKey::champion_names(), &DurableLookup::by_id("names"))
            .await
            .unwrap_or_default()
    }

    pub async fn stats(&self, champion_id: u32) -> Option<ChampionStats> {
        self.stats
            .read(
                &CacheKey::champion_stats(champion_id),
                &DurableLookup::by_id(champion_id.to_string()),
            )
            .await
    }

    /// Newest indexed matches of a champion, optionally narrowed by lane and opponent.
    pub async fn matches(&self, champion_id: u32, limit: u32, filter: &ChampionMatchFilter) -> Vec<ChampionMatch> {
        let key = CacheKey::champion_matches(
            champion_id,
            limit,
            filter.lane.as_deref(),
            filter.versus,
            filter.start_after.as_deref(),
        );

        let mut query = DocumentQuery::new().filter("championId", champion_id);
        if let Some(lane) = &filter.lane {
            query = query.filter("lane", lane.as_str());
        }
        if let Some(versus) = filter.versus {
            query = query.filter("versus", versus);
        }
        query = query
            .order_by("gameCreation", SortDirection::Descending)
            .limit(limit as usize);
        if let Some(cursor) = &filter.start_after {
            query = query.start_after(cursor.as_str());
        }

        self.matches
            .read(&key, &DurableLookup::Collect(query))
            .await
            .unwrap_or_default()
    }

    /// Mastery on every champion the player has touched.
    pub async fn mastery(&self, region: Region, puuid: &str) -> UpstreamResult<Vec<ChampionMastery>> {
        let key = CacheKey::champion_mastery(puuid);
        let endpoint = format!("/lol/champion-mastery/v4/champion-masteries/by-puuid/{puuid}");

        let mastery = get_or_fetch(&self.mastery, &key, &DurableLookup::Skip, || {
            self.gateway.get_json(region.platform(), &endpoint, &[])
        })
        .await?;
        Ok(mastery.unwrap_or_default())
    }

    /// Most played role of each requested champion.
    ///
    /// Every id gets an answer: champions without rates, and every champion
    /// while the dataset is unreachable, fall back to [`DEFAULT_POSITION`].
    pub async fn positions(&self, champion_ids: &[u32]) -> ChampionPositions {
        let fetched = get_or_fetch(&self.positions, &CacheKey::champion_positions(), &DurableLookup::Skip, || async {
            let rates = self.resources.get_json::<ChampionRates>(CHAMPION_RATES_URL).await?;
            UpstreamResult::Ok(rates.map(|rates| main_roles(&rates)))
        })
        .await;

        let all = match fetched {
            Ok(all) => all.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Champion rates unavailable, using default positions");
                ChampionPositions::new()
            }
        };

        champion_ids
            .iter()
            .map(|id| {
                let id = id.to_string();
                let role = all.get(&id).cloned().unwrap_or_else(|| DEFAULT_POSITION.to_string());
                (id, role)
            })
            .collect()
    }
}

/// Highest play rate wins; a missing rate counts as zero and ties keep the first role.
fn main_roles(rates: &ChampionRates) -> ChampionPositions {
    rates
        .data
        .iter()
        .map(|(id, roles)| {
            let best = roles.iter().fold(None::<(&str, f64)>, |best, (role, rate)| {
                let rate = rate.play_rate.unwrap_or(0.0);
                match best {
                    Some((_, top)) if top >= rate => best,
                    _ => Some((role.as_str(), rate)),
                }
            });
            let role = best.map_or(DEFAULT_POSITION, |(role, _)| role);
            (id.clone(), role.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{DocumentStore, KeyValueStore, StoredDocument};
    use crate::domain::testing::fixture;
    use serde_json::json;

    async fn seed_matches(f: &crate::domain::testing::Fixture) {
        let rows = [
            ("EUW1_1", "MIDDLE", 238, 100),
            ("EUW1_2", "MIDDLE", 157, 300),
            ("EUW1_3", "TOP", 238, 200),
            ("EUW1_4", "MIDDLE", 238, 400),
        ]
        .into_iter()
        .map(|(id, lane, versus, created)| StoredDocument {
            id: id.to_string(),
            body: json!({"matchId": id, "championId": 103, "lane": lane, "versus": versus, "gameCreation": created}),
        })
        .collect::<Vec<_>>();
        f.docs.batch_set("champion_matches", &rows).await.unwrap();
    }

    fn ids(matches: &[ChampionMatch]) -> Vec<&str> {
        matches.iter().map(|m| m.match_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_matches_filtered_and_newest_first() {
        let f = fixture();
        seed_matches(&f).await;

        let all = f.services.champions.matches(103, 10, &ChampionMatchFilter::default()).await;
        assert_eq!(ids(&all), vec!["EUW1_4", "EUW1_2", "EUW1_3", "EUW1_1"]);

        let filter = ChampionMatchFilter {
            lane: Some("MIDDLE".into()),
            versus: Some(238),
            start_after: None,
        };
        let mid = f.services.champions.matches(103, 10, &filter).await;
        assert_eq!(ids(&mid), vec!["EUW1_4", "EUW1_1"]);
    }

    #[tokio::test]
    async fn test_matches_cursor_continues_after_id() {
        let f = fixture();
        seed_matches(&f).await;

        let filter = ChampionMatchFilter {
            start_after: Some("EUW1_2".into()),
            ..Default::default()
        };
        let page = f.services.champions.matches(103, 1, &filter).await;
        assert_eq!(ids(&page), vec!["EUW1_3"]);
    }

    #[tokio::test]
    async fn test_stats_and_names_come_from_durable_then_distributed() {
        let f = fixture();
        f.docs
            .set("champion_stats", "103", &json!({"kills": 5, "deaths": 2, "assists": 7, "wins": 1, "losses": 0}))
            .await
            .unwrap();
        f.docs
            .set("champions", "names", &json!({"103": "Ahri", "157": "Yasuo"}))
            .await
            .unwrap();

        assert_eq!(f.services.champions.stats(103).await.unwrap().kills, 5);
        assert!(f.services.champions.stats(1).await.is_none());
        assert_eq!(f.services.champions.names().await["157"], "Yasuo");
        assert!(f.kv.exists("champion_names:all").await.unwrap());
    }

    const RATES_PATH: &str = "/riot/lol/resources/latest/en-US/championrates.json";

    #[tokio::test]
    async fn test_positions_pick_highest_play_rate() {
        let f = fixture();
        f.upstream.route(
            RATES_PATH,
            200,
            json!({
                "data": {
                    "103": {"MIDDLE": {"playRate": 0.91}, "BOTTOM": {"playRate": 0.04}},
                    "412": {"UTILITY": {"playRate": 0.97}, "TOP": {"playRate": 0.0}},
                    "950": {}
                },
                "patch": "14.1"
            }),
        );

        let positions = f.services.champions.positions(&[103, 412, 950, 9999]).await;

        assert_eq!(positions["103"], "MIDDLE");
        assert_eq!(positions["412"], "UTILITY");
        assert_eq!(positions["950"], "TOP");
        assert_eq!(positions["9999"], "TOP");
        assert_eq!(f.upstream.hosts(), vec!["cdn.merakianalytics.com"]);
    }

    #[tokio::test]
    async fn test_positions_dataset_is_fetched_once() {
        let f = fixture();
        f.upstream.route(RATES_PATH, 200, json!({"data": {"103": {"MIDDLE": {"playRate": 0.9}}}}));

        f.services.champions.positions(&[103]).await;
        let again = f.services.champions.positions(&[103, 1]).await;

        assert_eq!(again["103"], "MIDDLE");
        assert_eq!(again["1"], "TOP");
        assert_eq!(f.upstream.calls_to(RATES_PATH), 1);
        assert!(f.kv.exists("champion_positions:all").await.unwrap());
    }

    #[tokio::test]
    async fn test_positions_default_when_dataset_unavailable() {
        let f = fixture();
        f.upstream.route(RATES_PATH, 500, json!({}));

        let positions = f.services.champions.positions(&[103, 157]).await;
        assert_eq!(positions.len(), 2);
        assert!(positions.values().all(|role| role == DEFAULT_POSITION));

        // Failure is not cached; the next call reaches the dataset again
        f.upstream.route(RATES_PATH, 200, json!({"data": {"157": {"MIDDLE": {"playRate": 0.6}, "TOP": {"playRate": 0.3}}}}));
        assert_eq!(f.services.champions.positions(&[157]).await["157"], "MIDDLE");
        assert_eq!(f.upstream.calls_to(RATES_PATH), 2);
    }

    #[tokio::test]
    async fn test_mastery_from_upstream() {
        let f = fixture();
        f.upstream.route(
            "/lol/champion-mastery/v4/champion-masteries/by-puuid/p1",
            200,
            json!([{"championId": 103, "championLevel": 7, "championPoints": 250000}]),
        );

        let mastery = f.services.champions.mastery(Region::Euw, "p1").await.unwrap();
        assert_eq!(mastery[0].champion_points, 250000);
        assert_eq!(f.upstream.hosts(), vec!["euw1.api.riotgames.com"]);
    }
}
