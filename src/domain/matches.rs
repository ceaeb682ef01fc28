//! Live games, match id listings, and match records.

use std::sync::Arc;

use crate::cache::{CacheCascade, CacheKey, CacheTiers, DurableLookup, Namespace};
use crate::domain::models::{ActiveMatch, MatchDetail};
use crate::domain::service::{fan_out, get_or_fetch};
use crate::upstream::{Region, UpstreamGatewayClient, UpstreamResult};

/// Optional narrowing for [`MatchService::match_ids`].
#[derive(Debug, Clone, Default)]
pub struct MatchIdsFilter {
    /// Epoch seconds, inclusive.
    pub start_time: Option<i64>,
    /// Epoch seconds, inclusive.
    pub end_time: Option<i64>,
    pub queue: Option<u32>,
    /// `ranked`, `normal`, `tourney` or `tutorial`.
    pub match_type: Option<String>,
}

impl MatchIdsFilter {
    pub fn queue(queue: u32) -> Self {
        Self {
            queue: Some(queue),
            ..Self::default()
        }
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(t) = self.start_time {
            params.push(("startTime", t.to_string()));
        }
        if let Some(t) = self.end_time {
            params.push(("endTime", t.to_string()));
        }
        if let Some(queue) = self.queue {
            params.push(("queue", queue.to_string()));
        }
        if let Some(kind) = &self.match_type {
            params.push(("type", kind.clone()));
        }
        params
    }
}

pub struct MatchService {
    gateway: Arc<UpstreamGatewayClient>,
    active: CacheCascade<ActiveMatch>,
    ids: CacheCascade<Vec<String>>,
    details: CacheCascade<MatchDetail>,
}

impl MatchService {
    pub fn new(gateway: Arc<UpstreamGatewayClient>, tiers: &CacheTiers) -> Self {
        Self {
            gateway,
            active: CacheCascade::new(Namespace::ActiveMatch, tiers),
            ids: CacheCascade::new(Namespace::MatchIds, tiers),
            details: CacheCascade::new(Namespace::MatchHistory, tiers),
        }
    }

    /// The game `puuid` is playing right now, if any.
    pub async fn active_match(&self, region: Region, puuid: &str) -> UpstreamResult<Option<ActiveMatch>> {
        let key = CacheKey::active_match(puuid);
        let endpoint = format!("/lol/spectator/v5/active-games/by-summoner/{puuid}");

        get_or_fetch(&self.active, &key, &DurableLookup::Skip, || {
            self.gateway.get_json(region.platform(), &endpoint, &[])
        })
        .await
    }

    /// Most recent match ids, newest first. An empty listing is `None`.
    pub async fn match_ids(
        &self,
        region: Region,
        puuid: &str,
        start: u32,
        count: u32,
        filter: &MatchIdsFilter,
    ) -> UpstreamResult<Option<Vec<String>>> {
        let key = CacheKey::match_ids(puuid, start, count, filter.queue).with_match_window(
            filter.start_time,
            filter.end_time,
            filter.match_type.as_deref(),
        );
        let endpoint = format!("/lol/match/v5/matches/by-puuid/{puuid}/ids");

        let mut params = vec![("start", start.to_string()), ("count", count.to_string())];
        params.extend(filter.params());

        get_or_fetch(&self.ids, &key, &DurableLookup::Skip, || {
            self.gateway.get_json(region.continent(), &endpoint, &params)
        })
        .await
    }

    pub async fn match_detail(&self, region: Region, match_id: &str) -> UpstreamResult<Option<MatchDetail>> {
        let key = CacheKey::match_history(match_id);
        let endpoint = format!("/lol/match/v5/matches/{match_id}");

        get_or_fetch(&self.details, &key, &DurableLookup::by_id(match_id), || {
            self.gateway.get_json(region.continent(), &endpoint, &[])
        })
        .await
    }

    /// Fetch many records concurrently. Order follows `match_ids`; a failed
    /// or missing record is `None`.
    pub async fn match_details(&self, region: Region, match_ids: &[String]) -> Vec<Option<MatchDetail>> {
        fan_out(match_ids.iter().map(String::as_str), |id| self.match_detail(region, id)).await
    }

    /// Match ids followed by their records, skipping any that could not be loaded.
    pub async fn recent_matches(
        &self,
        region: Region,
        puuid: &str,
        start: u32,
        count: u32,
        filter: &MatchIdsFilter,
    ) -> UpstreamResult<Vec<MatchDetail>> {
        let Some(ids) = self.match_ids(region, puuid, start, count, filter).await? else {
            return Ok(Vec::new());
        };
        Ok(self.match_details(region, &ids).await.into_iter().flatten().collect())
    }
}
