//! Entity records served by the domain services.
//!
//! Upstream payloads use camelCase; the same shape is stored in every tier.
//! Fields the services do not interpret are kept in a flattened `extra` map
//! so cached records round-trip without loss.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cache::{CacheKey, CachedEntity};
use crate::upstream::Region;

/// Identity half of an account, from the continental account endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiotIdentity {
    pub puuid: String,
    #[serde(default)]
    pub game_name: Option<String>,
    #[serde(default)]
    pub tag_line: Option<String>,
}

/// Profile half of an account, from the platform summoner endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summoner {
    pub puuid: String,
    pub profile_icon_id: i64,
    pub summoner_level: i64,
}

/// A player identity joined with its regional profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub puuid: String,
    pub game_name: String,
    pub tag_line: String,
    pub region: Region,
    pub profile_icon_id: i64,
    pub summoner_level: i64,
}

impl Account {
    pub fn join(region: Region, identity: RiotIdentity, summoner: Summoner) -> Self {
        Self {
            puuid: identity.puuid,
            game_name: identity.game_name.unwrap_or_default(),
            tag_line: identity.tag_line.unwrap_or_default(),
            region,
            profile_icon_id: summoner.profile_icon_id,
            summoner_level: summoner.summoner_level,
        }
    }
}

impl CachedEntity for Account {
    fn aliases(&self) -> Vec<CacheKey> {
        let mut keys = vec![CacheKey::account_by_puuid(self.region, &self.puuid)];
        if !self.game_name.is_empty() && !self.tag_line.is_empty() {
            keys.push(CacheKey::account_by_riot_id(self.region, &self.game_name, &self.tag_line));
        }
        keys
    }

    fn document_id(&self) -> Option<String> {
        Some(account_document_id(self.region, &self.puuid))
    }
}

pub(crate) fn account_document_id(region: Region, puuid: &str) -> String {
    format!("{region}:{puuid}")
}

/// A game in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveMatch {
    pub game_id: i64,
    #[serde(default)]
    pub game_mode: String,
    #[serde(default)]
    pub participants: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CachedEntity for ActiveMatch {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchMetadata {
    pub match_id: String,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A finished match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchDetail {
    pub metadata: MatchMetadata,
    #[serde(default)]
    pub info: Value,
}

impl MatchDetail {
    pub fn match_id(&self) -> &str {
        &self.metadata.match_id
    }
}

impl CachedEntity for MatchDetail {
    fn document_id(&self) -> Option<String> {
        Some(self.metadata.match_id.clone())
    }
}

/// One ranked queue standing of a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeagueEntry {
    pub queue_type: String,
    pub tier: String,
    pub rank: String,
    pub league_points: i32,
    pub wins: u32,
    pub losses: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A row of the precomputed regional leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub puuid: String,
    pub region: Region,
    #[serde(default)]
    pub league_points: i32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Champion id (as a string) to display name.
pub type ChampionNames = BTreeMap<String, String>;

/// Aggregated totals for one champion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChampionStats {
    pub kills: u64,
    pub deaths: u64,
    pub assists: u64,
    pub wins: u64,
    pub losses: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CachedEntity for ChampionStats {}

/// A match indexed under one of its champions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChampionMatch {
    pub match_id: String,
    pub champion_id: u32,
    #[serde(default)]
    pub lane: Option<String>,
    #[serde(default)]
    pub versus: Option<u32>,
    pub game_creation: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChampionMastery {
    pub champion_id: i64,
    pub champion_level: i32,
    pub champion_points: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Champion id (as a string) to its most played role.
pub type ChampionPositions = BTreeMap<String, String>;

/// Role play rates per champion, as published by the community dataset.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChampionRates {
    #[serde(default)]
    pub data: BTreeMap<String, BTreeMap<String, RoleRate>>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRate {
    #[serde(default)]
    pub play_rate: Option<f64>,
}

/// A professional player in the editorial roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProPlayer {
    pub player: String,
    pub puuid: Vec<String>,
    /// Competitive league, e.g. `LEC`.
    pub region: String,
    pub role: String,
    pub team: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_media: Option<BTreeMap<String, String>>,
}

impl ProPlayer {
    pub(crate) fn document_id(&self) -> String {
        format!("{}:{}", self.team, self.player).to_ascii_lowercase()
    }
}

/// puuid to pro player name.
pub type AccountNames = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStream {
    pub player: String,
    pub url: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_account_join_and_aliases() {
        let identity: RiotIdentity =
            serde_json::from_value(json!({"puuid": "p1", "gameName": "Caps", "tagLine": "G2"})).unwrap();
        let summoner: Summoner = serde_json::from_value(json!({
            "puuid": "p1", "profileIconId": 7, "summonerLevel": 412, "revisionDate": 1
        }))
        .unwrap();

        let account = Account::join(Region::Euw, identity, summoner);
        assert_eq!(account.summoner_level, 412);
        assert_eq!(account.document_id().as_deref(), Some("euw:p1"));

        let aliases: Vec<String> = account.aliases().iter().map(|k| k.to_string()).collect();
        assert_eq!(aliases, vec!["account:puuid:p1:euw", "account:username:Caps#G2:euw"]);
    }

    #[test]
    fn test_nameless_identity_gets_only_puuid_alias() {
        let identity = RiotIdentity {
            puuid: "p1".into(),
            game_name: None,
            tag_line: None,
        };
        let summoner = Summoner {
            puuid: "p1".into(),
            profile_icon_id: 1,
            summoner_level: 1,
        };
        assert_eq!(Account::join(Region::Kr, identity, summoner).aliases().len(), 1);
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let raw = json!({
            "metadata": {"matchId": "EUW1_1", "participants": ["a"], "dataVersion": "2"},
            "info": {"gameDuration": 1800}
        });
        let detail: MatchDetail = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(detail.match_id(), "EUW1_1");
        assert_eq!(serde_json::to_value(&detail).unwrap(), raw);
    }
}
