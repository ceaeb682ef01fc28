//! Cache key grammar and the per-namespace policy table.
//!
//! Keys are `{namespace}:{discriminator}[:qualifier...]`. The namespace fixes
//! the TTL and the durable-tier behavior; callers never pick either.

use std::fmt;
use std::time::Duration;

use crate::upstream::Region;

/// How a namespace uses the durable tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurablePolicy {
    /// Not persisted; only the TTL tiers hold it.
    None,
    /// A projection maintained by a separate ingestion flow; read, never written here.
    ReadOnly,
    /// Written through on every origin fetch.
    ReadWrite,
}

/// Fixed policy of one namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespacePolicy {
    pub ttl: Duration,
    pub durable: DurablePolicy,
    /// Durable collection, when `durable` is not `None`.
    pub collection: Option<&'static str>,
}

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;

/// Every entity namespace the cache knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Account,
    ActiveMatch,
    MatchHistory,
    MatchIds,
    LeagueEntries,
    Leaderboard,
    ChampionNames,
    ChampionStats,
    ChampionMatches,
    ChampionMastery,
    ChampionPositions,
    ProPlayers,
    AccountNames,
    LiveStreams,
    Runes,
}

impl Namespace {
    pub const ALL: [Namespace; 15] = [
        Namespace::Account,
        Namespace::ActiveMatch,
        Namespace::MatchHistory,
        Namespace::MatchIds,
        Namespace::LeagueEntries,
        Namespace::Leaderboard,
        Namespace::ChampionNames,
        Namespace::ChampionStats,
        Namespace::ChampionMatches,
        Namespace::ChampionMastery,
        Namespace::ChampionPositions,
        Namespace::ProPlayers,
        Namespace::AccountNames,
        Namespace::LiveStreams,
        Namespace::Runes,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            Namespace::Account => "account",
            Namespace::ActiveMatch => "active_match",
            Namespace::MatchHistory => "match_history",
            Namespace::MatchIds => "match_ids",
            Namespace::LeagueEntries => "league_entries",
            Namespace::Leaderboard => "leaderboard",
            Namespace::ChampionNames => "champion_names",
            Namespace::ChampionStats => "champion_stats",
            Namespace::ChampionMatches => "champion_matches",
            Namespace::ChampionMastery => "champion_mastery",
            Namespace::ChampionPositions => "champion_positions",
            Namespace::ProPlayers => "pro_players",
            Namespace::AccountNames => "account_names",
            Namespace::LiveStreams => "live_streams",
            Namespace::Runes => "runes",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Namespace::ALL.into_iter().find(|ns| ns.prefix() == prefix)
    }

    pub fn policy(&self) -> NamespacePolicy {
        use DurablePolicy as D;

        let (ttl_secs, durable, collection) = match self {
            Namespace::Account => (24 * HOUR, D::ReadWrite, Some("accounts")),
            Namespace::ActiveMatch => (10 * MINUTE, D::None, None),
            Namespace::MatchHistory => (12 * HOUR, D::ReadWrite, Some("match_history")),
            Namespace::MatchIds => (10 * MINUTE, D::None, None),
            Namespace::LeagueEntries => (30 * MINUTE, D::None, None),
            Namespace::Leaderboard => (24 * HOUR, D::ReadOnly, Some("leaderboard")),
            Namespace::ChampionNames => (24 * HOUR, D::ReadOnly, Some("champions")),
            Namespace::ChampionStats => (HOUR, D::ReadOnly, Some("champion_stats")),
            Namespace::ChampionMatches => (30 * MINUTE, D::ReadOnly, Some("champion_matches")),
            Namespace::ChampionMastery => (24 * HOUR, D::None, None),
            Namespace::ChampionPositions => (24 * HOUR, D::None, None),
            Namespace::ProPlayers => (HOUR, D::ReadOnly, Some("pro_players")),
            Namespace::AccountNames => (HOUR, D::ReadOnly, Some("pro_player_index")),
            Namespace::LiveStreams => (15 * MINUTE, D::ReadOnly, Some("live_streams")),
            Namespace::Runes => (24 * HOUR, D::ReadOnly, Some("help")),
        };

        NamespacePolicy {
            ttl: Duration::from_secs(ttl_secs),
            durable,
            collection,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A rendered, namespaced cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: Namespace,
    rendered: String,
}

impl CacheKey {
    pub fn new(namespace: Namespace, discriminator: impl fmt::Display) -> Self {
        Self {
            namespace,
            rendered: format!("{}:{}", namespace.prefix(), discriminator),
        }
    }

    /// Append a `:qualifier` segment.
    pub fn qualified(mut self, qualifier: impl fmt::Display) -> Self {
        self.rendered.push(':');
        self.rendered.push_str(&qualifier.to_string());
        self
    }

    /// Append a segment only when present.
    pub fn qualified_opt(self, qualifier: Option<impl fmt::Display>) -> Self {
        match qualifier {
            Some(q) => self.qualified(q),
            None => self,
        }
    }

    /// Parse a rendered key back; `None` for unknown namespaces or bare prefixes.
    pub fn parse(raw: &str) -> Option<Self> {
        let (prefix, rest) = raw.split_once(':')?;
        if rest.is_empty() {
            return None;
        }
        let namespace = Namespace::from_prefix(prefix)?;
        Some(Self {
            namespace,
            rendered: raw.to_string(),
        })
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    // Key builders for each namespace.

    pub fn account_by_puuid(region: Region, puuid: &str) -> Self {
        CacheKey::new(Namespace::Account, "puuid").qualified(puuid).qualified(region)
    }

    pub fn account_by_riot_id(region: Region, game_name: &str, tag_line: &str) -> Self {
        CacheKey::new(Namespace::Account, "username")
            .qualified(format!("{game_name}#{tag_line}"))
            .qualified(region)
    }

    pub fn active_match(puuid: &str) -> Self {
        CacheKey::new(Namespace::ActiveMatch, puuid)
    }

    pub fn match_history(match_id: &str) -> Self {
        CacheKey::new(Namespace::MatchHistory, match_id)
    }

    pub fn match_ids(puuid: &str, start: u32, count: u32, queue: Option<u32>) -> Self {
        CacheKey::new(Namespace::MatchIds, puuid)
            .qualified(start)
            .qualified(count)
            .qualified_opt(queue)
    }

    /// Time window and match type narrowing a `match_ids` key.
    pub fn with_match_window(self, start_time: Option<i64>, end_time: Option<i64>, match_type: Option<&str>) -> Self {
        self.qualified_opt(start_time.map(|t| format!("from={t}")))
            .qualified_opt(end_time.map(|t| format!("to={t}")))
            .qualified_opt(match_type.map(|t| format!("type={t}")))
    }

    pub fn league_entries(puuid: &str) -> Self {
        CacheKey::new(Namespace::LeagueEntries, puuid)
    }

    pub fn leaderboard(region: Region, limit: u32, page: u32) -> Self {
        CacheKey::new(Namespace::Leaderboard, region).qualified(limit).qualified(page)
    }

    pub fn champion_names() -> Self {
        CacheKey::new(Namespace::ChampionNames, "all")
    }

    pub fn champion_stats(champion_id: u32) -> Self {
        CacheKey::new(Namespace::ChampionStats, champion_id)
    }

    pub fn champion_matches(
        champion_id: u32,
        limit: u32,
        lane: Option<&str>,
        versus: Option<u32>,
        cursor: Option<&str>,
    ) -> Self {
        CacheKey::new(Namespace::ChampionMatches, champion_id)
            .qualified(limit)
            .qualified_opt(lane)
            .qualified_opt(versus.map(|v| format!("vs{v}")))
            .qualified_opt(cursor.map(|c| format!("after={c}")))
    }

    pub fn champion_mastery(puuid: &str) -> Self {
        CacheKey::new(Namespace::ChampionMastery, puuid)
    }

    /// Every champion's main role, fetched as one dataset.
    pub fn champion_positions() -> Self {
        Self::new(Namespace::ChampionPositions, "all")
    }

    pub fn pro_players(region: Option<&str>, team: Option<&str>) -> Self {
        match region {
            Some(region) => CacheKey::new(Namespace::ProPlayers, region.to_ascii_lowercase()).qualified_opt(team),
            None => CacheKey::new(Namespace::ProPlayers, "all"),
        }
    }

    pub fn account_names() -> Self {
        CacheKey::new(Namespace::AccountNames, "data")
    }

    pub fn live_streams(live: bool) -> Self {
        CacheKey::new(Namespace::LiveStreams, if live { "live" } else { "not_live" })
    }

    pub fn runes() -> Self {
        CacheKey::new(Namespace::Runes, "all")
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}
