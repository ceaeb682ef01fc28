//! Regional routing.
//!
//! Two vocabularies meet here: logical region tokens (`euw`, `na`, ...) used
//! by callers, and the shard ids (`euw1`, `americas`, ...) that name upstream
//! hosts. Platform shards serve per-region data; continental shards serve
//! cross-region data such as identities and match records.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::upstream::error::{UpstreamError, UpstreamResult};

/// Platform shards, one per region.
pub const PLATFORM_SHARDS: [&str; 17] = [
    "br1", "eun1", "euw1", "jp1", "kr", "la1", "la2", "me1", "na1", "oc1", "ph2", "ru", "sg2",
    "th2", "tr1", "tw2", "vn2",
];

/// Continental routing shards.
pub const CONTINENTAL_SHARDS: [&str; 4] = ["americas", "asia", "europe", "sea"];

/// A logical region token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Euw,
    Eune,
    Na,
    Kr,
    Br,
    Jp,
    Lan,
    Las,
    Oce,
    Ph,
    Ru,
    Sg,
    Th,
    Tr,
    Tw,
    Vn,
    Me,
}

impl Region {
    pub const ALL: [Region; 17] = [
        Region::Euw,
        Region::Eune,
        Region::Na,
        Region::Kr,
        Region::Br,
        Region::Jp,
        Region::Lan,
        Region::Las,
        Region::Oce,
        Region::Ph,
        Region::Ru,
        Region::Sg,
        Region::Th,
        Region::Tr,
        Region::Tw,
        Region::Vn,
        Region::Me,
    ];

    pub fn token(&self) -> &'static str {
        match self {
            Region::Euw => "euw",
            Region::Eune => "eune",
            Region::Na => "na",
            Region::Kr => "kr",
            Region::Br => "br",
            Region::Jp => "jp",
            Region::Lan => "lan",
            Region::Las => "las",
            Region::Oce => "oce",
            Region::Ph => "ph",
            Region::Ru => "ru",
            Region::Sg => "sg",
            Region::Th => "th",
            Region::Tr => "tr",
            Region::Tw => "tw",
            Region::Vn => "vn",
            Region::Me => "me",
        }
    }

    /// Platform shard serving this region.
    pub fn platform(&self) -> &'static str {
        match self {
            Region::Euw => "euw1",
            Region::Eune => "eun1",
            Region::Na => "na1",
            Region::Kr => "kr",
            Region::Br => "br1",
            Region::Jp => "jp1",
            Region::Lan => "la1",
            Region::Las => "la2",
            Region::Oce => "oc1",
            Region::Ph => "ph2",
            Region::Ru => "ru",
            Region::Sg => "sg2",
            Region::Th => "th2",
            Region::Tr => "tr1",
            Region::Tw => "tw2",
            Region::Vn => "vn2",
            Region::Me => "me1",
        }
    }

    /// Continental shard serving this region.
    pub fn continent(&self) -> &'static str {
        match self {
            Region::Euw | Region::Eune | Region::Ru | Region::Tr | Region::Me => "europe",
            Region::Na | Region::Br | Region::Lan | Region::Las => "americas",
            Region::Kr
            | Region::Jp
            | Region::Oce
            | Region::Ph
            | Region::Sg
            | Region::Th
            | Region::Tw
            | Region::Vn => "asia",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Region {
    type Err = UpstreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_ascii_lowercase();
        Region::ALL
            .into_iter()
            .find(|region| region.token() == lowered)
            .ok_or_else(|| UpstreamError::UnknownRegion(s.to_string()))
    }
}

/// Static map from shard id to base URL.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    bases: HashMap<&'static str, String>,
}

impl RoutingTable {
    /// Production hosts: `https://{shard}.api.riotgames.com`.
    pub fn riot() -> Self {
        let bases = all_shards()
            .map(|shard| (shard, format!("https://{shard}.api.riotgames.com")))
            .collect();
        Self { bases }
    }

    /// Route every shard to one base URL (local proxies, test doubles).
    pub fn uniform(base_url: &str) -> UpstreamResult<Self> {
        url::Url::parse(base_url)
            .map_err(|e| UpstreamError::Configuration(format!("invalid base URL '{base_url}': {e}")))?;
        let base = base_url.trim_end_matches('/').to_string();
        let bases = all_shards().map(|shard| (shard, base.clone())).collect();
        Ok(Self { bases })
    }

    /// Resolve a shard id, or a region token standing for its platform shard.
    pub fn resolve(&self, region: &str) -> UpstreamResult<&str> {
        let shard = match self.bases.get_key_value(region) {
            Some((shard, _)) => *shard,
            None => region
                .parse::<Region>()
                .map(|r| r.platform())
                .map_err(|_| UpstreamError::UnknownRegion(region.to_string()))?,
        };
        self.bases
            .get(shard)
            .map(String::as_str)
            .ok_or_else(|| UpstreamError::UnknownRegion(region.to_string()))
    }

    pub fn shard_count(&self) -> usize {
        self.bases.len()
    }
}

fn all_shards() -> impl Iterator<Item = &'static str> {
    PLATFORM_SHARDS.into_iter().chain(CONTINENTAL_SHARDS)
}
