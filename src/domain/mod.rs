//! Domain services, one per entity family.
//!
//! # Data Flow
//! ```text
//! caller
//!     → XService::operation(args)
//!         → service.rs get_or_fetch
//!             → CacheCascade<E>::read          (local → distributed → durable)
//!             → UpstreamGatewayClient::get     (on total miss)
//!             → CacheCascade<E>::write         (durable → distributed → local)
//! ```
//!
//! # Design Decisions
//! - Services receive the gateway and the cache tiers at construction
//! - Static community datasets go through `ResourceClient`, outside the
//!   upstream rate budget
//! - Read-only projections (leaderboard, champion data, roster, runes) never
//!   reach the upstream; only the cascade
//! - Fan-out operations isolate failures per item

pub mod account;
pub mod champion;
pub mod league;
pub mod matches;
pub mod models;
pub mod roster;
pub mod runes;
pub mod service;

use std::sync::Arc;

use crate::cache::CacheTiers;
use crate::upstream::{ResourceClient, UpstreamGatewayClient};

pub use account::AccountService;
pub use champion::{ChampionMatchFilter, ChampionService};
pub use league::LeagueService;
pub use matches::{MatchIdsFilter, MatchService};
pub use roster::RosterService;
pub use runes::RuneService;
pub use service::{fan_out, get_or_fetch};

/// Every domain service, wired to one gateway and one set of cache tiers.
#[derive(Clone)]
pub struct DomainServices {
    pub accounts: Arc<AccountService>,
    pub matches: Arc<MatchService>,
    pub league: Arc<LeagueService>,
    pub champions: Arc<ChampionService>,
    pub roster: Arc<RosterService>,
    pub runes: Arc<RuneService>,
}

impl DomainServices {
    pub fn new(gateway: Arc<UpstreamGatewayClient>, resources: Arc<ResourceClient>, tiers: &CacheTiers) -> Self {
        Self {
            accounts: Arc::new(AccountService::new(gateway.clone(), tiers)),
            matches: Arc::new(MatchService::new(gateway.clone(), tiers)),
            league: Arc::new(LeagueService::new(gateway.clone(), tiers)),
            champions: Arc::new(ChampionService::new(gateway, resources, tiers)),
            roster: Arc::new(RosterService::new(tiers)),
            runes: Arc::new(RuneService::new(tiers)),
        }
    }

    /// Load the reference catalogs into the fast tiers.
    pub async fn warm_catalogs(&self) {
        let names = self.champions.names().await;
        let runes = self.runes.runes().await;
        tracing::info!(
            champions = names.len(),
            runes_loaded = runes.is_some(),
            "Reference catalogs warmed"
        );
    }
}
