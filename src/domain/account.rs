//! Player accounts: identity joined with regional profile.

use std::sync::Arc;

use crate::cache::{CacheCascade, CacheKey, CacheTiers, DocumentQuery, DurableLookup, Namespace};
use crate::domain::models::{account_document_id, Account, RiotIdentity, Summoner};
use crate::domain::service::{fan_out, get_or_fetch};
use crate::upstream::{Region, UpstreamGatewayClient, UpstreamResult};

pub struct AccountService {
    gateway: Arc<UpstreamGatewayClient>,
    cascade: CacheCascade<Account>,
}

impl AccountService {
    pub fn new(gateway: Arc<UpstreamGatewayClient>, tiers: &CacheTiers) -> Self {
        Self {
            gateway,
            cascade: CacheCascade::new(Namespace::Account, tiers),
        }
    }

    pub async fn by_puuid(&self, region: Region, puuid: &str) -> UpstreamResult<Option<Account>> {
        let key = CacheKey::account_by_puuid(region, puuid);
        let lookup = DurableLookup::by_id(account_document_id(region, puuid));

        get_or_fetch(&self.cascade, &key, &lookup, || {
            self.fetch(region, format!("/riot/account/v1/accounts/by-puuid/{puuid}"))
        })
        .await
    }

    pub async fn by_riot_id(&self, region: Region, game_name: &str, tag_line: &str) -> UpstreamResult<Option<Account>> {
        let key = CacheKey::account_by_riot_id(region, game_name, tag_line);
        let lookup = DurableLookup::First(
            DocumentQuery::new()
                .filter("gameName", game_name)
                .filter("tagLine", tag_line)
                .filter("region", region.token()),
        );

        get_or_fetch(&self.cascade, &key, &lookup, || {
            self.fetch(region, format!("/riot/account/v1/accounts/by-riot-id/{game_name}/{tag_line}"))
        })
        .await
    }

    /// Look the Riot ID up in every region at once, in `Region::ALL` order.
    pub async fn find_in_all_regions(&self, game_name: &str, tag_line: &str) -> Vec<(Region, Option<Account>)> {
        let accounts = fan_out(Region::ALL, |region| self.by_riot_id(region, game_name, tag_line)).await;
        Region::ALL.into_iter().zip(accounts).collect()
    }

    /// Identity from the continental shard, then profile from the platform shard.
    async fn fetch(&self, region: Region, identity_endpoint: String) -> UpstreamResult<Option<Account>> {
        let Some(identity) = self
            .gateway
            .get_json::<RiotIdentity>(region.continent(), &identity_endpoint, &[])
            .await?
        else {
            return Ok(None);
        };

        let summoner_endpoint = format!("/lol/summoner/v4/summoners/by-puuid/{}", identity.puuid);
        let Some(summoner) = self
            .gateway
            .get_json::<Summoner>(region.platform(), &summoner_endpoint, &[])
            .await?
        else {
            tracing::debug!(puuid = %identity.puuid, %region, "Identity has no profile in region");
            return Ok(None);
        };

        Ok(Some(Account::join(region, identity, summoner)))
    }
}
