use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use crate::cache::{Freshness, ReadCache};
use crate::contracts::ContractRegistry;
use crate::proposal::{Address, VoterType};
use crate::units::decode_uint;

/// Governance NFT holdings of one account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NftHoldings {
    pub og: bool,
    pub farm: bool,
}

impl NftHoldings {
    pub fn can_create(&self) -> bool {
        self.og
    }

    pub fn can_vote(&self, voter_type: VoterType) -> bool {
        match voter_type {
            VoterType::Farm => self.farm,
            VoterType::Og => self.og,
        }
    }
}

pub const CREATE_REQUIREMENT: &str = "an OG NFT is required to create proposals";

pub fn vote_requirement(voter_type: VoterType) -> &'static str {
    match voter_type {
        VoterType::Farm => "a FARM NFT is required to vote on this proposal",
        VoterType::Og => "an OG NFT is required to vote on this proposal",
    }
}

#[derive(Clone)]
pub struct EligibilityChecker {
    reads: Arc<ReadCache>,
    registry: Arc<ContractRegistry>,
}

impl EligibilityChecker {
    pub fn new(reads: Arc<ReadCache>, registry: Arc<ContractRegistry>) -> Self {
        Self { reads, registry }
    }

    pub async fn holdings(&self, account: &Address) -> Result<NftHoldings> {
        let (og, farm) = tokio::try_join!(
            self.holds(&self.registry.og_nft, account, Freshness::Canonical),
            self.holds(&self.registry.farm_nft, account, Freshness::Canonical),
        )?;
        Ok(NftHoldings { og, farm })
    }

    /// True when `account` holds at least one token of `nft`.
    pub async fn holds(
        &self,
        nft: &Address,
        account: &Address,
        freshness: Freshness,
    ) -> Result<bool> {
        let raw = self
            .reads
            .read(self.registry.nft_balance(nft, account), freshness)
            .await?;
        Ok(decode_uint(&raw, "balanceOf")? > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::ContractGateway;
    use crate::rpc::mock::{MockChain, account, cache_config};

    #[test]
    fn vote_requirement_follows_voter_type() {
        let farm_only = NftHoldings {
            og: false,
            farm: true,
        };
        assert!(farm_only.can_vote(VoterType::Farm));
        assert!(!farm_only.can_vote(VoterType::Og));
        assert!(!farm_only.can_create());

        let og_only = NftHoldings {
            og: true,
            farm: false,
        };
        assert!(og_only.can_vote(VoterType::Og));
        assert!(!og_only.can_vote(VoterType::Farm));
        assert!(og_only.can_create());
    }

    #[tokio::test]
    async fn holdings_read_nft_balances() {
        let chain = Arc::new(MockChain::new());
        let registry = Arc::new(chain.registry());
        chain.set_balance(&registry.og_nft, &account(1), 2);
        let gateway: Arc<dyn ContractGateway> = chain.clone();
        let reads = Arc::new(ReadCache::new(gateway, registry.chain_id, &cache_config()));
        let checker = EligibilityChecker::new(reads, registry);

        assert_eq!(
            checker.holdings(&account(1)).await.unwrap(),
            NftHoldings {
                og: true,
                farm: false,
            }
        );
        assert_eq!(
            checker.holdings(&account(2)).await.unwrap(),
            NftHoldings::default()
        );
    }
}
