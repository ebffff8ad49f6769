use std::sync::Arc;

use anyhow::Result;

use crate::cache::{Freshness, ReadCache};
use crate::contracts::ContractRegistry;
use crate::eligibility::EligibilityChecker;
use crate::proposal::Address;
use crate::units::{decode_bool, decode_uint};

/// Multi-NFT reward pool state for one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolClaimStatus {
    pub farm: bool,
    pub early_bird: bool,
    pub galxe: bool,
    pub has_claimed: bool,
    pub reward_amount: u128,
    pub pool_balance: u128,
}

impl PoolClaimStatus {
    pub fn can_claim(&self) -> bool {
        self.farm && self.early_bird && self.galxe && !self.has_claimed
    }

    /// First unmet condition, if any.
    pub fn blocker(&self) -> Option<&'static str> {
        if self.has_claimed {
            Some("reward pool already claimed")
        } else if !self.farm {
            Some("a FARM NFT is required to claim the reward pool")
        } else if !self.early_bird {
            Some("an Early Bird NFT is required to claim the reward pool")
        } else if !self.galxe {
            Some("a Galxe Vote NFT is required to claim the reward pool")
        } else {
            None
        }
    }
}

#[derive(Clone)]
pub struct RewardPool {
    reads: Arc<ReadCache>,
    registry: Arc<ContractRegistry>,
    eligibility: EligibilityChecker,
}

impl RewardPool {
    pub fn new(
        reads: Arc<ReadCache>,
        registry: Arc<ContractRegistry>,
        eligibility: EligibilityChecker,
    ) -> Self {
        Self {
            reads,
            registry,
            eligibility,
        }
    }

    pub async fn status(&self, account: &Address) -> Result<PoolClaimStatus> {
        let registry = &self.registry;
        let (farm, early_bird, galxe, claimed, reward, balance) = tokio::try_join!(
            self.eligibility
                .holds(&registry.farm_nft, account, Freshness::Holdings),
            self.eligibility
                .holds(&registry.early_bird_nft, account, Freshness::Holdings),
            self.eligibility
                .holds(&registry.galxe_vote_nft, account, Freshness::Holdings),
            self.reads
                .read(registry.pool_claimed(account), Freshness::Canonical),
            self.reads
                .read(registry.pool_reward_amount(), Freshness::Static),
            self.reads.read(registry.pool_balance(), Freshness::Holdings),
        )?;

        Ok(PoolClaimStatus {
            farm,
            early_bird,
            galxe,
            has_claimed: decode_bool(&claimed, "claimed")?,
            reward_amount: decode_uint(&reward, "rewardAmount")?,
            pool_balance: decode_uint(&balance, "balanceOf")?,
        })
    }
}
