use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use crate::config::{ChainConfig, ContractsConfig};
use crate::proposal::{Address, VoteChoice};
use crate::units::encode_uint;
use crate::validation::ValidatedProposal;

pub mod methods {
    pub const PROPOSAL_COUNT: &str = "proposalCount";
    pub const PROPOSALS: &str = "proposals";
    pub const HAS_VOTED: &str = "hasVoted";
    pub const HAS_CLAIMED: &str = "hasClaimed";
    pub const CREATE_PROPOSAL: &str = "createProposal";
    pub const VOTE: &str = "vote";
    pub const CLAIM_REWARD: &str = "claimReward";

    pub const BALANCE_OF: &str = "balanceOf";
    pub const ALLOWANCE: &str = "allowance";
    pub const APPROVE: &str = "approve";

    pub const CLAIMED: &str = "claimed";
    pub const REWARD_AMOUNT: &str = "rewardAmount";
    pub const CLAIM: &str = "claim";

    pub const RESOLVE_NAME: &str = "resolveName";
}

/// A single contract method invocation, read or write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractCall {
    pub address: Address,
    pub method: &'static str,
    pub args: Vec<Value>,
}

impl ContractCall {
    fn new(address: &Address, method: &'static str, args: Vec<Value>) -> Self {
        Self {
            address: address.clone(),
            method,
            args,
        }
    }
}

/// Deployed contracts the service talks to.
#[derive(Debug, Clone)]
pub struct ContractRegistry {
    pub chain_id: u64,
    pub token_symbol: String,
    pub governance: Address,
    pub token: Address,
    pub og_nft: Address,
    pub farm_nft: Address,
    pub early_bird_nft: Address,
    pub galxe_vote_nft: Address,
    pub nft_reward: Address,
    pub name_registry: Address,
}

impl ContractRegistry {
    pub fn from_config(chain: &ChainConfig, contracts: &ContractsConfig) -> Result<Self> {
        let parse = |label: &str, raw: &str| {
            Address::parse(raw).with_context(|| format!("Invalid {label} contract address"))
        };
        Ok(Self {
            chain_id: chain.chain_id,
            token_symbol: contracts.token_symbol.trim().to_string(),
            governance: parse("governance", &contracts.governance)?,
            token: parse("token", &contracts.token)?,
            og_nft: parse("OG NFT", &contracts.og_nft)?,
            farm_nft: parse("FARM NFT", &contracts.farm_nft)?,
            early_bird_nft: parse("early bird NFT", &contracts.early_bird_nft)?,
            galxe_vote_nft: parse("Galxe vote NFT", &contracts.galxe_vote_nft)?,
            nft_reward: parse("NFT reward", &contracts.nft_reward)?,
            name_registry: parse("name registry", &contracts.name_registry)?,
        })
    }

    pub fn proposal_count(&self) -> ContractCall {
        ContractCall::new(&self.governance, methods::PROPOSAL_COUNT, Vec::new())
    }

    pub fn proposal(&self, id: u64) -> ContractCall {
        ContractCall::new(&self.governance, methods::PROPOSALS, vec![Value::from(id)])
    }

    pub fn has_voted(&self, id: u64, account: &Address) -> ContractCall {
        ContractCall::new(
            &self.governance,
            methods::HAS_VOTED,
            vec![Value::from(id), address_arg(account)],
        )
    }

    pub fn has_claimed(&self, id: u64, account: &Address) -> ContractCall {
        ContractCall::new(
            &self.governance,
            methods::HAS_CLAIMED,
            vec![Value::from(id), address_arg(account)],
        )
    }

    pub fn create_proposal(&self, proposal: &ValidatedProposal) -> ContractCall {
        ContractCall::new(
            &self.governance,
            methods::CREATE_PROPOSAL,
            vec![
                Value::from(proposal.title.as_str()),
                Value::from(proposal.description.as_str()),
                encode_uint(proposal.reward_amount),
                Value::from(proposal.voter_type.code()),
            ],
        )
    }

    pub fn vote(&self, id: u64, choice: VoteChoice) -> ContractCall {
        ContractCall::new(
            &self.governance,
            methods::VOTE,
            vec![Value::from(id), Value::from(choice.code())],
        )
    }

    pub fn claim_reward(&self, id: u64) -> ContractCall {
        ContractCall::new(&self.governance, methods::CLAIM_REWARD, vec![Value::from(id)])
    }

    pub fn token_balance(&self, owner: &Address) -> ContractCall {
        ContractCall::new(&self.token, methods::BALANCE_OF, vec![address_arg(owner)])
    }

    /// Allowance granted by `owner` to the governance contract.
    pub fn token_allowance(&self, owner: &Address) -> ContractCall {
        ContractCall::new(
            &self.token,
            methods::ALLOWANCE,
            vec![address_arg(owner), address_arg(&self.governance)],
        )
    }

    pub fn approve_governance(&self, amount: u128) -> ContractCall {
        ContractCall::new(
            &self.token,
            methods::APPROVE,
            vec![address_arg(&self.governance), encode_uint(amount)],
        )
    }

    pub fn nft_balance(&self, nft: &Address, owner: &Address) -> ContractCall {
        ContractCall::new(nft, methods::BALANCE_OF, vec![address_arg(owner)])
    }

    pub fn pool_claimed(&self, account: &Address) -> ContractCall {
        ContractCall::new(&self.nft_reward, methods::CLAIMED, vec![address_arg(account)])
    }

    pub fn pool_reward_amount(&self) -> ContractCall {
        ContractCall::new(&self.nft_reward, methods::REWARD_AMOUNT, Vec::new())
    }

    pub fn pool_balance(&self) -> ContractCall {
        self.token_balance(&self.nft_reward)
    }

    pub fn pool_claim(&self) -> ContractCall {
        ContractCall::new(&self.nft_reward, methods::CLAIM, Vec::new())
    }

    /// Registered display name of `account`; empty when none is set.
    pub fn resolve_name(&self, account: &Address) -> ContractCall {
        ContractCall::new(
            &self.name_registry,
            methods::RESOLVE_NAME,
            vec![address_arg(account)],
        )
    }
}

fn address_arg(address: &Address) -> Value {
    Value::from(address.as_str())
}
