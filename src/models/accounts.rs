use serde::Serialize;

use crate::eligibility::NftHoldings;
use crate::proposal::Address;
use crate::rewards::PoolClaimStatus;
use crate::units::format_token_amount;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountView {
    pub address: Address,
    pub address_display: String,
    pub token_balance: String,
    pub token_balance_display: String,
    pub allowance: String,
    pub holdings: NftHoldings,
    pub can_create: bool,
    pub creating_pending: bool,
}

impl AccountView {
    pub fn new(
        address: Address,
        token_balance: u128,
        allowance: u128,
        holdings: NftHoldings,
        token_symbol: &str,
        creating_pending: bool,
    ) -> Self {
        Self {
            address_display: address.abbreviated(),
            address,
            token_balance: token_balance.to_string(),
            token_balance_display: format_token_amount(token_balance, token_symbol),
            allowance: allowance.to_string(),
            can_create: holdings.can_create(),
            holdings,
            creating_pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolClaimView {
    pub address: Address,
    pub farm: bool,
    pub early_bird: bool,
    pub galxe: bool,
    pub has_claimed: bool,
    pub can_claim: bool,
    pub blocker: Option<&'static str>,
    pub reward_amount: String,
    pub reward_display: String,
    pub pool_balance: String,
    pub pool_balance_display: String,
    pub claim_pending: bool,
}

impl PoolClaimView {
    pub fn new(
        address: Address,
        status: &PoolClaimStatus,
        token_symbol: &str,
        claim_pending: bool,
    ) -> Self {
        Self {
            address,
            farm: status.farm,
            early_bird: status.early_bird,
            galxe: status.galxe,
            has_claimed: status.has_claimed,
            can_claim: status.can_claim(),
            blocker: status.blocker(),
            reward_amount: status.reward_amount.to_string(),
            reward_display: format_token_amount(status.reward_amount, token_symbol),
            pool_balance: status.pool_balance.to_string(),
            pool_balance_display: format_token_amount(status.pool_balance, token_symbol),
            claim_pending,
        }
    }
}
