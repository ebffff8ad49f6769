use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::aggregator::ProposalAggregator;
use crate::cache::{Freshness, ReadCache};
use crate::contracts::{ContractCall, ContractRegistry};
use crate::eligibility::{CREATE_REQUIREMENT, EligibilityChecker, vote_requirement};
use crate::proposal::{Address, ResolvedProposal, VoteChoice};
use crate::rewards::RewardPool;
use crate::rpc::{ContractGateway, TransactionReceipt};
use crate::units::decode_uint;
use crate::validation::{ProposalDraft, ValidationError};

mod pending;

pub use pending::{PendingActions, PendingGuard, PendingKey};

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("connect a wallet to continue")]
    NotConnected,
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("{0}")]
    NotEligible(String),
    #[error("{0} is already pending")]
    AlreadyPending(PendingKey),
    #[error("proposal {0} not found")]
    UnknownProposal(u64),
    #[error("token approval failed: {0:#}")]
    Approval(anyhow::Error),
    #[error("transaction failed: {0:#}")]
    Transaction(anyhow::Error),
    #[error("chain read failed: {0:#}")]
    Read(anyhow::Error),
}

/// Receipts of a proposal creation. `approval` is present when the allowance
/// had to be raised first.
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub approval: Option<TransactionReceipt>,
    pub receipt: TransactionReceipt,
}

#[derive(Clone)]
pub struct ActionDispatcher {
    gateway: Arc<dyn ContractGateway>,
    reads: Arc<ReadCache>,
    registry: Arc<ContractRegistry>,
    pending: PendingActions,
    eligibility: EligibilityChecker,
    aggregator: ProposalAggregator,
    rewards: RewardPool,
}

impl ActionDispatcher {
    pub fn new(
        gateway: Arc<dyn ContractGateway>,
        reads: Arc<ReadCache>,
        registry: Arc<ContractRegistry>,
        eligibility: EligibilityChecker,
        aggregator: ProposalAggregator,
        rewards: RewardPool,
    ) -> Self {
        Self {
            gateway,
            reads,
            registry,
            pending: PendingActions::new(),
            eligibility,
            aggregator,
            rewards,
        }
    }

    pub fn pending(&self) -> &PendingActions {
        &self.pending
    }

    pub async fn create_proposal(
        &self,
        account: Option<&Address>,
        draft: &ProposalDraft,
    ) -> Result<CreateOutcome, ActionError> {
        let account = account.ok_or(ActionError::NotConnected)?;
        let proposal = draft.validate()?;
        let _pending = self.begin(PendingKey::Create(account.clone()))?;

        let holdings = self
            .eligibility
            .holdings(account)
            .await
            .map_err(ActionError::Read)?;
        if !holdings.can_create() {
            return Err(ActionError::NotEligible(CREATE_REQUIREMENT.to_string()));
        }

        let approval = self
            .ensure_allowance(account, proposal.reward_amount)
            .await?;

        let outcome = self
            .submit(account, &self.registry.create_proposal(&proposal))
            .await;
        self.invalidate_governance();
        let receipt = outcome.map_err(ActionError::Transaction)?;

        info!(
            "Proposal \"{}\" created by {account} in {}",
            proposal.title, receipt.tx_hash
        );
        Ok(CreateOutcome { approval, receipt })
    }

    /// Submit a vote. Refused before reaching the chain when voting has ended,
    /// the account already voted or it lacks the proposal's NFT class.
    pub async fn vote(
        &self,
        account: Option<&Address>,
        id: u64,
        choice: VoteChoice,
        now: i64,
    ) -> Result<TransactionReceipt, ActionError> {
        let account = account.ok_or(ActionError::NotConnected)?;
        let _pending = self.begin(PendingKey::Vote(account.clone(), id))?;

        let resolved = self.resolve(id, account).await?;
        if let Some(blocker) = resolved.vote_blocker(now) {
            return Err(ActionError::NotEligible(blocker.to_string()));
        }
        let voter_type = resolved.proposal.voter_type;
        let holdings = self
            .eligibility
            .holdings(account)
            .await
            .map_err(ActionError::Read)?;
        if !holdings.can_vote(voter_type) {
            return Err(ActionError::NotEligible(
                vote_requirement(voter_type).to_string(),
            ));
        }

        let outcome = self.submit(account, &self.registry.vote(id, choice)).await;
        self.invalidate_governance();
        let receipt = outcome.map_err(ActionError::Transaction)?;

        info!("{account} voted {choice:?} on proposal {id}");
        Ok(receipt)
    }

    pub async fn claim_reward(
        &self,
        account: Option<&Address>,
        id: u64,
        now: i64,
    ) -> Result<TransactionReceipt, ActionError> {
        let account = account.ok_or(ActionError::NotConnected)?;
        let _pending = self.begin(PendingKey::Claim(account.clone(), id))?;

        let resolved = self.resolve(id, account).await?;
        if let Some(blocker) = resolved.claim_blocker(now) {
            return Err(ActionError::NotEligible(blocker.to_string()));
        }

        let outcome = self.submit(account, &self.registry.claim_reward(id)).await;
        self.invalidate_governance();
        let receipt = outcome.map_err(ActionError::Transaction)?;

        info!("{account} claimed reward of proposal {id}");
        Ok(receipt)
    }

    pub async fn claim_pool_reward(
        &self,
        account: Option<&Address>,
    ) -> Result<TransactionReceipt, ActionError> {
        let account = account.ok_or(ActionError::NotConnected)?;
        let _pending = self.begin(PendingKey::PoolClaim(account.clone()))?;

        let status = self
            .rewards
            .status(account)
            .await
            .map_err(ActionError::Read)?;
        if let Some(blocker) = status.blocker() {
            return Err(ActionError::NotEligible(blocker.to_string()));
        }

        let receipt = self
            .submit(account, &self.registry.pool_claim())
            .await
            .map_err(ActionError::Transaction)?;
        self.reads.invalidate_contract(&self.registry.nft_reward);
        self.reads.invalidate_contract(&self.registry.token);

        info!("{account} claimed the NFT reward pool");
        Ok(receipt)
    }

    /// Approve the governance contract for `amount` unless the cached
    /// allowance already covers it. An unreadable allowance counts as zero.
    async fn ensure_allowance(
        &self,
        account: &Address,
        amount: u128,
    ) -> Result<Option<TransactionReceipt>, ActionError> {
        let allowance = match self.allowance(account).await {
            Ok(allowance) => allowance,
            Err(err) => {
                warn!("Allowance of {account} unknown, approving: {err:#}");
                0
            }
        };
        if allowance >= amount {
            debug!("Allowance of {account} covers {amount}");
            return Ok(None);
        }

        let outcome = self
            .submit(account, &self.registry.approve_governance(amount))
            .await;
        self.reads.invalidate_contract(&self.registry.token);
        outcome.map(Some).map_err(ActionError::Approval)
    }

    async fn resolve(&self, id: u64, account: &Address) -> Result<ResolvedProposal, ActionError> {
        self.aggregator
            .find(id, Some(account))
            .await
            .map_err(ActionError::Read)?
            .ok_or(ActionError::UnknownProposal(id))
    }

    async fn allowance(&self, account: &Address) -> Result<u128> {
        let raw = self
            .reads
            .read(self.registry.token_allowance(account), Freshness::Canonical)
            .await?;
        decode_uint(&raw, "allowance")
    }

    async fn submit(&self, account: &Address, call: &ContractCall) -> Result<TransactionReceipt> {
        debug!("Submitting {}.{} from {account}", call.address, call.method);
        let outcome = self
            .gateway
            .send_and_confirm(self.registry.chain_id, account, call)
            .await;
        if let Err(err) = &outcome {
            warn!("{} from {account} failed: {err:#}", call.method);
        }
        outcome
    }

    fn begin(&self, key: PendingKey) -> Result<PendingGuard, ActionError> {
        self.pending
            .begin(key.clone())
            .ok_or(ActionError::AlreadyPending(key))
    }

    fn invalidate_governance(&self) {
        self.reads.invalidate_contract(&self.registry.governance);
        self.reads.invalidate_contract(&self.registry.token);
    }
}
