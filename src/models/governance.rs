use serde::{Deserialize, Serialize};

use crate::dispatcher::{CreateOutcome, PendingActions};
use crate::names::DisplayNames;
use crate::proposal::{Address, Lifecycle, ResolvedProposal, VoterType};
use crate::rpc::TransactionReceipt;
use crate::units::format_token_amount;
use crate::validation::{DESCRIPTION_MAX_LENGTH, ProposalDraft, TITLE_MAX_LENGTH};

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 3_600;
const SECONDS_PER_DAY: i64 = 86_400;
const MIN_VISIBLE_PROGRESS: f64 = 5.0;

/// Inputs shared by every proposal rendered in one response.
#[derive(Clone, Copy)]
pub struct ViewContext<'a> {
    pub now: i64,
    pub token_symbol: &'a str,
    pub viewer: Option<&'a Address>,
    pub pending: &'a PendingActions,
    pub names: &'a DisplayNames,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposalView {
    pub id: u64,
    pub creator: Address,
    pub creator_display: String,
    pub title: String,
    pub description: String,
    pub voter_type: VoterType,
    pub lifecycle: Lifecycle,
    pub start_time: i64,
    pub end_time: i64,
    pub claim_end_time: i64,
    pub time_remaining: String,
    pub progress_percent: u8,
    pub for_votes: u32,
    pub against_votes: u32,
    pub abstain_votes: u32,
    pub voter_count: u32,
    pub reward_amount: String,
    pub reward_display: String,
    pub claimed_amount: String,
    pub remaining_pool: String,
    pub remaining_pool_display: String,
    pub user_reward_amount: String,
    pub user_reward_display: String,
    pub has_voted: Option<bool>,
    pub has_claimed: Option<bool>,
    pub can_vote: bool,
    pub can_claim: bool,
    pub voting_pending: bool,
    pub claiming_pending: bool,
}

impl ProposalView {
    pub fn build(resolved: &ResolvedProposal, ctx: &ViewContext<'_>) -> Self {
        let proposal = &resolved.proposal;
        let symbol = ctx.token_symbol;
        let remaining = proposal.end_time.saturating_sub(ctx.now);
        let (voting_pending, claiming_pending) = match ctx.viewer {
            Some(viewer) => (
                ctx.pending.is_voting(viewer, proposal.id),
                ctx.pending.is_claiming(viewer, proposal.id),
            ),
            None => (false, false),
        };

        Self {
            id: proposal.id,
            creator: proposal.creator.clone(),
            creator_display: ctx.names.display(&proposal.creator),
            title: proposal.title.clone(),
            description: proposal.description.clone(),
            voter_type: proposal.voter_type,
            lifecycle: Lifecycle::at(proposal, ctx.now),
            start_time: proposal.start_time,
            end_time: proposal.end_time,
            claim_end_time: proposal.claim_end_time,
            time_remaining: format_time_remaining(remaining),
            progress_percent: progress_percent(
                remaining,
                proposal.end_time - proposal.start_time,
            ),
            for_votes: proposal.tally.for_votes,
            against_votes: proposal.tally.against_votes,
            abstain_votes: proposal.tally.abstain_votes,
            voter_count: proposal.tally.voter_count,
            reward_amount: proposal.reward_amount.to_string(),
            reward_display: format_token_amount(proposal.reward_amount, symbol),
            claimed_amount: proposal.claimed_amount.to_string(),
            remaining_pool: proposal.remaining_pool().to_string(),
            remaining_pool_display: format_token_amount(proposal.remaining_pool(), symbol),
            user_reward_amount: resolved.user_reward_amount.to_string(),
            user_reward_display: format_token_amount(resolved.user_reward_amount, symbol),
            has_voted: ctx.viewer.map(|_| resolved.viewer.has_voted),
            has_claimed: ctx.viewer.map(|_| resolved.viewer.has_claimed),
            can_vote: ctx.viewer.is_some() && resolved.can_vote(ctx.now),
            can_claim: ctx.viewer.is_some() && resolved.can_claim(ctx.now),
            voting_pending,
            claiming_pending,
        }
    }
}

/// Context for the create-proposal form on the home view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateFormView {
    pub title_max_length: usize,
    pub description_max_length: usize,
    pub token_symbol: String,
    pub voter_types: [VoterType; 2],
    pub eligible: Option<bool>,
    pub requirement: Option<&'static str>,
    pub pending: bool,
}

impl CreateFormView {
    pub fn new(token_symbol: &str, eligible: Option<bool>, pending: bool) -> Self {
        Self {
            title_max_length: TITLE_MAX_LENGTH,
            description_max_length: DESCRIPTION_MAX_LENGTH,
            token_symbol: token_symbol.to_string(),
            voter_types: [VoterType::Farm, VoterType::Og],
            eligible,
            requirement: match eligible {
                Some(false) => Some(crate::eligibility::CREATE_REQUIREMENT),
                _ => None,
            },
            pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HomeView {
    pub account: Option<Address>,
    pub now: i64,
    pub is_loading: bool,
    pub create: CreateFormView,
    pub active: Vec<ProposalView>,
    pub finished: Vec<ProposalView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveView {
    pub account: Option<Address>,
    pub now: i64,
    pub is_loading: bool,
    pub archived: Vec<ProposalView>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProposalRequest {
    pub account: Option<String>,
    #[serde(flatten)]
    pub draft: ProposalDraft,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoteRequest {
    pub account: Option<String>,
    pub choice: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClaimRequest {
    pub account: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResponse {
    pub status: &'static str,
    pub tx_hash: String,
    pub block_number: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_tx_hash: Option<String>,
}

impl From<TransactionReceipt> for ActionResponse {
    fn from(receipt: TransactionReceipt) -> Self {
        Self {
            status: "confirmed",
            tx_hash: receipt.tx_hash,
            block_number: receipt.block_number,
            approval_tx_hash: None,
        }
    }
}

impl From<CreateOutcome> for ActionResponse {
    fn from(outcome: CreateOutcome) -> Self {
        Self {
            approval_tx_hash: outcome.approval.map(|receipt| receipt.tx_hash),
            ..Self::from(outcome.receipt)
        }
    }
}

/// `"Ended"` once the window closed, otherwise `1d 2h 3m`. Seconds are shown
/// only when no larger unit remains.
pub fn format_time_remaining(seconds: i64) -> String {
    if seconds <= 0 {
        return "Ended".to_string();
    }

    let days = seconds / SECONDS_PER_DAY;
    let hours = (seconds % SECONDS_PER_DAY) / SECONDS_PER_HOUR;
    let minutes = (seconds % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE;
    let secs = seconds % SECONDS_PER_MINUTE;

    let mut parts = Vec::with_capacity(3);
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if parts.is_empty() {
        parts.push(format!("{secs}s"));
    }
    parts.join(" ")
}

/// Share of the voting window still remaining, rounded to a whole percent.
pub fn progress_percent(remaining: i64, window: i64) -> u8 {
    if remaining <= 0 || window <= 0 {
        return 0;
    }
    let mut percent = (remaining as f64 / window as f64 * 100.0).clamp(0.0, 100.0);
    if percent < MIN_VISIBLE_PROGRESS {
        percent = MIN_VISIBLE_PROGRESS;
    }
    percent.round() as u8
}
