use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow, bail, ensure};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::units::decode_uint;

pub const ADDRESS_BYTES: usize = 20;

/// Number of elements in the `proposals(id)` return tuple.
pub const PROPOSAL_FIELD_COUNT: usize = 10;

const TALLY_LANE_MASK: u128 = 0xFFFF_FFFF;

/// A 20-byte account or contract address, normalized to lowercase `0x` hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            bail!("address cannot be empty");
        }
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| anyhow!("address must be 0x-prefixed"))?;
        let bytes =
            hex::decode(digits).map_err(|err| anyhow!("Failed to decode address as hex: {err}"))?;
        if bytes.len() != ADDRESS_BYTES {
            bail!(
                "address must be {ADDRESS_BYTES} bytes, got {}",
                bytes.len()
            );
        }
        Ok(Self(format!("0x{}", hex::encode(bytes))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `0x1234...abcd`, the form used wherever a creator is displayed.
    pub fn abbreviated(&self) -> String {
        let text = self.as_str();
        format!("{}...{}", &text[..6], &text[text.len() - 4..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

impl TryFrom<String> for Address {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

/// NFT class required to vote on a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoterType {
    #[serde(rename = "FARM", alias = "farm")]
    Farm,
    #[serde(rename = "OG", alias = "og")]
    Og,
}

impl VoterType {
    pub fn from_code(code: u128) -> Result<Self> {
        match code {
            0 => Ok(Self::Farm),
            1 => Ok(Self::Og),
            other => Err(anyhow!("Unknown voter type code {other}")),
        }
    }

    pub const fn code(self) -> u8 {
        match self {
            Self::Farm => 0,
            Self::Og => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    For,
    Against,
    Abstain,
}

impl VoteChoice {
    pub const fn code(self) -> u8 {
        match self {
            Self::For => 0,
            Self::Against => 1,
            Self::Abstain => 2,
        }
    }

    pub fn from_label(label: &str) -> Result<Self> {
        let normalized = label.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "for" | "yes" | "approve" | "0" => Ok(Self::For),
            "against" | "no" | "reject" | "1" => Ok(Self::Against),
            "abstain" | "2" => Ok(Self::Abstain),
            other => Err(anyhow!("Unsupported vote choice {other}")),
        }
    }
}

/// Vote counts as packed by the governance contract into four 32-bit lanes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VoteTally {
    pub voter_count: u32,
    pub for_votes: u32,
    pub against_votes: u32,
    pub abstain_votes: u32,
}

impl VoteTally {
    pub fn unpack(packed: u128) -> Self {
        Self {
            voter_count: (packed >> 96) as u32,
            for_votes: ((packed >> 64) & TALLY_LANE_MASK) as u32,
            against_votes: ((packed >> 32) & TALLY_LANE_MASK) as u32,
            abstain_votes: (packed & TALLY_LANE_MASK) as u32,
        }
    }
}

/// Canonical proposal state as stored by the governance contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub id: u64,
    pub creator: Address,
    pub title: String,
    pub description: String,
    pub start_time: i64,
    pub end_time: i64,
    pub claim_end_time: i64,
    pub reward_amount: u128,
    pub claimed_amount: u128,
    pub tally: VoteTally,
    pub voter_type: VoterType,
}

impl Proposal {
    /// Decode the `proposals(id)` tuple, rejecting records that break the
    /// window or pool invariants.
    pub fn decode(id: u64, raw: &Value) -> Result<Self> {
        let fields = raw
            .as_array()
            .ok_or_else(|| anyhow!("proposal {id} is not a tuple"))?;
        ensure!(
            fields.len() == PROPOSAL_FIELD_COUNT,
            "proposal {id} has {} fields, expected {PROPOSAL_FIELD_COUNT}",
            fields.len()
        );

        let reward_amount = decode_uint(&fields[0], "rewardAmount")?;
        let claimed_amount = decode_uint(&fields[1], "claimedAmount")?;
        let start_time = decode_timestamp(&fields[2], "startTime")?;
        let end_time = decode_timestamp(&fields[3], "endTime")?;
        let claim_end_time = decode_timestamp(&fields[4], "claimEndTime")?;
        let tally = VoteTally::unpack(decode_uint(&fields[5], "packedVotes")?);
        let voter_type = VoterType::from_code(decode_uint(&fields[6], "voterType")?)?;
        let creator = fields[7]
            .as_str()
            .ok_or_else(|| anyhow!("proposal {id} creator is not a string"))
            .and_then(Address::parse)?;
        let title = decode_text(&fields[8], "title")?;
        let description = decode_text(&fields[9], "description")?;

        ensure!(
            start_time < end_time,
            "proposal {id} voting window is empty ({start_time} >= {end_time})"
        );
        ensure!(
            end_time <= claim_end_time,
            "proposal {id} claim window closes before voting ends"
        );
        ensure!(
            claimed_amount <= reward_amount,
            "proposal {id} claimed more than its reward pool"
        );

        Ok(Self {
            id,
            creator,
            title,
            description,
            start_time,
            end_time,
            claim_end_time,
            reward_amount,
            claimed_amount,
            tally,
            voter_type,
        })
    }

    pub fn remaining_pool(&self) -> u128 {
        self.reward_amount.saturating_sub(self.claimed_amount)
    }
}

/// Per-viewer flags joined onto a canonical proposal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewerStatus {
    pub has_voted: bool,
    pub has_claimed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProposal {
    pub proposal: Proposal,
    pub viewer: ViewerStatus,
    pub user_reward_amount: u128,
}

impl ResolvedProposal {
    pub fn new(proposal: Proposal, viewer: ViewerStatus) -> Self {
        let user_reward_amount =
            user_reward_amount(proposal.reward_amount, proposal.tally.voter_count);
        Self {
            proposal,
            viewer,
            user_reward_amount,
        }
    }

    pub fn id(&self) -> u64 {
        self.proposal.id
    }

    pub fn can_vote(&self, now: i64) -> bool {
        self.vote_blocker(now).is_none()
    }

    pub fn can_claim(&self, now: i64) -> bool {
        self.claim_blocker(now).is_none()
    }

    /// First reason the viewer cannot vote at `now`, if any. NFT holdings are
    /// checked separately.
    pub fn vote_blocker(&self, now: i64) -> Option<&'static str> {
        if Lifecycle::at(&self.proposal, now) != Lifecycle::Active {
            Some("voting on this proposal has ended")
        } else if self.viewer.has_voted {
            Some("already voted on this proposal")
        } else {
            None
        }
    }

    pub fn claim_blocker(&self, now: i64) -> Option<&'static str> {
        match Lifecycle::at(&self.proposal, now) {
            Lifecycle::Active => return Some("voting on this proposal is still open"),
            Lifecycle::Archived => return Some("the claim window of this proposal has closed"),
            Lifecycle::Finished => {}
        }
        if self.proposal.reward_amount == 0 {
            Some("this proposal carries no reward")
        } else if !self.viewer.has_voted {
            Some("only voters can claim this reward")
        } else if self.viewer.has_claimed {
            Some("reward already claimed")
        } else {
            None
        }
    }
}

/// Equal share of the reward pool per voter.
pub fn user_reward_amount(reward_amount: u128, voter_count: u32) -> u128 {
    if voter_count == 0 {
        0
    } else {
        reward_amount / u128::from(voter_count)
    }
}

/// Time-derived lifecycle phase. Never stored; recomputed per snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Active,
    Finished,
    Archived,
}

impl Lifecycle {
    pub fn at(proposal: &Proposal, now: i64) -> Self {
        if now < proposal.end_time {
            Self::Active
        } else if now <= proposal.claim_end_time {
            Self::Finished
        } else {
            Self::Archived
        }
    }
}

fn decode_timestamp(value: &Value, label: &str) -> Result<i64> {
    let raw = decode_uint(value, label)?;
    i64::try_from(raw).map_err(|_| anyhow!("{label} {raw} exceeds i64 bounds"))
}

fn decode_text(value: &Value, label: &str) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("{label} is not a string"))
}
