//! In-memory chain used by unit tests in place of the JSON-RPC gateway.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Result, anyhow, bail, ensure};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::Semaphore;

use crate::config::CacheConfig;
use crate::contracts::{ContractCall, ContractRegistry, methods};
use crate::proposal::{Address, VoteTally, VoterType};
use crate::units::decode_uint;

use super::{ContractGateway, TransactionReceipt};

pub const CHAIN_ID: u64 = 31_337;

pub fn address(byte: u8) -> Address {
    Address::parse(&format!("0x{}", hex::encode([byte; 20]))).expect("valid test address")
}

/// Test accounts live in a byte range disjoint from the contract addresses.
pub fn account(n: u8) -> Address {
    address(0xa0 + n)
}

pub fn registry() -> ContractRegistry {
    ContractRegistry {
        chain_id: CHAIN_ID,
        token_symbol: "HASH".to_string(),
        governance: address(0x01),
        token: address(0x02),
        og_nft: address(0x03),
        farm_nft: address(0x04),
        early_bird_nft: address(0x05),
        galxe_vote_nft: address(0x06),
        nft_reward: address(0x07),
        name_registry: address(0x08),
    }
}

pub fn cache_config() -> CacheConfig {
    CacheConfig {
        max_capacity: 1_000,
        proposal_detail_ttl_seconds: 30,
        canonical_ttl_seconds: 60,
        holdings_ttl_seconds: 300,
        static_ttl_seconds: 3_600,
    }
}

#[derive(Debug, Clone)]
pub struct MockProposal {
    pub reward_amount: u128,
    pub claimed_amount: u128,
    pub start_time: i64,
    pub end_time: i64,
    pub claim_end_time: i64,
    pub tally: VoteTally,
    pub voter_type: VoterType,
    pub creator: Address,
    pub title: String,
    pub description: String,
}

impl MockProposal {
    pub fn window(start_time: i64, end_time: i64, claim_end_time: i64) -> Self {
        Self {
            reward_amount: 0,
            claimed_amount: 0,
            start_time,
            end_time,
            claim_end_time,
            tally: VoteTally::default(),
            voter_type: VoterType::Farm,
            creator: account(0),
            title: "Proposal".to_string(),
            description: "Description".to_string(),
        }
    }

    pub fn with_reward(mut self, reward_amount: u128, voter_count: u32) -> Self {
        self.reward_amount = reward_amount;
        self.tally.voter_count = voter_count;
        self
    }

    pub fn with_voter_type(mut self, voter_type: VoterType) -> Self {
        self.voter_type = voter_type;
        self
    }

    fn encode(&self) -> Value {
        let tally = &self.tally;
        let packed = (u128::from(tally.voter_count) << 96)
            | (u128::from(tally.for_votes) << 64)
            | (u128::from(tally.against_votes) << 32)
            | u128::from(tally.abstain_votes);
        json!([
            self.reward_amount.to_string(),
            self.claimed_amount.to_string(),
            self.start_time.to_string(),
            self.end_time.to_string(),
            self.claim_end_time.to_string(),
            packed.to_string(),
            self.voter_type.code(),
            self.creator.as_str(),
            self.title,
            self.description,
        ])
    }
}

#[derive(Default)]
struct ChainState {
    proposals: BTreeMap<u64, MockProposal>,
    broken: HashSet<u64>,
    votes: HashSet<(u64, Address)>,
    claims: HashSet<(u64, Address)>,
    balances: HashMap<(Address, Address), u128>,
    allowances: HashMap<Address, u128>,
    pool_claims: HashSet<Address>,
    pool_reward: u128,
    names: HashMap<Address, String>,
    held_reads: HashMap<&'static str, Arc<Semaphore>>,
    failing_reads: HashSet<&'static str>,
    failing_writes: HashSet<&'static str>,
    writes: Vec<&'static str>,
    reads: HashMap<&'static str, usize>,
}

pub struct MockChain {
    registry: ContractRegistry,
    state: Mutex<ChainState>,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            registry: registry(),
            state: Mutex::new(ChainState::default()),
        }
    }

    pub fn registry(&self) -> ContractRegistry {
        self.registry.clone()
    }

    pub fn insert_proposal(&self, proposal: MockProposal) -> u64 {
        let mut state = self.state.lock();
        let id = state.proposals.keys().next_back().copied().unwrap_or(0) + 1;
        state.proposals.insert(id, proposal);
        id
    }

    /// Make reads of proposal `id` revert.
    pub fn break_proposal(&self, id: u64) {
        self.state.lock().broken.insert(id);
    }

    pub fn repair_proposal(&self, id: u64) {
        self.state.lock().broken.remove(&id);
    }

    pub fn set_balance(&self, contract: &Address, owner: &Address, amount: u128) {
        self.state
            .lock()
            .balances
            .insert((contract.clone(), owner.clone()), amount);
    }

    pub fn set_allowance(&self, owner: &Address, amount: u128) {
        self.state.lock().allowances.insert(owner.clone(), amount);
    }

    pub fn set_pool_reward(&self, amount: u128) {
        self.state.lock().pool_reward = amount;
    }

    pub fn record_vote(&self, id: u64, voter: &Address) {
        self.state.lock().votes.insert((id, voter.clone()));
    }

    pub fn set_name(&self, owner: &Address, name: &str) {
        self.state
            .lock()
            .names
            .insert(owner.clone(), name.to_string());
    }

    /// Park every read of `method` until `release_reads`. Parked reads are
    /// counted as soon as they arrive.
    pub fn hold_reads(&self, method: &'static str) {
        self.state
            .lock()
            .held_reads
            .insert(method, Arc::new(Semaphore::new(0)));
    }

    pub fn release_reads(&self, method: &'static str) {
        if let Some(gate) = self.state.lock().held_reads.remove(method) {
            gate.close();
        }
    }

    pub fn fail_reads(&self, method: &'static str) {
        self.state.lock().failing_reads.insert(method);
    }

    pub fn fail_writes(&self, method: &'static str) {
        self.state.lock().failing_writes.insert(method);
    }

    /// Methods of every submitted write, in submission order.
    pub fn writes(&self) -> Vec<&'static str> {
        self.state.lock().writes.clone()
    }

    pub fn read_count(&self, method: &str) -> usize {
        self.state.lock().reads.get(method).copied().unwrap_or(0)
    }

    pub fn proposal(&self, id: u64) -> Option<MockProposal> {
        self.state.lock().proposals.get(&id).cloned()
    }
}

#[async_trait]
impl ContractGateway for MockChain {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.registry.chain_id)
    }

    async fn read_contract(&self, _chain_id: u64, call: &ContractCall) -> Result<Value> {
        let gate = {
            let mut state = self.state.lock();
            *state.reads.entry(call.method).or_default() += 1;
            state.held_reads.get(call.method).cloned()
        };
        if let Some(gate) = gate {
            // Closed on release; the error only signals that.
            let _ = gate.acquire().await;
        }

        let state = self.state.lock();
        if state.failing_reads.contains(call.method) {
            bail!("execution reverted: {}", call.method);
        }
        match call.method {
            methods::PROPOSAL_COUNT => {
                let count = state.proposals.keys().next_back().copied().unwrap_or(0);
                Ok(json!(count.to_string()))
            }
            methods::PROPOSALS => {
                let id = arg_u64(call, 0)?;
                if state.broken.contains(&id) {
                    bail!("execution reverted: proposal {id}");
                }
                state
                    .proposals
                    .get(&id)
                    .map(MockProposal::encode)
                    .ok_or_else(|| anyhow!("execution reverted: unknown proposal {id}"))
            }
            methods::HAS_VOTED => {
                let key = (arg_u64(call, 0)?, arg_address(call, 1)?);
                Ok(Value::Bool(state.votes.contains(&key)))
            }
            methods::HAS_CLAIMED => {
                let key = (arg_u64(call, 0)?, arg_address(call, 1)?);
                Ok(Value::Bool(state.claims.contains(&key)))
            }
            methods::BALANCE_OF => {
                let key = (call.address.clone(), arg_address(call, 0)?);
                let balance = state.balances.get(&key).copied().unwrap_or(0);
                Ok(json!(balance.to_string()))
            }
            methods::ALLOWANCE => {
                let owner = arg_address(call, 0)?;
                let allowance = state.allowances.get(&owner).copied().unwrap_or(0);
                Ok(json!(allowance.to_string()))
            }
            methods::CLAIMED => {
                let owner = arg_address(call, 0)?;
                Ok(Value::Bool(state.pool_claims.contains(&owner)))
            }
            methods::REWARD_AMOUNT => Ok(json!(state.pool_reward.to_string())),
            methods::RESOLVE_NAME => {
                let owner = arg_address(call, 0)?;
                let name = state.names.get(&owner).cloned().unwrap_or_default();
                Ok(Value::String(name))
            }
            other => bail!("unsupported read {other}"),
        }
    }

    async fn send_and_confirm(
        &self,
        _chain_id: u64,
        from: &Address,
        call: &ContractCall,
    ) -> Result<TransactionReceipt> {
        let mut state = self.state.lock();
        state.writes.push(call.method);
        if state.failing_writes.contains(call.method) {
            bail!("user rejected {}", call.method);
        }

        match call.method {
            methods::APPROVE => {
                let amount = arg_u128(call, 1)?;
                state.allowances.insert(from.clone(), amount);
            }
            methods::CREATE_PROPOSAL => {
                let reward_amount = arg_u128(call, 2)?;
                let allowance = state.allowances.get(from).copied().unwrap_or(0);
                ensure!(allowance >= reward_amount, "execution reverted: allowance");
                let id = state.proposals.keys().next_back().copied().unwrap_or(0) + 1;
                let mut proposal = MockProposal::window(0, 604_800, 1_209_600);
                proposal.reward_amount = reward_amount;
                proposal.creator = from.clone();
                proposal.title = arg_text(call, 0)?;
                proposal.description = arg_text(call, 1)?;
                proposal.voter_type = VoterType::from_code(arg_u128(call, 3)?)?;
                state.proposals.insert(id, proposal);
            }
            methods::VOTE => {
                let id = arg_u64(call, 0)?;
                let choice = arg_u64(call, 1)?;
                ensure!(
                    state.votes.insert((id, from.clone())),
                    "execution reverted: already voted"
                );
                let proposal = state
                    .proposals
                    .get_mut(&id)
                    .ok_or_else(|| anyhow!("execution reverted: unknown proposal {id}"))?;
                proposal.tally.voter_count += 1;
                match choice {
                    0 => proposal.tally.for_votes += 1,
                    1 => proposal.tally.against_votes += 1,
                    _ => proposal.tally.abstain_votes += 1,
                }
            }
            methods::CLAIM_REWARD => {
                let id = arg_u64(call, 0)?;
                ensure!(
                    state.claims.insert((id, from.clone())),
                    "execution reverted: already claimed"
                );
            }
            methods::CLAIM => {
                ensure!(
                    state.pool_claims.insert(from.clone()),
                    "execution reverted: already claimed"
                );
            }
            other => bail!("unsupported write {other}"),
        }

        let sequence = state.writes.len() as u64;
        Ok(TransactionReceipt {
            tx_hash: format!("0x{sequence:064x}"),
            status: "success".to_string(),
            block_number: sequence,
        })
    }
}

fn arg(call: &ContractCall, index: usize) -> Result<&Value> {
    call.args
        .get(index)
        .ok_or_else(|| anyhow!("{} missing argument {index}", call.method))
}

fn arg_u128(call: &ContractCall, index: usize) -> Result<u128> {
    decode_uint(arg(call, index)?, call.method)
}

fn arg_u64(call: &ContractCall, index: usize) -> Result<u64> {
    Ok(u64::try_from(arg_u128(call, index)?)?)
}

fn arg_address(call: &ContractCall, index: usize) -> Result<Address> {
    let raw = arg(call, index)?
        .as_str()
        .ok_or_else(|| anyhow!("{} argument {index} is not an address", call.method))?;
    Address::parse(raw)
}

fn arg_text(call: &ContractCall, index: usize) -> Result<String> {
    arg(call, index)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("{} argument {index} is not text", call.method))
}
