use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use moka::Expiry;
use moka::future::Cache;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::contracts::ContractCall;
use crate::proposal::Address;
use crate::rpc::ContractGateway;

/// Freshness class of a read. Each class maps to its own time-to-live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Proposal records and per-viewer vote/claim flags.
    ProposalDetail,
    /// Proposal count, balances, allowances, governance NFT holdings.
    Canonical,
    /// Reward-pool eligibility holdings and pool balance.
    Holdings,
    /// Values that change only on redeploy.
    Static,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ReadKey {
    chain_id: u64,
    address: Address,
    method: &'static str,
    params: String,
    epoch: u64,
}

#[derive(Clone)]
struct CachedRead {
    value: Arc<Value>,
    ttl: Duration,
}

struct FreshnessExpiry;

impl Expiry<ReadKey, CachedRead> for FreshnessExpiry {
    fn expire_after_create(
        &self,
        _key: &ReadKey,
        value: &CachedRead,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

#[derive(Debug, Clone, Copy)]
struct FreshnessWindows {
    proposal_detail: Duration,
    canonical: Duration,
    holdings: Duration,
    fixed: Duration,
}

impl FreshnessWindows {
    fn ttl(&self, freshness: Freshness) -> Duration {
        match freshness {
            Freshness::ProposalDetail => self.proposal_detail,
            Freshness::Canonical => self.canonical,
            Freshness::Holdings => self.holdings,
            Freshness::Static => self.fixed,
        }
    }
}

/// Read-through cache over contract reads for one chain.
///
/// Entries are keyed by chain, contract, method and params plus the
/// contract's current epoch. Invalidating a contract bumps its epoch, so every earlier
/// entry becomes unreachable at once, including results of loads that were
/// still in flight when the invalidation happened.
pub struct ReadCache {
    gateway: Arc<dyn ContractGateway>,
    chain_id: u64,
    entries: Cache<ReadKey, CachedRead>,
    epochs: RwLock<HashMap<Address, u64>>,
    loads: LoadCounter,
    windows: FreshnessWindows,
}

impl ReadCache {
    pub fn new(gateway: Arc<dyn ContractGateway>, chain_id: u64, config: &CacheConfig) -> Self {
        assert!(
            config.max_capacity >= 100,
            "Read cache capacity threshold"
        );

        let entries = Cache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(FreshnessExpiry)
            .support_invalidation_closures()
            .build();

        Self {
            gateway,
            chain_id,
            entries,
            epochs: RwLock::new(HashMap::new()),
            loads: LoadCounter::default(),
            windows: FreshnessWindows {
                proposal_detail: Duration::from_secs(config.proposal_detail_ttl_seconds),
                canonical: Duration::from_secs(config.canonical_ttl_seconds),
                holdings: Duration::from_secs(config.holdings_ttl_seconds),
                fixed: Duration::from_secs(config.static_ttl_seconds),
            },
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub async fn read(&self, call: ContractCall, freshness: Freshness) -> Result<Arc<Value>> {
        let params = serde_json::to_string(&call.args)
            .with_context(|| format!("Failed to encode {} params", call.method))?;
        let key = ReadKey {
            chain_id: self.chain_id,
            address: call.address.clone(),
            method: call.method,
            params,
            epoch: self.epoch_of(&call.address),
        };
        let ttl = self.windows.ttl(freshness);
        let gateway = Arc::clone(&self.gateway);
        let loads = self.loads.clone();
        let chain_id = self.chain_id;

        let cached = self
            .entries
            .try_get_with(key, async move {
                let _loading = loads.enter();
                debug!("Reading {}.{} from chain", call.address, call.method);
                let value = gateway.read_contract(chain_id, &call).await?;
                Ok::<_, anyhow::Error>(CachedRead {
                    value: Arc::new(value),
                    ttl,
                })
            })
            .await
            .map_err(|err| anyhow!("{err:#}"))?;

        Ok(cached.value)
    }

    /// Drop every cached read scoped to `address`.
    pub fn invalidate_contract(&self, address: &Address) {
        let epoch = {
            let mut epochs = self.epochs.write();
            let epoch = epochs.entry(address.clone()).or_insert(0);
            *epoch += 1;
            *epoch
        };

        let scope = address.clone();
        if let Err(err) = self
            .entries
            .invalidate_entries_if(move |key, _| key.address == scope && key.epoch < epoch)
        {
            warn!("Failed to schedule eviction for {address}: {err}");
        }
        debug!("Invalidated cached reads for {address} (epoch {epoch})");
    }

    /// Number of chain reads currently loading, across every caller.
    pub fn in_flight(&self) -> usize {
        self.loads.current()
    }

    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    fn epoch_of(&self, address: &Address) -> u64 {
        self.epochs.read().get(address).copied().unwrap_or(0)
    }
}

/// Counts loads that have started and not yet finished. Clones share the
/// count.
#[derive(Debug, Clone, Default)]
pub struct LoadCounter {
    count: Arc<AtomicUsize>,
}

impl LoadCounter {
    pub fn enter(&self) -> LoadGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        LoadGuard {
            count: Arc::clone(&self.count),
        }
    }

    pub fn current(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

/// Releases its load when dropped, including on unwind.
pub struct LoadGuard {
    count: Arc<AtomicUsize>,
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::methods;
    use crate::rpc::mock::{MockChain, MockProposal, account, cache_config};

    fn cache_over(chain: &Arc<MockChain>) -> ReadCache {
        let gateway: Arc<dyn ContractGateway> = chain.clone();
        ReadCache::new(gateway, chain.registry().chain_id, &cache_config())
    }

    async fn started(chain: &MockChain, method: &str, reads: usize) {
        while chain.read_count(method) < reads {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn repeated_reads_hit_cache() {
        let chain = Arc::new(MockChain::new());
        chain.insert_proposal(MockProposal::window(10, 20, 30));
        let cache = cache_over(&chain);
        let registry = chain.registry();

        for _ in 0..3 {
            cache
                .read(registry.proposal(1), Freshness::ProposalDetail)
                .await
                .unwrap();
        }
        assert_eq!(chain.read_count(methods::PROPOSALS), 1);
        assert_eq!(cache.in_flight(), 0);
    }

    #[tokio::test]
    async fn viewer_reads_are_keyed_per_account() {
        let chain = Arc::new(MockChain::new());
        chain.insert_proposal(MockProposal::window(10, 20, 30));
        let cache = cache_over(&chain);
        let registry = chain.registry();

        let first = cache
            .read(registry.has_voted(1, &account(1)), Freshness::ProposalDetail)
            .await
            .unwrap();
        let second = cache
            .read(registry.has_voted(1, &account(2)), Freshness::ProposalDetail)
            .await
            .unwrap();
        assert_eq!(*first, Value::Bool(false));
        assert_eq!(*second, Value::Bool(false));
        assert_eq!(chain.read_count(methods::HAS_VOTED), 2);
    }

    #[tokio::test]
    async fn invalidation_is_scoped_to_contract() {
        let chain = Arc::new(MockChain::new());
        chain.insert_proposal(MockProposal::window(10, 20, 30));
        let cache = cache_over(&chain);
        let registry = chain.registry();
        let owner = account(1);

        cache
            .read(registry.proposal(1), Freshness::ProposalDetail)
            .await
            .unwrap();
        cache
            .read(registry.token_balance(&owner), Freshness::Canonical)
            .await
            .unwrap();

        cache.invalidate_contract(&registry.governance);

        cache
            .read(registry.proposal(1), Freshness::ProposalDetail)
            .await
            .unwrap();
        cache
            .read(registry.token_balance(&owner), Freshness::Canonical)
            .await
            .unwrap();

        assert_eq!(chain.read_count(methods::PROPOSALS), 2);
        assert_eq!(chain.read_count(methods::BALANCE_OF), 1);
    }

    #[tokio::test]
    async fn failed_reads_are_not_cached() {
        let chain = Arc::new(MockChain::new());
        chain.insert_proposal(MockProposal::window(10, 20, 30));
        chain.break_proposal(1);
        let cache = cache_over(&chain);
        let registry = chain.registry();

        assert!(
            cache
                .read(registry.proposal(1), Freshness::ProposalDetail)
                .await
                .is_err()
        );
        chain.repair_proposal(1);
        assert!(
            cache
                .read(registry.proposal(1), Freshness::ProposalDetail)
                .await
                .is_ok()
        );
        assert_eq!(chain.read_count(methods::PROPOSALS), 2);
    }

    #[tokio::test]
    async fn concurrent_reads_share_one_load() {
        let chain = Arc::new(MockChain::new());
        chain.insert_proposal(MockProposal::window(10, 20, 30));
        chain.hold_reads(methods::PROPOSALS);
        let cache = Arc::new(cache_over(&chain));
        let registry = chain.registry();

        let first = tokio::spawn({
            let cache = Arc::clone(&cache);
            let call = registry.proposal(1);
            async move { cache.read(call, Freshness::ProposalDetail).await }
        });
        started(&chain, methods::PROPOSALS, 1).await;
        assert_eq!(cache.in_flight(), 1);

        let second = tokio::spawn({
            let cache = Arc::clone(&cache);
            let call = registry.proposal(1);
            async move { cache.read(call, Freshness::ProposalDetail).await }
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        chain.release_reads(methods::PROPOSALS);

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(chain.read_count(methods::PROPOSALS), 1);
        assert_eq!(cache.in_flight(), 0);
    }

    #[tokio::test]
    async fn load_finishing_after_invalidation_is_not_served() {
        let chain = Arc::new(MockChain::new());
        chain.insert_proposal(MockProposal::window(10, 20, 30));
        chain.hold_reads(methods::PROPOSALS);
        let cache = Arc::new(cache_over(&chain));
        let registry = chain.registry();

        let stale = tokio::spawn({
            let cache = Arc::clone(&cache);
            let call = registry.proposal(1);
            async move { cache.read(call, Freshness::ProposalDetail).await }
        });
        started(&chain, methods::PROPOSALS, 1).await;

        cache.invalidate_contract(&registry.governance);
        chain.release_reads(methods::PROPOSALS);
        stale.await.unwrap().unwrap();

        cache
            .read(registry.proposal(1), Freshness::ProposalDetail)
            .await
            .unwrap();
        assert_eq!(chain.read_count(methods::PROPOSALS), 2);

        cache
            .read(registry.proposal(1), Freshness::ProposalDetail)
            .await
            .unwrap();
        assert_eq!(chain.read_count(methods::PROPOSALS), 2);
    }
}
