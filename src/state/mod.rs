use std::sync::Arc;
use std::time::Instant;

use crate::aggregator::ProposalAggregator;
use crate::cache::ReadCache;
use crate::config::CacheConfig;
use crate::contracts::ContractRegistry;
use crate::dispatcher::ActionDispatcher;
use crate::eligibility::EligibilityChecker;
use crate::names::NameResolver;
use crate::rewards::RewardPool;
use crate::rpc::ContractGateway;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn ContractGateway>,
    pub registry: Arc<ContractRegistry>,
    pub reads: Arc<ReadCache>,
    pub aggregator: ProposalAggregator,
    pub eligibility: EligibilityChecker,
    pub rewards: RewardPool,
    pub names: NameResolver,
    pub dispatcher: ActionDispatcher,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        gateway: Arc<dyn ContractGateway>,
        registry: ContractRegistry,
        cache: &CacheConfig,
    ) -> Self {
        assert!(
            !registry.token_symbol.is_empty(),
            "Token symbol must be configured"
        );

        let registry = Arc::new(registry);
        let reads = Arc::new(ReadCache::new(
            Arc::clone(&gateway),
            registry.chain_id,
            cache,
        ));
        let eligibility = EligibilityChecker::new(Arc::clone(&reads), Arc::clone(&registry));
        let aggregator = ProposalAggregator::new(Arc::clone(&reads), Arc::clone(&registry));
        let rewards = RewardPool::new(
            Arc::clone(&reads),
            Arc::clone(&registry),
            eligibility.clone(),
        );
        let names = NameResolver::new(Arc::clone(&reads), Arc::clone(&registry));
        let dispatcher = ActionDispatcher::new(
            Arc::clone(&gateway),
            Arc::clone(&reads),
            Arc::clone(&registry),
            eligibility.clone(),
            aggregator.clone(),
            rewards.clone(),
        );

        Self {
            gateway,
            registry,
            reads,
            aggregator,
            eligibility,
            rewards,
            names,
            dispatcher,
            start_time: Instant::now(),
        }
    }
}
