use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::cache::{Freshness, ReadCache};
use crate::contracts::ContractRegistry;
use crate::proposal::Address;

/// Resolved display names. Addresses without a registered name render in
/// abbreviated form.
#[derive(Debug, Clone, Default)]
pub struct DisplayNames {
    names: HashMap<Address, String>,
}

impl DisplayNames {
    pub fn display(&self, address: &Address) -> String {
        self.names
            .get(address)
            .cloned()
            .unwrap_or_else(|| address.abbreviated())
    }
}

#[derive(Clone)]
pub struct NameResolver {
    reads: Arc<ReadCache>,
    registry: Arc<ContractRegistry>,
}

impl NameResolver {
    pub fn new(reads: Arc<ReadCache>, registry: Arc<ContractRegistry>) -> Self {
        Self { reads, registry }
    }

    /// Registered name of `account`. A blank name or a failed lookup yields
    /// `None`.
    pub async fn name_of(&self, account: &Address) -> Option<String> {
        let raw = match self
            .reads
            .read(self.registry.resolve_name(account), Freshness::Holdings)
            .await
        {
            Ok(raw) => raw,
            Err(err) => {
                debug!("Name of {account} unresolved: {err:#}");
                return None;
            }
        };
        raw.as_str()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    }

    /// Resolve every distinct address concurrently.
    pub async fn display_names<'a, I>(&self, addresses: I) -> DisplayNames
    where
        I: IntoIterator<Item = &'a Address>,
    {
        let unique: BTreeSet<Address> = addresses.into_iter().cloned().collect();
        let mut tasks = JoinSet::new();
        for address in unique {
            let resolver = self.clone();
            tasks.spawn(async move {
                let name = resolver.name_of(&address).await;
                (address, name)
            });
        }

        let mut names = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((address, Some(name))) => {
                    names.insert(address, name);
                }
                Ok((_, None)) => {}
                Err(join_err) => warn!("Name lookup task failed: {join_err}"),
            }
        }
        DisplayNames { names }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::methods;
    use crate::rpc::ContractGateway;
    use crate::rpc::mock::{MockChain, account, cache_config};

    fn resolver_over(chain: &Arc<MockChain>) -> NameResolver {
        let registry = Arc::new(chain.registry());
        let gateway: Arc<dyn ContractGateway> = chain.clone();
        let reads = Arc::new(ReadCache::new(gateway, registry.chain_id, &cache_config()));
        NameResolver::new(reads, registry)
    }

    #[tokio::test]
    async fn registered_name_replaces_address() {
        let chain = Arc::new(MockChain::new());
        chain.set_name(&account(1), " alice.hash ");
        let resolver = resolver_over(&chain);

        let named = account(1);
        let unnamed = account(2);
        let names = resolver
            .display_names([&named, &unnamed, &named])
            .await;
        assert_eq!(names.display(&named), "alice.hash");
        assert_eq!(names.display(&unnamed), unnamed.abbreviated());
        assert_eq!(chain.read_count(methods::RESOLVE_NAME), 2);

        resolver.display_names([&named]).await;
        assert_eq!(chain.read_count(methods::RESOLVE_NAME), 2);
    }

    #[tokio::test]
    async fn failed_lookup_falls_back_to_abbreviation() {
        let chain = Arc::new(MockChain::new());
        chain.set_name(&account(1), "alice.hash");
        chain.fail_reads(methods::RESOLVE_NAME);
        let resolver = resolver_over(&chain);

        assert_eq!(resolver.name_of(&account(1)).await, None);
        let names = resolver.display_names([&account(1)]).await;
        assert_eq!(names.display(&account(1)), account(1).abbreviated());
    }
}
