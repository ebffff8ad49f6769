use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::proposal::Address;

/// One in-flight write. Votes and claims are tracked per proposal so that a
/// pending vote never blocks the same account's actions on other proposals.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PendingKey {
    Create(Address),
    Vote(Address, u64),
    Claim(Address, u64),
    PoolClaim(Address),
}

impl fmt::Display for PendingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create(account) => write!(f, "proposal creation for {account}"),
            Self::Vote(account, id) => write!(f, "vote on proposal {id} for {account}"),
            Self::Claim(account, id) => write!(f, "reward claim on proposal {id} for {account}"),
            Self::PoolClaim(account) => write!(f, "reward pool claim for {account}"),
        }
    }
}

#[derive(Clone, Default)]
pub struct PendingActions {
    keys: Arc<Mutex<HashSet<PendingKey>>>,
}

impl PendingActions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` as in flight. Returns `None` when it already is.
    pub fn begin(&self, key: PendingKey) -> Option<PendingGuard> {
        if !self.keys.lock().insert(key.clone()) {
            return None;
        }
        Some(PendingGuard {
            keys: Arc::clone(&self.keys),
            key,
        })
    }

    pub fn is_pending(&self, key: &PendingKey) -> bool {
        self.keys.lock().contains(key)
    }

    pub fn is_voting(&self, account: &Address, id: u64) -> bool {
        self.is_pending(&PendingKey::Vote(account.clone(), id))
    }

    pub fn is_claiming(&self, account: &Address, id: u64) -> bool {
        self.is_pending(&PendingKey::Claim(account.clone(), id))
    }

    pub fn is_creating(&self, account: &Address) -> bool {
        self.is_pending(&PendingKey::Create(account.clone()))
    }

    pub fn is_claiming_pool(&self, account: &Address) -> bool {
        self.is_pending(&PendingKey::PoolClaim(account.clone()))
    }

    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }
}

/// Clears its marker when dropped, on every exit path.
pub struct PendingGuard {
    keys: Arc<Mutex<HashSet<PendingKey>>>,
    key: PendingKey,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.keys.lock().remove(&self.key);
    }
}
