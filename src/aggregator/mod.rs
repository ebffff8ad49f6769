use std::sync::Arc;

use anyhow::{Context, Result, ensure};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::cache::{Freshness, LoadCounter, ReadCache};
use crate::contracts::ContractRegistry;
use crate::proposal::{Address, Lifecycle, Proposal, ResolvedProposal, ViewerStatus};
use crate::units::{decode_bool, decode_uint};

/// Upper bound on proposal ids resolved per pass.
pub const MAX_PROPOSALS: u64 = 10_000;

/// Proposals resolving at once, shared by every pass of one aggregator.
pub const MAX_CONCURRENT_RESOLVES: usize = 32;

/// Proposals for one viewer, bucketed against a single `now` snapshot.
#[derive(Debug, Clone, Default)]
pub struct ProposalBoard {
    pub active: Vec<ResolvedProposal>,
    pub finished: Vec<ResolvedProposal>,
    pub archived: Vec<ResolvedProposal>,
    /// Resolves of this pass still loading when the board was assembled.
    pub is_loading: bool,
}

impl ProposalBoard {
    pub fn len(&self) -> usize {
        self.active.len() + self.finished.len() + self.archived.len()
    }
}

#[derive(Clone)]
pub struct ProposalAggregator {
    reads: Arc<ReadCache>,
    registry: Arc<ContractRegistry>,
    permits: Arc<Semaphore>,
}

impl ProposalAggregator {
    pub fn new(reads: Arc<ReadCache>, registry: Arc<ContractRegistry>) -> Self {
        assert_eq!(
            reads.chain_id(),
            registry.chain_id,
            "Read cache and registry must target the same chain"
        );
        Self {
            reads,
            registry,
            permits: Arc::new(Semaphore::new(MAX_CONCURRENT_RESOLVES)),
        }
    }

    pub async fn proposal_count(&self) -> Result<u64> {
        let raw = self
            .reads
            .read(self.registry.proposal_count(), Freshness::Canonical)
            .await?;
        let count = u64::try_from(decode_uint(&raw, "proposalCount")?)
            .context("proposalCount exceeds u64 bounds")?;
        ensure!(
            count <= MAX_PROPOSALS,
            "proposalCount {count} exceeds supported bound {MAX_PROPOSALS}"
        );
        Ok(count)
    }

    pub async fn proposal(&self, id: u64) -> Result<Proposal> {
        let raw = self
            .reads
            .read(self.registry.proposal(id), Freshness::ProposalDetail)
            .await?;
        Proposal::decode(id, &raw)
    }

    pub async fn viewer_status(&self, id: u64, viewer: &Address) -> Result<ViewerStatus> {
        let (voted, claimed) = tokio::try_join!(
            self.reads.read(
                self.registry.has_voted(id, viewer),
                Freshness::ProposalDetail
            ),
            self.reads.read(
                self.registry.has_claimed(id, viewer),
                Freshness::ProposalDetail
            ),
        )?;
        Ok(ViewerStatus {
            has_voted: decode_bool(&voted, "hasVoted")?,
            has_claimed: decode_bool(&claimed, "hasClaimed")?,
        })
    }

    /// Join the canonical record with the viewer's flags. The record and both
    /// flags are read concurrently.
    pub async fn resolve(&self, id: u64, viewer: Option<&Address>) -> Result<ResolvedProposal> {
        let (proposal, status) = match viewer {
            Some(viewer) => tokio::try_join!(self.proposal(id), self.viewer_status(id, viewer))?,
            None => (self.proposal(id).await?, ViewerStatus::default()),
        };
        Ok(ResolvedProposal::new(proposal, status))
    }

    pub async fn find(&self, id: u64, viewer: Option<&Address>) -> Result<Option<ResolvedProposal>> {
        let count = self.proposal_count().await?;
        if id == 0 || id > count {
            return Ok(None);
        }
        self.resolve(id, viewer).await.map(Some)
    }

    async fn resolve_limited(&self, id: u64, viewer: Option<&Address>) -> Result<ResolvedProposal> {
        let _permit = self
            .permits
            .acquire()
            .await
            .context("Resolve limiter closed")?;
        self.resolve(id, viewer).await
    }

    /// Resolve every proposal and bucket it by lifecycle at `now`.
    ///
    /// A proposal that fails to resolve is logged and left out of every
    /// bucket; the rest of the pass is unaffected. Only a failure to read the
    /// proposal count fails the whole pass. At most `MAX_CONCURRENT_RESOLVES`
    /// proposals load at a time.
    pub async fn aggregate(&self, viewer: Option<&Address>, now: i64) -> Result<ProposalBoard> {
        let count = self.proposal_count().await?;
        let loads = LoadCounter::default();
        let mut tasks = JoinSet::new();
        for id in 1..=count {
            let aggregator = self.clone();
            let viewer = viewer.cloned();
            let loading = loads.enter();
            tasks.spawn(async move {
                let _loading = loading;
                let resolved = aggregator.resolve_limited(id, viewer.as_ref()).await;
                (id, resolved)
            });
        }

        let mut resolved = Vec::with_capacity(count as usize);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(proposal))) => resolved.push(proposal),
                Ok((id, Err(err))) => warn!("Dropping proposal {id} from board: {err:#}"),
                Err(join_err) => warn!("Proposal resolve task failed: {join_err}"),
            }
        }
        resolved.sort_by(|a, b| b.id().cmp(&a.id()));

        let mut board = ProposalBoard::default();
        for proposal in resolved {
            match Lifecycle::at(&proposal.proposal, now) {
                Lifecycle::Active => board.active.push(proposal),
                Lifecycle::Finished => board.finished.push(proposal),
                Lifecycle::Archived => board.archived.push(proposal),
            }
        }
        board.is_loading = loads.current() > 0;

        assert!(
            board.len() as u64 <= count,
            "Board holds more proposals than the contract reports"
        );
        debug!(
            "Aggregated {} of {count} proposals ({} active, {} finished, {} archived)",
            board.len(),
            board.active.len(),
            board.finished.len(),
            board.archived.len()
        );
        Ok(board)
    }
}
