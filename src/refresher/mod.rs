use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::aggregator::ProposalAggregator;
use crate::config::RefresherConfig;

/// Re-aggregates the anonymous board on an interval so canonical reads stay
/// warm between requests.
pub struct ProposalRefresher {
    aggregator: ProposalAggregator,
    poll_interval: Duration,
}

impl ProposalRefresher {
    pub fn new(aggregator: ProposalAggregator, config: &RefresherConfig) -> Self {
        Self {
            aggregator,
            poll_interval: config.poll_interval(),
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            "Starting proposal refresher every {}s",
            self.poll_interval.as_secs()
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    match changed {
                        Ok(_) => {
                            if *shutdown.borrow() {
                                info!("Refresher shutdown signal received");
                                break;
                            }
                        }
                        Err(_) => {
                            warn!("Shutdown channel closed unexpectedly. Exiting refresher loop");
                            break;
                        }
                    }
                }
                _ = sleep(self.poll_interval) => {
                    self.tick().await;
                }
            }
        }

        Ok(())
    }

    async fn tick(&self) {
        let now = Utc::now().timestamp();
        match self.aggregator.aggregate(None, now).await {
            Ok(board) => debug!(
                "Refreshed {} proposals ({} active)",
                board.len(),
                board.active.len()
            ),
            Err(err) => warn!("Proposal refresh failed: {err:#}"),
        }
    }
}
