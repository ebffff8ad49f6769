mod aggregator;
mod cache;
mod config;
mod contracts;
mod dispatcher;
mod eligibility;
mod http;
mod models;
mod names;
mod proposal;
mod refresher;
mod rewards;
mod rpc;
mod state;
mod units;
mod validation;

use std::sync::Arc;

use crate::config::ApiConfig;
use crate::contracts::ContractRegistry;
use crate::refresher::ProposalRefresher;
use crate::rpc::{ContractGateway, RpcClient};
use crate::state::AppState;
use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = ApiConfig::load().context("Failed to load configuration")?;

    let rpc_client = RpcClient::new(&config.chain.rpc_url, config.chain.request_timeout())
        .context("Failed to initialize RPC client")?;
    let registry = ContractRegistry::from_config(&config.chain, &config.contracts)
        .context("Failed to load contract registry")?;
    check_chain(&rpc_client, registry.chain_id).await;

    let gateway: Arc<dyn ContractGateway> = Arc::new(rpc_client);
    let app_state = AppState::new(gateway, registry, &config.cache);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let refresher_handle = if config.refresher.enabled {
        let refresher = ProposalRefresher::new(app_state.aggregator.clone(), &config.refresher);
        Some(tokio::spawn(async move {
            if let Err(err) = refresher.run(shutdown_rx).await {
                error!("Refresher terminated with error: {err}");
            }
        }))
    } else {
        info!("Proposal refresher disabled");
        None
    };

    let listener = TcpListener::bind(config.server.address())
        .await
        .context("Failed to bind HTTP listener")?;
    let local_addr = listener
        .local_addr()
        .context("Failed to obtain listener address")?;
    info!("DeVote API listening on {local_addr}");

    let router: Router = http::router(app_state.clone());
    let server = axum::serve(listener, router.into_make_service());
    server
        .with_graceful_shutdown(shutdown_signal(shutdown_tx.clone()))
        .await
        .context("HTTP server exited with error")?;

    shutdown_tx.send(true).ok();
    if let Some(handle) = refresher_handle {
        if let Err(join_err) = handle.await {
            error!("Refresher task join error: {join_err}");
        }
    }

    Ok(())
}

fn init_tracing() {
    let default_filter = "info";
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    assert!(!filter.is_empty(), "Tracing filter must not be empty");
    assert!(filter.len() < 256, "Tracing filter length exceeds bounds");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .compact()
        .init();
}

/// The gateway may still be starting; readiness reports the mismatch later.
async fn check_chain(rpc: &RpcClient, expected: u64) {
    match rpc.chain_id().await {
        Ok(chain_id) if chain_id == expected => info!("Connected to chain {chain_id}"),
        Ok(chain_id) => warn!("Gateway serves chain {chain_id}, configured chain is {expected}"),
        Err(err) => warn!("Gateway unreachable at startup: {err:#}"),
    }
}

async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {err}");
        return;
    }
    shutdown_tx.send(true).ok();
    info!("Shutdown signal dispatched");
}
