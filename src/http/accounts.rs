use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::cache::Freshness;
use crate::models::accounts::{AccountView, PoolClaimView};
use crate::models::governance::ActionResponse;
use crate::proposal::Address;
use crate::state::AppState;
use crate::units::decode_uint;

use super::{HttpError, chain_error};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/accounts/{address}", get(get_account))
        .route("/accounts/{address}/rewards", get(get_pool_rewards))
        .route("/accounts/{address}/rewards/claim", post(claim_pool_rewards))
}

fn parse_path_address(raw: &str) -> Result<Address, HttpError> {
    Address::parse(raw)
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, format!("Invalid address: {err}")))
}

async fn get_account(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AccountView>, HttpError> {
    let address = parse_path_address(&address)?;
    let registry = &state.registry;

    let (balance, allowance, holdings) = tokio::try_join!(
        state
            .reads
            .read(registry.token_balance(&address), Freshness::Canonical),
        state
            .reads
            .read(registry.token_allowance(&address), Freshness::Canonical),
        state.eligibility.holdings(&address),
    )
    .map_err(chain_error)?;

    let token_balance = decode_uint(&balance, "balanceOf").map_err(chain_error)?;
    let allowance = decode_uint(&allowance, "allowance").map_err(chain_error)?;
    let creating_pending = state.dispatcher.pending().is_creating(&address);

    Ok(Json(AccountView::new(
        address,
        token_balance,
        allowance,
        holdings,
        &registry.token_symbol,
        creating_pending,
    )))
}

async fn get_pool_rewards(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PoolClaimView>, HttpError> {
    let address = parse_path_address(&address)?;
    let status = state.rewards.status(&address).await.map_err(chain_error)?;
    let claim_pending = state.dispatcher.pending().is_claiming_pool(&address);
    Ok(Json(PoolClaimView::new(
        address,
        &status,
        &state.registry.token_symbol,
        claim_pending,
    )))
}

async fn claim_pool_rewards(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ActionResponse>, HttpError> {
    let address = parse_path_address(&address)?;
    let receipt = state.dispatcher.claim_pool_reward(Some(&address)).await?;
    Ok(Json(ActionResponse::from(receipt)))
}
