use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use tracing::warn;

use crate::models::governance::{
    ActionResponse, ArchiveView, ClaimRequest, CreateFormView, CreateProposalRequest, HomeView,
    ProposalView, ViewContext, VoteRequest,
};
use crate::proposal::{Address, ResolvedProposal, VoteChoice};
use crate::state::AppState;

use super::{HttpError, ViewerQuery, chain_error, parse_account};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home_view))
        .route("/archive", get(archive_view))
        .route("/proposals", post(create_proposal))
        .route("/proposals/{proposal_id}", get(get_proposal))
        .route("/proposals/{proposal_id}/votes", post(submit_vote))
        .route("/proposals/{proposal_id}/claim", post(claim_reward))
}

fn render(proposals: &[ResolvedProposal], ctx: &ViewContext<'_>) -> Vec<ProposalView> {
    proposals
        .iter()
        .map(|proposal| ProposalView::build(proposal, ctx))
        .collect()
}

fn creators<'a>(buckets: &'a [&'a Vec<ResolvedProposal>]) -> impl Iterator<Item = &'a Address> {
    buckets
        .iter()
        .flat_map(|bucket| bucket.iter())
        .map(|resolved| &resolved.proposal.creator)
}

pub(super) async fn home_view(
    Query(query): Query<ViewerQuery>,
    State(state): State<AppState>,
) -> Result<Json<HomeView>, HttpError> {
    let viewer = parse_account(query.account.as_deref())?;
    let now = Utc::now().timestamp();
    let board = state
        .aggregator
        .aggregate(viewer.as_ref(), now)
        .await
        .map_err(chain_error)?;

    let eligible = match viewer.as_ref() {
        Some(account) => match state.eligibility.holdings(account).await {
            Ok(holdings) => Some(holdings.can_create()),
            Err(err) => {
                warn!("Create eligibility of {account} unknown: {err:#}");
                None
            }
        },
        None => None,
    };

    let names = state
        .names
        .display_names(creators(&[&board.active, &board.finished]))
        .await;
    let pending = state.dispatcher.pending();
    let creating = viewer
        .as_ref()
        .is_some_and(|account| pending.is_creating(account));
    let symbol = state.registry.token_symbol.as_str();
    let ctx = ViewContext {
        now,
        token_symbol: symbol,
        viewer: viewer.as_ref(),
        pending,
        names: &names,
    };

    let view = HomeView {
        account: viewer.clone(),
        now,
        is_loading: board.is_loading,
        create: CreateFormView::new(symbol, eligible, creating),
        active: render(&board.active, &ctx),
        finished: render(&board.finished, &ctx),
    };
    Ok(Json(view))
}

async fn archive_view(
    Query(query): Query<ViewerQuery>,
    State(state): State<AppState>,
) -> Result<Json<ArchiveView>, HttpError> {
    let viewer = parse_account(query.account.as_deref())?;
    let now = Utc::now().timestamp();
    let board = state
        .aggregator
        .aggregate(viewer.as_ref(), now)
        .await
        .map_err(chain_error)?;

    let names = state
        .names
        .display_names(creators(&[&board.archived]))
        .await;
    let ctx = ViewContext {
        now,
        token_symbol: &state.registry.token_symbol,
        viewer: viewer.as_ref(),
        pending: state.dispatcher.pending(),
        names: &names,
    };
    let view = ArchiveView {
        account: viewer.clone(),
        now,
        is_loading: board.is_loading,
        archived: render(&board.archived, &ctx),
    };
    Ok(Json(view))
}

async fn get_proposal(
    Path(proposal_id): Path<u64>,
    Query(query): Query<ViewerQuery>,
    State(state): State<AppState>,
) -> Result<Json<ProposalView>, HttpError> {
    let viewer = parse_account(query.account.as_deref())?;
    let now = Utc::now().timestamp();
    let resolved = state
        .aggregator
        .find(proposal_id, viewer.as_ref())
        .await
        .map_err(chain_error)?
        .ok_or_else(|| {
            HttpError::new(
                StatusCode::NOT_FOUND,
                format!("Proposal {proposal_id} not found"),
            )
        })?;

    let names = state
        .names
        .display_names([&resolved.proposal.creator])
        .await;
    let ctx = ViewContext {
        now,
        token_symbol: &state.registry.token_symbol,
        viewer: viewer.as_ref(),
        pending: state.dispatcher.pending(),
        names: &names,
    };
    Ok(Json(ProposalView::build(&resolved, &ctx)))
}

async fn create_proposal(
    State(state): State<AppState>,
    Json(request): Json<CreateProposalRequest>,
) -> Result<(StatusCode, Json<ActionResponse>), HttpError> {
    let account = parse_account(request.account.as_deref())?;
    let outcome = state
        .dispatcher
        .create_proposal(account.as_ref(), &request.draft)
        .await?;
    Ok((StatusCode::CREATED, Json(ActionResponse::from(outcome))))
}

async fn submit_vote(
    Path(proposal_id): Path<u64>,
    State(state): State<AppState>,
    Json(request): Json<VoteRequest>,
) -> Result<Json<ActionResponse>, HttpError> {
    let account = parse_account(request.account.as_deref())?;
    let choice = VoteChoice::from_label(&request.choice)
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;
    let receipt = state
        .dispatcher
        .vote(account.as_ref(), proposal_id, choice, Utc::now().timestamp())
        .await?;
    Ok(Json(ActionResponse::from(receipt)))
}

async fn claim_reward(
    Path(proposal_id): Path<u64>,
    State(state): State<AppState>,
    Json(request): Json<ClaimRequest>,
) -> Result<Json<ActionResponse>, HttpError> {
    let account = parse_account(request.account.as_deref())?;
    let receipt = state
        .dispatcher
        .claim_reward(account.as_ref(), proposal_id, Utc::now().timestamp())
        .await?;
    Ok(Json(ActionResponse::from(receipt)))
}
