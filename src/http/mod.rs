use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::dispatcher::ActionError;
use crate::proposal::Address;
use crate::state::AppState;

mod accounts;
mod proposals;

pub fn router(state: AppState) -> Router {
    assert!(
        state.start_time.elapsed() < Duration::from_secs(86_400),
        "Application uptime exceeds 24 hours before router creation"
    );

    // Browser wallets call the API directly
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([ACCEPT, AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_live))
        .route("/health/ready", get(health_ready))
        .merge(proposals::router())
        .merge(accounts::router())
        .fallback(proposals::home_view)
        .layer(cors)
        .with_state(state)
}

async fn health_live(State(state): State<AppState>) -> Result<Json<HealthResponse>, HttpError> {
    let uptime = state.start_time.elapsed().as_secs();
    let response = HealthResponse {
        status: "live",
        uptime_seconds: uptime,
    };
    Ok(Json(response))
}

async fn health_ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, HttpError> {
    let chain_id = state
        .gateway
        .chain_id()
        .await
        .map_err(|err| HttpError::new(StatusCode::SERVICE_UNAVAILABLE, format!("{err:#}")))?;

    if chain_id != state.registry.chain_id {
        return Err(HttpError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            format!(
                "Gateway serves chain {chain_id}, expected {}",
                state.registry.chain_id
            ),
        ));
    }

    let response = ReadyResponse {
        status: "ready",
        chain_id,
        cache_entries: state.reads.entry_count(),
        reads_in_flight: state.reads.in_flight(),
        pending_actions: state.dispatcher.pending().len(),
    };
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
struct ReadyResponse {
    status: &'static str,
    chain_id: u64,
    cache_entries: u64,
    reads_in_flight: usize,
    pending_actions: usize,
}

/// Connected account passed by read endpoints.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct ViewerQuery {
    account: Option<String>,
}

/// A missing or blank account means no wallet is connected.
pub(crate) fn parse_account(raw: Option<&str>) -> Result<Option<Address>, HttpError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => Address::parse(value).map(Some).map_err(|err| {
            HttpError::new(StatusCode::BAD_REQUEST, format!("Invalid account: {err}"))
        }),
    }
}

pub(crate) fn chain_error(err: anyhow::Error) -> HttpError {
    HttpError::new(StatusCode::BAD_GATEWAY, format!("{err:#}"))
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: String) -> Self {
        assert!(status != StatusCode::OK, "Error status cannot be 200");
        assert!(!message.is_empty(), "Error message cannot be empty");
        Self { status, message }
    }
}

impl From<ActionError> for HttpError {
    fn from(err: ActionError) -> Self {
        let status = match &err {
            ActionError::NotConnected => StatusCode::UNAUTHORIZED,
            ActionError::Invalid(_) => StatusCode::BAD_REQUEST,
            ActionError::NotEligible(_) => StatusCode::FORBIDDEN,
            ActionError::AlreadyPending(_) => StatusCode::CONFLICT,
            ActionError::UnknownProposal(_) => StatusCode::NOT_FOUND,
            ActionError::Approval(_) | ActionError::Transaction(_) | ActionError::Read(_) => {
                StatusCode::BAD_GATEWAY
            }
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!("HTTP error: {}", self.message);
        } else {
            info!("HTTP error: {}", self.message);
        }
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}
