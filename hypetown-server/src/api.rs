//! HTTP/JSON API Layer
//!
//! Routes of the Mini App backend. Every `/api/*` request is authenticated
//! with the Telegram `initData` carried in the `Authorization` header.
//!
//! ## Endpoints
//! ```text
//! GET  /health               liveness
//! GET  /api/state            player profile + upgrades
//! POST /api/tap              {"taps": N}
//! POST /api/model            {"model_url": "..."}
//! POST /api/wallet/connect   {"address": "..."}
//! POST /api/upgrade          {"type": "smartphone"}
//! ```

use axum::{
    extract::{rejection::JsonRejection, FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use hypetown::network::protocol::{
    ErrorResponse, ModelRequest, ModelResponse, StateResponse, TapRequest, TapResponse,
    WalletRequest, WalletResponse, MODEL_PATH, STATE_PATH, TAP_PATH, WALLET_CONNECT_PATH,
};

use crate::auth::{validate_init_data, AuthError, TelegramUser};
use crate::config::ServerConfig;
use crate::economy::{self, Purchase, PurchaseError, UpgradeKind};
use crate::store::PlayerStore;

/// `POST` an upgrade purchase.
pub const UPGRADE_PATH: &str = "/api/upgrade";

/// Shared state available to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Player table.
    pub store: Arc<PlayerStore>,
    /// Backend configuration.
    pub config: Arc<ServerConfig>,
}

impl ApiState {
    /// State with an empty player store.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            store: Arc::new(PlayerStore::new()),
            config: Arc::new(config),
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Request failure, rendered as `{"error": code}`.
#[allow(missing_docs)]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AuthError),
    #[error("player not found")]
    PlayerNotFound,
    #[error("invalid request body")]
    InvalidBody,
    #[error("invalid model url")]
    InvalidModelUrl,
    #[error("missing wallet address")]
    MissingAddress,
    #[error("unknown upgrade")]
    UnknownUpgrade,
    #[error(transparent)]
    Purchase(#[from] PurchaseError),
}

impl ApiError {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::PlayerNotFound => "player_not_found",
            ApiError::InvalidBody => "invalid_body",
            ApiError::InvalidModelUrl => "invalid_model_url",
            ApiError::MissingAddress => "missing_address",
            ApiError::UnknownUpgrade => "unknown_upgrade",
            ApiError::Purchase(PurchaseError::MaxLevel) => "max_level",
            ApiError::Purchase(PurchaseError::NotEnoughCoins { .. }) => "not_enough_coins",
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::PlayerNotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse { error: self.code().to_string() };
        (self.status(), Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!("Rejected body: {}", rejection.body_text());
        ApiError::InvalidBody
    }
}

// =============================================================================
// AUTHENTICATION
// =============================================================================

/// Authenticated caller with an existing player record.
#[derive(Debug, Clone)]
pub struct AuthPlayer {
    /// Verified Telegram user.
    pub user: TelegramUser,
}

impl AuthPlayer {
    /// Telegram user id, the player store key.
    pub fn tg_id(&self) -> i64 {
        self.user.id
    }
}

impl FromRequestParts<ApiState> for AuthPlayer {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &ApiState) -> Result<Self, Self::Rejection> {
        let init_data = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        let now = chrono::Utc::now().timestamp();
        let verified = validate_init_data(
            init_data,
            &state.config.bot_token,
            state.config.init_data_max_age,
            now,
        )
        .inspect_err(|e| debug!("Rejected initData: {}", e))?;

        let user = verified.user;
        if state.config.auto_register {
            state.store.get_or_register(&user).await;
        } else if state.store.get(user.id).await.is_none() {
            return Err(ApiError::PlayerNotFound);
        }

        Ok(AuthPlayer { user })
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn get_state(
    State(state): State<ApiState>,
    player: AuthPlayer,
) -> Result<Json<StateResponse>, ApiError> {
    state
        .store
        .update(player.tg_id(), |record| record.to_state_response())
        .await
        .map(Json)
        .ok_or(ApiError::PlayerNotFound)
}

async fn tap(
    State(state): State<ApiState>,
    player: AuthPlayer,
    body: Result<Json<TapRequest>, JsonRejection>,
) -> Result<Json<TapResponse>, ApiError> {
    let Json(req) = body?;
    let max_taps = state.config.max_taps_per_batch;
    if req.taps > max_taps {
        warn!(tg_id = player.tg_id(), taps = req.taps, "Tap batch over cap, crediting {}", max_taps);
    }

    let resp = state
        .store
        .update(player.tg_id(), |record| {
            economy::process_tap(&mut record.state, req.taps, max_taps)
        })
        .await
        .ok_or(ApiError::PlayerNotFound)?;

    debug!(tg_id = player.tg_id(), earned = resp.earned, total = resp.total_coins, "Taps credited");
    Ok(Json(resp))
}

async fn update_model(
    State(state): State<ApiState>,
    player: AuthPlayer,
    body: Result<Json<ModelRequest>, JsonRejection>,
) -> Result<Json<ModelResponse>, ApiError> {
    let Json(req) = body?;
    if req.model_url.is_empty() || req.model_url.len() > state.config.max_model_url_len {
        return Err(ApiError::InvalidModelUrl);
    }

    let url = req.model_url;
    state
        .store
        .update(player.tg_id(), |record| record.state.model_url = Some(url.clone()))
        .await
        .ok_or(ApiError::PlayerNotFound)?;

    info!(tg_id = player.tg_id(), "Model URL updated");
    Ok(Json(ModelResponse { ok: true, model_url: Some(url) }))
}

async fn connect_wallet(
    State(state): State<ApiState>,
    player: AuthPlayer,
    body: Result<Json<WalletRequest>, JsonRejection>,
) -> Result<Json<WalletResponse>, ApiError> {
    let Json(req) = body?;
    if req.address.is_empty() {
        return Err(ApiError::MissingAddress);
    }

    let address = req.address;
    state
        .store
        .update(player.tg_id(), |record| record.state.ton_wallet = Some(address.clone()))
        .await
        .ok_or(ApiError::PlayerNotFound)?;

    info!(tg_id = player.tg_id(), "Wallet connected");
    Ok(Json(WalletResponse { ok: true, wallet: Some(address) }))
}

/// Body of `POST /api/upgrade`.
#[derive(Debug, Deserialize)]
struct UpgradeRequest {
    #[serde(rename = "type", default)]
    kind: String,
}

async fn buy_upgrade(
    State(state): State<ApiState>,
    player: AuthPlayer,
    body: Result<Json<UpgradeRequest>, JsonRejection>,
) -> Result<Json<Purchase>, ApiError> {
    let Json(req) = body?;
    let kind = UpgradeKind::parse(&req.kind).ok_or(ApiError::UnknownUpgrade)?;

    let purchase = state
        .store
        .update(player.tg_id(), |record| {
            economy::buy_upgrade(&mut record.state, &mut record.upgrades, kind)
        })
        .await
        .ok_or(ApiError::PlayerNotFound)??;

    info!(
        tg_id = player.tg_id(),
        upgrade = kind.as_str(),
        level = purchase.new_level,
        tap_power = purchase.new_tap_power,
        "Upgrade bought"
    );
    Ok(Json(purchase))
}

/// Mini App routes.
pub fn routes() -> Router<ApiState> {
    Router::new()
        .route(STATE_PATH, get(get_state))
        .route(TAP_PATH, post(tap))
        .route(MODEL_PATH, post(update_model))
        .route(WALLET_CONNECT_PATH, post(connect_wallet))
        .route(UPGRADE_PATH, post(buy_upgrade))
}

/// Build the full API router
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the API on `addr` until the process is stopped.
pub async fn start_api_server(config: ServerConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = config.bind_addr;
    let app = build_router(ApiState::new(config));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
