//! HTTP route definitions

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::app::AppState;
use crate::game::{Command, MatchError, MatchView, PlayerId};
use crate::lobby::LobbyError;
use crate::util::time::uptime_secs;

/// Upper bound on handling one request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/state", get(state_handler))
        .route("/join", post(join_handler))
        .route("/bot", post(bot_handler))
        .route("/ready", post(ready_handler))
        .route("/quit", post(quit_handler))
        .route("/command", post(command_handler))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.client_origin))
        .with_state(state)
}

/// CORS configuration - `*` or a comma-separated list of origins
fn cors_layer(client_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if client_origin.trim() == "*" {
        return cors.allow_origin(Any);
    }

    let allowed_origins: Vec<HeaderValue> = client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
        .collect();
    cors.allow_origin(allowed_origins)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    pending_matches: usize,
    running_matches: usize,
    finished_matches: usize,
    players: usize,
    bot_triggers: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.lobby.stats();

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        pending_matches: stats.pending,
        running_matches: stats.running,
        finished_matches: stats.finished,
        players: stats.players,
        bot_triggers: state.bot_queue.len(),
    })
}

// ============================================================================
// Lobby endpoints
// ============================================================================

/// Body of every successful lobby call
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct OkResponse {
    pub status: String,
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub game: Option<MatchView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<BTreeMap<String, MatchView>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot: Option<PlayerId>,
}

impl OkResponse {
    fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            ..Self::default()
        }
    }

    fn with_match(view: MatchView) -> Self {
        Self {
            game: Some(view),
            ..Self::ok()
        }
    }
}

#[derive(Deserialize)]
struct PlayerRequest {
    player: PlayerId,
}

#[derive(Deserialize)]
struct JoinRequest {
    player: PlayerId,
    match_name: String,
}

#[derive(Deserialize)]
struct CommandRequest {
    player: PlayerId,
    command: Command,
}

fn require_id(player: &PlayerId) -> Result<(), AppError> {
    if player.as_str().trim().is_empty() {
        return Err(AppError::BadRequest("player id must not be empty".to_string()));
    }
    Ok(())
}

/// The caller's match, or every pending match when the caller is in none
async fn state_handler(
    State(state): State<AppState>,
    Query(req): Query<PlayerRequest>,
) -> Result<Json<OkResponse>, AppError> {
    require_id(&req.player)?;

    match state.lobby.view_for(&req.player) {
        Ok(view) => Ok(Json(OkResponse::with_match(view))),
        Err(LobbyError::NotInMatch(_)) => Ok(Json(OkResponse {
            pending: Some(state.lobby.pending_matches()),
            ..OkResponse::ok()
        })),
        Err(e) => Err(e.into()),
    }
}

async fn join_handler(
    State(state): State<AppState>,
    Json(req): Json<JoinRequest>,
) -> Result<Json<OkResponse>, AppError> {
    require_id(&req.player)?;
    if req.match_name.trim().is_empty() {
        return Err(AppError::BadRequest("match name must not be empty".to_string()));
    }

    let view = state.lobby.join(req.player, &req.match_name)?;
    Ok(Json(OkResponse::with_match(view)))
}

async fn bot_handler(
    State(state): State<AppState>,
    Json(req): Json<PlayerRequest>,
) -> Result<Json<OkResponse>, AppError> {
    require_id(&req.player)?;

    let bot = state.lobby.add_bot(&req.player)?;
    let view = state.lobby.view_for(&req.player)?;
    Ok(Json(OkResponse {
        bot: Some(bot),
        ..OkResponse::with_match(view)
    }))
}

async fn ready_handler(
    State(state): State<AppState>,
    Json(req): Json<PlayerRequest>,
) -> Result<Json<OkResponse>, AppError> {
    require_id(&req.player)?;

    state.lobby.set_ready(&req.player, Instant::now())?;
    let view = state.lobby.view_for(&req.player)?;
    Ok(Json(OkResponse::with_match(view)))
}

async fn quit_handler(
    State(state): State<AppState>,
    Json(req): Json<PlayerRequest>,
) -> Result<Json<OkResponse>, AppError> {
    require_id(&req.player)?;

    let outcome = state.lobby.quit(&req.player)?;
    if outcome.match_deleted {
        info!(player = %req.player, "Last player left, match closed");
    }
    Ok(Json(OkResponse::ok()))
}

async fn command_handler(
    State(state): State<AppState>,
    Json(req): Json<CommandRequest>,
) -> Result<Json<OkResponse>, AppError> {
    require_id(&req.player)?;

    if !state.limiter.check(&req.player) {
        warn!(player = %req.player, "Command rate limit exceeded");
        return Err(AppError::TooManyRequests);
    }

    let view = state.lobby.command(&req.player, req.command)?;
    Ok(Json(OkResponse::with_match(view)))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Too many requests")]
    TooManyRequests,
}

impl From<LobbyError> for AppError {
    fn from(e: LobbyError) -> Self {
        match &e {
            LobbyError::NotInMatch(_) | LobbyError::Match(MatchError::UnknownPlayer(_)) => {
                AppError::NotFound(e.to_string())
            }
            LobbyError::AlreadyInMatch(..) | LobbyError::Match(MatchError::AlreadyJoined(_)) => {
                AppError::Conflict(e.to_string())
            }
            LobbyError::Match(_) => AppError::BadRequest(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::TooManyRequests => (
                StatusCode::TOO_MANY_REQUESTS,
                "too many commands, slow down".to_string(),
            ),
        };

        let body = serde_json::json!({
            "error": { "message": message }
        });

        (status, Json(body)).into_response()
    }
}
