use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use scoring::ScanPolicy;
use serde::{Deserialize, Serialize};
use server_api::ApiContext;
use shared::{
    domain::TeamId,
    error::{ApiError, ErrorCode},
    protocol::{
        AdminLoginRequest, AdminStats, ClueSummary, GameStateSnapshot, RegisterTeamRequest,
        ScanLogEntry, ScanRequest, ScanResponse, ServerEvent, TeamLoginRequest, TeamSnapshot,
    },
};
use storage::Storage;
use tokio::sync::broadcast;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::{http_error, AppState, HttpError};
use config::{load_settings, prepare_database_url};

const MAX_BODY_BYTES: usize = 16 * 1024;
const DEFAULT_SCAN_LOG_LIMIT: u32 = 100;

#[derive(Debug, Serialize, Deserialize)]
struct HealthResponse {
    status: String,
    game: GameStateSnapshot,
}

#[derive(Debug, Serialize, Deserialize)]
struct ResetResponse {
    teams_reset: u64,
    scans_cleared: u64,
}

#[derive(Debug, Deserialize)]
struct ScanLogQuery {
    limit: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    if settings.seed_catalog {
        storage.seed_default_catalog().await?;
    }

    let api = ApiContext {
        storage,
        scan_policy: ScanPolicy {
            require_running_game: settings.scan_requires_running_game,
        },
        admin_password: settings.admin_password,
    };
    let (events, _) = broadcast::channel(256);
    let app = build_router(Arc::new(AppState { api, events }));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(
        %addr,
        scan_requires_running_game = settings.scan_requires_running_game,
        "server listening"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(%error, "failed to listen for shutdown signal");
    }
    info!("shutting down");
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/health", get(api_health))
        .route("/api/teams", post(http_register_team).get(http_list_teams))
        .route("/api/teams/login", post(http_login_team))
        .route("/api/teams/:team_id", get(http_get_team).delete(http_delete_team))
        .route("/api/teams/:team_id/clue", get(http_current_clue))
        .route("/api/teams/:team_id/disqualify", post(http_disqualify_team))
        .route("/api/teams/:team_id/restore", post(http_restore_team))
        .route("/api/leaderboard", get(http_leaderboard))
        .route("/api/clues", get(http_list_clues))
        .route("/api/scan", post(http_scan))
        .route("/api/gamestate", get(http_game_state))
        .route("/api/gamestate/start", post(http_start_game))
        .route("/api/gamestate/stop", post(http_stop_game))
        .route("/api/admin/login", post(http_admin_login))
        .route("/api/admin/stats", get(http_admin_stats))
        .route("/api/admin/reset", post(http_reset))
        .route("/api/scanlogs", get(http_scan_logs))
        .route("/ws", get(ws_handler))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, HttpError> {
    state
        .api
        .storage
        .health_check()
        .await
        .map_err(|e| http_error(ApiError::new(ErrorCode::Unavailable, e.to_string())))?;
    Ok("ok")
}

async fn api_health(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthResponse>, HttpError> {
    let game = server_api::game_state(&state.api).await.map_err(http_error)?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        game,
    }))
}

async fn http_register_team(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterTeamRequest>,
) -> Result<(StatusCode, Json<TeamSnapshot>), HttpError> {
    let team = server_api::register_team(&state.api, req)
        .await
        .map_err(http_error)?;
    state.publish(ServerEvent::TeamUpdated { team: team.clone() });
    Ok((StatusCode::CREATED, Json(team)))
}

async fn http_login_team(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TeamLoginRequest>,
) -> Result<Json<TeamSnapshot>, HttpError> {
    let team = server_api::login_team(&state.api, req)
        .await
        .map_err(http_error)?;
    Ok(Json(team))
}

async fn http_list_teams(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<TeamSnapshot>>, HttpError> {
    state.require_admin(&headers)?;
    let teams = server_api::list_teams(&state.api)
        .await
        .map_err(http_error)?;
    Ok(Json(teams))
}

async fn http_get_team(
    State(state): State<Arc<AppState>>,
    Path(team_id): Path<i64>,
) -> Result<Json<TeamSnapshot>, HttpError> {
    let team = server_api::get_team(&state.api, TeamId(team_id))
        .await
        .map_err(http_error)?;
    Ok(Json(team))
}

async fn http_current_clue(
    State(state): State<Arc<AppState>>,
    Path(team_id): Path<i64>,
) -> Result<Json<Option<ClueSummary>>, HttpError> {
    let clue = server_api::current_clue(&state.api, TeamId(team_id))
        .await
        .map_err(http_error)?;
    Ok(Json(clue))
}

async fn http_disqualify_team(
    state: State<Arc<AppState>>,
    path: Path<i64>,
    headers: HeaderMap,
) -> Result<Json<TeamSnapshot>, HttpError> {
    set_disqualified(state, path, headers, true).await
}

async fn http_restore_team(
    state: State<Arc<AppState>>,
    path: Path<i64>,
    headers: HeaderMap,
) -> Result<Json<TeamSnapshot>, HttpError> {
    set_disqualified(state, path, headers, false).await
}

async fn set_disqualified(
    State(state): State<Arc<AppState>>,
    Path(team_id): Path<i64>,
    headers: HeaderMap,
    disqualified: bool,
) -> Result<Json<TeamSnapshot>, HttpError> {
    state.require_admin(&headers)?;
    let team = server_api::set_disqualified(&state.api, TeamId(team_id), disqualified)
        .await
        .map_err(http_error)?;
    state.publish(ServerEvent::TeamUpdated { team: team.clone() });
    Ok(Json(team))
}

async fn http_delete_team(
    State(state): State<Arc<AppState>>,
    Path(team_id): Path<i64>,
    headers: HeaderMap,
) -> Result<StatusCode, HttpError> {
    state.require_admin(&headers)?;
    let team_id = TeamId(team_id);
    server_api::delete_team(&state.api, team_id)
        .await
        .map_err(http_error)?;
    state.publish(ServerEvent::TeamRemoved { team_id });
    Ok(StatusCode::NO_CONTENT)
}

async fn http_leaderboard(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TeamSnapshot>>, HttpError> {
    let board = server_api::leaderboard(&state.api)
        .await
        .map_err(http_error)?;
    Ok(Json(board))
}

async fn http_list_clues(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<ClueSummary>>, HttpError> {
    state.require_admin(&headers)?;
    let clues = server_api::list_clues(&state.api)
        .await
        .map_err(http_error)?;
    Ok(Json(clues))
}

async fn http_scan(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ScanRequest>,
) -> Result<Json<ScanResponse>, HttpError> {
    let team_id = req.team_id;
    let response = match server_api::scan(&state.api, req).await {
        Ok(response) => response,
        Err(err) => {
            // A failed history append can follow a committed advance.
            if err.code == ErrorCode::Unavailable {
                if let Ok(team) = server_api::get_team(&state.api, team_id).await {
                    state.publish(ServerEvent::TeamUpdated { team });
                }
            }
            return Err(http_error(err));
        }
    };
    state.publish(ServerEvent::ScanRecorded {
        team_id: response.team.team_id,
        outcome: response.kind.outcome(),
        clue_number: response.clue_number,
    });
    if response.success {
        state.publish(ServerEvent::TeamUpdated {
            team: response.team.clone(),
        });
    }
    Ok(Json(response))
}

async fn http_game_state(
    State(state): State<Arc<AppState>>,
) -> Result<Json<GameStateSnapshot>, HttpError> {
    let game = server_api::game_state(&state.api)
        .await
        .map_err(http_error)?;
    Ok(Json(game))
}

async fn http_start_game(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<GameStateSnapshot>, HttpError> {
    state.require_admin(&headers)?;
    let game = server_api::start_game(&state.api)
        .await
        .map_err(http_error)?;
    state.publish(ServerEvent::GameStateChanged { game: game.clone() });
    Ok(Json(game))
}

async fn http_stop_game(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<GameStateSnapshot>, HttpError> {
    state.require_admin(&headers)?;
    let game = server_api::stop_game(&state.api)
        .await
        .map_err(http_error)?;
    state.publish(ServerEvent::GameStateChanged { game: game.clone() });
    Ok(Json(game))
}

async fn http_admin_login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AdminLoginRequest>,
) -> Result<StatusCode, HttpError> {
    server_api::admin_login(&state.api, &req.password).map_err(http_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_admin_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<AdminStats>, HttpError> {
    state.require_admin(&headers)?;
    let stats = server_api::admin_stats(&state.api)
        .await
        .map_err(http_error)?;
    Ok(Json(stats))
}

async fn http_reset(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ResetResponse>, HttpError> {
    state.require_admin(&headers)?;
    let summary = server_api::reset_all(&state.api)
        .await
        .map_err(http_error)?;
    state.publish(ServerEvent::GameReset);
    Ok(Json(ResetResponse {
        teams_reset: summary.teams_reset,
        scans_cleared: summary.scans_cleared,
    }))
}

async fn http_scan_logs(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ScanLogQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<ScanLogEntry>>, HttpError> {
    state.require_admin(&headers)?;
    let logs = server_api::recent_scans(&state.api, q.limit.unwrap_or(DEFAULT_SCAN_LOG_LIMIT))
        .await
        .map_err(http_error)?;
    Ok(Json(logs))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket))
}

async fn ws_connection(state: Arc<AppState>, socket: axum::extract::ws::WebSocket) {
    use axum::extract::ws::Message;
    use futures::{SinkExt, StreamExt};

    let (mut sender, mut receiver) = socket.split();
    let mut events_rx = state.events.subscribe();

    let send_task = tokio::spawn(async move {
        loop {
            let event = match events_rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "dashboard socket lagged behind event feed");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            let text = match serde_json::to_string(&event) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(_msg)) = receiver.next().await {}

    send_task.abort();
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
