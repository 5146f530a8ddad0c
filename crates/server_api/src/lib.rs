use chrono::Utc;
use scoring::{adjudicate_scan, rank_leaderboard, ScanError, ScanPolicy, TeamStore};
use shared::{
    domain::{TeamId, DEFAULT_TEAM_MEMBERS, MAX_TEAM_MEMBERS, MIN_TEAM_MEMBERS},
    error::{ApiError, ErrorCode},
    protocol::{
        AdminStats, ClueSummary, GameStateSnapshot, RegisterTeamRequest, ScanLogEntry,
        ScanRequest, ScanResponse, TeamLoginRequest, TeamSnapshot,
    },
};
use storage::{ResetSummary, Storage, StorageError};
use tracing::{info, warn};

const MIN_NAME_LEN: usize = 2;
const MIN_PASSWORD_LEN: usize = 3;
const MAX_SCAN_LOG_LIMIT: u32 = 500;
const STORAGE_UNAVAILABLE: &str = "storage unavailable, please retry";

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub scan_policy: ScanPolicy,
    pub admin_password: String,
}

pub async fn register_team(
    ctx: &ApiContext,
    request: RegisterTeamRequest,
) -> Result<TeamSnapshot, ApiError> {
    let name = request.name.trim();
    if name.chars().count() < MIN_NAME_LEN {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "team name must be at least 2 characters",
        ));
    }
    let password = request.password.trim();
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "password must be at least 3 characters",
        ));
    }
    let member_count = request.member_count.unwrap_or(DEFAULT_TEAM_MEMBERS);
    if !(MIN_TEAM_MEMBERS..=MAX_TEAM_MEMBERS).contains(&member_count) {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!("teams have between {MIN_TEAM_MEMBERS} and {MAX_TEAM_MEMBERS} members"),
        ));
    }

    let team_id = ctx
        .storage
        .create_team(name, password, member_count)
        .await
        .map_err(|err| match err {
            StorageError::DuplicateTeamName(_) => {
                ApiError::new(ErrorCode::Conflict, err.to_string())
            }
            StorageError::Database(db) => internal(db.into()),
        })?;
    info!(team_id = team_id.0, name, member_count, "team registered");
    get_team(ctx, team_id).await
}

pub async fn login_team(
    ctx: &ApiContext,
    request: TeamLoginRequest,
) -> Result<TeamSnapshot, ApiError> {
    let team = ctx
        .storage
        .find_team_by_credentials(request.name.trim(), request.password.trim())
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::new(ErrorCode::Unauthorized, "invalid team name or password"))?;
    if team.disqualified {
        return Err(ApiError::new(ErrorCode::Forbidden, "team is disqualified"));
    }
    Ok(TeamSnapshot::from(team))
}

pub async fn get_team(ctx: &ApiContext, team_id: TeamId) -> Result<TeamSnapshot, ApiError> {
    ctx.storage
        .load_team(team_id)
        .await
        .map_err(internal)?
        .map(TeamSnapshot::from)
        .ok_or_else(team_not_found)
}

pub async fn list_teams(ctx: &ApiContext) -> Result<Vec<TeamSnapshot>, ApiError> {
    let teams = ctx.storage.list_teams().await.map_err(internal)?;
    Ok(teams.into_iter().map(TeamSnapshot::from).collect())
}

pub async fn leaderboard(ctx: &ApiContext) -> Result<Vec<TeamSnapshot>, ApiError> {
    Ok(rank_leaderboard(list_teams(ctx).await?))
}

pub async fn list_clues(ctx: &ApiContext) -> Result<Vec<ClueSummary>, ApiError> {
    let clues = ctx.storage.list_clues().await.map_err(internal)?;
    Ok(clues.into_iter().map(ClueSummary::from).collect())
}

/// The clue a team should be hunting next: clue N once clue N was solved.
/// Returns `None` once the hunt is complete.
pub async fn current_clue(
    ctx: &ApiContext,
    team_id: TeamId,
) -> Result<Option<ClueSummary>, ApiError> {
    let team = ctx
        .storage
        .load_team(team_id)
        .await
        .map_err(internal)?
        .ok_or_else(team_not_found)?;
    if team.disqualified {
        return Err(ApiError::new(ErrorCode::Forbidden, "team is disqualified"));
    }
    let game = game_state(ctx).await?;
    if !game.is_running {
        return Err(ApiError::new(
            ErrorCode::Forbidden,
            "the game has not started yet",
        ));
    }
    if team.is_finished() {
        return Ok(None);
    }
    let clue = ctx.storage.clue(team.progress).await.map_err(internal)?;
    Ok(clue.map(ClueSummary::from))
}

pub async fn scan(ctx: &ApiContext, request: ScanRequest) -> Result<ScanResponse, ApiError> {
    let game = game_state(ctx).await?;
    let verdict = adjudicate_scan(
        &ctx.storage,
        &ctx.scan_policy,
        &game,
        request.team_id,
        &request.value,
        Utc::now(),
    )
    .await
    .map_err(scan_error)?;
    Ok(verdict.into_response())
}

pub async fn game_state(ctx: &ApiContext) -> Result<GameStateSnapshot, ApiError> {
    ctx.storage.game_state().await.map_err(internal)
}

pub async fn start_game(ctx: &ApiContext) -> Result<GameStateSnapshot, ApiError> {
    let game = ctx.storage.start_game(Utc::now()).await.map_err(internal)?;
    info!("game started");
    Ok(game)
}

pub async fn stop_game(ctx: &ApiContext) -> Result<GameStateSnapshot, ApiError> {
    let game = ctx.storage.stop_game(Utc::now()).await.map_err(internal)?;
    info!("game stopped");
    Ok(game)
}

pub fn admin_login(ctx: &ApiContext, password: &str) -> Result<(), ApiError> {
    authorize_admin(ctx, Some(password))
}

/// Checks a caller-supplied admin password. A missing password is rejected
/// the same way as a wrong one.
pub fn authorize_admin(ctx: &ApiContext, supplied: Option<&str>) -> Result<(), ApiError> {
    match supplied {
        Some(password) if !ctx.admin_password.is_empty() && password == ctx.admin_password => {
            Ok(())
        }
        _ => {
            warn!("admin authorization rejected");
            Err(ApiError::new(ErrorCode::Unauthorized, "invalid admin password"))
        }
    }
}

pub async fn admin_stats(ctx: &ApiContext) -> Result<AdminStats, ApiError> {
    ctx.storage.admin_stats().await.map_err(internal)
}

pub async fn set_disqualified(
    ctx: &ApiContext,
    team_id: TeamId,
    disqualified: bool,
) -> Result<TeamSnapshot, ApiError> {
    let team = ctx
        .storage
        .set_disqualified(team_id, disqualified)
        .await
        .map_err(internal)?
        .ok_or_else(team_not_found)?;
    info!(team_id = team_id.0, disqualified, "team status changed");
    Ok(TeamSnapshot::from(team))
}

pub async fn delete_team(ctx: &ApiContext, team_id: TeamId) -> Result<(), ApiError> {
    if !ctx.storage.delete_team(team_id).await.map_err(internal)? {
        return Err(team_not_found());
    }
    info!(team_id = team_id.0, "team deleted");
    Ok(())
}

pub async fn recent_scans(ctx: &ApiContext, limit: u32) -> Result<Vec<ScanLogEntry>, ApiError> {
    let scans = ctx
        .storage
        .list_recent_scans(limit.clamp(1, MAX_SCAN_LOG_LIMIT))
        .await
        .map_err(internal)?;
    Ok(scans
        .into_iter()
        .map(|scan| ScanLogEntry {
            scan_id: scan.scan_id,
            team_id: scan.team_id,
            team_name: scan.team_name,
            value: scan.value,
            outcome: scan.outcome,
            clue_number: scan.clue_number,
            scanned_at: scan.scanned_at,
        })
        .collect())
}

pub async fn reset_all(ctx: &ApiContext) -> Result<ResetSummary, ApiError> {
    ctx.storage.reset_all().await.map_err(internal)
}

fn scan_error(err: ScanError) -> ApiError {
    match err {
        ScanError::NotFound => team_not_found(),
        ScanError::Forbidden => ApiError::new(ErrorCode::Forbidden, "team is disqualified"),
        ScanError::GameNotRunning => {
            ApiError::new(ErrorCode::Forbidden, "the game is not running")
        }
        ScanError::Transient(err) => internal(err),
    }
}

fn team_not_found() -> ApiError {
    ApiError::new(ErrorCode::NotFound, "team not found")
}

fn internal(err: anyhow::Error) -> ApiError {
    warn!(error = %err, "storage request failed");
    ApiError::new(ErrorCode::Unavailable, STORAGE_UNAVAILABLE)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
