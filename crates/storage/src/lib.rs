use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scoring::{CodeCatalog, NewScanRecord, ProgressAdvance, ScanHistorySink, TeamStore};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;
use tracing::info;

use shared::{
    domain::{Clue, Code, CodeKind, ScanLogId, ScanOutcome, Team, TeamId, MAX_PROGRESS},
    protocol::{AdminStats, GameStateSnapshot},
};

mod seed;

pub use seed::{default_clues, default_codes, sample_teams, SampleTeam};

const TEAM_COLUMNS: &str =
    "id, name, credential, member_count, progress, points, start_time, finish_time, disqualified";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("team name '{0}' is already taken")]
    DuplicateTeamName(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct StoredScan {
    pub scan_id: ScanLogId,
    pub team_id: TeamId,
    pub team_name: Option<String>,
    pub value: String,
    pub outcome: ScanOutcome,
    pub clue_number: Option<u8>,
    pub scanned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetSummary {
    pub teams_reset: u64,
    pub scans_cleared: u64,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_team(
        &self,
        name: &str,
        credential: &str,
        member_count: u8,
    ) -> Result<TeamId, StorageError> {
        let rec = sqlx::query(
            "INSERT INTO teams (name, credential, member_count) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(name)
        .bind(credential)
        .bind(member_count)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StorageError::DuplicateTeamName(name.to_string())
            }
            other => StorageError::Database(other),
        })?;
        Ok(TeamId(rec.get::<i64, _>(0)))
    }

    /// Upserts by name, keeping game progress of an existing team.
    pub async fn upsert_team(
        &self,
        name: &str,
        credential: &str,
        member_count: u8,
    ) -> Result<TeamId> {
        let rec = sqlx::query(
            "INSERT INTO teams (name, credential, member_count) VALUES (?, ?, ?)
             ON CONFLICT(name) DO UPDATE SET credential=excluded.credential, member_count=excluded.member_count
             RETURNING id",
        )
        .bind(name)
        .bind(credential)
        .bind(member_count)
        .fetch_one(&self.pool)
        .await?;
        Ok(TeamId(rec.get::<i64, _>(0)))
    }

    pub async fn find_team_by_credentials(
        &self,
        name: &str,
        credential: &str,
    ) -> Result<Option<Team>> {
        let row = sqlx::query(&format!(
            "SELECT {TEAM_COLUMNS} FROM teams WHERE name = ? AND credential = ?"
        ))
        .bind(name)
        .bind(credential)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(team_from_row).transpose()
    }

    pub async fn list_teams(&self) -> Result<Vec<Team>> {
        let rows = sqlx::query(&format!(
            "SELECT {TEAM_COLUMNS} FROM teams ORDER BY points DESC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(team_from_row).collect()
    }

    pub async fn set_disqualified(
        &self,
        team_id: TeamId,
        disqualified: bool,
    ) -> Result<Option<Team>> {
        let row = sqlx::query(&format!(
            "UPDATE teams SET disqualified = ? WHERE id = ? RETURNING {TEAM_COLUMNS}"
        ))
        .bind(disqualified)
        .bind(team_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(team_from_row).transpose()
    }

    /// Removes the team and its scan history. Returns false if it did not exist.
    pub async fn delete_team(&self, team_id: TeamId) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM scan_logs WHERE team_id = ?")
            .bind(team_id.0)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM teams WHERE id = ?")
            .bind(team_id.0)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(deleted > 0)
    }

    pub async fn upsert_clue(&self, clue: &Clue) -> Result<()> {
        sqlx::query(
            "INSERT INTO clues (clue_number, clue_text, hint) VALUES (?, ?, ?)
             ON CONFLICT(clue_number) DO UPDATE SET clue_text=excluded.clue_text, hint=excluded.hint",
        )
        .bind(clue.clue_number)
        .bind(&clue.text)
        .bind(clue.hint.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_clues(&self) -> Result<Vec<Clue>> {
        let rows = sqlx::query("SELECT clue_number, clue_text, hint FROM clues ORDER BY clue_number")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(clue_from_row).collect())
    }

    pub async fn clue(&self, clue_number: u8) -> Result<Option<Clue>> {
        let row = sqlx::query("SELECT clue_number, clue_text, hint FROM clues WHERE clue_number = ?")
            .bind(clue_number)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(clue_from_row))
    }

    pub async fn upsert_code(&self, code: &Code) -> Result<()> {
        let (kind, clue_number, decoy_message) = match &code.kind {
            CodeKind::Correct { clue_number } => ("correct", *clue_number, None),
            CodeKind::Decoy { message } => ("decoy", None, message.as_deref()),
        };
        sqlx::query(
            "INSERT INTO codes (value, kind, clue_number, decoy_message) VALUES (?, ?, ?, ?)
             ON CONFLICT(value) DO UPDATE SET kind=excluded.kind, clue_number=excluded.clue_number, decoy_message=excluded.decoy_message",
        )
        .bind(&code.value)
        .bind(kind)
        .bind(clue_number)
        .bind(decoy_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_codes(&self) -> Result<Vec<Code>> {
        let rows = sqlx::query(
            "SELECT value, kind, clue_number, decoy_message FROM codes ORDER BY kind, value",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(code_from_row).collect()
    }

    /// Seeds clues 0..=10 and the printed code set. Safe to run repeatedly.
    pub async fn seed_default_catalog(&self) -> Result<(usize, usize)> {
        let clues = default_clues();
        for clue in &clues {
            self.upsert_clue(clue).await?;
        }
        let codes = default_codes();
        for code in &codes {
            self.upsert_code(code).await?;
        }
        info!(clues = clues.len(), codes = codes.len(), "catalog seeded");
        Ok((clues.len(), codes.len()))
    }

    pub async fn list_recent_scans(&self, limit: u32) -> Result<Vec<StoredScan>> {
        let rows = sqlx::query(
            "SELECT s.id, s.team_id, t.name, s.value, s.outcome, s.clue_number, s.scanned_at
             FROM scan_logs s
             LEFT JOIN teams t ON t.id = s.team_id
             ORDER BY s.id DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| -> Result<StoredScan> {
                let raw_outcome: String = r.try_get(4)?;
                let outcome = ScanOutcome::parse(&raw_outcome)
                    .ok_or_else(|| anyhow!("unknown scan outcome '{raw_outcome}'"))?;
                Ok(StoredScan {
                    scan_id: ScanLogId(r.try_get(0)?),
                    team_id: TeamId(r.try_get(1)?),
                    team_name: r.try_get(2)?,
                    value: r.try_get(3)?,
                    outcome,
                    clue_number: r.try_get(5)?,
                    scanned_at: r.try_get(6)?,
                })
            })
            .collect()
    }

    pub async fn count_scans(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scan_logs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    pub async fn admin_stats(&self) -> Result<AdminStats> {
        let row = sqlx::query(
            "SELECT COUNT(*), COALESCE(SUM(member_count), 0), COALESCE(SUM(progress >= ?), 0)
             FROM teams",
        )
        .bind(MAX_PROGRESS)
        .fetch_one(&self.pool)
        .await?;
        Ok(AdminStats {
            total_teams: row.get::<i64, _>(0).max(0) as u64,
            total_players: row.get::<i64, _>(1).max(0) as u64,
            scan_count: self.count_scans().await?,
            completed: row.get::<i64, _>(2).max(0) as u64,
        })
    }

    pub async fn game_state(&self) -> Result<GameStateSnapshot> {
        let row = sqlx::query("SELECT is_running, start_time, end_time FROM game_state WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(row
            .map(|r| GameStateSnapshot {
                is_running: r.get::<bool, _>(0),
                start_time: r.get::<Option<DateTime<Utc>>, _>(1),
                end_time: r.get::<Option<DateTime<Utc>>, _>(2),
            })
            .unwrap_or_default())
    }

    pub async fn start_game(&self, now: DateTime<Utc>) -> Result<GameStateSnapshot> {
        self.write_game_state(true, Some(now), None).await
    }

    /// Stops the clock, keeping the recorded start time.
    pub async fn stop_game(&self, now: DateTime<Utc>) -> Result<GameStateSnapshot> {
        let current = self.game_state().await?;
        self.write_game_state(false, current.start_time, Some(now))
            .await
    }

    async fn write_game_state(
        &self,
        is_running: bool,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<GameStateSnapshot> {
        sqlx::query(
            "INSERT INTO game_state (id, is_running, start_time, end_time, updated_at)
             VALUES (1, ?, ?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(id) DO UPDATE SET is_running=excluded.is_running, start_time=excluded.start_time,
                 end_time=excluded.end_time, updated_at=CURRENT_TIMESTAMP",
        )
        .bind(is_running)
        .bind(start_time)
        .bind(end_time)
        .execute(&self.pool)
        .await?;
        Ok(GameStateSnapshot {
            is_running,
            start_time,
            end_time,
        })
    }

    /// Stops the game, zeroes every team and clears all scan history.
    pub async fn reset_all(&self) -> Result<ResetSummary> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE game_state SET is_running = 0, start_time = NULL, end_time = NULL, updated_at = CURRENT_TIMESTAMP",
        )
        .execute(&mut *tx)
        .await?;
        let teams_reset = sqlx::query(
            "UPDATE teams SET progress = 0, points = 0, start_time = NULL, finish_time = NULL, disqualified = 0",
        )
        .execute(&mut *tx)
        .await?
        .rows_affected();
        let scans_cleared = sqlx::query("DELETE FROM scan_logs")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        info!(teams_reset, scans_cleared, "game reset");
        Ok(ResetSummary {
            teams_reset,
            scans_cleared,
        })
    }
}

fn team_from_row(r: &SqliteRow) -> Result<Team> {
    Ok(Team {
        team_id: TeamId(r.try_get("id")?),
        name: r.try_get("name")?,
        credential: r.try_get("credential")?,
        member_count: r.try_get("member_count")?,
        progress: r.try_get("progress")?,
        points: r.try_get("points")?,
        start_time: r.try_get("start_time")?,
        finish_time: r.try_get("finish_time")?,
        disqualified: r.try_get("disqualified")?,
    })
}

fn clue_from_row(r: &SqliteRow) -> Clue {
    Clue {
        clue_number: r.get::<u8, _>(0),
        text: r.get::<String, _>(1),
        hint: r
            .get::<Option<String>, _>(2)
            .filter(|hint| !hint.trim().is_empty()),
    }
}

fn code_from_row(r: &SqliteRow) -> Result<Code> {
    let kind = match r.try_get::<String, _>(1)?.as_str() {
        "correct" => CodeKind::Correct {
            clue_number: r.try_get(2)?,
        },
        "decoy" => CodeKind::Decoy {
            message: r.try_get(3)?,
        },
        other => return Err(anyhow!("unknown code kind '{other}'")),
    };
    Ok(Code {
        value: r.try_get(0)?,
        kind,
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[async_trait]
impl TeamStore for Storage {
    async fn load_team(&self, team_id: TeamId) -> Result<Option<Team>> {
        let row = sqlx::query(&format!("SELECT {TEAM_COLUMNS} FROM teams WHERE id = ?"))
            .bind(team_id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(team_from_row).transpose()
    }

    async fn advance_progress(
        &self,
        team_id: TeamId,
        expected_progress: u8,
        advance: &ProgressAdvance,
    ) -> Result<Option<Team>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE teams
            SET progress = ?1,
                points = points + ?2,
                start_time = COALESCE(start_time, ?3),
                finish_time = COALESCE(finish_time, ?4)
            WHERE id = ?5 AND progress = ?6
            RETURNING {TEAM_COLUMNS}
            "#
        ))
        .bind(advance.new_progress)
        .bind(advance.points_delta)
        .bind(advance.start_time)
        .bind(advance.finish_time)
        .bind(team_id.0)
        .bind(expected_progress)
        .fetch_optional(&self.pool)
        .await
        .context("conditional progress update failed")?;
        row.as_ref().map(team_from_row).transpose()
    }
}

#[async_trait]
impl CodeCatalog for Storage {
    async fn lookup_code(&self, value: &str) -> Result<Option<Code>> {
        let row = sqlx::query(
            "SELECT value, kind, clue_number, decoy_message FROM codes WHERE value = ?",
        )
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(code_from_row).transpose()
    }
}

#[async_trait]
impl ScanHistorySink for Storage {
    async fn record_scan(&self, record: &NewScanRecord) -> Result<ScanLogId> {
        let rec = sqlx::query(
            "INSERT INTO scan_logs (team_id, value, outcome, clue_number, scanned_at)
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(record.team_id.0)
        .bind(&record.value)
        .bind(record.outcome.as_str())
        .bind(record.clue_number)
        .bind(record.scanned_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(ScanLogId(rec.get::<i64, _>(0)))
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
