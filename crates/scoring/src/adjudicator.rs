use chrono::{DateTime, Utc};
use shared::{
    domain::{Code, CodeKind, ScanKind, Team, TeamId, MAX_PROGRESS},
    protocol::{GameStateSnapshot, ScanResponse, TeamSnapshot},
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    CodeCatalog, NewScanRecord, ProgressAdvance, ScanHistorySink, TeamStore, POINTS_PER_CLUE,
};

const NOT_THE_RIGHT_CODE: &str = "This is not the right QR. Scan another QR code!";
const ALREADY_SOLVED: &str = "You already solved this clue! Scan another QR code.";
const ALREADY_PROCESSED: &str = "Already processed! Move to the next clue.";
const HUNT_COMPLETE: &str = "ALL 10 CLUES SOLVED! You cracked the case!";

/// Whether scans are accepted while the game clock is stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanPolicy {
    pub require_running_game: bool,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            require_running_game: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("team not found")]
    NotFound,
    #[error("team is disqualified")]
    Forbidden,
    #[error("the game is not running")]
    GameNotRunning,
    #[error("storage unavailable: {0}")]
    Transient(anyhow::Error),
}

/// Result of the pure decision step, before any write happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanDecision {
    Reject {
        kind: ScanKind,
        clue_number: Option<u8>,
        message: String,
    },
    Advance {
        clue_number: u8,
    },
}

#[derive(Debug, Clone)]
pub struct ScanVerdict {
    pub kind: ScanKind,
    pub message: String,
    pub clue_number: Option<u8>,
    pub team: Team,
}

impl ScanVerdict {
    pub fn into_response(self) -> ScanResponse {
        ScanResponse {
            success: self.kind == ScanKind::Success,
            kind: self.kind,
            message: self.message,
            clue_number: self.clue_number,
            team: TeamSnapshot::from(self.team),
        }
    }
}

/// Recovers the clue number from payloads shaped like `HUNT-CLUE-7-CORRECT`
/// for correct codes stored without an explicit binding.
pub fn legacy_clue_number(value: &str) -> Option<u8> {
    let upper = value.trim().to_ascii_uppercase();
    let head = upper.strip_suffix("-CORRECT")?;
    let (prefix, digits) = head.rsplit_once('-')?;
    if prefix.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Classifies a scan against the team state read at decision time.
///
/// Evaluation order matters: unknown value, then decoy, then a correct code
/// that was already solved, then a correct code scanned out of order. Only a
/// correct code for exactly `progress + 1` yields [`ScanDecision::Advance`].
pub fn classify_scan(team: &Team, code: Option<&Code>, value: &str) -> ScanDecision {
    let Some(code) = code else {
        return ScanDecision::Reject {
            kind: ScanKind::Wrong,
            clue_number: None,
            message: NOT_THE_RIGHT_CODE.to_string(),
        };
    };

    let bound = match &code.kind {
        CodeKind::Decoy { message } => {
            return ScanDecision::Reject {
                kind: ScanKind::Fake,
                clue_number: None,
                message: message
                    .as_deref()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or(NOT_THE_RIGHT_CODE)
                    .to_string(),
            };
        }
        CodeKind::Correct { clue_number } => clue_number.or_else(|| legacy_clue_number(value)),
    };

    let expected = team.progress.saturating_add(1);
    match bound {
        Some(n) if n <= team.progress => ScanDecision::Reject {
            kind: ScanKind::AlreadyScanned,
            clue_number: Some(n),
            message: ALREADY_SOLVED.to_string(),
        },
        Some(n) if n == expected && n <= MAX_PROGRESS => ScanDecision::Advance { clue_number: n },
        other => ScanDecision::Reject {
            kind: ScanKind::WrongOrder,
            clue_number: other,
            message: if team.is_finished() {
                "You already cracked the case! No more clues to find.".to_string()
            } else {
                format!("Wrong order! Find clue {expected} first. Scan another QR code!")
            },
        },
    }
}

/// Adjudicates one scan event and applies at most one progress transition.
///
/// Exactly one history record is appended for every decided outcome, after
/// the outcome (and any transition) is settled. Disqualified teams and
/// rejected game-state checks write nothing.
pub async fn adjudicate_scan<S>(
    store: &S,
    policy: &ScanPolicy,
    game: &GameStateSnapshot,
    team_id: TeamId,
    raw_value: &str,
    now: DateTime<Utc>,
) -> Result<ScanVerdict, ScanError>
where
    S: TeamStore + CodeCatalog + ScanHistorySink + ?Sized,
{
    let team = store
        .load_team(team_id)
        .await
        .map_err(ScanError::Transient)?
        .ok_or(ScanError::NotFound)?;
    if team.disqualified {
        return Err(ScanError::Forbidden);
    }
    if policy.require_running_game && !game.is_running {
        return Err(ScanError::GameNotRunning);
    }

    let value = raw_value.trim();
    let code = if value.is_empty() {
        None
    } else {
        store.lookup_code(value).await.map_err(ScanError::Transient)?
    };

    let verdict = match classify_scan(&team, code.as_ref(), value) {
        ScanDecision::Reject {
            kind,
            clue_number,
            message,
        } => ScanVerdict {
            kind,
            message,
            clue_number,
            team,
        },
        ScanDecision::Advance { clue_number } => advance(store, team, clue_number, now).await?,
    };

    store
        .record_scan(&NewScanRecord {
            team_id,
            value: value.to_string(),
            outcome: verdict.kind.outcome(),
            clue_number: verdict.clue_number,
            scanned_at: now,
        })
        .await
        .map_err(|error| {
            warn!(team_id = team_id.0, %error, "failed to append scan history");
            ScanError::Transient(error)
        })?;

    info!(
        team_id = team_id.0,
        outcome = verdict.kind.outcome().as_str(),
        clue_number = ?verdict.clue_number,
        progress = verdict.team.progress,
        points = verdict.team.points,
        "scan adjudicated"
    );
    Ok(verdict)
}

async fn advance<S>(
    store: &S,
    team: Team,
    clue_number: u8,
    now: DateTime<Utc>,
) -> Result<ScanVerdict, ScanError>
where
    S: TeamStore + ?Sized,
{
    let finished = clue_number >= MAX_PROGRESS;
    let transition = ProgressAdvance {
        new_progress: clue_number,
        points_delta: POINTS_PER_CLUE,
        start_time: team.start_time.unwrap_or(now),
        finish_time: finished.then_some(now),
    };

    let updated = store
        .advance_progress(team.team_id, team.progress, &transition)
        .await
        .map_err(ScanError::Transient)?;

    match updated {
        Some(updated) => Ok(ScanVerdict {
            kind: ScanKind::Success,
            message: if finished {
                HUNT_COMPLETE.to_string()
            } else {
                format!("Clue {clue_number} solved! You earned +{POINTS_PER_CLUE} points!")
            },
            clue_number: Some(clue_number),
            team: updated,
        }),
        None => {
            debug!(
                team_id = team.team_id.0,
                expected_progress = team.progress,
                "progress guard lost to a concurrent scan"
            );
            // Falls back to the pre-decision snapshot if the refresh fails.
            let current = match store.load_team(team.team_id).await {
                Ok(Some(current)) => current,
                Ok(None) => team,
                Err(error) => {
                    warn!(team_id = team.team_id.0, %error, "failed to refresh team after lost race");
                    team
                }
            };
            Ok(ScanVerdict {
                kind: ScanKind::AlreadyScanned,
                message: ALREADY_PROCESSED.to_string(),
                clue_number: Some(clue_number),
                team: current,
            })
        }
    }
}

#[cfg(test)]
#[path = "tests/adjudicator_tests.rs"]
mod tests;
