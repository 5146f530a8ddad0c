use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Clue, ScanKind, ScanLogId, ScanOutcome, Team, TeamId, MAX_PROGRESS};

/// Client-facing view of a team. Carries no credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSnapshot {
    pub team_id: TeamId,
    pub name: String,
    pub member_count: u8,
    pub progress: u8,
    pub points: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_time: Option<DateTime<Utc>>,
    pub disqualified: bool,
}

impl TeamSnapshot {
    pub fn is_finished(&self) -> bool {
        self.progress >= MAX_PROGRESS
    }

    /// Time between the first valid scan and completion, if both happened.
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        match (self.start_time, self.finish_time) {
            (Some(start), Some(finish)) => Some(finish - start),
            _ => None,
        }
    }
}

impl From<&Team> for TeamSnapshot {
    fn from(team: &Team) -> Self {
        Self {
            team_id: team.team_id,
            name: team.name.clone(),
            member_count: team.member_count,
            progress: team.progress,
            points: team.points,
            start_time: team.start_time,
            finish_time: team.finish_time,
            disqualified: team.disqualified,
        }
    }
}

impl From<Team> for TeamSnapshot {
    fn from(team: Team) -> Self {
        Self {
            team_id: team.team_id,
            name: team.name,
            member_count: team.member_count,
            progress: team.progress,
            points: team.points,
            start_time: team.start_time,
            finish_time: team.finish_time,
            disqualified: team.disqualified,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClueSummary {
    pub clue_number: u8,
    /// 1-based label shown to players, e.g. "Clue 3".
    pub label: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl From<Clue> for ClueSummary {
    fn from(clue: Clue) -> Self {
        Self {
            label: if clue.clue_number == 0 {
                "Start".to_string()
            } else {
                format!("Clue {}", clue.clue_number)
            },
            clue_number: clue.clue_number,
            text: clue.text,
            hint: clue.hint,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStateSnapshot {
    pub is_running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterTeamRequest {
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub member_count: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamLoginRequest {
    pub name: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRequest {
    pub team_id: TeamId,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResponse {
    pub success: bool,
    #[serde(rename = "type")]
    pub kind: ScanKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clue_number: Option<u8>,
    pub team: TeamSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanLogEntry {
    pub scan_id: ScanLogId,
    pub team_id: TeamId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
    pub value: String,
    pub outcome: ScanOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clue_number: Option<u8>,
    pub scanned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminStats {
    pub total_teams: u64,
    pub total_players: u64,
    pub scan_count: u64,
    pub completed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminLoginRequest {
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    TeamUpdated {
        team: TeamSnapshot,
    },
    TeamRemoved {
        team_id: TeamId,
    },
    ScanRecorded {
        team_id: TeamId,
        outcome: ScanOutcome,
        #[serde(default)]
        clue_number: Option<u8>,
    },
    GameStateChanged {
        game: GameStateSnapshot,
    },
    GameReset,
}
