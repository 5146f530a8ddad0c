use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::domain::{Code, CodeKind, ScanLogId, Team, TeamId};
use tokio::sync::{Barrier, Mutex};

use crate::{CodeCatalog, NewScanRecord, ProgressAdvance, ScanHistorySink, TeamStore};

pub(crate) struct FakeStore {
    pub teams: Mutex<HashMap<TeamId, Team>>,
    pub codes: HashMap<String, Code>,
    pub history: Mutex<Vec<NewScanRecord>>,
    pub fail_lookups: AtomicBool,
    pub fail_history: AtomicBool,
    /// When set, every `advance_progress` call waits here first so that
    /// concurrent scans all read the same progress before any of them writes.
    pub advance_gate: Option<Barrier>,
}

impl Default for FakeStore {
    fn default() -> Self {
        let mut codes = HashMap::new();
        for n in 1..=10u8 {
            let correct = format!("HUNT-CLUE-{n}-CORRECT");
            codes.insert(
                correct.clone(),
                Code {
                    value: correct,
                    kind: CodeKind::Correct {
                        clue_number: Some(n),
                    },
                },
            );
            let decoy = format!("HUNT-CLUE-{n}-FAKE-A");
            codes.insert(
                decoy.clone(),
                Code {
                    value: decoy,
                    kind: CodeKind::Decoy {
                        message: Some("IT IS NOT A CORRECT QR CODE".to_string()),
                    },
                },
            );
        }
        Self {
            teams: Mutex::new(HashMap::new()),
            codes,
            history: Mutex::new(Vec::new()),
            fail_lookups: AtomicBool::new(false),
            fail_history: AtomicBool::new(false),
            advance_gate: None,
        }
    }
}

impl FakeStore {
    pub fn with_gate(parties: usize) -> Self {
        Self {
            advance_gate: Some(Barrier::new(parties)),
            ..Self::default()
        }
    }

    pub fn insert_code(&mut self, code: Code) {
        self.codes.insert(code.value.clone(), code);
    }

    pub async fn insert_team(&self, team_id: i64, progress: u8, points: u32) -> TeamId {
        let id = TeamId(team_id);
        self.teams.lock().await.insert(
            id,
            Team {
                team_id: id,
                name: format!("team-{team_id}"),
                credential: "secret".to_string(),
                member_count: 3,
                progress,
                points,
                start_time: None,
                finish_time: None,
                disqualified: false,
            },
        );
        id
    }

    pub async fn team(&self, team_id: TeamId) -> Team {
        self.teams
            .lock()
            .await
            .get(&team_id)
            .cloned()
            .expect("team exists")
    }
}

#[async_trait]
impl TeamStore for FakeStore {
    async fn load_team(&self, team_id: TeamId) -> Result<Option<Team>> {
        Ok(self.teams.lock().await.get(&team_id).cloned())
    }

    async fn advance_progress(
        &self,
        team_id: TeamId,
        expected_progress: u8,
        advance: &ProgressAdvance,
    ) -> Result<Option<Team>> {
        if let Some(gate) = &self.advance_gate {
            gate.wait().await;
        }
        let mut teams = self.teams.lock().await;
        let Some(team) = teams.get_mut(&team_id) else {
            return Ok(None);
        };
        if team.progress != expected_progress {
            return Ok(None);
        }
        team.progress = advance.new_progress;
        team.points += advance.points_delta;
        team.start_time.get_or_insert(advance.start_time);
        if advance.finish_time.is_some() {
            team.finish_time = advance.finish_time;
        }
        Ok(Some(team.clone()))
    }
}

#[async_trait]
impl CodeCatalog for FakeStore {
    async fn lookup_code(&self, value: &str) -> Result<Option<Code>> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(anyhow!("catalog offline"));
        }
        Ok(self.codes.get(value).cloned())
    }
}

#[async_trait]
impl ScanHistorySink for FakeStore {
    async fn record_scan(&self, record: &NewScanRecord) -> Result<ScanLogId> {
        if self.fail_history.load(Ordering::SeqCst) {
            return Err(anyhow!("history offline"));
        }
        let mut history = self.history.lock().await;
        history.push(record.clone());
        Ok(ScanLogId(history.len() as i64))
    }
}
