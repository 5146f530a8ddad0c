use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::domain::{Code, ScanLogId, ScanOutcome, Team, TeamId};

mod adjudicator;
mod leaderboard;

pub use adjudicator::{
    adjudicate_scan, classify_scan, legacy_clue_number, ScanDecision, ScanError, ScanPolicy,
    ScanVerdict,
};
pub use leaderboard::rank_leaderboard;

/// Points awarded for every clue solved in order. Not configurable per clue.
pub const POINTS_PER_CLUE: u32 = 2;

/// Field changes applied by a single successful advance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressAdvance {
    pub new_progress: u8,
    pub points_delta: u32,
    /// Written only when the stored start time is still empty.
    pub start_time: DateTime<Utc>,
    pub finish_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScanRecord {
    pub team_id: TeamId,
    pub value: String,
    pub outcome: ScanOutcome,
    pub clue_number: Option<u8>,
    pub scanned_at: DateTime<Utc>,
}

#[async_trait]
pub trait TeamStore: Send + Sync {
    async fn load_team(&self, team_id: TeamId) -> Result<Option<Team>>;

    /// Applies `advance` only if the team's progress still equals
    /// `expected_progress`. Returns the updated team, or `None` when the guard
    /// failed because another scan got there first.
    async fn advance_progress(
        &self,
        team_id: TeamId,
        expected_progress: u8,
        advance: &ProgressAdvance,
    ) -> Result<Option<Team>>;
}

#[async_trait]
pub trait CodeCatalog: Send + Sync {
    async fn lookup_code(&self, value: &str) -> Result<Option<Code>>;
}

#[async_trait]
pub trait ScanHistorySink: Send + Sync {
    async fn record_scan(&self, record: &NewScanRecord) -> Result<ScanLogId>;
}

#[cfg(test)]
#[path = "tests/fake_store.rs"]
mod fake_store;
