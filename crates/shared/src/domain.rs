use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(TeamId);
id_newtype!(ScanLogId);

/// Highest clue number a team can reach; reaching it finishes the hunt.
pub const MAX_PROGRESS: u8 = 10;
pub const MIN_TEAM_MEMBERS: u8 = 2;
pub const MAX_TEAM_MEMBERS: u8 = 4;
pub const DEFAULT_TEAM_MEMBERS: u8 = 3;

/// Outcome recorded in scan history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    Success,
    Fake,
    Wrong,
    AlreadyScanned,
}

impl ScanOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanOutcome::Success => "success",
            ScanOutcome::Fake => "fake",
            ScanOutcome::Wrong => "wrong",
            ScanOutcome::AlreadyScanned => "already_scanned",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "success" => Some(ScanOutcome::Success),
            "fake" => Some(ScanOutcome::Fake),
            "wrong" => Some(ScanOutcome::Wrong),
            "already_scanned" => Some(ScanOutcome::AlreadyScanned),
            _ => None,
        }
    }
}

/// Finer-grained classification shown to players. `WrongOrder` is logged as
/// [`ScanOutcome::Wrong`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanKind {
    Success,
    Fake,
    Wrong,
    WrongOrder,
    AlreadyScanned,
}

impl ScanKind {
    pub fn outcome(self) -> ScanOutcome {
        match self {
            ScanKind::Success => ScanOutcome::Success,
            ScanKind::Fake => ScanOutcome::Fake,
            ScanKind::Wrong | ScanKind::WrongOrder => ScanOutcome::Wrong,
            ScanKind::AlreadyScanned => ScanOutcome::AlreadyScanned,
        }
    }
}

/// What a printed QR payload resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CodeKind {
    Correct {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        clue_number: Option<u8>,
    },
    Decoy {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Code {
    pub value: String,
    #[serde(flatten)]
    pub kind: CodeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clue {
    pub clue_number: u8,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// Full team record, credential included. Never serialized to clients; see
/// [`crate::protocol::TeamSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    pub team_id: TeamId,
    pub name: String,
    pub credential: String,
    pub member_count: u8,
    pub progress: u8,
    pub points: u32,
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
    pub disqualified: bool,
}

impl Team {
    pub fn is_finished(&self) -> bool {
        self.progress >= MAX_PROGRESS
    }
}
