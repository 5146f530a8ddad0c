use crate::{
    domain::{Code, CodeKind, ScanKind, ScanOutcome, Team, TeamId},
    error::{ApiError, ApiException, ErrorCode},
    protocol::{GameStateSnapshot, ServerEvent, TeamSnapshot},
};
use chrono::{TimeZone, Utc};

fn team() -> Team {
    Team {
        team_id: TeamId(7),
        name: "Shadow Seekers".to_string(),
        credential: "shadow1".to_string(),
        member_count: 3,
        progress: 4,
        points: 8,
        start_time: None,
        finish_time: None,
        disqualified: false,
    }
}

#[test]
fn decoy_code_serializes_with_kind_tag() {
    let code = Code {
        value: "HUNT-CLUE-1-FAKE-A".to_string(),
        kind: CodeKind::Decoy {
            message: Some("nope".to_string()),
        },
    };
    let json = serde_json::to_value(&code).expect("json");
    assert_eq!(json["kind"], "decoy");
    assert_eq!(json["message"], "nope");
    assert!(json.get("clue_number").is_none());

    let back: Code = serde_json::from_value(json).expect("decode");
    assert_eq!(back, code);
}

#[test]
fn wrong_order_is_logged_as_wrong() {
    assert_eq!(ScanKind::WrongOrder.outcome(), ScanOutcome::Wrong);
    assert_eq!(ScanKind::AlreadyScanned.outcome(), ScanOutcome::AlreadyScanned);
}

#[test]
fn outcome_text_is_stable() {
    for outcome in [
        ScanOutcome::Success,
        ScanOutcome::Fake,
        ScanOutcome::Wrong,
        ScanOutcome::AlreadyScanned,
    ] {
        assert_eq!(ScanOutcome::parse(outcome.as_str()), Some(outcome));
    }
    assert_eq!(ScanOutcome::parse("bogus"), None);
}

#[test]
fn snapshot_never_carries_the_credential() {
    let json = serde_json::to_string(&TeamSnapshot::from(&team())).expect("json");
    assert!(!json.contains("shadow1"));
    assert!(json.contains("Shadow Seekers"));
}

#[test]
fn elapsed_requires_both_timestamps() {
    let mut t = TeamSnapshot::from(team());
    assert!(t.elapsed().is_none());
    t.start_time = Some(Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap());
    assert!(t.elapsed().is_none());
    t.finish_time = Some(Utc.with_ymd_and_hms(2026, 3, 1, 10, 5, 0).unwrap());
    assert_eq!(t.elapsed(), Some(chrono::Duration::minutes(5)));
}

#[test]
fn server_events_use_type_and_payload_tags() {
    let event = ServerEvent::GameStateChanged {
        game: GameStateSnapshot {
            is_running: true,
            ..GameStateSnapshot::default()
        },
    };
    let json = serde_json::to_value(&event).expect("json");
    assert_eq!(json["type"], "game_state_changed");
    assert_eq!(json["payload"]["game"]["is_running"], true);

    let reset = serde_json::to_value(ServerEvent::GameReset).expect("json");
    assert_eq!(reset["type"], "game_reset");
}

#[test]
fn api_exception_keeps_code_and_message() {
    let err = ApiError::new(ErrorCode::Unavailable, "storage unavailable, please retry");
    let exception = ApiException::from(err);
    assert_eq!(exception.code, ErrorCode::Unavailable);
    assert!(exception.to_string().contains("please retry"));

    let back = ApiError::from(exception);
    assert_eq!(back.code, ErrorCode::Unavailable);
}
