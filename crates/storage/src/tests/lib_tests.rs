use super::*;
use chrono::TimeZone;

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 10, minute, 0).unwrap()
}

async fn seeded() -> (Storage, TeamId) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.seed_default_catalog().await.expect("seed");
    let team = storage
        .create_team("Shadow Seekers", "shadow1", 3)
        .await
        .expect("team");
    (storage, team)
}

fn advance_to(progress: u8, now: DateTime<Utc>) -> ProgressAdvance {
    ProgressAdvance {
        new_progress: progress,
        points_delta: scoring::POINTS_PER_CLUE,
        start_time: now,
        finish_time: (progress >= MAX_PROGRESS).then_some(now),
    }
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("hunt.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn new_team_starts_at_zero() {
    let (storage, team_id) = seeded().await;
    let team = storage
        .load_team(team_id)
        .await
        .expect("load")
        .expect("team");
    assert_eq!(team.name, "Shadow Seekers");
    assert_eq!(team.member_count, 3);
    assert_eq!((team.progress, team.points), (0, 0));
    assert!(team.start_time.is_none());
    assert!(team.finish_time.is_none());
    assert!(!team.disqualified);
}

#[tokio::test]
async fn duplicate_team_name_is_reported() {
    let (storage, _) = seeded().await;
    let err = storage
        .create_team("Shadow Seekers", "other", 2)
        .await
        .expect_err("duplicate");
    assert!(matches!(err, StorageError::DuplicateTeamName(name) if name == "Shadow Seekers"));
}

#[tokio::test]
async fn login_lookup_matches_name_and_credential() {
    let (storage, team_id) = seeded().await;
    let found = storage
        .find_team_by_credentials("Shadow Seekers", "shadow1")
        .await
        .expect("lookup")
        .expect("team");
    assert_eq!(found.team_id, team_id);

    let miss = storage
        .find_team_by_credentials("Shadow Seekers", "wrong")
        .await
        .expect("lookup");
    assert!(miss.is_none());
}

#[tokio::test]
async fn advance_applies_only_when_progress_matches() {
    let (storage, team_id) = seeded().await;

    let first = storage
        .advance_progress(team_id, 0, &advance_to(1, at(0)))
        .await
        .expect("cas")
        .expect("applied");
    assert_eq!((first.progress, first.points), (1, 2));
    assert_eq!(first.start_time, Some(at(0)));

    let stale = storage
        .advance_progress(team_id, 0, &advance_to(1, at(1)))
        .await
        .expect("cas");
    assert!(stale.is_none());

    let second = storage
        .advance_progress(team_id, 1, &advance_to(2, at(5)))
        .await
        .expect("cas")
        .expect("applied");
    assert_eq!((second.progress, second.points), (2, 4));
    assert_eq!(second.start_time, Some(at(0)), "start time is set once");
}

#[tokio::test]
async fn finishing_advance_records_finish_time() {
    let (storage, team_id) = seeded().await;
    for step in 0..MAX_PROGRESS {
        storage
            .advance_progress(team_id, step, &advance_to(step + 1, at(u32::from(step))))
            .await
            .expect("cas")
            .expect("applied");
    }
    let team = storage
        .load_team(team_id)
        .await
        .expect("load")
        .expect("team");
    assert_eq!(team.progress, MAX_PROGRESS);
    assert_eq!(team.points, 20);
    assert_eq!(team.finish_time, Some(at(9)));
}

#[tokio::test]
async fn seeded_catalog_resolves_correct_and_decoy_codes() {
    let (storage, _) = seeded().await;

    let correct = storage
        .lookup_code("HUNT-CLUE-3-CORRECT")
        .await
        .expect("lookup")
        .expect("code");
    assert_eq!(
        correct.kind,
        CodeKind::Correct {
            clue_number: Some(3)
        }
    );

    let decoy = storage
        .lookup_code("HUNT-CLUE-3-FAKE-B")
        .await
        .expect("lookup")
        .expect("code");
    assert!(matches!(decoy.kind, CodeKind::Decoy { message: Some(_) }));

    assert!(storage
        .lookup_code("HUNT-CLUE-11-CORRECT")
        .await
        .expect("lookup")
        .is_none());
}

#[tokio::test]
async fn seeding_twice_keeps_one_copy() {
    let (storage, _) = seeded().await;
    let counts = storage.seed_default_catalog().await.expect("reseed");
    assert_eq!(counts, (11, 40));
    assert_eq!(storage.list_clues().await.expect("clues").len(), 11);
    assert_eq!(storage.list_codes().await.expect("codes").len(), 40);

    let first = storage.clue(0).await.expect("clue").expect("clue 0");
    assert!(first.text.starts_with("Welcome"));
}

#[tokio::test]
async fn recent_scans_are_newest_first_with_team_name() {
    let (storage, team_id) = seeded().await;
    for (minute, outcome) in [(0, ScanOutcome::Wrong), (1, ScanOutcome::Success)] {
        storage
            .record_scan(&NewScanRecord {
                team_id,
                value: format!("scan-{minute}"),
                outcome,
                clue_number: (outcome == ScanOutcome::Success).then_some(1),
                scanned_at: at(minute),
            })
            .await
            .expect("record");
    }

    let scans = storage.list_recent_scans(10).await.expect("scans");
    assert_eq!(scans.len(), 2);
    assert_eq!(scans[0].outcome, ScanOutcome::Success);
    assert_eq!(scans[0].clue_number, Some(1));
    assert_eq!(scans[0].team_name.as_deref(), Some("Shadow Seekers"));
    assert_eq!(scans[1].scanned_at, at(0));

    let limited = storage.list_recent_scans(1).await.expect("scans");
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn deleting_a_team_removes_its_history() {
    let (storage, team_id) = seeded().await;
    storage
        .record_scan(&NewScanRecord {
            team_id,
            value: "HUNT-CLUE-1-FAKE-A".to_string(),
            outcome: ScanOutcome::Fake,
            clue_number: None,
            scanned_at: at(0),
        })
        .await
        .expect("record");

    assert!(storage.delete_team(team_id).await.expect("delete"));
    assert!(!storage.delete_team(team_id).await.expect("delete again"));
    assert_eq!(storage.count_scans().await.expect("count"), 0);
}

#[tokio::test]
async fn disqualify_and_restore_round_trip() {
    let (storage, team_id) = seeded().await;
    let team = storage
        .set_disqualified(team_id, true)
        .await
        .expect("update")
        .expect("team");
    assert!(team.disqualified);
    let team = storage
        .set_disqualified(team_id, false)
        .await
        .expect("update")
        .expect("team");
    assert!(!team.disqualified);

    assert!(storage
        .set_disqualified(TeamId(9999), true)
        .await
        .expect("update")
        .is_none());
}

#[tokio::test]
async fn game_state_starts_and_stops() {
    let (storage, _) = seeded().await;
    assert_eq!(
        storage.game_state().await.expect("state"),
        GameStateSnapshot::default()
    );

    storage.start_game(at(0)).await.expect("start");
    let running = storage.game_state().await.expect("state");
    assert!(running.is_running);
    assert_eq!(running.start_time, Some(at(0)));

    storage.stop_game(at(50)).await.expect("stop");
    let stopped = storage.game_state().await.expect("state");
    assert!(!stopped.is_running);
    assert_eq!(stopped.start_time, Some(at(0)));
    assert_eq!(stopped.end_time, Some(at(50)));
}

#[tokio::test]
async fn reset_is_idempotent() {
    let (storage, team_id) = seeded().await;
    let other = storage
        .create_team("Code Breakers", "code1", 4)
        .await
        .expect("team");
    storage.start_game(at(0)).await.expect("start");
    storage
        .advance_progress(team_id, 0, &advance_to(1, at(1)))
        .await
        .expect("cas");
    storage.set_disqualified(other, true).await.expect("dq");
    storage
        .record_scan(&NewScanRecord {
            team_id,
            value: "HUNT-CLUE-1-CORRECT".to_string(),
            outcome: ScanOutcome::Success,
            clue_number: Some(1),
            scanned_at: at(1),
        })
        .await
        .expect("record");

    let first = storage.reset_all().await.expect("reset");
    assert_eq!(first.teams_reset, 2);
    assert_eq!(first.scans_cleared, 1);

    for _ in 0..2 {
        let teams = storage.list_teams().await.expect("teams");
        assert!(teams.iter().all(|t| t.progress == 0
            && t.points == 0
            && t.start_time.is_none()
            && t.finish_time.is_none()
            && !t.disqualified));
        assert_eq!(storage.count_scans().await.expect("count"), 0);
        assert_eq!(
            storage.game_state().await.expect("state"),
            GameStateSnapshot::default()
        );
        storage.reset_all().await.expect("reset again");
    }
}

#[tokio::test]
async fn admin_stats_count_players_and_finishers() {
    let (storage, team_id) = seeded().await;
    storage
        .create_team("Mystery Mavens", "mystery1", 2)
        .await
        .expect("team");
    for step in 0..MAX_PROGRESS {
        storage
            .advance_progress(team_id, step, &advance_to(step + 1, at(u32::from(step))))
            .await
            .expect("cas");
    }

    let stats = storage.admin_stats().await.expect("stats");
    assert_eq!(
        stats,
        AdminStats {
            total_teams: 2,
            total_players: 5,
            scan_count: 0,
            completed: 1,
        }
    );
}
