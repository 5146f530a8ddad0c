use chrono::{Duration, TimeZone, Utc};
use shared::domain::TeamId;

use super::*;

fn team(id: i64, points: u32, progress: u8, minutes: Option<i64>) -> TeamSnapshot {
    let start = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
    TeamSnapshot {
        team_id: TeamId(id),
        name: format!("team-{id}"),
        member_count: 3,
        progress,
        points,
        start_time: (progress > 0).then_some(start),
        finish_time: minutes.map(|m| start + Duration::minutes(m)),
        disqualified: false,
    }
}

fn ids(teams: &[TeamSnapshot]) -> Vec<i64> {
    teams.iter().map(|t| t.team_id.0).collect()
}

#[test]
fn points_then_finished_status_decide_rank() {
    let a = team(1, 10, 10, Some(5));
    let b = team(2, 10, 5, None);
    let c = team(3, 15, 7, None);

    let ranked = rank_leaderboard(vec![b, a, c]);
    assert_eq!(ids(&ranked), vec![3, 1, 2]);
}

#[test]
fn faster_finisher_wins_a_points_tie() {
    let slow = team(1, 20, 10, Some(50));
    let fast = team(2, 20, 10, Some(32));

    let ranked = rank_leaderboard(vec![slow, fast]);
    assert_eq!(ids(&ranked), vec![2, 1]);
}

#[test]
fn unfinished_ties_keep_input_order() {
    let ranked = rank_leaderboard(vec![
        team(4, 6, 3, None),
        team(2, 6, 3, None),
        team(9, 6, 3, None),
    ]);
    assert_eq!(ids(&ranked), vec![4, 2, 9]);
}

#[test]
fn disqualified_teams_are_excluded() {
    let mut cheater = team(1, 99, 10, Some(1));
    cheater.disqualified = true;

    let ranked = rank_leaderboard(vec![cheater, team(2, 2, 1, None)]);
    assert_eq!(ids(&ranked), vec![2]);
}

#[test]
fn ranking_is_idempotent() {
    let input = vec![
        team(1, 4, 2, None),
        team(2, 20, 10, Some(45)),
        team(3, 20, 10, Some(30)),
        team(4, 8, 4, None),
    ];
    let once = rank_leaderboard(input);
    let twice = rank_leaderboard(once.clone());
    assert_eq!(once, twice);
    assert_eq!(ids(&once), vec![3, 2, 4, 1]);
}
