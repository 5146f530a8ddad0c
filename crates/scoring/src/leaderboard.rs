use std::cmp::Ordering;

use shared::protocol::TeamSnapshot;

/// Orders non-disqualified teams for display.
///
/// Points descending; on equal points finished teams rank above unfinished
/// ones, and two finished teams compare by elapsed time. Anything still tied
/// keeps its input order.
pub fn rank_leaderboard(teams: impl IntoIterator<Item = TeamSnapshot>) -> Vec<TeamSnapshot> {
    let mut ranked: Vec<TeamSnapshot> = teams.into_iter().filter(|t| !t.disqualified).collect();
    ranked.sort_by(compare);
    ranked
}

fn compare(a: &TeamSnapshot, b: &TeamSnapshot) -> Ordering {
    b.points
        .cmp(&a.points)
        .then_with(|| match (a.is_finished(), b.is_finished()) {
            (true, true) => match (a.elapsed(), b.elapsed()) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => Ordering::Equal,
        })
}

#[cfg(test)]
#[path = "tests/leaderboard_tests.rs"]
mod tests;
