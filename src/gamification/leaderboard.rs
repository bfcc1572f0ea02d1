use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::db::models::{Medal, User, UserMedal};

pub const DEFAULT_LEADERBOARD_SIZE: usize = 10;
pub const MAX_LEADERBOARD_SIZE: usize = 100;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LeaderboardEntry {
    /// 1-based position.
    pub rank: usize,
    pub user_id: String,
    pub name: String,
    pub zone: Option<String>,
    pub points: i64,
    pub medal_count: usize,
    /// Codes of the medals held, sorted.
    pub medals: Vec<String>,
}

/// Join users with their medals and order them for display.
///
/// Ordering: points desc, then medal count desc, then name asc. Ranks are
/// positions in that order, so ties still get distinct ranks.
pub fn rank_leaderboard(
    users: Vec<User>,
    medals: &[Medal],
    awards: &[UserMedal],
    limit: usize,
) -> Vec<LeaderboardEntry> {
    let codes: HashMap<&str, &str> = medals
        .iter()
        .map(|m| (m.id.as_str(), m.code.as_str()))
        .collect();

    let mut held: HashMap<&str, Vec<String>> = HashMap::new();
    for award in awards {
        // Awards of deleted medals are ignored.
        if let Some(code) = codes.get(award.medal_id.as_str()) {
            held.entry(award.user_id.as_str())
                .or_default()
                .push(code.to_string());
        }
    }

    let mut entries: Vec<LeaderboardEntry> = users
        .into_iter()
        .map(|user| {
            let mut medals = held.remove(user.id.as_str()).unwrap_or_default();
            medals.sort();
            LeaderboardEntry {
                rank: 0,
                medal_count: medals.len(),
                medals,
                user_id: user.id,
                name: user.name,
                zone: user.zone,
                points: user.points,
            }
        })
        .collect();

    entries.sort_by(compare);
    entries.truncate(limit);
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = i + 1;
    }
    entries
}

fn compare(a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    b.points
        .cmp(&a.points)
        .then(b.medal_count.cmp(&a.medal_count))
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.user_id.cmp(&b.user_id))
}
