use serde::{Deserialize, Serialize};

/// A row as delivered by the leaderboard store, already sorted by score descending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub user_id: String,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub rank: usize,
    pub user_id: String,
    pub score: u32,
    pub is_current_user: bool,
}

/// Assigns 1-based ranks by position. Input order is trusted; ties keep their order.
pub fn rank_entries(rows: Vec<LeaderboardRow>, current_user: Option<&str>) -> Vec<RankedEntry> {
    rows.into_iter()
        .enumerate()
        .map(|(position, row)| RankedEntry {
            rank: position + 1,
            is_current_user: current_user == Some(row.user_id.as_str()),
            user_id: row.user_id,
            score: row.score,
        })
        .collect()
}
