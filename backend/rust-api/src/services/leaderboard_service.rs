use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use redis::aio::ConnectionManager;

use crate::metrics::track_cache_operation;
use crate::trivia::leaderboard::LeaderboardRow;
use crate::trivia::TriviaMode;
use crate::utils::time::date_key;

/// Boards outlive their play date by a day so "yesterday" can still be shown.
const BOARD_TTL_SECONDS: i64 = 48 * 60 * 60;

#[async_trait]
pub trait LeaderboardStore: Send + Sync {
    /// Records a play. Only a player's best score of the day is kept.
    async fn submit(&self, mode: TriviaMode, date: NaiveDate, user_id: &str, score: u32) -> Result<()>;

    /// Best rows first.
    async fn top(&self, mode: TriviaMode, date: NaiveDate, limit: usize) -> Result<Vec<LeaderboardRow>>;
}

pub struct RedisLeaderboard {
    redis: ConnectionManager,
}

impl RedisLeaderboard {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

pub fn board_key(mode: TriviaMode, date: NaiveDate) -> String {
    format!("trivia:leaderboard:{}:{}", mode.as_str(), date_key(date))
}

#[async_trait]
impl LeaderboardStore for RedisLeaderboard {
    async fn submit(&self, mode: TriviaMode, date: NaiveDate, user_id: &str, score: u32) -> Result<()> {
        let key = board_key(mode, date);
        let mut conn = self.redis.clone();

        track_cache_operation("leaderboard_submit", async {
            redis::pipe()
                .atomic()
                .cmd("ZADD")
                .arg(&key)
                .arg("GT")
                .arg(score)
                .arg(user_id)
                .ignore()
                .cmd("EXPIRE")
                .arg(&key)
                .arg(BOARD_TTL_SECONDS)
                .ignore()
                .query_async::<()>(&mut conn)
                .await
                .with_context(|| format!("Failed to submit score to {}", key))
        })
        .await
    }

    async fn top(&self, mode: TriviaMode, date: NaiveDate, limit: usize) -> Result<Vec<LeaderboardRow>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let key = board_key(mode, date);
        let mut conn = self.redis.clone();

        let raw: Vec<(String, f64)> = track_cache_operation("leaderboard_top", async {
            redis::cmd("ZREVRANGE")
                .arg(&key)
                .arg(0)
                .arg(limit as i64 - 1)
                .arg("WITHSCORES")
                .query_async(&mut conn)
                .await
                .with_context(|| format!("Failed to read leaderboard {}", key))
        })
        .await?;

        Ok(raw
            .into_iter()
            .map(|(user_id, score)| LeaderboardRow {
                user_id,
                score: score.max(0.0) as u32,
            })
            .collect())
    }
}
