use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use mongodb::bson::{doc, Document};
use mongodb::Database;
use std::sync::Arc;

use super::leaderboard_service::LeaderboardStore;
use crate::metrics::{track_db_operation, RESULT_PERSISTENCE_TOTAL};
use crate::trivia::{TriviaMode, TriviaResult};
use crate::utils::time::{chrono_to_bson, date_key};

/// Everything persisted about one finished session.
#[derive(Debug, Clone)]
pub struct ResultRecord {
    pub session_id: String,
    pub user_id: String,
    pub play_date: NaiveDate,
    pub previous_streak: u32,
    pub completed_at: DateTime<Utc>,
    pub result: TriviaResult,
}

#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn record(&self, record: &ResultRecord) -> Result<()>;
}

pub struct MongoResultSink {
    mongo: Database,
    leaderboard: Arc<dyn LeaderboardStore>,
}

impl MongoResultSink {
    pub fn new(mongo: Database, leaderboard: Arc<dyn LeaderboardStore>) -> Self {
        Self { mongo, leaderboard }
    }

    async fn insert_score(&self, record: &ResultRecord) -> Result<()> {
        let result = &record.result;
        let score = doc! {
            "session_id": &record.session_id,
            "user_id": &record.user_id,
            "mode": result.mode.as_str(),
            "score": i64::from(result.score),
            "correct_count": i64::from(result.correct_count),
            "total_questions": i64::from(result.total_questions),
            "time_spent": i64::from(result.time_spent),
            "time_remaining": i64::from(result.time_remaining),
            "xp_earned": i64::from(result.xp_earned),
            "diamonds_earned": i64::from(result.diamonds_earned),
            "play_date": date_key(record.play_date),
            "created_at": chrono_to_bson(record.completed_at),
        };

        track_db_operation("insert_one", "trivia_scores", async {
            self.mongo
                .collection::<Document>("trivia_scores")
                .insert_one(score)
                .await
                .context("Failed to insert trivia score")?;
            Ok(())
        })
        .await
    }

    async fn credit_profile(&self, record: &ResultRecord) -> Result<()> {
        let result = &record.result;
        if result.xp_earned == 0 && result.diamonds_earned == 0 {
            return Ok(());
        }

        track_db_operation("update_one", "profiles", async {
            self.mongo
                .collection::<Document>("profiles")
                .update_one(
                    doc! { "_id": &record.user_id },
                    doc! { "$inc": {
                        "xp": i64::from(result.xp_earned),
                        "diamonds": i64::from(result.diamonds_earned)
                    } },
                )
                .upsert(true)
                .await
                .context("Failed to credit profile")?;
            Ok(())
        })
        .await
    }

    async fn record_daily(&self, record: &ResultRecord) -> Result<()> {
        let result = &record.result;
        let play_date = date_key(record.play_date);

        // One play per user and date; the streak only moves on the first one.
        let first_play = track_db_operation("update_one", "daily_trivia_plays", async {
            let outcome = self
                .mongo
                .collection::<Document>("daily_trivia_plays")
                .update_one(
                    doc! { "user_id": &record.user_id, "play_date": &play_date },
                    doc! { "$setOnInsert": {
                        "session_id": &record.session_id,
                        "correct": result.correct_count > 0,
                        "xp_earned": i64::from(result.xp_earned),
                    } },
                )
                .upsert(true)
                .await
                .context("Failed to record daily play")?;
            Ok(outcome.upserted_id.is_some())
        })
        .await?;

        if !first_play {
            tracing::warn!(
                "Daily play already recorded for user={} on {}, streak left unchanged",
                record.user_id,
                play_date
            );
            return Ok(());
        }

        track_db_operation("update_one", "trivia_streaks", async {
            self.mongo
                .collection::<Document>("trivia_streaks")
                .update_one(
                    doc! { "user_id": &record.user_id },
                    doc! {
                        "$set": {
                            "current_streak": i64::from(result.streak),
                            "last_played": &play_date,
                        },
                        "$max": { "best_streak": i64::from(result.streak) },
                    },
                )
                .upsert(true)
                .await
                .context("Failed to update trivia streak")?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl ResultSink for MongoResultSink {
    async fn record(&self, record: &ResultRecord) -> Result<()> {
        self.insert_score(record).await?;
        self.credit_profile(record).await?;

        match record.result.mode {
            TriviaMode::Daily => self.record_daily(record).await?,
            TriviaMode::Arcade => {
                // Leaderboard is best-effort; the score row above is the record of truth.
                if let Err(e) = self
                    .leaderboard
                    .submit(
                        TriviaMode::Arcade,
                        record.play_date,
                        &record.user_id,
                        record.result.score,
                    )
                    .await
                {
                    tracing::warn!("Leaderboard submit failed for user={}: {:#}", record.user_id, e);
                }
            }
            _ => {}
        }

        Ok(())
    }
}

/// Persists in the background. Failures are logged and counted, never surfaced to the player.
pub fn spawn_record(sink: Arc<dyn ResultSink>, record: ResultRecord) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match sink.record(&record).await {
            Ok(()) => {
                RESULT_PERSISTENCE_TOTAL.with_label_values(&["success"]).inc();
                tracing::info!(
                    "Trivia result saved: session={}, user={}, mode={}, score={}",
                    record.session_id,
                    record.user_id,
                    record.result.mode,
                    record.result.score
                );
            }
            Err(e) => {
                RESULT_PERSISTENCE_TOTAL.with_label_values(&["error"]).inc();
                tracing::error!(
                    "Background result save failed: session={}, user={}: {:#}",
                    record.session_id,
                    record.user_id,
                    e
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trivia::SessionOutcome;
    use std::sync::Mutex;

    struct FailingSink {
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl ResultSink for FailingSink {
        async fn record(&self, _record: &ResultRecord) -> Result<()> {
            *self.calls.lock().unwrap() += 1;
            anyhow::bail!("mongo unavailable")
        }
    }

    #[tokio::test]
    async fn failed_persistence_is_swallowed() {
        let sink = Arc::new(FailingSink {
            calls: Mutex::new(0),
        });
        let outcome = SessionOutcome {
            answers: vec![1],
            correct_count: 1,
            total_questions: 1,
            time_spent: 5,
            time_remaining: 0,
            expired: false,
        };
        let record = ResultRecord {
            session_id: "s1".to_string(),
            user_id: "u1".to_string(),
            play_date: NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
            previous_streak: 0,
            completed_at: Utc::now(),
            result: TriviaResult::from_outcome(TriviaMode::Daily, &outcome, 0),
        };

        let before = RESULT_PERSISTENCE_TOTAL.with_label_values(&["error"]).get();
        spawn_record(sink.clone(), record).await.unwrap();

        assert_eq!(*sink.calls.lock().unwrap(), 1);
        assert!(RESULT_PERSISTENCE_TOTAL.with_label_values(&["error"]).get() > before);
    }
}
