use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::ReturnDocument;
use mongodb::Database;

use crate::metrics::track_db_operation;
use crate::trivia::carried_streak;
use crate::utils::time::date_key;

/// Player wallet and streak lookups.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Daily streak carried into `today`; 0 for players who never played or
    /// missed a day.
    async fn streak(&self, user_id: &str, today: NaiveDate) -> Result<u32>;

    /// Whether a daily result is already on record for `date`.
    async fn played_daily(&self, user_id: &str, date: NaiveDate) -> Result<bool>;

    async fn diamonds(&self, user_id: &str) -> Result<u32>;

    /// Atomically takes `amount` diamonds. Returns false when the balance is too low.
    async fn deduct_diamonds(&self, user_id: &str, amount: u32) -> Result<bool>;
}

pub struct MongoProfileStore {
    mongo: Database,
}

impl MongoProfileStore {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn profiles(&self) -> mongodb::Collection<Document> {
        self.mongo.collection("profiles")
    }
}

/// Numeric fields may come back as int32, int64 or double depending on the writer.
pub(crate) fn read_count(doc: &Document, key: &str) -> u32 {
    let value = match doc.get(key) {
        Some(Bson::Int32(v)) => i64::from(*v),
        Some(Bson::Int64(v)) => *v,
        Some(Bson::Double(v)) => *v as i64,
        _ => 0,
    };
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

fn read_date(doc: &Document, key: &str) -> Option<NaiveDate> {
    doc.get_str(key)
        .ok()
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

#[async_trait]
impl ProfileStore for MongoProfileStore {
    async fn streak(&self, user_id: &str, today: NaiveDate) -> Result<u32> {
        track_db_operation("find_one", "trivia_streaks", async {
            let found = self
                .mongo
                .collection::<Document>("trivia_streaks")
                .find_one(doc! { "user_id": user_id })
                .await
                .context("Failed to query trivia_streaks")?;
            Ok(found
                .map(|d| carried_streak(read_count(&d, "current_streak"), read_date(&d, "last_played"), today))
                .unwrap_or(0))
        })
        .await
    }

    async fn played_daily(&self, user_id: &str, date: NaiveDate) -> Result<bool> {
        track_db_operation("count_documents", "daily_trivia_plays", async {
            let plays = self
                .mongo
                .collection::<Document>("daily_trivia_plays")
                .count_documents(doc! { "user_id": user_id, "play_date": date_key(date) })
                .limit(1)
                .await
                .context("Failed to query daily_trivia_plays")?;
            Ok(plays > 0)
        })
        .await
    }

    async fn diamonds(&self, user_id: &str) -> Result<u32> {
        track_db_operation("find_one", "profiles", async {
            let found = self
                .profiles()
                .find_one(doc! { "_id": user_id })
                .await
                .context("Failed to query profiles")?;
            Ok(found.map(|d| read_count(&d, "diamonds")).unwrap_or(0))
        })
        .await
    }

    async fn deduct_diamonds(&self, user_id: &str, amount: u32) -> Result<bool> {
        if amount == 0 {
            return Ok(true);
        }
        let amount = i64::from(amount);

        track_db_operation("find_one_and_update", "profiles", async {
            let updated = self
                .profiles()
                .find_one_and_update(
                    doc! { "_id": user_id, "diamonds": { "$gte": amount } },
                    doc! { "$inc": { "diamonds": -amount } },
                )
                .return_document(ReturnDocument::After)
                .await
                .context("Failed to deduct diamonds")?;

            if let Some(profile) = &updated {
                tracing::info!(
                    "Deducted {} diamonds from user={}, balance={}",
                    amount,
                    user_id,
                    read_count(profile, "diamonds")
                );
            }
            Ok(updated.is_some())
        })
        .await
    }
}
