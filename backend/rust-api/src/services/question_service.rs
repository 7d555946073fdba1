use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::Database;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::Deserialize;
use std::sync::{Arc, Mutex};

use crate::metrics::{track_db_operation, QUESTION_FALLBACKS_TOTAL};
use crate::trivia::{Category, Difficulty, TriviaMode, TriviaQuestion};
use crate::utils::time::{date_key, play_date};

/// Backing store for trivia questions.
#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// Questions scheduled for `date`, in display order.
    async fn daily(&self, date: NaiveDate) -> Result<Vec<TriviaQuestion>>;

    /// Any single question, used when nothing is scheduled today.
    async fn any_one(&self) -> Result<Option<TriviaQuestion>>;

    /// Up to `limit` questions from `categories` (all categories when empty).
    async fn candidate_pool(&self, categories: &[Category], limit: i64) -> Result<Vec<TriviaQuestion>>;
}

pub struct MongoQuestionStore {
    mongo: Database,
}

#[derive(Debug, Deserialize)]
struct QuestionDocument {
    #[serde(rename = "_id")]
    id: Bson,
    category: String,
    difficulty: Difficulty,
    question: String,
    options: Vec<String>,
    correct_index: i64,
    explanation: Option<String>,
}

impl QuestionDocument {
    fn into_question(self) -> Option<TriviaQuestion> {
        let id = match self.id {
            Bson::ObjectId(oid) => oid.to_hex(),
            Bson::String(value) => value,
            other => other.to_string(),
        };
        let correct_index = usize::try_from(self.correct_index).ok()?;

        Some(TriviaQuestion {
            id,
            category: self.category,
            difficulty: self.difficulty,
            question: self.question,
            options: self.options,
            correct_index,
            explanation: self.explanation,
        })
    }
}

impl MongoQuestionStore {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn collection(&self) -> mongodb::Collection<QuestionDocument> {
        self.mongo.collection("trivia_questions")
    }

    async fn find_many(&self, filter: Document, sort: Option<Document>, limit: i64) -> Result<Vec<TriviaQuestion>> {
        let collection = self.collection();
        let mut find = collection.find(filter).limit(limit);
        if let Some(sort) = sort {
            find = find.sort(sort);
        }
        let docs: Vec<QuestionDocument> = find
            .await
            .context("Failed to query trivia_questions")?
            .try_collect()
            .await
            .context("Failed to read trivia_questions cursor")?;

        Ok(docs.into_iter().filter_map(QuestionDocument::into_question).collect())
    }
}

#[async_trait]
impl QuestionStore for MongoQuestionStore {
    async fn daily(&self, date: NaiveDate) -> Result<Vec<TriviaQuestion>> {
        track_db_operation("find", "trivia_questions", async {
            self.find_many(
                doc! { "daily_date": date_key(date) },
                Some(doc! { "order_index": 1 }),
                1,
            )
            .await
        })
        .await
    }

    async fn any_one(&self) -> Result<Option<TriviaQuestion>> {
        track_db_operation("find_one", "trivia_questions", async {
            let found = self
                .collection()
                .find_one(doc! {})
                .await
                .context("Failed to query trivia_questions")?;
            Ok(found.and_then(QuestionDocument::into_question))
        })
        .await
    }

    async fn candidate_pool(&self, categories: &[Category], limit: i64) -> Result<Vec<TriviaQuestion>> {
        let filter = if categories.is_empty() {
            doc! {}
        } else {
            let keys: Vec<&str> = categories.iter().map(Category::as_str).collect();
            doc! { "category": { "$in": keys } }
        };

        track_db_operation("find", "trivia_questions", async {
            self.find_many(filter, None, limit).await
        })
        .await
    }
}

/// Supplies the question list for a new session.
///
/// Store failures are logged and treated like an empty result, so a session can
/// always fall back to the built-in bank.
pub struct QuestionLoader {
    store: Arc<dyn QuestionStore>,
    rng: Mutex<StdRng>,
    timezone: Tz,
    pool_limit: i64,
}

impl QuestionLoader {
    pub fn new(store: Arc<dyn QuestionStore>, timezone: Tz, pool_limit: i64) -> Self {
        Self::with_rng(store, timezone, pool_limit, StdRng::from_os_rng())
    }

    /// Deterministic shuffles for tests.
    pub fn with_seed(store: Arc<dyn QuestionStore>, timezone: Tz, pool_limit: i64, seed: u64) -> Self {
        Self::with_rng(store, timezone, pool_limit, StdRng::seed_from_u64(seed))
    }

    fn with_rng(store: Arc<dyn QuestionStore>, timezone: Tz, pool_limit: i64, rng: StdRng) -> Self {
        Self {
            store,
            rng: Mutex::new(rng),
            timezone,
            pool_limit,
        }
    }

    pub fn today(&self) -> NaiveDate {
        play_date(Utc::now(), self.timezone)
    }

    pub async fn load_questions(&self, mode: TriviaMode, count: usize) -> Vec<TriviaQuestion> {
        self.load_questions_on(mode, count, self.today()).await
    }

    pub async fn load_questions_on(&self, mode: TriviaMode, count: usize, today: NaiveDate) -> Vec<TriviaQuestion> {
        if mode == TriviaMode::Daily {
            return self.load_daily(today).await;
        }

        let pool = match self
            .store
            .candidate_pool(mode.config().categories, self.pool_limit)
            .await
        {
            Ok(pool) => valid_only(pool),
            Err(e) => {
                tracing::warn!("Question store failed for mode {} ({}), using fallback bank", mode, e);
                Vec::new()
            }
        };

        if pool.is_empty() {
            return self.fallback(mode, count);
        }

        let questions = self.shuffle_and_take(pool, count);
        if questions.len() < count {
            tracing::debug!(
                "Mode {} requested {} questions, only {} available",
                mode,
                count,
                questions.len()
            );
        }
        questions
    }

    async fn load_daily(&self, today: NaiveDate) -> Vec<TriviaQuestion> {
        match self.store.daily(today).await {
            Ok(scheduled) => {
                if let Some(question) = valid_only(scheduled).into_iter().next() {
                    return vec![question];
                }
                tracing::info!("No daily question scheduled for {}, picking any", date_key(today));
            }
            Err(e) => tracing::warn!("Failed to load daily question for {}: {}", date_key(today), e),
        }

        match self.store.any_one().await {
            Ok(Some(question)) if question.validate().is_ok() => vec![question],
            Ok(_) => self.fallback(TriviaMode::Daily, 1),
            Err(e) => {
                tracing::warn!("Failed to load any question ({}), using fallback bank", e);
                self.fallback(TriviaMode::Daily, 1)
            }
        }
    }

    fn fallback(&self, mode: TriviaMode, count: usize) -> Vec<TriviaQuestion> {
        QUESTION_FALLBACKS_TOTAL
            .with_label_values(&[mode.as_str()])
            .inc();
        self.shuffle_and_take(fallback_questions(), count)
    }

    fn shuffle_and_take(&self, mut questions: Vec<TriviaQuestion>, count: usize) -> Vec<TriviaQuestion> {
        {
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            questions.shuffle(&mut *rng);
        }
        questions.truncate(count);
        questions
    }
}

fn valid_only(questions: Vec<TriviaQuestion>) -> Vec<TriviaQuestion> {
    questions
        .into_iter()
        .filter(|q| match q.validate() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Skipping stored question: {}", e);
                false
            }
        })
        .collect()
}

/// Built-in bank served when the store has nothing to offer.
pub fn fallback_questions() -> Vec<TriviaQuestion> {
    fn q(
        id: &str,
        category: Category,
        difficulty: Difficulty,
        question: &str,
        options: [&str; 4],
        correct_index: usize,
        explanation: &str,
    ) -> TriviaQuestion {
        TriviaQuestion {
            id: id.to_string(),
            category: category.as_str().to_string(),
            difficulty,
            question: question.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct_index,
            explanation: Some(explanation.to_string()),
        }
    }

    vec![
        q(
            "fb1",
            Category::PokerHistory,
            Difficulty::Medium,
            "In what year was the first World Series of Poker Main Event held?",
            ["1968", "1970", "1972", "1975"],
            1,
            "The first WSOP was held in 1970 at Binion's Horseshoe Casino in Las Vegas.",
        ),
        q(
            "fb2",
            Category::PlayerProfiles,
            Difficulty::Easy,
            "Which player holds the record for most WSOP bracelets?",
            ["Phil Ivey", "Doyle Brunson", "Phil Hellmuth", "Johnny Chan"],
            2,
            "Phil Hellmuth holds the record with 17 WSOP bracelets.",
        ),
        q(
            "fb3",
            Category::RuleKnowledge,
            Difficulty::Easy,
            "In Texas Hold'em, how many community cards are dealt in total?",
            ["3", "4", "5", "7"],
            2,
            "Five community cards are dealt: 3 on the flop, 1 on the turn, and 1 on the river.",
        ),
        q(
            "fb4",
            Category::GtoTheory,
            Difficulty::Hard,
            "What does MDF stand for in GTO poker strategy?",
            [
                "Maximum Defense Frequency",
                "Minimum Defense Frequency",
                "Mean Defensive Fold",
                "Marginal Defense Factor",
            ],
            1,
            "MDF (Minimum Defense Frequency) tells you how often to call to prevent an opponent from profitably bluffing.",
        ),
        q(
            "fb5",
            Category::FamousHands,
            Difficulty::Medium,
            "What is the \"Dead Man's Hand\" in poker?",
            [
                "Pocket Kings",
                "Aces and Eights (black)",
                "Queen-Seven offsuit",
                "Two-Seven offsuit",
            ],
            1,
            "The Dead Man's Hand is two pair of black aces and black eights.",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Default)]
    struct FakeStore {
        daily: Vec<TriviaQuestion>,
        pool: Vec<TriviaQuestion>,
        fail: bool,
    }

    #[async_trait]
    impl QuestionStore for FakeStore {
        async fn daily(&self, _date: NaiveDate) -> Result<Vec<TriviaQuestion>> {
            if self.fail {
                anyhow::bail!("connection refused");
            }
            Ok(self.daily.clone())
        }

        async fn any_one(&self) -> Result<Option<TriviaQuestion>> {
            if self.fail {
                anyhow::bail!("connection refused");
            }
            Ok(self.pool.first().cloned())
        }

        async fn candidate_pool(&self, categories: &[Category], limit: i64) -> Result<Vec<TriviaQuestion>> {
            if self.fail {
                anyhow::bail!("connection refused");
            }
            Ok(self
                .pool
                .iter()
                .filter(|q| categories.is_empty() || q.known_category().is_some_and(|c| categories.contains(&c)))
                .take(limit as usize)
                .cloned()
                .collect())
        }
    }

    fn loader(store: FakeStore, seed: u64) -> QuestionLoader {
        QuestionLoader::with_seed(Arc::new(store), chrono_tz::America::Chicago, 50, seed)
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 10).unwrap()
    }

    fn ids(questions: &[TriviaQuestion]) -> Vec<String> {
        questions.iter().map(|q| q.id.clone()).collect()
    }

    fn pool_of(n: usize, category: Category) -> Vec<TriviaQuestion> {
        (0..n)
            .map(|i| {
                let mut q = fallback_questions()[0].clone();
                q.id = format!("{}-{}", category.as_str(), i);
                q.category = category.as_str().to_string();
                q
            })
            .collect()
    }

    #[test]
    fn fallback_bank_is_valid_and_spread() {
        let bank = fallback_questions();
        assert!(bank.len() >= 5);
        assert!(bank.iter().all(|q| q.validate().is_ok()));

        let categories: HashSet<_> = bank.iter().map(|q| q.category.clone()).collect();
        assert_eq!(categories.len(), 5);
    }

    #[tokio::test]
    async fn same_seed_gives_same_fallback_order() {
        let a = loader(FakeStore::default(), 7)
            .load_questions_on(TriviaMode::Arcade, 10, date())
            .await;
        let b = loader(FakeStore::default(), 7)
            .load_questions_on(TriviaMode::Arcade, 10, date())
            .await;

        assert_eq!(ids(&a), ids(&b));
        let unique: HashSet<_> = ids(&a).into_iter().collect();
        assert_eq!(unique.len(), fallback_questions().len());
    }

    #[tokio::test]
    async fn filters_by_mode_categories_and_truncates() {
        let mut pool = pool_of(12, Category::RuleKnowledge);
        pool.extend(pool_of(6, Category::GtoTheory));
        let loader = loader(
            FakeStore {
                pool,
                ..Default::default()
            },
            1,
        );

        let questions = loader.load_questions_on(TriviaMode::Rules, 10, date()).await;
        assert_eq!(questions.len(), 10);
        assert!(questions.iter().all(|q| q.category == "rule_knowledge"));

        let unique: HashSet<_> = ids(&questions).into_iter().collect();
        assert_eq!(unique.len(), 10);
    }

    #[tokio::test]
    async fn thin_category_gives_a_shorter_session() {
        let loader = loader(
            FakeStore {
                pool: pool_of(3, Category::GtoTheory),
                ..Default::default()
            },
            1,
        );

        let questions = loader.load_questions_on(TriviaMode::Pro, 10, date()).await;
        assert_eq!(questions.len(), 3);
    }

    #[tokio::test]
    async fn store_failure_falls_back_to_bank() {
        let loader = loader(
            FakeStore {
                fail: true,
                ..Default::default()
            },
            3,
        );

        let questions = loader.load_questions_on(TriviaMode::History, 10, date()).await;
        assert_eq!(questions.len(), 5);

        let daily = loader.load_questions_on(TriviaMode::Daily, 1, date()).await;
        assert_eq!(daily.len(), 1);
    }

    #[tokio::test]
    async fn daily_prefers_scheduled_question() {
        let mut scheduled = pool_of(2, Category::FamousHands);
        scheduled[0].id = "today".to_string();
        let loader = loader(
            FakeStore {
                daily: scheduled,
                pool: pool_of(4, Category::PokerHistory),
                ..Default::default()
            },
            9,
        );

        let questions = loader.load_questions_on(TriviaMode::Daily, 1, date()).await;
        assert_eq!(ids(&questions), vec!["today".to_string()]);
    }

    #[tokio::test]
    async fn daily_without_schedule_picks_any_question() {
        let loader = loader(
            FakeStore {
                pool: pool_of(4, Category::PokerHistory),
                ..Default::default()
            },
            9,
        );

        let questions = loader.load_questions_on(TriviaMode::Daily, 1, date()).await;
        assert_eq!(ids(&questions), vec!["poker_history-0".to_string()]);
    }

    #[tokio::test]
    async fn malformed_stored_questions_are_skipped() {
        let mut pool = pool_of(3, Category::RuleKnowledge);
        pool[0].correct_index = 7;
        let loader = loader(
            FakeStore {
                pool,
                ..Default::default()
            },
            2,
        );

        let questions = loader.load_questions_on(TriviaMode::Rules, 10, date()).await;
        assert_eq!(questions.len(), 2);
        assert!(questions.iter().all(|q| q.id != "rule_knowledge-0"));
    }
}
