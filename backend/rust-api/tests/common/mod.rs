#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tower::ServiceExt;
use trivia_api::{
    config::Config,
    create_router,
    services::{
        leaderboard_service::LeaderboardStore,
        profile_service::ProfileStore,
        question_service::{QuestionLoader, QuestionStore},
        result_service::{ResultRecord, ResultSink},
        AppState,
    },
    trivia::{leaderboard::LeaderboardRow, Category, Difficulty, TriviaMode, TriviaQuestion},
};

/// Every seeded question has option 1 as its correct answer.
pub const CORRECT: usize = 1;

pub fn question(id: &str, category: Category) -> TriviaQuestion {
    TriviaQuestion {
        id: id.to_string(),
        category: category.as_str().to_string(),
        difficulty: Difficulty::Medium,
        question: format!("Question {}?", id),
        options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
        correct_index: CORRECT,
        explanation: Some(format!("Explanation for {}", id)),
    }
}

pub struct MemoryQuestions {
    pub daily: Vec<TriviaQuestion>,
    pub pool: Vec<TriviaQuestion>,
}

impl MemoryQuestions {
    pub fn seeded() -> Self {
        let mut pool = Vec::new();
        for category in Category::ALL {
            for i in 0..12 {
                pool.push(question(&format!("{}-{}", category.as_str(), i), category));
            }
        }
        Self {
            daily: vec![question("daily-1", Category::FamousHands)],
            pool,
        }
    }
}

#[async_trait]
impl QuestionStore for MemoryQuestions {
    async fn daily(&self, _date: NaiveDate) -> Result<Vec<TriviaQuestion>> {
        Ok(self.daily.clone())
    }

    async fn any_one(&self) -> Result<Option<TriviaQuestion>> {
        Ok(self.pool.first().cloned())
    }

    async fn candidate_pool(&self, categories: &[Category], limit: i64) -> Result<Vec<TriviaQuestion>> {
        Ok(self
            .pool
            .iter()
            .filter(|q| {
                categories.is_empty() || q.known_category().is_some_and(|c| categories.contains(&c))
            })
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryProfiles {
    pub diamonds: Mutex<HashMap<String, u32>>,
    pub streaks: Mutex<HashMap<String, u32>>,
    pub daily_plays: Mutex<HashSet<(String, NaiveDate)>>,
}

impl MemoryProfiles {
    pub fn set_diamonds(&self, user_id: &str, amount: u32) {
        self.diamonds.lock().unwrap().insert(user_id.to_string(), amount);
    }

    pub fn set_streak(&self, user_id: &str, streak: u32) {
        self.streaks.lock().unwrap().insert(user_id.to_string(), streak);
    }

    pub fn mark_daily_played(&self, user_id: &str, date: NaiveDate) {
        self.daily_plays.lock().unwrap().insert((user_id.to_string(), date));
    }

    pub fn balance(&self, user_id: &str) -> u32 {
        self.diamonds.lock().unwrap().get(user_id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ProfileStore for MemoryProfiles {
    async fn streak(&self, user_id: &str, _today: NaiveDate) -> Result<u32> {
        Ok(self.streaks.lock().unwrap().get(user_id).copied().unwrap_or(0))
    }

    async fn played_daily(&self, user_id: &str, date: NaiveDate) -> Result<bool> {
        Ok(self
            .daily_plays
            .lock()
            .unwrap()
            .contains(&(user_id.to_string(), date)))
    }

    async fn diamonds(&self, user_id: &str) -> Result<u32> {
        Ok(self.balance(user_id))
    }

    async fn deduct_diamonds(&self, user_id: &str, amount: u32) -> Result<bool> {
        let mut wallets = self.diamonds.lock().unwrap();
        let balance = wallets.entry(user_id.to_string()).or_insert(0);
        if *balance < amount {
            return Ok(false);
        }
        *balance -= amount;
        Ok(true)
    }
}

pub struct RecordingSink {
    tx: mpsc::UnboundedSender<ResultRecord>,
}

#[async_trait]
impl ResultSink for RecordingSink {
    async fn record(&self, record: &ResultRecord) -> Result<()> {
        let _ = self.tx.send(record.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryLeaderboard {
    boards: Mutex<HashMap<(TriviaMode, NaiveDate), HashMap<String, u32>>>,
}

#[async_trait]
impl LeaderboardStore for MemoryLeaderboard {
    async fn submit(&self, mode: TriviaMode, date: NaiveDate, user_id: &str, score: u32) -> Result<()> {
        let mut boards = self.boards.lock().unwrap();
        let best = boards
            .entry((mode, date))
            .or_default()
            .entry(user_id.to_string())
            .or_insert(score);
        *best = (*best).max(score);
        Ok(())
    }

    async fn top(&self, mode: TriviaMode, date: NaiveDate, limit: usize) -> Result<Vec<LeaderboardRow>> {
        let boards = self.boards.lock().unwrap();
        let mut rows: Vec<LeaderboardRow> = boards
            .get(&(mode, date))
            .map(|board| {
                board
                    .iter()
                    .map(|(user_id, score)| LeaderboardRow {
                        user_id: user_id.clone(),
                        score: *score,
                    })
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.user_id.cmp(&b.user_id)));
        rows.truncate(limit);
        Ok(rows)
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub profiles: Arc<MemoryProfiles>,
    pub leaderboard: Arc<MemoryLeaderboard>,
    pub results: mpsc::UnboundedReceiver<ResultRecord>,
}

pub fn create_test_app() -> TestApp {
    create_test_app_with(MemoryQuestions::seeded())
}

pub fn create_test_app_with(questions: MemoryQuestions) -> TestApp {
    build_test_app(questions, Config::default())
}

pub fn create_test_app_with_config(config: Config) -> TestApp {
    build_test_app(MemoryQuestions::seeded(), config)
}

fn build_test_app(questions: MemoryQuestions, config: Config) -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let (tx, results) = mpsc::unbounded_channel();
    let profiles = Arc::new(MemoryProfiles::default());
    let leaderboard = Arc::new(MemoryLeaderboard::default());

    let loader = Arc::new(QuestionLoader::with_seed(
        Arc::new(questions),
        config.daily_timezone,
        config.question_pool_limit,
        42,
    ));

    let state = Arc::new(AppState::with_loader(
        config,
        loader,
        profiles.clone(),
        Arc::new(RecordingSink { tx }),
        leaderboard.clone(),
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
        profiles,
        leaderboard,
        results,
    }
}

impl TestApp {
    pub async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    /// Prepares a session and returns its id.
    pub async fn create_session(&self, user_id: &str, mode: &str) -> String {
        let (status, body) = self
            .send(
                "POST",
                "/api/v1/trivia/sessions",
                Some(serde_json::json!({ "user_id": user_id, "mode": mode })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["session_id"].as_str().unwrap().to_string()
    }

    pub async fn start(&self, id: &str) -> Value {
        let (status, body) = self
            .send("POST", &format!("/api/v1/trivia/sessions/{}/start", id), None)
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body
    }

    pub async fn answer(&self, id: &str, answer_index: usize) -> (StatusCode, Value) {
        self.send(
            "POST",
            &format!("/api/v1/trivia/sessions/{}/answers", id),
            Some(serde_json::json!({ "answer_index": answer_index })),
        )
        .await
    }

    pub async fn next(&self, id: &str) -> (StatusCode, Value) {
        self.send("POST", &format!("/api/v1/trivia/sessions/{}/next", id), None)
            .await
    }

    pub async fn get(&self, id: &str) -> (StatusCode, Value) {
        self.send("GET", &format!("/api/v1/trivia/sessions/{}", id), None)
            .await
    }
}
