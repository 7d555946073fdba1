use crate::config::Config;
use mongodb::{Client as MongoClient, Database};
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;

use game_service::GameRegistry;
use leaderboard_service::{LeaderboardStore, RedisLeaderboard};
use profile_service::{MongoProfileStore, ProfileStore};
use question_service::{MongoQuestionStore, QuestionLoader, QuestionStore};
use result_service::{MongoResultSink, ResultSink};

pub mod game_service;
pub mod leaderboard_service;
pub mod profile_service;
pub mod question_service;
pub mod result_service;

pub struct AppState {
    pub config: Config,
    /// Backends are absent when the state is assembled from in-memory stores.
    pub mongo: Option<Database>,
    pub redis: Option<ConnectionManager>,
    pub questions: Arc<QuestionLoader>,
    pub leaderboard: Arc<dyn LeaderboardStore>,
    pub games: Arc<GameRegistry>,
}

impl AppState {
    pub async fn new(
        config: Config,
        mongo_client: MongoClient,
        redis_client: redis::Client,
    ) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);

        tracing::info!("Attempting to connect to Redis...");

        let redis = tokio::time::timeout(
            Duration::from_secs(30),
            ConnectionManager::new(redis_client),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

        tracing::info!("Redis ConnectionManager created, testing with PING...");

        let mut conn = redis.clone();
        tokio::time::timeout(
            Duration::from_secs(5),
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

        tracing::info!("Redis connection established successfully");

        let leaderboard: Arc<dyn LeaderboardStore> = Arc::new(RedisLeaderboard::new(redis.clone()));
        let questions: Arc<dyn QuestionStore> = Arc::new(MongoQuestionStore::new(mongo.clone()));
        let profiles: Arc<dyn ProfileStore> = Arc::new(MongoProfileStore::new(mongo.clone()));
        let results: Arc<dyn ResultSink> =
            Arc::new(MongoResultSink::new(mongo.clone(), leaderboard.clone()));

        let mut state = Self::from_parts(config, questions, profiles, results, leaderboard);
        state.mongo = Some(mongo);
        state.redis = Some(redis);
        Ok(state)
    }

    /// Wires the services over arbitrary stores.
    pub fn from_parts(
        config: Config,
        questions: Arc<dyn QuestionStore>,
        profiles: Arc<dyn ProfileStore>,
        results: Arc<dyn ResultSink>,
        leaderboard: Arc<dyn LeaderboardStore>,
    ) -> Self {
        let loader = Arc::new(QuestionLoader::new(
            questions,
            config.daily_timezone,
            config.question_pool_limit,
        ));
        Self::with_loader(config, loader, profiles, results, leaderboard)
    }

    pub fn with_loader(
        config: Config,
        questions: Arc<QuestionLoader>,
        profiles: Arc<dyn ProfileStore>,
        results: Arc<dyn ResultSink>,
        leaderboard: Arc<dyn LeaderboardStore>,
    ) -> Self {
        let games = Arc::new(GameRegistry::new(
            questions.clone(),
            profiles,
            results,
            Duration::from_millis(config.auto_advance_delay_ms),
            config.game_ttls(),
        ));

        Self {
            config,
            mongo: None,
            redis: None,
            questions,
            leaderboard,
            games,
        }
    }
}
