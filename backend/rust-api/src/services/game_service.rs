//! Drives trivia sessions on behalf of players.
//!
//! Each live game sits behind its own async mutex. The countdown and the arcade
//! auto-advance run as spawned tasks that take the same lock, so every state
//! change is serialized per game. Tasks are bound to the game's cancellation
//! token and stop as soon as the game completes, is abandoned, or is removed.

use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::profile_service::ProfileStore;
use super::question_service::QuestionLoader;
use super::result_service::{spawn_record, ResultRecord, ResultSink};
use crate::metrics::{
    TRIVIA_ANSWERS_TOTAL, TRIVIA_REWARDS_TOTAL, TRIVIA_SESSIONS_ACTIVE, TRIVIA_SESSIONS_EVICTED_TOTAL,
    TRIVIA_SESSIONS_TOTAL,
};
use crate::models::events::{
    AnswerLocked, GameEvent, QuestionAdvanced, SessionAbandoned, SessionCompleted, TimeExpired,
    TimerTick,
};
use crate::models::SessionView;
use crate::trivia::{
    Advance, AnswerEvent, SessionOutcome, SessionState, Tick, TriviaError, TriviaMode,
    TriviaResult, TriviaSession,
};

// Room for a whole timed session: 60 ticks plus lock and advance events.
const EVENT_CHANNEL_CAPACITY: usize = 128;

/// How long games stay in the registry without activity.
#[derive(Debug, Clone, Copy)]
pub struct GameTtls {
    /// Unfinished games, measured from the last player action.
    pub idle: Duration,
    /// Finished games, measured from completion.
    pub finished: Duration,
}

#[derive(Debug, Error)]
pub enum GameError {
    #[error(transparent)]
    Trivia(#[from] TriviaError),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub struct LiveGame {
    id: Uuid,
    user_id: String,
    session: TriviaSession,
    previous_streak: u32,
    play_date: NaiveDate,
    result: Option<TriviaResult>,
    cancel: CancellationToken,
    events: broadcast::Sender<GameEvent>,
    sink: Arc<dyn ResultSink>,
    auto_advance_delay: Duration,
    touched: Instant,
}

impl LiveGame {
    pub fn view(&self) -> SessionView {
        SessionView::new(self.id, &self.user_id, &self.session, self.result.as_ref())
    }

    /// Replay of the terminal event for late subscribers.
    fn terminal_event(&self) -> Option<GameEvent> {
        match self.session.state() {
            SessionState::Complete => self.result.clone().map(|result| {
                GameEvent::SessionCompleted(SessionCompleted {
                    session_id: self.id,
                    result,
                    timestamp: Utc::now(),
                })
            }),
            SessionState::Abandoned => Some(GameEvent::SessionAbandoned(SessionAbandoned {
                session_id: self.id,
                timestamp: Utc::now(),
            })),
            _ => None,
        }
    }

    fn publish(&self, event: GameEvent) {
        // No subscribers is the common case.
        let _ = self.events.send(event);
    }

    fn touch(&mut self) {
        self.touched = Instant::now();
    }

    fn is_stale(&self, now: Instant, ttls: GameTtls) -> bool {
        let ttl = match self.session.state() {
            SessionState::Complete => ttls.finished,
            _ => ttls.idle,
        };
        now.saturating_duration_since(self.touched) >= ttl
    }

    /// Ends an unfinished game without a result. Returns false if it had already ended.
    fn abandon(&mut self) -> bool {
        self.cancel.cancel();

        let was_in_play = self.session.state().in_play();
        if !self.session.abandon() {
            return false;
        }
        if was_in_play {
            TRIVIA_SESSIONS_ACTIVE.dec();
        }
        TRIVIA_SESSIONS_TOTAL
            .with_label_values(&[self.session.mode().as_str(), "abandoned"])
            .inc();
        self.publish(GameEvent::SessionAbandoned(SessionAbandoned {
            session_id: self.id,
            timestamp: Utc::now(),
        }));
        true
    }

    fn apply_advance(&mut self, advance: Advance) {
        self.touch();
        match advance {
            Advance::Next(question_index) => self.publish(GameEvent::QuestionAdvanced(QuestionAdvanced {
                session_id: self.id,
                question_index,
                timestamp: Utc::now(),
            })),
            Advance::Complete(outcome) => self.complete(outcome),
        }
    }

    fn complete(&mut self, outcome: SessionOutcome) {
        self.cancel.cancel();
        self.touch();

        let mode = self.session.mode();
        let result = TriviaResult::from_outcome(mode, &outcome, self.previous_streak);
        let status = if outcome.expired { "expired" } else { "completed" };

        TRIVIA_SESSIONS_ACTIVE.dec();
        TRIVIA_SESSIONS_TOTAL
            .with_label_values(&[mode.as_str(), status])
            .inc();
        TRIVIA_REWARDS_TOTAL
            .with_label_values(&[mode.as_str(), "xp"])
            .inc_by(u64::from(result.xp_earned));
        TRIVIA_REWARDS_TOTAL
            .with_label_values(&[mode.as_str(), "diamonds"])
            .inc_by(u64::from(result.diamonds_earned));

        tracing::info!(
            "Trivia session {}: id={}, user={}, mode={}, correct={}/{}, xp={}, diamonds={}",
            status,
            self.id,
            self.user_id,
            mode,
            result.correct_count,
            result.total_questions,
            result.xp_earned,
            result.diamonds_earned
        );

        spawn_record(
            self.sink.clone(),
            ResultRecord {
                session_id: self.id.to_string(),
                user_id: self.user_id.clone(),
                play_date: self.play_date,
                previous_streak: self.previous_streak,
                completed_at: Utc::now(),
                result: result.clone(),
            },
        );

        self.result = Some(result.clone());
        self.publish(GameEvent::SessionCompleted(SessionCompleted {
            session_id: self.id,
            result,
            timestamp: Utc::now(),
        }));
    }
}

type SharedGame = Arc<Mutex<LiveGame>>;

/// Registry row. The owner fields are immutable, so lookups across games
/// never need the per-game lock.
struct GameEntry {
    game: SharedGame,
    user_id: String,
    mode: TriviaMode,
    play_date: NaiveDate,
}

impl GameEntry {
    fn is_daily_of(&self, user_id: &str, date: NaiveDate) -> bool {
        self.mode == TriviaMode::Daily && self.play_date == date && self.user_id == user_id
    }
}

/// Owns every live game and the collaborators needed to run them.
pub struct GameRegistry {
    games: RwLock<HashMap<Uuid, GameEntry>>,
    questions: Arc<QuestionLoader>,
    profiles: Arc<dyn ProfileStore>,
    results: Arc<dyn ResultSink>,
    auto_advance_delay: Duration,
    ttls: GameTtls,
}

impl GameRegistry {
    pub fn new(
        questions: Arc<QuestionLoader>,
        profiles: Arc<dyn ProfileStore>,
        results: Arc<dyn ResultSink>,
        auto_advance_delay: Duration,
        ttls: GameTtls,
    ) -> Self {
        Self {
            games: RwLock::new(HashMap::new()),
            questions,
            profiles,
            results,
            auto_advance_delay,
            ttls,
        }
    }

    /// The daily question is played once per user and play date. Games still
    /// in the registry count as well as results already on record.
    async fn ensure_daily_open(&self, user_id: &str, today: NaiveDate) -> Result<(), GameError> {
        let live = self
            .games
            .read()
            .await
            .values()
            .any(|entry| entry.is_daily_of(user_id, today));
        if live {
            return Err(TriviaError::DailyAlreadyPlayed.into());
        }

        match self.profiles.played_daily(user_id, today).await {
            Ok(true) => Err(TriviaError::DailyAlreadyPlayed.into()),
            Ok(false) => Ok(()),
            Err(e) => {
                tracing::warn!("Failed to check daily play for user={}, allowing: {:#}", user_id, e);
                Ok(())
            }
        }
    }

    /// Loads questions and registers an idle game.
    pub async fn prepare(&self, user_id: &str, mode: &str) -> Result<SessionView, GameError> {
        let mode: TriviaMode = mode.parse()?;
        let config = mode.config();
        let today = self.questions.today();

        if mode == TriviaMode::Daily {
            self.ensure_daily_open(user_id, today).await?;
        }

        if config.diamond_cost > 0 {
            let available = self.profiles.diamonds(user_id).await?;
            if available < config.diamond_cost {
                tracing::info!(
                    "User {} cannot afford {} ({} < {})",
                    user_id,
                    mode,
                    available,
                    config.diamond_cost
                );
                return Err(TriviaError::InsufficientDiamonds {
                    required: config.diamond_cost,
                    available,
                }
                .into());
            }
        }

        let previous_streak = match self.profiles.streak(user_id, today).await {
            Ok(streak) => streak,
            Err(e) => {
                tracing::warn!("Failed to load streak for user={}, assuming 0: {:#}", user_id, e);
                0
            }
        };

        let questions = self
            .questions
            .load_questions(mode, config.questions_count)
            .await;
        let session = TriviaSession::new(mode, questions)?;

        let id = Uuid::new_v4();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let game = LiveGame {
            id,
            user_id: user_id.to_string(),
            session,
            previous_streak,
            play_date: today,
            result: None,
            cancel: CancellationToken::new(),
            events,
            sink: self.results.clone(),
            auto_advance_delay: self.auto_advance_delay,
            touched: Instant::now(),
        };
        let view = game.view();

        {
            let mut games = self.games.write().await;
            // Re-checked under the write lock: two requests may race past the first check.
            if mode == TriviaMode::Daily && games.values().any(|entry| entry.is_daily_of(user_id, today)) {
                return Err(TriviaError::DailyAlreadyPlayed.into());
            }
            games.insert(
                id,
                GameEntry {
                    game: Arc::new(Mutex::new(game)),
                    user_id: user_id.to_string(),
                    mode,
                    play_date: today,
                },
            );
        }
        TRIVIA_SESSIONS_TOTAL
            .with_label_values(&[mode.as_str(), "prepared"])
            .inc();
        tracing::info!(
            "Trivia session prepared: id={}, user={}, mode={}, questions={}",
            id,
            user_id,
            mode,
            view.total_questions
        );

        Ok(view)
    }

    async fn game(&self, id: Uuid) -> Result<SharedGame, GameError> {
        self.games
            .read()
            .await
            .get(&id)
            .map(|entry| entry.game.clone())
            .ok_or(GameError::Trivia(TriviaError::SessionNotFound))
    }

    pub async fn view(&self, id: Uuid) -> Result<SessionView, GameError> {
        let game = self.game(id).await?;
        let game = game.lock().await;
        Ok(game.view())
    }

    /// Charges the entry fee, then starts play and, for timed modes, the countdown.
    pub async fn start(&self, id: Uuid) -> Result<SessionView, GameError> {
        let shared = self.game(id).await?;
        let mut game = shared.lock().await;
        let mode = game.session.mode();
        let cost = mode.config().diamond_cost;

        // The game lock is held across the charge, so a concurrent start sees
        // the session already running and the fee is taken once.
        if cost > 0 && game.session.state() == SessionState::Idle {
            let charged = self.profiles.deduct_diamonds(&game.user_id, cost).await?;
            if !charged {
                let available = self.profiles.diamonds(&game.user_id).await.unwrap_or(0);
                return Err(TriviaError::InsufficientDiamonds {
                    required: cost,
                    available,
                }
                .into());
            }
        }

        game.session.start(Utc::now())?;
        game.touch();

        TRIVIA_SESSIONS_ACTIVE.inc();
        TRIVIA_SESSIONS_TOTAL
            .with_label_values(&[mode.as_str(), "started"])
            .inc();
        tracing::info!("Trivia session started: id={}, mode={}", id, mode);

        if let Some(total) = game.session.time_limit() {
            spawn_countdown(shared.clone(), game.cancel.clone(), total);
        }

        Ok(game.view())
    }

    /// Returns the lock event, or `None` if the question was already locked.
    pub async fn answer(
        &self,
        id: Uuid,
        answer_index: usize,
    ) -> Result<(Option<AnswerEvent>, SessionView), GameError> {
        let shared = self.game(id).await?;
        let mut game = shared.lock().await;
        let event = game.session.select_answer(answer_index)?;

        if let Some(answer) = &event {
            game.touch();
            let mode = game.session.mode();
            TRIVIA_ANSWERS_TOTAL
                .with_label_values(&[mode.as_str(), if answer.is_correct { "true" } else { "false" }])
                .inc();
            game.publish(GameEvent::AnswerLocked(AnswerLocked {
                session_id: id,
                question_index: answer.question_index,
                answer_index: answer.answer_index,
                is_correct: answer.is_correct,
                timestamp: Utc::now(),
            }));

            if mode.config().auto_advance {
                spawn_auto_advance(shared.clone(), game.cancel.child_token(), game.auto_advance_delay);
            }
        } else {
            tracing::debug!("Ignoring repeat answer on locked question: id={}", id);
        }

        Ok((event, game.view()))
    }

    pub async fn next(&self, id: Uuid) -> Result<SessionView, GameError> {
        let shared = self.game(id).await?;
        let mut game = shared.lock().await;
        let advance = game.session.next(Utc::now())?;
        game.apply_advance(advance);
        Ok(game.view())
    }

    /// Abandons an unfinished game and drops it from the registry.
    pub async fn abandon(&self, id: Uuid) -> Result<SessionView, GameError> {
        let entry = self
            .games
            .write()
            .await
            .remove(&id)
            .ok_or(GameError::Trivia(TriviaError::SessionNotFound))?;
        let mut game = entry.game.lock().await;
        if game.abandon() {
            tracing::info!("Trivia session abandoned: id={}, user={}", id, game.user_id);
        }

        Ok(game.view())
    }

    /// Drops games past their TTL. Games busy with a request are left for the
    /// next pass. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let ttls = self.ttls;
        let mut games = self.games.write().await;
        let before = games.len();

        games.retain(|id, entry| {
            let Ok(mut game) = entry.game.try_lock() else {
                return true;
            };
            if !game.is_stale(now, ttls) {
                return true;
            }
            if game.abandon() {
                tracing::info!("Evicted idle trivia session: id={}, user={}", id, entry.user_id);
            } else {
                game.cancel.cancel();
            }
            false
        });

        let evicted = before - games.len();
        if evicted > 0 {
            TRIVIA_SESSIONS_EVICTED_TOTAL.inc_by(evicted as u64);
            tracing::debug!("Game sweep removed {} sessions, {} left", evicted, games.len());
        }
        evicted
    }

    /// Runs `sweep` every `every` until `shutdown` fires.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        self.sweep().await;
                    }
                }
            }
        })
    }

    /// Subscribes to a game's events. A game that already ended yields its
    /// terminal event so the stream can close immediately.
    pub async fn subscribe(
        &self,
        id: Uuid,
    ) -> Result<(broadcast::Receiver<GameEvent>, Option<GameEvent>), GameError> {
        let game = self.game(id).await?;
        let game = game.lock().await;
        Ok((game.events.subscribe(), game.terminal_event()))
    }

    pub async fn len(&self) -> usize {
        self.games.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn spawn_countdown(game: SharedGame, cancel: CancellationToken, total: u32) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let mut live = game.lock().await;
                    let session_id = live.id;
                    match live.session.tick(Utc::now()) {
                        Some(Tick::Remaining(remaining)) => {
                            live.publish(GameEvent::TimerTick(TimerTick {
                                session_id,
                                remaining_seconds: remaining,
                                elapsed_seconds: total.saturating_sub(remaining),
                                total_seconds: total,
                                timestamp: Utc::now(),
                            }));
                        }
                        Some(Tick::Expired(outcome)) => {
                            tracing::info!("Trivia timer expired: id={}", session_id);
                            live.publish(GameEvent::TimeExpired(TimeExpired {
                                session_id,
                                answered: outcome.answers.len(),
                                timestamp: Utc::now(),
                                message: "Time's up!".to_string(),
                            }));
                            live.complete(outcome);
                            break;
                        }
                        None => break,
                    }
                }
            }
        }
    });
}

fn spawn_auto_advance(game: SharedGame, cancel: CancellationToken, delay: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(delay) => {
                let mut game = game.lock().await;
                match game.session.advance(Utc::now()) {
                    Ok(advance) => game.apply_advance(advance),
                    Err(e) => tracing::debug!("Auto-advance skipped: id={}: {}", game.id, e),
                }
            }
        }
    });
}
