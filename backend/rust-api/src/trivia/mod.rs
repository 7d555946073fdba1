//! Trivia core: mode registry, reward formulas and the per-session state machine.
//!
//! Everything in here is synchronous and deterministic. Storage, clocks and
//! timers are supplied by the callers in `services`.

use thiserror::Error;

pub mod leaderboard;
pub mod modes;
pub mod question;
pub mod rewards;
pub mod session;

pub use modes::{TriviaMode, TriviaModeConfig};
pub use question::{Category, Difficulty, TriviaQuestion};
pub use rewards::{calculate_diamonds, calculate_xp, carried_streak, Grade, TriviaResult};
pub use session::{Advance, AnswerEvent, SessionOutcome, SessionState, Tick, TriviaSession};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriviaError {
    #[error("Unknown trivia mode: {0}")]
    UnknownMode(String),

    #[error("No questions available. Please try again later.")]
    NoQuestions,

    #[error("Question {id} is malformed: {reason}")]
    InvalidQuestion { id: String, reason: String },

    #[error("Not enough diamonds: {required} required, {available} available")]
    InsufficientDiamonds { required: u32, available: u32 },

    #[error("Answer index {index} is out of range ({options} options)")]
    AnswerOutOfRange { index: usize, options: usize },

    #[error("Session has not started")]
    NotStarted,

    #[error("Session already started")]
    AlreadyStarted,

    #[error("Current question has not been answered")]
    NotAnswered,

    #[error("Questions advance automatically in this mode")]
    AutoAdvance,

    #[error("Session is finished")]
    Finished,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Daily trivia already played today. Come back tomorrow!")]
    DailyAlreadyPlayed,
}
