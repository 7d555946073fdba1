use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::trivia::{
    leaderboard::RankedEntry, Difficulty, SessionState, TriviaMode, TriviaModeConfig,
    TriviaResult, TriviaSession,
};

pub mod answer;
pub mod events;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSessionRequest {
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
    pub mode: String,
}

#[derive(Debug, Serialize)]
pub struct ModeInfo {
    pub key: TriviaMode,
    #[serde(flatten)]
    pub config: &'static TriviaModeConfig,
}

impl ModeInfo {
    pub fn all() -> Vec<ModeInfo> {
        TriviaMode::ALL
            .into_iter()
            .map(|key| ModeInfo {
                key,
                config: key.config(),
            })
            .collect()
    }
}

/// Player-facing question; the correct index is never part of it.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub id: String,
    pub category: String,
    pub category_name: &'static str,
    pub difficulty: Difficulty,
    pub question: String,
    pub options: Vec<String>,
}

/// Snapshot of a live game as shown to the player.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub user_id: String,
    pub mode: TriviaMode,
    pub state: SessionState,
    pub question_number: usize,
    pub total_questions: usize,
    pub time_limit: Option<u32>,
    pub time_remaining: Option<u32>,
    pub question: Option<QuestionView>,
    pub selected_answer: Option<usize>,
    /// Revealed once the current question is locked.
    pub correct_index: Option<usize>,
    pub explanation: Option<String>,
    pub answers_submitted: usize,
    pub result: Option<TriviaResult>,
}

impl SessionView {
    pub fn new(
        session_id: Uuid,
        user_id: &str,
        session: &TriviaSession,
        result: Option<&TriviaResult>,
    ) -> Self {
        let state = session.state();
        let current = session.current_question();
        let locked = state == SessionState::Locked;

        let question = (!state.is_terminal()).then(|| QuestionView {
            id: current.id.clone(),
            category: current.category.clone(),
            category_name: current.category_name(),
            difficulty: current.difficulty,
            question: current.question.clone(),
            options: current.options.clone(),
        });

        let explanation = if locked && session.mode().config().show_explanations {
            current.explanation.clone()
        } else {
            None
        };

        Self {
            session_id,
            user_id: user_id.to_string(),
            mode: session.mode(),
            state,
            question_number: session.current_index() + 1,
            total_questions: session.questions().len(),
            time_limit: session.time_limit(),
            time_remaining: session.time_remaining(),
            question,
            selected_answer: session.selected_answer(),
            correct_index: locked.then_some(current.correct_index),
            explanation,
            answers_submitted: session.answers().len(),
            result: result.cloned(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub mode: TriviaMode,
    pub play_date: String,
    pub entries: Vec<RankedEntry>,
}
