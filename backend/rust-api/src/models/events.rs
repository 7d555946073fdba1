use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::trivia::TriviaResult;

/// Events published by a live game and streamed to clients over SSE.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum GameEvent {
    TimerTick(TimerTick),
    TimeExpired(TimeExpired),
    AnswerLocked(AnswerLocked),
    QuestionAdvanced(QuestionAdvanced),
    SessionCompleted(SessionCompleted),
    SessionAbandoned(SessionAbandoned),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TimerTick {
    pub session_id: Uuid,
    pub remaining_seconds: u32,
    pub elapsed_seconds: u32,
    pub total_seconds: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TimeExpired {
    pub session_id: Uuid,
    pub answered: usize,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AnswerLocked {
    pub session_id: Uuid,
    pub question_index: usize,
    pub answer_index: usize,
    pub is_correct: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QuestionAdvanced {
    pub session_id: Uuid,
    pub question_index: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionCompleted {
    pub session_id: Uuid,
    pub result: TriviaResult,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionAbandoned {
    pub session_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl GameEvent {
    pub fn to_sse_data(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            GameEvent::TimerTick(_) => "timer-tick",
            GameEvent::TimeExpired(_) => "time-expired",
            GameEvent::AnswerLocked(_) => "answer-locked",
            GameEvent::QuestionAdvanced(_) => "question-advanced",
            GameEvent::SessionCompleted(_) => "session-completed",
            GameEvent::SessionAbandoned(_) => "session-abandoned",
        }
    }

    /// Nothing follows a terminal event on the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GameEvent::SessionCompleted(_) | GameEvent::SessionAbandoned(_)
        )
    }
}
