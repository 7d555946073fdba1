use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{TriviaError, TriviaMode, TriviaQuestion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Presenting,
    Locked,
    Complete,
    Abandoned,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Complete | SessionState::Abandoned)
    }

    pub fn in_play(self) -> bool {
        matches!(self, SessionState::Presenting | SessionState::Locked)
    }
}

/// Emitted once per locked answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerEvent {
    pub question_index: usize,
    pub answer_index: usize,
    pub is_correct: bool,
    pub correct_index: usize,
}

/// Raw result of a finished session, before rewards are applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub answers: Vec<usize>,
    pub correct_count: u32,
    pub total_questions: u32,
    pub time_spent: u32,
    pub time_remaining: u32,
    /// True when the countdown ended the session.
    pub expired: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    Next(usize),
    Complete(SessionOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    Remaining(u32),
    Expired(SessionOutcome),
}

/// One play-through of a mode.
///
/// `answers` is append-only and parallel to `questions`; at most one answer is
/// recorded per question. The outcome is produced exactly once, by whichever of
/// `advance` or `tick` moves the session into `Complete`.
#[derive(Debug, Clone)]
pub struct TriviaSession {
    mode: TriviaMode,
    questions: Vec<TriviaQuestion>,
    current_index: usize,
    answers: Vec<usize>,
    selected_answer: Option<usize>,
    time_limit: Option<u32>,
    time_remaining: Option<u32>,
    started_at: Option<DateTime<Utc>>,
    state: SessionState,
}

impl TriviaSession {
    pub fn new(mode: TriviaMode, questions: Vec<TriviaQuestion>) -> Result<Self, TriviaError> {
        if questions.is_empty() {
            return Err(TriviaError::NoQuestions);
        }
        for question in &questions {
            question.validate()?;
        }

        let time_limit = mode.config().time_limit;

        Ok(Self {
            mode,
            questions,
            current_index: 0,
            answers: Vec::new(),
            selected_answer: None,
            time_limit,
            time_remaining: time_limit,
            started_at: None,
            state: SessionState::Idle,
        })
    }

    pub fn mode(&self) -> TriviaMode {
        self.mode
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn questions(&self) -> &[TriviaQuestion] {
        &self.questions
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_question(&self) -> &TriviaQuestion {
        &self.questions[self.current_index]
    }

    pub fn answers(&self) -> &[usize] {
        &self.answers
    }

    pub fn selected_answer(&self) -> Option<usize> {
        self.selected_answer
    }

    pub fn time_limit(&self) -> Option<u32> {
        self.time_limit
    }

    pub fn time_remaining(&self) -> Option<u32> {
        self.time_remaining
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), TriviaError> {
        match self.state {
            SessionState::Idle => {
                self.started_at = Some(now);
                self.state = SessionState::Presenting;
                Ok(())
            }
            SessionState::Complete | SessionState::Abandoned => Err(TriviaError::Finished),
            SessionState::Presenting | SessionState::Locked => Err(TriviaError::AlreadyStarted),
        }
    }

    /// Locks the current question. A repeat answer on a locked question is a
    /// no-op and returns `Ok(None)`.
    pub fn select_answer(&mut self, answer_index: usize) -> Result<Option<AnswerEvent>, TriviaError> {
        match self.state {
            SessionState::Presenting => {}
            SessionState::Locked => return Ok(None),
            SessionState::Idle => return Err(TriviaError::NotStarted),
            SessionState::Complete | SessionState::Abandoned => return Err(TriviaError::Finished),
        }

        let question = &self.questions[self.current_index];
        if answer_index >= question.options.len() {
            return Err(TriviaError::AnswerOutOfRange {
                index: answer_index,
                options: question.options.len(),
            });
        }

        let event = AnswerEvent {
            question_index: self.current_index,
            answer_index,
            is_correct: question.is_correct(answer_index),
            correct_index: question.correct_index,
        };

        self.selected_answer = Some(answer_index);
        self.answers.push(answer_index);
        self.state = SessionState::Locked;

        Ok(Some(event))
    }

    /// Player-issued "next". Rejected in modes that advance on their own.
    pub fn next(&mut self, now: DateTime<Utc>) -> Result<Advance, TriviaError> {
        if self.mode.config().auto_advance && self.state == SessionState::Locked {
            return Err(TriviaError::AutoAdvance);
        }
        self.advance(now)
    }

    /// Moves past a locked question, completing the session after the last one.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Result<Advance, TriviaError> {
        match self.state {
            SessionState::Locked => {}
            SessionState::Presenting => return Err(TriviaError::NotAnswered),
            SessionState::Idle => return Err(TriviaError::NotStarted),
            SessionState::Complete | SessionState::Abandoned => return Err(TriviaError::Finished),
        }

        if self.current_index + 1 >= self.questions.len() {
            return Ok(Advance::Complete(self.finish(now, false)));
        }

        self.current_index += 1;
        self.selected_answer = None;
        self.state = SessionState::Presenting;

        Ok(Advance::Next(self.current_index))
    }

    /// One countdown step. `None` when untimed or not in play.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Tick> {
        if !self.state.in_play() {
            return None;
        }

        let left = self.time_remaining?.saturating_sub(1);
        self.time_remaining = Some(left);

        if left == 0 {
            Some(Tick::Expired(self.finish(now, true)))
        } else {
            Some(Tick::Remaining(left))
        }
    }

    /// Returns false if the session was already over.
    pub fn abandon(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = SessionState::Abandoned;
        true
    }

    pub fn correct_count(&self) -> u32 {
        self.answers
            .iter()
            .zip(&self.questions)
            .filter(|(answer, question)| question.is_correct(**answer))
            .count() as u32
    }

    fn finish(&mut self, now: DateTime<Utc>, expired: bool) -> SessionOutcome {
        self.state = SessionState::Complete;
        if expired {
            self.time_remaining = Some(0);
        }

        let time_spent = self
            .started_at
            .map(|started| (now - started).num_seconds().max(0) as u32)
            .unwrap_or(0);

        SessionOutcome {
            answers: self.answers.clone(),
            correct_count: self.correct_count(),
            total_questions: self.questions.len() as u32,
            time_spent,
            time_remaining: self.time_remaining.unwrap_or(0),
            expired,
        }
    }
}
