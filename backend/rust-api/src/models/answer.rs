use serde::{Deserialize, Serialize};

use super::SessionView;
use crate::trivia::AnswerEvent;

#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub answer_index: usize,
}

#[derive(Debug, Serialize)]
pub struct SubmitAnswerResponse {
    /// False when the question was already locked and the answer was ignored.
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<AnswerEvent>,
    pub session: SessionView,
}
