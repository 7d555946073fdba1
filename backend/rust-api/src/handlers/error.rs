use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::services::game_service::GameError;
use crate::trivia::TriviaError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

pub fn trivia_status(err: &TriviaError) -> StatusCode {
    match err {
        TriviaError::UnknownMode(_) | TriviaError::SessionNotFound => StatusCode::NOT_FOUND,
        TriviaError::NoQuestions => StatusCode::SERVICE_UNAVAILABLE,
        TriviaError::InsufficientDiamonds { .. } => StatusCode::PAYMENT_REQUIRED,
        TriviaError::AnswerOutOfRange { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        TriviaError::NotStarted
        | TriviaError::AlreadyStarted
        | TriviaError::NotAnswered
        | TriviaError::AutoAdvance
        | TriviaError::Finished
        | TriviaError::DailyAlreadyPlayed => StatusCode::CONFLICT,
        TriviaError::InvalidQuestion { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<TriviaError> for ApiError {
    fn from(err: TriviaError) -> Self {
        Self::new(trivia_status(&err), err.to_string())
    }
}

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        match err {
            GameError::Trivia(e) => e.into(),
            GameError::Store(e) => {
                tracing::error!("Store failure: {:#}", e);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        GameError::Store(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "message": self.message,
            "status": self.status.as_u16()
        });
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_errors_are_conflicts() {
        for err in [
            TriviaError::NotStarted,
            TriviaError::AlreadyStarted,
            TriviaError::NotAnswered,
            TriviaError::AutoAdvance,
            TriviaError::Finished,
            TriviaError::DailyAlreadyPlayed,
        ] {
            assert_eq!(trivia_status(&err), StatusCode::CONFLICT, "{err}");
        }
    }

    #[test]
    fn player_facing_statuses() {
        assert_eq!(
            trivia_status(&TriviaError::UnknownMode("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            trivia_status(&TriviaError::InsufficientDiamonds {
                required: 10,
                available: 3
            }),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            trivia_status(&TriviaError::AnswerOutOfRange {
                index: 5,
                options: 4
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            trivia_status(&TriviaError::NoQuestions),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
