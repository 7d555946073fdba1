use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use validator::Validate;

use super::error::ApiError;
use crate::{
    extractors::{AppJson, SessionId},
    models::{
        answer::{SubmitAnswerRequest, SubmitAnswerResponse},
        CreateSessionRequest, ModeInfo,
    },
    services::AppState,
};

/// GET /api/v1/trivia/modes
pub async fn list_modes() -> impl IntoResponse {
    Json(ModeInfo::all())
}

/// POST /api/v1/trivia/sessions
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<CreateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(format!("Validation error: {}", e)))?;

    tracing::info!("Creating trivia session: user_id={}, mode={}", req.user_id, req.mode);

    let view = state.games.prepare(&req.user_id, &req.mode).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/v1/trivia/sessions/{id}
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    SessionId(id): SessionId,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.games.view(id).await?;
    Ok(Json(view))
}

/// POST /api/v1/trivia/sessions/{id}/start
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    SessionId(id): SessionId,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("Starting trivia session: {}", id);

    let view = state.games.start(id).await?;
    Ok(Json(view))
}

/// POST /api/v1/trivia/sessions/{id}/answers
pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    SessionId(id): SessionId,
    AppJson(req): AppJson<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("Submitting answer for session {}: {}", id, req.answer_index);

    let (answer, session) = state.games.answer(id, req.answer_index).await?;
    Ok(Json(SubmitAnswerResponse {
        accepted: answer.is_some(),
        answer,
        session,
    }))
}

/// POST /api/v1/trivia/sessions/{id}/next
pub async fn next_question(
    State(state): State<Arc<AppState>>,
    SessionId(id): SessionId,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.games.next(id).await?;
    Ok(Json(view))
}

/// DELETE /api/v1/trivia/sessions/{id}
pub async fn abandon_session(
    State(state): State<Arc<AppState>>,
    SessionId(id): SessionId,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("Abandoning trivia session: {}", id);

    let view = state.games.abandon(id).await?;
    Ok(Json(view))
}
