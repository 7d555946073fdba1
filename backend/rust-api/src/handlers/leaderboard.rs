use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::error::ApiError;
use crate::{
    models::{LeaderboardQuery, LeaderboardResponse},
    services::AppState,
    trivia::{leaderboard::rank_entries, TriviaMode},
    utils::time::date_key,
};

/// GET /api/v1/trivia/leaderboard/{mode}?user_id=
///
/// Today's board for the mode. An unreachable store yields an empty board.
pub async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Path(mode): Path<String>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let mode: TriviaMode = mode.parse()?;
    let today = state.questions.today();

    let rows = match state
        .leaderboard
        .top(mode, today, state.config.leaderboard_limit)
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!("Failed to load {} leaderboard: {:#}", mode, e);
            Vec::new()
        }
    };

    Ok(Json(LeaderboardResponse {
        mode,
        play_date: date_key(today),
        entries: rank_entries(rows, query.user_id.as_deref()),
    }))
}
