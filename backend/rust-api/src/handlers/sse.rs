use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

use super::error::ApiError;
use crate::{extractors::SessionId, metrics::SSE_CONNECTIONS_ACTIVE, models::events::GameEvent, services::AppState};

/// SSE endpoint for live game events
/// GET /api/v1/trivia/sessions/{id}/stream
pub async fn session_stream(
    State(state): State<Arc<AppState>>,
    SessionId(id): SessionId,
) -> Result<impl IntoResponse, ApiError> {
    let (rx, replay) = state.games.subscribe(id).await?;
    tracing::info!("Client connected to SSE stream: session={}", id);

    Ok(Sse::new(event_stream(rx, replay)).keep_alive(KeepAlive::default()))
}

/// Keeps the connection gauge honest however the stream ends.
struct ConnectionGuard;

impl ConnectionGuard {
    fn new() -> Self {
        SSE_CONNECTIONS_ACTIVE.inc();
        Self
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        SSE_CONNECTIONS_ACTIVE.dec();
    }
}

struct StreamState {
    rx: broadcast::Receiver<GameEvent>,
    replay: Option<GameEvent>,
    finished: bool,
    _guard: ConnectionGuard,
}

fn to_sse(event: &GameEvent) -> Event {
    Event::default()
        .event(event.event_name())
        .data(event.to_sse_data())
}

/// Forwards game events until a terminal one has been sent.
fn event_stream(
    rx: broadcast::Receiver<GameEvent>,
    replay: Option<GameEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let initial = StreamState {
        rx,
        replay,
        finished: false,
        _guard: ConnectionGuard::new(),
    };

    stream::unfold(initial, |mut st| async move {
        if st.finished {
            return None;
        }

        if let Some(event) = st.replay.take() {
            st.finished = true;
            return Some((Ok(to_sse(&event)), st));
        }

        loop {
            match st.rx.recv().await {
                Ok(event) => {
                    st.finished = event.is_terminal();
                    return Some((Ok(to_sse(&event)), st));
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("SSE client lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}
