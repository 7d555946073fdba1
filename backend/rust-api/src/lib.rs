use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod trivia;
pub mod utils;

pub use config::Config;
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    // The web client talks to the API from its own origin
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .nest("/api/v1/trivia", trivia_routes().layer(cors))
        .with_state(app_state)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn trivia_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/modes", get(handlers::sessions::list_modes))
        .route(
            "/leaderboard/{mode}",
            get(handlers::leaderboard::get_leaderboard),
        )
        .route("/sessions", post(handlers::sessions::create_session))
        .route(
            "/sessions/{id}",
            get(handlers::sessions::get_session).delete(handlers::sessions::abandon_session),
        )
        .route(
            "/sessions/{id}/start",
            post(handlers::sessions::start_session),
        )
        .route(
            "/sessions/{id}/answers",
            post(handlers::sessions::submit_answer),
        )
        .route(
            "/sessions/{id}/next",
            post(handlers::sessions::next_question),
        )
        .route(
            "/sessions/{id}/stream",
            get(handlers::sse::session_stream),
        )
}
