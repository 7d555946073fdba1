use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::metrics;
use crate::services::AppState;
use crate::utils::time::date_key;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    status: &'static str,
    version: &'static str,
    live_games: usize,
    /// Play date the daily question and leaderboards currently use.
    play_date: String,
    daily_timezone: String,
    backends: BTreeMap<&'static str, BackendHealth>,
}

#[derive(Debug, Serialize)]
pub struct BackendHealth {
    healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Backends are pinged only when the state was built with them.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut backends = BTreeMap::new();

    if let Some(mongo) = &state.mongo {
        let ping = async { mongo.run_command(mongodb::bson::doc! { "ping": 1 }).await };
        backends.insert("mongodb", ping_backend(Duration::from_secs(1), ping).await);
    }
    if let Some(redis) = &state.redis {
        let mut conn = redis.clone();
        let ping = async move { redis::cmd("PING").query_async::<String>(&mut conn).await };
        backends.insert("redis", ping_backend(Duration::from_millis(500), ping).await);
    }

    let healthy = backends.values().all(|b| b.healthy);
    let report = HealthReport {
        status: if healthy { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        live_games: state.games.len().await,
        play_date: date_key(state.questions.today()),
        daily_timezone: state.config.daily_timezone.to_string(),
        backends,
    };
    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, Json(report))
}

async fn ping_backend<T, E, F>(limit: Duration, ping: F) -> BackendHealth
where
    E: std::fmt::Display,
    F: Future<Output = Result<T, E>>,
{
    let started = Instant::now();
    let error = match tokio::time::timeout(limit, ping).await {
        Ok(Ok(_)) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(_) => Some(format!("timed out after {}ms", limit.as_millis())),
    };

    BackendHealth {
        healthy: error.is_none(),
        latency_ms: error.is_none().then(|| started.elapsed().as_millis()),
        error,
    }
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

/// Guards /metrics with HTTP Basic Auth against `METRICS_AUTH` (user:password)
pub async fn metrics_auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let encoded = auth_header
        .strip_prefix("Basic ")
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let decoded = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let credentials = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

    let expected = std::env::var("METRICS_AUTH").unwrap_or_else(|_| "admin:changeme".to_string());

    if credentials != expected {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}

pub mod error;
pub mod leaderboard;
pub mod sessions;
pub mod sse;
