use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::api::middleware::session::AppState;

/// Liveness probe
async fn health() -> &'static str {
    "OK"
}

/// Readiness probe: confirms the database answers
async fn api_health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match sqlx::query_scalar::<_, DateTime<Utc>>("SELECT now()")
        .fetch_one(&state.pool)
        .await
    {
        Ok(now) => (StatusCode::OK, Json(json!({ "ok": true, "now": now }))),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false, "error": e.to_string() })),
            )
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/health", get(api_health))
}
