use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::middleware::session::AppState;
use crate::error::{AppError, Result};
use crate::services::{
    duplicate::{self, DuplicateResult},
    registration::{self, RegisterRequest, RegistrationOutcome},
};

async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<Value>> {
    let outcome = registration::register(
        &state.pool,
        &state.mailer,
        state.config.admin_email.as_deref(),
        request,
    )
    .await?;

    let body = match outcome {
        RegistrationOutcome::Created(registration) => {
            json!({ "success": true, "registration": registration })
        }
        RegistrationOutcome::Duplicate(registration) => {
            json!({ "success": true, "duplicate": true, "registration": registration })
        }
    };

    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
struct DuplicateCheckRequest {
    email: Option<String>,
    phone: Option<String>,
}

async fn check_duplicate(
    State(state): State<AppState>,
    Json(request): Json<DuplicateCheckRequest>,
) -> Result<Json<DuplicateResult>> {
    let email = request.email.as_deref().map(str::trim).filter(|e| !e.is_empty());
    let phone = request.phone.as_deref().map(str::trim).filter(|p| !p.is_empty());

    if email.is_none() && phone.is_none() {
        return Err(AppError::Validation("Email or phone is required".to_string()));
    }

    let (result, _) = duplicate::check_duplicate(&state.pool, email, phone).await?;

    Ok(Json(result))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/register", post(register))
        .route("/api/check-duplicate", post(check_duplicate))
}
