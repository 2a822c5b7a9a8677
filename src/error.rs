use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::stripe::StripeError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Stripe error: {0}")]
    Stripe(#[from] StripeError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already registered")]
    AlreadyRegistered { field: Option<String> },

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Database(ref e) => {
                tracing::error!(error = %e, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Database error" }),
                )
            }
            AppError::Stripe(ref e) => {
                tracing::error!(error = %e, "Stripe request failed");
                (
                    StatusCode::BAD_GATEWAY,
                    json!({ "error": "Payment provider error" }),
                )
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::AlreadyRegistered { field } => (
                StatusCode::CONFLICT,
                json!({
                    "error": "Already registered",
                    "duplicate": true,
                    "field": field,
                }),
            ),
            AppError::NotConfigured(msg) => {
                tracing::warn!(what = %msg, "Feature not configured");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    json!({ "error": format!("{} is not configured", msg) }),
                )
            }
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, json!({ "error": "Unauthorized" })),
            AppError::Session(ref e) => {
                tracing::error!(error = %e, "Session store error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Session error" }),
                )
            }
            AppError::Internal(ref e) => {
                tracing::error!(error = ?e, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl AppError {
    /// Maps a unique-constraint violation on the registrations table to a 409
    pub fn from_registration_insert(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.code().as_deref() == Some("23505") {
                return AppError::AlreadyRegistered {
                    field: db_err.constraint().map(str::to_string),
                };
            }
        }
        AppError::Database(err)
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
