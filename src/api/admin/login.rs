use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;

use crate::api::middleware::auth::{self, LOGIN_PATH};
use crate::api::middleware::session::AppState;
use crate::error::Result;

#[derive(Template)]
#[template(path = "admin/login.html")]
pub struct LoginTemplate {
    pub next: String,
    pub failed: bool,
}

fn check_password(state: &AppState, attempt: Option<&str>) -> bool {
    auth::password_matches(
        attempt.unwrap_or(""),
        &state.config.admin_dash_password,
        &state.config.session_secret,
    )
}

#[derive(Debug, Deserialize)]
pub struct ApiLogin {
    password: Option<String>,
}

pub async fn api_login(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<ApiLogin>,
) -> Result<Response> {
    if !check_password(&state, request.password.as_deref()) {
        tracing::warn!("Admin API login failed");
        return Ok((StatusCode::UNAUTHORIZED, Json(json!({ "ok": false }))).into_response());
    }

    auth::log_in(&session).await?;
    tracing::info!("Admin logged in via API");

    Ok(Json(json!({ "ok": true })).into_response())
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    next: Option<String>,
}

pub async fn login_page(Query(query): Query<LoginQuery>) -> LoginTemplate {
    LoginTemplate {
        next: auth::safe_next(query.next.as_deref()).to_string(),
        failed: false,
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    password: Option<String>,
    next: Option<String>,
}

pub async fn login_submit(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let next = auth::safe_next(form.next.as_deref()).to_string();

    if !check_password(&state, form.password.as_deref()) {
        tracing::warn!("Admin login failed");
        let page = LoginTemplate { next, failed: true };
        return Ok((StatusCode::UNAUTHORIZED, page).into_response());
    }

    auth::log_in(&session).await?;
    tracing::info!(next = %next, "Admin logged in");

    Ok(Redirect::to(&next).into_response())
}

pub async fn logout(session: Session) -> Result<Redirect> {
    auth::log_out(&session).await?;
    Ok(Redirect::to(LOGIN_PATH))
}
