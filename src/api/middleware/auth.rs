use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use ring::hmac;
use secrecy::{ExposeSecret, Secret};
use tower_sessions::Session;

use super::session::SESSION_KEY_ADMIN;
use crate::error::AppError;

pub const LOGIN_PATH: &str = "/admin/login";
pub const DASHBOARD_PATH: &str = "/admin";

/// Compares a submitted password with the configured one in constant time,
/// via an HMAC keyed by the session secret
pub fn password_matches(
    attempt: &str,
    expected: &Secret<String>,
    session_secret: &Secret<String>,
) -> bool {
    let key = hmac::Key::new(hmac::HMAC_SHA256, session_secret.expose_secret().as_bytes());
    let expected_tag = hmac::sign(&key, expected.expose_secret().as_bytes());
    hmac::verify(&key, attempt.as_bytes(), expected_tag.as_ref()).is_ok()
}

/// Only same-site admin paths are valid post-login destinations
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path)
            if path.starts_with(DASHBOARD_PATH)
                && !path.starts_with("//")
                && !path.contains("://") =>
        {
            path
        }
        _ => DASHBOARD_PATH,
    }
}

/// Login page URL that returns to `next` afterwards
pub fn login_redirect_url(next: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("{}?next={}", LOGIN_PATH, encoded)
}

pub async fn is_admin(session: &Session) -> Result<bool, AppError> {
    Ok(session
        .get::<bool>(SESSION_KEY_ADMIN)
        .await?
        .unwrap_or(false))
}

/// Marks the session as authenticated, issuing a fresh session id
pub async fn log_in(session: &Session) -> Result<(), AppError> {
    session.cycle_id().await?;
    session.insert(SESSION_KEY_ADMIN, true).await?;
    Ok(())
}

pub async fn log_out(session: &Session) -> Result<(), AppError> {
    session.flush().await?;
    Ok(())
}

/// Middleware for admin HTML pages: redirects to the login form
pub async fn require_admin(session: Session, request: Request, next: Next) -> Response {
    match is_admin(&session).await {
        Ok(true) => next.run(request).await,
        Ok(false) => {
            let target = request
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or(DASHBOARD_PATH);
            tracing::debug!(path = %target, "Admin page requested without a session");
            Redirect::to(&login_redirect_url(target)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Middleware for admin JSON and CSV endpoints: answers 401
pub async fn require_admin_api(
    session: Session,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !is_admin(&session).await? {
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}
