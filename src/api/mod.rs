// API module - HTTP endpoints

pub mod admin;
pub mod checkout;
pub mod health;
pub mod middleware;
pub mod pages;
pub mod poll;
pub mod registrations;
pub mod webhook;

use axum::{routing::get_service, Router};
use std::path::Path;
use tower_http::services::ServeDir;

use middleware::session::AppState;

/// Every route of the site. The session layer is added by the caller so tests
/// can substitute an in-memory store.
pub fn router(state: AppState) -> Router {
    let static_dir = Path::new("web").join("static");

    Router::new()
        .merge(health::router())
        .merge(pages::router())
        .merge(registrations::router())
        .merge(checkout::router())
        .merge(webhook::router())
        .merge(poll::router())
        .merge(admin::router())
        .nest_service("/static", get_service(ServeDir::new(&static_dir)))
        .nest_service(
            "/images",
            get_service(ServeDir::new(static_dir.join("images"))),
        )
        .with_state(state)
}
