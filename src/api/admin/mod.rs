// Admin dashboard: login, HTML pages, JSON reports and CSV exports

pub mod login;
pub mod pages;
pub mod reports;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::api::middleware::auth::{require_admin, require_admin_api};
use crate::api::middleware::session::AppState;

pub fn router() -> Router<AppState> {
    let public = Router::new()
        .route("/admin/login", get(login::login_page).post(login::login_submit))
        .route("/admin/logout", post(login::logout))
        .route("/api/admin/login", post(login::api_login));

    let pages = Router::new()
        .route("/admin", get(pages::dashboard))
        .route("/admin/payments", get(pages::payments))
        .route("/admin/poll", get(pages::poll))
        .route("/admin/poll/reset", post(pages::reset_poll))
        .route_layer(middleware::from_fn(require_admin));

    let api = Router::new()
        .route("/api/admin/registrations", get(reports::registrations))
        .route("/api/admin/export", get(reports::export_registrations))
        .route("/api/admin/payments", get(reports::payments))
        .route("/api/admin/payments/export", get(reports::export_payments))
        .route(
            "/api/admin/poll",
            get(reports::poll).post(reports::poll_action),
        )
        .route("/api/admin/poll/export", get(reports::export_poll))
        .route("/api/admin/stats", get(reports::stats))
        .route_layer(middleware::from_fn(require_admin_api));

    public.merge(pages).merge(api)
}
