use sqlx::PgPool;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::Config;
use crate::error::AppError;
use crate::services::{mailer::Mailer, stripe::StripeClient};

/// Session keys used in the application
pub const SESSION_KEY_ADMIN: &str = "admin_authenticated";

/// Admin sessions end after this long without a request
pub const SESSION_IDLE_HOURS: i64 = 8;

/// Creates the Postgres-backed session layer for Axum
pub async fn create_session_layer(
    pool: PgPool,
    secure: bool,
) -> Result<SessionManagerLayer<PostgresStore>, sqlx::Error> {
    let session_store = PostgresStore::new(pool);
    session_store.migrate().await?;

    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(secure)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::hours(SESSION_IDLE_HOURS)));

    Ok(session_layer)
}

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub stripe: Option<StripeClient>,
    pub mailer: Mailer,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config, mailer: Mailer) -> Self {
        let stripe = config
            .stripe_secret_key
            .clone()
            .map(|key| StripeClient::new(&config.stripe_api_base, key));

        if stripe.is_none() {
            tracing::warn!("STRIPE_SECRET_KEY not set; checkout is disabled");
        }

        Self {
            pool,
            config,
            stripe,
            mailer,
        }
    }

    /// The Stripe client, or 503 when no secret key is configured
    pub fn stripe(&self) -> Result<&StripeClient, AppError> {
        self.stripe
            .as_ref()
            .ok_or_else(|| AppError::NotConfigured("Stripe".to_string()))
    }
}
