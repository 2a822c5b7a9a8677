use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use conference_site::api::{
    self,
    middleware::session::{create_session_layer, AppState},
};
use conference_site::config::Config;
use conference_site::db;
use conference_site::jobs::payment_reconciler;
use conference_site::services::mailer::Mailer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conference_site=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting conference site...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Create session layer
    let session_layer = create_session_layer(pool.clone(), config.cookies_secure()).await?;
    tracing::info!("Session layer initialized");

    let mailer = Mailer::from_config(&config)?;

    // Build application state
    let state = AppState::new(pool.clone(), config.clone(), mailer);

    // Keep the scheduler alive for the lifetime of the server
    let _scheduler = match (&config.reconcile_cron, &state.stripe) {
        (Some(cron), Some(stripe)) => {
            Some(payment_reconciler::start_scheduler(pool.clone(), stripe.clone(), cron).await?)
        }
        (Some(_), None) => {
            tracing::warn!("RECONCILE_CRON set without STRIPE_SECRET_KEY; reconciliation disabled");
            None
        }
        _ => None,
    };

    // Build router
    let app = api::router(state)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, cleaning up...");
}
