use chrono::{Duration, Utc};
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::models::Payment;
use crate::services::{
    stripe::{StripeClient, StripeError},
    webhook::payment_from_session,
};

const LOOKBACK_HOURS: i64 = 24;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub sessions_seen: usize,
    pub unpaid_skipped: usize,
    pub inserted: usize,
    pub already_recorded: usize,
    pub db_errors: usize,
}

/// Backfills payments whose webhook never arrived
///
/// Lists Checkout Sessions created in the last 24 hours, skips the unpaid
/// ones and records each paid session that has no payment row yet.
pub async fn reconcile_payments(
    pool: &PgPool,
    stripe: &StripeClient,
) -> Result<ReconcileStats, StripeError> {
    let since = (Utc::now() - Duration::hours(LOOKBACK_HOURS)).timestamp();
    let sessions = stripe.list_checkout_sessions(since).await?;

    let mut stats = ReconcileStats {
        sessions_seen: sessions.len(),
        ..Default::default()
    };

    tracing::info!(
        sessions = stats.sessions_seen,
        "Starting payment reconciliation"
    );

    for session in sessions {
        if !session.is_paid() {
            stats.unpaid_skipped += 1;
            continue;
        }

        let payment = payment_from_session(&session);
        match Payment::insert_if_absent(pool, &payment).await {
            Ok(true) => {
                tracing::info!(stripe_id = %payment.stripe_id, "Recorded missing payment");
                stats.inserted += 1;
            }
            Ok(false) => stats.already_recorded += 1,
            Err(e) => {
                tracing::error!(
                    stripe_id = %payment.stripe_id,
                    error = %e,
                    "Database error during reconciliation"
                );
                stats.db_errors += 1;
            }
        }
    }

    tracing::info!(?stats, "Payment reconciliation completed");

    Ok(stats)
}

/// Schedules `reconcile_payments` on the given cron expression (seconds first)
pub async fn start_scheduler(
    pool: PgPool,
    stripe: StripeClient,
    cron: &str,
) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(cron, move |_id, _scheduler| {
        let pool = pool.clone();
        let stripe = stripe.clone();
        Box::pin(async move {
            if let Err(e) = reconcile_payments(&pool, &stripe).await {
                tracing::error!(error = %e, "Payment reconciliation failed");
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    tracing::info!(cron = %cron, "Payment reconciliation scheduled");

    Ok(scheduler)
}
