use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::db::like_pattern;
use crate::models::{
    attendee::ShirtCount, Attendee, Payment, Registration, RegistrationWithAttendees,
};
use crate::models::payment::PaymentFilter;
use crate::services::stripe::{CheckoutSession, StripeClient};
use crate::services::webhook::is_donation;

pub const REGISTRATIONS_DEFAULT_TAKE: i64 = 50;
pub const REGISTRATIONS_MAX_TAKE: i64 = 200;
pub const PAYMENTS_DEFAULT_TAKE: i64 = 25;
pub const PAYMENTS_MAX_TAKE: i64 = 100;
const DONATION_WINDOW_DAYS: i64 = 30;

/// Parses an integer query value, falling back to `default` when missing or
/// malformed, then clamps it
pub fn parse_clamped(raw: Option<&str>, default: i64, min: i64, max: i64) -> i64 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(default)
        .clamp(min, max)
}

/// Escaped ILIKE pattern for a search box value; `None` when blank
pub fn search_pattern(q: Option<&str>) -> Option<String> {
    q.map(str::trim).filter(|q| !q.is_empty()).map(like_pattern)
}

fn type_filter(payment_type: Option<&str>) -> Option<String> {
    payment_type
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
}

#[derive(Debug, Serialize)]
pub struct RegistrationPage {
    pub rows: Vec<RegistrationWithAttendees>,
    pub total: i64,
}

pub async fn registrations_page(
    pool: &PgPool,
    q: Option<&str>,
    take: i64,
    skip: i64,
) -> Result<RegistrationPage, sqlx::Error> {
    let pattern = search_pattern(q);
    let registrations = Registration::search(pool, pattern.as_deref(), take, skip).await?;
    let total = Registration::count_matching(pool, pattern.as_deref()).await?;
    let rows = Registration::with_attendees(pool, registrations).await?;

    Ok(RegistrationPage { rows, total })
}

#[derive(Debug, Serialize)]
pub struct PaymentPage {
    pub rows: Vec<Payment>,
    pub total: i64,
    pub page: i64,
    pub take: i64,
}

pub fn payment_filter(q: Option<&str>, payment_type: Option<&str>) -> PaymentFilter {
    PaymentFilter {
        payment_type: type_filter(payment_type),
        pattern: search_pattern(q),
    }
}

pub async fn payments_page(
    pool: &PgPool,
    filter: &PaymentFilter,
    page: i64,
    take: i64,
) -> Result<PaymentPage, sqlx::Error> {
    let rows = Payment::search(pool, filter, take, page * take).await?;
    let total = Payment::count_matching(pool, filter).await?;

    Ok(PaymentPage {
        rows,
        total,
        page,
        take,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub registrations: i64,
    pub attendees: i64,
    pub shirts: Vec<ShirtCount>,
    pub donations_usd: Option<f64>,
}

/// Dollar total of paid donation sessions
pub fn sum_donations(sessions: &[CheckoutSession]) -> f64 {
    let cents: i64 = sessions
        .iter()
        .filter(|s| s.is_paid() && is_donation(s))
        .map(|s| s.amount_total.unwrap_or(0))
        .sum();
    cents as f64 / 100.0
}

async fn recent_donations(stripe: &StripeClient) -> Option<f64> {
    let since = (Utc::now() - Duration::days(DONATION_WINDOW_DAYS)).timestamp();
    match stripe.list_checkout_sessions(since).await {
        Ok(sessions) => Some(sum_donations(&sessions)),
        Err(e) => {
            tracing::warn!(error = %e, "Could not load donation total from Stripe");
            None
        }
    }
}

pub async fn load_stats(pool: &PgPool, stripe: Option<&StripeClient>) -> Result<Stats, sqlx::Error> {
    let registrations = Registration::count(pool).await?;
    let attendees = Attendee::count(pool).await?;
    let shirts = Attendee::shirt_counts(pool).await?;

    let donations_usd = match stripe {
        Some(client) => recent_donations(client).await,
        None => None,
    };

    Ok(Stats {
        registrations,
        attendees,
        shirts,
        donations_usd,
    })
}
