use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub stripe_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub email: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub payment_type: String, // "donation" or "shirt"
    pub shirt_size: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentKind {
    Donation,
    Shirt,
}

impl PaymentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentKind::Donation => "donation",
            PaymentKind::Shirt => "shirt",
        }
    }
}

/// A completed checkout ready to be persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub stripe_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub kind: PaymentKind,
    pub shirt_size: Option<String>,
}

/// Admin list filter; `pattern` is already escaped by `db::like_pattern`
#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub payment_type: Option<String>,
    pub pattern: Option<String>,
}

impl Payment {
    /// Inserts the payment unless one with the same Stripe id exists.
    /// Returns whether a row was written.
    pub async fn insert_if_absent(pool: &PgPool, data: &NewPayment) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO payments (stripe_id, amount_cents, currency, email, name, payment_type, shirt_size)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (stripe_id) DO NOTHING
            "#,
        )
        .bind(&data.stripe_id)
        .bind(data.amount_cents)
        .bind(&data.currency)
        .bind(&data.email)
        .bind(&data.name)
        .bind(data.kind.as_str())
        .bind(&data.shirt_size)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Lists payments newest first. A negative `limit` returns every match.
    pub async fn search(
        pool: &PgPool,
        filter: &PaymentFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let payments = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM payments
            WHERE ($1::TEXT IS NULL OR payment_type = $1)
              AND ($2::TEXT IS NULL
                   OR stripe_id ILIKE $2
                   OR email ILIKE $2
                   OR name ILIKE $2
                   OR shirt_size ILIKE $2
                   OR currency ILIKE $2)
            ORDER BY created_at DESC
            LIMIT CASE WHEN $3::BIGINT < 0 THEN NULL ELSE $3::BIGINT END
            OFFSET $4::BIGINT
            "#,
        )
        .bind(&filter.payment_type)
        .bind(&filter.pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(payments)
    }

    pub async fn count_matching(pool: &PgPool, filter: &PaymentFilter) -> Result<i64, sqlx::Error> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM payments
            WHERE ($1::TEXT IS NULL OR payment_type = $1)
              AND ($2::TEXT IS NULL
                   OR stripe_id ILIKE $2
                   OR email ILIKE $2
                   OR name ILIKE $2
                   OR shirt_size ILIKE $2
                   OR currency ILIKE $2)
            "#,
        )
        .bind(&filter.payment_type)
        .bind(&filter.pattern)
        .fetch_one(pool)
        .await?;

        Ok(total)
    }
}
