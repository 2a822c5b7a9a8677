use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::ShirtSize;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub id: Uuid,
    pub registration_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub wants_shirt: bool,
    pub shirt_size: Option<String>, // XS, S, M, L, XL, 2XL, 3XL
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttendee {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub shirt_size: Option<ShirtSize>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ShirtCount {
    pub size: Option<String>,
    pub count: i64,
}

impl Attendee {
    /// Inserts one attendee inside an open transaction
    pub async fn create(
        tx: &mut Transaction<'_, Postgres>,
        registration_id: Uuid,
        data: NewAttendee,
    ) -> Result<Self, sqlx::Error> {
        let attendee = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO attendees (registration_id, name, phone, email, address, notes, wants_shirt, shirt_size)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(registration_id)
        .bind(&data.name)
        .bind(&data.phone)
        .bind(&data.email)
        .bind(&data.address)
        .bind(&data.notes)
        .bind(data.shirt_size.is_some())
        .bind(data.shirt_size.map(|s| s.as_str()))
        .fetch_one(&mut **tx)
        .await?;

        Ok(attendee)
    }

    pub async fn list_for_registration(
        pool: &PgPool,
        registration_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        Self::list_for_registrations(pool, &[registration_id]).await
    }

    pub async fn list_for_registrations(
        pool: &PgPool,
        registration_ids: &[Uuid],
    ) -> Result<Vec<Self>, sqlx::Error> {
        if registration_ids.is_empty() {
            return Ok(Vec::new());
        }

        let attendees = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM attendees
            WHERE registration_id = ANY($1)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(registration_ids)
        .fetch_all(pool)
        .await?;

        Ok(attendees)
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM attendees")
            .fetch_one(pool)
            .await
    }

    /// Number of attendees wanting a shirt, per size
    pub async fn shirt_counts(pool: &PgPool) -> Result<Vec<ShirtCount>, sqlx::Error> {
        let counts = sqlx::query_as::<_, ShirtCount>(
            r#"
            SELECT shirt_size AS size, COUNT(*) AS count
            FROM attendees
            WHERE wants_shirt = TRUE
            GROUP BY shirt_size
            ORDER BY shirt_size
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(counts)
    }
}
