use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use super::attendee::{Attendee, NewAttendee};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: Uuid,
    pub contact_name: String,
    pub contact_phone: String,
    pub contact_email: String,
    pub contact_address: Option<String>,
    pub prayer_request: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A registration together with its attendees, as returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationWithAttendees {
    #[serde(flatten)]
    pub registration: Registration,
    pub attendees: Vec<Attendee>,
}

#[derive(Debug, Clone)]
pub struct NewRegistration {
    pub contact_name: String,
    pub contact_phone: String,
    pub contact_email: String,
    pub contact_address: Option<String>,
    pub prayer_request: Option<String>,
}

impl Registration {
    /// Inserts a registration and its attendees in one transaction
    pub async fn create_with_attendees(
        pool: &PgPool,
        data: NewRegistration,
        attendees: Vec<NewAttendee>,
    ) -> Result<RegistrationWithAttendees, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let registration = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO registrations (contact_name, contact_phone, contact_email, contact_address, prayer_request)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&data.contact_name)
        .bind(&data.contact_phone)
        .bind(&data.contact_email)
        .bind(&data.contact_address)
        .bind(&data.prayer_request)
        .fetch_one(&mut *tx)
        .await?;

        let mut created = Vec::with_capacity(attendees.len());
        for attendee in attendees {
            created.push(Attendee::create(&mut tx, registration.id, attendee).await?);
        }

        tx.commit().await?;

        Ok(RegistrationWithAttendees {
            registration,
            attendees: created,
        })
    }

    /// Finds the oldest registration whose contact or any attendee matches the
    /// normalised email, or whose phone digits end with `phone_last10`
    pub async fn find_duplicate(
        pool: &PgPool,
        email: Option<&str>,
        phone_last10: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let registration = sqlx::query_as::<_, Self>(
            r#"
            SELECT r.* FROM registrations r
            WHERE ($1::TEXT IS NOT NULL AND r.contact_email = $1)
               OR ($2::TEXT IS NOT NULL
                   AND regexp_replace(r.contact_phone, '[^0-9]', '', 'g') LIKE '%' || $2)
               OR EXISTS (
                   SELECT 1 FROM attendees a
                   WHERE a.registration_id = r.id
                     AND (($1::TEXT IS NOT NULL AND a.email = $1)
                       OR ($2::TEXT IS NOT NULL
                           AND regexp_replace(COALESCE(a.phone, ''), '[^0-9]', '', 'g') LIKE '%' || $2))
               )
            ORDER BY r.created_at ASC
            LIMIT 1
            "#,
        )
        .bind(email)
        .bind(phone_last10)
        .fetch_optional(pool)
        .await?;

        Ok(registration)
    }

    /// Lists registrations newest first, optionally filtered by a search pattern
    /// (already escaped by `db::like_pattern`)
    pub async fn search(
        pool: &PgPool,
        pattern: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let registrations = sqlx::query_as::<_, Self>(
            r#"
            SELECT r.* FROM registrations r
            WHERE $1::TEXT IS NULL
               OR r.contact_name ILIKE $1
               OR r.contact_email ILIKE $1
               OR r.contact_phone ILIKE $1
               OR EXISTS (
                   SELECT 1 FROM attendees a
                   WHERE a.registration_id = r.id AND a.name ILIKE $1
               )
            ORDER BY r.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(registrations)
    }

    pub async fn count_matching(pool: &PgPool, pattern: Option<&str>) -> Result<i64, sqlx::Error> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM registrations r
            WHERE $1::TEXT IS NULL
               OR r.contact_name ILIKE $1
               OR r.contact_email ILIKE $1
               OR r.contact_phone ILIKE $1
               OR EXISTS (
                   SELECT 1 FROM attendees a
                   WHERE a.registration_id = r.id AND a.name ILIKE $1
               )
            "#,
        )
        .bind(pattern)
        .fetch_one(pool)
        .await?;

        Ok(total)
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let registrations = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM registrations ORDER BY created_at DESC
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(registrations)
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM registrations")
            .fetch_one(pool)
            .await
    }

    /// Loads the attendees for each registration, preserving input order
    pub async fn with_attendees(
        pool: &PgPool,
        registrations: Vec<Self>,
    ) -> Result<Vec<RegistrationWithAttendees>, sqlx::Error> {
        let ids: Vec<Uuid> = registrations.iter().map(|r| r.id).collect();
        let attendees = Attendee::list_for_registrations(pool, &ids).await?;
        Ok(attach_attendees(registrations, attendees))
    }
}

/// Groups attendees under their registration
pub fn attach_attendees(
    registrations: Vec<Registration>,
    attendees: Vec<Attendee>,
) -> Vec<RegistrationWithAttendees> {
    let mut by_registration: HashMap<Uuid, Vec<Attendee>> = HashMap::new();
    for attendee in attendees {
        by_registration
            .entry(attendee.registration_id)
            .or_default()
            .push(attendee);
    }

    registrations
        .into_iter()
        .map(|registration| {
            let attendees = by_registration.remove(&registration.id).unwrap_or_default();
            RegistrationWithAttendees {
                registration,
                attendees,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(name: &str) -> Registration {
        Registration {
            id: Uuid::new_v4(),
            contact_name: name.to_string(),
            contact_phone: "555-0100".to_string(),
            contact_email: format!("{}@example.com", name.to_lowercase()),
            contact_address: None,
            prayer_request: None,
            created_at: Utc::now(),
        }
    }

    fn attendee(registration_id: Uuid, name: &str) -> Attendee {
        Attendee {
            id: Uuid::new_v4(),
            registration_id,
            name: name.to_string(),
            phone: None,
            email: None,
            address: None,
            notes: None,
            wants_shirt: false,
            shirt_size: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_attach_attendees_groups_by_registration() {
        let first = registration("Ann");
        let second = registration("Bob");
        let attendees = vec![
            attendee(second.id, "Bob"),
            attendee(first.id, "Ann"),
            attendee(second.id, "Carl"),
        ];

        let grouped = attach_attendees(vec![first.clone(), second.clone()], attendees);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].registration.id, first.id);
        assert_eq!(grouped[0].attendees.len(), 1);
        assert_eq!(grouped[1].attendees.len(), 2);
        assert_eq!(grouped[1].attendees[1].name, "Carl");
    }

    #[test]
    fn test_serialized_registration_is_camel_case_and_flat() {
        let reg = registration("Ann");
        let id = reg.id;
        let value = serde_json::to_value(RegistrationWithAttendees {
            registration: reg,
            attendees: vec![attendee(id, "Ann")],
        })
        .unwrap();

        assert_eq!(value["contactName"], "Ann");
        assert!(value["attendees"].is_array());
        assert_eq!(value["attendees"][0]["registrationId"], id.to_string());
    }

    fn new_registration(name: &str, phone: &str, email: &str) -> NewRegistration {
        NewRegistration {
            contact_name: name.to_string(),
            contact_phone: phone.to_string(),
            contact_email: email.to_string(),
            contact_address: None,
            prayer_request: None,
        }
    }

    fn new_attendee(name: &str, email: Option<&str>, phone: Option<&str>) -> NewAttendee {
        NewAttendee {
            name: name.to_string(),
            phone: phone.map(str::to_string),
            email: email.map(str::to_string),
            address: None,
            notes: None,
            shirt_size: None,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_create_persists_registration_and_attendees(pool: PgPool) {
        let created = Registration::create_with_attendees(
            &pool,
            new_registration("Ann", "(555) 010-0100", "ann@example.com"),
            vec![
                new_attendee("Ann", None, None),
                new_attendee("Bea", None, None),
                new_attendee("Cal", None, None),
            ],
        )
        .await
        .unwrap();

        assert_eq!(Registration::count(&pool).await.unwrap(), 1);

        let stored = Attendee::list_for_registration(&pool, created.registration.id)
            .await
            .unwrap();
        let names: Vec<&str> = stored.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Ann", "Bea", "Cal"]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_duplicate_contact_email_is_already_registered(pool: PgPool) {
        Registration::create_with_attendees(
            &pool,
            new_registration("Ann", "5550100100", "ann@example.com"),
            vec![new_attendee("Ann", None, None)],
        )
        .await
        .unwrap();

        let err = Registration::create_with_attendees(
            &pool,
            new_registration("Ann Again", "5550100199", "ann@example.com"),
            vec![new_attendee("Ann Again", None, None)],
        )
        .await
        .unwrap_err();

        match crate::error::AppError::from_registration_insert(err) {
            crate::error::AppError::AlreadyRegistered { field } => {
                assert_eq!(field.as_deref(), Some("registrations_contact_email_key"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // The failed transaction leaves no stray attendees behind
        assert_eq!(Registration::count(&pool).await.unwrap(), 1);
        assert_eq!(Attendee::count(&pool).await.unwrap(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_find_duplicate_matches_phone_suffix_and_attendee_email(pool: PgPool) {
        let created = Registration::create_with_attendees(
            &pool,
            new_registration("Ann", "+1 (555) 010-0100", "ann@example.com"),
            vec![
                new_attendee("Ann", None, None),
                new_attendee("Bea", Some("bea@example.com"), Some("555.222.3333")),
            ],
        )
        .await
        .unwrap();
        let id = created.registration.id;

        let by_phone = Registration::find_duplicate(&pool, None, Some("5550100100"))
            .await
            .unwrap();
        assert_eq!(by_phone.map(|r| r.id), Some(id));

        let by_attendee_email = Registration::find_duplicate(&pool, Some("bea@example.com"), None)
            .await
            .unwrap();
        assert_eq!(by_attendee_email.map(|r| r.id), Some(id));

        let by_attendee_phone = Registration::find_duplicate(&pool, None, Some("5552223333"))
            .await
            .unwrap();
        assert_eq!(by_attendee_phone.map(|r| r.id), Some(id));

        let unknown = Registration::find_duplicate(&pool, Some("zed@example.com"), Some("5559999999"))
            .await
            .unwrap();
        assert!(unknown.is_none());

        let nothing = Registration::find_duplicate(&pool, None, None).await.unwrap();
        assert!(nothing.is_none());
    }
}
