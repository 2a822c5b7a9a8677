use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{attendee::Attendee, Registration};

pub const DUPLICATE_MESSAGE: &str =
    "It looks like you've already registered. Would you like to purchase a shirt?";

/// Which record the contact details matched on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchVia {
    Registration,
    Attendee,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateResult {
    pub duplicate: bool,
    pub existing_id: Option<Uuid>,
    pub via: Option<MatchVia>,
    pub contact_name: Option<String>,
    pub attendees_count: usize,
    pub message: Option<&'static str>,
}

impl DuplicateResult {
    pub fn none() -> Self {
        Self {
            duplicate: false,
            existing_id: None,
            via: None,
            contact_name: None,
            attendees_count: 0,
            message: None,
        }
    }
}

/// Trims and lower-cases an email; blank input is `None`
pub fn normalize_email(value: Option<&str>) -> Option<String> {
    let v = value?.trim().to_lowercase();
    if v.is_empty() {
        None
    } else {
        Some(v)
    }
}

/// Keeps the digits of a phone number, at most the last ten
pub fn normalize_phone_last10(value: Option<&str>) -> Option<String> {
    let digits: String = value?.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let skip = digits.len().saturating_sub(10);
    Some(digits[skip..].to_string())
}

/// Decides whether a found registration matched on its own contact details
/// or only through one of its attendees
pub fn classify_match(
    registration: &Registration,
    email: Option<&str>,
    phone_last10: Option<&str>,
) -> MatchVia {
    let email_hit = email.is_some_and(|e| registration.contact_email == e);
    let phone_hit = phone_last10.is_some_and(|last10| {
        registration
            .contact_phone
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect::<String>()
            .ends_with(last10)
    });

    if email_hit || phone_hit {
        MatchVia::Registration
    } else {
        MatchVia::Attendee
    }
}

/// Looks for an earlier registration by email or phone, checking the primary
/// contact and every attendee
#[tracing::instrument(skip_all)]
pub async fn check_duplicate(
    pool: &PgPool,
    email: Option<&str>,
    phone: Option<&str>,
) -> Result<(DuplicateResult, Option<Registration>), sqlx::Error> {
    let clean_email = normalize_email(email);
    let last10 = normalize_phone_last10(phone);

    if clean_email.is_none() && last10.is_none() {
        return Ok((DuplicateResult::none(), None));
    }

    let Some(existing) =
        Registration::find_duplicate(pool, clean_email.as_deref(), last10.as_deref()).await?
    else {
        return Ok((DuplicateResult::none(), None));
    };

    let attendees = Attendee::list_for_registration(pool, existing.id).await?;
    let via = classify_match(&existing, clean_email.as_deref(), last10.as_deref());

    tracing::info!(
        registration_id = %existing.id,
        via = ?via,
        "Duplicate registration found"
    );

    let result = DuplicateResult {
        duplicate: true,
        existing_id: Some(existing.id),
        via: Some(via),
        contact_name: Some(existing.contact_name.clone()),
        attendees_count: attendees.len(),
        message: Some(DUPLICATE_MESSAGE),
    };

    Ok((result, Some(existing)))
}
