use serde::Deserialize;
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::{
    attendee::{Attendee, NewAttendee},
    registration::NewRegistration,
    Registration, RegistrationWithAttendees, ShirtSize,
};
use crate::services::{duplicate, mailer::Mailer};

/// One additional attendee as entered in the registration form
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeInput {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub shirt_size: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub contact_address: Option<String>,
    pub prayer_request: Option<String>,
    #[serde(default)]
    pub attendees: Vec<AttendeeInput>,
    #[serde(default)]
    pub primary_wants_shirt: bool,
    pub primary_shirt_size: Option<String>,
}

/// Contact fields after validation and normalisation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedContact {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: Option<String>,
    pub prayer_request: Option<String>,
}

pub enum RegistrationOutcome {
    Created(RegistrationWithAttendees),
    Duplicate(RegistrationWithAttendees),
}

fn clean_string(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn validate_contact(request: &RegisterRequest) -> Result<ValidatedContact, AppError> {
    let name = clean_string(request.contact_name.as_deref());
    let phone = clean_string(request.contact_phone.as_deref());
    let email = duplicate::normalize_email(request.contact_email.as_deref());

    match (name, phone, email) {
        (Some(name), Some(phone), Some(email)) if email.contains('@') => Ok(ValidatedContact {
            name,
            phone,
            email,
            address: clean_string(request.contact_address.as_deref()),
            prayer_request: clean_string(request.prayer_request.as_deref()),
        }),
        _ => Err(AppError::Validation(
            "Missing or invalid contact fields".to_string(),
        )),
    }
}

/// Cleans the submitted attendee rows and makes sure the primary contact is
/// on the list, first, unless one of the rows already describes them
pub fn build_attendees(
    inputs: &[AttendeeInput],
    contact: &ValidatedContact,
    primary_wants_shirt: bool,
    primary_shirt_size: Option<&str>,
) -> Result<Vec<NewAttendee>, AppError> {
    let mut attendees: Vec<NewAttendee> = inputs
        .iter()
        .map(|a| NewAttendee {
            name: a.name.as_deref().unwrap_or("").trim().to_string(),
            phone: clean_string(a.phone.as_deref()),
            email: clean_string(a.email.as_deref()).map(|e| e.to_lowercase()),
            address: clean_string(a.address.as_deref()),
            notes: clean_string(a.notes.as_deref()),
            shirt_size: a.shirt_size.as_deref().and_then(ShirtSize::parse),
        })
        .filter(|a| !a.name.is_empty() || a.email.is_some() || a.phone.is_some())
        .collect();

    let primary = NewAttendee {
        name: contact.name.clone(),
        phone: Some(contact.phone.clone()),
        email: Some(contact.email.clone()),
        address: contact.address.clone(),
        notes: None,
        shirt_size: if primary_wants_shirt {
            primary_shirt_size.and_then(ShirtSize::parse)
        } else {
            None
        },
    };

    let already_listed = attendees.iter().any(|a| {
        let name_match = !a.name.is_empty() && a.name.to_lowercase() == primary.name.to_lowercase();
        let email_match = a.email.is_some() && a.email == primary.email;
        let phone_match = a.phone.is_some() && a.phone == primary.phone;
        name_match || email_match || phone_match
    });

    if !already_listed {
        attendees.insert(0, primary);
    }

    if attendees.first().map_or(true, |a| a.name.is_empty()) {
        return Err(AppError::Validation(
            "At least one attendee is required".to_string(),
        ));
    }

    Ok(attendees)
}

/// Handles a registration form submission
///
/// 1. Validates and normalises the contact fields
/// 2. Returns the existing registration if the contact already registered
/// 3. Cleans the attendee list and persists everything in one transaction
/// 4. Queues the confirmation and admin emails in the background
#[tracing::instrument(skip(pool, mailer, request))]
pub async fn register(
    pool: &PgPool,
    mailer: &Mailer,
    admin_email: Option<&str>,
    request: RegisterRequest,
) -> Result<RegistrationOutcome, AppError> {
    let contact = validate_contact(&request)?;

    tracing::info!(
        attendee_rows = request.attendees.len(),
        "Registration request received"
    );

    let (dup, existing) =
        duplicate::check_duplicate(pool, Some(&contact.email), Some(&contact.phone)).await?;
    if let (true, Some(existing)) = (dup.duplicate, existing) {
        tracing::info!(
            registration_id = %existing.id,
            "Existing registration found, returning it"
        );
        let attendees = Attendee::list_for_registration(pool, existing.id).await?;
        return Ok(RegistrationOutcome::Duplicate(RegistrationWithAttendees {
            registration: existing,
            attendees,
        }));
    }

    let attendees = build_attendees(
        &request.attendees,
        &contact,
        request.primary_wants_shirt,
        request.primary_shirt_size.as_deref(),
    )?;

    let created = Registration::create_with_attendees(
        pool,
        NewRegistration {
            contact_name: contact.name.clone(),
            contact_phone: contact.phone.clone(),
            contact_email: contact.email.clone(),
            contact_address: contact.address.clone(),
            prayer_request: contact.prayer_request.clone(),
        },
        attendees,
    )
    .await
    .map_err(AppError::from_registration_insert)?;

    tracing::info!(
        registration_id = %created.registration.id,
        attendees = created.attendees.len(),
        "Registration created"
    );

    mailer.send_registration_emails(&created, admin_email);

    Ok(RegistrationOutcome::Created(created))
}
