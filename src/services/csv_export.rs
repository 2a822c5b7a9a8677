use chrono::{DateTime, SecondsFormat, Utc};

use crate::models::{Payment, RegistrationWithAttendees, SpeakerPoll};

pub const CONTENT_TYPE: &str = "text/csv; charset=utf-8";

const REGISTRATION_HEADERS: [&str; 10] = [
    "createdAt",
    "contactName",
    "contactEmail",
    "contactPhone",
    "contactAddress",
    "attendeeName",
    "attendeeEmail",
    "attendeePhone",
    "wantsShirt",
    "shirtSize",
];

const PAYMENT_HEADERS: [&str; 8] = [
    "createdAt",
    "type",
    "amountUSD",
    "currency",
    "name",
    "email",
    "shirtSize",
    "stripeId",
];

const POLL_HEADERS: [&str; 4] = ["speaker", "votes", "createdAt", "updatedAt"];

/// Double-quotes a field, doubling embedded quotes
fn quote(value: Option<&str>) -> String {
    format!("\"{}\"", value.unwrap_or("").replace('"', "\"\""))
}

fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// One line per attendee; a registration with no attendees still gets a line
pub fn registrations_csv(rows: &[RegistrationWithAttendees]) -> String {
    let mut lines = vec![REGISTRATION_HEADERS.join(",")];

    for row in rows {
        let reg = &row.registration;
        let contact = [
            timestamp(&reg.created_at),
            quote(Some(&reg.contact_name)),
            quote(Some(&reg.contact_email)),
            quote(Some(&reg.contact_phone)),
            quote(reg.contact_address.as_deref()),
        ]
        .join(",");

        if row.attendees.is_empty() {
            lines.push(format!("{contact},,,,,"));
            continue;
        }

        for attendee in &row.attendees {
            lines.push(format!(
                "{},{},{},{},{},{}",
                contact,
                quote(Some(&attendee.name)),
                quote(attendee.email.as_deref()),
                quote(attendee.phone.as_deref()),
                if attendee.wants_shirt { "YES" } else { "NO" },
                quote(attendee.shirt_size.as_deref()),
            ));
        }
    }

    lines.join("\n")
}

pub fn payments_csv(rows: &[Payment]) -> String {
    let mut lines = vec![PAYMENT_HEADERS.join(",")];

    for p in rows {
        lines.push(
            [
                timestamp(&p.created_at),
                p.payment_type.clone(),
                format!("{:.2}", p.amount_cents as f64 / 100.0),
                p.currency.to_uppercase(),
                quote(p.name.as_deref()),
                quote(p.email.as_deref()),
                quote(p.shirt_size.as_deref()),
                p.stripe_id.clone(),
            ]
            .join(","),
        );
    }

    lines.join("\n")
}

pub fn poll_csv(rows: &[SpeakerPoll]) -> String {
    let mut lines = vec![POLL_HEADERS.join(",")];

    for r in rows {
        lines.push(format!(
            "{},{},{},{}",
            quote(Some(&r.speaker)),
            r.votes,
            timestamp(&r.created_at),
            timestamp(&r.updated_at),
        ));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attendee, Registration};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 1, 14, 30, 0).unwrap()
    }

    fn registration(attendees: Vec<Attendee>) -> RegistrationWithAttendees {
        RegistrationWithAttendees {
            registration: Registration {
                id: Uuid::new_v4(),
                contact_name: "Pat \"PJ\" Doe".to_string(),
                contact_phone: "555-0100".to_string(),
                contact_email: "pat@example.com".to_string(),
                contact_address: None,
                prayer_request: None,
                created_at: at(),
            },
            attendees,
        }
    }

    fn attendee(name: &str, shirt: Option<&str>) -> Attendee {
        Attendee {
            id: Uuid::new_v4(),
            registration_id: Uuid::new_v4(),
            name: name.to_string(),
            phone: None,
            email: Some("kid@example.com".to_string()),
            address: None,
            notes: None,
            wants_shirt: shirt.is_some(),
            shirt_size: shirt.map(str::to_string),
            created_at: at(),
        }
    }

    #[test]
    fn test_quote_doubles_quotes() {
        assert_eq!(quote(Some("a\"b")), "\"a\"\"b\"");
        assert_eq!(quote(None), "\"\"");
    }

    #[test]
    fn test_timestamp_has_milliseconds() {
        assert_eq!(timestamp(&at()), "2025-09-01T14:30:00.000Z");
    }

    #[test]
    fn test_registrations_csv_one_line_per_attendee() {
        let csv = registrations_csv(&[registration(vec![
            attendee("Pat", Some("L")),
            attendee("Kid", None),
        ])]);
        let lines: Vec<&str> = csv.split('\n').collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], REGISTRATION_HEADERS.join(","));
        assert_eq!(
            lines[1],
            "2025-09-01T14:30:00.000Z,\"Pat \"\"PJ\"\" Doe\",\"pat@example.com\",\"555-0100\",\"\",\"Pat\",\"kid@example.com\",\"\",YES,\"L\""
        );
        assert!(lines[2].ends_with(",\"Kid\",\"kid@example.com\",\"\",NO,\"\""));
    }

    #[test]
    fn test_registration_without_attendees_has_empty_columns() {
        let csv = registrations_csv(&[registration(Vec::new())]);
        let line = csv.split('\n').nth(1).unwrap();
        assert!(line.ends_with("\"\",,,,,"));
        assert_eq!(line.split(',').count(), 10);
    }

    #[test]
    fn test_payments_csv() {
        let payment = Payment {
            id: Uuid::new_v4(),
            stripe_id: "cs_1".to_string(),
            amount_cents: 2550,
            currency: "usd".to_string(),
            email: None,
            name: Some("Donor".to_string()),
            payment_type: "donation".to_string(),
            shirt_size: None,
            created_at: at(),
        };
        let csv = payments_csv(&[payment]);
        assert_eq!(
            csv.split('\n').nth(1),
            Some("2025-09-01T14:30:00.000Z,donation,25.50,USD,\"Donor\",\"\",\"\",cs_1")
        );
    }

    #[test]
    fn test_poll_csv() {
        let row = SpeakerPoll {
            id: Uuid::new_v4(),
            speaker: "Ashley May".to_string(),
            votes: 7,
            created_at: at(),
            updated_at: at(),
        };
        assert_eq!(
            poll_csv(&[row]),
            "speaker,votes,createdAt,updatedAt\n\"Ashley May\",7,2025-09-01T14:30:00.000Z,2025-09-01T14:30:00.000Z"
        );
    }
}
