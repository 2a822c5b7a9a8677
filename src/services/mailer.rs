use html_escape::encode_text;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::ExposeSecret;

use crate::config::Config;
use crate::models::RegistrationWithAttendees;

const SENDER_NAME: &str = "AVAILABLE Conference";

#[derive(thiserror::Error, Debug)]
pub enum MailError {
    #[error("Invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Sends transactional email through an SMTP relay. Without credentials
/// every send is logged and skipped.
#[derive(Clone)]
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Option<Mailbox>,
}

impl Mailer {
    pub fn from_config(config: &Config) -> Result<Self, MailError> {
        let (Some(user), Some(pass)) = (&config.email_user, &config.email_pass) else {
            tracing::warn!("EMAIL_USER/EMAIL_PASS not set, outbound email disabled");
            return Ok(Self::disabled());
        };

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
            .credentials(Credentials::new(
                user.clone(),
                pass.expose_secret().clone(),
            ))
            .build();

        let from = Mailbox::new(Some(SENDER_NAME.to_string()), user.parse()?);

        Ok(Self {
            transport: Some(transport),
            from: Some(from),
        })
    }

    pub fn disabled() -> Self {
        Self {
            transport: None,
            from: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    #[tracing::instrument(skip(self, email), fields(subject = %email.subject))]
    pub async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        let (Some(transport), Some(from)) = (&self.transport, &self.from) else {
            tracing::debug!("Email disabled, skipping send");
            return Ok(());
        };

        let message = Message::builder()
            .from(from.clone())
            .to(email.to.parse()?)
            .subject(email.subject)
            .header(ContentType::TEXT_HTML)
            .body(email.html)?;

        transport.send(message).await?;

        tracing::info!("Email sent");
        Ok(())
    }

    /// Sends the contact confirmation and the admin notification in the
    /// background. Failures are logged and never reach the caller.
    pub fn send_registration_emails(
        &self,
        registration: &RegistrationWithAttendees,
        admin_email: Option<&str>,
    ) {
        if !self.is_enabled() {
            return;
        }

        let mut emails = vec![confirmation_email(registration)];
        if let Some(admin) = admin_email {
            emails.push(admin_notification_email(registration, admin));
        }

        let mailer = self.clone();
        let registration_id = registration.registration.id;
        tokio::spawn(async move {
            for email in emails {
                if let Err(e) = mailer.send(email).await {
                    tracing::warn!(
                        registration_id = %registration_id,
                        error = %e,
                        "Failed to send registration email"
                    );
                }
            }
        });
    }
}

pub fn confirmation_email(registration: &RegistrationWithAttendees) -> OutgoingEmail {
    let reg = &registration.registration;

    let prayer = reg
        .prayer_request
        .as_deref()
        .map(|p| {
            format!(
                "<p>We have also received your prayer request and our team will be praying for you:</p>\n<blockquote>{}</blockquote>\n",
                encode_text(p)
            )
        })
        .unwrap_or_default();

    let html = format!(
        "<h2>Hi {},</h2>\n\
         <p>Thank you for registering for the <strong>AVAILABLE Conference</strong>!</p>\n\
         <p><strong>Tickets Reserved:</strong> {}</p>\n\
         <p>We can't wait to see you there!</p>\n\
         {}\
         <p>The AVAILABLE Conference Team</p>\n",
        encode_text(&reg.contact_name),
        registration.attendees.len(),
        prayer,
    );

    OutgoingEmail {
        to: reg.contact_email.clone(),
        subject: "Your AVAILABLE Conference Registration is Confirmed!".to_string(),
        html,
    }
}

pub fn admin_notification_email(
    registration: &RegistrationWithAttendees,
    admin_email: &str,
) -> OutgoingEmail {
    let reg = &registration.registration;

    let attendee_items: String = registration
        .attendees
        .iter()
        .map(|a| {
            format!(
                "<li>{} ({}) - Shirt Size: {}</li>",
                encode_text(&a.name),
                encode_text(a.phone.as_deref().unwrap_or("N/A")),
                encode_text(a.shirt_size.as_deref().unwrap_or("N/A")),
            )
        })
        .collect();

    let prayer = reg
        .prayer_request
        .as_deref()
        .map(|p| format!("<p><strong>Prayer Request:</strong> {}</p>\n", encode_text(p)))
        .unwrap_or_default();

    let html = format!(
        "<h2>New Registration Received</h2>\n\
         <p><strong>Name:</strong> {}</p>\n\
         <p><strong>Phone:</strong> {}</p>\n\
         <p><strong>Email:</strong> {}</p>\n\
         <p><strong>Tickets:</strong> {}</p>\n\
         {}\
         <h3>Attendees:</h3>\n<ul>{}</ul>\n",
        encode_text(&reg.contact_name),
        encode_text(&reg.contact_phone),
        encode_text(&reg.contact_email),
        registration.attendees.len(),
        prayer,
        attendee_items,
    );

    OutgoingEmail {
        to: admin_email.to_string(),
        subject: "New Conference Registration Submitted".to_string(),
        html,
    }
}
