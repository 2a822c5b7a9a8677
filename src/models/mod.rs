// Models module - Database entity representations

pub mod attendee;
pub mod payment;
pub mod registration;
pub mod shirt_size;
pub mod speaker_poll;

pub use attendee::Attendee;
pub use payment::{NewPayment, Payment, PaymentKind};
pub use registration::{Registration, RegistrationWithAttendees};
pub use shirt_size::ShirtSize;
pub use speaker_poll::SpeakerPoll;
