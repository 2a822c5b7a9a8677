// Services module - Business logic

pub mod checkout;
pub mod csv_export;
pub mod duplicate;
pub mod mailer;
pub mod registration;
pub mod reporting;
pub mod stripe;
pub mod webhook;
