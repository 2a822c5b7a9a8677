// Background jobs

pub mod payment_reconciler;
