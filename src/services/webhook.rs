use ring::hmac;

use crate::models::{NewPayment, PaymentKind};
use crate::services::stripe::CheckoutSession;

/// Maximum age of a signed webhook, in seconds
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum SignatureError {
    #[error("malformed signature header")]
    Malformed,

    #[error("timestamp outside tolerance")]
    Expired,

    #[error("no matching v1 signature")]
    Mismatch,
}

/// Verifies a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=<hex>...]`)
/// against the raw request body
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
    tolerance: i64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = Some(value),
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    let issued_at: i64 = timestamp.parse().map_err(|_| SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Mismatch);
    }

    if now.abs_diff(issued_at) > tolerance.unsigned_abs() {
        return Err(SignatureError::Expired);
    }

    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let mut signed = Vec::with_capacity(timestamp.len() + 1 + payload.len());
    signed.extend_from_slice(timestamp.as_bytes());
    signed.push(b'.');
    signed.extend_from_slice(payload);

    // hmac::verify compares in constant time
    if signatures
        .iter()
        .any(|sig| hmac::verify(&key, &signed, sig).is_ok())
    {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

pub fn is_donation(session: &CheckoutSession) -> bool {
    session.submit_type.as_deref() == Some("donate")
        || session
            .metadata
            .get("source")
            .map(|s| s.to_lowercase().contains("donation"))
            .unwrap_or(false)
}

fn first_shirt_size(session: &CheckoutSession) -> Option<String> {
    let from_csv = session
        .metadata
        .get("shirt_sizes")
        .and_then(|csv| csv.split(',').map(str::trim).find(|s| !s.is_empty()))
        .map(str::to_string);

    from_csv.or_else(|| {
        let shirts: serde_json::Value = serde_json::from_str(session.metadata.get("shirts")?).ok()?;
        shirts
            .as_array()?
            .first()?
            .get("size")?
            .as_str()
            .map(str::to_string)
    })
}

/// Derives the payment row recorded for a completed Checkout Session
pub fn payment_from_session(session: &CheckoutSession) -> NewPayment {
    let details = session.customer_details.as_ref();
    let kind = if is_donation(session) {
        PaymentKind::Donation
    } else {
        PaymentKind::Shirt
    };

    NewPayment {
        stripe_id: session.id.clone(),
        amount_cents: session.amount_total.unwrap_or(0),
        currency: session
            .currency
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_else(|| "usd".to_string()),
        email: details
            .and_then(|d| d.email.clone())
            .or_else(|| session.customer_email.clone()),
        name: details.and_then(|d| d.name.clone()),
        kind,
        shirt_size: match kind {
            PaymentKind::Shirt => first_shirt_size(session),
            PaymentKind::Donation => None,
        },
    }
}
