use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;

use crate::api::middleware::session::AppState;
use crate::error::{AppError, Result};
use crate::models::Payment;
use crate::services::stripe::CheckoutSession;
use crate::services::webhook::{self, SIGNATURE_TOLERANCE_SECS};

const SIGNATURE_HEADER: &str = "stripe-signature";
const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

#[derive(Debug, Deserialize)]
struct StripeEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: serde_json::Value,
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let secret = state
        .config
        .stripe_webhook_secret
        .as_ref()
        .ok_or_else(|| AppError::NotConfigured("Stripe webhook secret".to_string()))?;

    let Some(signature) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        return Ok(bad_request("Missing Stripe signature"));
    };

    if let Err(e) = webhook::verify_signature(
        &body,
        signature,
        secret.expose_secret(),
        Utc::now().timestamp(),
        SIGNATURE_TOLERANCE_SECS,
    ) {
        tracing::warn!(error = %e, "Rejected webhook signature");
        return Ok(bad_request("Invalid signature"));
    }

    match serde_json::from_slice::<StripeEvent>(&body) {
        Ok(event) if event.event_type == CHECKOUT_COMPLETED => {
            record_completed_checkout(&state, event.data.object).await;
        }
        Ok(event) => {
            tracing::debug!(event_type = %event.event_type, "Ignoring webhook event");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Signed webhook body is not a Stripe event");
        }
    }

    Ok(Json(json!({ "received": true })).into_response())
}

/// Persists the payment for a completed session. Failures are logged only.
async fn record_completed_checkout(state: &AppState, object: serde_json::Value) {
    let embedded: CheckoutSession = match serde_json::from_value(object) {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(error = %e, "Completed checkout event without a session object");
            return;
        }
    };

    let session = match &state.stripe {
        Some(stripe) => match stripe.retrieve_checkout_session(&embedded.id).await {
            Ok(full) => full,
            Err(e) => {
                tracing::warn!(
                    session_id = %embedded.id,
                    error = %e,
                    "Could not expand session; using event payload"
                );
                embedded
            }
        },
        None => embedded,
    };

    let payment = webhook::payment_from_session(&session);
    match Payment::insert_if_absent(&state.pool, &payment).await {
        Ok(true) => tracing::info!(
            stripe_id = %payment.stripe_id,
            kind = payment.kind.as_str(),
            amount_cents = payment.amount_cents,
            "Payment recorded"
        ),
        Ok(false) => tracing::info!(stripe_id = %payment.stripe_id, "Payment already recorded"),
        Err(e) => tracing::error!(
            stripe_id = %payment.stripe_id,
            error = %e,
            "Failed to persist payment"
        ),
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/stripe/webhook", post(stripe_webhook))
}
