use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;

use crate::api::middleware::session::AppState;
use crate::error::Result;
use crate::services::checkout::{
    self, DonationRequest, ShirtCheckoutRequest, ShirtPricing,
};

fn session_failed(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
        .into_response()
}

async fn donation(
    State(state): State<AppState>,
    Json(request): Json<DonationRequest>,
) -> Result<Response> {
    let unit_amount = checkout::parse_donation_amount(&request.amount)?;
    let stripe = state.stripe()?;

    let params = checkout::donation_params(unit_amount, &request, &state.config.base_url);

    match checkout::create_donation_session(stripe, &params).await {
        Ok(session) => {
            tracing::info!(session_id = %session.id, amount_cents = unit_amount, "Donation checkout started");
            Ok(Json(json!({ "url": session.url })).into_response())
        }
        Err(e) => {
            tracing::error!(error = %e, "Donation session could not be created");
            Ok(session_failed("Unable to create donation session"))
        }
    }
}

/// Unparseable bodies are treated as an empty order so the primary contact
/// still gets a default shirt
async fn shirt(State(state): State<AppState>, body: Bytes) -> Result<Response> {
    let pricing = ShirtPricing::from_config(&state.config)?;
    let stripe = state.stripe()?;

    let request: ShirtCheckoutRequest = serde_json::from_slice(&body).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Shirt checkout body not parsed; using defaults");
        ShirtCheckoutRequest::default()
    });

    let image_url = checkout::tee_image_url(
        state.config.stripe_tee_image_url.as_deref(),
        &state.config.base_url,
    );
    let params = checkout::shirt_params(&request, &pricing, &image_url, &state.config.base_url)?;

    match stripe.create_checkout_session(&params).await {
        Ok(session) => {
            tracing::info!(
                session_id = %session.id,
                registration_id = request.registration_id.as_deref().unwrap_or(""),
                "Shirt checkout started"
            );
            Ok(Json(json!({ "url": session.url })).into_response())
        }
        Err(e) => {
            tracing::error!(error = %e, "Shirt session could not be created");
            Ok(session_failed("Unable to create checkout session"))
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/checkout/donation", post(donation))
        .route("/api/checkout/shirt", post(shirt))
}
