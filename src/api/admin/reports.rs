use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::middleware::session::AppState;
use crate::error::{AppError, Result};
use crate::models::{speaker_poll, Payment, Registration, SpeakerPoll};
use crate::services::{
    csv_export,
    reporting::{self, PaymentPage, RegistrationPage, Stats},
};

fn csv_download(filename: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, csv_export::CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct RegistrationQuery {
    pub take: Option<String>,
    pub skip: Option<String>,
    pub q: Option<String>,
}

impl RegistrationQuery {
    pub fn take(&self) -> i64 {
        reporting::parse_clamped(
            self.take.as_deref(),
            reporting::REGISTRATIONS_DEFAULT_TAKE,
            1,
            reporting::REGISTRATIONS_MAX_TAKE,
        )
    }

    pub fn skip(&self) -> i64 {
        reporting::parse_clamped(
            self.skip.as_deref(),
            0,
            0,
            i64::MAX - reporting::REGISTRATIONS_MAX_TAKE,
        )
    }
}

pub async fn registrations(
    State(state): State<AppState>,
    Query(query): Query<RegistrationQuery>,
) -> Result<Json<RegistrationPage>> {
    let page =
        reporting::registrations_page(&state.pool, query.q.as_deref(), query.take(), query.skip())
            .await?;
    Ok(Json(page))
}

pub async fn export_registrations(State(state): State<AppState>) -> Result<Response> {
    let registrations = Registration::list_all(&state.pool).await?;
    let rows = Registration::with_attendees(&state.pool, registrations).await?;

    tracing::info!(registrations = rows.len(), "Exporting registrations");

    Ok(csv_download(
        "registrations.csv",
        csv_export::registrations_csv(&rows),
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentQuery {
    pub take: Option<String>,
    pub page: Option<String>,
    pub q: Option<String>,
    #[serde(rename = "type")]
    pub payment_type: Option<String>,
}

impl PaymentQuery {
    pub fn take(&self) -> i64 {
        reporting::parse_clamped(
            self.take.as_deref(),
            reporting::PAYMENTS_DEFAULT_TAKE,
            1,
            reporting::PAYMENTS_MAX_TAKE,
        )
    }

    pub fn page(&self) -> i64 {
        reporting::parse_clamped(self.page.as_deref(), 0, 0, i64::MAX / reporting::PAYMENTS_MAX_TAKE)
    }
}

pub async fn payments(
    State(state): State<AppState>,
    Query(query): Query<PaymentQuery>,
) -> Result<Json<PaymentPage>> {
    let filter = reporting::payment_filter(query.q.as_deref(), query.payment_type.as_deref());
    let page = reporting::payments_page(&state.pool, &filter, query.page(), query.take()).await?;
    Ok(Json(page))
}

pub async fn export_payments(
    State(state): State<AppState>,
    Query(query): Query<PaymentQuery>,
) -> Result<Response> {
    let filter = reporting::payment_filter(query.q.as_deref(), query.payment_type.as_deref());
    let rows = Payment::search(&state.pool, &filter, -1, 0).await?;

    Ok(csv_download("payments.csv", csv_export::payments_csv(&rows)))
}

pub async fn poll(State(state): State<AppState>) -> Result<Json<Value>> {
    let rows = SpeakerPoll::list(&state.pool).await?;
    let total_votes = speaker_poll::total_votes(&rows);

    Ok(Json(json!({ "rows": rows, "totalVotes": total_votes })))
}

#[derive(Debug, Deserialize)]
pub struct PollAction {
    action: Option<String>,
}

pub async fn poll_action(
    State(state): State<AppState>,
    Json(request): Json<PollAction>,
) -> Result<Json<Value>> {
    match request.action.as_deref() {
        Some("reset") => {
            let reset = SpeakerPoll::reset_all(&state.pool).await?;
            tracing::info!(speakers = reset, "Poll votes reset");
            Ok(Json(json!({ "ok": true })))
        }
        _ => Err(AppError::Validation("Unsupported action".to_string())),
    }
}

pub async fn export_poll(State(state): State<AppState>) -> Result<Response> {
    let rows = SpeakerPoll::list(&state.pool).await?;
    Ok(csv_download("speaker-poll.csv", csv_export::poll_csv(&rows)))
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<Stats>> {
    let stats = reporting::load_stats(&state.pool, state.stripe.as_ref()).await?;
    Ok(Json(stats))
}
