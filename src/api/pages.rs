use askama::Template;
use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;

use crate::api::admin::pages::{poll_rows, PollRow};
use crate::api::middleware::session::AppState;
use crate::api::poll::cast_vote;
use crate::error::{AppError, Result};
use crate::models::{ShirtSize, SpeakerPoll};

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutQuery {
    checkout: Option<String>,
    voted: Option<String>,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub shirt_sizes: Vec<&'static str>,
    pub cancelled: bool,
}

async fn index(Query(query): Query<CheckoutQuery>) -> IndexTemplate {
    IndexTemplate {
        shirt_sizes: ShirtSize::ALL.iter().map(ShirtSize::as_str).collect(),
        cancelled: matches!(query.checkout.as_deref(), Some("cancel" | "cancelled")),
    }
}

#[derive(Template)]
#[template(path = "thank_you.html")]
pub struct ThankYouTemplate {
    pub paid: bool,
    pub voted: bool,
    pub rows: Vec<PollRow>,
    pub total_votes: i64,
}

async fn thank_you(
    State(state): State<AppState>,
    Query(query): Query<CheckoutQuery>,
) -> Result<ThankYouTemplate> {
    let polls = SpeakerPoll::list(&state.pool).await?;
    let (rows, total_votes) = poll_rows(&polls);

    Ok(ThankYouTemplate {
        paid: query.checkout.as_deref() == Some("success"),
        voted: query.voted.is_some(),
        rows,
        total_votes,
    })
}

#[derive(Debug, Deserialize)]
struct VoteForm {
    speaker: Option<String>,
}

/// Form variant of the poll vote; bad input just returns to the page
async fn vote(State(state): State<AppState>, Form(form): Form<VoteForm>) -> Result<Redirect> {
    match cast_vote(&state, form.speaker.as_deref()).await {
        Ok(_) => Ok(Redirect::to("/thank-you?voted=1")),
        Err(AppError::Validation(_) | AppError::NotFound(_)) => Ok(Redirect::to("/thank-you")),
        Err(e) => Err(e),
    }
}

#[derive(Template)]
#[template(path = "cancel.html")]
pub struct CancelTemplate;

async fn cancel() -> CancelTemplate {
    CancelTemplate
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/register", get(index))
        .route("/thank-you", get(thank_you))
        .route("/thank-you/vote", post(vote))
        .route("/cancel", get(cancel))
}
