use axum::{extract::State, routing::get, Json, Router};
use serde::Deserialize;

use crate::api::middleware::session::AppState;
use crate::error::{AppError, Result};
use crate::models::SpeakerPoll;

async fn list(State(state): State<AppState>) -> Result<Json<Vec<SpeakerPoll>>> {
    Ok(Json(SpeakerPoll::list(&state.pool).await?))
}

#[derive(Debug, Deserialize)]
struct VoteRequest {
    speaker: Option<String>,
}

/// Records one vote for a speaker
pub async fn cast_vote(state: &AppState, speaker: Option<&str>) -> Result<SpeakerPoll> {
    let speaker = speaker
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("Speaker is required".to_string()))?;

    let row = SpeakerPoll::record_vote(&state.pool, speaker)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Unknown speaker: {}", speaker)))?;

    tracing::info!(speaker = %row.speaker, votes = row.votes, "Vote recorded");

    Ok(row)
}

async fn vote(
    State(state): State<AppState>,
    Json(request): Json<VoteRequest>,
) -> Result<Json<SpeakerPoll>> {
    Ok(Json(cast_vote(&state, request.speaker.as_deref()).await?))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/poll", get(list).post(vote))
}
