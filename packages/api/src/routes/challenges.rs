use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{error::ApiError, middleware::identity::Caller, state::AppState};
use shared::models::match_request::MatchRequest;
use shared::models::player::PlayerIdentity;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/challenges", post(issue_challenge))
        .route("/challenges/pending", get(pending_challenge))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRequest {
    pub recipient_id: String,
    pub channel: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeIssued {
    pub request_id: String,
    pub prompt_id: String,
}

/// Stores the challenge and waits for the recipient in the background.
async fn issue_challenge(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<ChallengeRequest>,
) -> Result<(StatusCode, Json<ChallengeIssued>), ApiError> {
    let recipient = PlayerIdentity::human(payload.recipient_id);
    let pending = state
        .match_request_service
        .issue_challenge(&caller.identity, &recipient, &payload.channel)
        .await?;

    let issued = ChallengeIssued {
        request_id: pending.request.request_id.clone(),
        prompt_id: pending.prompt.message_id.clone(),
    };

    let service = state.match_request_service.clone();
    tokio::spawn(async move {
        let request_id = pending.request.request_id.clone();
        match service.await_resolution(pending).await {
            Ok(outcome) => info!(request_id, ?outcome, "Challenge resolved"),
            Err(e) => error!(request_id, error = %e, "Challenge resolution failed"),
        }
    });

    Ok((StatusCode::ACCEPTED, Json(issued)))
}

async fn pending_challenge(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Option<MatchRequest>>, ApiError> {
    Ok(Json(
        state
            .match_request_service
            .pending_for(&caller.identity)
            .await?,
    ))
}
