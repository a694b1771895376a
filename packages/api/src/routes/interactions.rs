use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::ApiError, middleware::identity::Caller, state::AppState};
use shared::models::interaction::{Interaction, PostedMessage, PromptChoice};
use shared::services::response_broker::Delivery;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/interactions", post(respond))
        .route("/channels/{id}/messages", get(channel_messages))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionRequest {
    pub message_id: String,
    pub choice: PromptChoice,
}

#[derive(Debug, Serialize)]
pub struct InteractionResponse {
    pub delivered: bool,
}

/// A button press on a challenge or draw prompt.
async fn respond(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<InteractionRequest>,
) -> Result<(StatusCode, Json<InteractionResponse>), ApiError> {
    let interaction = Interaction {
        message_id: payload.message_id,
        user: caller.identity,
        choice: payload.choice,
    };
    let delivery = state.message_board.respond(&interaction).await;
    debug!(message_id = %interaction.message_id, ?delivery, "Interaction received");

    let status = match delivery {
        Delivery::Delivered => StatusCode::OK,
        Delivery::NotAwaited => StatusCode::GONE,
        Delivery::WrongResponder => StatusCode::FORBIDDEN,
    };
    Ok((
        status,
        Json(InteractionResponse {
            delivered: delivery == Delivery::Delivered,
        }),
    ))
}

async fn channel_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<Vec<PostedMessage>> {
    Json(state.message_board.messages(&id).await)
}
